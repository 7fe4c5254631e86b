use crate::app::AppContext;
use crate::auth::CurrentUser;
use crate::billing::{ChangePlan, ChangeStatus, CreateSubscription, Subscription};
use crate::error::Result;
use crate::http::{CreatedResponse, NoContentResponse, RouteModule};
use crate::validation::ValidatedJson;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

/// Tenant-scoped subscription lifecycle.
pub struct SubscriptionsModule;

impl RouteModule for SubscriptionsModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}/", get(retrieve).delete(destroy))
            .route("/{id}/change-plan/", post(change_plan))
            .route("/{id}/change-status/", post(change_status))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/subscriptions")
    }
}

async fn list(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<Subscription>>> {
    Ok(Json(ctx.subscriptions.list(&principal).await?))
}

async fn retrieve(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>> {
    Ok(Json(ctx.subscriptions.get(&principal, id).await?))
}

async fn create(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateSubscription>,
) -> Result<CreatedResponse<Subscription>> {
    let subscription = ctx.subscriptions.create(&principal, req).await?;
    let location = format!("/api/subscriptions/{}/", subscription.id);
    Ok(CreatedResponse::new(subscription, location))
}

async fn change_plan(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ChangePlan>,
) -> Result<Json<Subscription>> {
    Ok(Json(ctx.subscriptions.change_plan(&principal, id, req.plan).await?))
}

async fn change_status(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ChangeStatus>,
) -> Result<Json<Subscription>> {
    Ok(Json(ctx.subscriptions.change_status(&principal, id, req.status).await?))
}

async fn destroy(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> Result<NoContentResponse> {
    ctx.subscriptions.delete(&principal, id).await?;
    Ok(NoContentResponse)
}
