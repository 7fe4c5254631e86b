use crate::app::AppContext;
use crate::auth::{CurrentUser, OptionalUser};
use crate::billing::{Plan, PlanInput};
use crate::error::Result;
use crate::http::{CreatedResponse, NoContentResponse, RouteModule};
use crate::validation::ValidatedJson;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

/// Public plan catalog; writes are platform-admin only.
pub struct PlansModule;

impl RouteModule for PlansModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/", get(list).post(create))
            .route("/{id}/", get(retrieve).put(update).delete(destroy))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/plans")
    }
}

async fn list(State(ctx): State<AppContext>) -> Result<Json<Vec<Plan>>> {
    Ok(Json(ctx.plans.list().await?))
}

async fn retrieve(
    State(ctx): State<AppContext>,
    OptionalUser(caller): OptionalUser,
    Path(id): Path<i64>,
) -> Result<Json<Plan>> {
    Ok(Json(ctx.plans.get(caller.as_ref(), id).await?))
}

async fn create(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(input): ValidatedJson<PlanInput>,
) -> Result<CreatedResponse<Plan>> {
    let plan = ctx.plans.create(&principal, input).await?;
    let location = format!("/api/plans/{}/", plan.id);
    Ok(CreatedResponse::new(plan, location))
}

async fn update(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
    ValidatedJson(input): ValidatedJson<PlanInput>,
) -> Result<Json<Plan>> {
    Ok(Json(ctx.plans.update(&principal, id, input).await?))
}

async fn destroy(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<i64>,
) -> Result<NoContentResponse> {
    ctx.plans.delete(&principal, id).await?;
    Ok(NoContentResponse)
}
