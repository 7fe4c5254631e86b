use crate::accounts::{Profile, RegisterRequest};
use crate::app::AppContext;
use crate::auth::{CurrentUser, OptionalUser};
use crate::error::Result;
use crate::http::{CreatedResponse, RouteModule};
use crate::validation::ValidatedJson;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

/// Identity and self-service registration.
pub struct AccountsModule;

impl RouteModule for AccountsModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/me/", get(me))
            .route("/register/", post(register))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/accounts")
    }
}

async fn me(State(ctx): State<AppContext>, CurrentUser(principal): CurrentUser) -> Result<Json<Profile>> {
    Ok(Json(ctx.accounts.me(&principal).await?))
}

async fn register(
    State(ctx): State<AppContext>,
    OptionalUser(caller): OptionalUser,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<CreatedResponse<Profile>> {
    let profile = ctx.accounts.register(caller.as_ref(), req).await?;
    Ok(CreatedResponse::new(profile, "/api/accounts/me/"))
}
