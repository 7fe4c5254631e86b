use crate::accounts::{LoginResponse, RefreshResponse};
use crate::app::AppContext;
use crate::error::Result;
use crate::http::RouteModule;
use crate::validation::ValidatedJson;
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /auth/token/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Body of `POST /auth/token/refresh/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub refresh: String,
}

/// Token issuance.
pub struct AuthModule;

impl RouteModule for AuthModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new()
            .route("/token/", post(login))
            .route("/token/refresh/", post(refresh))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/auth")
    }
}

async fn login(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    Ok(Json(ctx.accounts.login(&req.username, &req.password).await?))
}

async fn refresh(
    State(ctx): State<AppContext>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    Ok(Json(ctx.accounts.refresh(&req.refresh).await?))
}
