use crate::accounts::Tenant;
use crate::app::AppContext;
use crate::auth::CurrentUser;
use crate::error::Result;
use crate::http::{CreatedResponse, RouteModule};
use crate::validation::ValidatedJson;
use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /tenants/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTenant {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: String,
}

/// Platform-admin tenant management.
pub struct TenantsModule;

impl RouteModule for TenantsModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route("/", get(list).post(create))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/tenants")
    }
}

async fn list(State(ctx): State<AppContext>, CurrentUser(principal): CurrentUser) -> Result<Json<Vec<Tenant>>> {
    Ok(Json(ctx.accounts.list_tenants(&principal).await?))
}

async fn create(
    State(ctx): State<AppContext>,
    CurrentUser(principal): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateTenant>,
) -> Result<CreatedResponse<Tenant>> {
    let tenant = ctx.accounts.create_tenant(&principal, &req.name).await?;
    let location = format!("/api/tenants/{}/", tenant.id);
    Ok(CreatedResponse::new(tenant, location))
}
