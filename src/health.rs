use crate::app::AppContext;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check result for a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

async fn health(State(ctx): State<AppContext>) -> HealthResponse {
    let store = match ctx.plans.list().await {
        Ok(_) => ComponentHealth {
            name: "store".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            ComponentHealth {
                name: "store".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some("store unavailable".to_string()),
            }
        }
    };

    let status = if store.status == HealthStatus::Healthy {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: vec![store],
    }
}

/// `GET /health`
pub fn health_routes() -> Router<AppContext> {
    Router::new().route("/health", get(health))
}
