//! Eshtarek - multi-tenant subscription billing
//!
//! Tenants subscribe to plans, invoices are raised against subscriptions and
//! settled either by a direct pay call or by a payment-provider webhook. Both
//! settlement paths share one per-invoice lock, so an invoice is paid at most
//! once however the calls interleave.
//!
//! # Features
//!
//! - **HTTP API**: axum routes for auth, accounts, tenants, plans,
//!   subscriptions and billing
//! - **Authentication**: HS256 JWTs carrying tenant and role claims, Argon2id
//!   password hashes
//! - **Billing**: single active subscription per tenant, idempotency keys on
//!   payments, mock webhook reconciliation, audit events
//! - **Client**: an HTTP orchestration layer including the Subscribe & Pay saga
//! - **Testing**: request scenarios and a seeded in-memory world
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use eshtarek::{App, AppContext, ConfigBuilder, storage::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     eshtarek::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let context = AppContext::from_config(&config, InMemoryStore::new())?;
//!
//!     App::new(config, context).serve().await?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod api;
mod app;
pub mod auth;
pub mod billing;
pub mod client;
mod config;
mod core;
mod error;
pub mod health;
mod http;
mod middleware;
pub mod storage;
pub mod testing;
mod utils;
pub mod validation;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use config::{AuthConfig, BootstrapConfig, Config, ConfigBuilder, LoggingConfig, MIN_JWT_SECRET_LEN, ServerConfig};
pub use core::{API_PREFIX, App};
pub use error::{ErrorResponse, EshtarekError, FieldErrors, NON_FIELD_ERRORS, Result};
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use http::{CreatedResponse, NoContentResponse, RouteModule};
pub use middleware::REQUEST_ID_HEADER;
pub use validation::ValidatedJson;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with defaults from the environment.
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. "info", "eshtarek=debug,billing::audit=info")
/// - `ESHTAREK_LOG_JSON`: set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("ESHTAREK_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing from [`Config::logging`]. `RUST_LOG` still wins when set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    install(env_filter, config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialized: {e}");
    }
}
