//! HTTP route modules, mounted under `/api` by [`App`](crate::App).

mod accounts;
mod auth;
mod billing;
mod plans;
mod subscriptions;
mod tenants;

pub use accounts::AccountsModule;
pub use auth::{AuthModule, LoginRequest, RefreshRequest};
pub use billing::BillingModule;
pub use plans::PlansModule;
pub use subscriptions::SubscriptionsModule;
pub use tenants::{CreateTenant, TenantsModule};
