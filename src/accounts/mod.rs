//! Tenants, users and their profiles.
//!
//! Every user belongs to exactly one tenant and carries one [`Role`]. The
//! [`AccountService`] owns registration (including the plan's seat limit),
//! credential checks and token issuance.

mod error;
mod models;
mod service;
pub mod storage;

pub use crate::auth::Role;
pub use error::AccountError;
pub use models::{NewUser, Profile, Tenant, User, UserSummary};
pub use service::{AccountService, LoginResponse, RefreshResponse, RegisterRequest};
pub(crate) use service::require_platform_admin;
pub use storage::AccountStore;
