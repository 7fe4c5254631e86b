//! Storage seam for tenants and users.

use super::models::{NewUser, Tenant, User};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence for tenants and users.
///
/// Implementations enforce uniqueness of tenant names and usernames and
/// report violations as field-level validation errors.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All tenants ordered by name.
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>>;

    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>>;

    async fn create_tenant(&self, name: &str) -> Result<Tenant>;

    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Number of users attached to a tenant.
    async fn count_tenant_users(&self, tenant_id: Uuid) -> Result<usize>;
}
