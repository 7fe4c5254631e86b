use crate::auth::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A stored user account. Never serialized; see [`UserSummary`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub tenant_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub tenant_id: Uuid,
    pub role: Role,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
}

/// Identity returned by `/accounts/me/` and by registration.
///
/// `is_platform_admin` is the explicit authorization claim clients use to
/// decide whether to show platform administration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserSummary,
    pub tenant: Tenant,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_platform_admin: bool,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_active: self.is_active,
        }
    }

    pub fn profile(&self, tenant: Tenant) -> Profile {
        Profile {
            user: self.summary(),
            tenant,
            role: self.role,
            created_at: self.created_at,
            is_platform_admin: self.role == Role::Admin,
        }
    }
}
