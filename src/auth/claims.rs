//! JWT claim sets.

use super::principal::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registered claims shared by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Subject (user id)
    pub sub: String,
    pub iss: String,
    /// Expiration time (unix timestamp)
    pub exp: u64,
    /// Issued at (unix timestamp)
    pub iat: u64,
    /// JWT ID
    pub jti: String,
}

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims of an access token.
///
/// `tenant_id` and `role` are the authorization claims; `role == ADMIN`
/// marks a platform administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub standard: StandardClaims,
    pub token_type: TokenType,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl AccessClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.standard.sub.parse().ok()
    }
}

/// Claims of a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(flatten)]
    pub standard: StandardClaims,
    pub token_type: TokenType,
}

impl RefreshClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.standard.sub.parse().ok()
    }
}
