use crate::error::EshtarekError;
use std::fmt;

/// Account and identity errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Unknown username, wrong password or inactive account.
    InvalidCredentials,
    /// The tenant named in a registration does not exist.
    TenantNotFound,
    /// The username is already registered.
    UsernameTaken,
    /// The tenant's active plan has no free seats.
    SeatLimitReached,
    /// Only platform admins may create platform admins.
    AdminRoleRequiresPlatformAdmin,
    /// The operation is restricted to platform admins.
    PlatformAdminRequired,
    /// The authenticated user has no profile.
    ProfileNotFound,
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => {
                write!(f, "No active account found with the given credentials")
            }
            Self::TenantNotFound => write!(f, "Invalid tenant_id"),
            Self::UsernameTaken => write!(f, "Username already exists"),
            Self::SeatLimitReached => {
                write!(f, "Max users limit reached for the tenant's current plan")
            }
            Self::AdminRoleRequiresPlatformAdmin => {
                write!(f, "Only platform admins can assign the ADMIN role")
            }
            Self::PlatformAdminRequired => {
                write!(f, "You do not have permission to perform this action.")
            }
            Self::ProfileNotFound => write!(f, "Profile not found"),
        }
    }
}

impl std::error::Error for AccountError {}

impl From<AccountError> for EshtarekError {
    fn from(err: AccountError) -> Self {
        match &err {
            AccountError::InvalidCredentials => EshtarekError::Unauthorized(err.to_string()),
            AccountError::TenantNotFound | AccountError::UsernameTaken => {
                EshtarekError::BadRequest(err.to_string())
            }
            AccountError::SeatLimitReached
            | AccountError::AdminRoleRequiresPlatformAdmin
            | AccountError::PlatformAdminRequired => EshtarekError::Forbidden(err.to_string()),
            AccountError::ProfileNotFound => EshtarekError::NotFound(err.to_string()),
        }
    }
}
