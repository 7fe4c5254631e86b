use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role of a user within the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform administrator, sees every tenant.
    Admin,
    /// Administrator of a single tenant.
    TenantAdmin,
    /// Regular member of a single tenant.
    #[default]
    TenantUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::TenantAdmin => "TENANT_ADMIN",
            Self::TenantUser => "TENANT_USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "TENANT_ADMIN" => Ok(Self::TenantAdmin),
            "TENANT_USER" => Ok(Self::TenantUser),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_platform_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Platform admins count as tenant admins everywhere.
    pub fn is_tenant_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::TenantAdmin)
    }

    /// Tenant filter for list queries; `None` means every tenant.
    pub fn tenant_scope(&self) -> Option<Uuid> {
        if self.is_platform_admin() {
            None
        } else {
            Some(self.tenant_id)
        }
    }

    pub fn can_access_tenant(&self, tenant_id: Uuid) -> bool {
        self.is_platform_admin() || self.tenant_id == tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: 1,
            username: "alice".to_string(),
            tenant_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::TenantAdmin).unwrap(), "\"TENANT_ADMIN\"");
        assert_eq!("TENANT_USER".parse::<Role>().unwrap(), Role::TenantUser);
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn test_tenant_scope() {
        let admin = principal(Role::Admin);
        assert_eq!(admin.tenant_scope(), None);
        assert!(admin.can_access_tenant(Uuid::new_v4()));
        assert!(admin.is_tenant_admin());

        let member = principal(Role::TenantUser);
        assert_eq!(member.tenant_scope(), Some(member.tenant_id));
        assert!(member.can_access_tenant(member.tenant_id));
        assert!(!member.can_access_tenant(Uuid::new_v4()));
        assert!(!member.is_tenant_admin());
    }
}
