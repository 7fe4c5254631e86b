use super::error::AccountError;
use super::models::{NewUser, Profile, Tenant, User};
use super::storage::AccountStore;
use crate::auth::{JwtIssuer, PasswordHasher, Principal, Role, TokenSubject};
use crate::billing::{BillingStore, LockRegistry, SubscriptionStatus};
use crate::config::BootstrapConfig;
use crate::error::{EshtarekError, Result};
use crate::validation::{validate_email_or_blank, validate_tenant_id};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Body of `POST /accounts/register/`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 150, message = "This field may not be blank."))]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "validate_email_or_blank"))]
    pub email: String,
    #[validate(length(min = 6, message = "Ensure this field has at least 6 characters."))]
    pub password: String,
    #[validate(custom(function = "validate_tenant_id"))]
    pub tenant_id: String,
    #[serde(default)]
    pub role: Role,
}

/// Body returned by `POST /auth/token/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub role: Role,
    pub is_platform_admin: bool,
}

/// Body returned by `POST /auth/token/refresh/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Registration, login and tenant administration.
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    billing: Arc<dyn BillingStore>,
    hasher: PasswordHasher,
    jwt: Arc<JwtIssuer>,
    locks: Arc<LockRegistry>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        billing: Arc<dyn BillingStore>,
        hasher: PasswordHasher,
        jwt: Arc<JwtIssuer>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            store,
            billing,
            hasher,
            jwt,
            locks,
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Exchange credentials for a token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !user.is_active || !self.hasher.verify(password, &user.password_hash)? {
            tracing::info!(username, "Rejected login");
            return Err(AccountError::InvalidCredentials.into());
        }

        let tokens = self.jwt.issue(&subject(&user))?;
        tracing::info!(user_id = user.id, tenant_id = %user.tenant_id, "User logged in");

        Ok(LoginResponse {
            access: tokens.access_token,
            refresh: tokens.refresh_token,
            role: user.role,
            is_platform_admin: user.role == Role::Admin,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// Role and tenant are read from the store, so changes take effect on refresh.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let claims = self.jwt.verify_refresh(refresh_token)?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| EshtarekError::unauthorized("Malformed token subject"))?;

        let user = self
            .store
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| EshtarekError::unauthorized("User not found"))?;

        let (access, _) = self.jwt.issue_access_token(&subject(&user))?;
        Ok(RefreshResponse { access })
    }

    /// Resolve the principal behind a verified access token.
    pub async fn principal(&self, user_id: i64) -> Result<Principal> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| EshtarekError::unauthorized("User not found"))?;

        Ok(Principal {
            user_id: user.id,
            username: user.username,
            tenant_id: user.tenant_id,
            role: user.role,
        })
    }

    pub async fn me(&self, principal: &Principal) -> Result<Profile> {
        let user = self
            .store
            .get_user(principal.user_id)
            .await?
            .ok_or(AccountError::ProfileNotFound)?;
        let tenant = self
            .store
            .get_tenant(user.tenant_id)
            .await?
            .ok_or(AccountError::ProfileNotFound)?;
        Ok(user.profile(tenant))
    }

    /// Create a user in an existing tenant.
    ///
    /// Outside platform admins, registration is refused once the tenant has as
    /// many users as its active plan's `max_users`.
    pub async fn register(&self, caller: Option<&Principal>, req: RegisterRequest) -> Result<Profile> {
        let caller_is_platform_admin = caller.is_some_and(Principal::is_platform_admin);

        if req.role == Role::Admin && !caller_is_platform_admin {
            return Err(AccountError::AdminRoleRequiresPlatformAdmin.into());
        }

        let tenant_id = Uuid::parse_str(&req.tenant_id).map_err(|_| AccountError::TenantNotFound)?;
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or(AccountError::TenantNotFound)?;

        if self.store.find_user_by_username(&req.username).await?.is_some() {
            return Err(AccountError::UsernameTaken.into());
        }

        let _guard = self.locks.tenant(tenant.id).await;

        if !caller_is_platform_admin {
            self.check_seat_limit(tenant.id).await?;
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .store
            .create_user(NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                tenant_id: tenant.id,
                role: req.role,
            })
            .await?;

        tracing::info!(
            user_id = user.id,
            tenant_id = %tenant.id,
            role = %user.role,
            "User registered"
        );

        Ok(user.profile(tenant))
    }

    async fn check_seat_limit(&self, tenant_id: Uuid) -> Result<()> {
        let active = self
            .billing
            .list_subscriptions(Some(tenant_id))
            .await?
            .into_iter()
            .find(|s| s.status == SubscriptionStatus::Active);

        let Some(subscription) = active else {
            return Ok(());
        };
        let Some(plan) = self.billing.get_plan(subscription.plan_id).await? else {
            return Ok(());
        };

        if plan.max_users > 0 {
            let current = self.store.count_tenant_users(tenant_id).await?;
            if current >= plan.max_users as usize {
                tracing::info!(
                    tenant_id = %tenant_id,
                    max_users = plan.max_users,
                    current,
                    "Seat limit reached"
                );
                return Err(AccountError::SeatLimitReached.into());
            }
        }
        Ok(())
    }

    pub async fn list_tenants(&self, principal: &Principal) -> Result<Vec<Tenant>> {
        require_platform_admin(principal)?;
        self.store.list_tenants().await
    }

    pub async fn create_tenant(&self, principal: &Principal, name: &str) -> Result<Tenant> {
        require_platform_admin(principal)?;
        let tenant = self.store.create_tenant(name).await?;
        tracing::info!(tenant_id = %tenant.id, name = %tenant.name, "Tenant created");
        Ok(tenant)
    }

    /// Ensure the configured platform admin and its tenant exist.
    ///
    /// Returns `None` when no bootstrap admin is configured.
    pub async fn bootstrap(&self, config: &BootstrapConfig) -> Result<Option<Profile>> {
        let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password)
        else {
            return Ok(None);
        };

        let tenant = match self.store.find_tenant_by_name(&config.tenant_name).await? {
            Some(tenant) => tenant,
            None => self.store.create_tenant(&config.tenant_name).await?,
        };

        let user = match self.store.find_user_by_username(username).await? {
            Some(user) => user,
            None => {
                let password_hash = self.hasher.hash(password.expose_secret())?;
                let user = self
                    .store
                    .create_user(NewUser {
                        username: username.clone(),
                        email: config.admin_email.clone(),
                        password_hash,
                        tenant_id: tenant.id,
                        role: Role::Admin,
                    })
                    .await?;
                tracing::info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
                user
            }
        };

        let tenant = self
            .store
            .get_tenant(user.tenant_id)
            .await?
            .ok_or(AccountError::ProfileNotFound)?;
        Ok(Some(user.profile(tenant)))
    }
}

fn subject(user: &User) -> TokenSubject {
    TokenSubject {
        user_id: user.id,
        tenant_id: user.tenant_id,
        role: user.role,
    }
}

pub(crate) fn require_platform_admin(principal: &Principal) -> Result<()> {
    if principal.is_platform_admin() {
        Ok(())
    } else {
        Err(AccountError::PlatformAdminRequired.into())
    }
}
