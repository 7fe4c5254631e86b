use super::error::ClientResult;
use super::transport::ApiClient;
use crate::accounts::{Profile, Tenant};

/// Result of the platform-admin probe (`GET /tenants/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminProbe {
    Granted,
    /// 401 or 403.
    Denied,
    /// Network failure or 5xx; says nothing about the caller's privileges.
    Unavailable,
    /// No credentials, so no probe was sent.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub identity: Option<Profile>,
    pub is_admin: bool,
    pub loading: bool,
    pub admin_probe: AdminProbe,
}

impl AuthState {
    pub fn anonymous() -> Self {
        Self {
            identity: None,
            is_admin: false,
            loading: false,
            admin_probe: AdminProbe::Skipped,
        }
    }

    /// Initial state before the first resolution finishes.
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::anonymous()
        }
    }
}

/// Works out who the caller is and whether they are a platform admin.
///
/// Failures degrade the state instead of surfacing as errors.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    api: ApiClient,
}

impl SessionResolver {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn resolve(&self) -> AuthState {
        if !self.api.is_authenticated().await {
            return AuthState::anonymous();
        }

        let (me, tenants) = tokio::join!(
            self.api.get::<Profile>("/accounts/me/"),
            self.api.get::<Vec<Tenant>>("/tenants/"),
        );

        let identity = match me {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::debug!(error = %err, "identity unavailable");
                None
            }
        };

        let admin_probe = match tenants {
            Ok(_) => AdminProbe::Granted,
            Err(err) if err.is_auth() => AdminProbe::Denied,
            Err(err) => {
                tracing::debug!(error = %err, "admin probe unavailable");
                AdminProbe::Unavailable
            }
        };

        // The identity's explicit claim wins; the probe only decides when
        // the identity could not be loaded.
        let is_admin = match &identity {
            Some(profile) => profile.is_platform_admin,
            None => admin_probe == AdminProbe::Granted,
        };

        AuthState {
            identity,
            is_admin,
            loading: false,
            admin_probe,
        }
    }

    /// Log in and resolve the new session.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<AuthState> {
        self.api.login(username, password).await?;
        Ok(self.resolve().await)
    }
}
