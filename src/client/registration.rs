use super::ClientContext;
use super::error::{ClientError, ClientResult};
use crate::accounts::{Profile, RegisterRequest, Role};
use uuid::{Uuid, Variant};

pub const MSG_FILL_ALL_FIELDS: &str = "Please fill all fields";
pub const MSG_TENANT_REQUIRED: &str = "Please enter Tenant UUID";
pub const MSG_TENANT_INVALID: &str = "Invalid Tenant UUID format.";

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub tenant_id: String,
    pub role: Role,
}

impl RegistrationForm {
    /// Local checks, run before any request. Returns the parsed tenant id.
    pub fn validate(&self) -> ClientResult<Uuid> {
        if [&self.username, &self.email, &self.password]
            .iter()
            .any(|value| value.trim().is_empty())
        {
            return Err(ClientError::Invalid(MSG_FILL_ALL_FIELDS.to_string()));
        }

        let tenant = self.tenant_id.trim();
        if tenant.is_empty() {
            return Err(ClientError::Invalid(MSG_TENANT_REQUIRED.to_string()));
        }
        if !is_tenant_uuid(tenant) {
            return Err(ClientError::Invalid(MSG_TENANT_INVALID.to_string()));
        }
        Uuid::parse_str(tenant).map_err(|_| ClientError::Invalid(MSG_TENANT_INVALID.to_string()))
    }

    fn to_request(&self, tenant: Uuid) -> RegisterRequest {
        RegisterRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            tenant_id: tenant.to_string(),
            role: self.role,
        }
    }
}

/// Hyphenated RFC 4122 form with a version of 1 to 5.
pub fn is_tenant_uuid(value: &str) -> bool {
    value.len() == 36
        && Uuid::try_parse(value).is_ok_and(|uuid| {
            (1..=5).contains(&uuid.get_version_num()) && uuid.get_variant() == Variant::RFC4122
        })
}

#[derive(Debug, Clone)]
pub struct RegistrationClient {
    ctx: ClientContext,
}

impl RegistrationClient {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    /// `POST /accounts/register/` after the local checks pass.
    pub async fn register(&self, form: &RegistrationForm) -> ClientResult<Profile> {
        let tenant = match form.validate() {
            Ok(tenant) => tenant,
            Err(err) => {
                self.ctx.notifier().error(&err.to_string());
                return Err(err);
            }
        };

        let api = self.ctx.api();
        let body = form.to_request(tenant);
        self.ctx
            .write(Some("register".to_string()), "Registration successful", async move {
                api.post("/accounts/register/", &body).await
            })
            .await
    }
}
