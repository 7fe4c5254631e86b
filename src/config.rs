use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{EshtarekError, Result};
use crate::utils::{get_env_parsed, get_env_with_prefix};

/// Minimum HS256 secret length in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Main configuration for the billing service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Token signing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(skip)]
    pub jwt_secret: Option<SecretString>,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

/// Platform admin created on startup when both username and password are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    #[serde(skip)]
    pub admin_password: Option<SecretString>,
    #[serde(default)]
    pub admin_email: String,
    #[serde(default = "default_platform_tenant")]
    pub tenant_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: None,
            admin_password: None,
            admin_email: String::new(),
            tenant_name: default_platform_tenant(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_issuer() -> String {
    "eshtarek".to_string()
}

fn default_access_ttl_secs() -> u64 {
    60 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_platform_tenant() -> String {
    "Platform".to_string()
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl AuthConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// The signing secret, or an internal error when none was configured.
    pub fn jwt_secret(&self) -> Result<&SecretString> {
        self.jwt_secret
            .as_ref()
            .ok_or_else(|| EshtarekError::internal("JWT secret not configured"))
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.auth.jwt_secret = Some(SecretString::from(secret.into()));
        self
    }

    pub fn with_token_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.config.auth.access_ttl_secs = access.as_secs();
        self.config.auth.refresh_ttl_secs = refresh.as_secs();
        self
    }

    pub fn with_bootstrap_admin(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.bootstrap.admin_username = Some(username.into());
        self.config.bootstrap.admin_password = Some(SecretString::from(password.into()));
        self
    }

    /// Load configuration from environment variables with ESHTAREK_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = get_env_parsed("PORT") {
            self.config.server.port = port;
        }
        if let Some(size) = get_env_parsed("MAX_BODY_SIZE") {
            self.config.server.max_body_size = size;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_parsed("LOG_JSON") {
            self.config.logging.json = json;
        }

        if let Some(secret) = get_env_with_prefix("JWT_SECRET") {
            self.config.auth.jwt_secret = Some(SecretString::from(secret));
        }
        if let Some(issuer) = get_env_with_prefix("JWT_ISSUER") {
            self.config.auth.issuer = issuer;
        }
        if let Some(ttl) = get_env_parsed("ACCESS_TOKEN_TTL_SECS") {
            self.config.auth.access_ttl_secs = ttl;
        }
        if let Some(ttl) = get_env_parsed("REFRESH_TOKEN_TTL_SECS") {
            self.config.auth.refresh_ttl_secs = ttl;
        }

        if let Some(username) = get_env_with_prefix("ADMIN_USERNAME") {
            self.config.bootstrap.admin_username = Some(username);
        }
        if let Some(password) = get_env_with_prefix("ADMIN_PASSWORD") {
            self.config.bootstrap.admin_password = Some(SecretString::from(password));
        }
        if let Some(email) = get_env_with_prefix("ADMIN_EMAIL") {
            self.config.bootstrap.admin_email = email;
        }
        if let Some(tenant) = get_env_with_prefix("PLATFORM_TENANT") {
            self.config.bootstrap.tenant_name = tenant;
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if the server address, log level, port, body size,
    /// token lifetimes or signing secret are invalid.
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        config.server.addr().map_err(|e| {
            EshtarekError::bad_request(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(EshtarekError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if config.server.port == 0 {
            return Err(EshtarekError::bad_request(
                "Server port must be greater than 0",
            ));
        }

        if config.server.max_body_size == 0 {
            return Err(EshtarekError::bad_request(
                "Maximum body size must be greater than 0",
            ));
        }

        if config.auth.access_ttl_secs == 0 || config.auth.refresh_ttl_secs == 0 {
            return Err(EshtarekError::bad_request(
                "Token lifetimes must be greater than 0",
            ));
        }

        match &config.auth.jwt_secret {
            None => {
                return Err(EshtarekError::bad_request(
                    "JWT secret is required (set ESHTAREK_JWT_SECRET)",
                ));
            }
            Some(secret) if secret.expose_secret().len() < MIN_JWT_SECRET_LEN => {
                return Err(EshtarekError::bad_request(format!(
                    "JWT secret must be at least {} bytes",
                    MIN_JWT_SECRET_LEN
                )));
            }
            Some(_) => {}
        }

        if config.bootstrap.admin_username.is_some() != config.bootstrap.admin_password.is_some() {
            return Err(EshtarekError::bad_request(
                "Bootstrap admin needs both a username and a password",
            ));
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-test-secret-that-is-32-bytes!!";

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.auth.issuer, "eshtarek");
        assert_eq!(config.bootstrap.tenant_name, "Platform");
        assert!(config.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_build_requires_secret() {
        let err = ConfigBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("JWT secret is required"));

        let err = ConfigBuilder::new().with_jwt_secret("short").build().unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));

        assert!(ConfigBuilder::new().with_jwt_secret(SECRET).build().is_ok());
    }

    #[test]
    fn test_build_rejects_bad_values() {
        let base = || ConfigBuilder::new().with_jwt_secret(SECRET);

        assert!(base().with_log_level("loud").build().is_err());
        assert!(base().with_port(0).build().is_err());
        assert!(base().with_max_body_size(0).build().is_err());
        assert!(base().with_host("not a host").build().is_err());
        assert!(
            base()
                .with_token_ttls(Duration::ZERO, Duration::from_secs(60))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_bootstrap_admin_needs_both_halves() {
        let mut builder = ConfigBuilder::new().with_jwt_secret(SECRET);
        builder.config.bootstrap.admin_username = Some("root".to_string());
        assert!(builder.build().is_err());

        let config = ConfigBuilder::new()
            .with_jwt_secret(SECRET)
            .with_bootstrap_admin("root", "hunter22")
            .build()
            .unwrap();
        assert_eq!(config.bootstrap.admin_username.as_deref(), Some("root"));
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let config = ConfigBuilder::new().with_jwt_secret(SECRET).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains(SECRET));
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("ESHTAREK_JWT_ISSUER", "billing-test");
            std::env::set_var("ESHTAREK_ACCESS_TOKEN_TTL_SECS", "120");
        }
        let builder = ConfigBuilder::new().from_env();
        assert_eq!(builder.config.auth.issuer, "billing-test");
        assert_eq!(builder.config.auth.access_ttl_secs, 120);
        unsafe {
            std::env::remove_var("ESHTAREK_JWT_ISSUER");
            std::env::remove_var("ESHTAREK_ACCESS_TOKEN_TTL_SECS");
        }
    }
}
