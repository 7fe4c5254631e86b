//! JWT issuance and verification (HS256).
//!
//! # Example
//!
//! ```rust,ignore
//! use eshtarek::auth::{JwtIssuer, JwtIssuerConfig, Role, TokenSubject};
//!
//! let issuer = JwtIssuer::new(JwtIssuerConfig::with_secret(secret, "eshtarek"));
//! let tokens = issuer.issue(&TokenSubject { user_id: 7, tenant_id, role: Role::TenantAdmin })?;
//! let claims = issuer.verify_access(&tokens.access_token)?;
//! ```

use super::claims::{AccessClaims, RefreshClaims, StandardClaims, TokenType};
use super::principal::Role;
use crate::config::AuthConfig;
use crate::error::{EshtarekError, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Configuration for token issuance.
#[derive(Clone)]
pub struct JwtIssuerConfig {
    secret: Vec<u8>,
    /// Token issuer (iss claim)
    pub issuer: String,
    /// Access token expiry (default: 1 hour)
    pub access_token_ttl: Duration,
    /// Refresh token expiry (default: 1 day)
    pub refresh_token_ttl: Duration,
}

impl JwtIssuerConfig {
    /// Create config with an HS256 symmetric key.
    pub fn with_secret(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
            issuer: issuer.into(),
            access_token_ttl: Duration::from_secs(60 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    pub fn from_auth_config(auth: &AuthConfig) -> Result<Self> {
        let secret = auth.jwt_secret()?;
        Ok(Self::with_secret(secret.expose_secret(), auth.issuer.clone())
            .access_token_ttl(auth.access_ttl())
            .refresh_token_ttl(auth.refresh_ttl()))
    }

    pub fn access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }
}

/// Issued token pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry in seconds
    pub expires_in: u64,
}

/// Who a token is issued to.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject {
    pub user_id: i64,
    pub tenant_id: Uuid,
    pub role: Role,
}

/// Issues and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct JwtIssuer {
    config: JwtIssuerConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtIssuer {
    pub fn new(config: JwtIssuerConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(&config.secret);
        let decoding_key = DecodingKey::from_secret(&config.secret);
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issue an access and refresh token pair.
    pub fn issue(&self, subject: &TokenSubject) -> Result<TokenPair> {
        let (access_token, expires_in) = self.issue_access_token(subject)?;

        let now = current_timestamp();
        let refresh_claims = RefreshClaims {
            standard: self.standard_claims(subject.user_id, now, self.config.refresh_token_ttl),
            token_type: TokenType::Refresh,
        };
        let refresh_token = encode(&Header::new(Algorithm::HS256), &refresh_claims, &self.encoding_key)
            .map_err(|e| EshtarekError::internal(format!("Failed to encode refresh token: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in,
        })
    }

    /// Issue only an access token (refresh flow).
    pub fn issue_access_token(&self, subject: &TokenSubject) -> Result<(String, u64)> {
        let now = current_timestamp();
        let claims = AccessClaims {
            standard: self.standard_claims(subject.user_id, now, self.config.access_token_ttl),
            token_type: TokenType::Access,
            tenant_id: subject.tenant_id,
            role: subject.role,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| EshtarekError::internal(format!("Failed to encode access token: {}", e)))?;

        Ok((token, self.config.access_token_ttl.as_secs()))
    }

    /// Verify signature, expiry, issuer and token kind of an access token.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims> {
        let claims: AccessClaims = self.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(EshtarekError::unauthorized("Token is not an access token"));
        }
        Ok(claims)
    }

    /// Verify a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims> {
        let claims: RefreshClaims = self.decode(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(EshtarekError::unauthorized("Token is not a refresh token"));
        }
        Ok(claims)
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                EshtarekError::unauthorized("Given token not valid for any token type")
            })
    }

    fn standard_claims(&self, user_id: i64, now: u64, ttl: Duration) -> StandardClaims {
        StandardClaims {
            sub: user_id.to_string(),
            iss: self.config.issuer.clone(),
            exp: now + ttl.as_secs(),
            iat: now,
            jti: generate_jti(),
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn generate_jti() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
