//! Custom validators for request fields.

use std::borrow::Cow;
use validator::{ValidateEmail, ValidationError};

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Tenant ids must parse as UUIDs.
pub fn validate_tenant_id(id: &str) -> Result<(), ValidationError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| error("uuid", "Invalid tenant_id"))
}

/// Email is optional; when present it must look like an address.
pub fn validate_email_or_blank(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.validate_email() {
        Ok(())
    } else {
        Err(error("email", "Enter a valid email address."))
    }
}

/// Plan features must be a JSON object.
pub fn validate_features(features: &serde_json::Value) -> Result<(), ValidationError> {
    if features.is_object() {
        Ok(())
    } else {
        Err(error("features", "Features must be a JSON object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tenant_id() {
        assert!(validate_tenant_id("7f1c0d62-3a52-4f0e-9d6b-1c2b3a4d5e6f").is_ok());
        let err = validate_tenant_id("tenant-1").unwrap_err();
        assert_eq!(err.message.as_deref(), Some("Invalid tenant_id"));
    }

    #[test]
    fn test_validate_email_or_blank() {
        assert!(validate_email_or_blank("").is_ok());
        assert!(validate_email_or_blank("ops@acme.test").is_ok());
        assert!(validate_email_or_blank("nope").is_err());
    }

    #[test]
    fn test_validate_features() {
        assert!(validate_features(&serde_json::json!({"sso": true})).is_ok());
        assert!(validate_features(&serde_json::json!(["sso"])).is_err());
    }
}
