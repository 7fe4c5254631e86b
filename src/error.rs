use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key used for errors that are not tied to a single request field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// The main error type for the billing service
#[derive(Debug, thiserror::Error)]
pub enum EshtarekError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Field-level validation messages, keyed by request field name.
///
/// Serializes as a plain JSON object: `{"password": ["too short"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single message for a single field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new().with(field, message)
    }

    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add(field, message);
        self
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            if field == NON_FIELD_ERRORS {
                write!(f, "{}", messages.join(", "))?;
            } else {
                write!(f, "{}: {}", field, messages.join(", "))?;
            }
        }
        Ok(())
    }
}

/// JSON body of every error response.
///
/// The client decodes the same type, so fields are public and deserializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
}

impl EshtarekError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Validation error for one field.
    pub fn field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, msg))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn payment_required(msg: impl Into<String>) -> Self {
        Self::PaymentRequired(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to send to clients.
    ///
    /// Client errors carry their message. Server errors collapse to a generic
    /// message; the detail only reaches the server log.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(msg) | Self::BadRequest(msg) | Self::Unauthorized(msg) => msg.clone(),
            Self::Forbidden(msg) | Self::Conflict(msg) | Self::PaymentRequired(msg) => msg.clone(),
            Self::Validation(fields) => fields.to_string(),
            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
        }
    }
}

impl IntoResponse for EshtarekError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: self.safe_message(),
            error_id: Some(error_id),
            details: None,
            field_errors: match self {
                Self::Validation(fields) => Some(fields),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers and services
pub type Result<T> = std::result::Result<T, EshtarekError>;

impl From<serde_json::Error> for EshtarekError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            EshtarekError::BadRequest(format!("JSON error: {}", err))
        } else {
            EshtarekError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<validator::ValidationErrors> for EshtarekError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, errors) in err.field_errors() {
            for error in errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                fields.add(field.to_string(), message);
            }
        }
        EshtarekError::Validation(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(EshtarekError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(EshtarekError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(EshtarekError::field("plan", "x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(EshtarekError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(EshtarekError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(EshtarekError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(
            EshtarekError::payment_required("x").status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            EshtarekError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_keeps_prefix() {
        let err = EshtarekError::bad_request("Invoice already paid");
        assert_eq!(err.to_string(), "Bad request: Invoice already paid");
        assert_eq!(err.safe_message(), "Invoice already paid");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = EshtarekError::internal("lock poisoned at store.rs:42");
        assert_eq!(err.safe_message(), "Internal server error");

        let err: EshtarekError = anyhow::anyhow!("boom").into();
        assert_eq!(err.safe_message(), "Internal server error");
    }

    #[test]
    fn test_field_errors_accumulate() {
        let fields = FieldErrors::new()
            .with("password", "Too short")
            .with("password", "Too common")
            .with("tenant_id", "Invalid tenant_id");

        assert_eq!(fields.get("password").map(|m| m.len()), Some(2));
        assert_eq!(
            fields.to_string(),
            "password: Too short, Too common; tenant_id: Invalid tenant_id"
        );
    }

    #[test]
    fn test_non_field_errors_have_no_label() {
        let fields = FieldErrors::single(NON_FIELD_ERRORS, "Invalid credentials");
        assert_eq!(fields.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_validation_response_body() {
        let response =
            EshtarekError::field("tenant", "This tenant already has an active subscription.")
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        let fields = body.field_errors.unwrap();
        assert_eq!(
            fields.get("tenant"),
            Some(&["This tenant already has an active subscription.".to_string()][..])
        );
        assert!(body.error_id.is_some());
    }

    #[test]
    fn test_json_error_classification() {
        let err: EshtarekError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, EshtarekError::BadRequest(_)));
    }
}
