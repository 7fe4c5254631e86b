//! Client error taxonomy.
//!
//! Every non-success response is decoded into a [`ClientError`] whose
//! `Display` is the message shown to the user.

use crate::error::{FieldErrors, NON_FIELD_ERRORS};
use serde_json::Value;

/// Shown when a failure carries no usable message.
pub const FALLBACK_MESSAGE: &str = "Action failed";

const FIELD_SEPARATOR: &str = " • ";

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// 401. Credentials have already been discarded by the transport.
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// 403. Read paths treat this as "feature unavailable".
    #[error("{0}")]
    Forbidden(String),

    /// 4xx with a message and, when the server sent them, per-field errors.
    #[error("{message}")]
    Validation { message: String, field_errors: FieldErrors },

    /// 402 from the pay endpoint.
    #[error("{0}")]
    PaymentDeclined(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    /// Rejected locally before any request was sent.
    #[error("{0}")]
    Invalid(String),

    /// Another action on the same entity has not finished yet.
    #[error("Another request for {0} is still in progress")]
    InFlight(String),

    #[error("Action was not confirmed")]
    NotConfirmed,

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn network(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }

    /// Map a failed response to an error, using the decoded body for the
    /// message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let value = serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.trim().to_string()));
        let message = format_error(&value).unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        match status {
            401 => Self::Unauthorized,
            402 => Self::PaymentDeclined(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            400..=499 => Self::Validation {
                message,
                field_errors: field_errors(&value),
            },
            _ => Self::Server { status, message },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::PaymentDeclined(_) => Some(402),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::Validation { .. } => Some(400),
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401 or 403.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden(_))
    }

    /// Errors that say nothing about the server's decision: transport
    /// failures and 5xx.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. } | Self::Decode(_))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { field_errors, .. } if !field_errors.is_empty() => Some(field_errors),
            _ => None,
        }
    }
}

/// Render an error body as one line.
///
/// Strings pass through, arrays are comma-joined and objects become
/// `field: a, b` parts joined with a bullet. `non_field_errors` is unlabeled.
/// Error envelopes prefer their field errors over the summary message.
pub fn format_error(body: &Value) -> Option<String> {
    match body {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(items.iter().map(plain).collect::<Vec<_>>().join(", ")),
        Value::Object(map) => {
            if let Some(Value::Object(fields)) = map.get("field_errors") {
                if !fields.is_empty() {
                    return Some(join_fields(fields));
                }
            }
            if let Some(Value::String(error)) = map.get("error") {
                return Some(error.clone());
            }
            if let Some(Value::String(detail)) = map.get("detail") {
                return Some(detail.clone());
            }
            if map.is_empty() { None } else { Some(join_fields(map)) }
        }
        other => Some(other.to_string()),
    }
}

fn join_fields(fields: &serde_json::Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(field, value)| {
            let text = match value {
                Value::Array(items) => items.iter().map(plain).collect::<Vec<_>>().join(", "),
                other => plain(other),
            };
            if field == NON_FIELD_ERRORS {
                text
            } else {
                format!("{field}: {text}")
            }
        })
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn field_errors(body: &Value) -> FieldErrors {
    body.get("field_errors")
        .and_then(|fields| serde_json::from_value(fields.clone()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_are_joined_with_bullets() {
        let body = json!({
            "password": ["Ensure this field has at least 6 characters."],
            "username": ["Username already exists"],
        });
        assert_eq!(
            format_error(&body).unwrap(),
            "password: Ensure this field has at least 6 characters. • username: Username already exists"
        );
    }

    #[test]
    fn test_non_field_errors_are_unlabeled() {
        let body = json!({"non_field_errors": ["a", "b"]});
        assert_eq!(format_error(&body).unwrap(), "a, b");
    }

    #[test]
    fn test_envelope_prefers_field_errors() {
        let body = json!({
            "error": "name: tenant with this name already exists.",
            "error_id": "x",
            "field_errors": {"name": ["tenant with this name already exists."]},
        });
        assert_eq!(format_error(&body).unwrap(), "name: tenant with this name already exists.");

        let body = json!({"error": "Invoice already paid", "error_id": "x"});
        assert_eq!(format_error(&body).unwrap(), "Invoice already paid");
    }

    #[test]
    fn test_strings_and_arrays() {
        assert_eq!(format_error(&json!("boom")).unwrap(), "boom");
        assert_eq!(format_error(&json!(["a", "b"])).unwrap(), "a, b");
        assert!(format_error(&json!(null)).is_none());
        assert!(format_error(&json!({})).is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(ClientError::from_response(401, ""), ClientError::Unauthorized));
        assert!(matches!(
            ClientError::from_response(402, r#"{"error":"Payment declined (simulated)"}"#),
            ClientError::PaymentDeclined(msg) if msg == "Payment declined (simulated)"
        ));
        assert!(matches!(ClientError::from_response(403, "{}"), ClientError::Forbidden(_)));
        assert!(matches!(ClientError::from_response(409, "{}"), ClientError::Conflict(_)));
        assert!(matches!(ClientError::from_response(502, "bad gateway"), ClientError::Server { status: 502, .. }));
    }

    #[test]
    fn test_validation_keeps_field_errors() {
        let err = ClientError::from_response(
            400,
            r#"{"error":"x","field_errors":{"subscription":["Invalid pk \"9\" - object does not exist."]}}"#,
        );
        let fields = err.field_errors().unwrap();
        assert_eq!(fields.get("subscription").unwrap().len(), 1);
        assert_eq!(err.to_string(), r#"subscription: Invalid pk "9" - object does not exist."#);
    }

    #[test]
    fn test_empty_body_uses_fallback() {
        let err = ClientError::from_response(400, "");
        assert_eq!(err.to_string(), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_classification() {
        assert!(ClientError::Unauthorized.is_auth());
        assert!(ClientError::Forbidden("no".into()).is_auth());
        assert!(ClientError::Network("down".into()).is_unavailable());
        assert!(!ClientError::Forbidden("no".into()).is_unavailable());
    }
}
