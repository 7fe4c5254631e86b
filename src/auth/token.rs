use crate::error::EshtarekError;
use axum::http::{header, request::Parts};

/// Extracts bearer tokens from request headers
pub struct TokenExtractor;

impl TokenExtractor {
    /// Token from `Authorization: Bearer <token>`.
    pub fn from_header(parts: &Parts) -> Result<String, EshtarekError> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                EshtarekError::unauthorized("Authentication credentials were not provided")
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            EshtarekError::unauthorized(
                "Invalid authorization header format. Expected: Bearer <token>",
            )
        })?;

        if token.trim().is_empty() {
            return Err(EshtarekError::unauthorized("Empty bearer token"));
        }

        Ok(token.trim().to_string())
    }

    /// True when the request carries any Authorization header.
    pub fn is_present(parts: &Parts) -> bool {
        parts.headers.contains_key(header::AUTHORIZATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_valid_bearer() {
        assert_eq!(TokenExtractor::from_header(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
    }

    #[test]
    fn test_missing_or_malformed_header() {
        assert!(TokenExtractor::from_header(&parts(None)).is_err());
        assert!(TokenExtractor::from_header(&parts(Some("Basic dXNlcg=="))).is_err());
        assert!(TokenExtractor::from_header(&parts(Some("Bearer "))).is_err());
        assert!(!TokenExtractor::is_present(&parts(None)));
    }
}
