//! Request scenarios against a router, without binding a socket.
//!
//! ```rust,ignore
//! let world = TestWorld::new().await;
//! let token = world.token(&world.acme_admin);
//!
//! world
//!     .post("/api/billing/1/pay/")
//!     .bearer_token(&token)
//!     .idempotency_key("k-1")
//!     .json_body(&serde_json::json!({}))
//!     .execute()
//!     .await
//!     .assert_ok()
//!     .assert_header("Idempotent-Replayed", "true");
//! ```

use crate::billing::IDEMPOTENCY_KEY_HEADER;
use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, StatusCode, header},
    response::Response,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tower::ServiceExt;

/// One request against a router.
pub struct Scenario {
    app: Router,
    request: Request<Body>,
}

impl Scenario {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            request: Request::builder()
                .method(Method::GET)
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        *self.request.method_mut() = method;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        *self.request.uri_mut() = uri.parse().unwrap();
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.request
            .headers_mut()
            .insert(HeaderName::from_bytes(key.as_bytes()).unwrap(), value.parse().unwrap());
        self
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.header("Authorization", &format!("Bearer {}", token))
    }

    pub fn idempotency_key(self, key: &str) -> Self {
        self.header(IDEMPOTENCY_KEY_HEADER, key)
    }

    pub fn json_body<T: Serialize>(mut self, body: &T) -> Self {
        let json = serde_json::to_string(body).unwrap();
        *self.request.body_mut() = Body::from(json);
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self
    }

    /// Raw body sent as JSON, for malformed payloads.
    pub fn raw_json(mut self, body: impl Into<String>) -> Self {
        *self.request.body_mut() = Body::from(body.into());
        self.request
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        self
    }

    pub async fn execute(self) -> ScenarioAssert {
        let response = self.app.oneshot(self.request).await.unwrap();
        ScenarioAssert { response }
    }
}

/// Assertions on a scenario's response.
pub struct ScenarioAssert {
    response: Response,
}

impl ScenarioAssert {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn assert_status(self, expected: StatusCode) -> Self {
        assert_eq!(
            self.response.status(),
            expected,
            "Expected status {}, got {}",
            expected,
            self.response.status()
        );
        self
    }

    pub fn assert_ok(self) -> Self {
        self.assert_status(StatusCode::OK)
    }

    pub fn assert_created(self) -> Self {
        self.assert_status(StatusCode::CREATED)
    }

    pub fn assert_no_content(self) -> Self {
        self.assert_status(StatusCode::NO_CONTENT)
    }

    pub fn assert_bad_request(self) -> Self {
        self.assert_status(StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(self) -> Self {
        self.assert_status(StatusCode::UNAUTHORIZED)
    }

    pub fn assert_payment_required(self) -> Self {
        self.assert_status(StatusCode::PAYMENT_REQUIRED)
    }

    pub fn assert_forbidden(self) -> Self {
        self.assert_status(StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(self) -> Self {
        self.assert_status(StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(self) -> Self {
        self.assert_status(StatusCode::CONFLICT)
    }

    pub fn assert_header(self, key: &str, expected: &str) -> Self {
        let value = self
            .response
            .headers()
            .get(key)
            .unwrap_or_else(|| panic!("Header '{}' not found", key))
            .to_str()
            .unwrap();
        assert_eq!(value, expected, "Header '{}' value mismatch", key);
        self
    }

    pub fn assert_no_header(self, key: &str) -> Self {
        assert!(
            self.response.headers().get(key).is_none(),
            "Header '{}' should be absent",
            key
        );
        self
    }

    pub async fn body_bytes(self) -> Vec<u8> {
        axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn json<T: DeserializeOwned>(self) -> T {
        let bytes = self.body_bytes().await;
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    }

    /// Assert a dotted path (`invoice.status`, `payments.0.source`) equals
    /// `expected`, keeping the body for further checks.
    pub async fn assert_json_path(self, path: &str, expected: Value) -> Self {
        let (json, response) = self.take_json().await;
        let actual = json_path_get(&json, path).unwrap_or_else(|| panic!("Path '{}' not found in {}", path, json));
        assert_eq!(actual, &expected, "JSON path '{}' value mismatch", path);
        response
    }

    /// Assert the error body carries a message for `field`.
    pub async fn assert_field_error(self, field: &str) -> Self {
        let (json, response) = self.take_json().await;
        let messages = json
            .get("field_errors")
            .and_then(|f| f.get(field))
            .unwrap_or_else(|| panic!("No field error for '{}' in {}", field, json));
        assert!(
            messages.as_array().is_some_and(|m| !m.is_empty()),
            "Empty field error for '{}'",
            field
        );
        response
    }

    async fn take_json(self) -> (Value, Self) {
        let status = self.response.status();
        let headers = self.response.headers().clone();
        let bytes = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        (json, Self { response })
    }

    pub fn response(self) -> Response {
        self.response
    }
}

/// Dotted path lookup; numeric parts index arrays.
fn json_path_get<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = json;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}

pub fn get(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::GET).uri(uri)
}

pub fn post(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::POST).uri(uri)
}

pub fn put(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::PUT).uri(uri)
}

pub fn delete(app: Router, uri: &str) -> Scenario {
    Scenario::new(app).method(Method::DELETE).uri(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, http::HeaderMap, routing};
    use serde_json::json;

    async fn receipt() -> Json<Value> {
        Json(json!({"invoice": {"status": "paid", "payments": [{"source": "direct"}]}}))
    }

    async fn echo_key(headers: HeaderMap) -> String {
        headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/receipt", routing::get(receipt))
            .route("/key", routing::post(echo_key))
    }

    #[tokio::test]
    async fn test_json_path_keeps_body() {
        get(app(), "/receipt")
            .execute()
            .await
            .assert_ok()
            .assert_json_path("invoice.status", json!("paid"))
            .await
            .assert_json_path("invoice.payments.0.source", json!("direct"))
            .await
            .assert_ok();
    }

    #[tokio::test]
    async fn test_idempotency_key_header_is_sent() {
        let body = post(app(), "/key")
            .idempotency_key("subpay-1-x")
            .execute()
            .await
            .assert_ok()
            .body_bytes()
            .await;
        assert_eq!(body, b"subpay-1-x");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        get(app(), "/missing").execute().await.assert_not_found();
    }

    #[test]
    fn test_json_path_get() {
        let value = json!({"a": [{"b": 1}]});
        assert_eq!(json_path_get(&value, "a.0.b"), Some(&json!(1)));
        assert_eq!(json_path_get(&value, "a.1.b"), None);
    }
}
