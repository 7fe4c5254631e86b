use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 201 Created response with a Location header
#[derive(Debug)]
pub struct CreatedResponse<T: Serialize> {
    pub data: T,
    pub location: String,
}

impl<T: Serialize> CreatedResponse<T> {
    pub fn new(data: T, location: impl Into<String>) -> Self {
        Self {
            data,
            location: location.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for CreatedResponse<T> {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::CREATED, Json(self.data)).into_response();
        match HeaderValue::from_str(&self.location) {
            Ok(location) => {
                response.headers_mut().insert(header::LOCATION, location);
            }
            Err(_) => {
                tracing::warn!(location = %self.location, "Invalid Location header value in CreatedResponse");
            }
        }
        response
    }
}

/// 204 No Content response
#[derive(Debug, Clone, Copy)]
pub struct NoContentResponse;

impl IntoResponse for NoContentResponse {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}
