//! HTTP response types and the RouteModule trait for organizing routes.

pub mod response;
pub mod routes;

pub use response::{CreatedResponse, NoContentResponse};
pub use routes::RouteModule;
