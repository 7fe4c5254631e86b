use crate::error::{EshtarekError, Result};
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body extractor that runs `Validate` before the handler sees the value.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = EshtarekError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> EshtarekError {
    EshtarekError::bad_request(format!("Invalid JSON: {}", rejection.body_text()))
}
