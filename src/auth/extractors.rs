use super::principal::Principal;
use super::token::TokenExtractor;
use crate::app::AppContext;
use crate::error::EshtarekError;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Axum extractor for authenticated callers
///
/// Rejects the request with 401 when the bearer token is missing, invalid,
/// expired, or belongs to a user that no longer exists.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(State(ctx): State<AppContext>, CurrentUser(principal): CurrentUser) -> Result<Json<Profile>> {
///     Ok(Json(ctx.accounts.me(&principal).await?))
/// }
/// ```
pub struct CurrentUser(pub Principal);

impl FromRequestParts<AppContext> for CurrentUser {
    type Rejection = EshtarekError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        let token = TokenExtractor::from_header(parts)?;
        let claims = ctx.jwt.verify_access(&token)?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| EshtarekError::unauthorized("Malformed token subject"))?;

        let principal = ctx.accounts.principal(user_id).await?;
        Ok(CurrentUser(principal))
    }
}

/// Axum extractor for optional authentication
///
/// Yields `None` for anonymous callers and for credentials that fail
/// verification; never rejects.
pub struct OptionalUser(pub Option<Principal>);

impl FromRequestParts<AppContext> for OptionalUser {
    type Rejection = EshtarekError;

    async fn from_request_parts(parts: &mut Parts, ctx: &AppContext) -> Result<Self, Self::Rejection> {
        if !TokenExtractor::is_present(parts) {
            return Ok(OptionalUser(None));
        }

        match CurrentUser::from_request_parts(parts, ctx).await {
            Ok(CurrentUser(principal)) => Ok(OptionalUser(Some(principal))),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid credentials on optional route");
                Ok(OptionalUser(None))
            }
        }
    }
}
