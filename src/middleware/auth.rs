use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, utils::Claims};

/// Caller identity for write routes.
///
/// With `auth_required` off this always succeeds with `None`; otherwise the
/// request must carry a valid `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Option<Claims>);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.config.auth_required {
            return Ok(AuthUser(None));
        }
        let authenticator = state.authenticator.as_ref().ok_or_else(|| {
            AppError::Internal("authentication required but JWT_SECRET is not set".into())
        })?;

        let bearer = parts
            .headers
            .typed_get::<Authorization<Bearer>>()
            .ok_or_else(|| AppError::Unauthorized("No authorization header".into()))?;

        let claims = authenticator.verify(bearer.token()).map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized("Invalid token".into())
        })?;

        parts.extensions.insert(claims.clone());
        Ok(AuthUser(Some(claims)))
    }
}
