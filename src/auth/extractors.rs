use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;

use crate::{
    auth::{claims::SessionClaims, cookie::read_session_cookie, jwt::JwtKeys},
    error::AppError,
};

/// Verified dashboard session, taken from the bearer header or the session cookie.
pub struct AuthUser(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|auth| {
                auth.strip_prefix("Bearer ")
                    .or_else(|| auth.strip_prefix("bearer "))
                    .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))
            })
            .transpose()?;

        let token = bearer
            .or_else(|| read_session_cookie(&parts.headers))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                warn!(error = %e, "invalid or expired session token");
                Err(AppError::Unauthorized("Invalid or expired session".into()))
            }
        }
    }
}
