use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use subtle::ConstantTimeEq;

use crate::{config::AppConfig, error::ApiError};

/// AdminAuth
///
/// Proof that the request carried the configured admin token. Taking it as a
/// handler argument (or through `admin_middleware`) is the whole authorization
/// story for the admin routes: there are no users or roles, only the one
/// shared secret.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

/// Extracts `<token>` from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Constant-time token comparison. An empty token never matches, even an
/// empty secret.
pub fn token_matches(presented: &str, expected: &str) -> bool {
    if presented.is_empty() || expected.is_empty() {
        return false;
    }
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// AdminAuth Extractor Implementation
///
/// Rejects with `ApiError::Unauthorized` (401) when the header is missing,
/// lacks the `Bearer ` prefix, or the token differs from `AppConfig::admin_token`.
impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;

        if token_matches(token, &config.admin_token) {
            Ok(AdminAuth)
        } else {
            tracing::warn!(uri = %parts.uri, "Rejected admin request with invalid token");
            Err(ApiError::Unauthorized)
        }
    }
}
