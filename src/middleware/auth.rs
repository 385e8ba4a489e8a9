//! Authentication middleware
//!
//! Session token extraction, the `require_session` route guard and
//! extractors for the authenticated wallet.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::ApiError;

/// Name of the cookie carrying the session token
pub const AUTH_COOKIE: &str = "auth-token";

/// Wallet identity attached to requests that passed the session guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// EIP-55 checksummed address from the token subject
    pub address: String,
}

/// Pull the session token from the request
///
/// A bearer `Authorization` header wins over the `auth-token` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    CookieJar::from_headers(headers)
        .get(AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

fn authenticate(
    auth_service: &AuthService,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let token = extract_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Session token required".to_string()))?;

    let claims = auth_service.validate_session(&token).map_err(|e| {
        tracing::debug!(reason = e.reason_code(), "Session token rejected");
        ApiError::from(e)
    })?;

    Ok(AuthenticatedUser {
        address: claims.sub,
    })
}

/// Route guard for protected endpoints
///
/// Validates the session token and attaches [`AuthenticatedUser`] to the
/// request extensions, or answers `401` with the standard error body.
pub async fn require_session(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&auth_service, request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extractor for authenticated users
///
/// Reads the identity attached by [`require_session`], validating the token
/// itself when the route is not guarded.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", user.address)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let auth_service = Arc::<AuthService>::from_ref(state);
        authenticate(&auth_service, &parts.headers)
    }
}
