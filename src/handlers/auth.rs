//! Authentication HTTP handlers
//!
//! Endpoints for sign-in-with-Ethereum authentication.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AuthenticatedUser;
use crate::auth::{AuthStats, SessionStatus};
use crate::error::ApiResult;
use crate::middleware::{extract_token, AUTH_COOKIE};
use crate::state::AppState;
use crate::users::Account;

#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// Request body for signature verification
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    /// Full EIP-4361 message text as signed by the wallet
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    /// 65-byte hex signature
    #[validate(length(min = 1, message = "signature must not be empty"))]
    pub signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub token: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Account>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Profile view of the session's wallet
///
/// Timestamps are absent when the directory holds no row for the address.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Profile {
    fn for_session(address: &str, account: Option<Account>) -> Self {
        match account {
            Some(account) => Self {
                address: account.address,
                created_at: Some(account.created_at),
                last_login_at: Some(account.last_login_at),
            },
            None => Self {
                address: address.to_string(),
                created_at: None,
                last_login_at: None,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: Profile,
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = state.auth_service.session_ttl().num_seconds();
    let same_site = if state.cookie_secure {
        SameSite::None
    } else {
        SameSite::Lax
    };

    Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.cookie_secure)
        .same_site(same_site)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// POST /auth/nonce - Issue a single-use sign-in nonce
pub async fn request_nonce(State(state): State<AppState>) -> ApiResult<Json<NonceResponse>> {
    let nonce = state.auth_service.request_challenge().await?;

    Ok(Json(NonceResponse { nonce }))
}

/// POST /auth/verify - Verify a signed sign-in message and start a session
///
/// Verification runs on its own task so a client disconnect cannot abandon a
/// login whose nonce has already been consumed.
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<(CookieJar, Json<VerifyResponse>)> {
    req.validate()?;

    let auth_service = state.auth_service.clone();
    let outcome = tokio::spawn(async move {
        auth_service
            .complete_authentication(&req.message, &req.signature)
            .await
    })
    .await??;

    let jar = jar.add(session_cookie(&state, outcome.token.clone()));

    Ok((
        jar,
        Json(VerifyResponse {
            token: outcome.token,
            address: outcome.address,
        }),
    ))
}

/// GET /auth/session - Report whether the caller holds a valid session
///
/// Never fails on a bad token; an invalid session is reported as unauthenticated.
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    let status = match extract_token(&headers) {
        Some(token) => state.auth_service.check_session(&token),
        None => SessionStatus::Unauthenticated,
    };

    let SessionStatus::Authenticated { address } = status else {
        return Json(SessionResponse {
            authenticated: false,
            address: None,
            user: None,
        });
    };

    let user = match state.auth_service.account(&address).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load account for session");
            None
        }
    };

    Json(SessionResponse {
        authenticated: true,
        address: Some(address),
        user,
    })
}

/// POST /auth/logout - End the current session
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    state.auth_service.logout(&user.address);

    let jar = jar.remove(Cookie::build(AUTH_COOKIE).path("/"));

    (jar, Json(LogoutResponse { success: true }))
}

/// GET /auth/me - Get the account behind the current session
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<MeResponse>> {
    let account = state.auth_service.account(&user.address).await?;

    Ok(Json(MeResponse {
        user: Profile::for_session(&user.address, account),
    }))
}

/// GET /auth/stats - Account and nonce counters
pub async fn stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> ApiResult<Json<AuthStats>> {
    Ok(Json(state.auth_service.stats().await?))
}
