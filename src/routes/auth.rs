//! Authentication routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::middleware::require_session;
use crate::state::AppState;

/// Create authentication routes
///
/// Logout, profile and stats sit behind the session guard.
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/stats", get(auth::stats))
        .route_layer(middleware::from_fn_with_state(state, require_session));

    Router::new()
        .route("/auth/nonce", post(auth::request_nonce))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/session", get(auth::session))
        .merge(protected)
}
