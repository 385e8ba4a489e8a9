//! Route definitions

mod auth;

pub use auth::auth_routes;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::middleware::request_tracing;
use crate::state::AppState;

/// Assemble the full application router
pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(auth_routes(state.clone()))
        .with_state(state)
        .layer(axum::middleware::from_fn(request_tracing))
        .layer(cors)
}
