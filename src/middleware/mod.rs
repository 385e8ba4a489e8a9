//! HTTP middleware
//!
//! Request tracing and session guards for protected routes.

pub mod auth;
mod tracing;

pub use auth::{extract_token, require_session, AuthenticatedUser, AUTH_COOKIE};
pub use tracing::{request_tracing, REQUEST_ID_HEADER};
