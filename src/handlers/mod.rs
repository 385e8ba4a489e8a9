//! API handlers

pub mod auth;
mod health;

pub use health::{health_check, HealthResponse};

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::AuthenticatedUser;
