//! Sign-in-with-Ethereum authentication server
//!
//! Issues single-use nonces, verifies EIP-4361 messages signed by wallets
//! and mints JWT sessions for the recovered address.

pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod users;
