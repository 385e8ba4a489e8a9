//! Shared fixtures for integration tests

#![allow(dead_code)]

use axum::Router;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use siwe_auth_server::auth::crypto::{address_from_verifying_key, eip191_hash};
use siwe_auth_server::auth::{
    AuthService, AuthSettings, Challenge, ChallengeStats, ChallengeStore, ConsumeOutcome,
    InMemoryChallengeStore, StoreError,
};
use siwe_auth_server::clock::ManualClock;
use siwe_auth_server::routes;
use siwe_auth_server::state::AppState;
use siwe_auth_server::users::{Account, InMemoryUserDirectory, UserDirectory, UserStats};

#[path = "../support/wallet.rs"]
mod wallet;

#[path = "../support/broken_store.rs"]
mod broken_store;

pub use broken_store::BrokenStore;
pub use wallet::TestWallet;

pub const DOMAIN: &str = "localhost:3000";
pub const CHAIN_ID: u64 = 1;
pub const JWT_SECRET: &str = "integration-test-secret";
pub const SESSION_TTL_SECONDS: i64 = 3600;
pub const NONCE_TTL_SECONDS: i64 = 600;
pub const STORE_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(200);

/// EIP-4361 message text as a wallet would present it
pub fn sign_in_text(domain: &str, address: &str, nonce: &str, issued_at: DateTime<Utc>) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {address}\n\
         \n\
         Sign in to the test app.\n\
         \n\
         URI: https://{domain}/login\n\
         Version: 1\n\
         Chain ID: {CHAIN_ID}\n\
         Nonce: {nonce}\n\
         Issued At: {}",
        issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub users: Arc<InMemoryUserDirectory>,
}

pub fn test_app() -> TestApp {
    build_app(|clock| {
        let store: Arc<dyn ChallengeStore> = Arc::new(InMemoryChallengeStore::new(
            clock,
            Duration::seconds(NONCE_TTL_SECONDS),
        ));
        store
    })
}

/// App whose nonce storage is `challenges`; accounts stay in memory
pub fn test_app_with_challenges(challenges: Arc<dyn ChallengeStore>) -> TestApp {
    build_app(|_| challenges)
}

fn build_app<F>(challenges: F) -> TestApp
where
    F: FnOnce(Arc<ManualClock>) -> Arc<dyn ChallengeStore>,
{
    let clock = Arc::new(ManualClock::default());
    let challenges = challenges(clock.clone());
    let users = Arc::new(InMemoryUserDirectory::new(clock.clone()));

    let settings = AuthSettings {
        domain: DOMAIN.to_string(),
        chain_id: Some(CHAIN_ID),
        clock_skew: Duration::zero(),
        jwt_secret: JWT_SECRET.to_string(),
        session_ttl: Duration::seconds(SESSION_TTL_SECONDS),
        store_timeout: STORE_TIMEOUT,
    };
    let auth_service = Arc::new(AuthService::new(
        settings,
        challenges,
        users.clone(),
        clock.clone(),
    ));

    let router = routes::app_router(AppState::new(auth_service, false), CorsLayer::permissive());

    TestApp {
        router,
        clock,
        users,
    }
}
