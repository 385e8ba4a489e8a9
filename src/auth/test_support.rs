//! Fixtures for unit tests

use chrono::{DateTime, Utc};

use super::challenge::{Challenge, ChallengeStats, ChallengeStore, ConsumeOutcome, StoreError};
use super::crypto::{address_from_verifying_key, eip191_hash};
use super::siwe::SiweMessage;
use crate::users::{Account, UserDirectory, UserStats};

#[path = "../../tests/support/wallet.rs"]
mod wallet;

#[path = "../../tests/support/broken_store.rs"]
mod broken_store;

pub use broken_store::BrokenStore;
pub use wallet::TestWallet;

pub fn sign_in_message(
    domain: &str,
    address: &str,
    chain_id: u64,
    nonce: &str,
    issued_at: DateTime<Utc>,
) -> SiweMessage {
    SiweMessage {
        scheme: None,
        domain: domain.to_string(),
        address: address.to_string(),
        statement: Some("Sign in with Ethereum to the app.".to_string()),
        uri: format!("https://{domain}"),
        version: "1".to_string(),
        chain_id,
        nonce: nonce.to_string(),
        issued_at,
        expiration_time: None,
        not_before: None,
        request_id: None,
        resources: Vec::new(),
    }
}
