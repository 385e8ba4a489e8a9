//! Challenge (nonce) lifecycle
//!
//! A challenge is created on request, consumed at most once, and purged once it
//! is consumed or older than the configured TTL.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::clock::Clock;

/// Default challenge lifetime (10 minutes)
pub const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 600;

/// Random bytes per nonce (256 bits)
const NONCE_BYTES: usize = 32;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage operation timed out")]
    Timeout,

    #[error("Challenge value collision")]
    Collision,
}

/// A stored challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
}

impl Challenge {
    /// Whether the challenge is past its TTL at `now`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// Result of an atomic consume attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    NotFound,
    AlreadyUsed,
    Expired,
}

/// Nonce counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChallengeStats {
    pub active_nonces: u64,
    pub used_nonces: u64,
}

/// Durable map from nonce value to its creation time and consumption flag
///
/// Implementations must make `consume` atomic: concurrent calls with the same
/// value yield exactly one `Consumed`.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Generate and persist a fresh, unconsumed challenge
    async fn create(&self) -> Result<Challenge, StoreError>;

    /// Atomically mark the challenge as used if it exists, is unused and is within TTL
    async fn consume(&self, value: &str) -> Result<ConsumeOutcome, StoreError>;

    /// Delete consumed and expired challenges, returning how many were removed
    async fn purge_expired(&self) -> Result<u64, StoreError>;

    async fn stats(&self) -> Result<ChallengeStats, StoreError>;
}

/// Generate a cryptographically secure nonce
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// In-process challenge store
///
/// Every mutation happens under one write lock, which makes `consume` a
/// check-and-set with no race window.
pub struct InMemoryChallengeStore {
    challenges: RwLock<HashMap<String, Challenge>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl InMemoryChallengeStore {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            challenges: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    /// Look up a challenge without consuming it
    pub async fn get(&self, value: &str) -> Option<Challenge> {
        self.challenges.read().await.get(value).cloned()
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn create(&self) -> Result<Challenge, StoreError> {
        let challenge = Challenge {
            value: generate_nonce(),
            created_at: self.clock.now(),
            consumed: false,
        };

        let mut challenges = self.challenges.write().await;
        if challenges.contains_key(&challenge.value) {
            return Err(StoreError::Collision);
        }
        challenges.insert(challenge.value.clone(), challenge.clone());

        Ok(challenge)
    }

    async fn consume(&self, value: &str) -> Result<ConsumeOutcome, StoreError> {
        let now = self.clock.now();
        let mut challenges = self.challenges.write().await;

        let Some(challenge) = challenges.get_mut(value) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if challenge.consumed {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }

        challenge.consumed = true;
        if challenge.is_expired(now, self.ttl) {
            return Ok(ConsumeOutcome::Expired);
        }

        Ok(ConsumeOutcome::Consumed)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = self.clock.now();
        // Blocks create/consume for the whole sweep; fine for the dev-only store
        let mut challenges = self.challenges.write().await;

        let before = challenges.len();
        challenges.retain(|_, c| !c.consumed && !c.is_expired(now, self.ttl));

        Ok((before - challenges.len()) as u64)
    }

    async fn stats(&self) -> Result<ChallengeStats, StoreError> {
        let challenges = self.challenges.read().await;
        let used_nonces = challenges.values().filter(|c| c.consumed).count() as u64;

        Ok(ChallengeStats {
            active_nonces: challenges.len() as u64 - used_nonces,
            used_nonces,
        })
    }
}

/// Issues challenges to clients
///
/// Only the opaque value leaves the server; creation time and state stay in
/// the store.
#[derive(Clone)]
pub struct ChallengeIssuer {
    store: Arc<dyn ChallengeStore>,
    timeout: std::time::Duration,
}

impl ChallengeIssuer {
    pub fn new(store: Arc<dyn ChallengeStore>, timeout: std::time::Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn issue(&self) -> Result<String, StoreError> {
        let challenge = with_timeout(self.timeout, self.store.create()).await?;
        Ok(challenge.value)
    }
}

/// Bound a store call by `timeout`
pub async fn with_timeout<T>(
    timeout: std::time::Duration,
    fut: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}
