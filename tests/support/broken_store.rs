//! Storage that never succeeds, for outage and timeout paths
//!
//! Included by path; the including module brings the store contracts into scope.

use async_trait::async_trait;

use super::{
    Account, Challenge, ChallengeStats, ChallengeStore, ConsumeOutcome, StoreError, UserDirectory,
    UserStats,
};

/// Every call fails at once, or never answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenStore {
    Unavailable,
    Stalled,
}

impl BrokenStore {
    async fn fail<T>(&self) -> Result<T, StoreError> {
        match self {
            BrokenStore::Unavailable => Err(StoreError::Unavailable(
                "connection refused".to_string(),
            )),
            BrokenStore::Stalled => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ChallengeStore for BrokenStore {
    async fn create(&self) -> Result<Challenge, StoreError> {
        self.fail().await
    }

    async fn consume(&self, _value: &str) -> Result<ConsumeOutcome, StoreError> {
        self.fail().await
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.fail().await
    }

    async fn stats(&self) -> Result<ChallengeStats, StoreError> {
        self.fail().await
    }
}

#[async_trait]
impl UserDirectory for BrokenStore {
    async fn record_login(&self, _address: &str) -> Result<Account, StoreError> {
        self.fail().await
    }

    async fn find_by_address(&self, _address: &str) -> Result<Option<Account>, StoreError> {
        self.fail().await
    }

    async fn stats(&self) -> Result<UserStats, StoreError> {
        self.fail().await
    }
}
