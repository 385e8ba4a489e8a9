//! Authentication module
//!
//! Provides sign-in-with-Ethereum authentication for wallet holders.
//! - Single-use challenge nonces with TTL and periodic purge
//! - EIP-4361 message parsing and EIP-191 signature recovery
//! - JWT session minting and validation

mod challenge;
pub mod crypto;
mod error;
mod jwt;
mod purge;
mod service;
pub mod siwe;
mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use challenge::{
    generate_nonce, with_timeout, Challenge, ChallengeIssuer, ChallengeStats, ChallengeStore,
    ConsumeOutcome, InMemoryChallengeStore, StoreError, DEFAULT_CHALLENGE_TTL_SECONDS,
};
pub use error::AuthError;
pub use jwt::{Claims, JwtError, SessionIssuer, DEFAULT_SESSION_TTL_SECONDS};
pub use purge::{PurgeTask, DEFAULT_PURGE_INTERVAL_SECONDS};
pub use service::{AuthOutcome, AuthService, AuthSettings, AuthStats, SessionStatus};
pub use siwe::SiweMessage;
pub use verifier::MessageVerifier;
