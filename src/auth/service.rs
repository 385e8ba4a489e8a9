//! Authentication service
//!
//! Composes challenge issuance, message verification, login recording and
//! session minting into the sign-in protocol operations.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;

use super::challenge::{with_timeout, ChallengeIssuer, ChallengeStats, ChallengeStore};
use super::error::AuthError;
use super::jwt::{Claims, SessionIssuer};
use super::verifier::MessageVerifier;
use crate::clock::Clock;
use crate::users::{Account, UserDirectory, UserStats};

/// Policy and secrets for the sign-in protocol
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Domain every sign-in message must be bound to
    pub domain: String,
    /// Chain id to enforce, if any
    pub chain_id: Option<u64>,
    pub clock_skew: Duration,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    /// Upper bound for every storage call
    pub store_timeout: std::time::Duration,
}

/// Successful sign-in
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub token: String,
    pub address: String,
    pub account: Account,
}

/// Result of a session check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated { address: String },
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthStats {
    pub users: UserStats,
    pub nonces: ChallengeStats,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    challenges: Arc<dyn ChallengeStore>,
    users: Arc<dyn UserDirectory>,
    issuer: ChallengeIssuer,
    verifier: MessageVerifier,
    sessions: SessionIssuer,
    domain: String,
    chain_id: Option<u64>,
    store_timeout: std::time::Duration,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        settings: AuthSettings,
        challenges: Arc<dyn ChallengeStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = ChallengeIssuer::new(challenges.clone(), settings.store_timeout);
        let verifier = MessageVerifier::new(
            challenges.clone(),
            clock.clone(),
            settings.clock_skew,
            settings.store_timeout,
        );
        let sessions = SessionIssuer::new(&settings.jwt_secret, settings.session_ttl, clock);

        Self {
            challenges,
            users,
            issuer,
            verifier,
            sessions,
            domain: settings.domain,
            chain_id: settings.chain_id,
            store_timeout: settings.store_timeout,
        }
    }

    /// Issue a fresh single-use nonce
    pub async fn request_challenge(&self) -> Result<String, AuthError> {
        let nonce = self.issuer.issue().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to issue nonce");
            AuthError::from(e)
        })?;

        tracing::debug!("Issued sign-in nonce");
        Ok(nonce)
    }

    /// Verify a signed sign-in message, record the login and mint a session
    ///
    /// On any verification failure nothing is recorded and no token is minted.
    pub async fn complete_authentication(
        &self,
        message: &str,
        signature: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let result = self.authenticate(message, signature).await;

        match &result {
            Ok(outcome) => {
                tracing::info!(address = %outcome.address, "Wallet authenticated");
            }
            Err(e) if e.is_server_fault() => {
                tracing::error!(reason = e.reason_code(), error = %e, "Authentication failed");
            }
            Err(e) => {
                tracing::warn!(reason = e.reason_code(), error = %e, "Authentication rejected");
            }
        }

        result
    }

    async fn authenticate(&self, message: &str, signature: &str) -> Result<AuthOutcome, AuthError> {
        let address = self
            .verifier
            .verify(message, signature, &self.domain, self.chain_id)
            .await?;

        let account = with_timeout(self.store_timeout, self.users.record_login(&address)).await?;
        let token = self.sessions.mint(&address)?;

        Ok(AuthOutcome {
            token,
            address,
            account,
        })
    }

    /// Validate a session token, reporting why it was rejected
    pub fn validate_session(&self, token: &str) -> Result<Claims, AuthError> {
        self.sessions.validate(token).map_err(AuthError::from)
    }

    /// Check a session token; an invalid session is a normal outcome
    pub fn check_session(&self, token: &str) -> SessionStatus {
        match self.validate_session(token) {
            Ok(claims) => SessionStatus::Authenticated {
                address: claims.sub,
            },
            Err(e) => {
                tracing::debug!(reason = e.reason_code(), "Session not authenticated");
                SessionStatus::Unauthenticated
            }
        }
    }

    /// Acknowledge a logout
    ///
    /// Tokens are self-contained, so there is nothing to revoke server-side;
    /// the transport drops its copy.
    pub fn logout(&self, address: &str) {
        tracing::info!(address = %address, "Wallet logged out");
    }

    pub async fn account(&self, address: &str) -> Result<Option<Account>, AuthError> {
        Ok(with_timeout(self.store_timeout, self.users.find_by_address(address)).await?)
    }

    pub async fn stats(&self) -> Result<AuthStats, AuthError> {
        let (users, nonces) = tokio::try_join!(
            with_timeout(self.store_timeout, self.users.stats()),
            with_timeout(self.store_timeout, self.challenges.stats()),
        )?;

        Ok(AuthStats { users, nonces })
    }

    /// Whether the backing stores answer within the store timeout
    pub async fn storage_healthy(&self) -> bool {
        with_timeout(self.store_timeout, self.challenges.stats())
            .await
            .is_ok()
    }

    pub fn session_ttl(&self) -> Duration {
        self.sessions.ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::challenge::{InMemoryChallengeStore, DEFAULT_CHALLENGE_TTL_SECONDS};
    use crate::auth::jwt::DEFAULT_SESSION_TTL_SECONDS;
    use crate::auth::test_support::{sign_in_message, BrokenStore, TestWallet};
    use crate::clock::ManualClock;
    use crate::users::InMemoryUserDirectory;

    const DOMAIN: &str = "localhost:3000";
    const CHAIN_ID: u64 = 1;

    struct Fixture {
        clock: Arc<ManualClock>,
        users: Arc<InMemoryUserDirectory>,
        service: AuthService,
        wallet: TestWallet,
    }

    fn settings() -> AuthSettings {
        AuthSettings {
            domain: DOMAIN.to_string(),
            chain_id: Some(CHAIN_ID),
            clock_skew: Duration::zero(),
            jwt_secret: "test-secret-key".to_string(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECONDS),
            store_timeout: std::time::Duration::from_millis(50),
        }
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let challenges = Arc::new(InMemoryChallengeStore::new(
            clock.clone(),
            Duration::seconds(DEFAULT_CHALLENGE_TTL_SECONDS),
        ));
        let users = Arc::new(InMemoryUserDirectory::new(clock.clone()));
        let service = AuthService::new(settings(), challenges, users.clone(), clock.clone());

        Fixture {
            clock,
            users,
            service,
            wallet: TestWallet::from_seed(5),
        }
    }

    impl Fixture {
        fn signed(&self, domain: &str, nonce: &str) -> (String, String) {
            let raw = sign_in_message(domain, &self.wallet.address, CHAIN_ID, nonce, self.clock.now())
                .to_string();
            let signature = self.wallet.sign(&raw);
            (raw, signature)
        }
    }

    #[tokio::test]
    async fn test_end_to_end_and_replay() {
        let f = fixture();
        let nonce = f.service.request_challenge().await.unwrap();
        let (message, signature) = f.signed(DOMAIN, &nonce);

        let outcome = f
            .service
            .complete_authentication(&message, &signature)
            .await
            .unwrap();
        assert_eq!(outcome.address, f.wallet.address);
        assert_eq!(outcome.account.address, f.wallet.address.to_lowercase());

        assert_eq!(
            f.service.check_session(&outcome.token),
            SessionStatus::Authenticated {
                address: f.wallet.address.clone()
            }
        );

        let replay = f
            .service
            .complete_authentication(&message, &signature)
            .await;
        assert_eq!(replay.unwrap_err(), AuthError::InvalidOrExpiredNonce);
    }

    #[tokio::test]
    async fn test_unknown_nonce_mints_nothing() {
        let f = fixture();
        let (message, signature) = f.signed(DOMAIN, "0123456789abcdef");

        let result = f.service.complete_authentication(&message, &signature).await;
        assert_eq!(result.unwrap_err(), AuthError::InvalidOrExpiredNonce);
        assert_eq!(f.users.stats().await.unwrap().total_users, 0);
    }

    #[tokio::test]
    async fn test_wrong_domain_burns_nonce() {
        let f = fixture();
        let nonce = f.service.request_challenge().await.unwrap();
        let (message, signature) = f.signed("phishing.example", &nonce);

        let result = f.service.complete_authentication(&message, &signature).await;
        assert!(matches!(result, Err(AuthError::WrongDomain { .. })));

        let (message, signature) = f.signed(DOMAIN, &nonce);
        let retry = f.service.complete_authentication(&message, &signature).await;
        assert_eq!(retry.unwrap_err(), AuthError::InvalidOrExpiredNonce);
        assert_eq!(f.users.stats().await.unwrap().total_users, 0);
    }

    #[tokio::test]
    async fn test_session_expires() {
        let f = fixture();
        let nonce = f.service.request_challenge().await.unwrap();
        let (message, signature) = f.signed(DOMAIN, &nonce);
        let outcome = f
            .service
            .complete_authentication(&message, &signature)
            .await
            .unwrap();

        f.clock
            .advance(Duration::seconds(DEFAULT_SESSION_TTL_SECONDS + 1));
        assert_eq!(
            f.service.validate_session(&outcome.token),
            Err(AuthError::ExpiredToken)
        );
        assert_eq!(
            f.service.check_session(&outcome.token),
            SessionStatus::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_check_session_garbage() {
        let f = fixture();
        assert_eq!(
            f.service.check_session("not-a-token"),
            SessionStatus::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_stats_and_account() {
        let f = fixture();
        let nonce = f.service.request_challenge().await.unwrap();
        f.service.request_challenge().await.unwrap();
        let (message, signature) = f.signed(DOMAIN, &nonce);
        f.service
            .complete_authentication(&message, &signature)
            .await
            .unwrap();

        let stats = f.service.stats().await.unwrap();
        assert_eq!(stats.users.total_users, 1);
        assert_eq!(stats.users.active_today, 1);
        assert_eq!(stats.nonces.active_nonces, 1);
        assert_eq!(stats.nonces.used_nonces, 1);

        let account = f.service.account(&f.wallet.address).await.unwrap();
        assert!(account.is_some());
        assert!(f.service.storage_healthy().await);
    }

    #[tokio::test]
    async fn test_nonce_store_outage() {
        let clock = Arc::new(ManualClock::default());
        let service = AuthService::new(
            settings(),
            Arc::new(BrokenStore::Unavailable),
            Arc::new(InMemoryUserDirectory::new(clock.clone())),
            clock,
        );

        assert!(matches!(
            service.request_challenge().await,
            Err(AuthError::StorageUnavailable(_))
        ));
        assert!(!service.storage_healthy().await);
        assert!(service.stats().await.is_err());
    }

    #[tokio::test]
    async fn test_stalled_login_record_mints_nothing() {
        let clock = Arc::new(ManualClock::default());
        let challenges = Arc::new(InMemoryChallengeStore::new(
            clock.clone(),
            Duration::seconds(DEFAULT_CHALLENGE_TTL_SECONDS),
        ));
        let service = AuthService::new(
            settings(),
            challenges.clone(),
            Arc::new(BrokenStore::Stalled),
            clock.clone(),
        );
        let wallet = TestWallet::from_seed(6);

        let nonce = service.request_challenge().await.unwrap();
        let raw = sign_in_message(DOMAIN, &wallet.address, CHAIN_ID, &nonce, clock.now()).to_string();
        let result = service
            .complete_authentication(&raw, &wallet.sign(&raw))
            .await;

        assert!(matches!(result, Err(AuthError::StorageUnavailable(_))));
        // The nonce is spent even though the login was never recorded
        assert_eq!(challenges.get(&nonce).await.map(|c| c.consumed), Some(true));
    }
}
