//! Sign-in message verification
//!
//! Checks the message fields against policy, consumes the embedded nonce and
//! recovers the signer. A parseable message always burns its nonce, even when
//! a later check fails, so a rejected message can never be replayed.

use chrono::Duration;
use std::sync::Arc;

use super::challenge::{with_timeout, ChallengeStore, ConsumeOutcome};
use super::crypto::recover_address;
use super::error::AuthError;
use super::siwe::SiweMessage;
use crate::clock::Clock;

#[derive(Clone)]
pub struct MessageVerifier {
    store: Arc<dyn ChallengeStore>,
    clock: Arc<dyn Clock>,
    clock_skew: Duration,
    store_timeout: std::time::Duration,
}

impl MessageVerifier {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        clock: Arc<dyn Clock>,
        clock_skew: Duration,
        store_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            clock,
            clock_skew,
            store_timeout,
        }
    }

    /// Verify a signed sign-in message and return the signer's checksummed address
    ///
    /// Field checks run in order (domain, expiration, not-before, chain); the
    /// first failure is reported, but only after the nonce has been consumed.
    pub async fn verify(
        &self,
        raw_message: &str,
        signature: &str,
        expected_domain: &str,
        expected_chain_id: Option<u64>,
    ) -> Result<String, AuthError> {
        let message = raw_message
            .parse::<SiweMessage>()
            .map_err(|e| AuthError::MalformedMessage(e.to_string()))?;

        let field_check = self.check_fields(&message, expected_domain, expected_chain_id);

        let outcome = with_timeout(self.store_timeout, self.store.consume(&message.nonce)).await?;
        field_check?;
        if outcome != ConsumeOutcome::Consumed {
            tracing::debug!(outcome = ?outcome, "Nonce rejected");
            return Err(AuthError::InvalidOrExpiredNonce);
        }

        let recovered =
            recover_address(raw_message, signature).map_err(|_| AuthError::SignatureMismatch)?;
        if !recovered.eq_ignore_ascii_case(&message.address) {
            return Err(AuthError::SignatureMismatch);
        }

        Ok(recovered)
    }

    fn check_fields(
        &self,
        message: &SiweMessage,
        expected_domain: &str,
        expected_chain_id: Option<u64>,
    ) -> Result<(), AuthError> {
        let now = self.clock.now();

        if message.domain != expected_domain {
            return Err(AuthError::WrongDomain {
                expected: expected_domain.to_string(),
                actual: message.domain.clone(),
            });
        }

        // A bound pushed past the representable range by the skew never trips
        if let Some(expiration_time) = message.expiration_time {
            let deadline = expiration_time.checked_add_signed(self.clock_skew);
            if matches!(deadline, Some(deadline) if now > deadline) {
                return Err(AuthError::ExpiredMessage);
            }
        }

        if let Some(not_before) = message.not_before {
            let earliest = not_before.checked_sub_signed(self.clock_skew);
            if matches!(earliest, Some(earliest) if now < earliest) {
                return Err(AuthError::MessageNotYetValid);
            }
        }

        if let Some(expected) = expected_chain_id {
            if message.chain_id != expected {
                return Err(AuthError::WrongChain {
                    expected,
                    actual: message.chain_id,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::challenge::{InMemoryChallengeStore, DEFAULT_CHALLENGE_TTL_SECONDS};
    use crate::auth::test_support::{sign_in_message, BrokenStore, TestWallet};
    use crate::clock::ManualClock;

    const DOMAIN: &str = "app.example.com";
    const CHAIN_ID: u64 = 11155111;

    struct Fixture {
        store: Arc<InMemoryChallengeStore>,
        clock: Arc<ManualClock>,
        verifier: MessageVerifier,
        wallet: TestWallet,
    }

    fn fixture(clock_skew: Duration) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(InMemoryChallengeStore::new(
            clock.clone(),
            Duration::seconds(DEFAULT_CHALLENGE_TTL_SECONDS),
        ));
        let verifier = MessageVerifier::new(
            store.clone(),
            clock.clone(),
            clock_skew,
            std::time::Duration::from_secs(1),
        );
        Fixture {
            store,
            clock,
            verifier,
            wallet: TestWallet::from_seed(3),
        }
    }

    impl Fixture {
        async fn nonce(&self) -> String {
            self.store.create().await.unwrap().value
        }

        fn message(&self, nonce: &str) -> SiweMessage {
            sign_in_message(DOMAIN, &self.wallet.address, CHAIN_ID, nonce, self.clock.now())
        }

        async fn verify(&self, message: &SiweMessage) -> Result<String, AuthError> {
            let raw = message.to_string();
            let signature = self.wallet.sign(&raw);
            self.verifier
                .verify(&raw, &signature, DOMAIN, Some(CHAIN_ID))
                .await
        }

        async fn nonce_consumed(&self, nonce: &str) -> bool {
            self.store.get(nonce).await.map(|c| c.consumed).unwrap_or(false)
        }
    }

    #[tokio::test]
    async fn test_valid_message() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;

        let address = f.verify(&f.message(&nonce)).await.unwrap();
        assert_eq!(address, f.wallet.address);
        assert!(f.nonce_consumed(&nonce).await);
    }

    #[tokio::test]
    async fn test_lowercase_declared_address() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.address = message.address.to_lowercase();

        // The checksummed form is returned regardless of the declared casing
        assert_eq!(f.verify(&message).await.unwrap(), f.wallet.address);
    }

    #[tokio::test]
    async fn test_malformed_message() {
        let f = fixture(Duration::zero());
        let result = f
            .verifier
            .verify("hello", "0x00", DOMAIN, Some(CHAIN_ID))
            .await;
        assert!(matches!(result, Err(AuthError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn test_wrong_domain_still_consumes_nonce() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.domain = "evil.example.com".to_string();

        assert!(matches!(
            f.verify(&message).await,
            Err(AuthError::WrongDomain { .. })
        ));
        assert!(f.nonce_consumed(&nonce).await);

        // Replaying with the right domain cannot reuse the nonce
        assert_eq!(
            f.verify(&f.message(&nonce)).await,
            Err(AuthError::InvalidOrExpiredNonce)
        );
    }

    #[tokio::test]
    async fn test_expired_message() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.expiration_time = Some(f.clock.now() - Duration::seconds(1));

        assert_eq!(f.verify(&message).await, Err(AuthError::ExpiredMessage));
        assert!(f.nonce_consumed(&nonce).await);
    }

    #[tokio::test]
    async fn test_not_yet_valid_message() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.not_before = Some(f.clock.now() + Duration::seconds(30));

        assert_eq!(f.verify(&message).await, Err(AuthError::MessageNotYetValid));
    }

    #[tokio::test]
    async fn test_clock_skew_tolerance() {
        let f = fixture(Duration::seconds(60));
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.not_before = Some(f.clock.now() + Duration::seconds(30));
        message.expiration_time = Some(f.clock.now() - Duration::seconds(30));

        assert!(f.verify(&message).await.is_ok());
    }

    #[tokio::test]
    async fn test_oversized_clock_skew_does_not_overflow() {
        let f = fixture(Duration::seconds(100_000_000_000_000));
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.not_before = Some(f.clock.now() + Duration::seconds(30));
        message.expiration_time = Some(f.clock.now() - Duration::seconds(30));

        assert_eq!(f.verify(&message).await, Ok(f.wallet.address.clone()));
    }

    #[tokio::test]
    async fn test_field_checks_reported_in_order() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.expiration_time = Some(f.clock.now() - Duration::seconds(1));
        message.chain_id = 1;

        assert_eq!(f.verify(&message).await, Err(AuthError::ExpiredMessage));
    }

    #[tokio::test]
    async fn test_wrong_chain() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.chain_id = 1;

        assert_eq!(
            f.verify(&message).await,
            Err(AuthError::WrongChain {
                expected: CHAIN_ID,
                actual: 1
            })
        );
    }

    #[tokio::test]
    async fn test_chain_not_enforced() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let mut message = f.message(&nonce);
        message.chain_id = 137;
        let raw = message.to_string();

        let result = f
            .verifier
            .verify(&raw, &f.wallet.sign(&raw), DOMAIN, None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_nonce() {
        let f = fixture(Duration::zero());
        let message = f.message("neverissued1234");

        assert_eq!(
            f.verify(&message).await,
            Err(AuthError::InvalidOrExpiredNonce)
        );
    }

    #[tokio::test]
    async fn test_expired_nonce() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        f.clock
            .advance(Duration::seconds(DEFAULT_CHALLENGE_TTL_SECONDS + 1));

        assert_eq!(
            f.verify(&f.message(&nonce)).await,
            Err(AuthError::InvalidOrExpiredNonce)
        );
    }

    #[tokio::test]
    async fn test_signature_from_other_key() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let raw = f.message(&nonce).to_string();
        let impostor = TestWallet::from_seed(9);

        let result = f
            .verifier
            .verify(&raw, &impostor.sign(&raw), DOMAIN, Some(CHAIN_ID))
            .await;
        assert_eq!(result, Err(AuthError::SignatureMismatch));
        assert!(f.nonce_consumed(&nonce).await);
    }

    #[tokio::test]
    async fn test_garbage_signature() {
        let f = fixture(Duration::zero());
        let nonce = f.nonce().await;
        let raw = f.message(&nonce).to_string();

        let result = f
            .verifier
            .verify(&raw, "0xdeadbeef", DOMAIN, Some(CHAIN_ID))
            .await;
        assert_eq!(result, Err(AuthError::SignatureMismatch));
    }

    #[tokio::test]
    async fn test_storage_failure_outranks_field_failures() {
        let f = fixture(Duration::zero());
        let mut message = f.message("0123456789abcdef");
        message.domain = "evil.example.com".to_string();
        let raw = message.to_string();
        let signature = f.wallet.sign(&raw);

        for store in [BrokenStore::Unavailable, BrokenStore::Stalled] {
            let verifier = MessageVerifier::new(
                Arc::new(store),
                f.clock.clone(),
                Duration::zero(),
                std::time::Duration::from_millis(20),
            );

            let result = verifier
                .verify(&raw, &signature, DOMAIN, Some(CHAIN_ID))
                .await;
            assert!(
                matches!(result, Err(AuthError::StorageUnavailable(_))),
                "{store:?} gave {result:?}"
            );
        }
    }
}
