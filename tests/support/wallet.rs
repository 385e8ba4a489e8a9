//! Deterministic wallet shared by the unit and integration test suites
//!
//! Included by path; the including module brings the crypto helpers into scope.

use k256::ecdsa::SigningKey;

use super::{address_from_verifying_key, eip191_hash};

/// Deterministic secp256k1 wallet
pub struct TestWallet {
    key: SigningKey,
    pub address: String,
}

impl TestWallet {
    pub fn from_seed(seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed.max(1); 32]).expect("valid secret key");
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    /// `personal_sign` over `message`, hex encoded with `0x` and a 27/28 `v`
    pub fn sign(&self, message: &str) -> String {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&eip191_hash(message))
            .expect("signing succeeds");
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }
}
