//! Ethereum signature verification
//!
//! Recovers the signer of an EIP-191 `personal_sign` signature and derives
//! EIP-55 checksummed account addresses from secp256k1 public keys.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

/// Errors that can occur during signature recovery
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid address format: {0}")]
    InvalidAddressFormat(String),

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("Public key recovery failed")]
    RecoveryFailed,
}

/// Length of an `r || s || v` signature
const SIGNATURE_LEN: usize = 65;

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Hash a message the way `personal_sign` does:
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let prefixed = format!("\x19Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

/// Recover the EIP-55 address that produced `signature_hex` over `message`
///
/// # Arguments
/// * `message` - The exact text that was signed
/// * `signature_hex` - 65-byte `r || s || v` signature, hex encoded, optional `0x` prefix
///
/// # Returns
/// * `Ok(address)` with the checksummed signer address
/// * `Err(CryptoError)` if the signature cannot be decoded or recovered
pub fn recover_address(message: &str, signature_hex: &str) -> Result<String, CryptoError> {
    let trimmed = signature_hex.trim();
    let sig_bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    if sig_bytes.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignatureFormat(format!(
            "Expected {} bytes, got {}",
            SIGNATURE_LEN,
            sig_bytes.len()
        )));
    }

    let (rs, v) = sig_bytes.split_at(64);
    let is_y_odd = match v[0] {
        0 | 27 => false,
        1 | 28 => true,
        other => return Err(CryptoError::InvalidRecoveryId(other)),
    };

    let signature = Signature::from_slice(rs)
        .map_err(|e| CryptoError::InvalidSignatureFormat(e.to_string()))?;

    // Wallets may emit high-s signatures; flipping s flips the y parity
    let (signature, is_y_odd) = match signature.normalize_s() {
        Some(normalized) => (normalized, !is_y_odd),
        None => (signature, is_y_odd),
    };

    let digest = eip191_hash(message);
    let verifying_key =
        VerifyingKey::recover_from_prehash(&digest, &signature, RecoveryId::new(is_y_odd, false))
            .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_verifying_key(&verifying_key))
}

/// Derive the checksummed account address of a public key
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = keccak256(&encoded.as_bytes()[1..]);
    checksum_encode(&hash[12..])
}

/// Validate address shape and, for mixed-case input, its EIP-55 checksum
///
/// All-lowercase and all-uppercase addresses carry no checksum and are accepted.
pub fn validate_address(address: &str) -> Result<(), CryptoError> {
    let bytes = decode_address(address)?;
    let body = &address[2..];

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksum_encode(&bytes) != address {
        return Err(CryptoError::InvalidChecksum);
    }

    Ok(())
}

fn decode_address(address: &str) -> Result<[u8; 20], CryptoError> {
    let body = address.strip_prefix("0x").ok_or_else(|| {
        CryptoError::InvalidAddressFormat("Addresses must start with '0x'".to_string())
    })?;

    if body.len() != 40 {
        return Err(CryptoError::InvalidAddressFormat(format!(
            "Expected 40 hex characters, got {}",
            body.len()
        )));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(body, &mut bytes)
        .map_err(|e| CryptoError::InvalidAddressFormat(e.to_string()))?;
    Ok(bytes)
}

fn checksum_encode(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}
