//! Session token minting and validation
//!
//! Sessions are HS256 JWTs whose only identity claim is the account address.
//! Expiry is fixed at mint time and checked against the injected clock.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;

/// Default session lifetime (24 hours)
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

/// JWT-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// JWT claims for session tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (checksummed account address)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Mints and validates session tokens
///
/// The signing key is derived once from the configured secret and shared by
/// every request.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock after the signature passes
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a session token for `address`
    pub fn mint(&self, address: &str) -> Result<String, JwtError> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| JwtError::EncodingFailed("Session expiry out of range".to_string()))?;
        let claims = Claims {
            sub: address.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify a token's signature, then its expiry
    ///
    /// # Returns
    /// * `Ok(Claims)` if the token is authentic and unexpired
    /// * `Err(JwtError::InvalidToken)` for forged, corrupted or malformed tokens
    /// * `Err(JwtError::TokenExpired)` once `now > exp`
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        let claims = token_data.claims;
        if self.clock.now().timestamp() > claims.exp {
            return Err(JwtError::TokenExpired);
        }

        Ok(claims)
    }
}
