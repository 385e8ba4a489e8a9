//! Authentication protocol errors

use thiserror::Error;

use super::challenge::StoreError;
use super::jwt::JwtError;

/// Auth service errors
///
/// Everything but storage and issuance faults is a client fault, reported
/// outward as a uniform authentication failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed sign-in message: {0}")]
    MalformedMessage(String),

    #[error("Sign-in message has expired")]
    ExpiredMessage,

    #[error("Sign-in message is not yet valid")]
    MessageNotYetValid,

    #[error("Domain mismatch: expected {expected}, got {actual}")]
    WrongDomain { expected: String, actual: String },

    #[error("Chain mismatch: expected {expected}, got {actual}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("Invalid or expired nonce")]
    InvalidOrExpiredNonce,

    #[error("Signature does not match the declared address")]
    SignatureMismatch,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Token issuance failed: {0}")]
    TokenIssuance(String),
}

impl AuthError {
    /// Stable reason code for logs
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::MalformedMessage(_) => "MALFORMED_MESSAGE",
            AuthError::ExpiredMessage => "EXPIRED_MESSAGE",
            AuthError::MessageNotYetValid => "MESSAGE_NOT_YET_VALID",
            AuthError::WrongDomain { .. } => "WRONG_DOMAIN",
            AuthError::WrongChain { .. } => "WRONG_CHAIN",
            AuthError::InvalidOrExpiredNonce => "INVALID_OR_EXPIRED_NONCE",
            AuthError::SignatureMismatch => "SIGNATURE_MISMATCH",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            AuthError::TokenIssuance(_) => "TOKEN_ISSUANCE",
        }
    }

    /// Whether the failure is on the server side and a retry may succeed
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            AuthError::StorageUnavailable(_) | AuthError::TokenIssuance(_)
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::StorageUnavailable(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::TokenExpired => AuthError::ExpiredToken,
            JwtError::InvalidToken(_) => AuthError::InvalidToken,
            JwtError::EncodingFailed(msg) => AuthError::TokenIssuance(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(
            AuthError::InvalidOrExpiredNonce.reason_code(),
            "INVALID_OR_EXPIRED_NONCE"
        );
        assert_eq!(
            AuthError::WrongDomain {
                expected: "a".into(),
                actual: "b".into()
            }
            .reason_code(),
            "WRONG_DOMAIN"
        );
        assert_eq!(AuthError::SignatureMismatch.reason_code(), "SIGNATURE_MISMATCH");
    }

    #[test]
    fn test_server_fault_classification() {
        assert!(AuthError::StorageUnavailable("down".into()).is_server_fault());
        assert!(!AuthError::SignatureMismatch.is_server_fault());
        assert!(!AuthError::ExpiredToken.is_server_fault());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(
            AuthError::from(JwtError::TokenExpired),
            AuthError::ExpiredToken
        );
        assert_eq!(
            AuthError::from(JwtError::InvalidToken("bad".into())),
            AuthError::InvalidToken
        );
        assert!(matches!(
            AuthError::from(StoreError::Timeout),
            AuthError::StorageUnavailable(_)
        ));
    }
}
