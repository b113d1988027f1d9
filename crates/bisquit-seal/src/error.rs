//! Error types for token sealing

use thiserror::Error;

/// Result type for seal operations
pub type Result<T> = std::result::Result<T, SealError>;

/// Errors raised while sealing or opening a token
#[derive(Debug, Error)]
pub enum SealError {
    /// Sealed token names a key this codec does not trust
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    #[error("Sealed token has no key id")]
    MissingKeyId,

    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Sealed token has no payload")]
    MissingPayload,

    /// Signature did not verify against the named key
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Transport encoding (base64) is malformed
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("COSE error: {0}")]
    Cose(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ed25519_dalek::SignatureError> for SealError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        SealError::InvalidSignature(err.to_string())
    }
}

impl From<coset::CoseError> for SealError {
    fn from(err: coset::CoseError) -> Self {
        SealError::Cose(format!("{:?}", err))
    }
}

impl From<base64::DecodeError> for SealError {
    fn from(err: base64::DecodeError) -> Self {
        SealError::Encoding(err.to_string())
    }
}

impl SealError {
    /// True if the token was well formed but not signed by a trusted key
    pub fn is_forgery(&self) -> bool {
        matches!(self, SealError::UnknownKey(_) | SealError::InvalidSignature(_))
    }
}
