//! Token wire codec
//!
//! Tokens never cross a trust boundary as plain structs. A codec turns a
//! token into an opaque string (normally signed) and back. The signing scheme
//! belongs to the codec; see the `bisquit-seal` crate for an Ed25519 one.

use crate::token::Token;

/// Opaque string encoding for tokens
pub trait TokenCodec: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Encode a token for transport
    fn serialize(&self, token: &Token) -> Result<String, Self::Error>;

    /// Decode and authenticate a transported token
    fn parse(&self, encoded: &str) -> Result<Token, Self::Error>;
}
