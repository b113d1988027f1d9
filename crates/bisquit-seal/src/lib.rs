//! # Bisquit Seal
//!
//! Ed25519 signing for bisquit tokens. [`SealCodec`] implements
//! [`bisquit_core::TokenCodec`], turning a token into an opaque base64url
//! string that only a holder of a trusted public key can open.
//!
//! ```
//! use bisquit_core::{MintRequest, TokenBuilder, TokenCodec};
//! use bisquit_seal::SealCodec;
//!
//! let issuer = SealCodec::generate("gateway-1");
//! let verifier = SealCodec::generate("worker-1").with_trusted(issuer.public_key());
//!
//! let token = TokenBuilder::new()
//!     .mint_root(MintRequest::new("pro").permissions(["brain:read"]))
//!     .unwrap();
//! let wire = issuer.serialize(&token).unwrap();
//!
//! assert_eq!(verifier.parse(&wire).unwrap(), token);
//! ```

pub mod codec;
pub mod error;
pub mod keys;

pub use codec::SealCodec;
pub use error::{Result, SealError};
pub use keys::{KeyPair, PublicKey, SerializablePublicKey};
