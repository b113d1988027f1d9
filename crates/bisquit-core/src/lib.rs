//! # Bisquit Core
//!
//! Provenance envelopes and attenuation-only capability tokens.
//!
//! ## Key Concepts
//!
//! - **Envelope**: a payload with an append-only trail of `actor:action` labels
//! - **Token**: a capability credential scoped by permissions, tenants and expiry
//! - **Attenuation**: deriving a child token that can only do less than its parent
//! - **Namespace**: an access tier capping what a root token may be minted with
//!
//! ## Invariants
//!
//! 1. **Provenance**: labels are only ever appended; merges concatenate trails in order
//! 2. **Attenuation**: child permissions ⊆ parent, child tenants ⊆ parent, child expiry ≤ parent
//! 3. **Fail-closed**: a missing or mismatched token reference, or an expired token, denies access
//!
//! ## Example
//!
//! ```
//! use bisquit_core::{access, AttenuationRequest, Envelope, MintRequest, TokenBuilder};
//! use serde_json::json;
//!
//! let builder = TokenBuilder::new();
//! let root = builder
//!     .mint_root(MintRequest::new("pro").permissions(["brain:read", "brain:write"]))
//!     .unwrap();
//! let reader = builder
//!     .attenuate(&root, AttenuationRequest::new(["brain:read"]).agent_id("summarizer"))
//!     .unwrap();
//!
//! let envelope = Envelope::new(json!({ "text": "hello" }), ["connector:web"])
//!     .unwrap()
//!     .trace("transformer:ner")
//!     .unwrap()
//!     .sign_with(&reader);
//!
//! assert!(access::check_access(&envelope, &reader, "brain:read"));
//! assert!(!access::check_access(&envelope, &reader, "brain:write"));
//! assert!(!access::check_access(&envelope, &root, "brain:read"));
//! ```

pub mod access;
pub mod builder;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod permission;
pub mod pipeline;
pub mod profile;
pub mod revocation;
pub mod token;

pub use builder::{AttenuationRequest, MintRequest, TokenBuilder};
pub use codec::TokenCodec;
pub use config::{BuilderConfig, OverRequestPolicy};
pub use envelope::{Envelope, EnvelopeBuilder, MERGE_LABEL};
pub use error::{BisquitError, ErrorClass, Result};
pub use pipeline::{Pipeline, Stage, StageRegistry, StageUpdate};
pub use profile::{NamespaceProfile, ProfileSource, StaticProfiles};
pub use revocation::{MemoryRevocationList, RevocationList};
pub use token::{Clock, FixedClock, SystemClock, Token};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
