//! Ed25519 signing keys
//!
//! - `KeyPair`: private key held by a token issuer
//! - `PublicKey`: verifying half, distributed to every service that parses tokens
//! - `SerializablePublicKey`: base64 form of a public key for config files

use crate::error::{Result, SealError};
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Ed25519 key pair for sealing tokens
#[derive(Clone)]
pub struct KeyPair {
    kid: String,
    signing_key: SigningKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate(kid: impl Into<String>) -> Self {
        Self::from_signing_key(kid, SigningKey::generate(&mut OsRng))
    }

    pub fn from_signing_key(kid: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            kid: kid.into(),
            signing_key,
        }
    }

    /// Restore a key pair from its 32 secret bytes
    pub fn from_bytes(kid: impl Into<String>, bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(kid, SigningKey::from_bytes(bytes))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            kid: self.kid.clone(),
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub(crate) fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.signing_key.sign(data).to_bytes().to_vec()
    }
}

/// Ed25519 public key for opening sealed tokens
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    kid: String,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey").field("kid", &self.kid).finish()
    }
}

impl PublicKey {
    pub fn from_bytes(kid: impl Into<String>, bytes: &[u8; 32]) -> Result<Self> {
        let verifying_key =
            VerifyingKey::from_bytes(bytes).map_err(|e| SealError::InvalidKey(e.to_string()))?;
        Ok(Self {
            kid: kid.into(),
            verifying_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Check an Ed25519 signature over `data`
    pub(crate) fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| SealError::InvalidSignature("Invalid signature length".into()))?;
        let signature = Signature::from_bytes(&bytes);
        self.verifying_key.verify(data, &signature)?;
        Ok(())
    }
}

/// Public key in transportable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializablePublicKey {
    pub kid: String,
    /// Base64-encoded key bytes
    pub key: String,
}

impl From<&PublicKey> for SerializablePublicKey {
    fn from(pk: &PublicKey) -> Self {
        Self {
            kid: pk.kid.clone(),
            key: STANDARD.encode(pk.to_bytes()),
        }
    }
}

impl TryFrom<SerializablePublicKey> for PublicKey {
    type Error = SealError;

    fn try_from(spk: SerializablePublicKey) -> Result<Self> {
        let bytes = STANDARD.decode(&spk.key)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SealError::InvalidKey("Invalid key length".into()))?;
        PublicKey::from_bytes(spk.kid, &bytes)
    }
}
