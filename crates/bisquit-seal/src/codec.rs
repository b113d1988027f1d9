//! COSE_Sign1 token codec
//!
//! A sealed token is the token's JSON form, signed with Ed25519 inside a
//! COSE_Sign1 structure, CBOR-encoded and then base64url-encoded (no padding)
//! so it fits in headers and query strings.
//!
//! The protected header carries the algorithm and the issuer's key id. Parsing
//! looks the key id up among the trusted keys; a token naming an unknown key
//! is rejected before any signature work is done.

use crate::error::{Result, SealError};
use crate::keys::{KeyPair, PublicKey};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bisquit_core::{Token, TokenCodec};
use coset::{iana, CborSerializable, CoseSign1, CoseSign1Builder, HeaderBuilder};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

const EDDSA_ALG: iana::Algorithm = iana::Algorithm::EdDSA;

/// Signs tokens with one key and opens tokens signed by any trusted key
pub struct SealCodec {
    signing_key: KeyPair,
    trusted: RwLock<HashMap<String, PublicKey>>,
}

impl std::fmt::Debug for SealCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealCodec")
            .field("kid", &self.signing_key.kid())
            .field("trusted", &self.trusted_kids())
            .finish()
    }
}

impl SealCodec {
    /// Create a codec; its own public key is trusted automatically
    pub fn new(signing_key: KeyPair) -> Self {
        let public = signing_key.public_key();
        let mut trusted = HashMap::new();
        trusted.insert(public.kid().to_string(), public);

        info!(kid = %signing_key.kid(), "Seal codec initialized");

        Self {
            signing_key,
            trusted: RwLock::new(trusted),
        }
    }

    /// Create a codec with a freshly generated key
    pub fn generate(kid: impl Into<String>) -> Self {
        Self::new(KeyPair::generate(kid))
    }

    pub fn kid(&self) -> &str {
        self.signing_key.kid()
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.public_key()
    }

    /// Accept tokens signed by `key`, replacing any key with the same id
    pub fn trust(&self, key: PublicKey) {
        info!(kid = %key.kid(), "Trusting issuer key");
        self.write().insert(key.kid().to_string(), key);
    }

    /// Builder-style [`SealCodec::trust`]
    pub fn with_trusted(self, key: PublicKey) -> Self {
        self.trust(key);
        self
    }

    /// Stop accepting tokens signed by `kid`. Returns whether it was trusted.
    pub fn distrust(&self, kid: &str) -> bool {
        let removed = self.write().remove(kid).is_some();
        if removed {
            info!(kid = %kid, "Removed issuer key");
        }
        removed
    }

    pub fn is_trusted(&self, kid: &str) -> bool {
        self.read().contains_key(kid)
    }

    /// Trusted key ids in sorted order
    pub fn trusted_kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.read().keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Seal a token into a COSE_Sign1 structure
    pub fn seal(&self, token: &Token) -> Result<CoseSign1> {
        let payload = serde_json::to_vec(token)?;

        let protected = HeaderBuilder::new()
            .algorithm(EDDSA_ALG)
            .key_id(self.kid().as_bytes().to_vec())
            .build();

        let signed = CoseSign1Builder::new()
            .protected(protected)
            .payload(payload)
            .try_create_signature(&[], |data| Ok::<_, SealError>(self.signing_key.sign(data)))?;

        debug!(token_id = %token.token_id(), kid = %self.kid(), "Sealed token");
        Ok(signed.build())
    }

    /// Verify a COSE_Sign1 structure and extract its token
    pub fn open(&self, cose: &CoseSign1) -> Result<Token> {
        let header = &cose.protected.header;
        if header.alg != Some(coset::RegisteredLabelWithPrivate::Assigned(EDDSA_ALG)) {
            return Err(SealError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        if header.key_id.is_empty() {
            return Err(SealError::MissingKeyId);
        }
        let kid = String::from_utf8_lossy(&header.key_id).to_string();

        let key = self.read().get(&kid).cloned().ok_or_else(|| {
            warn!(kid = %kid, "SECURITY: Token sealed with untrusted key");
            SealError::UnknownKey(kid.clone())
        })?;

        key.verify(&cose.tbs_data(&[]), &cose.signature).map_err(|e| {
            warn!(kid = %kid, error = %e, "SECURITY: Token signature verification failed");
            e
        })?;

        let payload = cose.payload.as_deref().ok_or(SealError::MissingPayload)?;
        let token: Token = serde_json::from_slice(payload)?;

        debug!(token_id = %token.token_id(), kid = %kid, "Opened sealed token");
        Ok(token)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, PublicKey>> {
        self.trusted.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, PublicKey>> {
        self.trusted.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl TokenCodec for SealCodec {
    type Error = SealError;

    fn serialize(&self, token: &Token) -> Result<String> {
        let bytes = self.seal(token)?.to_vec()?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    fn parse(&self, encoded: &str) -> Result<Token> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim())?;
        let cose = CoseSign1::from_slice(&bytes)?;
        self.open(&cose)
    }
}
