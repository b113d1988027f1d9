//! Revocation lookups
//!
//! Tokens carry an optional `revocation_id`; the denylist itself lives
//! elsewhere. [`MemoryRevocationList`] is an in-process implementation for
//! single-instance deployments and tests. Its entries are lost on restart.

use crate::token::Token;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::RwLock;
use tracing::info;

/// Denylist lookup keyed by revocation id
pub trait RevocationList: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn is_revoked(&self, revocation_id: &str) -> Result<bool, Self::Error>;
}

/// Check a token against a denylist
///
/// Tokens without a revocation id cannot be revoked and always pass.
pub fn is_token_revoked<R>(token: &Token, list: &R) -> Result<bool, R::Error>
where
    R: RevocationList + ?Sized,
{
    match token.revocation_id() {
        Some(id) => list.is_revoked(id),
        None => Ok(false),
    }
}

/// In-memory denylist
#[derive(Debug, Default)]
pub struct MemoryRevocationList {
    /// revocation id -> reason
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke every token carrying `revocation_id`
    pub fn revoke(&self, revocation_id: impl Into<String>, reason: impl Into<String>) {
        let revocation_id = revocation_id.into();
        let reason = reason.into();
        info!(revocation_id = %revocation_id, reason = %reason, "Revoking tokens");
        self.write().insert(revocation_id, reason);
    }

    /// Lift a revocation; returns false if the id was not revoked
    pub fn reinstate(&self, revocation_id: &str) -> bool {
        self.write().remove(revocation_id).is_some()
    }

    pub fn reason(&self, revocation_id: &str) -> Option<String> {
        self.read().get(revocation_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A poisoned lock still holds a consistent map; entries are only ever
    // inserted or removed whole.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl RevocationList for MemoryRevocationList {
    type Error = Infallible;

    fn is_revoked(&self, revocation_id: &str) -> Result<bool, Infallible> {
        Ok(self.read().contains_key(revocation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoke_and_reinstate() {
        let list = MemoryRevocationList::new();
        assert!(!list.is_revoked("rev-1").unwrap());

        list.revoke("rev-1", "key compromised");
        assert!(list.is_revoked("rev-1").unwrap());
        assert_eq!(list.reason("rev-1").as_deref(), Some("key compromised"));
        assert_eq!(list.len(), 1);

        assert!(list.reinstate("rev-1"));
        assert!(!list.reinstate("rev-1"));
        assert!(!list.is_revoked("rev-1").unwrap());
        assert!(list.is_empty());
    }

    #[test]
    fn test_token_without_revocation_id_passes() {
        let list = MemoryRevocationList::new();
        list.revoke("rev-1", "test");

        let token = crate::token::tests::token(&["brain:read"], &[], None);
        assert!(!is_token_revoked(&token, &list).unwrap());
    }
}
