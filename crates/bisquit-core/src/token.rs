//! Capability tokens
//!
//! A [`Token`] is minted once by a root issuer and then only ever narrowed.
//! Values are immutable: every attenuation produces a new token, and the
//! fields are readable but not writable outside this crate.
//!
//! Two scoping rules are easy to get wrong:
//!
//! - An **empty** `allowed_tenants` set means *all tenants* (administrative
//!   scope), not *no tenants*.
//! - A token with no `expires_at` never expires; revocation through
//!   `revocation_id` is the only way to cut it short.

use crate::error::{BisquitError, Result};
use crate::permission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capability-based authorization credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawToken")]
pub struct Token {
    token_id: String,

    permissions: BTreeSet<String>,

    /// Empty means unrestricted
    #[serde(default)]
    allowed_tenants: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    revocation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    agent_id: Option<String>,

    namespace: String,

    issued_at: DateTime<Utc>,

    /// Token this one was attenuated from (None for roots)
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_token_id: Option<String>,

    /// 0 for a root token
    #[serde(default)]
    depth: u32,
}

/// Unvalidated wire shape; converted through [`Token::try_from`]
#[derive(Deserialize)]
struct RawToken {
    token_id: String,
    permissions: BTreeSet<String>,
    #[serde(default)]
    allowed_tenants: BTreeSet<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    revocation_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    namespace: String,
    issued_at: DateTime<Utc>,
    #[serde(default)]
    parent_token_id: Option<String>,
    #[serde(default)]
    depth: u32,
}

impl TryFrom<RawToken> for Token {
    type Error = BisquitError;

    /// Decoded tokens must look like something the builder could have minted:
    /// concrete permissions, and a depth that agrees with the parent link.
    fn try_from(raw: RawToken) -> Result<Self> {
        permission::validate_all(&raw.permissions)?;

        match (raw.depth, raw.parent_token_id.is_some()) {
            (0, true) => {
                return Err(BisquitError::Serialization(format!(
                    "token {} has a parent but depth 0",
                    raw.token_id
                )))
            }
            (depth, false) if depth > 0 => {
                return Err(BisquitError::Serialization(format!(
                    "token {} has depth {} but no parent",
                    raw.token_id, depth
                )))
            }
            _ => {}
        }

        Ok(Self {
            token_id: raw.token_id,
            permissions: raw.permissions,
            allowed_tenants: raw.allowed_tenants,
            expires_at: raw.expires_at,
            revocation_id: raw.revocation_id,
            user_id: raw.user_id,
            agent_id: raw.agent_id,
            namespace: raw.namespace,
            issued_at: raw.issued_at,
            parent_token_id: raw.parent_token_id,
            depth: raw.depth,
        })
    }
}

/// Field values for a new token; assembled by the builder
#[derive(Debug, Clone)]
pub(crate) struct TokenParts {
    pub permissions: BTreeSet<String>,
    pub allowed_tenants: BTreeSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revocation_id: Option<String>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub namespace: String,
    pub issued_at: DateTime<Utc>,
    pub parent_token_id: Option<String>,
    pub depth: u32,
}

impl Token {
    pub(crate) fn from_parts(parts: TokenParts) -> Self {
        Self {
            token_id: uuid::Uuid::new_v4().to_string(),
            permissions: parts.permissions,
            allowed_tenants: parts.allowed_tenants,
            expires_at: parts.expires_at,
            revocation_id: parts.revocation_id,
            user_id: parts.user_id,
            agent_id: parts.agent_id,
            namespace: parts.namespace,
            issued_at: parts.issued_at,
            parent_token_id: parts.parent_token_id,
            depth: parts.depth,
        }
    }

    /// Get the unique token identifier
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Get the granted permissions
    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Get the tenant scope (empty means all tenants)
    pub fn allowed_tenants(&self) -> &BTreeSet<String> {
        &self.allowed_tenants
    }

    /// Get the expiry instant, if any
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Get the id under which this token can be revoked
    pub fn revocation_id(&self) -> Option<&str> {
        self.revocation_id.as_deref()
    }

    /// Get the user the token acts for
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Get the agent holding the token
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    /// Get the namespace the root was minted in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the issue instant
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get the id of the token this one was attenuated from
    pub fn parent_token_id(&self) -> Option<&str> {
        self.parent_token_id.as_deref()
    }

    /// Get the number of attenuation steps from the root
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// True for tokens minted directly by a root issuer
    pub fn is_root(&self) -> bool {
        self.depth == 0 && self.parent_token_id.is_none()
    }

    /// Exact membership; no wildcard expansion
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// True if the token may act within `tenant_id`
    ///
    /// An empty tenant set is administrative scope and admits every tenant.
    pub fn can_access_tenant(&self, tenant_id: &str) -> bool {
        self.allowed_tenants.is_empty() || self.allowed_tenants.contains(tenant_id)
    }

    /// True for administrative (all-tenant) scope
    pub fn is_unrestricted(&self) -> bool {
        self.allowed_tenants.is_empty()
    }

    /// True once `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if now >= exp)
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
