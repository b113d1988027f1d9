//! Token minting and attenuation
//!
//! [`TokenBuilder`] is the only way to produce a [`Token`]:
//!
//! - [`TokenBuilder::mint_root`] runs at a trust boundary and caps the
//!   request with the caller's namespace profile.
//! - [`TokenBuilder::attenuate`] derives a child for a downstream service.
//!   The child never holds more permissions, more tenants or a later expiry
//!   than its parent.

use crate::access;
use crate::config::{BuilderConfig, OverRequestPolicy};
use crate::error::{BisquitError, Result};
use crate::permission;
use crate::profile::{ProfileSource, StaticProfiles};
use crate::revocation::RevocationList;
use crate::token::{Clock, SystemClock, Token, TokenParts};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request for a root token
///
/// # Example
///
/// ```
/// use bisquit_core::{MintRequest, TokenBuilder};
///
/// let builder = TokenBuilder::new();
/// let token = builder
///     .mint_root(
///         MintRequest::new("pro")
///             .permissions(["brain:read"])
///             .tenants(["acme"])
///             .user_id("alice")
///             .ttl(chrono::Duration::minutes(15)),
///     )
///     .unwrap();
///
/// assert!(token.has_permission("brain:read"));
/// assert!(token.can_access_tenant("acme"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintRequest {
    /// Requested permissions; empty means the namespace defaults
    pub permissions: BTreeSet<String>,
    pub ttl: Option<Duration>,
    /// Empty means all tenants
    pub allowed_tenants: BTreeSet<String>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub namespace: String,
    pub revocation_id: Option<String>,
}

impl MintRequest {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permission::set(permissions);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tenants<I, S>(mut self, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tenants = permission::set(tenants);
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn revocation_id(mut self, revocation_id: impl Into<String>) -> Self {
        self.revocation_id = Some(revocation_id.into());
        self
    }
}

/// Request for a child token
///
/// `user_id`, `namespace` and `revocation_id` always come from the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttenuationRequest {
    pub permissions: BTreeSet<String>,
    /// Shortens the parent's expiry, never extends it
    pub ttl: Option<Duration>,
    /// Sub-agent now acting; the parent's when unset
    pub agent_id: Option<String>,
    /// Narrower tenant scope; inherited when unset
    pub tenants: Option<BTreeSet<String>>,
}

impl AttenuationRequest {
    pub fn new<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permission::set(permissions),
            ..Self::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn tenants<I, S>(mut self, tenants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tenants = Some(permission::set(tenants));
        self
    }
}

/// Mints, attenuates and verifies tokens
pub struct TokenBuilder<P = StaticProfiles> {
    profiles: P,
    config: BuilderConfig,
    clock: Arc<dyn Clock>,
}

impl TokenBuilder<StaticProfiles> {
    /// Builder with default settings and the built-in tiers
    pub fn new() -> Self {
        Self::from_config(BuilderConfig::default())
    }

    /// Builder using the profiles in `config` (or the built-in tiers)
    pub fn from_config(config: BuilderConfig) -> Self {
        let profiles = config.profiles();
        Self::with_profiles(profiles, config)
    }
}

impl Default for TokenBuilder<StaticProfiles> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProfileSource> TokenBuilder<P> {
    /// Builder with an external profile source
    ///
    /// `config.profiles` is ignored; namespaces resolve through `profiles`.
    pub fn with_profiles(profiles: P, config: BuilderConfig) -> Self {
        Self {
            profiles,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Mint a root token
    ///
    /// Requested permissions must be concrete `domain:action` strings and
    /// must fall within the namespace profile. What happens to the rest
    /// depends on [`OverRequestPolicy`]:
    ///
    /// - `Reject` (default): the mint fails and lists the offenders.
    /// - `Truncate`: the offenders are dropped. If that drops everything, the
    ///   mint fails anyway.
    pub fn mint_root(&self, request: MintRequest) -> Result<Token> {
        let now = self.now();
        let namespace = request.namespace;

        let profile = self
            .profiles
            .profile(&namespace)
            .map_err(BisquitError::collaborator)?
            .ok_or_else(|| {
                warn!(namespace = %namespace, "SECURITY: Mint for unknown namespace");
                BisquitError::UnknownNamespace(namespace.clone())
            })?;

        let mut permissions = if request.permissions.is_empty() {
            profile.defaults.clone()
        } else {
            request.permissions
        };
        if permissions.is_empty() {
            return Err(BisquitError::InvalidPermission(format!(
                "no permissions requested and namespace '{}' has no defaults",
                namespace
            )));
        }
        permission::validate_all(&permissions)?;

        let excess = permission::uncovered(&permissions, &profile.allowed);
        if !excess.is_empty() {
            match self.config.over_request_policy {
                OverRequestPolicy::Reject => {
                    warn!(
                        namespace = %namespace,
                        excess = ?excess,
                        "SECURITY: Mint request exceeds namespace profile"
                    );
                    return Err(BisquitError::ProfileExceeded {
                        namespace,
                        permissions: excess,
                    });
                }
                OverRequestPolicy::Truncate => {
                    warn!(
                        namespace = %namespace,
                        dropped = ?excess,
                        "Truncating mint request to namespace profile"
                    );
                    for perm in &excess {
                        permissions.remove(perm);
                    }
                    if permissions.is_empty() {
                        return Err(BisquitError::ProfileExceeded {
                            namespace,
                            permissions: excess,
                        });
                    }
                }
            }
        }

        let ttl = match request.ttl {
            Some(ttl) => Some(ttl),
            None => self.config.default_ttl()?,
        };
        let expires_at = match ttl {
            Some(ttl) => Some(expiry(now, ttl)?),
            None => None,
        };

        let token = Token::from_parts(TokenParts {
            permissions,
            allowed_tenants: request.allowed_tenants,
            expires_at,
            revocation_id: request.revocation_id,
            user_id: request.user_id,
            agent_id: request.agent_id,
            namespace,
            issued_at: now,
            parent_token_id: None,
            depth: 0,
        });

        info!(
            token_id = %token.token_id(),
            namespace = %token.namespace(),
            permissions = ?token.permissions(),
            tenants = ?token.allowed_tenants(),
            expires_at = ?token.expires_at(),
            user_id = ?token.user_id(),
            "Minted root token"
        );

        Ok(token)
    }

    /// Derive a narrower child token
    ///
    /// - permissions: `requested ∩ parent`. An empty result is an error.
    /// - tenants: the parent's, or a non-empty subset of them. Any explicit
    ///   set is accepted when the parent is unrestricted.
    /// - expiry: the earlier of the parent's and `now + ttl`
    pub fn attenuate(&self, parent: &Token, request: AttenuationRequest) -> Result<Token> {
        let now = self.now();

        if parent.is_expired(now) {
            warn!(
                token_id = %parent.token_id(),
                "SECURITY: Attenuation of expired token"
            );
            return Err(expired(parent));
        }

        let max = self.config.max_depth;
        let depth = match parent.depth().checked_add(1) {
            Some(depth) if depth <= max => depth,
            _ => {
                let depth = parent.depth().saturating_add(1);
                warn!(
                    token_id = %parent.token_id(),
                    depth,
                    max,
                    "SECURITY: Attenuation depth exceeded"
                );
                return Err(BisquitError::DepthExceeded { depth, max });
            }
        };

        let permissions: BTreeSet<String> = request
            .permissions
            .intersection(parent.permissions())
            .cloned()
            .collect();

        if permissions.len() < request.permissions.len() {
            let dropped: Vec<&String> = request.permissions.difference(parent.permissions()).collect();
            debug!(
                token_id = %parent.token_id(),
                dropped = ?dropped,
                "Dropping permissions not held by parent"
            );
        }

        if permissions.is_empty() {
            return Err(BisquitError::EmptyAttenuation {
                requested: request.permissions.into_iter().collect(),
                parent: parent.permissions().iter().cloned().collect(),
            });
        }

        let allowed_tenants = narrow_tenants(parent, request.tenants)?;

        let expires_at = match request.ttl {
            Some(ttl) => {
                let requested = expiry(now, ttl)?;
                Some(match parent.expires_at() {
                    Some(parent_exp) => parent_exp.min(requested),
                    None => requested,
                })
            }
            None => parent.expires_at(),
        };

        let token = Token::from_parts(TokenParts {
            permissions,
            allowed_tenants,
            expires_at,
            revocation_id: parent.revocation_id().map(str::to_string),
            user_id: parent.user_id().map(str::to_string),
            agent_id: request.agent_id.or_else(|| parent.agent_id().map(str::to_string)),
            namespace: parent.namespace().to_string(),
            issued_at: now,
            parent_token_id: Some(parent.token_id().to_string()),
            depth,
        });

        info!(
            token_id = %token.token_id(),
            parent_token_id = %parent.token_id(),
            depth,
            permissions = ?token.permissions(),
            agent_id = ?token.agent_id(),
            "Attenuated token"
        );

        Ok(token)
    }

    /// Fail unless the token is live and holds `permission`, using the builder's clock
    pub fn verify(&self, token: &Token, permission: &str) -> Result<()> {
        access::verify(token, permission, self.now())
    }

    /// [`verify`](Self::verify) plus a denylist lookup
    ///
    /// Lookup errors are returned unchanged inside [`BisquitError::Collaborator`].
    pub fn verify_with_revocation<R>(&self, token: &Token, permission: &str, list: &R) -> Result<()>
    where
        R: RevocationList + ?Sized,
    {
        access::verify_with_revocation(token, permission, self.now(), list)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    if ttl <= Duration::zero() {
        return Err(BisquitError::InvalidTtl(format!(
            "ttl must be positive, got {}s",
            ttl.num_seconds()
        )));
    }
    now.checked_add_signed(ttl)
        .ok_or_else(|| BisquitError::InvalidTtl(format!("ttl out of range: {}s", ttl.num_seconds())))
}

fn expired(token: &Token) -> BisquitError {
    BisquitError::Expired {
        token_id: token.token_id().to_string(),
        expires_at: token
            .expires_at()
            .map(|exp| exp.to_rfc3339())
            .unwrap_or_default(),
    }
}

fn narrow_tenants(parent: &Token, requested: Option<BTreeSet<String>>) -> Result<BTreeSet<String>> {
    let Some(requested) = requested else {
        return Ok(parent.allowed_tenants().clone());
    };

    if parent.is_unrestricted() {
        return Ok(requested);
    }

    if requested.is_empty() {
        warn!(
            token_id = %parent.token_id(),
            "SECURITY: Attenuation requested unrestricted tenant scope"
        );
        return Err(BisquitError::TenantWidening(
            "cannot widen a scoped token to all tenants".into(),
        ));
    }

    let escaped: Vec<&String> = requested.difference(parent.allowed_tenants()).collect();
    if !escaped.is_empty() {
        warn!(
            token_id = %parent.token_id(),
            escaped = ?escaped,
            "SECURITY: Attenuation requested tenants outside parent scope"
        );
        return Err(BisquitError::TenantWidening(format!(
            "tenants {:?} not in parent scope",
            escaped
        )));
    }

    Ok(requested)
}
