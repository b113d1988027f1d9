//! Namespace profiles
//!
//! A namespace (`free`, `pro`, `admin`, `system`, ...) caps what a root token
//! may carry. The builder resolves namespaces through a [`ProfileSource`]; the
//! default source is [`StaticProfiles`], an explicit map assembled at start-up.

use crate::permission;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;

/// Permission limits for one namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceProfile {
    /// Maximum grantable permissions; entries may use `domain:*` or `*`
    pub allowed: BTreeSet<String>,

    /// Permissions minted when a request names none
    #[serde(default)]
    pub defaults: BTreeSet<String>,
}

impl NamespaceProfile {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: permission::set(allowed),
            defaults: BTreeSet::new(),
        }
    }

    /// Set the default permission set
    pub fn with_defaults<I, S>(mut self, defaults: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaults = permission::set(defaults);
        self
    }

    /// Check if the profile admits a concrete permission
    pub fn allows(&self, permission: &str) -> bool {
        permission::covered_by(permission, &self.allowed)
    }
}

/// Namespace profile lookup
///
/// Implementations may sit on a database or a remote policy service. Errors
/// are handed back to the caller untouched.
pub trait ProfileSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up a namespace; `Ok(None)` if it does not exist
    fn profile(&self, namespace: &str) -> Result<Option<NamespaceProfile>, Self::Error>;
}

/// Fixed namespace table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticProfiles(HashMap<String, NamespaceProfile>);

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in access tiers
    ///
    /// | tier     | allowed                                        |
    /// |----------|------------------------------------------------|
    /// | `free`   | `brain:read`, `memory:read`                    |
    /// | `pro`    | `brain:*`, `memory:*`, `jobs:submit`           |
    /// | `admin`  | `brain:*`, `memory:*`, `jobs:*`, `tenants:*`   |
    /// | `system` | `*`                                            |
    pub fn tiers() -> Self {
        Self::new()
            .with(
                "free",
                NamespaceProfile::new(["brain:read", "memory:read"])
                    .with_defaults(["brain:read"]),
            )
            .with(
                "pro",
                NamespaceProfile::new(["brain:*", "memory:*", "jobs:submit"])
                    .with_defaults(["brain:read", "brain:write", "memory:read"]),
            )
            .with(
                "admin",
                NamespaceProfile::new(["brain:*", "memory:*", "jobs:*", "tenants:*"])
                    .with_defaults(["brain:read", "memory:read", "tenants:read"]),
            )
            .with("system", NamespaceProfile::new(["*"]))
    }

    /// Add or replace a namespace (builder pattern)
    pub fn with(mut self, namespace: impl Into<String>, profile: NamespaceProfile) -> Self {
        self.0.insert(namespace.into(), profile);
        self
    }

    pub fn insert(&mut self, namespace: impl Into<String>, profile: NamespaceProfile) {
        self.0.insert(namespace.into(), profile);
    }

    pub fn get(&self, namespace: &str) -> Option<&NamespaceProfile> {
        self.0.get(namespace)
    }

    /// Namespaces in sorted order
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, NamespaceProfile>> for StaticProfiles {
    fn from(map: HashMap<String, NamespaceProfile>) -> Self {
        Self(map)
    }
}

impl ProfileSource for StaticProfiles {
    type Error = Infallible;

    fn profile(&self, namespace: &str) -> Result<Option<NamespaceProfile>, Infallible> {
        Ok(self.0.get(namespace).cloned())
    }
}
