//! Token builder configuration
//!
//! Configuration comes from a JSON document, from `BISQUIT_*` environment
//! variables, or both (environment wins):
//!
//! | Variable                      | Field                 |
//! |-------------------------------|-----------------------|
//! | `BISQUIT_CONFIG_PATH`         | JSON file to load     |
//! | `BISQUIT_OVER_REQUEST_POLICY` | `over_request_policy` |
//! | `BISQUIT_DEFAULT_TTL_SECS`    | `default_ttl_secs`    |
//! | `BISQUIT_MAX_DEPTH`           | `max_depth`           |

use crate::error::{BisquitError, Result};
use crate::profile::StaticProfiles;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Maximum attenuation depth unless configured otherwise
pub const DEFAULT_MAX_DEPTH: u32 = 16;

/// What minting does with permissions beyond the namespace profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverRequestPolicy {
    /// Fail the whole mint
    #[default]
    Reject,
    /// Drop the excess permissions and mint the rest
    Truncate,
}

impl std::fmt::Display for OverRequestPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverRequestPolicy::Reject => write!(f, "reject"),
            OverRequestPolicy::Truncate => write!(f, "truncate"),
        }
    }
}

impl FromStr for OverRequestPolicy {
    type Err = BisquitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" | "strict" => Ok(OverRequestPolicy::Reject),
            "truncate" => Ok(OverRequestPolicy::Truncate),
            other => Err(BisquitError::InvalidConfig(format!(
                "unknown over-request policy '{}'",
                other
            ))),
        }
    }
}

/// Settings for [`TokenBuilder`](crate::builder::TokenBuilder)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub over_request_policy: OverRequestPolicy,

    /// TTL applied when a mint request names none; `None` mints non-expiring tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<i64>,

    /// Deepest allowed attenuation chain
    pub max_depth: u32,

    /// Namespace table; the built-in tiers when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles: Option<StaticProfiles>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            over_request_policy: OverRequestPolicy::Reject,
            default_ttl_secs: None,
            max_depth: DEFAULT_MAX_DEPTH,
            profiles: None,
        }
    }
}

impl BuilderConfig {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BisquitError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            BisquitError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Load from `BISQUIT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("BISQUIT_CONFIG_PATH") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(policy) = lookup("BISQUIT_OVER_REQUEST_POLICY") {
            config.over_request_policy = policy.parse()?;
        }

        if let Some(ttl) = lookup("BISQUIT_DEFAULT_TTL_SECS") {
            let secs = ttl.trim().parse::<i64>().map_err(|e| {
                BisquitError::InvalidConfig(format!("BISQUIT_DEFAULT_TTL_SECS: {}", e))
            })?;
            config.default_ttl_secs = Some(secs);
        }

        if let Some(depth) = lookup("BISQUIT_MAX_DEPTH") {
            config.max_depth = depth.trim().parse::<u32>().map_err(|e| {
                BisquitError::InvalidConfig(format!("BISQUIT_MAX_DEPTH: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Default TTL as a duration
    ///
    /// Fails for values too large to represent, which can only get here if
    /// `default_ttl_secs` was set directly rather than through a loader.
    pub fn default_ttl(&self) -> Result<Option<chrono::Duration>> {
        self.default_ttl_secs.map(ttl_from_secs).transpose()
    }

    /// Configured profiles or the built-in tiers
    pub fn profiles(&self) -> StaticProfiles {
        self.profiles.clone().unwrap_or_else(StaticProfiles::tiers)
    }

    fn validate(&self) -> Result<()> {
        if let Some(secs) = self.default_ttl_secs {
            if secs <= 0 {
                return Err(BisquitError::InvalidConfig(format!(
                    "default_ttl_secs must be positive, got {}",
                    secs
                )));
            }
            ttl_from_secs(secs)?;
        }
        Ok(())
    }
}

fn ttl_from_secs(secs: i64) -> Result<chrono::Duration> {
    chrono::Duration::try_seconds(secs).ok_or_else(|| {
        BisquitError::InvalidConfig(format!("default_ttl_secs out of range, got {}", secs))
    })
}
