//! Permission strings and namespace-profile matching
//!
//! A permission is a `domain:action` string such as `brain:read`. Tokens only
//! ever hold concrete permissions and [`Token::has_permission`] is an exact
//! match. Wildcards live one layer up: namespace profiles may grant `brain:*`
//! or `*`, and [`covers`] decides whether such a grant admits a concrete
//! request at mint time.
//!
//! [`Token::has_permission`]: crate::token::Token::has_permission

use crate::error::{BisquitError, Result};
use std::collections::BTreeSet;

/// Split a permission into `(domain, action)`
///
/// Both halves must be non-empty, and wildcards are not accepted.
pub fn parse(permission: &str) -> Result<(&str, &str)> {
    let invalid = || BisquitError::InvalidPermission(permission.to_string());

    let (domain, action) = permission.split_once(':').ok_or_else(invalid)?;
    if domain.trim().is_empty() || action.trim().is_empty() {
        return Err(invalid());
    }
    if permission.contains('*') || permission.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    Ok((domain, action))
}

/// Validate every permission in a set
pub fn validate_all<'a, I>(permissions: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    for permission in permissions {
        parse(permission)?;
    }
    Ok(())
}

/// Check if a profile grant admits a concrete permission
///
/// - `*` covers everything
/// - `brain:*` covers `brain:read` and `brain:index:write`
/// - anything else must match exactly
pub fn covers(grant: &str, required: &str) -> bool {
    if grant == "*" || grant == required {
        return true;
    }

    if let Some(prefix) = grant.strip_suffix('*') {
        return required.starts_with(prefix);
    }

    false
}

/// Check if any grant in the set admits `required`
pub fn covered_by<'a, I>(required: &str, grants: I) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    grants.into_iter().any(|grant| covers(grant, required))
}

/// Requested permissions not admitted by the grants, in sorted order
pub fn uncovered(requested: &BTreeSet<String>, grants: &BTreeSet<String>) -> Vec<String> {
    requested
        .iter()
        .filter(|perm| !covered_by(perm, grants))
        .cloned()
        .collect()
}

/// Build a permission set from string slices
pub fn set<I, S>(permissions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    permissions.into_iter().map(Into::into).collect()
}
