//! Access checks joining envelopes and tokens
//!
//! Two flavours:
//! - `check_*` return `bool` and fail closed. Use them on hot paths that
//!   branch on "is this allowed".
//! - `verify*` return [`BisquitError`] so the denial reason propagates.

use crate::envelope::Envelope;
use crate::error::{BisquitError, Result};
use crate::revocation::{is_token_revoked, RevocationList};
use crate::token::Token;
use chrono::{DateTime, Utc};
use tracing::warn;

/// [`check_access_at`] using the system clock
pub fn check_access(envelope: &Envelope, token: &Token, permission: &str) -> bool {
    check_access_at(envelope, token, permission, Utc::now())
}

/// True only if the envelope references this exact token, the token is live
/// and it holds `permission`
///
/// A missing reference denies. A reference to a different token denies even
/// when that token carries the same permissions.
pub fn check_access_at(envelope: &Envelope, token: &Token, permission: &str, now: DateTime<Utc>) -> bool {
    match envelope.token_reference() {
        Some(reference) if reference == token.token_id() => {}
        _ => return false,
    }

    if token.is_expired(now) {
        return false;
    }

    token.has_permission(permission)
}

/// [`check_access_at`] plus the token's tenant scope
pub fn check_tenant_access_at(
    envelope: &Envelope,
    token: &Token,
    permission: &str,
    tenant_id: &str,
    now: DateTime<Utc>,
) -> bool {
    check_access_at(envelope, token, permission, now) && token.can_access_tenant(tenant_id)
}

/// Fail unless the token is unexpired and holds `permission`
pub fn verify(token: &Token, permission: &str, now: DateTime<Utc>) -> Result<()> {
    if token.is_expired(now) {
        warn!(
            token_id = %token.token_id(),
            expires_at = ?token.expires_at(),
            "SECURITY: Expired token presented"
        );
        return Err(BisquitError::Expired {
            token_id: token.token_id().to_string(),
            expires_at: token
                .expires_at()
                .map(|exp| exp.to_rfc3339())
                .unwrap_or_default(),
        });
    }

    if !token.has_permission(permission) {
        return Err(BisquitError::MissingPermission {
            token_id: token.token_id().to_string(),
            permission: permission.to_string(),
        });
    }

    Ok(())
}

/// [`verify`] plus a denylist lookup
pub fn verify_with_revocation<R>(token: &Token, permission: &str, now: DateTime<Utc>, list: &R) -> Result<()>
where
    R: RevocationList + ?Sized,
{
    verify(token, permission, now)?;

    if is_token_revoked(token, list).map_err(BisquitError::collaborator)? {
        let revocation_id = token.revocation_id().unwrap_or_default().to_string();
        warn!(
            token_id = %token.token_id(),
            revocation_id = %revocation_id,
            "SECURITY: Revoked token presented"
        );
        return Err(BisquitError::Revoked {
            token_id: token.token_id().to_string(),
            revocation_id,
        });
    }

    Ok(())
}
