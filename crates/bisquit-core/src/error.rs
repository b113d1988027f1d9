//! Error types for envelopes and tokens

use thiserror::Error;

/// Result type alias using BisquitError
pub type Result<T> = std::result::Result<T, BisquitError>;

/// Boxed error produced by an injected collaborator (profile source, revocation list, codec)
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Response class a hosting service should map an error to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input; a caller bug
    BadRequest,
    /// A security decision denied the operation
    PermissionDenied,
    /// Serialization or collaborator failure
    Internal,
}

/// Errors that can occur while building envelopes or minting and checking tokens
#[derive(Error, Debug)]
pub enum BisquitError {
    // =========================================================================
    // Validation
    // =========================================================================
    /// Envelope created without any origin label
    #[error("Provenance seed must contain at least one label")]
    EmptyProvenance,

    /// Trace label is empty or not of the `actor:action` form
    #[error("Invalid trace label '{0}': expected 'actor:action'")]
    InvalidTraceLabel(String),

    /// Permission string is not of the `domain:action` form
    #[error("Invalid permission '{0}': expected 'domain:action'")]
    InvalidPermission(String),

    /// Time-to-live is zero, negative or out of range
    #[error("Invalid ttl: {0}")]
    InvalidTtl(String),

    /// Pipeline references a stage key that was never registered
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// Configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Authorization
    // =========================================================================
    /// Requested permissions exceed the namespace profile
    #[error("Permissions {permissions:?} not allowed in namespace '{namespace}'")]
    ProfileExceeded {
        namespace: String,
        permissions: Vec<String>,
    },

    /// Namespace has no profile
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    /// Attenuation left no permissions
    #[error("Attenuation of {requested:?} against {parent:?} leaves no permissions")]
    EmptyAttenuation {
        requested: Vec<String>,
        parent: Vec<String>,
    },

    /// Attenuation attempted to widen the tenant scope
    #[error("Tenant scope widening: {0}")]
    TenantWidening(String),

    /// Attenuation chain is too deep
    #[error("Attenuation depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: u32, max: u32 },

    /// Token has expired
    #[error("Token {token_id} expired at {expires_at}")]
    Expired {
        token_id: String,
        expires_at: String,
    },

    /// Token lacks a required permission
    #[error("Token {token_id} lacks permission '{permission}'")]
    MissingPermission {
        token_id: String,
        permission: String,
    },

    /// Token was revoked
    #[error("Token {token_id} revoked ({revocation_id})")]
    Revoked {
        token_id: String,
        revocation_id: String,
    },

    // =========================================================================
    // Internal
    // =========================================================================
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error raised by an injected collaborator, passed through as-is
    #[error(transparent)]
    Collaborator(CollaboratorError),
}

impl BisquitError {
    /// Wrap a collaborator error without reinterpreting it
    pub fn collaborator<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BisquitError::Collaborator(Box::new(err))
    }

    /// Response class for this error
    pub fn class(&self) -> ErrorClass {
        match self {
            BisquitError::EmptyProvenance
            | BisquitError::InvalidTraceLabel(_)
            | BisquitError::InvalidPermission(_)
            | BisquitError::InvalidTtl(_)
            | BisquitError::UnknownStage(_)
            | BisquitError::InvalidConfig(_) => ErrorClass::BadRequest,

            BisquitError::ProfileExceeded { .. }
            | BisquitError::UnknownNamespace(_)
            | BisquitError::EmptyAttenuation { .. }
            | BisquitError::TenantWidening(_)
            | BisquitError::DepthExceeded { .. }
            | BisquitError::Expired { .. }
            | BisquitError::MissingPermission { .. }
            | BisquitError::Revoked { .. } => ErrorClass::PermissionDenied,

            BisquitError::Serialization(_) | BisquitError::Collaborator(_) => ErrorClass::Internal,
        }
    }

    /// True for malformed-input errors
    pub fn is_validation(&self) -> bool {
        self.class() == ErrorClass::BadRequest
    }

    /// True for security decisions
    pub fn is_authorization(&self) -> bool {
        self.class() == ErrorClass::PermissionDenied
    }
}

impl From<serde_json::Error> for BisquitError {
    fn from(err: serde_json::Error) -> Self {
        BisquitError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("denylist offline")]
    struct Offline;

    #[test]
    fn test_error_classes() {
        assert_eq!(BisquitError::EmptyProvenance.class(), ErrorClass::BadRequest);
        assert_eq!(
            BisquitError::UnknownNamespace("x".into()).class(),
            ErrorClass::PermissionDenied
        );
        assert!(BisquitError::InvalidTtl("0s".into()).is_validation());
        assert!(BisquitError::TenantWidening("t".into()).is_authorization());
    }

    #[test]
    fn test_collaborator_error_passes_through() {
        let err = BisquitError::collaborator(Offline);
        assert_eq!(err.to_string(), "denylist offline");
        assert_eq!(err.class(), ErrorClass::Internal);

        match err {
            BisquitError::Collaborator(inner) => assert!(inner.downcast_ref::<Offline>().is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
