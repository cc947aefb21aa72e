//! # Provider Modules
//!
//! The remote control plane contract and its implementations.
//!
//! - [`RemoteClient`]: the four calls the reconciler issues
//! - [`aws::CloudFrontProfiles`]: CloudFront implementation
//! - [`memory::InMemoryRemoteClient`]: in-process implementation with fault injection

use crate::profile::wire::WirePayload;
use async_trait::async_trait;
use thiserror::Error;

/// Why the control plane refused a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The presented etag no longer matches the stored version
    StaleEtag,
    /// Another profile already uses the requested name
    NameTaken,
    /// The profile is still referenced and cannot be deleted
    InUse,
}

impl ConflictKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::StaleEtag => "stale-etag",
            ConflictKind::NameTaken => "name-taken",
            ConflictKind::InUse => "in-use",
        }
    }
}

/// Typed failure returned by a [`RemoteClient`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict ({}): {message}", kind.as_str())]
    Conflict { kind: ConflictKind, message: String },
    /// Timeout, throttling or server-side failure; safe to retry
    #[error("transient: {0}")]
    Transient(String),
    /// Malformed or rejected request; retrying cannot succeed
    #[error("invalid: {0}")]
    Invalid(String),
}

impl RemoteError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    #[must_use]
    pub fn is_stale_etag(&self) -> bool {
        matches!(
            self,
            RemoteError::Conflict {
                kind: ConflictKind::StaleEtag,
                ..
            }
        )
    }

    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        RemoteError::Conflict {
            kind,
            message: message.into(),
        }
    }
}

/// Identifier and version assigned by a successful create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedProfile {
    pub id: String,
    pub etag: String,
}

/// Current remote configuration and its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedProfile {
    pub payload: WirePayload,
    pub etag: String,
}

/// Control plane calls for field-level encryption profiles
///
/// Implementations perform one network round trip per call and never retry
/// internally; retry and backoff belong to the reconciler.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Create a profile. A name collision is reported as
    /// [`ConflictKind::NameTaken`].
    async fn create(&self, payload: &WirePayload) -> Result<CreatedProfile, RemoteError>;

    /// Fetch a profile by identifier
    async fn get(&self, id: &str) -> Result<FetchedProfile, RemoteError>;

    /// Replace a profile's configuration, presenting the last observed etag.
    /// Returns the new etag.
    async fn update(&self, id: &str, etag: &str, payload: &WirePayload)
        -> Result<String, RemoteError>;

    /// Delete a profile, presenting the last observed etag
    async fn delete(&self, id: &str, etag: &str) -> Result<(), RemoteError>;
}

pub mod aws;
pub mod memory;

pub use aws::CloudFrontProfiles;
pub use memory::InMemoryRemoteClient;
