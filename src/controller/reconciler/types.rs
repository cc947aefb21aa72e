//! # Reconciler Types
//!
//! Operations, lifecycle states, outcomes and the escalated error type.

use crate::controller::drift::DriftReport;
use crate::profile::{DesiredSpec, RemoteRecord, SpecError};
use crate::provider::{ConflictKind, RemoteError};
use thiserror::Error;
use tracing::debug;

/// Reconciler entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Import => "import",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one managed profile
///
/// ```text
/// Absent -> Creating -> Present -> Updating -> Present -> Deleting -> Absent
/// ```
///
/// `Errored` is reached when a create landed remotely but could not be confirmed,
/// and persists until a refresh observes the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
    Errored,
}

impl ResourceState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Absent => "Absent",
            ResourceState::Creating => "Creating",
            ResourceState::Present => "Present",
            ResourceState::Updating => "Updating",
            ResourceState::Deleting => "Deleting",
            ResourceState::Errored => "Errored",
        }
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn transition(from: ResourceState, to: ResourceState) {
    debug!(from = from.as_str(), to = to.as_str(), "State transition");
}

/// Result of a successful reconciler operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub state: ResourceState,
    /// The record to persist; `None` once the profile is absent
    pub record: Option<RemoteRecord>,
    pub drift: DriftReport,
}

impl ReconcileOutcome {
    pub(crate) fn present(record: RemoteRecord, drift: DriftReport) -> Self {
        Self {
            state: ResourceState::Present,
            record: Some(record),
            drift,
        }
    }

    /// An unconfirmed create that is still not visible; the record is kept
    pub(crate) fn pending(record: RemoteRecord) -> Self {
        Self {
            state: ResourceState::Errored,
            record: Some(record),
            drift: DriftReport::Pending,
        }
    }

    pub(crate) fn absent(drift: DriftReport) -> Self {
        Self {
            state: ResourceState::Absent,
            record: None,
            drift,
        }
    }
}

/// Failure categories callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Transient,
    Invalid,
    Timeout,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Timeout => "timeout",
        }
    }
}

/// Escalated reconciler failure
///
/// Every variant names the operation and the resource it was acting on: the
/// profile identifier when known, otherwise the profile name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcilerError {
    #[error("{operation} {resource}: profile not found")]
    NotFound {
        operation: Operation,
        resource: String,
    },

    #[error("{operation} {resource}: conflict ({}): {message}", kind.as_str())]
    Conflict {
        operation: Operation,
        resource: String,
        kind: ConflictKind,
        message: String,
    },

    #[error("{operation} {resource}: still failing after {attempts} attempt(s): {source}")]
    Transient {
        operation: Operation,
        resource: String,
        attempts: u32,
        #[source]
        source: RemoteError,
    },

    #[error("{operation} {resource}: invalid: {message}")]
    Invalid {
        operation: Operation,
        resource: String,
        message: String,
    },

    #[error("{operation} {resource}: deadline exceeded after {attempts} attempt(s)")]
    Timeout {
        operation: Operation,
        resource: String,
        attempts: u32,
    },

    /// The create call succeeded but the profile was never observed by a read.
    /// Persist [`ReconcilerError::unconfirmed_record`] so a later refresh can adopt it.
    #[error("create {id}: profile created but not confirmed: {source}")]
    CreatedUnconfirmed {
        id: String,
        etag: String,
        caller_reference: String,
        #[source]
        source: Box<ReconcilerError>,
    },
}

impl ReconcilerError {
    /// The pending record to track for a create that landed unconfirmed
    #[must_use]
    pub fn unconfirmed_record(&self, spec: &DesiredSpec) -> Option<RemoteRecord> {
        match self {
            ReconcilerError::CreatedUnconfirmed {
                id,
                etag,
                caller_reference,
                ..
            } => Some(RemoteRecord::unconfirmed(
                id.as_str(),
                etag.as_str(),
                caller_reference.as_str(),
                spec.clone(),
            )),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcilerError::NotFound { .. } => ErrorKind::NotFound,
            ReconcilerError::Conflict { .. } => ErrorKind::Conflict,
            ReconcilerError::Transient { .. } => ErrorKind::Transient,
            ReconcilerError::Invalid { .. } => ErrorKind::Invalid,
            ReconcilerError::Timeout { .. } => ErrorKind::Timeout,
            ReconcilerError::CreatedUnconfirmed { source, .. } => source.kind(),
        }
    }

    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            ReconcilerError::NotFound { operation, .. }
            | ReconcilerError::Conflict { operation, .. }
            | ReconcilerError::Transient { operation, .. }
            | ReconcilerError::Invalid { operation, .. }
            | ReconcilerError::Timeout { operation, .. } => *operation,
            ReconcilerError::CreatedUnconfirmed { .. } => Operation::Create,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        match self {
            ReconcilerError::NotFound { resource, .. }
            | ReconcilerError::Conflict { resource, .. }
            | ReconcilerError::Transient { resource, .. }
            | ReconcilerError::Invalid { resource, .. }
            | ReconcilerError::Timeout { resource, .. } => resource,
            ReconcilerError::CreatedUnconfirmed { id, .. } => id,
        }
    }

    /// State the profile is left in from the caller's point of view
    #[must_use]
    pub fn state_after(&self) -> ResourceState {
        match self {
            ReconcilerError::CreatedUnconfirmed { .. } => ResourceState::Errored,
            other => match other.operation() {
                Operation::Create | Operation::Import => ResourceState::Absent,
                Operation::Read | Operation::Update | Operation::Delete => ResourceState::Present,
            },
        }
    }

    pub(crate) fn invalid_spec(operation: Operation, resource: &str, err: &SpecError) -> Self {
        ReconcilerError::Invalid {
            operation,
            resource: resource.to_string(),
            message: err.to_string(),
        }
    }

    /// Escalate a remote failure that was not retried further
    pub(crate) fn from_remote(
        operation: Operation,
        resource: &str,
        err: RemoteError,
        attempts: u32,
    ) -> Self {
        let resource = resource.to_string();
        match err {
            RemoteError::NotFound(_) => ReconcilerError::NotFound {
                operation,
                resource,
            },
            RemoteError::Conflict { kind, message } => ReconcilerError::Conflict {
                operation,
                resource,
                kind,
                message,
            },
            RemoteError::Invalid(message) => ReconcilerError::Invalid {
                operation,
                resource,
                message,
            },
            source @ RemoteError::Transient(_) => ReconcilerError::Transient {
                operation,
                resource,
                attempts,
                source,
            },
        }
    }
}
