//! Commonly used types, for `use fle_profile_controller::prelude::*`.

pub use crate::config::{NameChangePolicy, ReconcilerConfig};
pub use crate::controller::backoff::RetryPolicy;
pub use crate::controller::{
    compare_plan, detect, equivalent, Deadline, DriftReport, ErrorKind, Finder, Lookup, Operation,
    Plan, ProfileField, ReconcileOutcome, Reconciler, ReconcilerError, ResourceState,
};
pub use crate::profile::{DesiredSpec, EncryptionEntity, RemoteRecord, SpecError};
pub use crate::provider::{ConflictKind, RemoteClient, RemoteError};
