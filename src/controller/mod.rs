//! # Controller
//!
//! Core controller modules for field-level encryption profiles.
//!
//! - `backoff`: Exponential backoff for retries
//! - `drift`: Drift detection between last known and fresh remote state
//! - `finder`: Read-only lookup by identifier
//! - `mapper`: Desired spec <-> wire payload conversion and equivalence
//! - `plan`: Side-effect free change preview
//! - `reconciler`: Create/read/update/delete/import state machine

pub mod backoff;
pub mod drift;
pub mod finder;
pub mod mapper;
pub mod plan;
pub mod reconciler;

pub use drift::{detect, DriftReport};
pub use finder::{Finder, Lookup};
pub use mapper::{diff_fields, equivalent, from_wire, to_wire, ProfileField};
pub use plan::{compare_plan, Plan};
pub use reconciler::{
    Deadline, ErrorKind, Operation, ReconcileOutcome, Reconciler, ReconcilerError, ResourceState,
};
