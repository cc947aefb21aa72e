//! # Reconciler
//!
//! Core reconciliation logic for field-level encryption profiles.
//!
//! The reconciler:
//! - Creates profiles and confirms them with a read before reporting success
//! - Refreshes profiles and reports drift, including out-of-band deletion,
//!   and keeps retrying profiles whose create was never confirmed
//! - Updates profiles under optimistic concurrency (etag)
//! - Deletes profiles idempotently
//! - Imports existing profiles by identifier
//!
//! ## Retry Policy
//!
//! - Transient failures: exponential backoff with jitter, bounded attempts
//! - Stale etag on update/delete: one re-read, then one immediate retry
//! - Everything else: escalated at once
//!
//! Every operation runs under a [`Deadline`]. The `*_within` variants take one
//! from the caller; the plain variants derive it from
//! [`ReconcilerConfig::operation_timeout`].
//!
//! The reconciler holds no per-resource state and may be shared across
//! concurrently reconciled profiles. Calls for the same profile must be
//! serialised by the caller.

mod create;
mod delete;
mod read;
pub mod retry;
pub mod types;
mod update;

pub use retry::Deadline;
pub use types::{ErrorKind, Operation, ReconcileOutcome, ReconcilerError, ResourceState};

use crate::config::ReconcilerConfig;
use crate::controller::backoff::RetryPolicy;
use crate::controller::finder::{Finder, Lookup};
use crate::controller::plan::{compare_plan, Plan};
use crate::observability::metrics;
use crate::profile::{DesiredSpec, RemoteRecord};
use crate::provider::{RemoteClient, RemoteError};
use retry::{retry_transient, retry_when, RetryError};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Drives a profile towards its desired state
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn RemoteClient>,
    finder: Finder,
    config: ReconcilerConfig,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Arc<dyn RemoteClient>, config: ReconcilerConfig) -> Self {
        let policy = config.retry_policy();
        Self {
            finder: Finder::new(Arc::clone(&client)),
            client,
            config,
            policy,
        }
    }

    /// Replace the retry policy derived from the config
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn finder(&self) -> &Finder {
        &self.finder
    }

    /// Preview the action reconciling `desired` would take
    #[must_use]
    pub fn plan(&self, desired: &DesiredSpec, last_known: Option<&RemoteRecord>) -> Plan {
        compare_plan(desired, last_known, self.config.name_change_policy)
    }

    fn default_deadline(&self) -> Deadline {
        Deadline::after(self.config.operation_timeout())
    }

    /// Create a profile and confirm it is readable
    ///
    /// # Errors
    ///
    /// See [`Reconciler::create_within`].
    pub async fn create(&self, spec: &DesiredSpec) -> Result<ReconcileOutcome, ReconcilerError> {
        self.create_within(spec, self.default_deadline()).await
    }

    /// Refresh a tracked profile and report drift
    ///
    /// # Errors
    ///
    /// See [`Reconciler::read_within`].
    pub async fn read(
        &self,
        last_known: &RemoteRecord,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        self.read_within(last_known, self.default_deadline()).await
    }

    /// Bring a tracked profile to `desired`
    ///
    /// # Errors
    ///
    /// See [`Reconciler::update_within`].
    pub async fn update(
        &self,
        current: &RemoteRecord,
        desired: &DesiredSpec,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        self.update_within(current, desired, self.default_deadline())
            .await
    }

    /// Delete a profile; deleting a missing profile succeeds
    ///
    /// # Errors
    ///
    /// See [`Reconciler::delete_within`].
    pub async fn delete(&self, id: &str, etag: &str) -> Result<ReconcileOutcome, ReconcilerError> {
        self.delete_within(id, etag, self.default_deadline()).await
    }

    /// Start tracking an existing profile
    ///
    /// # Errors
    ///
    /// See [`Reconciler::import_within`].
    pub async fn import(&self, id: &str) -> Result<ReconcileOutcome, ReconcilerError> {
        self.import_within(id, self.default_deadline()).await
    }

    /// Look a profile up, retrying transient failures
    async fn lookup(
        &self,
        id: &str,
        operation: Operation,
        deadline: Deadline,
    ) -> Result<Lookup, RetryError> {
        let finder = &self.finder;
        retry_transient(&self.policy, deadline, operation, move || {
            finder.find_by_id(id)
        })
        .await
    }

    /// Read a freshly created profile, treating "not found" as "not visible yet"
    async fn await_visible(
        &self,
        id: &str,
        operation: Operation,
        deadline: Deadline,
    ) -> Result<RemoteRecord, RetryError> {
        let finder = &self.finder;
        retry_when(
            &self.policy,
            deadline,
            operation,
            move || async move {
                match finder.find_by_id(id).await {
                    Ok(Lookup::Found(record)) => Ok(record),
                    Ok(Lookup::NotFound) => {
                        Err(RemoteError::NotFound(format!("{id} is not readable yet")))
                    }
                    Err(e) => Err(e),
                }
            },
            |e| e.is_transient() || matches!(e, RemoteError::NotFound(_)),
        )
        .await
    }
}

/// Record metrics and a summary event for a finished operation
fn observe(
    operation: Operation,
    result: &Result<ReconcileOutcome, ReconcilerError>,
    start: Instant,
) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };
    metrics::record_operation(operation.as_str(), outcome, start.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => info!(
            operation = operation.as_str(),
            state = outcome.state.as_str(),
            drift = %outcome.drift,
            duration_ms = start.elapsed().as_millis(),
            "Reconciler operation finished"
        ),
        Err(e) => warn!(
            operation = operation.as_str(),
            kind = e.kind().as_str(),
            error = %e,
            duration_ms = start.elapsed().as_millis(),
            "Reconciler operation failed"
        ),
    }
}
