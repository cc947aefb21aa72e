//! Read (refresh) and import.
//!
//! A record flagged `pending` belongs to a create that was never confirmed.
//! Refreshing it keeps treating "not found" as "not visible yet" and never
//! reports it as vanished, so the identifier is not lost.

use super::retry::{Deadline, RetryError};
use super::types::{transition, Operation, ReconcileOutcome, ReconcilerError, ResourceState};
use super::{observe, Reconciler};
use crate::controller::drift::{detect, DriftReport};
use crate::controller::finder::Lookup;
use crate::observability::metrics;
use crate::profile::RemoteRecord;
use crate::provider::RemoteError;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

impl Reconciler {
    /// Refresh `last_known` under the caller's deadline
    ///
    /// A profile deleted out of band is not an error: the outcome is
    /// `Absent` with [`DriftReport::Vanished`] so the caller can plan a
    /// re-create.
    ///
    /// A pending record is read until it becomes visible. If it never does
    /// within the attempt budget the outcome is `Errored` with
    /// [`DriftReport::Pending`] and the record is returned unchanged.
    ///
    /// # Errors
    ///
    /// [`ReconcilerError::Transient`] or [`ReconcilerError::Timeout`] when the
    /// profile could not be read.
    pub async fn read_within(
        &self,
        last_known: &RemoteRecord,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!("fle.profile.read", profile.id = %last_known.id);
        let start = Instant::now();

        async move {
            let result = self.refresh(last_known, deadline).await;
            observe(Operation::Read, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn refresh(
        &self,
        last_known: &RemoteRecord,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        if last_known.pending {
            return self.refresh_pending(last_known, deadline).await;
        }

        let lookup = self
            .lookup(&last_known.id, Operation::Read, deadline)
            .await
            .map_err(|e| e.into_error(Operation::Read, &last_known.id))?;

        let drift = detect(last_known, &lookup);
        if !drift.is_in_sync() {
            metrics::increment_drift(drift.as_str());
            info!(profile.id = %last_known.id, drift = %drift, "Drift detected");
        }

        match lookup {
            Lookup::Found(record) => Ok(ReconcileOutcome::present(record, drift)),
            Lookup::NotFound => {
                transition(ResourceState::Present, ResourceState::Absent);
                Ok(ReconcileOutcome::absent(drift))
            }
        }
    }

    async fn refresh_pending(
        &self,
        last_known: &RemoteRecord,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        match self
            .await_visible(&last_known.id, Operation::Read, deadline)
            .await
        {
            Ok(record) => {
                info!(profile.id = %last_known.id, "Unconfirmed profile is now readable");
                let drift = detect(last_known, &Lookup::Found(record.clone()));
                transition(ResourceState::Errored, ResourceState::Present);
                Ok(ReconcileOutcome::present(record, drift))
            }
            Err(RetryError::Exhausted {
                last: RemoteError::NotFound(_),
                attempts,
            }) => {
                warn!(
                    profile.id = %last_known.id,
                    attempts,
                    "Created profile is still not readable"
                );
                Ok(ReconcileOutcome::pending(last_known.clone()))
            }
            Err(e) => Err(e.into_error(Operation::Read, &last_known.id)),
        }
    }

    /// Import an existing profile under the caller's deadline
    ///
    /// # Errors
    ///
    /// - [`ReconcilerError::NotFound`] if no profile has this identifier
    /// - [`ReconcilerError::Transient`] / [`ReconcilerError::Timeout`] when the
    ///   profile could not be read
    pub async fn import_within(
        &self,
        id: &str,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!("fle.profile.import", profile.id = %id);
        let start = Instant::now();

        async move {
            let result = self.import_profile(id, deadline).await;
            observe(Operation::Import, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn import_profile(
        &self,
        id: &str,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let lookup = self
            .lookup(id, Operation::Import, deadline)
            .await
            .map_err(|e| e.into_error(Operation::Import, id))?;

        match lookup {
            Lookup::Found(record) => {
                info!(profile.id = %id, profile.name = %record.spec.name, "Profile imported");
                transition(ResourceState::Absent, ResourceState::Present);
                Ok(ReconcileOutcome::present(record, DriftReport::InSync))
            }
            Lookup::NotFound => Err(ReconcilerError::NotFound {
                operation: Operation::Import,
                resource: id.to_string(),
            }),
        }
    }
}
