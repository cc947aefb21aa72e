//! Idempotent delete.
//!
//! "Not found" at any point means the goal state already holds. A stale etag
//! gets the same single re-read and retry as update; a profile still in use is
//! escalated as a conflict without retrying.

use super::retry::{retry_transient, Deadline, RetryError};
use super::types::{transition, Operation, ReconcileOutcome, ReconcilerError, ResourceState};
use super::{observe, Reconciler};
use crate::controller::drift::DriftReport;
use crate::controller::finder::Lookup;
use crate::provider::RemoteError;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

impl Reconciler {
    /// Delete a profile under the caller's deadline
    ///
    /// # Errors
    ///
    /// - [`ReconcilerError::Conflict`] if the etag is still stale after one
    ///   re-read, or the profile is in use
    /// - [`ReconcilerError::Transient`] / [`ReconcilerError::Timeout`] if the
    ///   profile may still exist
    pub async fn delete_within(
        &self,
        id: &str,
        etag: &str,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!("fle.profile.delete", profile.id = %id);
        let start = Instant::now();

        async move {
            let result = self.delete_profile(id, etag, deadline).await;
            observe(Operation::Delete, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_profile(
        &self,
        id: &str,
        etag: &str,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        transition(ResourceState::Present, ResourceState::Deleting);
        let mut etag = etag.to_string();
        let mut reread = false;

        loop {
            let attempt = self.send_delete(id, &etag, deadline).await;
            match attempt {
                Ok(()) => {
                    info!(profile.id = %id, "Profile deleted");
                    return Ok(deleted());
                }
                Err(RetryError::Remote {
                    error: RemoteError::NotFound(_),
                    ..
                }) => {
                    debug!(profile.id = %id, "Profile already absent");
                    return Ok(deleted());
                }
                Err(RetryError::Remote { error, .. }) if error.is_stale_etag() && !reread => {
                    reread = true;
                    warn!(profile.id = %id, etag = %etag, "Etag is stale, re-reading profile");
                    let lookup = self
                        .lookup(id, Operation::Delete, deadline)
                        .await
                        .map_err(|e| e.into_error(Operation::Delete, id))?;
                    match lookup {
                        Lookup::NotFound => return Ok(deleted()),
                        Lookup::Found(fresh) => etag = fresh.etag,
                    }
                }
                Err(e) if e.is_escalated_transient() => {
                    return self.settle_delete(id, deadline, e).await;
                }
                Err(e) => return Err(e.into_error(Operation::Delete, id)),
            }
        }
    }

    async fn send_delete(&self, id: &str, etag: &str, deadline: Deadline) -> Result<(), RetryError> {
        let client = &self.client;
        retry_transient(&self.policy, deadline, Operation::Delete, move || {
            client.delete(id, etag)
        })
        .await
    }

    /// One read to learn whether a delete whose response was lost landed
    async fn settle_delete(
        &self,
        id: &str,
        deadline: Deadline,
        failure: RetryError,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        if !deadline.is_expired() {
            if let Some(Ok(Lookup::NotFound)) = deadline.run(self.finder.find_by_id(id)).await {
                info!(profile.id = %id, "Delete landed despite failed response");
                return Ok(deleted());
            }
        }
        Err(failure.into_error(Operation::Delete, id))
    }
}

fn deleted() -> ReconcileOutcome {
    transition(ResourceState::Deleting, ResourceState::Absent);
    ReconcileOutcome::absent(DriftReport::InSync)
}
