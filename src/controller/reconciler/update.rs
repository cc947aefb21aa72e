//! Update under optimistic concurrency.
//!
//! A stale etag earns exactly one re-read and one immediate retry with the
//! fresh etag. When the re-read shows the profile already matches the desired
//! spec, the update completes without a second mutating call. When transient
//! failures are escalated, a single settling read decides whether the update
//! landed after all.

use super::retry::{retry_transient, Deadline, RetryError};
use super::types::{transition, Operation, ReconcileOutcome, ReconcilerError, ResourceState};
use super::{observe, Reconciler};
use crate::config::NameChangePolicy;
use crate::controller::drift::{detect, DriftReport};
use crate::controller::finder::Lookup;
use crate::controller::mapper::{equivalent, to_wire};
use crate::profile::wire::WirePayload;
use crate::profile::{DesiredSpec, RemoteRecord};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

impl Reconciler {
    /// Update `current` to `desired` under the caller's deadline
    ///
    /// An update whose desired spec is equivalent to `current.spec` issues no
    /// remote call and returns `current` unchanged.
    ///
    /// # Errors
    ///
    /// - [`ReconcilerError::Invalid`] if the spec is malformed, rejected, or
    ///   renames the profile under [`NameChangePolicy::Recreate`]
    /// - [`ReconcilerError::Conflict`] if the etag is still stale after one
    ///   re-read, or the new name is taken
    /// - [`ReconcilerError::NotFound`] if the profile no longer exists
    /// - [`ReconcilerError::Transient`] / [`ReconcilerError::Timeout`] if the
    ///   update did not go through
    pub async fn update_within(
        &self,
        current: &RemoteRecord,
        desired: &DesiredSpec,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!("fle.profile.update", profile.id = %current.id);
        let start = Instant::now();

        async move {
            let result = self.update_profile(current, desired, deadline).await;
            observe(Operation::Update, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn update_profile(
        &self,
        current: &RemoteRecord,
        desired: &DesiredSpec,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let id = current.id.as_str();
        desired
            .validate()
            .map_err(|e| ReconcilerError::invalid_spec(Operation::Update, id, &e))?;

        if equivalent(&current.spec, desired) {
            debug!(profile.id = %id, "Desired spec already matches, nothing to update");
            return Ok(ReconcileOutcome::present(current.clone(), DriftReport::InSync));
        }

        if current.spec.name != desired.name
            && self.config.name_change_policy == NameChangePolicy::Recreate
        {
            return Err(ReconcilerError::Invalid {
                operation: Operation::Update,
                resource: id.to_string(),
                message: format!(
                    "renaming '{}' to '{}' requires replacing the profile",
                    current.spec.name, desired.name
                ),
            });
        }

        transition(ResourceState::Present, ResourceState::Updating);
        let payload = to_wire(desired, &current.caller_reference);
        let mut etag = current.etag.clone();
        let mut reread = false;

        loop {
            let attempt = self.send_update(id, &etag, &payload, deadline).await;
            match attempt {
                Ok(new_etag) => {
                    let record = RemoteRecord {
                        id: id.to_string(),
                        etag: new_etag,
                        caller_reference: current.caller_reference.clone(),
                        spec: desired.clone(),
                        pending: false,
                    };
                    info!(profile.id = %id, etag = %record.etag, "Profile updated");
                    return Ok(updated(current, record));
                }
                Err(RetryError::Remote { error, .. }) if error.is_stale_etag() && !reread => {
                    reread = true;
                    warn!(profile.id = %id, etag = %etag, "Etag is stale, re-reading profile");
                    let lookup = self
                        .lookup(id, Operation::Update, deadline)
                        .await
                        .map_err(|e| e.into_error(Operation::Update, id))?;
                    match lookup {
                        Lookup::NotFound => {
                            return Err(ReconcilerError::NotFound {
                                operation: Operation::Update,
                                resource: id.to_string(),
                            })
                        }
                        Lookup::Found(fresh) if equivalent(&fresh.spec, desired) => {
                            info!(profile.id = %id, "Profile already matches the desired spec");
                            return Ok(updated(current, fresh));
                        }
                        Lookup::Found(fresh) => etag = fresh.etag,
                    }
                }
                Err(e) if e.is_escalated_transient() => {
                    return self.settle_update(current, desired, deadline, e).await;
                }
                Err(e) => return Err(e.into_error(Operation::Update, id)),
            }
        }
    }

    async fn send_update(
        &self,
        id: &str,
        etag: &str,
        payload: &WirePayload,
        deadline: Deadline,
    ) -> Result<String, RetryError> {
        let client = &self.client;
        retry_transient(&self.policy, deadline, Operation::Update, move || {
            client.update(id, etag, payload)
        })
        .await
    }

    /// One read to learn whether an update whose response was lost landed
    async fn settle_update(
        &self,
        current: &RemoteRecord,
        desired: &DesiredSpec,
        deadline: Deadline,
        failure: RetryError,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        if !deadline.is_expired() {
            if let Some(Ok(Lookup::Found(fresh))) =
                deadline.run(self.finder.find_by_id(&current.id)).await
            {
                if equivalent(&fresh.spec, desired) {
                    info!(profile.id = %current.id, "Update landed despite failed response");
                    return Ok(updated(current, fresh));
                }
            }
        }
        Err(failure.into_error(Operation::Update, &current.id))
    }
}

fn updated(previous: &RemoteRecord, record: RemoteRecord) -> ReconcileOutcome {
    let drift = detect(previous, &Lookup::Found(record.clone()));
    transition(ResourceState::Updating, ResourceState::Present);
    ReconcileOutcome::present(record, drift)
}
