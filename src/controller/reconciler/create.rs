//! Create: issue the create call, then confirm the profile is readable.
//!
//! The control plane may briefly answer "not found" for a profile it has just
//! created, so the confirming read retries not-found as well as transient
//! failures. The caller reference is generated once and reused for every
//! retry of the create call, which makes a retried create that already landed
//! return the existing profile instead of a second one.

use super::retry::{retry_transient, Deadline};
use super::types::{transition, Operation, ReconcileOutcome, ReconcilerError, ResourceState};
use super::{observe, Reconciler};
use crate::controller::drift::detect;
use crate::controller::finder::Lookup;
use crate::controller::mapper::to_wire;
use crate::profile::{DesiredSpec, RemoteRecord};
use std::time::Instant;
use tracing::{field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

impl Reconciler {
    /// Create a profile under the caller's deadline
    ///
    /// On success the outcome carries the confirmed record and the drift
    /// between what was submitted and what the confirming read returned.
    ///
    /// # Errors
    ///
    /// - [`ReconcilerError::Invalid`] if the spec is malformed or rejected
    /// - [`ReconcilerError::Conflict`] if the name is already taken
    /// - [`ReconcilerError::Transient`] / [`ReconcilerError::Timeout`] if the
    ///   create call never succeeded
    /// - [`ReconcilerError::CreatedUnconfirmed`] if the create call succeeded
    ///   but no read observed the profile in time
    pub async fn create_within(
        &self,
        spec: &DesiredSpec,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!(
            "fle.profile.create",
            profile.name = %spec.name,
            profile.id = field::Empty
        );
        let start = Instant::now();

        async move {
            let result = self.create_profile(spec, deadline).await;
            observe(Operation::Create, &result, start);
            result
        }
        .instrument(span)
        .await
    }

    async fn create_profile(
        &self,
        spec: &DesiredSpec,
        deadline: Deadline,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        spec.validate()
            .map_err(|e| ReconcilerError::invalid_spec(Operation::Create, &spec.name, &e))?;

        transition(ResourceState::Absent, ResourceState::Creating);
        let caller_reference = Uuid::new_v4().to_string();
        let payload = to_wire(spec, &caller_reference);

        let client = &self.client;
        let payload_ref = &payload;
        let created = retry_transient(&self.policy, deadline, Operation::Create, move || {
            client.create(payload_ref)
        })
        .await
        .map_err(|e| e.into_error(Operation::Create, &spec.name))?;

        Span::current().record("profile.id", created.id.as_str());
        info!(
            profile.id = %created.id,
            caller_reference = %caller_reference,
            "Profile created, waiting for it to become readable"
        );

        let confirmed = self
            .await_visible(&created.id, Operation::Create, deadline)
            .await;

        match confirmed {
            Ok(record) => {
                let submitted = RemoteRecord {
                    id: created.id.clone(),
                    etag: created.etag.clone(),
                    caller_reference,
                    spec: spec.clone(),
                    pending: false,
                };
                let drift = detect(&submitted, &Lookup::Found(record.clone()));
                transition(ResourceState::Creating, ResourceState::Present);
                Ok(ReconcileOutcome::present(record, drift))
            }
            Err(e) => {
                let cause = e.into_error(Operation::Create, &created.id);
                warn!(
                    profile.id = %created.id,
                    error = %cause,
                    "Profile was created but could not be confirmed"
                );
                transition(ResourceState::Creating, ResourceState::Errored);
                Err(ReconcilerError::CreatedUnconfirmed {
                    id: created.id,
                    etag: created.etag,
                    caller_reference,
                    source: Box::new(cause),
                })
            }
        }
    }
}
