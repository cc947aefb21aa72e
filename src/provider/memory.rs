//! In-memory control plane
//!
//! Implements [`RemoteClient`] against a process-local map so the reconciler
//! can be exercised without network access. Besides the ordinary semantics
//! (unique names, etag checks, idempotent caller references) it can:
//!
//! - fail the next call of a given kind with a scripted [`Fault`]
//! - hide freshly created profiles from the first N reads (eventual consistency)
//! - delay every call by a fixed latency
//! - mutate or delete profiles out of band
//!
//! This is ephemeral - data does not persist across restarts.
//! Thread-safe using Arc<RwLock> for concurrent access.

use super::{ConflictKind, CreatedProfile, FetchedProfile, RemoteClient, RemoteError};
use crate::profile::wire::WirePayload;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// The four control plane calls, used to script faults and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCall {
    Create,
    Get,
    Update,
    Delete,
}

/// A scripted failure for the next call of one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub error: RemoteError,
    /// Apply the call before failing, as when a response is lost in transit
    pub apply_first: bool,
}

impl Fault {
    #[must_use]
    pub fn fail(error: RemoteError) -> Self {
        Self {
            error,
            apply_first: false,
        }
    }

    #[must_use]
    pub fn after_apply(error: RemoteError) -> Self {
        Self {
            error,
            apply_first: true,
        }
    }

    #[must_use]
    pub fn transient() -> Self {
        Self::fail(RemoteError::Transient("injected: service unavailable".to_string()))
    }
}

#[derive(Debug, Clone)]
struct StoredProfile {
    payload: WirePayload,
    etag: String,
}

#[derive(Debug, Default)]
struct State {
    profiles: HashMap<String, StoredProfile>,
    next_id: u64,
    next_version: u64,
    faults: HashMap<RemoteCall, VecDeque<Fault>>,
    calls: HashMap<RemoteCall, u32>,
    /// Remaining reads that report a profile as missing
    hidden_reads: HashMap<String, u32>,
    hide_new_profiles_for: u32,
    in_use: HashSet<String>,
}

/// In-memory [`RemoteClient`] with fault injection
#[derive(Clone, Debug, Default)]
pub struct InMemoryRemoteClient {
    state: Arc<RwLock<State>>,
    latency: Arc<RwLock<Duration>>,
}

impl InMemoryRemoteClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fault for the next call of the given kind
    pub async fn inject(&self, call: RemoteCall, fault: Fault) {
        let mut state = self.state.write().await;
        state.faults.entry(call).or_default().push_back(fault);
    }

    /// Report every profile created from now on as missing for its first `reads` reads
    pub async fn hide_new_profiles_for(&self, reads: u32) {
        self.state.write().await.hide_new_profiles_for = reads;
    }

    /// Delay every call by `latency`
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Number of calls of the given kind received so far, faulted or not
    pub async fn calls(&self, call: RemoteCall) -> u32 {
        self.state
            .read()
            .await
            .calls
            .get(&call)
            .copied()
            .unwrap_or(0)
    }

    /// Delete a profile behind the reconciler's back
    pub async fn remove_out_of_band(&self, id: &str) -> bool {
        self.state.write().await.profiles.remove(id).is_some()
    }

    /// Modify a profile behind the reconciler's back, bumping its etag
    pub async fn update_out_of_band<F>(&self, id: &str, change: F) -> Option<String>
    where
        F: FnOnce(&mut WirePayload),
    {
        let mut state = self.state.write().await;
        let etag = state.next_etag();
        let stored = state.profiles.get_mut(id)?;
        change(&mut stored.payload);
        stored.etag.clone_from(&etag);
        Some(etag)
    }

    /// Mark a profile as referenced by an encryption configuration
    pub async fn set_in_use(&self, id: &str, in_use: bool) {
        let mut state = self.state.write().await;
        if in_use {
            state.in_use.insert(id.to_string());
        } else {
            state.in_use.remove(id);
        }
    }

    /// Current stored profile, without counting a call or consuming hidden reads
    pub async fn snapshot(&self, id: &str) -> Option<FetchedProfile> {
        self.state
            .read()
            .await
            .profiles
            .get(id)
            .map(|stored| FetchedProfile {
                payload: stored.payload.clone(),
                etag: stored.etag.clone(),
            })
    }

    /// Number of stored profiles
    pub async fn len(&self) -> usize {
        self.state.read().await.profiles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl State {
    fn next_etag(&mut self) -> String {
        self.next_version += 1;
        format!("E{:08X}", self.next_version)
    }

    /// Count the call and take its scripted fault, if any
    fn begin(&mut self, call: RemoteCall) -> Option<Fault> {
        *self.calls.entry(call).or_insert(0) += 1;
        self.faults.get_mut(&call).and_then(VecDeque::pop_front)
    }

    fn name_taken_by_other(&self, name: &str, id: Option<&str>) -> bool {
        self.profiles
            .iter()
            .any(|(other_id, stored)| stored.payload.name == name && Some(other_id.as_str()) != id)
    }

    fn apply_create(&mut self, payload: &WirePayload) -> Result<CreatedProfile, RemoteError> {
        payload
            .validate()
            .map_err(|e| RemoteError::Invalid(e.to_string()))?;

        if let Some((id, stored)) = self
            .profiles
            .iter()
            .find(|(_, stored)| stored.payload.caller_reference == payload.caller_reference)
        {
            // Same caller reference with the same configuration is a replay
            if stored.payload == *payload {
                return Ok(CreatedProfile {
                    id: id.clone(),
                    etag: stored.etag.clone(),
                });
            }
            return Err(RemoteError::conflict(
                ConflictKind::NameTaken,
                format!(
                    "caller reference {} already used by profile {id}",
                    payload.caller_reference
                ),
            ));
        }

        if self.name_taken_by_other(&payload.name, None) {
            return Err(RemoteError::conflict(
                ConflictKind::NameTaken,
                format!("a profile named {} already exists", payload.name),
            ));
        }

        self.next_id += 1;
        let id = format!("FLE{:010}", self.next_id);
        let etag = self.next_etag();
        self.profiles.insert(
            id.clone(),
            StoredProfile {
                payload: payload.clone(),
                etag: etag.clone(),
            },
        );
        if self.hide_new_profiles_for > 0 {
            self.hidden_reads
                .insert(id.clone(), self.hide_new_profiles_for);
        }
        debug!(profile.id = %id, etag = %etag, "Stored new profile");
        Ok(CreatedProfile { id, etag })
    }

    fn apply_get(&mut self, id: &str) -> Result<FetchedProfile, RemoteError> {
        if let Some(remaining) = self.hidden_reads.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::NotFound(id.to_string()));
            }
        }
        self.profiles
            .get(id)
            .map(|stored| FetchedProfile {
                payload: stored.payload.clone(),
                etag: stored.etag.clone(),
            })
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))
    }

    fn apply_update(
        &mut self,
        id: &str,
        etag: &str,
        payload: &WirePayload,
    ) -> Result<String, RemoteError> {
        payload
            .validate()
            .map_err(|e| RemoteError::Invalid(e.to_string()))?;
        let stored = self
            .profiles
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if stored.etag != etag {
            return Err(RemoteError::conflict(
                ConflictKind::StaleEtag,
                format!("etag {etag} does not match current version {}", stored.etag),
            ));
        }
        if stored.payload.caller_reference != payload.caller_reference {
            return Err(RemoteError::Invalid(
                "caller reference cannot be changed".to_string(),
            ));
        }
        if self.name_taken_by_other(&payload.name, Some(id)) {
            return Err(RemoteError::conflict(
                ConflictKind::NameTaken,
                format!("a profile named {} already exists", payload.name),
            ));
        }

        let new_etag = self.next_etag();
        if let Some(stored) = self.profiles.get_mut(id) {
            stored.payload = payload.clone();
            stored.etag.clone_from(&new_etag);
        }
        debug!(profile.id = %id, etag = %new_etag, "Updated profile");
        Ok(new_etag)
    }

    fn apply_delete(&mut self, id: &str, etag: &str) -> Result<(), RemoteError> {
        let stored = self
            .profiles
            .get(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if stored.etag != etag {
            return Err(RemoteError::conflict(
                ConflictKind::StaleEtag,
                format!("etag {etag} does not match current version {}", stored.etag),
            ));
        }
        if self.in_use.contains(id) {
            return Err(RemoteError::conflict(
                ConflictKind::InUse,
                format!("profile {id} is referenced by an encryption configuration"),
            ));
        }
        self.profiles.remove(id);
        self.hidden_reads.remove(id);
        debug!(profile.id = %id, "Deleted profile");
        Ok(())
    }
}

/// Run `apply` unless a fault says otherwise
fn with_fault<T>(
    fault: Option<Fault>,
    apply: impl FnOnce() -> Result<T, RemoteError>,
) -> Result<T, RemoteError> {
    match fault {
        None => apply(),
        Some(fault) if fault.apply_first => {
            if let Err(e) = apply() {
                debug!(error = %e, "Applied call failed before injected fault");
            }
            Err(fault.error)
        }
        Some(fault) => Err(fault.error),
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemoteClient {
    async fn create(&self, payload: &WirePayload) -> Result<CreatedProfile, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let fault = state.begin(RemoteCall::Create);
        with_fault(fault, || state.apply_create(payload))
    }

    async fn get(&self, id: &str) -> Result<FetchedProfile, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let fault = state.begin(RemoteCall::Get);
        with_fault(fault, || state.apply_get(id))
    }

    async fn update(
        &self,
        id: &str,
        etag: &str,
        payload: &WirePayload,
    ) -> Result<String, RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let fault = state.begin(RemoteCall::Update);
        with_fault(fault, || state.apply_update(id, etag, payload))
    }

    async fn delete(&self, id: &str, etag: &str) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        let mut state = self.state.write().await;
        let fault = state.begin(RemoteCall::Delete);
        with_fault(fault, || state.apply_delete(id, etag))
    }
}
