//! # Commands
//!
//! `flectl` subcommands. Each one works on the tracked record in the state
//! file and leaves the updated record there for the caller to persist.

use crate::state::StateFile;
use anyhow::{bail, Context, Result};
use fle_profile_controller::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Read a desired spec from a YAML file
pub fn load_spec(path: &Path) -> Result<DesiredSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file {}", path.display()))?;
    let spec: DesiredSpec = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse spec file {}", path.display()))?;
    spec.validate()
        .with_context(|| format!("Invalid spec in {}", path.display()))?;
    Ok(spec)
}

/// Refresh the tracked record, returning `None` if nothing is tracked or it vanished
async fn refresh_tracked(
    reconciler: &Reconciler,
    state: &StateFile,
) -> Result<Option<RemoteRecord>> {
    let Some(record) = &state.record else {
        return Ok(None);
    };
    let outcome = reconciler.read(record).await?;
    if outcome.drift == DriftReport::Vanished {
        warn!(profile.id = %record.id, "Tracked profile was deleted outside flectl");
    }
    Ok(outcome.record)
}

/// Preview the changes `apply` would make. The state file is not modified.
pub async fn plan(
    reconciler: &Reconciler,
    state: &StateFile,
    desired: &DesiredSpec,
) -> Result<Plan> {
    let last_known = refresh_tracked(reconciler, state).await?;
    Ok(reconciler.plan(desired, last_known.as_ref()))
}

/// Bring the remote profile to `desired`
pub async fn apply(
    reconciler: &Reconciler,
    state: &mut StateFile,
    desired: &DesiredSpec,
) -> Result<Plan> {
    state.record = refresh_tracked(reconciler, state).await?;
    if let Some(pending) = state.record.as_ref().filter(|record| record.pending) {
        bail!(
            "Profile {} was created but is not readable yet; run `flectl refresh` later",
            pending.id
        );
    }
    let plan = reconciler.plan(desired, state.record.as_ref());
    info!(plan = %plan, "Applying");

    match (&plan, state.record.clone()) {
        (Plan::Noop, _) => {}
        (Plan::WillCreate, _) => create_tracked(reconciler, state, desired).await?,
        (Plan::WillUpdate(_), Some(current)) => {
            let outcome = reconciler.update(&current, desired).await?;
            state.record = outcome.record;
        }
        (Plan::WillRecreate, Some(current)) => {
            reconciler.delete(&current.id, &current.etag).await?;
            state.record = None;
            create_tracked(reconciler, state, desired).await?;
        }
        (Plan::WillUpdate(_) | Plan::WillRecreate, None) => {
            bail!("plan {plan} requires a tracked profile")
        }
    }
    Ok(plan)
}

async fn create_tracked(
    reconciler: &Reconciler,
    state: &mut StateFile,
    desired: &DesiredSpec,
) -> Result<()> {
    match reconciler.create(desired).await {
        Ok(outcome) => {
            state.record = outcome.record;
            Ok(())
        }
        Err(e) => {
            // An unconfirmed create is tracked anyway so a later refresh adopts it
            if let Some(pending) = e.unconfirmed_record(desired) {
                state.record = Some(pending);
                return Err(e)
                    .context("Profile was created but is not readable yet; run `flectl refresh`");
            }
            Err(e.into())
        }
    }
}

/// Refresh the tracked record and report drift
pub async fn refresh(reconciler: &Reconciler, state: &mut StateFile) -> Result<DriftReport> {
    let Some(record) = state.record.clone() else {
        bail!("No profile is tracked; use `flectl apply` or `flectl import` first");
    };
    let outcome = reconciler.read(&record).await?;
    state.record = outcome.record;
    Ok(outcome.drift)
}

/// Start tracking an existing profile
pub async fn import(
    reconciler: &Reconciler,
    state: &mut StateFile,
    id: &str,
) -> Result<RemoteRecord> {
    if let Some(existing) = &state.record {
        bail!("State already tracks profile {}", existing.id);
    }
    let outcome = reconciler.import(id).await?;
    state.record = outcome.record;
    state
        .record
        .clone()
        .context("Import returned no record")
}

/// Delete the tracked profile. Returns false when nothing was tracked.
pub async fn destroy(reconciler: &Reconciler, state: &mut StateFile) -> Result<bool> {
    let Some(record) = state.record.clone() else {
        return Ok(false);
    };
    if record.pending {
        bail!(
            "Profile {} is not confirmed yet; run `flectl refresh` before destroying it",
            record.id
        );
    }
    reconciler.delete(&record.id, &record.etag).await?;
    state.record = None;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fle_profile_controller::provider::memory::{InMemoryRemoteClient, RemoteCall};
    use std::sync::Arc;
    use std::time::Duration;

    fn reconciler(client: &InMemoryRemoteClient, policy: NameChangePolicy) -> Reconciler {
        let config = ReconcilerConfig {
            name_change_policy: policy,
            ..ReconcilerConfig::default()
        };
        Reconciler::new(Arc::new(client.clone()), config).with_retry_policy(RetryPolicy::fixed(
            Duration::from_millis(1),
            Duration::from_millis(5),
            3,
        ))
    }

    fn spec(name: &str, patterns: &[&str]) -> DesiredSpec {
        DesiredSpec::new(
            name,
            "",
            vec![EncryptionEntity::new("pk-1", name, patterns.iter().copied())],
        )
    }

    #[test]
    fn test_load_spec_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(
            &path,
            "name: tf-acc-test-1\n\
             comment: some comment\n\
             encryption_entities:\n\
             \x20 - public_key_id: pk-1\n\
             \x20   provider_id: tf-acc-test-1\n\
             \x20   field_patterns: [DateOfBirth]\n",
        )
        .unwrap();

        let loaded = load_spec(&path).unwrap();
        assert_eq!(loaded.name, "tf-acc-test-1");
        assert_eq!(loaded.entities[0].field_patterns, vec!["DateOfBirth"]);
    }

    #[test]
    fn test_load_spec_rejects_invalid_spec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, "name: p\nencryption_entities: []\n").unwrap();
        assert!(load_spec(&path).is_err());
    }

    #[tokio::test]
    async fn test_apply_creates_then_updates_then_noops() {
        let client = InMemoryRemoteClient::new();
        let reconciler = reconciler(&client, NameChangePolicy::UpdateInPlace);
        let mut state = StateFile::default();

        let plan = apply(&reconciler, &mut state, &spec("a", &["X"])).await.unwrap();
        assert_eq!(plan, Plan::WillCreate);
        let created = state.record.clone().unwrap();

        let plan = apply(&reconciler, &mut state, &spec("a", &["X", "Y"]))
            .await
            .unwrap();
        assert!(matches!(plan, Plan::WillUpdate(_)));
        let updated = state.record.clone().unwrap();
        assert_eq!(updated.id, created.id);
        assert_ne!(updated.etag, created.etag);

        let plan = apply(&reconciler, &mut state, &spec("a", &["Y", "X"]))
            .await
            .unwrap();
        assert!(plan.is_noop());
        assert_eq!(client.calls(RemoteCall::Update).await, 1);
    }

    #[tokio::test]
    async fn test_apply_recreates_vanished_profile() {
        let client = InMemoryRemoteClient::new();
        let reconciler = reconciler(&client, NameChangePolicy::UpdateInPlace);
        let mut state = StateFile::default();
        apply(&reconciler, &mut state, &spec("a", &["X"])).await.unwrap();
        let first = state.record.clone().unwrap();

        client.remove_out_of_band(&first.id).await;

        let preview = plan(&reconciler, &state, &spec("a", &["X"])).await.unwrap();
        assert_eq!(preview, Plan::WillCreate);

        apply(&reconciler, &mut state, &spec("a", &["X"])).await.unwrap();
        assert_ne!(state.record.unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_rename_under_recreate_policy_replaces_profile() {
        let client = InMemoryRemoteClient::new();
        let reconciler = reconciler(&client, NameChangePolicy::Recreate);
        let mut state = StateFile::default();
        apply(&reconciler, &mut state, &spec("a", &["X"])).await.unwrap();
        let first = state.record.clone().unwrap();

        let plan = apply(&reconciler, &mut state, &spec("b", &["X"])).await.unwrap();

        assert_eq!(plan, Plan::WillRecreate);
        let second = state.record.unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(second.spec.name, "b");
        assert_eq!(client.len().await, 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_create_survives_refresh_until_adopted() {
        let client = InMemoryRemoteClient::new();
        // Three reads per call: create confirmation, refresh, apply's refresh,
        // then two more before the profile shows up
        client.hide_new_profiles_for(11).await;
        let reconciler = reconciler(&client, NameChangePolicy::Recreate);
        let mut state = StateFile::default();

        assert!(apply(&reconciler, &mut state, &spec("a", &["X"])).await.is_err());
        let pending = state.record.clone().unwrap();
        assert!(pending.pending);
        let stored = client.snapshot(&pending.id).await.unwrap();
        assert_eq!(pending.caller_reference, stored.payload.caller_reference);

        // Still hidden: kept as pending, never reported as vanished
        let drift = refresh(&reconciler, &mut state).await.unwrap();
        assert_eq!(drift, DriftReport::Pending);
        assert_eq!(state.record.as_ref(), Some(&pending));

        // Neither a second create nor a blind delete while unconfirmed
        assert!(apply(&reconciler, &mut state, &spec("a", &["X"])).await.is_err());
        assert!(destroy(&reconciler, &mut state).await.is_err());
        assert_eq!(state.record.as_ref(), Some(&pending));
        assert_eq!(client.calls(RemoteCall::Create).await, 1);
        assert_eq!(client.calls(RemoteCall::Delete).await, 0);

        // Visible now: adopted under the same identifier
        let drift = refresh(&reconciler, &mut state).await.unwrap();
        assert!(drift.is_in_sync());
        let adopted = state.record.clone().unwrap();
        assert_eq!(adopted.id, pending.id);
        assert!(!adopted.pending);

        let plan = apply(&reconciler, &mut state, &spec("a", &["X"])).await.unwrap();
        assert!(plan.is_noop());
        assert_eq!(client.len().await, 1);
    }

    #[tokio::test]
    async fn test_import_refresh_destroy() {
        let client = InMemoryRemoteClient::new();
        let reconciler = reconciler(&client, NameChangePolicy::UpdateInPlace);
        let mut seed = StateFile::default();
        apply(&reconciler, &mut seed, &spec("a", &["X"])).await.unwrap();
        let id = seed.record.unwrap().id;

        let mut state = StateFile::default();
        let record = import(&reconciler, &mut state, &id).await.unwrap();
        assert_eq!(record.spec.name, "a");
        assert!(import(&reconciler, &mut state, &id).await.is_err());

        client
            .update_out_of_band(&id, |payload| payload.comment = Some("edited".to_string()))
            .await;
        let drift = refresh(&reconciler, &mut state).await.unwrap();
        assert!(matches!(drift, DriftReport::Modified(_)));

        assert!(destroy(&reconciler, &mut state).await.unwrap());
        assert!(!destroy(&reconciler, &mut state).await.unwrap());
        assert!(client.is_empty().await);
    }

    #[tokio::test]
    async fn test_in_use_profile_is_not_destroyed() {
        let client = InMemoryRemoteClient::new();
        let reconciler = reconciler(&client, NameChangePolicy::UpdateInPlace);
        let mut state = StateFile::default();
        apply(&reconciler, &mut state, &spec("a", &["X"])).await.unwrap();
        let id = state.record.clone().unwrap().id;
        client.set_in_use(&id, true).await;

        assert!(destroy(&reconciler, &mut state).await.is_err());
        assert!(state.record.is_some());
    }
}
