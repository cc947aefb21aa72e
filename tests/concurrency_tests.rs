//! # Optimistic Concurrency Tests
//!
//! Etag conflict handling and partial-success resolution for update and delete.
//!
//! These tests verify:
//! - One stale-etag conflict is absorbed by a single re-read and retry
//! - Two consecutive conflicts escalate instead of looping
//! - A lost update or delete response is resolved by reading before failing
//! - Independent profiles reconcile concurrently through one reconciler

mod common;

use common::{acceptance_spec, reconciler, MAX_ATTEMPTS};
use fle_profile_controller::prelude::*;
use fle_profile_controller::provider::memory::{Fault, InMemoryRemoteClient, RemoteCall};

fn stale() -> Fault {
    Fault::fail(RemoteError::conflict(
        ConflictKind::StaleEtag,
        "injected: etag mismatch",
    ))
}

fn lost_response() -> Fault {
    Fault::after_apply(RemoteError::Transient(
        "injected: connection reset".to_string(),
    ))
}

async fn created(client: &InMemoryRemoteClient, reconciler: &Reconciler) -> RemoteRecord {
    let record = reconciler
        .create(&acceptance_spec(&["DateOfBirth"]))
        .await
        .unwrap()
        .record
        .unwrap();
    assert_eq!(client.calls(RemoteCall::Update).await, 0);
    record
}

#[tokio::test]
async fn test_single_conflict_is_retried_once() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    client.inject(RemoteCall::Update, stale()).await;

    let outcome = reconciler
        .update(&record, &acceptance_spec(&["DateOfBirth", "FirstName"]))
        .await
        .unwrap();

    assert_eq!(client.calls(RemoteCall::Update).await, 2);
    assert_ne!(outcome.record.unwrap().etag, record.etag);
}

#[tokio::test]
async fn test_second_conflict_escalates() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    client.inject(RemoteCall::Update, stale()).await;
    client.inject(RemoteCall::Update, stale()).await;

    let err = reconciler
        .update(&record, &acceptance_spec(&["DateOfBirth", "FirstName"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::Conflict {
            kind: ConflictKind::StaleEtag,
            operation: Operation::Update,
            ..
        }
    ));
    assert_eq!(client.calls(RemoteCall::Update).await, 2);
    assert_eq!(err.state_after(), ResourceState::Present);
}

#[tokio::test]
async fn test_concurrent_writer_is_overridden_after_reread() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    let external_etag = client
        .update_out_of_band(&record.id, |payload| {
            payload.comment = Some("other writer".to_string());
        })
        .await
        .unwrap();

    let outcome = reconciler
        .update(&record, &acceptance_spec(&["DateOfBirth", "FirstName"]))
        .await
        .unwrap();

    let updated = outcome.record.unwrap();
    assert_ne!(updated.etag, external_etag);
    let stored = client.snapshot(&record.id).await.unwrap();
    assert_eq!(stored.etag, updated.etag);
    assert_eq!(stored.payload.comment.as_deref(), Some("some comment"));
}

#[tokio::test]
async fn test_conflict_with_matching_remote_skips_second_update() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    let desired = acceptance_spec(&["DateOfBirth", "FirstName"]);

    // Another writer already applied the same change
    client
        .update_out_of_band(&record.id, |payload| {
            let patterns = &mut payload.encryption_entities.items[0].field_patterns;
            patterns.items.push("FirstName".to_string());
            patterns.quantity = 2;
        })
        .await
        .unwrap();

    let outcome = reconciler.update(&record, &desired).await.unwrap();

    assert_eq!(client.calls(RemoteCall::Update).await, 1);
    assert!(equivalent(&outcome.record.unwrap().spec, &desired));
}

#[tokio::test]
async fn test_lost_update_response_is_resolved_by_reread() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    client.inject(RemoteCall::Update, lost_response()).await;
    let desired = acceptance_spec(&["DateOfBirth", "FirstName"]);

    // The retry presents the pre-update etag and conflicts; the re-read shows
    // the change already landed
    let outcome = reconciler.update(&record, &desired).await.unwrap();

    assert_eq!(client.calls(RemoteCall::Update).await, 2);
    let updated = outcome.record.unwrap();
    assert_eq!(
        updated.etag,
        client.snapshot(&record.id).await.unwrap().etag
    );
}

#[tokio::test]
async fn test_exhausted_update_settles_with_a_read() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    let desired = acceptance_spec(&["DateOfBirth", "FirstName"]);

    // First attempt lands but reports failure; every retry fails outright
    client.inject(RemoteCall::Update, lost_response()).await;
    for _ in 1..MAX_ATTEMPTS {
        client.inject(RemoteCall::Update, Fault::transient()).await;
    }

    let outcome = reconciler.update(&record, &desired).await.unwrap();

    assert_eq!(client.calls(RemoteCall::Update).await, MAX_ATTEMPTS);
    assert!(equivalent(&outcome.record.unwrap().spec, &desired));
}

#[tokio::test]
async fn test_exhausted_update_that_never_landed_fails() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    for _ in 0..MAX_ATTEMPTS {
        client.inject(RemoteCall::Update, Fault::transient()).await;
    }

    let err = reconciler
        .update(&record, &acceptance_spec(&["DateOfBirth", "FirstName"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcilerError::Transient { attempts, .. } if attempts == MAX_ATTEMPTS
    ));
    assert_eq!(
        client.snapshot(&record.id).await.unwrap().etag,
        record.etag
    );
}

#[tokio::test]
async fn test_delete_with_stale_etag_retries_with_fresh_one() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    client
        .update_out_of_band(&record.id, |payload| payload.comment = None)
        .await
        .unwrap();

    reconciler.delete(&record.id, &record.etag).await.unwrap();

    assert_eq!(client.calls(RemoteCall::Delete).await, 2);
    assert!(client.is_empty().await);
}

#[tokio::test]
async fn test_delete_with_two_conflicts_escalates() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    client.inject(RemoteCall::Delete, stale()).await;
    client.inject(RemoteCall::Delete, stale()).await;

    let err = reconciler
        .delete(&record.id, &record.etag)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.state_after(), ResourceState::Present);
    assert!(client.snapshot(&record.id).await.is_some());
}

#[tokio::test]
async fn test_lost_delete_response_is_success() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);
    let record = created(&client, &reconciler).await;
    client.inject(RemoteCall::Delete, lost_response()).await;
    for _ in 1..MAX_ATTEMPTS {
        client.inject(RemoteCall::Delete, Fault::transient()).await;
    }

    let outcome = reconciler.delete(&record.id, &record.etag).await.unwrap();

    assert_eq!(outcome.state, ResourceState::Absent);
    assert!(client.is_empty().await);
}

#[tokio::test]
async fn test_independent_profiles_reconcile_concurrently() {
    let client = InMemoryRemoteClient::new();
    let reconciler = reconciler(&client);

    let specs: Vec<DesiredSpec> = (0..8)
        .map(|i| {
            DesiredSpec::new(
                format!("profile-{i}"),
                "",
                vec![EncryptionEntity::new("pk-1", "provider", ["DateOfBirth"])],
            )
        })
        .collect();

    let outcomes = futures::future::join_all(specs.iter().map(|spec| reconciler.create(spec))).await;

    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(client.len().await, 8);
}
