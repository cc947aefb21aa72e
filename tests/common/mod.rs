//! Common test utilities for reconciler integration tests
//!
//! Provides a reconciler wired to the in-memory control plane with a small,
//! jitter-free retry policy, plus desired spec builders.

#![allow(dead_code, reason = "Not every test binary uses every helper")]

use fle_profile_controller::prelude::*;
use fle_profile_controller::provider::InMemoryRemoteClient;
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Route reconciler logs through the test harness's captured output
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("fle_profile_controller=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Attempts allowed per call by [`reconciler`]
pub const MAX_ATTEMPTS: u32 = 4;

/// Reconciler over `client` with millisecond backoff and no jitter
pub fn reconciler(client: &InMemoryRemoteClient) -> Reconciler {
    reconciler_with(client, ReconcilerConfig::default())
}

pub fn reconciler_with(client: &InMemoryRemoteClient, config: ReconcilerConfig) -> Reconciler {
    init_tracing();
    Reconciler::new(Arc::new(client.clone()), config).with_retry_policy(RetryPolicy::fixed(
        Duration::from_millis(1),
        Duration::from_millis(8),
        MAX_ATTEMPTS,
    ))
}

/// Reconciler with second-scale backoff, for tests running on paused time
pub fn paused_reconciler(client: &InMemoryRemoteClient, max_attempts: u32) -> Reconciler {
    init_tracing();
    Reconciler::new(Arc::new(client.clone()), ReconcilerConfig::default()).with_retry_policy(
        RetryPolicy::fixed(Duration::from_secs(1), Duration::from_secs(30), max_attempts),
    )
}

/// The acceptance profile: one entity bound to `pk-1`
pub fn acceptance_spec(patterns: &[&str]) -> DesiredSpec {
    DesiredSpec::new(
        "tf-acc-test-1",
        "some comment",
        vec![EncryptionEntity::new(
            "pk-1",
            "tf-acc-test-1",
            patterns.iter().copied(),
        )],
    )
}

/// A profile with two entities in the given order
pub fn two_entity_spec(name: &str, reversed: bool) -> DesiredSpec {
    let mut entities = vec![
        EncryptionEntity::new("pk-1", "provider-a", ["DateOfBirth", "FirstName"]),
        EncryptionEntity::new("pk-2", "provider-b", ["LastName"]),
    ];
    if reversed {
        entities.reverse();
        entities[1].field_patterns.reverse();
    }
    DesiredSpec::new(name, "two entities", entities)
}
