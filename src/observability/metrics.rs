//! # Metrics
//!
//! Prometheus metrics for monitoring the reconciler.
//!
//! ## Metrics Exposed
//!
//! - `fle_profile_operations_total` - Reconciler operations by operation and outcome
//! - `fle_profile_operation_duration_seconds` - Duration of reconciler operations
//! - `fle_profile_remote_retries_total` - Backed-off retries of control plane calls
//! - `fle_profile_drift_total` - Drift reports produced by refreshes, by kind

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REGISTERED: AtomicBool = AtomicBool::new(false);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "fle_profile_operations_total",
            "Total number of reconciler operations by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "fle_profile_operation_duration_seconds",
            "Duration of reconciler operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static REMOTE_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "fle_profile_remote_retries_total",
            "Total number of backed-off retries of control plane calls",
        ),
        &["operation"],
    )
    .expect("Failed to create REMOTE_RETRIES_TOTAL metric - this should never happen")
});

static DRIFT_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "fle_profile_drift_total",
            "Total number of drift reports by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create DRIFT_TOTAL metric - this should never happen")
});

/// Register all metrics with the crate registry. Safe to call more than once.
///
/// # Errors
///
/// Returns an error if a metric cannot be registered.
pub fn register_metrics() -> Result<()> {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    let result = register_all();
    if result.is_err() {
        REGISTERED.store(false, Ordering::SeqCst);
    }
    result
}

fn register_all() -> Result<()> {
    REGISTRY.register(Box::new(OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REMOTE_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DRIFT_TOTAL.clone()))?;
    Ok(())
}

/// Render every registered metric in the Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

pub fn record_operation(operation: &str, outcome: &str, duration: f64) {
    OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_remote_retries(operation: &str) {
    REMOTE_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_drift(kind: &str) {
    DRIFT_TOTAL.with_label_values(&[kind]).inc();
}
