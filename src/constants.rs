//! # Constants
//!
//! Shared constants used throughout the reconciler.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default number of attempts for a call that keeps failing transiently
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default overall deadline for one reconciler operation (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300;

/// Multiplier applied to the backoff delay after every failed attempt
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Lower bound of the jitter factor applied to a backoff delay
pub const JITTER_LOW: f64 = 0.5;

/// Upper bound of the jitter factor applied to a backoff delay
pub const JITTER_HIGH: f64 = 1.5;

/// Default tracing filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "fle_profile_controller=info";
