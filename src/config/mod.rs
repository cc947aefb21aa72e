//! # Reconciler Configuration
//!
//! Reconciler-level settings loaded from environment variables.

use crate::controller::backoff::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// What to do when the desired `name` differs from the last-known remote name.
///
/// A profile's name is fixed once created, so a rename is a replacement unless
/// the operator opts into sending it through an ordinary update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameChangePolicy {
    /// Send the new name in an ordinary update
    UpdateInPlace,
    /// Plan a delete followed by a create
    #[default]
    Recreate,
}

impl NameChangePolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NameChangePolicy::UpdateInPlace => "update-in-place",
            NameChangePolicy::Recreate => "recreate",
        }
    }
}

impl FromStr for NameChangePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update-in-place" | "update" | "in-place" => Ok(NameChangePolicy::UpdateInPlace),
            "recreate" | "replace" => Ok(NameChangePolicy::Recreate),
            other => Err(format!("unknown name change policy '{other}'")),
        }
    }
}

/// Reconciler-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    /// Exponential backoff starting value (milliseconds)
    pub backoff_base_ms: u64,
    /// Exponential backoff maximum value (milliseconds)
    pub backoff_max_ms: u64,
    /// Attempts allowed for a call that keeps failing transiently
    pub max_attempts: u32,
    /// Randomise each backoff delay between 0.5x and 1.5x
    pub backoff_jitter: bool,
    /// Overall deadline applied by callers that do not supply their own (seconds)
    pub operation_timeout_secs: u64,
    /// Rename handling
    pub name_change_policy: NameChangePolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_jitter: true,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            name_change_policy: NameChangePolicy::default(),
        }
    }
}

impl ReconcilerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            backoff_base_ms: env_var_or_default("FLE_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            backoff_max_ms: env_var_or_default("FLE_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            max_attempts: env_var_or_default("FLE_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            backoff_jitter: env_var_or_default_bool("FLE_BACKOFF_JITTER", true),
            operation_timeout_secs: env_var_or_default(
                "FLE_OPERATION_TIMEOUT_SECS",
                DEFAULT_OPERATION_TIMEOUT_SECS,
            ),
            name_change_policy: env_var_or_default(
                "FLE_NAME_CHANGE_POLICY",
                NameChangePolicy::default(),
            ),
        }
    }

    /// Retry policy for transient remote failures
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            max_attempts: self.max_attempts.max(1),
            jitter: self.backoff_jitter,
        }
    }

    /// Get the default operation deadline as a duration
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}
