//! # Exponential Backoff
//!
//! Provides an exponential backoff with optional jitter for retrying transient
//! control plane failures.
//!
//! Sequence without jitter for a 1s base and 30s cap: 1s, 2s, 4s, 8s, 16s, 30s, 30s...
//! With jitter each delay is scaled by a random factor between 0.5 and 1.5 so
//! that many resources failing together do not retry in lockstep. A jittered
//! delay never exceeds the cap.
//!
//! ## Usage
//!
//! ```rust
//! use fle_profile_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(4));
//! ```

use crate::constants::{BACKOFF_MULTIPLIER, JITTER_HIGH, JITTER_LOW};
use rand::Rng;
use std::time::Duration;

/// Retry policy for calls that fail transiently
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay (before jitter)
    pub max_delay: Duration,
    /// Total attempts including the first; at least 1
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        crate::config::ReconcilerConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// A policy with a fixed attempt budget and no jitter, convenient for tests
    #[must_use]
    pub fn fixed(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
            jitter: false,
        }
    }

    /// Start a fresh backoff sequence for one call
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        let backoff = ExponentialBackoff::new(self.base_delay, self.max_delay);
        if self.jitter {
            backoff.with_jitter()
        } else {
            backoff
        }
    }
}

/// Exponential backoff calculator
///
/// Each delay is the previous one multiplied by two, capped at `max`.
/// Jitter, when enabled, is applied to the returned value only; the
/// underlying sequence stays deterministic.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Starting delay (for reset)
    base: Duration,
    /// Delay returned by the next call
    current: Duration,
    /// Cap on the sequence
    max: Duration,
    jitter: bool,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff without jitter
    ///
    /// # Example
    ///
    /// ```
    /// use fle_profile_controller::controller::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    ///
    /// let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(5));
    /// ```
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            current: base.min(max),
            max,
            jitter: false,
        }
    }

    /// Randomise every returned delay between 0.5x and 1.5x, still capped at `max`
    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = Duration::from_secs_f64(
            (self.current.as_secs_f64() * BACKOFF_MULTIPLIER).min(self.max.as_secs_f64()),
        );
        self.current = next;

        if self.jitter {
            let factor = rand::thread_rng().gen_range(JITTER_LOW..JITTER_HIGH);
            Duration::from_secs_f64(result.as_secs_f64() * factor).min(self.max)
        } else {
            result
        }
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.base.min(self.max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_sequence_caps_at_max() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));

        assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(4));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(8));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(16));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(30));
        // Should stay at max
        assert_eq!(backoff.next_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.next_backoff();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(1));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(4), Duration::from_secs(8)).with_jitter();

        for _ in 0..100 {
            backoff.reset();
            let delay = backoff.next_backoff();
            assert!(delay >= Duration::from_secs(2), "delay {delay:?} below 0.5x");
            assert!(delay <= Duration::from_secs(6), "delay {delay:?} above 1.5x");
        }
    }

    #[test]
    fn test_jitter_never_exceeds_cap() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30)).with_jitter();

        for _ in 0..100 {
            let delay = backoff.next_backoff();
            assert!(delay <= Duration::from_secs(30), "delay {delay:?} above cap");
        }
        // Once capped, jitter only ever shortens the delay
        assert!(backoff.next_backoff() >= Duration::from_secs(15));
    }

    #[test]
    fn test_base_above_max_is_clamped() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn test_policy_backoff_is_independent_per_call() {
        let policy = RetryPolicy::fixed(Duration::from_millis(10), Duration::from_millis(80), 5);
        let mut first = policy.backoff();
        let mut second = policy.backoff();

        assert_eq!(first.next_backoff(), Duration::from_millis(10));
        assert_eq!(first.next_backoff(), Duration::from_millis(20));
        assert_eq!(second.next_backoff(), Duration::from_millis(10));
    }
}
