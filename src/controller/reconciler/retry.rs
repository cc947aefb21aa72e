//! # Retry
//!
//! Deadline-bounded retry of control plane calls.
//!
//! Every call runs under the operation's [`Deadline`]. A failure accepted by
//! the retry predicate is retried after the next backoff delay until the
//! policy's attempt budget is spent. A delay that would end past the deadline
//! is not slept; the loop reports a timeout instead.

use super::types::{Operation, ReconcilerError};
use crate::controller::backoff::RetryPolicy;
use crate::observability::metrics;
use crate::provider::RemoteError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Point in time after which an operation gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline; only the attempt budget bounds retries
    #[must_use]
    pub fn unbounded() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    /// Time left, `None` when unbounded
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    fn allows_sleep(&self, delay: Duration) -> bool {
        match self.remaining() {
            Some(left) => delay < left,
            None => true,
        }
    }

    /// Drive `future` to completion, or return `None` once the deadline passes
    pub async fn run<F: Future>(&self, future: F) -> Option<F::Output> {
        match self.0 {
            Some(at) => tokio::time::timeout_at(at, future).await.ok(),
            None => Some(future.await),
        }
    }
}

/// Why a retried call gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RetryError {
    /// A failure the predicate did not accept
    Remote { error: RemoteError, attempts: u32 },
    /// Attempt budget spent; `last` is the final failure
    Exhausted { attempts: u32, last: RemoteError },
    /// The deadline passed during a call or would pass during the next delay
    Timeout { attempts: u32 },
}

impl RetryError {
    /// True when the outcome of the last call is unknown or was retryable
    pub(crate) fn is_escalated_transient(&self) -> bool {
        matches!(
            self,
            RetryError::Exhausted { .. } | RetryError::Timeout { .. }
        )
    }

    pub(crate) fn into_error(self, operation: Operation, resource: &str) -> ReconcilerError {
        match self {
            RetryError::Remote { error, attempts } => {
                ReconcilerError::from_remote(operation, resource, error, attempts)
            }
            RetryError::Exhausted { attempts, last } => ReconcilerError::Transient {
                operation,
                resource: resource.to_string(),
                attempts,
                source: last,
            },
            RetryError::Timeout { attempts } => ReconcilerError::Timeout {
                operation,
                resource: resource.to_string(),
                attempts,
            },
        }
    }
}

/// Retry `call` while it fails transiently
pub(crate) async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: Deadline,
    operation: Operation,
    call: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    retry_when(policy, deadline, operation, call, RemoteError::is_transient).await
}

/// Retry `call` while `should_retry` accepts its failure
pub(crate) async fn retry_when<T, F, Fut, P>(
    policy: &RetryPolicy,
    deadline: Deadline,
    operation: Operation,
    mut call: F,
    should_retry: P,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
    P: Fn(&RemoteError) -> bool,
{
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let error = match deadline.run(call()).await {
            None => return Err(RetryError::Timeout { attempts }),
            Some(Ok(value)) => return Ok(value),
            Some(Err(error)) if should_retry(&error) => error,
            Some(Err(error)) => return Err(RetryError::Remote { error, attempts }),
        };

        if attempts >= policy.max_attempts {
            return Err(RetryError::Exhausted {
                attempts,
                last: error,
            });
        }

        let delay = backoff.next_backoff();
        if !deadline.allows_sleep(delay) {
            return Err(RetryError::Timeout { attempts });
        }

        warn!(
            operation = operation.as_str(),
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Retrying control plane call"
        );
        metrics::increment_remote_retries(operation.as_str());
        tokio::time::sleep(delay).await;
    }
}
