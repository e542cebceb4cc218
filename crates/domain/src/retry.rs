//! Bounded retry of optimistic units of work.

use std::future::Future;

use crate::error::DomainError;

/// Default number of attempts before a conflict is surfaced to the caller.
pub const DEFAULT_CONFLICT_RETRY_LIMIT: u32 = 5;

/// How many times a unit of work is re-run from a fresh read after losing a
/// version race.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` attempts (at least one).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `attempt` until it succeeds, fails with anything other than a
    /// version conflict, or runs out of attempts.
    ///
    /// Each attempt must re-read everything it depends on.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        for n in 1..=self.max_attempts {
            match attempt().await {
                Err(e) if e.is_conflict() => {
                    metrics::counter!("unit_of_work_conflicts_total", "operation" => operation)
                        .increment(1);
                    tracing::debug!(operation, attempt = n, error = %e, "version conflict, retrying");
                }
                other => return other,
            }
        }

        tracing::warn!(
            operation,
            attempts = self.max_attempts,
            "giving up after repeated version conflicts"
        );
        Err(DomainError::Conflict {
            operation,
            attempts: self.max_attempts,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFLICT_RETRY_LIMIT)
    }
}
