use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Bounded exponential backoff schedule for a single upstream call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 = no retry).
    pub max_attempts: u32,
    /// Wait before the first retry; doubles on each subsequent one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
        }
    }

    /// Backoff after failure number `attempt` (1-based): initial * 2^(attempt-1).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Progress annotation emitted while a retried operation is in flight.
/// `BackingOff` fires before each wait; `Recovered` fires when a call
/// succeeds after at least one retry so the caller can restore whatever
/// status line it overlaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryNote {
    BackingOff { wait: Duration, attempt: u32 },
    Recovered,
}

/// Run `operation`, retrying failures that `is_retryable` classifies as
/// transient with exponential backoff. Fatal failures and exhausted
/// attempts propagate the last error unchanged.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut on_note: impl FnMut(RetryNote),
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    on_note(RetryNote::Recovered);
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let wait = policy.backoff_for(attempt);
                on_note(RetryNote::BackingOff { wait, attempt });
                sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
