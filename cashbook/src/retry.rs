//! Uniform retry policy for contended summary writes
//!
//! The only retry loop in the system: every component that can hit a
//! compare-and-swap conflict on a daily summary row goes through
//! [`run_with_retry`]. Validation and not-found errors pass straight
//! through; only an explicit conflict outcome is retried.

use crate::config::RetryConfig;
use crate::{Error, Result};
use chrono::NaiveDate;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one optimistic attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// The write committed
    Done(T),
    /// Another writer won the compare-and-swap; re-read and try again
    Conflict,
}

/// Backoff before retrying after `attempt` failed attempts (1-based),
/// without jitter: `base_delay * 2^(attempt-1)`
pub fn backoff_base(config: &RetryConfig, attempt: u32) -> Duration {
    Duration::from_millis(config.base_delay_ms.saturating_mul(1u64 << (attempt - 1)))
}

fn backoff_with_jitter(config: &RetryConfig, attempt: u32) -> Duration {
    let jitter = if config.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..config.jitter_ms)
    };
    backoff_base(config, attempt) + Duration::from_millis(jitter)
}

/// Run an optimistic operation under the bounded retry policy
///
/// `operation` is invoked up to `max_attempts` times; each invocation must
/// re-read its inputs so a retry sees the state the winning writer left.
/// After exhausting the budget the conflict surfaces as
/// [`Error::Concurrency`] with a suggested retry-after.
pub async fn run_with_retry<T, F, Fut>(
    config: &RetryConfig,
    date: NaiveDate,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    for attempt in 1..=config.max_attempts {
        match operation().await? {
            Attempt::Done(value) => {
                if attempt > 1 {
                    debug!(
                        date = %date,
                        attempt,
                        "{} succeeded after retry",
                        operation_name
                    );
                }
                return Ok(value);
            }
            Attempt::Conflict if attempt < config.max_attempts => {
                let delay = backoff_with_jitter(config, attempt);
                warn!(
                    date = %date,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "{} hit a write conflict, backing off",
                    operation_name
                );
                tokio::time::sleep(delay).await;
            }
            Attempt::Conflict => {
                warn!(
                    date = %date,
                    attempts = config.max_attempts,
                    "{} exhausted its retry budget",
                    operation_name
                );
            }
        }
    }

    Err(Error::Concurrency {
        date,
        attempts: config.max_attempts,
        // The next backoff step the loop would have taken
        retry_after: backoff_base(config, config.max_attempts),
    })
}
