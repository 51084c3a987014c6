//! Retry scheduling for indexer calls
//!
//! Indexer queries retry transient failures a handful of times with
//! exponentially spaced, jittered waits. Client errors surface
//! immediately, and once the schedule runs dry the last error is
//! returned as-is; the orchestrator treats any indexer failure as an
//! empty result set.

use crate::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// The waits between attempts, fixed up front. Each wait is widened by
/// a random spread so concurrent requests against the same upstream
/// don't retry in lockstep.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    waits: Vec<Duration>,
    spread: f64,
}

impl RetrySchedule {
    /// Indexer profile: three retries after the first attempt, spaced
    /// out to roughly a quarter second, one second, and four seconds.
    pub fn indexer() -> Self {
        RetrySchedule {
            waits: vec![
                Duration::from_millis(250),
                Duration::from_secs(1),
                Duration::from_secs(4),
            ],
            spread: 0.5,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        RetrySchedule {
            waits: Vec::new(),
            spread: 0.0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.waits.len() + 1
    }

    fn widen(&self, base: Duration) -> Duration {
        if self.spread <= 0.0 {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..self.spread);
        base.mul_f64(factor)
    }
}

/// Run `operation`, retrying transient failures per the schedule.
pub async fn with_retries<F, Fut, T>(
    schedule: &RetrySchedule,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut waits = schedule.waits.iter();
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_transient() => {
                debug!("{label}: not retrying: {error}");
                return Err(error);
            }
            Err(error) => match waits.next() {
                Some(&base) => {
                    let wait = schedule.widen(base);
                    debug!("{label}: transient failure ({error}), next try in {wait:?}");
                    sleep(wait).await;
                }
                None => {
                    warn!(
                        "{label}: still failing after {} attempts: {error}",
                        schedule.attempts()
                    );
                    return Err(error);
                }
            },
        }
    }
}
