//! Bounded fan-out over a batch of work items.
//!
//! A sliding window of `limit` futures: item `i + limit` starts as soon as
//! any in-flight item finishes, not when a whole batch has drained. Results
//! land in the slot of their input, whatever order they complete in.

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    limit: usize,
    timeout: Option<Duration>,
}

impl WorkerPool {
    /// A pool running at most `limit` items at once (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            timeout: None,
        }
    }

    /// Fail any single item that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `work` over every item. One item failing or timing out leaves its
    /// own slot as `Err` and does not cancel its siblings.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, work: F) -> Vec<Result<T, SyncError>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let total = items.len();
        let timeout = self.timeout;
        let work = &work;

        let mut slots: Vec<Option<Result<T, SyncError>>> = (0..total).map(|_| None).collect();
        let mut completed = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move {
                let fut = work(item);
                let result = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(SyncError::Timeout {
                            label: format!("work item {index}"),
                        }),
                    },
                    None => fut.await,
                };
                (index, result)
            })
            .buffer_unordered(self.limit);

        while let Some((index, result)) = completed.next().await {
            if let Err(e) = &result {
                debug!(index, error = %e, "work item failed");
            }
            slots[index] = Some(result);
        }

        let failed = slots.iter().filter(|s| matches!(s, Some(Err(_)))).count();
        if failed > 0 {
            warn!(total, failed, "worker pool finished with failures");
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(SyncError::Schema("work item produced no result".to_string()))
                })
            })
            .collect()
    }
}

/// Linear backoff between attempts: `base + attempt * step`.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub attempts: u32,
    pub base: Duration,
    pub step: Duration,
}

impl Retry {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base + self.step * attempt
    }

    /// Run `op` up to `attempts` times, sleeping between transient failures.
    /// A permanent error (see [`SyncError::is_transient`]) is returned at
    /// once; otherwise the last error is returned when every attempt fails.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts || !e.is_transient() => return Err(e),
                Err(e) => {
                    let delay = self.delay(attempt);
                    debug!(label, attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
