//! Request coalescing keyed by query parameters.
//!
//! The first caller for a key starts the computation; callers arriving while
//! it runs await the same shared future. The table entry removes itself when
//! the computation completes, so the next caller after that starts fresh
//! (normally after a cache lookup has already served it).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::debug;

type SharedResult<V, E> = Shared<BoxFuture<'static, Result<Arc<V>, E>>>;

/// Table of in-flight computations. Errors are shared with every waiter,
/// so `E` must be `Clone` (wrap non-clonable errors in an `Arc`).
pub struct InFlight<V, E> {
    pending: Arc<Mutex<HashMap<String, SharedResult<V, E>>>>,
}

impl<V, E> Default for InFlight<V, E> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V, E> InFlight<V, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `start()` for `key` unless a computation for it is already in
    /// flight, in which case join that one instead.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.run_then(key, start, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `store` with a successful result
    /// before the entry leaves the table. A caller arriving after completion
    /// therefore finds whatever `store` wrote (typically a cache entry).
    pub async fn run_then<F, Fut, S>(&self, key: &str, start: F, store: S) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        S: FnOnce(&Arc<V>) + Send + 'static,
    {
        let shared = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match pending.get(key) {
                Some(existing) => {
                    debug!(key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let table = Arc::clone(&self.pending);
                    let owned_key = key.to_string();
                    let work = start();
                    let fut = async move {
                        let result = work.await.map(Arc::new);
                        if let Ok(value) = &result {
                            store(value);
                        }
                        table
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    pending.insert(key.to_string(), fut.clone());
                    fut
                }
            }
        };
        shared.await
    }

    /// Number of keys currently in flight.
    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn slow_build(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = Result<u32, String>> + Send + 'static {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_computation() {
        let table: InFlight<u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (table_ref, calls_ref) = (&table, &calls);
        let callers = (0..8).map(move |i| table_ref.run("kpis", move || slow_build(calls_ref, i)));
        let results = futures::future::join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let first = results[0].as_ref().unwrap();
        for r in &results {
            assert!(Arc::ptr_eq(first, r.as_ref().unwrap()));
        }
        assert!(table.is_empty(), "entry removes itself on completion");
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_run_separately() {
        let table: InFlight<u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            table.run("roll:house:2025:1", || slow_build(&calls, 1)),
            table.run("roll:house:2025:2", || slow_build(&calls, 2)),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!((*a.unwrap(), *b.unwrap()), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_key_starts_fresh() {
        let table: InFlight<u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        table.run("k", || slow_build(&calls, 1)).await.unwrap();
        let second = table.run("k", || slow_build(&calls, 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*second, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn store_runs_once_before_release() {
        let table: InFlight<u32, String> = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let stored = Arc::new(Mutex::new(Vec::new()));

        let store = |sink: Arc<Mutex<Vec<u32>>>| move |v: &Arc<u32>| sink.lock().unwrap().push(**v);
        let (a, b) = tokio::join!(
            table.run_then("k", || slow_build(&calls, 7), store(stored.clone())),
            table.run_then("k", || slow_build(&calls, 8), store(stored.clone())),
        );
        assert_eq!((*a.unwrap(), *b.unwrap()), (7, 7));
        assert_eq!(*stored.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_reach_every_waiter() {
        let table: InFlight<u32, String> = InFlight::new();
        let failing = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u32, _>("roster unavailable".to_string())
        };

        let (a, b) = tokio::join!(table.run("k", failing), table.run("k", failing));
        assert_eq!(a.unwrap_err(), "roster unavailable");
        assert_eq!(b.unwrap_err(), "roster unavailable");
        assert!(table.is_empty());
    }
}
