//! Bounded worker pools for shadow work.
//!
//! A [`WorkerPool`] caps how many of its tasks run at once with a tokio
//! semaphore. Submitting never blocks: the task is spawned immediately and
//! waits for a permit inside the runtime, so excess work queues instead of
//! pushing back on the caller. Each task inherits the submitter's
//! [`LogContext`] and tracing span.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::model::DEFAULT_POOL_SIZE;
use crate::logging::LogContext;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    size: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// A size of zero falls back to the default pool size.
    #[must_use]
    pub fn new(name: &'static str, size: usize) -> Self {
        let size = if size == 0 { DEFAULT_POOL_SIZE } else { size };
        Self {
            name,
            size,
            permits: Arc::new(Semaphore::new(size)),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    pub fn spawn<F>(&self, fut: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let context = LogContext::current();
        let span = tracing::Span::current();
        let name = self.name;

        tokio::spawn(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    tracing::warn!(pool = name, "worker pool closed, dropping task");
                    return None;
                };
                Some(context.scope(fut).await)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = WorkerPool::new("test", 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn tasks_inherit_log_context() {
        let pool = WorkerPool::new("test", 1);
        let ctx = LogContext::default().with("correlation_id", "c-1");

        let handle = ctx
            .scope(async { pool.spawn(async { LogContext::current() }) })
            .await;
        let seen = handle.await.unwrap().unwrap();

        assert_eq!(seen.get("correlation_id"), Some("c-1"));
    }

    #[test]
    fn zero_size_uses_default() {
        assert_eq!(WorkerPool::new("test", 0).size(), DEFAULT_POOL_SIZE);
    }
}
