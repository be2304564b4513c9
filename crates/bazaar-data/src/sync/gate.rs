//! Bounded concurrency.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Caps how many futures run through it at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Run `fut` once a slot is free.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        // The semaphore is never closed, so acquire only fails if it is.
        let _permit = self.semaphore.acquire().await.ok();
        fut.await
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_limit() {
        let gate = ConcurrencyGate::new(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..12).map(|_| {
            let (active, peak, gate) = (active.clone(), peak.clone(), gate.clone());
            async move {
                gate.run(async {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }
        });
        join_all(tasks).await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(gate.available(), 3);
    }

    #[test]
    fn test_zero_limit() {
        assert_eq!(ConcurrencyGate::new(0).limit(), 1);
    }
}
