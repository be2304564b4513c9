//! Keyed trailing-edge debouncing of numeric deltas.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use super::lock;

type Flush = Box<dyn FnOnce(i64) -> BoxFuture<'static, ()> + Send>;

struct Pending {
    delta: i64,
    flush: Flush,
    handle: JoinHandle<()>,
    generation: u64,
}

/// Accumulates deltas per key and flushes the sum once no push has arrived
/// for `window`.
///
/// Each push restarts the key's timer; the flush closure from the latest push
/// is the one that runs. A net delta of zero is dropped without flushing.
pub struct Debouncer<K> {
    window: Duration,
    pending: Arc<Mutex<HashMap<K, Pending>>>,
    generation: Arc<AtomicU64>,
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            pending: self.pending.clone(),
            generation: self.generation.clone(),
        }
    }
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Add `delta` to `key` and restart its timer. Must be called inside a
    /// tokio runtime.
    pub fn push<F, Fut>(&self, key: K, delta: i64, flush: F)
    where
        F: FnOnce(i64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut pending = lock(&self.pending);

        let total = match pending.remove(&key) {
            Some(old) => {
                old.handle.abort();
                old.delta.saturating_add(delta)
            }
            None => delta,
        };

        let map = self.pending.clone();
        let timer_key = key.clone();
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let due = {
                let mut map = lock(&map);
                match map.get(&timer_key) {
                    Some(p) if p.generation == generation => map.remove(&timer_key),
                    _ => None,
                }
            };
            if let Some(p) = due {
                if p.delta != 0 {
                    (p.flush)(p.delta).await;
                }
            }
        });

        pending.insert(
            key,
            Pending {
                delta: total,
                flush: Box::new(move |d| flush(d).boxed()),
                handle,
                generation,
            },
        );
    }

    /// Flush every pending key now, without waiting for the window.
    pub async fn flush_all(&self) {
        let due: Vec<Pending> = lock(&self.pending).drain().map(|(_, p)| p).collect();
        let flushes = due.into_iter().filter_map(|p| {
            p.handle.abort();
            (p.delta != 0).then(|| (p.flush)(p.delta))
        });
        join_all(flushes).await;
    }

    /// Drop the pending delta for `key` without flushing. Returns whether
    /// one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.pending).remove(key) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Drop pending deltas without flushing.
    pub fn cancel_all(&self) {
        for (_, p) in lock(&self.pending).drain() {
            p.handle.abort();
        }
    }

    pub fn pending_delta(&self, key: &K) -> Option<i64> {
        lock(&self.pending).get(key).map(|p| p.delta)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<(String, i64)>>>;

    fn recorder(log: &Log, key: &str) -> impl FnOnce(i64) -> BoxFuture<'static, ()> + Send {
        let log = log.clone();
        let key = key.to_string();
        move |delta| {
            async move {
                log.lock().unwrap().push((key, delta));
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_pushes_flush_once_with_net_delta() {
        let log: Log = Arc::default();
        let debouncer = Debouncer::new(Duration::from_millis(300));

        for _ in 0..5 {
            debouncer.push("v1-o1".to_string(), 1, recorder(&log, "v1-o1"));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(debouncer.pending_delta(&"v1-o1".to_string()), Some(5));
        assert!(log.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(*log.lock().unwrap(), vec![("v1-o1".to_string(), 5)]);
        assert!(debouncer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let log: Log = Arc::default();
        let debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.push("a".to_string(), 1, recorder(&log, "a"));
        debouncer.push("b".to_string(), -1, recorder(&log, "b"));
        debouncer.push("a".to_string(), 1, recorder(&log, "a"));

        tokio::time::sleep(Duration::from_millis(400)).await;
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![("a".to_string(), 2), ("b".to_string(), -1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_net_zero_is_dropped() {
        let log: Log = Arc::default();
        let debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.push("a".to_string(), 1, recorder(&log, "a"));
        debouncer.push("a".to_string(), -1, recorder(&log, "a"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_one_key() {
        let log: Log = Arc::default();
        let debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.push("a".to_string(), 2, recorder(&log, "a"));
        debouncer.push("b".to_string(), 1, recorder(&log, "b"));

        assert!(debouncer.cancel(&"a".to_string()));
        assert!(!debouncer.cancel(&"a".to_string()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*log.lock().unwrap(), vec![("b".to_string(), 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_fires_immediately() {
        let log: Log = Arc::default();
        let debouncer = Debouncer::new(Duration::from_secs(10));
        debouncer.push("a".to_string(), 3, recorder(&log, "a"));
        debouncer.flush_all().await;
        assert_eq!(*log.lock().unwrap(), vec![("a".to_string(), 3)]);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
