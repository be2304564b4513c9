//! Request de-duplication.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Entry lives only while the future is pending.
    Collapse,
    /// Entry is kept after completion until cleared.
    Memoize,
}

/// Registry of shared futures keyed by `K`.
///
/// Callers asking for a key that is already registered await the same
/// future instead of starting a new one.
pub struct InFlight<K, V: Clone> {
    entries: Arc<Mutex<HashMap<K, Shared<BoxFuture<'static, V>>>>>,
    mode: Mode,
}

impl<K, V: Clone> Clone for InFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            mode: self.mode,
        }
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Concurrent callers share one pending future; once it settles the next
    /// call starts fresh.
    pub fn collapsing() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            mode: Mode::Collapse,
        }
    }

    /// Every caller for a key gets the first result until [`clear`](Self::clear).
    pub fn memoizing() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            mode: Mode::Memoize,
        }
    }

    /// Await the registered future for `key`, starting it with `start` if
    /// there is none.
    pub async fn get_or_start<F, Fut>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let shared = {
            let mut entries = lock(&self.entries);
            match entries.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let fut = start().boxed().shared();
                    entries.insert(key.clone(), fut.clone());
                    fut
                }
            }
        };

        let value = shared.clone().await;

        if self.mode == Mode::Collapse {
            let mut entries = lock(&self.entries);
            if entries
                .get(&key)
                .is_some_and(|current| Shared::ptr_eq(current, &shared))
            {
                entries.remove(&key);
            }
        }
        value
    }

    pub fn forget(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a registered future for `key` has not completed.
    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.entries)
            .get(key)
            .is_some_and(|f| f.peek().is_none())
    }
}
