//! Latest-wins execution.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{AbortHandle, Abortable};

use super::lock;
use crate::FetchError;

/// Runs one future at a time; starting a new run aborts the previous one,
/// which then resolves to [`FetchError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Supersede {
    current: Arc<Mutex<Option<(u64, AbortHandle)>>>,
    next_id: Arc<AtomicU64>,
}

impl Supersede {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, T>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let (handle, registration) = AbortHandle::new_pair();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some((_, previous)) = lock(&self.current).replace((id, handle)) {
            previous.abort();
        }

        let result = Abortable::new(fut, registration).await;

        {
            let mut current = lock(&self.current);
            if matches!(*current, Some((running, _)) if running == id) {
                *current = None;
            }
        }

        result.unwrap_or(Err(FetchError::Cancelled))
    }

    /// Abort the running future, if any.
    pub fn cancel(&self) {
        if let Some((_, handle)) = lock(&self.current).take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.current).is_some()
    }
}
