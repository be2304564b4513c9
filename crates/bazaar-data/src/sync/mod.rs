//! Async coordination primitives used by the stores.

mod debounce;
mod gate;
mod inflight;
mod supersede;

pub use debounce::Debouncer;
pub use gate::ConcurrencyGate;
pub use inflight::InFlight;
pub use supersede::Supersede;

use std::sync::{Mutex, MutexGuard};

/// Lock, recovering the data from a poisoned mutex.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
