//! Optimistic mutation tracking.
//!
//! A store takes a snapshot of an entity, applies the change locally, and
//! then either commits (server agreed) or rolls back to the snapshot.

use std::collections::HashMap;
use std::hash::Hash;

/// Lifecycle of one entity's latest mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Clean,
    /// Applied locally, waiting for the server.
    Pending,
    Committed,
    RolledBack,
}

/// Handle for one in-flight mutation, returned by [`Optimistic::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(u64);

/// Snapshots and mutation state per entity key.
///
/// Every mutation keeps its own snapshot, so overlapping mutations on one
/// entity settle independently.
#[derive(Debug, Clone)]
pub struct Optimistic<K, S> {
    pending: HashMap<K, Vec<(MutationId, S)>>,
    states: HashMap<K, MutationState>,
    next_id: u64,
}

impl<K, S> Default for Optimistic<K, S> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            states: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, S: Clone> Optimistic<K, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the entity as it was before this mutation and mark it pending.
    pub fn begin(&mut self, key: K, snapshot: S) -> MutationId {
        self.next_id += 1;
        let id = MutationId(self.next_id);
        self.pending
            .entry(key.clone())
            .or_default()
            .push((id, snapshot));
        self.states.insert(key, MutationState::Pending);
        id
    }

    /// The server accepted mutation `id`. Other pending mutations on the
    /// same entity keep their snapshots.
    pub fn commit(&mut self, key: &K, id: MutationId) {
        if self.take(key, id).is_some() {
            self.settle(key, MutationState::Committed);
        }
    }

    /// The server refused mutation `id`; returns its snapshot.
    ///
    /// Mutations begun after it on the same entity captured its change in
    /// their snapshots, so those are replaced with this one's.
    pub fn rollback(&mut self, key: &K, id: MutationId) -> Option<S> {
        let (index, snapshot) = self.take(key, id)?;
        if let Some(entries) = self.pending.get_mut(key) {
            for (_, later) in entries.iter_mut().skip(index) {
                *later = snapshot.clone();
            }
        }
        self.settle(key, MutationState::RolledBack);
        Some(snapshot)
    }

    fn take(&mut self, key: &K, id: MutationId) -> Option<(usize, S)> {
        let entries = self.pending.get_mut(key)?;
        let index = entries.iter().position(|(m, _)| *m == id)?;
        let (_, snapshot) = entries.remove(index);
        Some((index, snapshot))
    }

    /// Record `outcome` unless another mutation is still in flight.
    fn settle(&mut self, key: &K, outcome: MutationState) {
        let still_pending = self.pending.get(key).is_some_and(|e| !e.is_empty());
        if !still_pending {
            self.pending.remove(key);
            self.states.insert(key.clone(), outcome);
        }
    }

    pub fn state(&self, key: &K) -> MutationState {
        self.states.get(key).copied().unwrap_or_default()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.state(key) == MutationState::Pending
    }

    /// In-flight mutations across all entities.
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.states.clear();
    }
}
