//! # Dependency tracker for blocked tasks.
//!
//! Maps an unmet dependency key (network or service identity) to the set of
//! task identities blocked on it — an arena of ids, not back-pointers between
//! live objects, so tasks and networks never form ownership cycles.
//!
//! ## Rules
//! - `block()` replaces any stale entries for the task.
//! - `satisfy()` yields the blocked set for re-attempt and clears it; a task
//!   still missing other dependencies re-enters via the next `block()`.
//! - Deleting a dependency changes nothing here: the dependency still does
//!   not exist, so its waiters stay blocked.

use std::collections::{BTreeSet, HashMap};

/// Identity of an unmet dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A network that is missing or not yet allocated.
    Network(String),
    /// A service that is missing or not yet allocated.
    Service(String),
}

/// Blocked-task bookkeeping keyed by unmet dependency.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// Dependency → blocked task identities.
    waiters: HashMap<DepKey, BTreeSet<String>>,
    /// Reverse index: task identity → dependencies it waits on.
    blocked: HashMap<String, Vec<DepKey>>,
}

impl DependencyTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `task_id` as blocked on every key in `keys`.
    ///
    /// Any previous entries for the task are replaced.
    pub fn block(&mut self, task_id: &str, keys: Vec<DepKey>) {
        self.forget(task_id);
        for key in &keys {
            self.waiters
                .entry(key.clone())
                .or_default()
                .insert(task_id.to_string());
        }
        if !keys.is_empty() {
            self.blocked.insert(task_id.to_string(), keys);
        }
    }

    /// Yields the tasks blocked on `key` for re-attempt and clears them.
    ///
    /// Returned identities are fully removed from the tracker; callers
    /// re-insert the ones that are still blocked after re-attempting.
    pub fn satisfy(&mut self, key: &DepKey) -> Vec<String> {
        let ids: Vec<String> = match self.waiters.remove(key) {
            Some(set) => set.into_iter().collect(),
            None => return Vec::new(),
        };
        for id in &ids {
            self.forget(id);
        }
        ids
    }

    /// Drops all entries for `task_id` (task deleted or re-blocking).
    pub fn forget(&mut self, task_id: &str) {
        let Some(keys) = self.blocked.remove(task_id) else {
            return;
        };
        for key in keys {
            if let Some(set) = self.waiters.get_mut(&key) {
                set.remove(task_id);
                if set.is_empty() {
                    self.waiters.remove(&key);
                }
            }
        }
    }

    /// Returns true if the task is currently blocked on anything.
    pub fn is_blocked(&self, task_id: &str) -> bool {
        self.blocked.contains_key(task_id)
    }

    /// Number of blocked tasks.
    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    /// Returns true if nothing is blocked.
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}
