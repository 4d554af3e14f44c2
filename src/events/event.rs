//! # Store change events consumed and produced through the bus.
//!
//! Every committed store mutation yields one [`Event`] carrying a deep copy of
//! the affected object, tagged by object class and [`Action`]. The kind set is
//! closed and fixed, so routing is an exhaustive `match` over [`Change`], not
//! virtual dispatch.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) assigned in commit
//! order; per-object delivery order equals commit order. The allocator treats
//! this as the *only* ordering guarantee it relies on.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::objects::{Network, Service, Task};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened to the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Object was created.
    Create,
    /// Object was updated in place.
    Update,
    /// Object was deleted; the payload is its last committed state.
    Delete,
}

/// Object class plus deep copy of the affected object.
#[derive(Debug, Clone)]
pub enum Change {
    /// A network changed.
    Network(Action, Network),
    /// A service changed.
    Service(Action, Service),
    /// A task changed.
    Task(Action, Task),
}

impl Change {
    /// Returns the action component of the change.
    pub fn action(&self) -> Action {
        match self {
            Change::Network(a, _) | Change::Service(a, _) | Change::Task(a, _) => *a,
        }
    }

    /// Returns the identity of the affected object.
    pub fn id(&self) -> &str {
        match self {
            Change::Network(_, n) => &n.id,
            Change::Service(_, s) => &s.id,
            Change::Task(_, t) => &t.id,
        }
    }
}

/// A committed store mutation.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (for logs only; never used for ordering).
    pub at: SystemTime,
    /// The mutation payload.
    pub change: Change,
}

impl Event {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(change: Change) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            change,
        }
    }
}
