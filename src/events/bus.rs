//! # Event bus for broadcasting store change events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. The store
//! publishes one event per committed mutation while holding its write lock,
//! which preserves commit order on the channel.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No replay**: a receiver only observes events sent after it subscribed;
//!   covering the gap before subscription is the consumer's job (initial scan).

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for store change events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender). Multiple
/// publishers may publish concurrently; subscribers receive clones of each
/// event.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (clamped to ≥ 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver observing subsequent events.
    ///
    /// Each call creates an independent receiver; slow receivers get
    /// `RecvError::Lagged(n)` and skip over missed items.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
