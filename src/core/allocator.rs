//! # Allocator: the reconciliation loop over store events.
//!
//! The [`Allocator`] owns the subscription to the store's event stream, the
//! [`Engine`] that applies allocation semantics, and a [`SubscriberSet`] for
//! observer fan-out. It runs until cancelled or until the event stream breaks.
//!
//! ## High-level architecture
//! ```text
//! Startup (run()):
//!   - store.subscribe()                       (before the scan: no replay gap)
//!   - subscriber_listener(): store.subscribe() ─► SubscriberSet::emit(&Event)
//!   - Engine::reconcile_all()                 (converge pre-existing objects)
//!
//! Event flow:
//!   writers ── update() ──► MemoryStore ──► Bus ──┬──► run() loop ──► Engine::dispatch()
//!                                                 │         └── convergence writes ──► MemoryStore
//!                                                 └──► listener ──► SubscriberSet ──► subscribers
//!
//! Shutdown path:
//!   stop() ─► token.cancel() ─► run() returns Ok, listener exits
//! ```
//!
//! ## Rules
//! - **Single consumer**: one subscription drives the engine; events apply in
//!   commit order with no concurrency inside allocation logic.
//! - **Lag is fatal**: a dropped event could hide a deletion and leak its
//!   addresses forever, so the loop returns
//!   [`RuntimeError::EventStreamLagged`] instead of limping on. Size the bus
//!   so this does not happen.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use netvisor::{Allocator, AllocatorConfig, MemoryStore};
//! use netvisor::objects::{Network, NetworkSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new(1024));
//!     let alloc = Arc::new(Allocator::new(Arc::clone(&store), AllocatorConfig::default()));
//!
//!     let runner = Arc::clone(&alloc);
//!     let handle = tokio::spawn(async move { runner.run().await });
//!
//!     store.update(|tx| {
//!         tx.create_network(Network::new(
//!             "n1",
//!             NetworkSpec { name: "overlay".into(), ..Default::default() },
//!         ))
//!     })?;
//!
//!     alloc.stop();
//!     handle.await??;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::core::{config::AllocatorConfig, engine::Engine};
use crate::error::RuntimeError;
use crate::store::MemoryStore;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Drives allocation state from the store's event stream.
pub struct Allocator {
    /// Object store this allocator converges.
    pub store: Arc<MemoryStore>,
    /// Runtime configuration.
    pub cfg: AllocatorConfig,
    /// Fan-out set for subscribers.
    pub subs: Arc<SubscriberSet>,
    token: CancellationToken,
}

impl Allocator {
    /// Creates an allocator with no subscribers.
    pub fn new(store: Arc<MemoryStore>, cfg: AllocatorConfig) -> Self {
        Self::with_subscribers(store, cfg, Vec::new())
    }

    /// Creates an allocator with the provided subscribers.
    pub fn with_subscribers(
        store: Arc<MemoryStore>,
        cfg: AllocatorConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            store,
            cfg,
            subs: Arc::new(SubscriberSet::new(subscribers)),
            token: CancellationToken::new(),
        }
    }

    /// Runs the reconciliation loop until [`stop`](Self::stop) is called.
    ///
    /// Subscribes first, then converges pre-existing objects, then applies
    /// events one at a time: mutations committed during the scan are not lost,
    /// they arrive through the subscription and re-apply idempotently.
    ///
    /// Returns `Err` only when the event stream breaks
    /// ([`RuntimeError::EventStreamClosed`] / [`EventStreamLagged`]); the
    /// embedding manager decides restart policy.
    ///
    /// [`EventStreamLagged`]: RuntimeError::EventStreamLagged
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let mut rx = self.store.subscribe();
        self.subscriber_listener();

        let mut engine = Engine::new(Arc::clone(&self.store), self.cfg.address_space());
        engine.reconcile_all();

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return Ok(()),
                msg = rx.recv() => match msg {
                    Ok(event) => engine.dispatch(&event),
                    Err(RecvError::Closed) => return Err(RuntimeError::EventStreamClosed),
                    Err(RecvError::Lagged(missed)) => {
                        return Err(RuntimeError::EventStreamLagged { missed });
                    }
                },
            }
        }
    }

    /// Requests loop termination; `run` returns after the current event.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Subscribes to the store and forwards events to the subscriber set
    /// (fire-and-forget).
    ///
    /// Runs on its own subscription: observers falling behind must not be
    /// able to stall or lag the allocation loop.
    fn subscriber_listener(&self) {
        let mut rx = self.store.subscribe();
        let set = Arc::clone(&self.subs);
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(event) => set.emit(&event),
                        Err(RecvError::Closed) => break,
                        // Observation is best-effort; skip the gap.
                        Err(RecvError::Lagged(_)) => continue,
                    },
                }
            }
        });
    }
}
