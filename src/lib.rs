//! # netvisor
//!
//! **Netvisor** is an embedded, event-driven network resource allocator for
//! Rust.
//!
//! It watches a transactional object store and converges three object classes
//! to their allocated state: networks get subnets, gateways, and address
//! pools; services get virtual endpoints; tasks get one address per network
//! they attach to plus a copy of their service's endpoint. The crate is
//! designed as a building block for higher-level cluster managers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   writers (API, scheduler, tests)
//!        │ update(|tx| ...)
//!        ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  MemoryStore (transactional, commit-ordered events)       │
//! │  - Networks / Services / Tasks by identity                │
//! │  - Bus (broadcast channel, one Event per mutation)        │
//! └──────────────┬───────────────────────────┬────────────────┘
//!                ▼                           ▼
//! ┌──────────────────────────────┐   ┌───────────────────────┐
//! │  Allocator (run loop)        │   │  subscriber_listener  │
//! │  - Engine                    │   └──────────┬────────────┘
//! │    ├─ NetworkAllocator       │              ▼
//! │    │    ├─ AddressSpace      │        SubscriberSet
//! │    │    └─ AddressPool (1:1) │       (per-sub queues)
//! │    ├─ ServiceAllocator       │      ┌──────┼──────┐
//! │    ├─ TaskAllocator          │      ▼      ▼      ▼
//! │    └─ DependencyTracker      │   worker1 worker2 workerN
//! │  - convergence writes ───────┼──► back into MemoryStore
//! └──────────────────────────────┘
//! ```
//!
//! ### Convergence
//! ```text
//! event ──► Engine::dispatch()
//!   ├─ Network create/update ─► assign subnet + gateway, build pool
//!   │                           └─► drain tasks waiting on this network
//!   ├─ Service create/update ─► derive endpoint
//!   │                           └─► drain tasks waiting on this service
//!   ├─ Task create/update    ─► deps met? reserve addresses, copy endpoint
//!   │                           deps missing? park in DependencyTracker
//!   │                           pool exhausted? defer, retry on later events
//!   └─ deletes               ─► release addresses / subnet, forget waiters
//!
//! Every attempt is idempotent: converged objects produce no writes, so the
//! engine consuming its own update events cannot loop.
//! ```
//!
//! ## Features
//! | Area             | Description                                              | Key types / traits                   |
//! |------------------|----------------------------------------------------------|--------------------------------------|
//! | **Objects**      | Declarative networks, services, tasks.                   | [`Network`], [`Service`], [`Task`]   |
//! | **Store**        | Transactional store with commit-ordered change events.   | [`MemoryStore`], [`Event`]           |
//! | **IPAM**         | Subnet carving and per-network address pools.            | [`AddressSpace`], [`AddressPool`]    |
//! | **Reconciliation**| Event loop converging stored objects.                   | [`Allocator`], [`AllocatorConfig`]   |
//! | **Subscriber API**| Observe the event flow (logging, metrics, audit).       | [`Subscribe`], [`SubscriberSet`]     |
//! | **Errors**       | Typed errors per layer.                                  | [`AllocError`], [`RuntimeError`]     |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use netvisor::{Allocator, AllocatorConfig, MemoryStore};
//! use netvisor::objects::{ContainerSpec, Network, NetworkSpec, Task};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new(1024));
//!     let alloc = Arc::new(Allocator::new(Arc::clone(&store), AllocatorConfig::default()));
//!
//!     let runner = Arc::clone(&alloc);
//!     let handle = tokio::spawn(async move { runner.run().await });
//!
//!     // Declare a network and a task attached to it; the allocator assigns
//!     // a subnet to the network and an address to the task.
//!     store.update(|tx| {
//!         tx.create_network(Network::new(
//!             "n1",
//!             NetworkSpec { name: "overlay".into(), ..Default::default() },
//!         ))?;
//!         tx.create_task(Task::new(
//!             "t1",
//!             ContainerSpec { networks: vec!["n1".into()] },
//!         ))
//!     })?;
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     alloc.stop();
//!     handle.await??;
//!     Ok(())
//! }
//! ```

pub mod alloc;
pub mod error;
pub mod events;
pub mod ipam;
pub mod objects;
pub mod store;
pub mod subscribers;

mod core;

// ---- Public re-exports ----

pub use crate::core::{Allocator, AllocatorConfig};
pub use alloc::{DepKey, NetworkAllocator, ObjectLookup, ServiceAllocator, TaskAllocator, TaskOutcome};
pub use error::{AllocError, RuntimeError, StoreError};
pub use events::{Action, Bus, Change, Event};
pub use ipam::{AddressPool, AddressSpace};
pub use objects::{Network, Service, Task};
pub use store::{MemoryStore, ReadView, WriteTx};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
