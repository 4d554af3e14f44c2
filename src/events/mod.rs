//! Store change events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to mutations committed by the object store.
//!
//! ## Contents
//! - [`Event`], [`Change`], [`Action`] event payload and classification
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: `MemoryStore` (one event per committed mutation, commit order).
//! - **Consumers**: the reconciliation loop (`core::Allocator`), external
//!   subsystems (scheduler, API watchers), and the subscriber fan-out.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Action, Change, Event};
