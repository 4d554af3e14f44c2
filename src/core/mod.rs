//! Runtime core: the reconciliation loop and its configuration.
//!
//! The public API from this module is [`Allocator`], which drives allocation
//! state from store events, plus [`AllocatorConfig`].
//!
//! Internal modules:
//! - [`allocator`]: event loop, subscriber fan-out wiring, shutdown;
//! - [`engine`]: per-event allocation semantics and dependency draining;
//! - [`config`]: address-space settings.

mod allocator;
mod config;
mod engine;

pub use allocator::Allocator;
pub use config::AllocatorConfig;
