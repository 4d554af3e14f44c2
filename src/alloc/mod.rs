//! Allocators: per-object-class allocation logic and dependency bookkeeping.
//!
//! ## Contents
//! - [`NetworkAllocator`] resolves a network spec into a subnet/gateway and
//!   owns one [`AddressPool`](crate::ipam::AddressPool) per allocated network
//! - [`ServiceAllocator`] derives a service's virtual endpoint
//! - [`TaskAllocator`] resolves task network references into addresses and
//!   copies the owning service's endpoint
//! - [`DependencyTracker`] holds tasks blocked on missing dependencies
//!
//! Every entry point computes "is this object already in its allocated target
//! state" as a pure check before mutating, so re-delivered events never
//! double-allocate.

mod network;
mod pending;
mod service;
mod task;

pub use network::NetworkAllocator;
pub use pending::{DepKey, DependencyTracker};
pub use service::ServiceAllocator;
pub use task::{TaskAllocator, TaskOutcome};

use crate::objects::{Network, Service};

/// Read access to referenced objects, injected into task allocation.
///
/// Implemented by the store boundary; kept as a trait so allocation logic can
/// be exercised against plain maps in tests.
pub trait ObjectLookup {
    /// Looks up a network by identity.
    fn network(&self, id: &str) -> Option<Network>;

    /// Looks up a service by identity.
    fn service(&self, id: &str) -> Option<Service>;
}
