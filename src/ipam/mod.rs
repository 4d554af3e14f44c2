//! IP address management: the default in-process bitmap IPAM.
//!
//! ## Contents
//! - [`AddressSpace`] carves non-overlapping subnets from a parent network
//! - [`AddressPool`] allocates individual addresses within one subnet
//!
//! One pool exists per allocated network, owned by the network allocator for
//! exactly the network's lifetime. All mutation happens on the reconciliation
//! loop's single ordered stream; nothing here locks.

mod pool;
mod space;

pub use pool::AddressPool;
pub use space::{AddressSpace, DEFAULT_SPACE, DEFAULT_SUBNET_PREFIX};
