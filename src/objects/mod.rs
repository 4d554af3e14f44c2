//! # Declarative objects managed by the allocator.
//!
//! This module provides the three object classes the engine watches:
//! - [`Network`] - a subnet-backed network with an IPAM allocation state
//! - [`Service`] - a named service with a derived virtual [`Endpoint`]
//! - [`Task`] - a unit of work attaching to networks and (optionally) a service
//!
//! Allocated values ([`IpamConfig`], [`Endpoint`], [`NetworkAttachment`]) are
//! **copies**, not references: once written onto an object they are plain data,
//! and the allocator remains the sole writer of those fields.

mod network;
mod service;
mod task;

pub use network::{IpamConfig, Network, NetworkSpec};
pub use service::{Endpoint, EndpointSpec, PortConfig, Protocol, Service, ServiceSpec};
pub use task::{ContainerSpec, NetworkAttachment, Task, TaskState};
