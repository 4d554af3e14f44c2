//! # Service object: spec and virtual endpoint.
//!
//! A [`Service`] owns a stable virtual [`Endpoint`] derived from its spec.
//! Tasks bound to the service receive an identical **copy** of the endpoint;
//! the copy is data, not a live reference, and is not retroactively cleared
//! if the service is later deleted.

use std::net::Ipv4Addr;

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    /// TCP (default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

/// A single port exposed by a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortConfig {
    /// Port name (optional, informational).
    pub name: String,
    /// Transport protocol.
    pub protocol: Protocol,
    /// Port the tasks listen on.
    pub target_port: u16,
    /// Externally visible port; 0 lets the manager pick one.
    pub published_port: u16,
}

/// Requested endpoint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSpec {
    /// Ports to expose through the virtual endpoint.
    pub ports: Vec<PortConfig>,
}

/// Allocated virtual endpoint of a service.
///
/// Equality drives idempotence: a service (or task copy) whose endpoint
/// already equals the derived value is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    /// Virtual IPs representing the service. Empty unless a VIP driver
    /// assigns them (out of scope for the built-in allocator).
    pub virtual_ips: Vec<Ipv4Addr>,
    /// Ports copied from the endpoint spec.
    pub ports: Vec<PortConfig>,
}

impl Endpoint {
    /// Derives the endpoint a spec requires.
    ///
    /// A spec with no endpoint configuration yields an empty, already-satisfied
    /// endpoint.
    pub fn derive(spec: &ServiceSpec) -> Self {
        match &spec.endpoint {
            Some(es) => Self {
                virtual_ips: Vec::new(),
                ports: es.ports.clone(),
            },
            None => Self::default(),
        }
    }
}

/// User-provided service specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Human-readable service name.
    pub name: String,
    /// Requested endpoint configuration.
    pub endpoint: Option<EndpointSpec>,
}

/// A cluster service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    /// Store identity.
    pub id: String,
    /// User-provided spec.
    pub spec: ServiceSpec,
    /// Allocation state; `None` until the allocator derives it.
    pub endpoint: Option<Endpoint>,
}

impl Service {
    /// Creates an unallocated service with the given identity and spec.
    pub fn new(id: impl Into<String>, spec: ServiceSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            endpoint: None,
        }
    }

    /// Returns true if the service carries an endpoint matching its spec.
    pub fn is_allocated(&self) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|ep| *ep == Endpoint::derive(&self.spec))
    }
}
