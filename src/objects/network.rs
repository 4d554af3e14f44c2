//! # Network object: spec and IPAM allocation state.
//!
//! A [`Network`] is created unallocated by a user transaction. The allocator
//! resolves its spec into exactly one [`IpamConfig`] (subnet + gateway) and
//! owns a matching in-memory address pool for the network's lifetime.
//!
//! ## Rules
//! - An allocated network carries exactly one IPAM config.
//! - `gateway` lies inside `subnet`; `range` is `None` (whole subnet).
//! - `reserved` starts empty; the gateway reservation is implicit in the pool.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// User-provided network specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Human-readable network name.
    pub name: String,
    /// Caller-specified subnet. `None` derives one from the default address space.
    pub subnet: Option<Ipv4Net>,
    /// Caller-specified gateway. `None` defaults to the subnet's first usable address.
    pub gateway: Option<Ipv4Addr>,
}

/// Resolved IPAM configuration written onto an allocated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpamConfig {
    /// The network's subnet.
    pub subnet: Ipv4Net,
    /// Sub-range restriction; `None` means the whole subnet (always `None` today).
    pub range: Option<Ipv4Net>,
    /// Default gateway, inside `subnet`.
    pub gateway: Ipv4Addr,
    /// Addresses carved out of the subnet beyond the implicit gateway reservation.
    pub reserved: Vec<Ipv4Addr>,
}

impl IpamConfig {
    /// Checks the allocated-network invariant: gateway inside subnet, no range
    /// restriction.
    pub fn is_valid(&self) -> bool {
        self.range.is_none() && self.subnet.contains(&self.gateway)
    }
}

/// A cluster network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Store identity.
    pub id: String,
    /// User-provided spec.
    pub spec: NetworkSpec,
    /// Allocation state; `None` until the allocator resolves the spec.
    pub ipam: Option<IpamConfig>,
}

impl Network {
    /// Creates an unallocated network with the given identity and spec.
    pub fn new(id: impl Into<String>, spec: NetworkSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            ipam: None,
        }
    }

    /// Returns true if the network carries a valid IPAM config.
    ///
    /// Re-processing an allocated network is a no-op for the allocator.
    pub fn is_allocated(&self) -> bool {
        self.ipam.as_ref().is_some_and(IpamConfig::is_valid)
    }
}
