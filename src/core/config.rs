//! # Allocator configuration.
//!
//! Provides [`AllocatorConfig`] — centralized settings for the reconciliation
//! engine: which parent network auto-derived subnets are carved from and how
//! large each carved subnet is.
//!
//! ## Field semantics
//! - `space`: parent network for auto-derived subnets
//! - `subnet_prefix`: prefix length of each carved subnet (clamped to a
//!   usable range by [`AddressSpace`])

use ipnet::Ipv4Net;

use crate::ipam::{AddressSpace, DEFAULT_SPACE, DEFAULT_SUBNET_PREFIX};

/// Configuration for the reconciliation engine.
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
    /// Parent network that subnets are carved from when a network spec names
    /// no explicit subnet.
    pub space: Ipv4Net,

    /// Prefix length of auto-derived subnets.
    ///
    /// Must lie between the space's own prefix and /30; values outside that
    /// range are clamped.
    pub subnet_prefix: u8,
}

impl AllocatorConfig {
    /// Builds the address space this configuration describes.
    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::new(self.space, self.subnet_prefix)
    }
}

impl Default for AllocatorConfig {
    /// Default configuration:
    ///
    /// - `space = 10.0.0.0/8` (conventional private space)
    /// - `subnet_prefix = 24` (one /24 per network)
    fn default() -> Self {
        let space = DEFAULT_SPACE
            .parse()
            .unwrap_or_else(|_| Ipv4Net::new([10, 0, 0, 0].into(), 8).expect("valid prefix"));
        Self {
            space,
            subnet_prefix: DEFAULT_SUBNET_PREFIX,
        }
    }
}
