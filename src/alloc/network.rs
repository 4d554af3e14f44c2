//! # Network allocator: subnet/gateway assignment and pool ownership.
//!
//! Resolves each network's spec into an [`IpamConfig`] and owns one
//! [`AddressPool`] per allocated network (1:1, same lifetime). Subnets come
//! either from the spec (claimed so auto-derivation avoids them) or from the
//! default [`AddressSpace`].
//!
//! Pools are in-memory only: after an engine restart they are rebuilt from
//! the IPAM configs already persisted on networks, before any new address is
//! handed out.

use std::collections::HashMap;

use crate::error::AllocError;
use crate::ipam::{AddressPool, AddressSpace};
use crate::objects::{IpamConfig, Network};

/// Assigns subnets/gateways to networks and owns their address pools.
#[derive(Debug)]
pub struct NetworkAllocator {
    space: AddressSpace,
    pools: HashMap<String, AddressPool>,
}

impl NetworkAllocator {
    /// Creates an allocator carving from the given address space.
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space,
            pools: HashMap::new(),
        }
    }

    /// Allocates the network in place. Returns whether the object changed.
    ///
    /// An already-allocated network is a no-op (`Ok(false)`) apart from
    /// rebuilding its in-memory pool if absent (restart path). On failure the
    /// network is left unallocated; the caller retries on the next relevant
    /// store event.
    pub fn allocate(&mut self, network: &mut Network) -> Result<bool, AllocError> {
        if network.is_allocated() {
            self.ensure_pool(network)?;
            return Ok(false);
        }

        let subnet = match network.spec.subnet {
            Some(requested) => {
                let requested = requested.trunc();
                self.space.claim(requested)?;
                requested
            }
            None => self.space.allocate()?,
        };

        let pool = match AddressPool::new(subnet, network.spec.gateway) {
            Ok(pool) => pool,
            Err(err) => {
                self.space.release(subnet);
                return Err(err);
            }
        };

        network.ipam = Some(IpamConfig {
            subnet,
            range: None,
            gateway: pool.gateway(),
            reserved: Vec::new(),
        });
        self.pools.insert(network.id.clone(), pool);
        Ok(true)
    }

    /// Destroys the network's pool and returns its subnet to the free space.
    pub fn deallocate(&mut self, network: &Network) {
        self.pools.remove(&network.id);
        if let Some(cfg) = &network.ipam {
            self.space.release(cfg.subnet);
        }
    }

    /// Returns true if the network's pool exists (network processed and allocated).
    pub fn has_pool(&self, network_id: &str) -> bool {
        self.pools.contains_key(network_id)
    }

    /// Mutable access to a network's pool.
    pub fn pool_mut(&mut self, network_id: &str) -> Option<&mut AddressPool> {
        self.pools.get_mut(network_id)
    }

    /// Rebuilds the pool of an already-allocated network if absent.
    fn ensure_pool(&mut self, network: &Network) -> Result<(), AllocError> {
        if self.pools.contains_key(&network.id) {
            return Ok(());
        }
        let Some(cfg) = &network.ipam else {
            return Ok(());
        };

        self.space.claim(cfg.subnet)?;
        match Self::rebuild_pool(cfg) {
            Ok(pool) => {
                self.pools.insert(network.id.clone(), pool);
                Ok(())
            }
            Err(err) => {
                // The claim must not outlive the pool it was made for.
                self.space.release(cfg.subnet);
                Err(err)
            }
        }
    }

    fn rebuild_pool(cfg: &IpamConfig) -> Result<AddressPool, AllocError> {
        let mut pool = AddressPool::new(cfg.subnet, Some(cfg.gateway))?;
        for addr in &cfg.reserved {
            pool.restore(*addr)?;
        }
        Ok(pool)
    }
}

impl Default for NetworkAllocator {
    fn default() -> Self {
        Self::new(AddressSpace::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::NetworkSpec;
    use ipnet::Ipv4Net;
    use std::net::Ipv4Addr;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn unallocated(id: &str, subnet: Option<Ipv4Net>) -> Network {
        Network::new(
            id,
            NetworkSpec {
                name: id.to_string(),
                subnet,
                gateway: None,
            },
        )
    }

    #[test]
    fn test_allocate_derives_subnet_and_gateway() {
        let mut alloc = NetworkAllocator::default();
        let mut n1 = unallocated("n1", None);

        assert!(alloc.allocate(&mut n1).unwrap());
        let cfg = n1.ipam.as_ref().unwrap();
        assert!(cfg.range.is_none());
        assert!(cfg.reserved.is_empty());
        assert!(cfg.subnet.contains(&cfg.gateway));
        assert!(alloc.has_pool("n1"));
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let mut alloc = NetworkAllocator::default();
        let mut n1 = unallocated("n1", None);

        alloc.allocate(&mut n1).unwrap();
        let before = n1.clone();
        assert!(!alloc.allocate(&mut n1).unwrap());
        assert_eq!(n1, before);
    }

    #[test]
    fn test_explicit_subnet_and_gateway() {
        let mut alloc = NetworkAllocator::default();
        let mut n1 = Network::new(
            "n1",
            NetworkSpec {
                name: "n1".into(),
                subnet: Some(net("192.168.7.0/24")),
                gateway: Some(Ipv4Addr::new(192, 168, 7, 254)),
            },
        );

        alloc.allocate(&mut n1).unwrap();
        let cfg = n1.ipam.as_ref().unwrap();
        assert_eq!(cfg.subnet, net("192.168.7.0/24"));
        assert_eq!(cfg.gateway, Ipv4Addr::new(192, 168, 7, 254));
    }

    #[test]
    fn test_duplicate_explicit_subnet_rejected() {
        let mut alloc = NetworkAllocator::default();
        let mut first = unallocated("a", Some(net("10.5.0.0/24")));
        alloc.allocate(&mut first).unwrap();

        // A second network declaring the same subnet must not allocate: two
        // pools over one CIDR would hand out colliding task addresses.
        let mut second = unallocated("b", Some(net("10.5.0.0/24")));
        assert!(matches!(
            alloc.allocate(&mut second),
            Err(AllocError::SubnetInUse { .. })
        ));
        assert!(second.ipam.is_none());
        assert!(!alloc.has_pool("b"));
    }

    #[test]
    fn test_deallocate_frees_subnet_for_reuse() {
        let mut alloc = NetworkAllocator::default();
        let mut n1 = unallocated("n1", Some(net("10.9.0.0/24")));
        alloc.allocate(&mut n1).unwrap();

        alloc.deallocate(&n1);
        assert!(!alloc.has_pool("n1"));

        let mut n2 = unallocated("n2", Some(net("10.9.0.0/24")));
        alloc.allocate(&mut n2).unwrap();
    }

    #[test]
    fn test_bad_gateway_releases_claimed_subnet() {
        let mut alloc = NetworkAllocator::default();
        let mut n1 = Network::new(
            "n1",
            NetworkSpec {
                name: "n1".into(),
                subnet: Some(net("10.9.0.0/24")),
                gateway: Some(Ipv4Addr::new(10, 8, 0, 1)), // outside subnet
            },
        );

        assert!(matches!(
            alloc.allocate(&mut n1),
            Err(AllocError::InvalidGateway { .. })
        ));
        assert!(n1.ipam.is_none());

        // Subnet must not stay claimed after the failure.
        let mut n2 = unallocated("n2", Some(net("10.9.0.0/24")));
        alloc.allocate(&mut n2).unwrap();
    }

    #[test]
    fn test_ensure_pool_restores_reservations() {
        let mut alloc = NetworkAllocator::default();
        let mut n1 = unallocated("n1", Some(net("10.9.0.0/24")));
        alloc.allocate(&mut n1).unwrap();
        let addr = alloc.pool_mut("n1").unwrap().reserve().unwrap();

        // Simulate restart: pools are gone, the stored object survives.
        let mut fresh = NetworkAllocator::default();
        let mut stored = n1.clone();
        stored.ipam.as_mut().unwrap().reserved.push(addr);

        assert!(!fresh.allocate(&mut stored).unwrap());
        assert!(fresh.pool_mut("n1").unwrap().is_reserved(addr));
    }
}
