//! # Default address space: carves non-overlapping subnets on demand.
//!
//! [`AddressSpace`] hands out fixed-prefix subnets from a parent network
//! (first-fit over the gaps between allocated blocks) and records
//! caller-specified subnets so auto-derived ones never collide with them.
//!
//! ## Rules
//! - `allocate()` carves the lowest free block of the configured prefix.
//! - `claim()` registers an explicit subnet; overlap fails fast.
//! - `release()` is idempotent and returns blocks of either origin.

use std::collections::BTreeMap;

use ipnet::Ipv4Net;

use crate::error::AllocError;

/// Parent network that auto-derived subnets are carved from.
pub const DEFAULT_SPACE: &str = "10.0.0.0/8";

/// Prefix length of auto-derived subnets.
pub const DEFAULT_SUBNET_PREFIX: u8 = 24;

/// First-fit carver of non-overlapping subnets.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    space: Ipv4Net,
    subnet_prefix: u8,
    /// Allocated blocks keyed by network address for ordered gap scans.
    allocated: BTreeMap<u32, Ipv4Net>,
}

impl AddressSpace {
    /// Creates a space carving `subnet_prefix`-sized blocks out of `space`.
    pub fn new(space: Ipv4Net, subnet_prefix: u8) -> Self {
        Self {
            space: space.trunc(),
            subnet_prefix: subnet_prefix.clamp(space.prefix_len(), 30),
            allocated: BTreeMap::new(),
        }
    }

    /// Carves the lowest free fixed-prefix subnet.
    pub fn allocate(&mut self) -> Result<Ipv4Net, AllocError> {
        let block = 1u64 << (32 - self.subnet_prefix);
        let start = u64::from(u32::from(self.space.network()));
        let end = u64::from(u32::from(self.space.broadcast()));

        let mut candidate = start;
        for (&alloc_start, net) in &self.allocated {
            let alloc_start = u64::from(alloc_start);
            let alloc_end = alloc_start + (1u64 << (32 - net.prefix_len())) - 1;
            if alloc_end < candidate || alloc_start > end {
                continue;
            }
            if candidate + block - 1 < alloc_start {
                break;
            }
            // Skip past this block, keeping candidate aligned.
            candidate = (alloc_end + 1).div_ceil(block) * block;
        }

        if candidate + block - 1 > end {
            return Err(AllocError::AddressSpaceExhausted);
        }

        // Infallible: candidate is block-aligned within the space.
        let subnet = Ipv4Net::new((candidate as u32).into(), self.subnet_prefix)
            .map_err(|_| AllocError::AddressSpaceExhausted)?;
        self.allocated.insert(candidate as u32, subnet);
        Ok(subnet)
    }

    /// Registers a caller-specified subnet so future carves avoid it.
    ///
    /// Any overlap with a live claim fails with [`AllocError::SubnetInUse`],
    /// an exact duplicate included: each claim backs exactly one pool, so a
    /// second network declaring the same subnet must not share it.
    pub fn claim(&mut self, subnet: Ipv4Net) -> Result<(), AllocError> {
        let subnet = subnet.trunc();
        if self.allocated.values().any(|n| overlaps(n, &subnet)) {
            return Err(AllocError::SubnetInUse { subnet });
        }
        self.allocated.insert(u32::from(subnet.network()), subnet);
        Ok(())
    }

    /// Returns a subnet to the free space. Idempotent.
    pub fn release(&mut self, subnet: Ipv4Net) {
        let subnet = subnet.trunc();
        let key = u32::from(subnet.network());
        if self.allocated.get(&key) == Some(&subnet) {
            self.allocated.remove(&key);
        }
    }
}

impl Default for AddressSpace {
    /// The conventional private space: /24 blocks out of `10.0.0.0/8`.
    fn default() -> Self {
        let space = DEFAULT_SPACE
            .parse()
            .unwrap_or_else(|_| Ipv4Net::new([10, 0, 0, 0].into(), 8).expect("valid prefix"));
        Self::new(space, DEFAULT_SUBNET_PREFIX)
    }
}

fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}
