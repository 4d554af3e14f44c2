//! # Per-subnet address pool.
//!
//! [`AddressPool`] tracks reserved vs. free addresses within one subnet using
//! a word-level bitmap (bit set = reserved). The network address, broadcast
//! address and gateway are permanently reserved at construction.
//!
//! ## Rules
//! - `reserve()` hands out the **lowest** unreserved address.
//! - `release()` is idempotent; releasing a free or permanent address is a no-op.
//! - `restore()` re-marks an address already recorded on a stored object
//!   (allocator restart) and is idempotent.
//!
//! All mutation is routed through the single-threaded reconciliation loop, so
//! the pool itself carries no locking.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::AllocError;

/// Bitmap address allocator for a single subnet.
#[derive(Debug, Clone)]
pub struct AddressPool {
    subnet: Ipv4Net,
    gateway: Ipv4Addr,
    /// One bit per address ordinal; set = reserved.
    words: Vec<u64>,
    /// Number of addresses in the subnet (network + hosts + broadcast).
    size: u64,
}

impl AddressPool {
    /// Creates a pool over `subnet`, reserving network, broadcast and gateway.
    ///
    /// `gateway` defaults to the subnet's first usable address. Subnets with
    /// no usable hosts (/31, /32) are rejected with
    /// [`AllocError::InvalidSubnet`]; a gateway outside the usable range fails
    /// with [`AllocError::InvalidGateway`].
    pub fn new(subnet: Ipv4Net, gateway: Option<Ipv4Addr>) -> Result<Self, AllocError> {
        let subnet = subnet.trunc();
        if subnet.prefix_len() > 30 {
            return Err(AllocError::InvalidSubnet { subnet });
        }

        let size = 1u64 << (32 - subnet.prefix_len());
        let base = u32::from(subnet.network());
        let first_usable = Ipv4Addr::from(base + 1);

        let gateway = gateway.unwrap_or(first_usable);
        let gw_idx = Self::index_of(&subnet, gateway)
            .filter(|&i| i != 0 && i != size - 1)
            .ok_or(AllocError::InvalidGateway { gateway, subnet })?;

        let mut words = vec![0u64; ((size + 63) / 64) as usize];
        // Tail bits past the subnet end must never be handed out.
        for idx in size..(words.len() as u64 * 64) {
            words[(idx / 64) as usize] |= 1 << (idx % 64);
        }

        let mut pool = Self {
            subnet,
            gateway,
            words,
            size,
        };
        pool.set(0);
        pool.set(size - 1);
        pool.set(gw_idx);
        Ok(pool)
    }

    /// The pool's subnet.
    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// The fixed gateway reserved at pool creation.
    pub fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    /// Reserves the lowest unreserved address.
    pub fn reserve(&mut self) -> Result<Ipv4Addr, AllocError> {
        for (w, word) in self.words.iter().enumerate() {
            if *word != u64::MAX {
                let idx = w as u64 * 64 + (!*word).trailing_zeros() as u64;
                self.set(idx);
                return Ok(self.addr_at(idx));
            }
        }
        Err(AllocError::PoolExhausted {
            subnet: self.subnet,
        })
    }

    /// Reserves a specific address.
    ///
    /// Fails with [`AllocError::AddressUnavailable`] if the address is out of
    /// subnet or already reserved (including the permanent reservations).
    pub fn reserve_exact(&mut self, address: Ipv4Addr) -> Result<Ipv4Addr, AllocError> {
        let idx = Self::index_of(&self.subnet, address).ok_or(AllocError::AddressUnavailable {
            address,
            subnet: self.subnet,
        })?;
        if self.is_set(idx) {
            return Err(AllocError::AddressUnavailable {
                address,
                subnet: self.subnet,
            });
        }
        self.set(idx);
        Ok(address)
    }

    /// Re-marks an address as reserved, idempotently.
    ///
    /// Used when rebuilding a pool from addresses already recorded on stored
    /// objects; an out-of-subnet address is rejected.
    pub fn restore(&mut self, address: Ipv4Addr) -> Result<(), AllocError> {
        let idx = Self::index_of(&self.subnet, address).ok_or(AllocError::AddressUnavailable {
            address,
            subnet: self.subnet,
        })?;
        self.set(idx);
        Ok(())
    }

    /// Releases an address back into the pool.
    ///
    /// Idempotent: out-of-subnet, unreserved and permanently reserved
    /// addresses are left untouched.
    pub fn release(&mut self, address: Ipv4Addr) {
        let Some(idx) = Self::index_of(&self.subnet, address) else {
            return;
        };
        if idx == 0 || idx == self.size - 1 || address == self.gateway {
            return;
        }
        self.words[(idx / 64) as usize] &= !(1 << (idx % 64));
    }

    /// Returns true if `address` is currently reserved (permanent ones included).
    pub fn is_reserved(&self, address: Ipv4Addr) -> bool {
        Self::index_of(&self.subnet, address).is_some_and(|idx| self.is_set(idx))
    }

    /// Number of addresses still available for reservation.
    pub fn available(&self) -> u64 {
        let reserved: u64 = self.words.iter().map(|w| w.count_ones() as u64).sum();
        let tail = self.words.len() as u64 * 64 - self.size;
        self.size - (reserved - tail)
    }

    fn index_of(subnet: &Ipv4Net, address: Ipv4Addr) -> Option<u64> {
        subnet
            .contains(&address)
            .then(|| (u32::from(address) - u32::from(subnet.network())) as u64)
    }

    fn addr_at(&self, idx: u64) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.subnet.network()) + idx as u32)
    }

    fn set(&mut self, idx: u64) {
        self.words[(idx / 64) as usize] |= 1 << (idx % 64);
    }

    fn is_set(&self, idx: u64) -> bool {
        self.words[(idx / 64) as usize] & (1 << (idx % 64)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_gateway_defaults_to_first_usable() {
        let pool = AddressPool::new(subnet("10.1.0.0/24"), None).unwrap();
        assert_eq!(pool.gateway(), Ipv4Addr::new(10, 1, 0, 1));
        assert!(pool.is_reserved(Ipv4Addr::new(10, 1, 0, 1)));
    }

    #[test]
    fn test_reserve_returns_lowest_free() {
        let mut pool = AddressPool::new(subnet("10.1.0.0/24"), None).unwrap();
        assert_eq!(pool.reserve().unwrap(), Ipv4Addr::new(10, 1, 0, 2));
        assert_eq!(pool.reserve().unwrap(), Ipv4Addr::new(10, 1, 0, 3));

        pool.release(Ipv4Addr::new(10, 1, 0, 2));
        assert_eq!(pool.reserve().unwrap(), Ipv4Addr::new(10, 1, 0, 2));
    }

    #[test]
    fn test_reserve_exact_rejects_taken_and_foreign() {
        let mut pool = AddressPool::new(subnet("10.1.0.0/24"), None).unwrap();
        let addr = Ipv4Addr::new(10, 1, 0, 100);

        pool.reserve_exact(addr).unwrap();
        assert!(matches!(
            pool.reserve_exact(addr),
            Err(AllocError::AddressUnavailable { .. })
        ));
        assert!(matches!(
            pool.reserve_exact(Ipv4Addr::new(192, 168, 0, 1)),
            Err(AllocError::AddressUnavailable { .. })
        ));
    }

    #[test]
    fn test_release_is_idempotent_noop() {
        let mut pool = AddressPool::new(subnet("10.1.0.0/24"), None).unwrap();
        let before = pool.available();

        pool.release(Ipv4Addr::new(10, 1, 0, 50)); // never reserved
        pool.release(Ipv4Addr::new(10, 1, 0, 1)); // gateway, permanent
        pool.release(Ipv4Addr::new(172, 16, 0, 1)); // out of subnet

        assert_eq!(pool.available(), before);
        assert!(pool.is_reserved(Ipv4Addr::new(10, 1, 0, 1)));
    }

    #[test]
    fn test_exhaustion() {
        // /30: network, gateway, one usable host, broadcast.
        let mut pool = AddressPool::new(subnet("10.1.0.0/30"), None).unwrap();
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.reserve().unwrap(), Ipv4Addr::new(10, 1, 0, 2));
        assert!(matches!(
            pool.reserve(),
            Err(AllocError::PoolExhausted { .. })
        ));
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut pool = AddressPool::new(subnet("10.1.0.0/24"), None).unwrap();
        let addr = Ipv4Addr::new(10, 1, 0, 9);

        pool.restore(addr).unwrap();
        pool.restore(addr).unwrap();
        assert!(pool.is_reserved(addr));
        assert!(matches!(
            pool.reserve_exact(addr),
            Err(AllocError::AddressUnavailable { .. })
        ));
    }

    #[test]
    fn test_custom_gateway_validated() {
        let subnet24 = subnet("10.1.0.0/24");
        assert!(AddressPool::new(subnet24, Some(Ipv4Addr::new(10, 1, 0, 254))).is_ok());
        assert!(matches!(
            AddressPool::new(subnet24, Some(Ipv4Addr::new(10, 1, 0, 255))),
            Err(AllocError::InvalidGateway { .. })
        ));
        assert!(matches!(
            AddressPool::new(subnet24, Some(Ipv4Addr::new(10, 2, 0, 1))),
            Err(AllocError::InvalidGateway { .. })
        ));
    }

    #[test]
    fn test_host_only_subnets_rejected() {
        assert!(matches!(
            AddressPool::new(subnet("10.1.0.0/31"), None),
            Err(AllocError::InvalidSubnet { .. })
        ));
    }
}
