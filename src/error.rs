//! Error types used by the netvisor engine and the object store.
//!
//! This module defines three error enums, one per layer:
//!
//! - [`AllocError`] — resource-allocation failures (exhaustion, unavailable
//!   addresses, malformed specs).
//! - [`StoreError`] — object-store transaction failures.
//! - [`RuntimeError`] — fatal conditions that terminate the reconciliation loop.
//!
//! All types provide `as_label()` for logging/metrics. A missing dependency is
//! **not** an error anywhere in this crate: task allocation reports it through
//! [`TaskOutcome::Blocked`](crate::alloc::TaskOutcome), never through these enums.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use thiserror::Error;

/// # Errors produced by address and subnet allocation.
///
/// Exhaustion variants (`AddressSpaceExhausted`, `PoolExhausted`) leave the
/// object unallocated; the engine retries only when a future event changes
/// capacity. Validation variants (`SubnetInUse`, `InvalidSubnet`,
/// `InvalidGateway`) fail fast and are never retried blindly.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// No free subnet can be carved from the default address space.
    #[error("address space exhausted: no free subnet available")]
    AddressSpaceExhausted,

    /// Every usable address within the subnet is reserved.
    #[error("pool exhausted: no free address left in {subnet}")]
    PoolExhausted {
        /// The exhausted subnet.
        subnet: Ipv4Net,
    },

    /// A specific address was requested but is already reserved or lies
    /// outside the pool's subnet.
    #[error("address {address} unavailable in {subnet}")]
    AddressUnavailable {
        /// The requested address.
        address: Ipv4Addr,
        /// The pool's subnet.
        subnet: Ipv4Net,
    },

    /// A caller-specified subnet overlaps an existing allocation.
    #[error("subnet {subnet} overlaps an existing allocation")]
    SubnetInUse {
        /// The conflicting subnet.
        subnet: Ipv4Net,
    },

    /// The subnet cannot host a pool (no usable host addresses).
    #[error("invalid subnet {subnet}: no usable host addresses")]
    InvalidSubnet {
        /// The rejected subnet.
        subnet: Ipv4Net,
    },

    /// The requested gateway does not lie inside the subnet or collides with
    /// the network/broadcast address.
    #[error("invalid gateway {gateway} for subnet {subnet}")]
    InvalidGateway {
        /// The rejected gateway address.
        gateway: Ipv4Addr,
        /// The subnet it was requested for.
        subnet: Ipv4Net,
    },
}

impl AllocError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AllocError::AddressSpaceExhausted => "address_space_exhausted",
            AllocError::PoolExhausted { .. } => "pool_exhausted",
            AllocError::AddressUnavailable { .. } => "address_unavailable",
            AllocError::SubnetInUse { .. } => "subnet_in_use",
            AllocError::InvalidSubnet { .. } => "invalid_subnet",
            AllocError::InvalidGateway { .. } => "invalid_gateway",
        }
    }

    /// Indicates whether the failure may clear up when capacity is freed.
    ///
    /// Exhaustion is retryable on a future deletion event; validation errors
    /// are not.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            AllocError::AddressSpaceExhausted | AllocError::PoolExhausted { .. }
        )
    }
}

/// # Errors produced by store transactions.
///
/// The in-memory store serializes writers, so write-write conflicts are
/// unrepresentable; identity errors and spec validation remain. Malformed
/// specs are rejected here, in the writer's own transaction, so the engine
/// only ever sees objects it can act on.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A create targeted an identity that already exists.
    #[error("object {id} already exists")]
    AlreadyExists {
        /// Identity of the conflicting object.
        id: String,
    },

    /// An update or delete targeted an identity that does not exist.
    #[error("object {id} not found")]
    NotFound {
        /// Identity of the missing object.
        id: String,
    },

    /// The written object's spec is internally inconsistent.
    #[error("invalid spec for {id}: {reason}")]
    InvalidSpec {
        /// Identity of the rejected object.
        id: String,
        /// What the spec got wrong.
        reason: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::AlreadyExists { .. } => "store_already_exists",
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::InvalidSpec { .. } => "store_invalid_spec",
        }
    }
}

/// # Fatal conditions that terminate the reconciliation loop.
///
/// The engine relies on ordered, lossless event delivery (one subscription,
/// commit order). When that assumption breaks there is no safe way to keep
/// allocating; `run` returns and the embedding manager decides restart policy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The store's event channel closed while the loop was live.
    #[error("store event stream closed")]
    EventStreamClosed,

    /// The subscriber fell behind and the broadcast channel dropped events.
    #[error("store event stream lagged; {missed} events lost")]
    EventStreamLagged {
        /// Number of events the channel discarded.
        missed: u64,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::EventStreamClosed => "event_stream_closed",
            RuntimeError::EventStreamLagged { .. } => "event_stream_lagged",
        }
    }
}
