//! # Task object: network references and allocation state.
//!
//! A [`Task`] declares the networks it wants to join by ID. The allocator
//! resolves each distinct reference into a [`NetworkAttachment`] holding one
//! concrete address drawn from that network's pool, copies the owning
//! service's endpoint (if any), and moves the task to
//! [`TaskState::Allocated`].
//!
//! ## Rules
//! - One attachment per distinct network reference, one address per attachment.
//! - Zero references ⇒ immediately allocatable with an empty attachment list.
//! - `Allocated` is reached only after every reference resolves and, if
//!   `service_id` is set, the service itself is allocated.

use std::net::Ipv4Addr;

use super::service::Endpoint;

/// Allocation lifecycle of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskState {
    /// Created, not yet examined by the allocator.
    #[default]
    New,
    /// Blocked on a missing or unallocated dependency.
    ///
    /// Held only on the allocator's working copy; a blocked task's stored
    /// state stays `New` so that deferral emits no store event.
    Pending,
    /// Every reference resolved; allocation fields are fully populated.
    Allocated,
}

/// Container runtime portion of a task spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Networks to attach to, by network ID.
    pub networks: Vec<String>,
}

/// A concrete attachment of a task to one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Identity of the attached network.
    pub network_id: String,
    /// Addresses reserved in the network's pool (exactly one in this design).
    pub addresses: Vec<Ipv4Addr>,
}

/// A unit of work scheduled on the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Store identity.
    pub id: String,
    /// Owning service, if any (back-reference, not ownership).
    pub service_id: Option<String>,
    /// Container spec listing network references.
    pub spec: ContainerSpec,
    /// Allocation lifecycle state.
    pub state: TaskState,
    /// One attachment per distinct network reference.
    pub attachments: Vec<NetworkAttachment>,
    /// Endpoint copied from the owning service.
    pub endpoint: Option<Endpoint>,
}

impl Task {
    /// Creates an unallocated task with the given identity and spec.
    pub fn new(id: impl Into<String>, spec: ContainerSpec) -> Self {
        Self {
            id: id.into(),
            service_id: None,
            spec,
            state: TaskState::New,
            attachments: Vec::new(),
            endpoint: None,
        }
    }

    /// Attaches the task to a service.
    pub fn with_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Distinct network references in spec order.
    pub fn network_refs(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for id in &self.spec.networks {
            if !seen.contains(&id.as_str()) {
                seen.push(id.as_str());
            }
        }
        seen
    }

    /// Returns the attachment for `network_id`, if present.
    pub fn attachment(&self, network_id: &str) -> Option<&NetworkAttachment> {
        self.attachments.iter().find(|a| a.network_id == network_id)
    }
}
