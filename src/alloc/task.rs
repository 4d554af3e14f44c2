//! # Task allocator: network attachments and endpoint copies.
//!
//! Resolves each task's network references into one address per attachment,
//! drawn from the referenced networks' pools, and copies the owning service's
//! endpoint onto the task. Dependency checks run **before** any pool mutation,
//! so a blocked task never holds a partial reservation; a reservation pass
//! that fails mid-way is rolled back.
//!
//! ## Outcomes
//! ```text
//! allocate(task)
//!   ├─ Blocked(keys)          missing/unallocated deps; caller parks the task
//!   ├─ Ready { changed: true }  allocation fields populated, write back
//!   ├─ Ready { changed: false } already converged, no store write
//!   └─ Err(PoolExhausted)     capacity failure; retried on a future event
//! ```

use std::net::Ipv4Addr;

use crate::error::AllocError;
use crate::objects::{NetworkAttachment, Task, TaskState};

use super::network::NetworkAllocator;
use super::pending::DepKey;
use super::ObjectLookup;

/// Result of one task allocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Every dependency resolved; `changed` says whether the object mutated.
    Ready {
        /// True if allocation fields were (re)populated this attempt.
        changed: bool,
    },
    /// One or more dependencies are missing or unallocated.
    ///
    /// Not an error: the caller parks the task in the dependency tracker
    /// under each key and re-attempts when a key is satisfied.
    Blocked(Vec<DepKey>),
}

/// Resolves task network references and service endpoints.
#[derive(Debug, Default)]
pub struct TaskAllocator;

impl TaskAllocator {
    /// Creates a task allocator.
    pub fn new() -> Self {
        Self
    }

    /// Attempts to allocate the task in place.
    ///
    /// A task referencing zero networks is immediately ready; it still blocks
    /// on its service if one is set and unallocated. An already fully
    /// allocated task performs no pool operations and reports
    /// `Ready { changed: false }`.
    pub fn allocate<L: ObjectLookup>(
        &self,
        task: &mut Task,
        nets: &mut NetworkAllocator,
        lookup: &L,
    ) -> Result<TaskOutcome, AllocError> {
        // Phase 1: dependency check, no mutation yet.
        let mut missing = Vec::new();
        for id in task.network_refs() {
            let satisfied = lookup.network(id).is_some_and(|n| n.is_allocated()) && nets.has_pool(id);
            if !satisfied {
                missing.push(DepKey::Network(id.to_string()));
            }
        }
        let endpoint = match &task.service_id {
            Some(sid) => match lookup.service(sid) {
                Some(svc) if svc.is_allocated() => svc.endpoint,
                _ => {
                    missing.push(DepKey::Service(sid.clone()));
                    None
                }
            },
            None => None,
        };
        if !missing.is_empty() {
            task.state = TaskState::Pending;
            return Ok(TaskOutcome::Blocked(missing));
        }

        // Phase 2: drop attachments whose reference was removed from the
        // spec, then reserve addresses for references without an attachment.
        let mut changed = false;
        let refs: Vec<String> = task.network_refs().iter().map(|s| s.to_string()).collect();
        let mut kept = Vec::with_capacity(task.attachments.len());
        for att in std::mem::take(&mut task.attachments) {
            if refs.contains(&att.network_id) {
                kept.push(att);
                continue;
            }
            if let Some(pool) = nets.pool_mut(&att.network_id) {
                for addr in &att.addresses {
                    pool.release(*addr);
                }
            }
            changed = true;
        }
        task.attachments = kept;

        let mut reserved_now: Vec<(String, Ipv4Addr)> = Vec::new();
        for id in refs {
            if let Some(att) = task.attachment(&id) {
                // Restart path: re-mark recorded addresses in the rebuilt pool.
                let addresses = att.addresses.clone();
                if let Some(pool) = nets.pool_mut(&id) {
                    for addr in addresses {
                        pool.restore(addr)?;
                    }
                }
                continue;
            }

            let Some(pool) = nets.pool_mut(&id) else {
                // Pool vanished between phases; report as blocked.
                self.rollback(task, nets, &reserved_now);
                return Ok(TaskOutcome::Blocked(vec![DepKey::Network(id)]));
            };
            match pool.reserve() {
                Ok(addr) => {
                    reserved_now.push((id.clone(), addr));
                    task.attachments.push(NetworkAttachment {
                        network_id: id,
                        addresses: vec![addr],
                    });
                    changed = true;
                }
                Err(err) => {
                    self.rollback(task, nets, &reserved_now);
                    return Err(err);
                }
            }
        }

        // Phase 3: endpoint copy and state transition.
        if endpoint.is_some() && task.endpoint != endpoint {
            task.endpoint = endpoint;
            changed = true;
        }
        if task.state != TaskState::Allocated {
            task.state = TaskState::Allocated;
            changed = true;
        }
        Ok(TaskOutcome::Ready { changed })
    }

    /// Releases every address the task holds, best-effort.
    ///
    /// Attachments to networks whose pool no longer exists are skipped: the
    /// pool (and its reservations) died with the network.
    pub fn deallocate(&self, task: &Task, nets: &mut NetworkAllocator) {
        for att in &task.attachments {
            if let Some(pool) = nets.pool_mut(&att.network_id) {
                for addr in &att.addresses {
                    pool.release(*addr);
                }
            }
        }
    }

    /// Undoes the reservations of a failed attempt.
    fn rollback(&self, task: &mut Task, nets: &mut NetworkAllocator, reserved: &[(String, Ipv4Addr)]) {
        for (network_id, addr) in reserved {
            if let Some(pool) = nets.pool_mut(network_id) {
                pool.release(*addr);
            }
            task.attachments
                .retain(|att| !(att.network_id == *network_id && att.addresses.contains(addr)));
        }
    }
}
