//! # In-memory transactional object store.
//!
//! [`MemoryStore`] is the reference implementation of the store boundary the
//! allocator consumes: transactional read/write access to Networks, Services
//! and Tasks keyed by string identity, plus a subscription yielding typed
//! change events in commit order.
//!
//! ## Architecture
//! ```text
//! writer ──► update(|tx| ...) ──► staged changes ──► commit ──► Bus.publish(Event)
//!                                   (all-or-nothing)              (commit order)
//! reader ──► view(|v| ...)      point-in-time consistent snapshot
//! ```
//!
//! ## Rules
//! - **Serialized writers**: one mutex guards all state; write-write conflicts
//!   cannot occur. A transaction's staged mutations apply atomically on `Ok`
//!   and are discarded wholesale on `Err`.
//! - **Commit-ordered events**: events are published while the write lock is
//!   held, so channel order equals commit order.
//! - **Deep copies**: reads and events hand out clones; holding an object
//!   never pins store state.
//! - **No replay**: subscribe before relying on delivery; events committed
//!   before subscription are only reachable through a scan.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::alloc::ObjectLookup;
use crate::error::StoreError;
use crate::events::{Action, Bus, Change, Event};
use crate::objects::{Network, Service, Task};

#[derive(Debug, Clone, Default)]
struct Shared {
    networks: BTreeMap<String, Network>,
    services: BTreeMap<String, Service>,
    tasks: BTreeMap<String, Task>,
}

/// Transactional in-memory store with commit-ordered change events.
#[derive(Debug)]
pub struct MemoryStore {
    shared: Mutex<Shared>,
    bus: Bus,
}

impl MemoryStore {
    /// Creates an empty store whose event channel holds `bus_capacity` events.
    pub fn new(bus_capacity: usize) -> Self {
        Self {
            shared: Mutex::new(Shared::default()),
            bus: Bus::new(bus_capacity),
        }
    }

    /// Runs a write transaction.
    ///
    /// The closure stages mutations on [`WriteTx`]; they become visible and
    /// their events are published only if it returns `Ok`. On `Err` the store
    /// is left untouched.
    pub fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut WriteTx) -> Result<(), StoreError>,
    {
        let mut shared = self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut tx = WriteTx {
            state: shared.clone(),
            staged: Vec::new(),
        };
        f(&mut tx)?;

        *shared = tx.state;
        // Published under the lock: channel order == commit order.
        for change in tx.staged {
            self.bus.publish(Event::new(change));
        }
        Ok(())
    }

    /// Runs a read transaction over a point-in-time consistent snapshot.
    pub fn view<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ReadView) -> R,
    {
        let shared = self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&ReadView { state: &shared })
    }

    /// Creates a receiver observing every mutation committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}

impl ObjectLookup for MemoryStore {
    fn network(&self, id: &str) -> Option<Network> {
        self.view(|v| v.get_network(id))
    }

    fn service(&self, id: &str) -> Option<Service> {
        self.view(|v| v.get_service(id))
    }
}

/// Staging area of one write transaction.
pub struct WriteTx {
    state: Shared,
    staged: Vec<Change>,
}

/// Rejects network specs the allocator could never satisfy.
///
/// Failing the writer's transaction is the surfacing: a malformed network
/// never reaches the store, so the engine only defers on dynamic conditions
/// (exhaustion, overlap), never on bad input.
fn validate_network_spec(network: &Network) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidSpec {
        id: network.id.clone(),
        reason,
    };

    if let Some(subnet) = network.spec.subnet {
        if subnet.prefix_len() > 30 {
            return Err(invalid(format!(
                "subnet {subnet} has no usable host addresses"
            )));
        }
    }
    if let Some(gateway) = network.spec.gateway {
        let Some(subnet) = network.spec.subnet else {
            return Err(invalid(format!(
                "gateway {gateway} requires an explicit subnet"
            )));
        };
        let subnet = subnet.trunc();
        let usable = subnet.contains(&gateway)
            && gateway != subnet.network()
            && gateway != subnet.broadcast();
        if !usable {
            return Err(invalid(format!(
                "gateway {gateway} is not a usable address in {subnet}"
            )));
        }
    }
    Ok(())
}

impl WriteTx {
    // --- Networks ---

    /// Stages creation of a network.
    ///
    /// Fails with [`StoreError::InvalidSpec`] on an unusable subnet or
    /// gateway; the whole transaction rolls back.
    pub fn create_network(&mut self, network: Network) -> Result<(), StoreError> {
        if self.state.networks.contains_key(&network.id) {
            return Err(StoreError::AlreadyExists {
                id: network.id.clone(),
            });
        }
        validate_network_spec(&network)?;
        self.state
            .networks
            .insert(network.id.clone(), network.clone());
        self.staged.push(Change::Network(Action::Create, network));
        Ok(())
    }

    /// Stages an in-place update of a network.
    ///
    /// Applies the same spec validation as
    /// [`create_network`](Self::create_network).
    pub fn update_network(&mut self, network: Network) -> Result<(), StoreError> {
        if !self.state.networks.contains_key(&network.id) {
            return Err(StoreError::NotFound {
                id: network.id.clone(),
            });
        }
        validate_network_spec(&network)?;
        self.state
            .networks
            .insert(network.id.clone(), network.clone());
        self.staged.push(Change::Network(Action::Update, network));
        Ok(())
    }

    /// Stages deletion of a network.
    pub fn delete_network(&mut self, id: &str) -> Result<(), StoreError> {
        let network = self
            .state
            .networks
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        self.staged.push(Change::Network(Action::Delete, network));
        Ok(())
    }

    /// Reads a network as of this transaction's state.
    pub fn get_network(&self, id: &str) -> Option<Network> {
        self.state.networks.get(id).cloned()
    }

    // --- Services ---

    /// Stages creation of a service.
    pub fn create_service(&mut self, service: Service) -> Result<(), StoreError> {
        if self.state.services.contains_key(&service.id) {
            return Err(StoreError::AlreadyExists {
                id: service.id.clone(),
            });
        }
        self.state
            .services
            .insert(service.id.clone(), service.clone());
        self.staged.push(Change::Service(Action::Create, service));
        Ok(())
    }

    /// Stages an in-place update of a service.
    pub fn update_service(&mut self, service: Service) -> Result<(), StoreError> {
        if !self.state.services.contains_key(&service.id) {
            return Err(StoreError::NotFound {
                id: service.id.clone(),
            });
        }
        self.state
            .services
            .insert(service.id.clone(), service.clone());
        self.staged.push(Change::Service(Action::Update, service));
        Ok(())
    }

    /// Stages deletion of a service.
    pub fn delete_service(&mut self, id: &str) -> Result<(), StoreError> {
        let service = self
            .state
            .services
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        self.staged.push(Change::Service(Action::Delete, service));
        Ok(())
    }

    /// Reads a service as of this transaction's state.
    pub fn get_service(&self, id: &str) -> Option<Service> {
        self.state.services.get(id).cloned()
    }

    // --- Tasks ---

    /// Stages creation of a task.
    pub fn create_task(&mut self, task: Task) -> Result<(), StoreError> {
        if self.state.tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists {
                id: task.id.clone(),
            });
        }
        self.state.tasks.insert(task.id.clone(), task.clone());
        self.staged.push(Change::Task(Action::Create, task));
        Ok(())
    }

    /// Stages an in-place update of a task.
    pub fn update_task(&mut self, task: Task) -> Result<(), StoreError> {
        if !self.state.tasks.contains_key(&task.id) {
            return Err(StoreError::NotFound {
                id: task.id.clone(),
            });
        }
        self.state.tasks.insert(task.id.clone(), task.clone());
        self.staged.push(Change::Task(Action::Update, task));
        Ok(())
    }

    /// Stages deletion of a task.
    pub fn delete_task(&mut self, id: &str) -> Result<(), StoreError> {
        let task = self
            .state
            .tasks
            .remove(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        self.staged.push(Change::Task(Action::Delete, task));
        Ok(())
    }

    /// Reads a task as of this transaction's state.
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.state.tasks.get(id).cloned()
    }
}

/// Point-in-time consistent read snapshot.
pub struct ReadView<'a> {
    state: &'a Shared,
}

impl ReadView<'_> {
    /// Reads one network.
    pub fn get_network(&self, id: &str) -> Option<Network> {
        self.state.networks.get(id).cloned()
    }

    /// Reads one service.
    pub fn get_service(&self, id: &str) -> Option<Service> {
        self.state.services.get(id).cloned()
    }

    /// Reads one task.
    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.state.tasks.get(id).cloned()
    }

    /// All networks, ordered by identity.
    pub fn networks(&self) -> Vec<Network> {
        self.state.networks.values().cloned().collect()
    }

    /// All services, ordered by identity.
    pub fn services(&self) -> Vec<Service> {
        self.state.services.values().cloned().collect()
    }

    /// All tasks, ordered by identity.
    pub fn tasks(&self) -> Vec<Task> {
        self.state.tasks.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{ContainerSpec, NetworkSpec};

    fn network(id: &str) -> Network {
        Network::new(
            id,
            NetworkSpec {
                name: id.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_update_is_atomic_on_error() {
        let store = MemoryStore::new(16);

        let res = store.update(|tx| {
            tx.create_network(network("n1"))?;
            tx.create_network(network("n1"))?; // duplicate, fails the tx
            Ok(())
        });

        assert!(matches!(res, Err(StoreError::AlreadyExists { .. })));
        assert!(store.view(|v| v.get_network("n1")).is_none());
    }

    #[test]
    fn test_events_follow_commit_order() {
        let store = MemoryStore::new(16);
        let mut rx = store.subscribe();

        store
            .update(|tx| {
                tx.create_network(network("n1"))?;
                tx.create_task(Task::new("t1", ContainerSpec::default()))?;
                Ok(())
            })
            .unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(matches!(first.change, Change::Network(Action::Create, _)));
        assert!(matches!(second.change, Change::Task(Action::Create, _)));
        assert!(first.seq < second.seq);
    }

    #[test]
    fn test_failed_tx_publishes_nothing() {
        let store = MemoryStore::new(16);
        let mut rx = store.subscribe();

        let _ = store.update(|tx| {
            tx.create_network(network("n1"))?;
            tx.delete_task("missing")?;
            Ok(())
        });

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_create_rejects_out_of_subnet_gateway() {
        let store = MemoryStore::new(16);
        let mut bad = network("n1");
        bad.spec.subnet = Some("10.1.0.0/24".parse().unwrap());
        bad.spec.gateway = Some("10.2.0.1".parse().unwrap());

        // The writer's own transaction fails; nothing reaches the store.
        let res = store.update(|tx| tx.create_network(bad));
        assert!(matches!(res, Err(StoreError::InvalidSpec { .. })));
        assert!(store.view(|v| v.get_network("n1")).is_none());
    }

    #[test]
    fn test_create_rejects_unusable_specs() {
        let store = MemoryStore::new(16);

        let mut host_only = network("n1");
        host_only.spec.subnet = Some("10.1.0.0/31".parse().unwrap());
        assert!(matches!(
            store.update(|tx| tx.create_network(host_only)),
            Err(StoreError::InvalidSpec { .. })
        ));

        let mut floating_gateway = network("n2");
        floating_gateway.spec.gateway = Some("10.1.0.1".parse().unwrap());
        assert!(matches!(
            store.update(|tx| tx.create_network(floating_gateway)),
            Err(StoreError::InvalidSpec { .. })
        ));

        let mut broadcast_gateway = network("n3");
        broadcast_gateway.spec.subnet = Some("10.1.0.0/24".parse().unwrap());
        broadcast_gateway.spec.gateway = Some("10.1.0.255".parse().unwrap());
        assert!(matches!(
            store.update(|tx| tx.create_network(broadcast_gateway)),
            Err(StoreError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_reads_are_deep_copies() {
        let store = MemoryStore::new(16);
        store
            .update(|tx| tx.create_network(network("n1")))
            .unwrap();

        let mut copy = store.view(|v| v.get_network("n1")).unwrap();
        copy.spec.name = "mutated".to_string();

        let fresh = store.view(|v| v.get_network("n1")).unwrap();
        assert_eq!(fresh.spec.name, "n1");
    }
}
