//! # Reconciliation engine: applies one store event at a time.
//!
//! [`Engine`] holds the allocator state machine: the per-class allocators and
//! the dependency tracker. It is synchronous and single-owner; the event loop
//! in [`Allocator`](crate::core::Allocator) feeds it one event at a time, so
//! nothing here locks.
//!
//! ## Rules
//! - **Convergence writes**: the engine writes an object back only when an
//!   allocation attempt changed it; untouched objects produce no event, so the
//!   engine consuming its own updates cannot loop.
//! - **Blocked tasks are invisible**: a deferred task is parked in the
//!   tracker with no store write and no event.
//! - **Deletes free capacity**: pool/subnet releases happen inline, before the
//!   next event is read, so a waiting retry can succeed immediately.

use std::sync::Arc;

use crate::alloc::{
    DepKey, DependencyTracker, NetworkAllocator, ServiceAllocator, TaskAllocator, TaskOutcome,
};
use crate::events::{Action, Change, Event};
use crate::ipam::AddressSpace;
use crate::objects::{Network, Service, Task};
use crate::store::MemoryStore;

/// Single-owner allocation state machine driven by store events.
pub(crate) struct Engine {
    store: Arc<MemoryStore>,
    nets: NetworkAllocator,
    services: ServiceAllocator,
    tasks: TaskAllocator,
    tracker: DependencyTracker,
}

impl Engine {
    pub(crate) fn new(store: Arc<MemoryStore>, space: AddressSpace) -> Self {
        Self {
            store,
            nets: NetworkAllocator::new(space),
            services: ServiceAllocator::new(),
            tasks: TaskAllocator::new(),
            tracker: DependencyTracker::new(),
        }
    }

    /// Brings every stored object to its allocated state.
    ///
    /// Runs once at startup, before the event loop: networks first (their
    /// pools must exist before tasks draw from them), then services, then
    /// tasks. Already-allocated objects only rebuild in-memory pool state and
    /// produce no writes.
    pub(crate) fn reconcile_all(&mut self) {
        let (networks, services, tasks) = self
            .store
            .view(|v| (v.networks(), v.services(), v.tasks()));

        for network in networks {
            self.process_network(network);
        }
        for service in services {
            self.process_service(service);
        }
        for task in tasks {
            self.process_task(task);
        }
    }

    /// Routes one committed store event.
    pub(crate) fn dispatch(&mut self, event: &Event) {
        match &event.change {
            Change::Network(Action::Create | Action::Update, n) => {
                self.process_network(n.clone());
            }
            Change::Network(Action::Delete, n) => {
                // Waiters stay parked: the network they need still does not exist.
                self.nets.deallocate(n);
            }
            Change::Service(Action::Create | Action::Update, s) => {
                self.process_service(s.clone());
            }
            Change::Service(Action::Delete, s) => {
                self.services.deallocate(s);
            }
            Change::Task(Action::Create | Action::Update, t) => {
                self.process_task(t.clone());
            }
            Change::Task(Action::Delete, t) => {
                self.tasks.deallocate(t, &mut self.nets);
                self.tracker.forget(&t.id);
            }
        }
    }

    /// Allocates a network and re-attempts every task waiting on it.
    fn process_network(&mut self, mut network: Network) {
        match self.nets.allocate(&mut network) {
            Ok(true) => {
                let write = self.store.update(|tx| tx.update_network(network.clone()));
                if write.is_err() {
                    // Deleted mid-flight; return the subnet and pool.
                    self.nets.deallocate(&network);
                    return;
                }
            }
            Ok(false) => {}
            // Exhaustion or subnet overlap (malformed specs never pass the
            // store): the network stays unallocated and is re-attempted on
            // its next event.
            Err(_) => return,
        }
        if self.nets.has_pool(&network.id) {
            self.drain(DepKey::Network(network.id.clone()));
        }
    }

    /// Allocates a service and re-attempts every task waiting on it.
    fn process_service(&mut self, mut service: Service) {
        if self.services.allocate(&mut service) {
            let write = self.store.update(|tx| tx.update_service(service.clone()));
            if write.is_err() {
                self.services.deallocate(&service);
                return;
            }
        }
        if service.is_allocated() {
            self.drain(DepKey::Service(service.id.clone()));
        }
    }

    /// Allocates one task, parking it if dependencies are unmet.
    fn process_task(&mut self, mut task: Task) {
        match self
            .tasks
            .allocate(&mut task, &mut self.nets, self.store.as_ref())
        {
            Ok(TaskOutcome::Ready { changed }) => {
                self.tracker.forget(&task.id);
                if changed {
                    let write = self.store.update(|tx| tx.update_task(task.clone()));
                    if write.is_err() {
                        // Deleted mid-flight; release the fresh reservations.
                        self.tasks.deallocate(&task, &mut self.nets);
                    }
                }
            }
            Ok(TaskOutcome::Blocked(keys)) => {
                self.tracker.block(&task.id, keys);
            }
            // Pool exhausted: leave the task unallocated. A later deletion
            // frees capacity and a later event on the task retries it.
            Err(_) => {}
        }
    }

    /// Re-attempts every task that was blocked on `key`.
    ///
    /// Tasks are re-read from the store first: a stale copy must never be
    /// written back over a newer committed version.
    fn drain(&mut self, key: DepKey) {
        for id in self.tracker.satisfy(&key) {
            if let Some(task) = self.store.view(|v| v.get_task(&id)) {
                self.process_task(task);
            }
        }
    }

    #[cfg(test)]
    fn blocked_count(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{ContainerSpec, NetworkSpec, ServiceSpec, TaskState};

    fn engine_with_store() -> (Engine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(64));
        let engine = Engine::new(Arc::clone(&store), AddressSpace::default());
        (engine, store)
    }

    fn network(id: &str) -> Network {
        Network::new(
            id,
            NetworkSpec {
                name: id.to_string(),
                ..Default::default()
            },
        )
    }

    fn task_on(id: &str, networks: &[&str]) -> Task {
        Task::new(
            id,
            ContainerSpec {
                networks: networks.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    #[test]
    fn test_reconcile_all_allocates_preexisting_objects() {
        let (mut engine, store) = engine_with_store();
        store
            .update(|tx| {
                tx.create_network(network("n1"))?;
                tx.create_service(Service::new("s1", ServiceSpec::default()))?;
                tx.create_task(task_on("t1", &["n1"]))?;
                Ok(())
            })
            .unwrap();

        engine.reconcile_all();

        let n1 = store.view(|v| v.get_network("n1")).unwrap();
        assert!(n1.is_allocated());
        let s1 = store.view(|v| v.get_service("s1")).unwrap();
        assert!(s1.is_allocated());
        let t1 = store.view(|v| v.get_task("t1")).unwrap();
        assert_eq!(t1.state, TaskState::Allocated);
        assert_eq!(t1.attachments.len(), 1);
        assert!(n1
            .ipam
            .unwrap()
            .subnet
            .contains(&t1.attachments[0].addresses[0]));
    }

    #[test]
    fn test_blocked_task_drains_when_network_arrives() {
        let (mut engine, store) = engine_with_store();
        store
            .update(|tx| tx.create_task(task_on("t1", &["n1"])))
            .unwrap();
        engine.reconcile_all();

        assert_eq!(engine.blocked_count(), 1);
        assert_eq!(
            store.view(|v| v.get_task("t1")).unwrap().state,
            TaskState::New
        );

        store.update(|tx| tx.create_network(network("n1"))).unwrap();
        let mut rx = store.subscribe();
        engine.dispatch(&Event::new(Change::Network(
            Action::Create,
            store.view(|v| v.get_network("n1")).unwrap(),
        )));

        assert_eq!(engine.blocked_count(), 0);
        let t1 = store.view(|v| v.get_task("t1")).unwrap();
        assert_eq!(t1.state, TaskState::Allocated);

        // Causal write order: network update commits before the task update.
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(matches!(first.change, Change::Network(Action::Update, _)));
        assert!(matches!(second.change, Change::Task(Action::Update, _)));
    }

    #[test]
    fn test_converged_objects_produce_no_writes() {
        let (mut engine, store) = engine_with_store();
        store
            .update(|tx| {
                tx.create_network(network("n1"))?;
                tx.create_task(task_on("t1", &["n1"]))?;
                Ok(())
            })
            .unwrap();
        engine.reconcile_all();

        let mut rx = store.subscribe();
        let n1 = store.view(|v| v.get_network("n1")).unwrap();
        let t1 = store.view(|v| v.get_task("t1")).unwrap();
        engine.dispatch(&Event::new(Change::Network(Action::Update, n1)));
        engine.dispatch(&Event::new(Change::Task(Action::Update, t1)));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_network_delete_frees_subnet_for_reuse() {
        let (mut engine, store) = engine_with_store();
        let explicit = Network::new(
            "n1",
            NetworkSpec {
                name: "n1".into(),
                subnet: Some("10.42.0.0/24".parse().unwrap()),
                gateway: None,
            },
        );
        store.update(|tx| tx.create_network(explicit)).unwrap();
        engine.reconcile_all();

        let n1 = store.view(|v| v.get_network("n1")).unwrap();
        store.update(|tx| tx.delete_network("n1")).unwrap();
        engine.dispatch(&Event::new(Change::Network(Action::Delete, n1)));

        // The same explicit subnet must be claimable again.
        let again = Network::new(
            "n2",
            NetworkSpec {
                name: "n2".into(),
                subnet: Some("10.42.0.0/24".parse().unwrap()),
                gateway: None,
            },
        );
        store.update(|tx| tx.create_network(again.clone())).unwrap();
        engine.dispatch(&Event::new(Change::Network(Action::Create, again)));
        assert!(store.view(|v| v.get_network("n2")).unwrap().is_allocated());
    }

    #[test]
    fn test_task_blocked_on_service_drains_on_service_allocation() {
        let (mut engine, store) = engine_with_store();
        store
            .update(|tx| tx.create_task(task_on("t1", &[]).with_service("s1")))
            .unwrap();
        engine.reconcile_all();
        assert_eq!(engine.blocked_count(), 1);

        let svc = Service::new("s1", ServiceSpec::default());
        store.update(|tx| tx.create_service(svc.clone())).unwrap();
        engine.dispatch(&Event::new(Change::Service(Action::Create, svc)));

        let t1 = store.view(|v| v.get_task("t1")).unwrap();
        assert_eq!(t1.state, TaskState::Allocated);
        assert!(t1.endpoint.is_some());
    }

    #[test]
    fn test_task_delete_releases_addresses() {
        let (mut engine, store) = engine_with_store();
        store
            .update(|tx| {
                tx.create_network(network("n1"))?;
                tx.create_task(task_on("t1", &["n1"]))?;
                Ok(())
            })
            .unwrap();
        engine.reconcile_all();

        let t1 = store.view(|v| v.get_task("t1")).unwrap();
        let addr = t1.attachments[0].addresses[0];
        store.update(|tx| tx.delete_task("t1")).unwrap();
        engine.dispatch(&Event::new(Change::Task(Action::Delete, t1)));

        assert!(!engine.nets.pool_mut("n1").unwrap().is_reserved(addr));
    }

    #[test]
    fn test_restart_restores_pools_without_writes() {
        let (mut engine, store) = engine_with_store();
        store
            .update(|tx| {
                tx.create_network(network("n1"))?;
                tx.create_task(task_on("t1", &["n1"]))?;
                Ok(())
            })
            .unwrap();
        engine.reconcile_all();
        let addr = store.view(|v| v.get_task("t1")).unwrap().attachments[0].addresses[0];

        // Fresh engine over the same store: pools are rebuilt, nothing is
        // rewritten, and the recorded address is marked reserved again.
        let mut restarted = Engine::new(Arc::clone(&store), AddressSpace::default());
        let mut rx = store.subscribe();
        restarted.reconcile_all();

        assert!(rx.try_recv().is_err());
        assert!(restarted.nets.pool_mut("n1").unwrap().is_reserved(addr));
    }
}
