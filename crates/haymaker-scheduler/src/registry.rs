//! Worker Registry: the set of simulated workers in one deployment.
//!
//! Readers get a snapshot (`all()`), so provisioning and cleanup can add or
//! remove workers while the scheduler walks the previous snapshot.

use std::sync::RwLock;

use haymaker_core::WorkerIdentity;

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: RwLock<Vec<WorkerIdentity>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted identities.
    pub fn from_identities(identities: impl IntoIterator<Item = WorkerIdentity>) -> Self {
        let reg = Self::new();
        for identity in identities {
            reg.add(identity);
        }
        reg
    }

    /// Add a worker. An existing worker with the same id is replaced.
    pub fn add(&self, identity: WorkerIdentity) {
        let mut workers = self.workers.write().unwrap_or_else(|e| e.into_inner());
        match workers.iter_mut().find(|w| w.worker_id == identity.worker_id) {
            Some(existing) => *existing = identity,
            None => {
                tracing::debug!(
                    "👤 Registered worker: {} ({})",
                    identity.display_name,
                    identity.worker_id
                );
                workers.push(identity);
            }
        }
    }

    /// Remove a worker. Unknown ids are ignored. Returns whether one was removed.
    pub fn remove(&self, worker_id: &str) -> bool {
        let mut workers = self.workers.write().unwrap_or_else(|e| e.into_inner());
        let len = workers.len();
        workers.retain(|w| w.worker_id != worker_id);
        workers.len() < len
    }

    /// Snapshot of every registered worker, in registration order.
    pub fn all(&self) -> Vec<WorkerIdentity> {
        self.workers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get(&self, worker_id: &str) -> Option<WorkerIdentity> {
        self.workers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|w| w.worker_id == worker_id)
            .cloned()
    }

    pub fn clear(&self) {
        self.workers.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.workers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haymaker_core::{Department, WorkerConfig};

    fn worker(n: u32) -> WorkerIdentity {
        let cfg = WorkerConfig::new(Department::Operations, n, "m365-test0001");
        WorkerIdentity::from_config(&cfg, &format!("obj-{n}"), &format!("w{n}@contoso.example"))
    }

    #[test]
    fn test_add_remove_clear() {
        let reg = WorkerRegistry::new();
        reg.add(worker(1));
        reg.add(worker(2));
        assert_eq!(reg.len(), 2);
        assert!(reg.get("worker-m365-test0001-2").is_some());

        assert!(reg.remove("worker-m365-test0001-1"));
        assert!(!reg.remove("worker-m365-test0001-1"), "second remove is a no-op");
        assert!(!reg.remove("does-not-exist"));
        assert_eq!(reg.len(), 1);

        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn test_add_same_id_replaces() {
        let reg = WorkerRegistry::new();
        reg.add(worker(1));
        let mut again = worker(1);
        again.account = "renamed@contoso.example".into();
        reg.add(again);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.all()[0].account, "renamed@contoso.example");
    }

    #[test]
    fn test_snapshot_is_stable_under_mutation() {
        let reg = WorkerRegistry::from_identities((1..=3).map(worker));
        let snapshot = reg.all();
        reg.remove("worker-m365-test0001-2");
        reg.add(worker(4));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[1].worker_id, "worker-m365-test0001-2");
        assert_eq!(reg.len(), 3);
    }
}
