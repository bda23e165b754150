//! Workload manager: many deployments in one process.
//!
//! Each deployment sits behind its own async mutex; the map lock is only
//! held long enough to clone a handle. Deployments that are not in memory
//! are looked up in the state store and rehydrated on demand.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::Mutex;

use haymaker_core::{DeploymentConfig, DeploymentPhase, DeploymentState, HaymakerError, Result};
use haymaker_scheduler::SchedulerStatus;
use haymaker_scheduler::log::{ActivityLog, read_log_file};

use crate::lifecycle::{CleanupReport, Deployment, DeploymentServices};

/// Lines served from an on-disk activity log when the deployment is not live.
pub const FILE_LOG_TAIL: usize = 100;

type Handle = Arc<Mutex<Deployment>>;

pub struct Workload {
    services: DeploymentServices,
    deployments: RwLock<HashMap<String, Handle>>,
}

impl Workload {
    pub fn new(services: DeploymentServices) -> Self {
        Self {
            services,
            deployments: RwLock::new(HashMap::new()),
        }
    }

    /// Validate, provision and start a deployment. Returns its id.
    pub async fn deploy(&self, config: DeploymentConfig) -> Result<String> {
        let deployment = Deployment::deploy(config, self.services.clone()).await?;
        let id = deployment.id().to_string();
        self.insert(deployment);
        tracing::info!("🚀 Deployment {id} is executing");
        Ok(id)
    }

    /// Current state. Falls back to the store for deployments not in memory.
    pub async fn get_status(&self, deployment_id: &str) -> Result<DeploymentState> {
        if let Some(handle) = self.get(deployment_id) {
            let mut deployment = handle.lock().await;
            deployment.refresh().await?;
            return Ok(deployment.state());
        }
        self.services
            .store
            .load(deployment_id)
            .await?
            .ok_or_else(|| HaymakerError::DeploymentNotFound(deployment_id.to_string()))
    }

    pub async fn stop(&self, deployment_id: &str) -> Result<()> {
        let handle = self.handle_or_resume(deployment_id).await?;
        let mut deployment = handle.lock().await;
        deployment.stop().await
    }

    pub async fn cleanup(&self, deployment_id: &str) -> Result<CleanupReport> {
        let handle = self.handle_or_resume(deployment_id).await?;
        let mut deployment = handle.lock().await;
        deployment.cleanup().await
    }

    /// Activity log lines. A live deployment streams its in-memory log; any
    /// other known deployment serves the tail of its log file.
    pub async fn get_logs(
        &self,
        deployment_id: &str,
        follow: bool,
    ) -> Result<BoxStream<'static, String>> {
        if let Some(handle) = self.get(deployment_id) {
            return Ok(handle.lock().await.get_logs(follow));
        }
        if self.services.store.load(deployment_id).await?.is_none() {
            return Err(HaymakerError::DeploymentNotFound(deployment_id.to_string()));
        }

        let lines = match &self.services.log_dir {
            Some(dir) => {
                let path = ActivityLog::file_path(dir, deployment_id);
                match read_log_file(&path, FILE_LOG_TAIL) {
                    Ok(lines) => lines,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                    Err(e) => return Err(e.into()),
                }
            }
            None => Vec::new(),
        };
        Ok(stream::iter(lines).boxed())
    }

    /// In-memory deployments plus every persisted one not already listed.
    pub async fn list_deployments(&self) -> Result<Vec<DeploymentState>> {
        let mut states = Vec::new();
        for handle in self.handles() {
            let mut deployment = handle.lock().await;
            deployment.refresh().await?;
            states.push(deployment.state());
        }
        for persisted in self.services.store.list().await? {
            if !states.iter().any(|s| s.deployment_id == persisted.deployment_id) {
                states.push(persisted);
            }
        }
        states.sort_by_key(|s| s.created_at);
        Ok(states)
    }

    /// Rehydrate a persisted deployment into this process.
    pub async fn resume(&self, deployment_id: &str) -> Result<()> {
        self.handle_or_resume(deployment_id).await.map(|_| ())
    }

    /// Block until the deployment's scheduler exits, then refresh its phase.
    /// Holds no lock while waiting, so `stop` stays available.
    pub async fn wait_until_finished(&self, deployment_id: &str) -> Result<DeploymentPhase> {
        let handle = self
            .get(deployment_id)
            .ok_or_else(|| HaymakerError::DeploymentNotFound(deployment_id.to_string()))?;

        let status_rx = handle.lock().await.subscribe();
        if let Some(mut rx) = status_rx {
            while *rx.borrow_and_update() == SchedulerStatus::Running {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
        let mut deployment = handle.lock().await;
        deployment.refresh().await
    }

    async fn handle_or_resume(&self, deployment_id: &str) -> Result<Handle> {
        if let Some(handle) = self.get(deployment_id) {
            return Ok(handle);
        }
        let deployment = Deployment::resume(deployment_id, self.services.clone()).await?;
        Ok(self.insert(deployment))
    }

    fn insert(&self, deployment: Deployment) -> Handle {
        let id = deployment.id().to_string();
        let mut map = self.deployments.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            map.entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(deployment))),
        )
    }

    fn get(&self, deployment_id: &str) -> Option<Handle> {
        self.deployments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(deployment_id)
            .cloned()
    }

    fn handles(&self) -> Vec<Handle> {
        self.deployments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryDirectory, JsonStateStore, LoggingTransport, MemoryStateStore};
    use haymaker_core::SchedulerConfig;
    use haymaker_core::traits::StateStore;
    use haymaker_scheduler::SimulatedClock;

    fn services(store: Arc<dyn StateStore>) -> DeploymentServices {
        DeploymentServices::new(
            Arc::new(InMemoryDirectory::new()),
            Arc::new(LoggingTransport::new()),
            store,
        )
        .with_clock(Arc::new(SimulatedClock::at_hour(10)))
        .with_scheduler_config(SchedulerConfig {
            seed: Some(3),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_deploy_status_and_list() {
        let store = Arc::new(MemoryStateStore::new());
        let workload = Workload::new(services(store.clone()));

        let id = workload
            .deploy(DeploymentConfig {
                workers: 2,
                department: "engineering".into(),
                duration_hours: Some(0.5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(id.starts_with("m365-"));

        assert_eq!(
            workload.wait_until_finished(&id).await.unwrap(),
            DeploymentPhase::Completed
        );
        assert_eq!(
            workload.get_status(&id).await.unwrap().phase,
            DeploymentPhase::Completed
        );

        // A deployment from an earlier process, known only to the store.
        let foreign = DeploymentState::new(DeploymentConfig::default());
        store.save(&foreign).await.unwrap();

        let listed = workload.list_deployments().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|s| s.deployment_id == foreign.deployment_id));

        let report = workload.cleanup(&id).await.unwrap();
        assert_eq!(report.resources_deleted, 2);
    }

    #[tokio::test]
    async fn test_unknown_deployment() {
        let workload = Workload::new(services(Arc::new(MemoryStateStore::new())));
        for result in [
            workload.get_status("m365-00000000").await.err(),
            workload.stop("m365-00000000").await.err(),
            workload.get_logs("m365-00000000", false).await.err(),
        ] {
            assert!(matches!(result, Some(HaymakerError::DeploymentNotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_persisted_deployment_logs_and_cleanup() {
        let root = std::env::temp_dir().join("haymaker-test-workload-persisted");
        std::fs::remove_dir_all(&root).ok();
        let log_dir = root.join("logs");
        let store = Arc::new(JsonStateStore::new(&root.join("state")));

        // Left behind by an earlier process: stopped, one worker, a log file.
        let earlier = {
            let workload = Workload::new(services(store.clone()).with_log_dir(log_dir.clone()));
            let id = workload
                .deploy(DeploymentConfig {
                    workers: 1,
                    department: "hr".into(),
                    ..Default::default()
                })
                .await
                .unwrap();
            workload.stop(&id).await.unwrap();
            id
        };

        let workload = Workload::new(services(store.clone()).with_log_dir(log_dir));
        let lines: Vec<String> = workload
            .get_logs(&earlier, false)
            .await
            .unwrap()
            .collect()
            .await;
        assert!(lines.iter().any(|l| l.contains("Creating 1 workers in hr")));
        assert!(lines.iter().any(|l| l.contains("Deployment stopped")));

        assert_eq!(
            workload.get_status(&earlier).await.unwrap().phase,
            DeploymentPhase::Stopped
        );
        let report = workload.cleanup(&earlier).await.unwrap();
        assert_eq!(report.resources_deleted, 1);
        let persisted = store.load(&earlier).await.unwrap().unwrap();
        assert!(persisted.is_terminal());
        std::fs::remove_dir_all(&root).ok();
    }
}
