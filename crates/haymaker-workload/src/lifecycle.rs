//! Deployment lifecycle: the state machine around one scheduler.
//!
//! The [`Deployment`] is the only writer of its [`DeploymentState`]. Every
//! phase change goes through `advance`, which checks the transition graph
//! and persists the state before returning. Activity counts arrive through
//! the scheduler callback into a shared cell and are folded into the state
//! whenever it is read or saved.
//!
//! A run that reaches its end on its own is written to the store as
//! `completed` right away by a watcher task. The in-memory phase follows on
//! the next `refresh`, `wait_until_finished`, `stop` or `cleanup`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use haymaker_content::{ContentGenerator, GenerationStats};
use haymaker_core::config::ContentConfig;
use haymaker_core::traits::{
    ActivityCallback, ContentBackend, IdentityProvisioner, StateStore, Transport,
};
use haymaker_core::{
    ActivityCounters, ActivityRecord, DeploymentConfig, DeploymentPhase, DeploymentState,
    HaymakerError, Result, SchedulerConfig, WorkerConfig,
};
use haymaker_scheduler::{
    ActivityLog, ActivityScheduler, Clock, SchedulerSettings, SchedulerStatus, SystemClock,
    WorkerRegistry,
};

/// Outcome of `cleanup()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deployment_id: String,
    pub resources_deleted: u32,
    pub details: Vec<String>,
    pub errors: Vec<String>,
}

/// Collaborators and tunables shared by the deployments of one process.
#[derive(Clone)]
pub struct DeploymentServices {
    pub provisioner: Arc<dyn IdentityProvisioner>,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn StateStore>,
    pub backend: Option<Arc<dyn ContentBackend>>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: SchedulerConfig,
    pub content: ContentConfig,
    /// Activity logs go to `<log_dir>/<deployment_id>/activity.log` when set.
    pub log_dir: Option<PathBuf>,
    /// External telemetry sink, called after the deployment counted the record.
    pub activity_sink: Option<ActivityCallback>,
}

impl DeploymentServices {
    pub fn new(
        provisioner: Arc<dyn IdentityProvisioner>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            provisioner,
            transport,
            store,
            backend: None,
            clock: Arc::new(SystemClock),
            scheduler: SchedulerConfig::default(),
            content: ContentConfig::default(),
            log_dir: None,
            activity_sink: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ContentBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scheduler_config(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_content_config(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }

    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.log_dir = Some(log_dir);
        self
    }

    pub fn with_activity_sink(mut self, sink: ActivityCallback) -> Self {
        self.activity_sink = Some(sink);
        self
    }
}

/// One deployment and everything it owns.
pub struct Deployment {
    state: DeploymentState,
    services: DeploymentServices,
    registry: Arc<WorkerRegistry>,
    scheduler: Option<ActivityScheduler>,
    generator: Option<Arc<ContentGenerator>>,
    counters: Arc<Mutex<ActivityCounters>>,
    log: ActivityLog,
    completion_watch: Option<JoinHandle<()>>,
}

impl Deployment {
    /// Validate `config` and persist a `pending` deployment. Nothing is
    /// provisioned yet.
    pub async fn create(config: DeploymentConfig, services: DeploymentServices) -> Result<Self> {
        let mut violations = config.violations();
        violations.extend(services.scheduler.violations());
        if !violations.is_empty() {
            return Err(HaymakerError::Configuration(violations));
        }

        let state = DeploymentState::new(config);
        let log = Self::open_log(&services, &state.deployment_id);
        let deployment = Self {
            counters: Arc::new(Mutex::new(state.counters.clone())),
            registry: Arc::new(WorkerRegistry::new()),
            state,
            services,
            scheduler: None,
            generator: None,
            log,
            completion_watch: None,
        };
        deployment.persist().await?;
        tracing::info!("📦 Deployment {} created", deployment.id());
        Ok(deployment)
    }

    /// `create` followed by `start`.
    pub async fn deploy(config: DeploymentConfig, services: DeploymentServices) -> Result<Self> {
        let mut deployment = Self::create(config, services).await?;
        deployment.start().await?;
        Ok(deployment)
    }

    /// Provision every worker, then start the scheduler.
    ///
    /// Individual provisioning failures are logged and skipped. When not a
    /// single worker could be created the deployment fails.
    pub async fn start(&mut self) -> Result<()> {
        let department = self.state.config.department()?;
        self.advance(DeploymentPhase::CreatingWorkers).await?;

        let requested = self.state.workers_requested;
        self.log
            .info(format!("Creating {requested} workers in {department}"));

        for n in 1..=requested {
            let worker = WorkerConfig::new(department, n, &self.state.deployment_id);
            match self.services.provisioner.create(&worker).await {
                Ok(identity) => {
                    self.registry.add(identity.clone());
                    self.state.workers.push(identity);
                    self.state.workers_created = self.registry.len() as u32;
                    // Each identity is on disk as soon as it exists.
                    self.persist().await?;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Worker {n} of {}: {e}", self.id());
                    self.log.error(format!("Failed to create worker {n}: {e}"));
                }
            }
        }
        self.state.workers_created = self.registry.len() as u32;
        self.log.info(format!(
            "Created {}/{requested} workers",
            self.state.workers_created
        ));

        if self.registry.is_empty() {
            let msg = format!("no workers could be provisioned (0 of {requested})");
            self.state.error = Some(msg.clone());
            self.advance(DeploymentPhase::Failed).await?;
            tracing::error!("❌ Deployment {} failed: {msg}", self.id());
            return Err(HaymakerError::Provisioning(msg));
        }

        self.state.started_at = Some(self.services.clock.now());
        self.advance(DeploymentPhase::Executing).await?;
        self.launch_scheduler(None).await
    }

    /// Rebuild a deployment from the store.
    ///
    /// The registry comes back from the persisted identities. An `executing`
    /// deployment gets a fresh scheduler that keeps the original end time.
    pub async fn resume(deployment_id: &str, services: DeploymentServices) -> Result<Self> {
        let state = services
            .store
            .load(deployment_id)
            .await?
            .ok_or_else(|| HaymakerError::DeploymentNotFound(deployment_id.to_string()))?;

        let log = Self::open_log(&services, &state.deployment_id);
        let mut deployment = Self {
            counters: Arc::new(Mutex::new(state.counters.clone())),
            registry: Arc::new(WorkerRegistry::from_identities(state.workers.clone())),
            state,
            services,
            scheduler: None,
            generator: None,
            log,
            completion_watch: None,
        };

        tracing::info!(
            "♻️ Resuming {} in phase {} with {} workers",
            deployment.id(),
            deployment.phase(),
            deployment.registry.len()
        );
        if deployment.phase() == DeploymentPhase::Executing {
            let end_time = match (deployment.state.started_at, deployment.state.config.duration()) {
                (Some(started), Some(duration)) => Some(started + duration),
                _ => None,
            };
            deployment.log.info("Resumed deployment");
            deployment.launch_scheduler(end_time).await?;
        }
        Ok(deployment)
    }

    /// Stop the scheduler: executing → stopped.
    ///
    /// Stopping a deployment that already stopped or completed is a no-op.
    /// Every other phase returns `NotRunning`.
    pub async fn stop(&mut self) -> Result<()> {
        match self.phase() {
            DeploymentPhase::Pending
            | DeploymentPhase::CreatingWorkers
            | DeploymentPhase::Failed
            | DeploymentPhase::CleanupInProgress => {
                Err(HaymakerError::NotRunning(self.id().to_string()))
            }
            DeploymentPhase::Stopped | DeploymentPhase::Completed => Ok(()),
            DeploymentPhase::Executing => {
                let finished_alone = match self.scheduler.as_mut() {
                    Some(scheduler) => {
                        scheduler.stop().await?;
                        scheduler.status() == SchedulerStatus::Completed
                    }
                    None => false,
                };
                self.join_completion_watch().await;
                if finished_alone {
                    // The run reached its end before the stop request.
                    return self.complete_run().await;
                }
                self.state.stopped_at = Some(Utc::now());
                self.log.info("Deployment stopped");
                self.advance(DeploymentPhase::Stopped).await?;
                tracing::info!("🛑 Deployment {} stopped", self.id());
                Ok(())
            }
        }
    }

    /// Delete every provisioned identity.
    ///
    /// A running deployment is stopped first. A deployment already cleaned
    /// up returns an empty report. When any deletion fails the deployment
    /// moves to `failed`, the survivors stay registered and the error is
    /// returned.
    pub async fn cleanup(&mut self) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            deployment_id: self.id().to_string(),
            ..Default::default()
        };
        if self.phase() == DeploymentPhase::Completed && self.state.cleaned_up_at.is_some() {
            return Ok(report);
        }
        if self.phase() == DeploymentPhase::Executing {
            self.stop().await?;
        }
        self.advance(DeploymentPhase::CleanupInProgress).await?;
        self.log.info("Cleaning up workers");

        for worker in self.registry.all() {
            match self.services.provisioner.delete(&worker.worker_id).await {
                Ok(()) => {
                    self.registry.remove(&worker.worker_id);
                    report.resources_deleted += 1;
                }
                Err(e) => {
                    self.log
                        .error(format!("Failed to delete {}: {e}", worker.display_name));
                    report.errors.push(format!("{}: {e}", worker.worker_id));
                }
            }
        }
        self.state.workers = self.registry.all();
        report
            .details
            .push(format!("Deleted {} worker identities", report.resources_deleted));

        if report.errors.is_empty() {
            self.state.cleaned_up_at = Some(Utc::now());
            self.advance(DeploymentPhase::Completed).await?;
            self.log.info("Cleanup complete");
            tracing::info!(
                "🧹 Deployment {} cleaned up ({} identities)",
                self.id(),
                report.resources_deleted
            );
            Ok(report)
        } else {
            let msg = format!(
                "cleanup left {} workers behind: {}",
                report.errors.len(),
                report.errors.join("; ")
            );
            self.state.error = Some(msg.clone());
            self.advance(DeploymentPhase::Failed).await?;
            tracing::error!("❌ Cleanup of {} failed: {msg}", self.id());
            Err(HaymakerError::Provisioning(msg))
        }
    }

    /// Pick up a run that ended on its own (executing → completed).
    pub async fn refresh(&mut self) -> Result<DeploymentPhase> {
        let completed = self.phase() == DeploymentPhase::Executing
            && self
                .scheduler
                .as_ref()
                .is_some_and(|s| s.status() == SchedulerStatus::Completed);
        if completed {
            self.complete_run().await?;
        }
        Ok(self.phase())
    }

    /// Wait for the scheduler to exit, then `refresh`.
    pub async fn wait_until_finished(&mut self) -> Result<DeploymentPhase> {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.wait_until_finished().await?;
        }
        self.refresh().await
    }

    pub fn id(&self) -> &str {
        &self.state.deployment_id
    }

    pub fn phase(&self) -> DeploymentPhase {
        self.state.phase
    }

    /// Current state with live counters folded in.
    pub fn state(&self) -> DeploymentState {
        let mut state = self.state.clone();
        state.counters = self.counters_snapshot();
        state
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn get_logs(&self, follow: bool) -> BoxStream<'static, String> {
        self.log.stream(follow)
    }

    /// Scheduler status updates, once a scheduler exists.
    pub fn subscribe(&self) -> Option<watch::Receiver<SchedulerStatus>> {
        self.scheduler.as_ref().map(ActivityScheduler::subscribe)
    }

    pub fn generation_stats(&self) -> Option<GenerationStats> {
        self.generator.as_ref().map(|g| g.stats())
    }

    async fn complete_run(&mut self) -> Result<()> {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.wait_until_finished().await?;
        }
        self.join_completion_watch().await;
        self.log.info("Deployment completed");
        self.advance(DeploymentPhase::Completed).await?;
        tracing::info!("✅ Deployment {} completed", self.id());
        Ok(())
    }

    async fn launch_scheduler(&mut self, end_time: Option<chrono::DateTime<Utc>>) -> Result<()> {
        let generator = Arc::new(
            ContentGenerator::from_options(
                self.state.config.enable_ai_generation,
                self.services.backend.clone(),
            )
            .with_params(self.services.content.max_tokens, self.services.content.temperature),
        );
        let settings = SchedulerSettings::from_config(&self.services.scheduler, &self.state.config);

        let mut scheduler = ActivityScheduler::new(
            Arc::clone(&self.registry),
            Arc::clone(&generator),
            Arc::clone(&self.services.transport),
            settings,
        )
        .with_clock(Arc::clone(&self.services.clock));
        scheduler.set_log(self.log.clone());
        scheduler.set_end_time(end_time);

        let counters = Arc::clone(&self.counters);
        let sink = self.services.activity_sink.clone();
        scheduler.set_on_activity(move |record: &ActivityRecord| {
            counters
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record(record);
            if let Some(sink) = &sink {
                sink(record);
            }
        });

        scheduler.start().await?;
        self.completion_watch = Some(self.watch_completion(scheduler.subscribe()));
        self.generator = Some(generator);
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Persist `completed` as soon as the scheduler finishes on its own.
    /// Exits without writing when the scheduler is stopped instead.
    fn watch_completion(&self, mut status: watch::Receiver<SchedulerStatus>) -> JoinHandle<()> {
        let store = Arc::clone(&self.services.store);
        let counters = Arc::clone(&self.counters);
        let mut snapshot = self.state.clone();
        tokio::spawn(async move {
            while *status.borrow_and_update() == SchedulerStatus::Running {
                if status.changed().await.is_err() {
                    return;
                }
            }
            if *status.borrow() != SchedulerStatus::Completed {
                return;
            }
            snapshot.phase = DeploymentPhase::Completed;
            snapshot.updated_at = Utc::now();
            snapshot.counters = counters.lock().unwrap_or_else(|e| e.into_inner()).clone();
            match store.save(&snapshot).await {
                Ok(()) => tracing::debug!("💾 {} reached its end", snapshot.deployment_id),
                Err(e) => tracing::warn!(
                    "⚠️ Could not persist completion of {}: {e}",
                    snapshot.deployment_id
                ),
            }
        })
    }

    /// Wait for the completion watcher so its write never lands after ours.
    async fn join_completion_watch(&mut self) {
        if let Some(handle) = self.completion_watch.take() {
            if let Err(e) = handle.await {
                tracing::warn!("⚠️ Completion watcher of {} failed: {e}", self.id());
            }
        }
    }

    /// Check the edge, move, persist.
    async fn advance(&mut self, next: DeploymentPhase) -> Result<()> {
        if !self.state.phase.can_transition_to(next) {
            return Err(HaymakerError::InvalidTransition {
                from: self.state.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("🔀 {}: {} → {next}", self.id(), self.state.phase);
        self.state.phase = next;
        self.state.updated_at = Utc::now();
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        self.services.store.save(&self.state()).await
    }

    fn counters_snapshot(&self) -> ActivityCounters {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn open_log(services: &DeploymentServices, deployment_id: &str) -> ActivityLog {
        match &services.log_dir {
            Some(dir) => ActivityLog::with_file(dir, deployment_id),
            None => ActivityLog::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryDirectory, LoggingTransport, MemoryStateStore};
    use async_trait::async_trait;
    use haymaker_core::ActivityKind;
    use haymaker_scheduler::SimulatedClock;
    use std::time::Duration;

    /// Remembers the phase and worker count of every save.
    struct RecordingStore {
        inner: MemoryStateStore,
        saves: Mutex<Vec<(DeploymentPhase, usize)>>,
    }

    #[async_trait]
    impl StateStore for RecordingStore {
        async fn save(&self, state: &DeploymentState) -> Result<()> {
            self.saves
                .lock()
                .unwrap()
                .push((state.phase, state.workers.len()));
            self.inner.save(state).await
        }

        async fn load(&self, deployment_id: &str) -> Result<Option<DeploymentState>> {
            self.inner.load(deployment_id).await
        }

        async fn list(&self) -> Result<Vec<DeploymentState>> {
            self.inner.list().await
        }
    }

    struct Fixture {
        directory: Arc<InMemoryDirectory>,
        transport: Arc<LoggingTransport>,
        store: Arc<MemoryStateStore>,
        services: DeploymentServices,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(InMemoryDirectory::new());
        let transport = Arc::new(LoggingTransport::new());
        let store = Arc::new(MemoryStateStore::new());
        let services = DeploymentServices::new(directory.clone(), transport.clone(), store.clone())
            .with_clock(Arc::new(SimulatedClock::at_hour(9)))
            .with_scheduler_config(SchedulerConfig {
                seed: Some(7),
                ..Default::default()
            });
        Fixture {
            directory,
            transport,
            store,
            services,
        }
    }

    fn config(workers: u32, department: &str, hours: Option<f64>) -> DeploymentConfig {
        DeploymentConfig {
            workers,
            department: department.into(),
            duration_hours: hours,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_zero_workers_rejected_before_any_resource() {
        let fx = fixture();
        let err = Deployment::deploy(config(0, "operations", None), fx.services.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, HaymakerError::Configuration(_)));
        assert!(err.to_string().contains("workers must be between 1 and 300"));
        assert!(fx.store.list().await.unwrap().is_empty());
        assert!(fx.directory.is_empty());
    }

    #[tokio::test]
    async fn test_one_hour_engineering_run() {
        let fx = fixture();
        let mut dep = Deployment::deploy(config(5, "engineering", Some(1.0)), fx.services.clone())
            .await
            .unwrap();
        assert_eq!(dep.registry().len(), 5);

        assert_eq!(dep.wait_until_finished().await.unwrap(), DeploymentPhase::Completed);
        // Completion does not delete anyone.
        assert_eq!(dep.registry().len(), 5);
        assert_eq!(fx.directory.len(), 5);

        let state = dep.state();
        assert!(state.counters.total() > 0);
        assert_eq!(state.counters.failed, 0);
        let (emails, messages, _, _) = fx.transport.totals();
        assert_eq!(state.counters.emails, emails);
        assert_eq!(state.counters.messages, messages);

        let persisted = fx.store.load(dep.id()).await.unwrap().unwrap();
        assert_eq!(persisted.phase, DeploymentPhase::Completed);
        assert_eq!(persisted.counters, state.counters);

        let report = dep.cleanup().await.unwrap();
        assert_eq!(report.resources_deleted, 5);
        assert!(dep.registry().is_empty());
        assert!(fx.directory.is_empty());
        assert!(dep.state().is_terminal());
    }

    #[tokio::test]
    async fn test_ai_without_backend_uses_templates() {
        let fx = fixture();
        let mut cfg = config(3, "sales", Some(2.0));
        cfg.enable_ai_generation = true;
        let mut dep = Deployment::deploy(cfg, fx.services.clone()).await.unwrap();
        dep.wait_until_finished().await.unwrap();

        let stats = dep.generation_stats().unwrap();
        let state = dep.state();
        assert!(state.counters.emails > 0);
        assert_eq!(stats.backend, 0);
        assert_eq!(stats.backend_errors, 0);
        assert_eq!(stats.fallback, state.counters.emails);
        assert_eq!(state.counters.failed, 0);
    }

    #[tokio::test]
    async fn test_stop_before_running() {
        let fx = fixture();
        let mut dep = Deployment::create(config(2, "hr", None), fx.services.clone())
            .await
            .unwrap();
        assert_eq!(dep.phase(), DeploymentPhase::Pending);
        assert!(matches!(dep.stop().await, Err(HaymakerError::NotRunning(_))));
        assert!(matches!(
            dep.cleanup().await,
            Err(HaymakerError::InvalidTransition { .. })
        ));
        assert_eq!(dep.phase(), DeploymentPhase::Pending);
    }

    #[tokio::test]
    async fn test_partial_provisioning_then_stop() {
        let fx = fixture();
        fx.directory.reject_create(2);
        fx.directory.reject_create(4);
        let mut dep = Deployment::deploy(config(5, "finance", None), fx.services.clone())
            .await
            .unwrap();
        assert_eq!(dep.phase(), DeploymentPhase::Executing);
        assert_eq!(dep.state().workers_created, 3);
        assert_eq!(dep.state().workers_requested, 5);
        assert_eq!(
            dep.log().lines().iter().filter(|l| l.contains("[ERROR]")).count(),
            2
        );

        dep.stop().await.unwrap();
        assert_eq!(dep.phase(), DeploymentPhase::Stopped);
        dep.stop().await.unwrap();
        assert_eq!(dep.phase(), DeploymentPhase::Stopped);
        assert!(dep.state().stopped_at.is_some());
    }

    #[tokio::test]
    async fn test_no_workers_created_fails() {
        let fx = fixture();
        fx.directory.reject_create(1);
        let err = Deployment::deploy(config(1, "executive", None), fx.services.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, HaymakerError::Provisioning(_)));

        let states = fx.store.list().await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].phase, DeploymentPhase::Failed);
        assert!(states[0].error.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_twice_is_noop() {
        let fx = fixture();
        let mut dep = Deployment::deploy(config(2, "operations", None), fx.services.clone())
            .await
            .unwrap();
        // Executing: cleanup stops first.
        let first = dep.cleanup().await.unwrap();
        assert_eq!(first.resources_deleted, 2);
        assert!(dep.state().stopped_at.is_some());

        let second = dep.cleanup().await.unwrap();
        assert_eq!(second.resources_deleted, 0);
        assert!(second.errors.is_empty());
        assert_eq!(dep.phase(), DeploymentPhase::Completed);
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_survivors() {
        let fx = fixture();
        let mut dep = Deployment::deploy(config(3, "engineering", None), fx.services.clone())
            .await
            .unwrap();
        let stubborn = dep.registry().all()[1].worker_id.clone();
        fx.directory.reject_delete(&stubborn);
        dep.stop().await.unwrap();

        assert!(matches!(dep.cleanup().await, Err(HaymakerError::Provisioning(_))));
        assert_eq!(dep.phase(), DeploymentPhase::Failed);
        assert_eq!(dep.registry().len(), 1);
        assert!(dep.registry().get(&stubborn).is_some());
        assert_eq!(dep.state().workers.len(), 1);

        // Failed is terminal.
        assert!(matches!(
            dep.cleanup().await,
            Err(HaymakerError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_resume_rebuilds_registry_and_scheduler() {
        let fx = fixture();
        let mut first = Deployment::deploy(config(4, "sales", None), fx.services.clone())
            .await
            .unwrap();
        let snapshot = first.state();
        first.stop().await.unwrap();

        // A fresh process that only has the executing snapshot.
        let store = Arc::new(MemoryStateStore::new());
        store.save(&snapshot).await.unwrap();
        let services = DeploymentServices {
            store: store.clone(),
            ..fx.services.clone()
        };

        let mut resumed = Deployment::resume(&snapshot.deployment_id, services.clone())
            .await
            .unwrap();
        assert_eq!(resumed.phase(), DeploymentPhase::Executing);
        assert_eq!(resumed.registry().len(), 4);
        assert_eq!(*resumed.subscribe().unwrap().borrow(), SchedulerStatus::Running);

        resumed.stop().await.unwrap();
        let persisted = store.load(&snapshot.deployment_id).await.unwrap().unwrap();
        assert_eq!(persisted.phase, DeploymentPhase::Stopped);
        assert_eq!(persisted.workers.len(), 4);

        assert!(matches!(
            Deployment::resume("m365-deadbeef", services).await,
            Err(HaymakerError::DeploymentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_after_completion_is_noop() {
        let fx = fixture();
        let mut dep = Deployment::deploy(config(1, "hr", Some(0.1)), fx.services.clone())
            .await
            .unwrap();
        assert_eq!(dep.wait_until_finished().await.unwrap(), DeploymentPhase::Completed);

        dep.stop().await.unwrap();
        assert_eq!(dep.phase(), DeploymentPhase::Completed);
        assert!(dep.state().stopped_at.is_none());
        let persisted = fx.store.load(dep.id()).await.unwrap().unwrap();
        assert_eq!(persisted.phase, DeploymentPhase::Completed);
    }

    #[tokio::test]
    async fn test_stop_failed_deployment_is_not_running() {
        let fx = fixture();
        fx.directory.reject_create(1);
        assert!(
            Deployment::deploy(config(1, "executive", None), fx.services.clone())
                .await
                .is_err()
        );
        let id = fx.store.list().await.unwrap()[0].deployment_id.clone();

        let mut dep = Deployment::resume(&id, fx.services.clone()).await.unwrap();
        assert_eq!(dep.phase(), DeploymentPhase::Failed);
        assert!(matches!(dep.stop().await, Err(HaymakerError::NotRunning(_))));
        assert_eq!(dep.phase(), DeploymentPhase::Failed);
        assert_eq!(
            fx.store.load(&id).await.unwrap().unwrap().phase,
            DeploymentPhase::Failed
        );
    }

    #[tokio::test]
    async fn test_natural_completion_persisted_without_refresh() {
        let fx = fixture();
        let dep = Deployment::deploy(config(2, "engineering", Some(0.5)), fx.services.clone())
            .await
            .unwrap();
        let mut status = dep.subscribe().unwrap();
        while *status.borrow_and_update() == SchedulerStatus::Running {
            status.changed().await.unwrap();
        }
        assert_eq!(*status.borrow(), SchedulerStatus::Completed);

        let persisted = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let state = fx.store.load(dep.id()).await.unwrap().unwrap();
                if state.phase == DeploymentPhase::Completed {
                    return state;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("completion should reach the store without polling the deployment");

        // Nothing has read the deployment since it was deployed.
        assert_eq!(dep.phase(), DeploymentPhase::Executing);
        assert_eq!(persisted.counters, dep.state().counters);
        assert_eq!(persisted.workers.len(), 2);
    }

    #[tokio::test]
    async fn test_workers_persisted_as_they_are_created() {
        let fx = fixture();
        fx.directory.reject_create(3);
        let store = Arc::new(RecordingStore {
            inner: MemoryStateStore::new(),
            saves: Mutex::new(Vec::new()),
        });
        let services = DeploymentServices {
            store: store.clone(),
            ..fx.services.clone()
        };

        let mut dep = Deployment::deploy(config(4, "operations", None), services)
            .await
            .unwrap();
        let provisioning: Vec<usize> = store
            .saves
            .lock()
            .unwrap()
            .iter()
            .filter(|(phase, _)| *phase == DeploymentPhase::CreatingWorkers)
            .map(|(_, workers)| *workers)
            .collect();
        assert_eq!(provisioning, vec![0, 1, 2, 3]);
        dep.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_activity_sink_sees_every_record() {
        let fx = fixture();
        let seen: Arc<Mutex<Vec<ActivityRecord>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let services = fx
            .services
            .clone()
            .with_activity_sink(Arc::new(move |record: &ActivityRecord| {
                sink.lock().unwrap().push(record.clone());
            }));

        let mut dep = Deployment::deploy(config(3, "sales", Some(1.0)), services)
            .await
            .unwrap();
        assert_eq!(dep.wait_until_finished().await.unwrap(), DeploymentPhase::Completed);

        let seen = seen.lock().unwrap();
        let counters = dep.state().counters;
        assert!(!seen.is_empty());
        assert_eq!(seen.len() as u64, counters.total());
        let emails = seen.iter().filter(|r| r.kind == ActivityKind::Email).count();
        assert_eq!(emails as u64, counters.emails);
        assert!(seen.iter().all(|r| dep.registry().get(&r.worker_id).is_some()));
    }
}
