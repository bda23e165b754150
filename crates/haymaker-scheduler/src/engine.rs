//! Activity Scheduler: the cycle loop that turns activity patterns into
//! emails, messages, documents and meetings.
//!
//! The loop runs on one tokio task. Each iteration takes a registry
//! snapshot, rolls one Bernoulli trial per worker per activity kind, performs
//! whatever fired, then sleeps the rest of the cycle on the injected
//! [`Clock`]. `stop()` is advisory: an in-flight cycle always finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use futures::stream::BoxStream;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use haymaker_content::ContentGenerator;
use haymaker_core::traits::{ActivityCallback, Transport};
use haymaker_core::{
    ActivityKind, ActivityRecord, DeploymentConfig, HaymakerError, Result, SchedulerConfig,
    VarianceMode, WorkerIdentity,
};

use crate::clock::{Clock, SystemClock};
use crate::log::ActivityLog;
use crate::registry::WorkerRegistry;
use crate::trigger::{VarianceSampler, cycle_probability, cycles_per_hour, should_trigger};

/// Lifecycle of the scheduler loop as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    /// Never started.
    Idle,
    Running,
    /// The configured duration elapsed.
    Completed,
    /// Stopped on request.
    Stopped,
}

/// Tunables for one scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub cycle: Duration,
    /// `None` runs until stopped.
    pub duration: Option<chrono::Duration>,
    pub variance_mode: VarianceMode,
    pub seed: Option<u64>,
    pub email_directive: Option<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cycle: Duration::from_secs(60),
            duration: None,
            variance_mode: VarianceMode::default(),
            seed: None,
            email_directive: None,
        }
    }
}

impl SchedulerSettings {
    pub fn from_config(scheduler: &SchedulerConfig, deployment: &DeploymentConfig) -> Self {
        Self {
            cycle: scheduler.cycle(),
            duration: deployment.duration(),
            variance_mode: scheduler.variance_mode,
            seed: scheduler.seed,
            email_directive: deployment.email_directive.clone(),
        }
    }
}

/// Everything one cycle needs. Moved into the loop task while running and
/// handed back when it exits.
struct CycleRunner {
    registry: Arc<WorkerRegistry>,
    generator: Arc<ContentGenerator>,
    transport: Arc<dyn Transport>,
    on_activity: Option<ActivityCallback>,
    log: ActivityLog,
    rng: StdRng,
    variance: VarianceSampler,
    cycles_per_hour: f64,
    directive: Option<String>,
    activity_count: Arc<AtomicU64>,
}

impl CycleRunner {
    /// One pass over the registry. Returns the number of activities fired.
    async fn run_cycle(&mut self, now: DateTime<Utc>) -> usize {
        let hour = now.hour();
        let mut fired = 0;

        for worker in self.registry.all() {
            if !worker.pattern.in_work_hours(hour) {
                continue;
            }
            let jitter =
                self.variance
                    .factor(&worker.worker_id, worker.pattern.variance_percent, &mut self.rng);

            for kind in ActivityKind::ALL {
                let p = cycle_probability(&worker.pattern, kind, jitter, self.cycles_per_hour);
                if should_trigger(p, &mut self.rng) {
                    self.perform(&worker, kind, now).await;
                    fired += 1;
                }
            }
        }
        fired
    }

    async fn perform(&self, worker: &WorkerIdentity, kind: ActivityKind, now: DateTime<Utc>) {
        let (result, content) = match kind {
            ActivityKind::Email => {
                let email = self
                    .generator
                    .generate(worker.department, &worker.display_name, self.directive.as_deref())
                    .await;
                (self.transport.send_email(worker, &email).await, Some(email))
            }
            ActivityKind::Message => (self.transport.post_message(worker).await, None),
            ActivityKind::Document => (self.transport.create_document(worker).await, None),
            ActivityKind::Meeting => (self.transport.schedule_meeting(worker).await, None),
        };

        let error = result.err().map(|e| e.to_string());
        let name = &worker.display_name;
        match (&error, kind) {
            (None, ActivityKind::Email) => {
                let subject = content.as_ref().map(|c| c.subject.as_str()).unwrap_or_default();
                self.log.info(format!("Email sent by {name}: \"{subject}\""));
            }
            (None, ActivityKind::Message) => self.log.info(format!("Teams message sent by {name}")),
            (None, ActivityKind::Document) => self.log.info(format!("Document created by {name}")),
            (None, ActivityKind::Meeting) => self.log.info(format!("Meeting scheduled by {name}")),
            (Some(e), _) => {
                tracing::warn!("⚠️ {kind} failed for {}: {e}", worker.worker_id);
                self.log.warn(format!("Failed {kind} for {name}: {e}"));
            }
        }

        let record = ActivityRecord {
            worker_id: worker.worker_id.clone(),
            kind,
            timestamp: now,
            content,
            success: error.is_none(),
            error,
        };
        self.activity_count.fetch_add(1, Ordering::Relaxed);
        if let Some(callback) = &self.on_activity {
            callback(&record);
        }
    }
}

/// Owns the loop task of one deployment.
pub struct ActivityScheduler {
    /// `None` while the loop task owns it.
    runner: Option<CycleRunner>,
    handle: Option<JoinHandle<CycleRunner>>,
    clock: Arc<dyn Clock>,
    cycle: Duration,
    duration: Option<chrono::Duration>,
    end_time: Option<DateTime<Utc>>,
    status_tx: Arc<watch::Sender<SchedulerStatus>>,
    shutdown_tx: watch::Sender<bool>,
    log: ActivityLog,
    activity_count: Arc<AtomicU64>,
}

impl ActivityScheduler {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        generator: Arc<ContentGenerator>,
        transport: Arc<dyn Transport>,
        settings: SchedulerSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let log = ActivityLog::new();
        let activity_count = Arc::new(AtomicU64::new(0));
        let (status_tx, _) = watch::channel(SchedulerStatus::Idle);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            runner: Some(CycleRunner {
                registry,
                generator,
                transport,
                on_activity: None,
                log: log.clone(),
                rng,
                variance: VarianceSampler::new(settings.variance_mode),
                cycles_per_hour: cycles_per_hour(settings.cycle),
                directive: settings.email_directive,
                activity_count: Arc::clone(&activity_count),
            }),
            handle: None,
            clock: Arc::new(SystemClock),
            cycle: settings.cycle,
            duration: settings.duration,
            end_time: None,
            status_tx: Arc::new(status_tx),
            shutdown_tx,
            log,
            activity_count,
        }
    }

    /// Replace the time source. Only takes effect before `start()`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the activity callback.
    pub fn set_on_activity<F>(&mut self, f: F)
    where
        F: Fn(&ActivityRecord) + Send + Sync + 'static,
    {
        if let Some(runner) = self.runner.as_mut() {
            runner.on_activity = Some(Arc::new(f));
        }
    }

    /// Use `log` for activity lines (e.g. a file-backed log).
    pub fn set_log(&mut self, log: ActivityLog) {
        if let Some(runner) = self.runner.as_mut() {
            runner.log = log.clone();
        }
        self.log = log;
    }

    /// Fix the end time instead of deriving it from the duration at start.
    pub fn set_end_time(&mut self, end_time: Option<DateTime<Utc>>) {
        self.end_time = end_time;
    }

    pub fn status(&self) -> SchedulerStatus {
        *self.status_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.status() == SchedulerStatus::Running
    }

    /// Watch status changes without holding on to the scheduler.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_tx.subscribe()
    }

    /// Activities performed since construction.
    pub fn activity_count(&self) -> u64 {
        self.activity_count.load(Ordering::Relaxed)
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    /// Activity log lines from the first one. See [`ActivityLog::stream`].
    pub fn get_logs(&self, follow: bool) -> BoxStream<'static, String> {
        self.log.stream(follow)
    }

    /// Spawn the cycle loop.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(HaymakerError::AlreadyRunning);
        }
        self.reclaim().await?;
        let Some(runner) = self.runner.take() else {
            return Err(HaymakerError::AlreadyRunning);
        };

        if self.end_time.is_none() {
            self.end_time = self.duration.map(|d| self.clock.now() + d);
        }
        self.shutdown_tx.send_replace(false);
        self.status_tx.send_replace(SchedulerStatus::Running);

        tracing::info!(
            "⏰ Activity scheduler started ({} workers, cycle {}s, ends {})",
            runner.registry.len(),
            self.cycle.as_secs(),
            self.end_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".into())
        );

        self.handle = Some(tokio::spawn(run_loop(
            runner,
            Arc::clone(&self.clock),
            self.cycle,
            self.end_time,
            self.shutdown_tx.subscribe(),
            Arc::clone(&self.status_tx),
        )));
        Ok(())
    }

    /// Ask the loop to exit and wait for it. Calling it again is a no-op.
    pub async fn stop(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Ok(());
        }
        self.shutdown_tx.send_replace(true);
        self.reclaim().await
    }

    /// Wait for the loop to exit on its own (duration reached or stopped
    /// elsewhere).
    pub async fn wait_until_finished(&mut self) -> Result<SchedulerStatus> {
        self.reclaim().await?;
        Ok(self.status())
    }

    /// Run one cycle at `now` without the loop. Fails while the loop runs.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<usize> {
        match self.runner.as_mut() {
            Some(runner) => Ok(runner.run_cycle(now).await),
            None => Err(HaymakerError::AlreadyRunning),
        }
    }

    /// Join the loop task, if any, and take the runner back.
    async fn reclaim(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            let runner = handle
                .await
                .map_err(|e| HaymakerError::Scheduler(e.to_string()))?;
            self.runner = Some(runner);
        }
        Ok(())
    }
}

async fn run_loop(
    mut runner: CycleRunner,
    clock: Arc<dyn Clock>,
    cycle: Duration,
    end_time: Option<DateTime<Utc>>,
    mut shutdown_rx: watch::Receiver<bool>,
    status_tx: Arc<watch::Sender<SchedulerStatus>>,
) -> CycleRunner {
    let reached_end = |now: DateTime<Utc>| end_time.is_some_and(|end| now >= end);

    runner.log.info(format!(
        "Starting activity orchestration for {} workers",
        runner.registry.len()
    ));

    let outcome = loop {
        if *shutdown_rx.borrow_and_update() {
            break SchedulerStatus::Stopped;
        }
        let started = clock.now();
        if reached_end(started) {
            break SchedulerStatus::Completed;
        }

        let fired = runner.run_cycle(started).await;
        tracing::debug!("🔁 Cycle at {started}: {fired} activities");

        let now = clock.now();
        if reached_end(now) {
            break SchedulerStatus::Completed;
        }

        let elapsed = (now - started).to_std().unwrap_or_default();
        let remaining = cycle.saturating_sub(elapsed);
        tokio::select! {
            _ = clock.sleep(remaining) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break SchedulerStatus::Stopped;
                }
            }
        }
    };

    match outcome {
        SchedulerStatus::Completed => {
            runner.log.info("Activity orchestration completed");
            tracing::info!("✅ Activity scheduler completed");
        }
        _ => {
            runner.log.info("Activity orchestration stopped");
            tracing::info!("🛑 Activity scheduler stopped");
        }
    }
    status_tx.send_replace(outcome);
    runner
}
