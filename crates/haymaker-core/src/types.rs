//! Core data model: departments, workers, activity records, deployment state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeploymentConfig;
use crate::error::HaymakerError;
use crate::pattern::{ActivityPattern, pattern_for};

/// Organizational department. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Operations,
    Engineering,
    Sales,
    Hr,
    Finance,
    Executive,
}

impl Department {
    pub const ALL: [Department; 6] = [
        Department::Operations,
        Department::Engineering,
        Department::Sales,
        Department::Hr,
        Department::Finance,
        Department::Executive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operations => "operations",
            Self::Engineering => "engineering",
            Self::Sales => "sales",
            Self::Hr => "hr",
            Self::Finance => "finance",
            Self::Executive => "executive",
        }
    }

    /// Comma-separated list of valid names, for error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Department {
    type Err = HaymakerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| {
                HaymakerError::config(format!(
                    "department must be one of: {} (got '{s}')",
                    Self::valid_names()
                ))
            })
    }
}

/// Kind of simulated activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Email,
    Message,
    Document,
    Meeting,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::Email,
        ActivityKind::Message,
        ActivityKind::Document,
        ActivityKind::Meeting,
    ];

    /// Email and message rates are per hour; documents and meetings per day.
    pub fn is_hourly(&self) -> bool {
        matches!(self, Self::Email | Self::Message)
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Message => write!(f, "message"),
            Self::Document => write!(f, "document"),
            Self::Meeting => write!(f, "meeting"),
        }
    }
}

/// Input for provisioning one worker. Consumed once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub department: Department,
    /// 1-based sequence number within the deployment.
    pub worker_number: u32,
    pub deployment_id: String,
    #[serde(default = "default_display_prefix")]
    pub display_name_prefix: String,
    /// Mail domain; `None` means the directory's default domain.
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_display_prefix() -> String {
    "Haymaker".into()
}

impl WorkerConfig {
    pub fn new(department: Department, worker_number: u32, deployment_id: &str) -> Self {
        Self {
            department,
            worker_number,
            deployment_id: deployment_id.to_string(),
            display_name_prefix: default_display_prefix(),
            domain: None,
        }
    }
}

/// One simulated worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerIdentity {
    /// Unique within a deployment.
    pub worker_id: String,
    pub display_name: String,
    /// Opaque account identifier supplied by the identity provisioner (UPN).
    pub account: String,
    /// Directory-side object id.
    pub directory_object_id: String,
    pub department: Department,
    pub pattern: ActivityPattern,
    pub deployment_id: String,
    pub created_at: DateTime<Utc>,
}

impl WorkerIdentity {
    /// Build an identity from its config and what the directory handed back.
    pub fn from_config(config: &WorkerConfig, directory_object_id: &str, account: &str) -> Self {
        Self {
            worker_id: format!("worker-{}-{}", config.deployment_id, config.worker_number),
            display_name: format!(
                "{} Worker {}",
                config.display_name_prefix, config.worker_number
            ),
            account: account.to_string(),
            directory_object_id: directory_object_id.to_string(),
            department: config.department,
            pattern: pattern_for(config.department),
            deployment_id: config.deployment_id.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Generated email text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Result of one triggered activity. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub worker_id: String,
    pub kind: ActivityKind,
    pub timestamp: DateTime<Utc>,
    /// Present for emails only.
    pub content: Option<EmailContent>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Activity counts per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounters {
    pub emails: u64,
    pub messages: u64,
    pub documents: u64,
    pub meetings: u64,
    /// Activities whose transport call failed (also counted by kind).
    pub failed: u64,
}

impl ActivityCounters {
    pub fn record(&mut self, record: &ActivityRecord) {
        match record.kind {
            ActivityKind::Email => self.emails += 1,
            ActivityKind::Message => self.messages += 1,
            ActivityKind::Document => self.documents += 1,
            ActivityKind::Meeting => self.meetings += 1,
        }
        if !record.success {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.emails + self.messages + self.documents + self.meetings
    }
}

/// Deployment lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    Pending,
    CreatingWorkers,
    Executing,
    Stopped,
    Completed,
    Failed,
    CleanupInProgress,
}

impl DeploymentPhase {
    /// Edges of the lifecycle graph.
    pub fn can_transition_to(self, next: DeploymentPhase) -> bool {
        use DeploymentPhase::*;
        matches!(
            (self, next),
            (Pending, CreatingWorkers)
                | (CreatingWorkers, Executing)
                | (CreatingWorkers, Failed)
                | (Executing, Stopped)
                | (Executing, Completed)
                | (Executing, Failed)
                | (Stopped, CleanupInProgress)
                | (Completed, CleanupInProgress)
                | (CleanupInProgress, Completed)
                | (CleanupInProgress, Failed)
        )
    }
}

impl std::fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::CreatingWorkers => "creating_workers",
            Self::Executing => "executing",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::CleanupInProgress => "cleanup_in_progress",
        };
        f.write_str(s)
    }
}

/// Authoritative, persisted state of one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentState {
    pub deployment_id: String,
    pub phase: DeploymentPhase,
    pub config: DeploymentConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cleaned_up_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub counters: ActivityCounters,
    #[serde(default)]
    pub workers_requested: u32,
    #[serde(default)]
    pub workers_created: u32,
    /// Provisioned identities, kept so the registry can be rebuilt after a restart.
    #[serde(default)]
    pub workers: Vec<WorkerIdentity>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DeploymentState {
    pub fn new(config: DeploymentConfig) -> Self {
        let now = Utc::now();
        Self {
            deployment_id: new_deployment_id(),
            phase: DeploymentPhase::Pending,
            workers_requested: config.workers,
            config,
            created_at: now,
            updated_at: now,
            started_at: None,
            stopped_at: None,
            cleaned_up_at: None,
            counters: ActivityCounters::default(),
            workers_created: 0,
            workers: Vec::new(),
            error: None,
        }
    }

    /// Terminal: failed, or completed after cleanup.
    pub fn is_terminal(&self) -> bool {
        match self.phase {
            DeploymentPhase::Failed => true,
            DeploymentPhase::Completed => self.cleaned_up_at.is_some(),
            _ => false,
        }
    }
}

/// `m365-` followed by 8 hex characters.
pub fn new_deployment_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("m365-{}", &hex[..8])
}
