//! # Haymaker Core
//!
//! Shared vocabulary for the Haymaker activity engine: departments and their
//! static activity patterns, worker identities, activity records, deployment
//! state, the error taxonomy, configuration, and the collaborator traits the
//! engine talks to (identity provisioning, transport, content backend,
//! state persistence).

pub mod config;
pub mod error;
pub mod pattern;
pub mod traits;
pub mod types;

pub use config::{DeploymentConfig, HaymakerConfig, SchedulerConfig, VarianceMode};
pub use error::{HaymakerError, Result};
pub use pattern::{ActivityPattern, pattern_for};
pub use types::{
    ActivityCounters, ActivityKind, ActivityRecord, Department, DeploymentPhase, DeploymentState,
    EmailContent, WorkerConfig, WorkerIdentity,
};
