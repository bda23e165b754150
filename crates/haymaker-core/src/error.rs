//! Haymaker error taxonomy.
//!
//! Only `Configuration` and unrecoverable `Provisioning` errors are meant to
//! reach an operator. Transport and backend failures are absorbed by the
//! scheduler and the content generator at the smallest possible scope.

use thiserror::Error;

/// Shorthand result type used across all Haymaker crates.
pub type Result<T> = std::result::Result<T, HaymakerError>;

#[derive(Debug, Error)]
pub enum HaymakerError {
    /// Invalid input. Carries every violation found, not just the first.
    #[error("invalid configuration: {}", .0.join("; "))]
    Configuration(Vec<String>),

    #[error("provisioning error: {0}")]
    Provisioning(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("content backend error: {0}")]
    Backend(String),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("deployment {0} is not running")]
    NotRunning(String),

    #[error("invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("scheduler task failed: {0}")]
    Scheduler(String),

    #[error("state store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl HaymakerError {
    /// Single-violation configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(vec![msg.into()])
    }

    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::Provisioning(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Violations carried by a configuration error (empty for other kinds).
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Configuration(v) => v,
            _ => &[],
        }
    }
}
