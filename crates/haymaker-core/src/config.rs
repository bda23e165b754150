//! Haymaker configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HaymakerError, Result};
use crate::types::Department;

pub const MIN_WORKERS: u32 = 1;
pub const MAX_WORKERS: u32 = 300;

/// Root configuration (`~/.haymaker/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaymakerConfig {
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl HaymakerConfig {
    /// Load config from the default path, or defaults when the file is missing.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("📄 No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("📄 Loading config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Haymaker home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".haymaker")
    }

    /// Validate every section, collecting all violations.
    pub fn validate(&self) -> Result<Department> {
        let mut errors = self.deployment.violations();
        errors.extend(self.scheduler.violations());
        if errors.is_empty() {
            self.deployment.department()
        } else {
            Err(HaymakerError::Configuration(errors))
        }
    }
}

/// The configuration surface of one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default = "default_workers")]
    pub workers: u32,
    /// Kept as text so unknown names are reported as configuration errors.
    #[serde(default = "default_department")]
    pub department: String,
    /// `None` runs until stopped.
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub enable_ai_generation: bool,
    #[serde(default)]
    pub email_directive: Option<String>,
}

fn default_workers() -> u32 { 25 }
fn default_department() -> String { "operations".into() }

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            department: default_department(),
            duration_hours: None,
            enable_ai_generation: false,
            email_directive: None,
        }
    }
}

impl DeploymentConfig {
    /// Every rule this config breaks, in field order.
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            errors.push(format!(
                "workers must be between {MIN_WORKERS} and {MAX_WORKERS} (got {})",
                self.workers
            ));
        }
        if let Err(e) = self.department.parse::<Department>() {
            errors.extend(e.violations().iter().cloned());
        }
        if let Some(hours) = self.duration_hours {
            if !hours.is_finite() || hours <= 0.0 {
                errors.push(format!("duration_hours must be a positive number (got {hours})"));
            }
        }
        if let Some(directive) = &self.email_directive {
            if directive.trim().is_empty() {
                errors.push("email_directive must not be blank".into());
            }
        }
        errors
    }

    /// Validate, returning the parsed department on success.
    pub fn validate(&self) -> Result<Department> {
        let errors = self.violations();
        if errors.is_empty() {
            self.department()
        } else {
            Err(HaymakerError::Configuration(errors))
        }
    }

    pub fn department(&self) -> Result<Department> {
        self.department.parse()
    }

    /// Configured duration as a chrono duration.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.duration_hours
            .map(|h| chrono::Duration::milliseconds((h * 3_600_000.0) as i64))
    }
}

/// How the rate jitter is sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceMode {
    /// Fresh jitter per worker per cycle.
    #[default]
    PerCycle,
    /// One jitter factor per worker, held for the scheduler's lifetime.
    PerWorker,
}

/// Scheduler loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Length of one cycle in seconds.
    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: u64,
    #[serde(default)]
    pub variance_mode: VarianceMode,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_cycle_secs() -> u64 { 60 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_secs: default_cycle_secs(),
            variance_mode: VarianceMode::default(),
            seed: None,
        }
    }
}

impl SchedulerConfig {
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.cycle_secs == 0 || 3600 % self.cycle_secs != 0 {
            errors.push(format!(
                "cycle_secs must be a positive divisor of 3600 (got {})",
                self.cycle_secs
            ));
        }
        errors
    }

    pub fn cycle(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cycle_secs)
    }
}

/// Content backend (OpenAI-compatible chat completions) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Empty means: read `HAYMAKER_API_KEY`, then `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "https://api.openai.com/v1".into() }
fn default_model() -> String { "gpt-4o-mini".into() }
fn default_max_tokens() -> u32 { 500 }
fn default_temperature() -> f32 { 0.8 }
fn default_timeout_secs() -> u64 { 30 }

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ContentConfig {
    /// API key from config, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        ["HAYMAKER_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|key| std::env::var(key).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Where state and activity logs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_state_dir() -> String { "~/.haymaker/state".into() }
fn default_log_dir() -> String { "~/.haymaker/logs".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            log_dir: default_log_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = HaymakerConfig::default();
        assert_eq!(cfg.validate().unwrap(), Department::Operations);
        assert_eq!(cfg.scheduler.cycle_secs, 60);
        assert_eq!(cfg.deployment.workers, 25);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cfg = DeploymentConfig {
            workers: 0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, HaymakerError::Configuration(_)));
        assert!(err.to_string().contains("workers must be between 1 and 300"));
    }

    #[test]
    fn test_collects_every_violation() {
        let cfg = DeploymentConfig {
            workers: 301,
            department: "marketing".into(),
            duration_hours: Some(-1.0),
            enable_ai_generation: true,
            email_directive: Some("   ".into()),
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.violations().len(), 4);
    }

    #[test]
    fn test_parse_toml() {
        let cfg = HaymakerConfig::from_toml(
            r#"
[deployment]
workers = 5
department = "engineering"
duration_hours = 1.5
enable_ai_generation = true
email_directive = "Discuss the Q3 migration"

[scheduler]
cycle_secs = 30
variance_mode = "per_worker"
seed = 42
"#,
        )
        .unwrap();
        assert_eq!(cfg.deployment.workers, 5);
        assert_eq!(cfg.validate().unwrap(), Department::Engineering);
        assert_eq!(cfg.scheduler.variance_mode, VarianceMode::PerWorker);
        assert_eq!(cfg.scheduler.seed, Some(42));
        assert_eq!(
            cfg.deployment.duration(),
            Some(chrono::Duration::minutes(90))
        );
        assert_eq!(cfg.content.max_tokens, 500);
    }

    #[test]
    fn test_bad_cycle_rejected() {
        let cfg = HaymakerConfig {
            scheduler: SchedulerConfig {
                cycle_secs: 7,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
