//! Deployment state stores.
//! One pretty-printed JSON file per deployment: human-readable, easy to
//! inspect while a run is in progress.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use haymaker_core::traits::StateStore;
use haymaker_core::{DeploymentState, HaymakerError, Result};

/// File-based state store (`<dir>/<deployment_id>.json`).
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    /// Create a store at the given directory.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn file_for(&self, deployment_id: &str) -> Result<PathBuf> {
        let valid = !deployment_id.is_empty()
            && deployment_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(HaymakerError::Store(format!(
                "invalid deployment id '{deployment_id}'"
            )));
        }
        Ok(self.dir.join(format!("{deployment_id}.json")))
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn save(&self, state: &DeploymentState) -> Result<()> {
        let file = self.file_for(&state.deployment_id)?;
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write-then-rename so readers never see a half-written file.
        let tmp = file.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &file).await?;
        tracing::debug!(
            "💾 Saved {} ({}) to {}",
            state.deployment_id,
            state.phase,
            file.display()
        );
        Ok(())
    }

    async fn load(&self, deployment_id: &str) -> Result<Option<DeploymentState>> {
        let file = self.file_for(deployment_id)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<DeploymentState>> {
        let mut states = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(states),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(json) => match serde_json::from_str::<DeploymentState>(&json) {
                    Ok(state) => states.push(state),
                    Err(e) => {
                        tracing::warn!("⚠️ Skipping unreadable state {}: {e}", path.display())
                    }
                },
                Err(e) => tracing::warn!("⚠️ Failed to read {}: {e}", path.display()),
            }
        }
        states.sort_by_key(|s| s.created_at);
        Ok(states)
    }
}

/// Keeps states in memory. For tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, DeploymentState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, state: &DeploymentState) -> Result<()> {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(state.deployment_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, deployment_id: &str) -> Result<Option<DeploymentState>> {
        Ok(self
            .states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(deployment_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<DeploymentState>> {
        let mut states: Vec<_> = self
            .states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        states.sort_by_key(|s| s.created_at);
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haymaker_core::{DeploymentConfig, DeploymentPhase};

    #[tokio::test]
    async fn test_json_store_save_load_list() {
        let dir = std::env::temp_dir().join("haymaker-test-json-store");
        std::fs::remove_dir_all(&dir).ok();
        let store = JsonStateStore::new(&dir);

        assert!(store.load("m365-missing0").await.unwrap().is_none());

        let mut state = DeploymentState::new(DeploymentConfig::default());
        state.phase = DeploymentPhase::Executing;
        store.save(&state).await.unwrap();
        state.phase = DeploymentPhase::Stopped;
        store.save(&state).await.unwrap();

        let loaded = store.load(&state.deployment_id).await.unwrap().unwrap();
        assert_eq!(loaded.phase, DeploymentPhase::Stopped);
        assert_eq!(loaded.config.workers, 25);

        std::fs::write(dir.join("garbage.json"), "{ not json").unwrap();
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_json_store_rejects_path_ids() {
        let store = JsonStateStore::new(&std::env::temp_dir().join("haymaker-test-json-ids"));
        assert!(matches!(
            store.load("../etc/passwd").await,
            Err(HaymakerError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::new();
        let state = DeploymentState::new(DeploymentConfig::default());
        store.save(&state).await.unwrap();
        assert!(store.load(&state.deployment_id).await.unwrap().is_some());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
