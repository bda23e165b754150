//! In-memory identity directory.
//!
//! Accounts are named `haymaker-<deployment>-<n>@<domain>` with object ids
//! `entra-haymaker-<deployment>-<n>`. Nothing leaves the process.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use haymaker_core::traits::IdentityProvisioner;
use haymaker_core::{HaymakerError, Result, WorkerConfig, WorkerIdentity};

pub const DEFAULT_DOMAIN: &str = "contoso.onmicrosoft.com";

pub struct InMemoryDirectory {
    default_domain: String,
    accounts: Mutex<HashMap<String, WorkerIdentity>>,
    /// Worker numbers whose creation is rejected.
    reject_create: Mutex<HashSet<u32>>,
    /// Worker ids whose deletion is rejected.
    reject_delete: Mutex<HashSet<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_domain(DEFAULT_DOMAIN)
    }

    pub fn with_domain(domain: &str) -> Self {
        Self {
            default_domain: domain.to_string(),
            accounts: Mutex::new(HashMap::new()),
            reject_create: Mutex::new(HashSet::new()),
            reject_delete: Mutex::new(HashSet::new()),
        }
    }

    /// Make `create` fail for this worker number.
    pub fn reject_create(&self, worker_number: u32) {
        self.reject_create
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(worker_number);
    }

    /// Make `delete` fail for this worker id.
    pub fn reject_delete(&self, worker_id: &str) {
        self.reject_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(worker_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvisioner for InMemoryDirectory {
    async fn create(&self, config: &WorkerConfig) -> Result<WorkerIdentity> {
        let rejected = self
            .reject_create
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&config.worker_number);
        if rejected {
            return Err(HaymakerError::provisioning(format!(
                "directory rejected worker {}",
                config.worker_number
            )));
        }

        let name = format!("haymaker-{}-{}", config.deployment_id, config.worker_number);
        let domain = config.domain.as_deref().unwrap_or(&self.default_domain);
        let upn = format!("{name}@{domain}");
        let identity = WorkerIdentity::from_config(config, &format!("entra-{name}"), &upn);

        tracing::debug!("👤 Created account {upn}");
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(identity.worker_id.clone(), identity.clone());
        Ok(identity)
    }

    async fn delete(&self, worker_id: &str) -> Result<()> {
        let rejected = self
            .reject_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(worker_id);
        if rejected {
            return Err(HaymakerError::provisioning(format!(
                "directory refused to delete {worker_id}"
            )));
        }
        // Unknown ids are already gone.
        if self
            .accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(worker_id)
            .is_some()
        {
            tracing::debug!("🗑️ Deleted account for {worker_id}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haymaker_core::Department;

    #[tokio::test]
    async fn test_create_names_account() {
        let dir = InMemoryDirectory::new();
        let cfg = WorkerConfig::new(Department::Finance, 7, "m365-0a1b2c3d");
        let id = dir.create(&cfg).await.unwrap();
        assert_eq!(id.account, "haymaker-m365-0a1b2c3d-7@contoso.onmicrosoft.com");
        assert_eq!(id.directory_object_id, "entra-haymaker-m365-0a1b2c3d-7");
        assert_eq!(dir.len(), 1);

        dir.delete(&id.worker_id).await.unwrap();
        dir.delete(&id.worker_id).await.unwrap();
        assert!(dir.is_empty());
    }

    #[tokio::test]
    async fn test_rejections() {
        let dir = InMemoryDirectory::with_domain("fabrikam.example");
        dir.reject_create(2);
        let ok = dir
            .create(&WorkerConfig::new(Department::Hr, 1, "m365-00000001"))
            .await
            .unwrap();
        assert!(ok.account.ends_with("@fabrikam.example"));
        assert!(matches!(
            dir.create(&WorkerConfig::new(Department::Hr, 2, "m365-00000001")).await,
            Err(HaymakerError::Provisioning(_))
        ));

        dir.reject_delete(&ok.worker_id);
        assert!(dir.delete(&ok.worker_id).await.is_err());
        assert_eq!(dir.len(), 1);
    }
}
