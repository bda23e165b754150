//! Identity provisioning: creates and deletes worker accounts in a directory.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{WorkerConfig, WorkerIdentity};

#[async_trait]
pub trait IdentityProvisioner: Send + Sync {
    /// Create one worker account. Fails with `HaymakerError::Provisioning`.
    async fn create(&self, config: &WorkerConfig) -> Result<WorkerIdentity>;

    /// Delete one worker account. Fails with `HaymakerError::Provisioning`
    /// when the account could not be removed.
    async fn delete(&self, worker_id: &str) -> Result<()>;
}
