//! Deployment state persistence.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::DeploymentState;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save(&self, state: &DeploymentState) -> Result<()>;

    async fn load(&self, deployment_id: &str) -> Result<Option<DeploymentState>>;

    /// Every persisted deployment.
    async fn list(&self) -> Result<Vec<DeploymentState>>;
}
