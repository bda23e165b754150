//! Activity transport: the calls that actually send mail, post chat, etc.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{EmailContent, WorkerIdentity};

/// Each call may fail independently with `HaymakerError::Transport`.
/// The scheduler records the failure and carries on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_email(&self, identity: &WorkerIdentity, content: &EmailContent) -> Result<()>;

    async fn post_message(&self, identity: &WorkerIdentity) -> Result<()>;

    async fn create_document(&self, identity: &WorkerIdentity) -> Result<()>;

    async fn schedule_meeting(&self, _identity: &WorkerIdentity) -> Result<()> {
        Ok(())
    }
}
