//! Content backend: an LLM (or anything else) that turns a prompt into text.

use async_trait::async_trait;

use crate::error::Result;

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait ContentBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with `HaymakerError::Backend`.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
