//! OpenAI-compatible chat-completions backend.
//!
//! Works with any endpoint that speaks the `/chat/completions` format
//! (OpenAI, Groq, DeepSeek, Ollama, llama.cpp server, ...). Only the
//! endpoint URL, model and API key differ.

use async_trait::async_trait;
use haymaker_core::config::ContentConfig;
use haymaker_core::traits::{CompletionRequest, ContentBackend};
use haymaker_core::{HaymakerError, Result};
use serde_json::{Value, json};

pub struct OpenAiCompatibleBackend {
    name: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    /// Build from the `[content]` config section.
    pub fn from_config(config: &ContentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HaymakerError::backend(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "openai-compatible".to_string(),
            api_key: config.resolve_api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    /// Local endpoints (Ollama, llama.cpp) don't need a key.
    fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Bearer {key}")),
            None => req,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ContentBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if self.api_key.is_none() && !self.is_local() {
            return Err(HaymakerError::backend(format!(
                "no API key configured for {}",
                self.base_url
            )));
        }

        let body = json!({
            "model": self.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
        });

        let url = self.chat_url();
        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        let resp = self.apply_auth(req).send().await.map_err(|e| {
            HaymakerError::backend(format!("{} connection failed ({url}): {e}", self.name))
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HaymakerError::backend(format!(
                "{} API error {status}: {text}",
                self.name
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| HaymakerError::backend(e.to_string()))?;
        extract_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
fn extract_content(json: &Value) -> Result<String> {
    json["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(String::from)
        .ok_or_else(|| HaymakerError::backend("No content in response"))
}
