//! Content generator: backend first, templates always.
//!
//! The strategy is picked once at construction. Callers only ever see
//! `generate`, which cannot fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use haymaker_core::traits::{CompletionRequest, ContentBackend};
use haymaker_core::{Department, EmailContent, HaymakerError, Result};

use crate::prompts::{EMAIL_SYSTEM_PROMPT, build_email_prompt};
use crate::templates::TemplateSource;

const SUBJECT_PREFIXES: [&str; 4] = ["Subject:", "subject:", "RE:", "Re:"];

/// Where email text comes from.
pub enum ContentSource {
    /// Ask the backend; fall back to templates on any failure.
    Backend(Arc<dyn ContentBackend>),
    /// Templates only.
    Templates,
}

/// Generation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub backend: u64,
    pub fallback: u64,
    /// Backend calls that errored or returned unusable text.
    pub backend_errors: u64,
}

/// Email content generator.
pub struct ContentGenerator {
    source: ContentSource,
    templates: TemplateSource,
    max_tokens: u32,
    temperature: f32,
    backend_count: AtomicU64,
    fallback_count: AtomicU64,
    backend_errors: AtomicU64,
}

impl ContentGenerator {
    pub fn new(source: ContentSource) -> Self {
        Self {
            source,
            templates: TemplateSource::new(),
            max_tokens: 500,
            temperature: 0.8,
            backend_count: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0),
        }
    }

    pub fn templates_only() -> Self {
        Self::new(ContentSource::Templates)
    }

    pub fn with_backend(backend: Arc<dyn ContentBackend>) -> Self {
        Self::new(ContentSource::Backend(backend))
    }

    /// Pick the strategy from the deployment flag and whatever backend exists.
    pub fn from_options(enable_ai: bool, backend: Option<Arc<dyn ContentBackend>>) -> Self {
        match (enable_ai, backend) {
            (true, Some(backend)) => {
                tracing::info!("🧠 AI email generation enabled via '{}'", backend.name());
                Self::with_backend(backend)
            }
            (true, None) => {
                tracing::warn!(
                    "⚠️ AI generation requested but no content backend configured; using templates"
                );
                Self::templates_only()
            }
            (false, _) => Self::templates_only(),
        }
    }

    /// Override completion parameters.
    pub fn with_params(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn has_backend(&self) -> bool {
        matches!(self.source, ContentSource::Backend(_))
    }

    pub fn stats(&self) -> GenerationStats {
        GenerationStats {
            backend: self.backend_count.load(Ordering::Relaxed),
            fallback: self.fallback_count.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }

    /// Produce a subject and body. Never fails.
    pub async fn generate(
        &self,
        department: Department,
        worker_name: &str,
        directive: Option<&str>,
    ) -> EmailContent {
        if let ContentSource::Backend(backend) = &self.source {
            match self
                .generate_with_backend(backend.as_ref(), department, worker_name, directive)
                .await
            {
                Ok(email) => {
                    self.backend_count.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        path = "backend",
                        subject = %email.subject,
                        "✉️ Email generated by {}",
                        backend.name()
                    );
                    return email;
                }
                Err(e) => {
                    self.backend_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "⚠️ {} generation failed, using fallback: {e}",
                        backend.name()
                    );
                }
            }
        }

        let email = self.templates.next(department, worker_name);
        self.fallback_count.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            path = "fallback",
            subject = %email.subject,
            "✉️ Email generated from template"
        );
        email
    }

    async fn generate_with_backend(
        &self,
        backend: &dyn ContentBackend,
        department: Department,
        worker_name: &str,
        directive: Option<&str>,
    ) -> Result<EmailContent> {
        let request = CompletionRequest {
            system: EMAIL_SYSTEM_PROMPT.to_string(),
            prompt: build_email_prompt(department, worker_name, directive),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let reply = backend.complete(&request).await?;
        parse_email_response(&reply)
    }
}

/// Split a backend reply into subject (first line) and body (the rest).
pub fn parse_email_response(content: &str) -> Result<EmailContent> {
    let trimmed = content.trim();
    let Some((first, rest)) = trimmed.split_once('\n') else {
        return Err(HaymakerError::backend(
            "reply has no body (expected subject line, then body)",
        ));
    };

    let mut subject = first.trim();
    for prefix in SUBJECT_PREFIXES {
        if let Some(stripped) = subject.strip_prefix(prefix) {
            subject = stripped.trim();
        }
    }
    let body = rest.trim();

    if subject.is_empty() || body.is_empty() {
        return Err(HaymakerError::backend("reply has an empty subject or body"));
    }

    Ok(EmailContent {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedBackend(&'static str);

    #[async_trait]
    impl ContentBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl ContentBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Err(HaymakerError::backend("rate limited"))
        }
    }

    fn assert_usable(email: &EmailContent) {
        assert!(!email.subject.trim().is_empty());
        assert!(!email.body.trim().is_empty());
    }

    #[tokio::test]
    async fn test_no_backend_uses_templates() {
        let generator = ContentGenerator::templates_only();
        for dept in Department::ALL {
            let email = generator.generate(dept, "Haymaker Worker 1", None).await;
            assert_usable(&email);
        }
        let stats = generator.stats();
        assert_eq!(stats.fallback, 6);
        assert_eq!(stats.backend, 0);
    }

    #[tokio::test]
    async fn test_failing_backend_falls_back() {
        let generator = ContentGenerator::with_backend(Arc::new(FailingBackend));
        let email = generator
            .generate(Department::Finance, "Haymaker Worker 2", Some("budget"))
            .await;
        assert_usable(&email);
        assert_eq!(generator.stats().backend_errors, 1);
        assert_eq!(generator.stats().fallback, 1);
    }

    #[tokio::test]
    async fn test_malformed_backend_falls_back() {
        for reply in ["", "   \n  ", "just one line", "Subject:\nbody", "Subject: Hi\n   "] {
            let generator = ContentGenerator::with_backend(Arc::new(FixedBackend(reply)));
            let email = generator.generate(Department::Hr, "Haymaker Worker 3", None).await;
            assert_usable(&email);
            assert_eq!(generator.stats().fallback, 1, "reply {reply:?} should fall back");
        }
    }

    #[tokio::test]
    async fn test_backend_reply_is_parsed() {
        let generator = ContentGenerator::with_backend(Arc::new(FixedBackend(
            "Subject: Q3 roadmap sync\nHi team,\n\nLet's meet Tuesday.\n\nThanks",
        )));
        let email = generator.generate(Department::Engineering, "W", None).await;
        assert_eq!(email.subject, "Q3 roadmap sync");
        assert!(email.body.starts_with("Hi team,"));
        assert_eq!(generator.stats().backend, 1);
    }

    #[test]
    fn test_from_options_without_backend() {
        let generator = ContentGenerator::from_options(true, None);
        assert!(!generator.has_backend());
        let generator = ContentGenerator::from_options(false, Some(Arc::new(FailingBackend)));
        assert!(!generator.has_backend());
    }

    #[test]
    fn test_parse_strips_reply_prefix() {
        let email = parse_email_response("Re: Budget\nSounds good.").unwrap();
        assert_eq!(email.subject, "Budget");
        assert_eq!(email.body, "Sounds good.");
    }
}
