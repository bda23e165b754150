//! Transport that performs nothing and logs every call.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use haymaker_core::traits::Transport;
use haymaker_core::{EmailContent, Result, WorkerIdentity};

#[derive(Debug, Default)]
pub struct LoggingTransport {
    emails: AtomicU64,
    messages: AtomicU64,
    documents: AtomicU64,
    meetings: AtomicU64,
}

impl LoggingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls seen so far: emails, messages, documents, meetings.
    pub fn totals(&self) -> (u64, u64, u64, u64) {
        (
            self.emails.load(Ordering::Relaxed),
            self.messages.load(Ordering::Relaxed),
            self.documents.load(Ordering::Relaxed),
            self.meetings.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send_email(&self, identity: &WorkerIdentity, content: &EmailContent) -> Result<()> {
        self.emails.fetch_add(1, Ordering::Relaxed);
        tracing::info!("📧 {} → \"{}\"", identity.account, content.subject);
        Ok(())
    }

    async fn post_message(&self, identity: &WorkerIdentity) -> Result<()> {
        self.messages.fetch_add(1, Ordering::Relaxed);
        tracing::info!("💬 {} posted a message", identity.account);
        Ok(())
    }

    async fn create_document(&self, identity: &WorkerIdentity) -> Result<()> {
        self.documents.fetch_add(1, Ordering::Relaxed);
        tracing::info!("📄 {} created a document", identity.account);
        Ok(())
    }

    async fn schedule_meeting(&self, identity: &WorkerIdentity) -> Result<()> {
        self.meetings.fetch_add(1, Ordering::Relaxed);
        tracing::info!("📅 {} scheduled a meeting", identity.account);
        Ok(())
    }
}
