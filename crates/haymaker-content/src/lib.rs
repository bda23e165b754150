//! # Haymaker Content
//!
//! Email subject/body generation for simulated workers.
//!
//! ```text
//! ContentGenerator::generate(department, worker, directive)
//!   ├── ContentSource::Backend  → prompt → ContentBackend::complete → parse
//!   │                               └── any failure ──┐
//!   └── ContentSource::Templates ─────────────────────┴→ TemplateSource (rotating)
//! ```
//!
//! `generate` never fails: backend errors and malformed replies are counted
//! and logged, and the caller gets template content instead.

pub mod backend;
pub mod generator;
pub mod prompts;
pub mod templates;

pub use backend::OpenAiCompatibleBackend;
pub use generator::{ContentGenerator, ContentSource, GenerationStats, parse_email_response};
pub use templates::TemplateSource;
