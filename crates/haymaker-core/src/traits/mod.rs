//! Collaborator contracts consumed by the engine.
//!
//! Implementations live outside the core: reference ones ship in
//! `haymaker-workload` and `haymaker-content`.

pub mod backend;
pub mod identity;
pub mod store;
pub mod transport;

use std::sync::Arc;

use crate::types::ActivityRecord;

pub use backend::{CompletionRequest, ContentBackend};
pub use identity::IdentityProvisioner;
pub use store::StateStore;
pub use transport::Transport;

/// Telemetry sink. Called once per activity; must return quickly.
pub type ActivityCallback = Arc<dyn Fn(&ActivityRecord) + Send + Sync>;
