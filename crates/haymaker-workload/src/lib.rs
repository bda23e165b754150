//! # Haymaker Workload
//!
//! Runs deployments: validates a [`DeploymentConfig`](haymaker_core::DeploymentConfig),
//! provisions workers, drives the activity scheduler and tears everything down
//! again, persisting every phase change.
//!
//! ```text
//! Workload ── deploy / stop / cleanup / get_logs / resume
//!   └── Deployment (one per id)
//!         pending → creating_workers → executing → stopped | completed | failed
//!                                     stopped | completed → cleanup_in_progress
//!                                                         → completed | failed
//!         ├── IdentityProvisioner  (InMemoryDirectory)
//!         ├── ActivityScheduler    (Transport: LoggingTransport)
//!         └── StateStore           (JsonStateStore, MemoryStateStore)
//! ```

pub mod directory;
pub mod lifecycle;
pub mod store;
pub mod transport;
pub mod workload;

pub use directory::InMemoryDirectory;
pub use lifecycle::{CleanupReport, Deployment, DeploymentServices};
pub use store::{JsonStateStore, MemoryStateStore};
pub use transport::LoggingTransport;
pub use workload::Workload;
