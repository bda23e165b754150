//! # Haymaker Scheduler
//!
//! The activity engine: a registry of simulated workers and a cycle loop that
//! decides, per worker and per activity kind, whether something happens this
//! cycle.
//!
//! ## Architecture
//! ```text
//! ActivityScheduler (tokio task, one cycle per `cycle` of Clock time)
//!   ├── WorkerRegistry::all()            snapshot, taken once per cycle
//!   ├── in_work_hours(hour_utc)?         skip worker otherwise
//!   ├── jitter = 1 ± variance%           per worker per cycle (or per worker)
//!   ├── p = rate·jitter / cycles         Bernoulli draw per kind
//!   └── on trigger
//!         ├── Email → ContentGenerator::generate → Transport::send_email
//!         ├── Message / Document / Meeting → Transport
//!         └── ActivityRecord → ActivityLog + on_activity
//! ```

pub mod clock;
pub mod engine;
pub mod log;
pub mod registry;
pub mod trigger;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use engine::{ActivityScheduler, SchedulerSettings, SchedulerStatus};
pub use log::{ActivityLog, LogLevel};
pub use registry::WorkerRegistry;
pub use trigger::VarianceSampler;
