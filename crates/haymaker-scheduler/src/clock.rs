//! Time sources for the scheduler loop.
//!
//! Production uses [`SystemClock`]. [`SimulatedClock`] makes `sleep` advance
//! time instantly, so a simulated working day runs in milliseconds.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time, UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Wait for `duration` of this clock's time.
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock. `sleep` jumps forward by the requested duration.
#[derive(Debug)]
pub struct SimulatedClock {
    now: Mutex<DateTime<Utc>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start today at `hour:00` UTC.
    pub fn at_hour(hour: u32) -> Self {
        let start = Utc::now()
            .date_naive()
            .and_hms_opt(hour.min(23), 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self::new(start)
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

#[async_trait]
impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
