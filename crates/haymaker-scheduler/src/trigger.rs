//! Per-cycle trigger model.
//!
//! Each cycle is one Bernoulli trial per worker per activity kind. Hourly
//! rates are spread over the cycles in an hour, daily rates over the cycles
//! in the worker's working day, so the long-run count matches the
//! configured rate.

use std::collections::HashMap;
use std::time::Duration;

use haymaker_core::{ActivityKind, ActivityPattern, VarianceMode};
use rand::Rng;

/// Number of cycles in one hour.
pub fn cycles_per_hour(cycle: Duration) -> f64 {
    let secs = cycle.as_secs_f64();
    if secs <= 0.0 { 0.0 } else { 3600.0 / secs }
}

/// Probability that `kind` fires in one cycle, after applying `jitter`.
pub fn cycle_probability(
    pattern: &ActivityPattern,
    kind: ActivityKind,
    jitter: f64,
    cycles_per_hour: f64,
) -> f64 {
    let rate = pattern.rate_for(kind) * jitter;
    let cycles = if kind.is_hourly() {
        cycles_per_hour
    } else {
        f64::from(pattern.work_hours_per_day()) * cycles_per_hour
    };
    if cycles <= 0.0 {
        return 0.0;
    }
    (rate / cycles).clamp(0.0, 1.0)
}

/// One uniform draw in [0, 1) against `probability`.
pub fn should_trigger<R: Rng + ?Sized>(probability: f64, rng: &mut R) -> bool {
    probability > 0.0 && rng.gen_range(0.0..1.0) < probability
}

/// Multiplicative jitter `1 ± variance%`, uniform, never negative.
pub fn jitter_factor<R: Rng + ?Sized>(variance_percent: f64, rng: &mut R) -> f64 {
    if variance_percent <= 0.0 {
        return 1.0;
    }
    let v = variance_percent.min(100.0);
    (1.0 + rng.gen_range(-v..=v) / 100.0).max(0.0)
}

/// Hands out jitter factors according to the configured [`VarianceMode`].
#[derive(Debug, Default)]
pub struct VarianceSampler {
    mode: VarianceMode,
    held: HashMap<String, f64>,
}

impl VarianceSampler {
    pub fn new(mode: VarianceMode) -> Self {
        Self {
            mode,
            held: HashMap::new(),
        }
    }

    /// Jitter for `worker_id` this cycle.
    pub fn factor<R: Rng + ?Sized>(
        &mut self,
        worker_id: &str,
        variance_percent: f64,
        rng: &mut R,
    ) -> f64 {
        match self.mode {
            VarianceMode::PerCycle => jitter_factor(variance_percent, rng),
            VarianceMode::PerWorker => *self
                .held
                .entry(worker_id.to_string())
                .or_insert_with(|| jitter_factor(variance_percent, rng)),
        }
    }
}
