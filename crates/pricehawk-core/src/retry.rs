//! Retry and cool-down delay schedule for page fetches.
//!
//! Delays are computed as plain data so the schedule can be inspected and
//! tested without sleeping. Randomness enters only through the `*_unit`
//! arguments or an injected [`Rng`].

use std::time::Duration;

use rand::Rng;

/// Default number of fetch attempts per URL.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Backoff and cool-down configuration for the fetch retry loop.
///
/// Backoff before attempt `i` (0-based, none before the first):
/// `base_delay + step × i ± jitter`, floored at `min_delay`.
/// After a block page, an extra cool-down in `[cooldown_min, cooldown_max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub step: Duration,
    pub jitter: Duration,
    pub min_delay: Duration,
    pub cooldown_min: Duration,
    pub cooldown_max: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(2),
            step: Duration::from_millis(1500),
            jitter: Duration::from_millis(500),
            min_delay: Duration::from_secs(1),
            cooldown_min: Duration::from_secs(10),
            cooldown_max: Duration::from_secs(20),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Number of attempts actually made. Never zero.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Backoff before attempt `attempt_index` given a jitter sample in `[-1, 1]`.
    pub fn backoff_delay(&self, attempt_index: u32, jitter_unit: f64) -> Duration {
        if attempt_index == 0 {
            return Duration::ZERO;
        }
        let base = self.base_delay.as_secs_f64() + self.step.as_secs_f64() * f64::from(attempt_index);
        let jitter = jitter_unit.clamp(-1.0, 1.0) * self.jitter.as_secs_f64();
        Duration::from_secs_f64((base + jitter).max(self.min_delay.as_secs_f64()))
    }

    /// Backoff before attempt `attempt_index` with jitter drawn from `rng`.
    pub fn draw_backoff<R: Rng + ?Sized>(&self, attempt_index: u32, rng: &mut R) -> Duration {
        self.backoff_delay(attempt_index, rng.gen_range(-1.0..=1.0))
    }

    /// Backoff before each attempt, first entry always zero.
    pub fn backoff_schedule<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Duration> {
        (0..self.attempts())
            .map(|i| self.draw_backoff(i, rng))
            .collect()
    }

    /// Cool-down after a block page given a sample in `[0, 1]`.
    pub fn cooldown_delay(&self, unit: f64) -> Duration {
        let min = self.cooldown_min.as_secs_f64();
        let span = (self.cooldown_max.as_secs_f64() - min).max(0.0);
        Duration::from_secs_f64(min + span * unit.clamp(0.0, 1.0))
    }

    /// Cool-down after a block page drawn from `rng`.
    pub fn draw_cooldown<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        self.cooldown_delay(rng.gen_range(0.0..=1.0))
    }

    /// Upper bound on the time one URL lookup can take.
    ///
    /// Every attempt times out, every backoff draws maximal jitter, and every
    /// attempt but the last ends on a block page. Defaults give 109.5s.
    pub fn worst_case_latency(&self) -> Duration {
        let attempts = self.attempts();
        let requests = self.request_timeout * attempts;
        let backoffs: Duration = (0..attempts).map(|i| self.backoff_delay(i, 1.0)).sum();
        let cooldowns = self.cooldown_delay(1.0) * (attempts - 1);
        requests + backoffs + cooldowns
    }
}
