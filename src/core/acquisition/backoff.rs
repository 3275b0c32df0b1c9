//! Exponential backoff with jitter
//!
//! Attempt `k > 1` waits `min(2^k + U(0, 1), cap)` seconds.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    cap: Duration,
}

impl BackoffPolicy {
    pub fn new(cap: Duration) -> Self {
        Self { cap }
    }

    /// Delay before `attempt` (1-based); the first attempt never waits
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.delay_with_jitter(attempt, jitter)
    }

    /// Deterministic variant of [`delay`](Self::delay)
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = 2f64.powi(attempt.min(62) as i32);
        let secs = (exp + jitter.clamp(0.0, 1.0)).min(self.cap.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
