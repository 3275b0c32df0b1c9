//! Consecutive-timeout circuit breaker

use crate::domain::FailureKind;
use std::time::Duration;

/// Trips after `threshold` timeout-classified outcomes in a row
///
/// Any success or non-timeout failure resets the count. The scheduler owns
/// one breaker per run; it sleeps for [`cooldown`](Self::cooldown) when the
/// breaker is tripped and then calls [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_timeouts: u32,
}

impl CircuitBreaker {
    /// A `threshold` of 0 disables the breaker
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            consecutive_timeouts: 0,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    pub fn is_tripped(&self) -> bool {
        self.threshold > 0 && self.consecutive_timeouts >= self.threshold
    }

    /// Records one target outcome; `None` is a success
    pub fn record(&mut self, failure: Option<FailureKind>) {
        match failure {
            Some(kind) if kind.counts_toward_breaker() => self.consecutive_timeouts += 1,
            _ => self.consecutive_timeouts = 0,
        }
    }

    pub fn reset(&mut self) {
        self.consecutive_timeouts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_after_threshold() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(300));
        breaker.record(Some(FailureKind::Timeout));
        breaker.record(Some(FailureKind::Timeout));
        assert!(!breaker.is_tripped());
        breaker.record(Some(FailureKind::Timeout));
        assert!(breaker.is_tripped());

        breaker.reset();
        assert_eq!(breaker.consecutive_timeouts(), 0);
        assert!(!breaker.is_tripped());
    }

    #[test]
    fn test_other_outcomes_reset_the_count() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(300));
        breaker.record(Some(FailureKind::Timeout));
        breaker.record(Some(FailureKind::Timeout));
        breaker.record(Some(FailureKind::NotFound));
        assert_eq!(breaker.consecutive_timeouts(), 0);

        breaker.record(Some(FailureKind::Timeout));
        breaker.record(None);
        assert_eq!(breaker.consecutive_timeouts(), 0);
    }

    #[test]
    fn test_zero_threshold_never_trips() {
        let mut breaker = CircuitBreaker::new(0, Duration::from_secs(300));
        for _ in 0..10 {
            breaker.record(Some(FailureKind::Timeout));
        }
        assert!(!breaker.is_tripped());
    }
}
