//! Circuit breaker contract and a default consecutive-failure implementation.

use crate::constants;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-provider failure gate consulted before every dispatch
pub trait CircuitBreaker {
    /// Whether calls to the provider should currently be rejected
    fn is_open(&self) -> bool;
    /// Report a successful call
    fn record_success(&self);
    /// Report a failed call
    fn record_failure(&self);
}

/// Open/closed view of a breaker, used in status snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Open,
    Closed,
}

impl BreakerState {
    pub fn of(breaker: &(dyn CircuitBreaker + Send + Sync)) -> Self {
        if breaker.is_open() {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::DEFAULT_BREAKER_FAILURE_THRESHOLD,
            cooldown: Duration::from_millis(constants::DEFAULT_BREAKER_COOLDOWN_MS),
        }
    }
}

impl BreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Opens after `failure_threshold` consecutive failures and closes again
/// once the cooldown has elapsed.
pub struct ConsecutiveFailureBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl ConsecutiveFailureBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                consecutive_failures: 0,
                open_until: None,
            }),
        }
    }

    /// Breaker with the default threshold and cooldown
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, BreakerConfig::default())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .map(|inner| inner.consecutive_failures)
            .unwrap_or(0)
    }
}

impl CircuitBreaker for ConsecutiveFailureBreaker {
    fn is_open(&self) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => return false,
        };
        match inner.open_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                // cooldown expired
                inner.open_until = None;
                inner.consecutive_failures = 0;
                debug!("Circuit breaker for '{}' closed after cooldown", self.name);
                false
            }
            None => false,
        }
    }

    fn record_success(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consecutive_failures = 0;
            inner.open_until = None;
        }
    }

    fn record_failure(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
            if inner.consecutive_failures >= self.config.failure_threshold && inner.open_until.is_none() {
                inner.open_until = Some(Instant::now() + self.config.cooldown);
                warn!(
                    "Circuit breaker for '{}' opened after {} consecutive failures",
                    self.name, inner.consecutive_failures
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_breaker_starts_closed() {
        let breaker = ConsecutiveFailureBreaker::with_defaults("alpha");
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_breaker_opens_at_threshold() {
        let breaker = ConsecutiveFailureBreaker::new(
            "alpha",
            BreakerConfig::default().with_failure_threshold(3),
        );
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(BreakerState::of(&breaker), BreakerState::Open);
    }

    #[test]
    fn test_success_resets_failures() {
        let breaker = ConsecutiveFailureBreaker::new(
            "alpha",
            BreakerConfig::default().with_failure_threshold(3),
        );
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_breaker_closes_after_cooldown() {
        let breaker = ConsecutiveFailureBreaker::new(
            "alpha",
            BreakerConfig::default()
                .with_failure_threshold(1)
                .with_cooldown(Duration::from_millis(30)),
        );
        breaker.record_failure();
        assert!(breaker.is_open());
        thread::sleep(Duration::from_millis(50));
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
    }
}
