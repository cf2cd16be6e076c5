//! In-process providers and breakers for deterministic tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::errors::{EnsembleError, EnsembleResult};
use crate::providers::{AnalysisInput, AnalysisOptions, Provider, ProviderResponse, RateLimitInfo};

/// Provider answering from configuration instead of a remote service
pub struct MockProvider {
    content: String,
    confidence: f64,
    tokens_used: u32,
    model: String,
    latency: Duration,
    failure: Option<String>,
    healthy: AtomicBool,
    health_error: bool,
    health_latency: Duration,
    cost_per_token: f64,
    rate_limit: RateLimitInfo,
    calls: AtomicUsize,
    health_checks: AtomicUsize,
}

impl MockProvider {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            confidence: 0.8,
            tokens_used: 100,
            model: "mock-model".to_string(),
            latency: Duration::ZERO,
            failure: None,
            healthy: AtomicBool::new(true),
            health_error: false,
            health_latency: Duration::ZERO,
            cost_per_token: 0.0,
            rate_limit: RateLimitInfo::unlimited(),
            calls: AtomicUsize::new(0),
            health_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Delay every `analyze` call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every `analyze` call fail with an `ApiError` carrying `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn unhealthy(self) -> Self {
        self.healthy.store(false, Ordering::SeqCst);
        self
    }

    /// Make `health_check` return an error
    pub fn with_health_error(mut self) -> Self {
        self.health_error = true;
        self
    }

    pub fn with_health_latency(mut self, latency: Duration) -> Self {
        self.health_latency = latency;
        self
    }

    pub fn with_cost_per_token(mut self, cost: f64) -> Self {
        self.cost_per_token = cost;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitInfo) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `analyze` calls started
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn analyze(
        &self,
        _input: &AnalysisInput,
        _prompt: &str,
        _options: &AnalysisOptions,
    ) -> EnsembleResult<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(message) = &self.failure {
            return Err(EnsembleError::ApiError(message.clone()));
        }

        Ok(ProviderResponse {
            content: self.content.clone(),
            confidence: self.confidence,
            tokens_used: self.tokens_used,
            response_time_ms: self.latency.as_millis() as u64,
            model: self.model.clone(),
            timestamp: Utc::now(),
        })
    }

    async fn health_check(&self) -> EnsembleResult<bool> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if !self.health_latency.is_zero() {
            tokio::time::sleep(self.health_latency).await;
        }
        if self.health_error {
            return Err(EnsembleError::ApiError("health endpoint unreachable".to_string()));
        }
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    fn get_rate_limit(&self) -> RateLimitInfo {
        self.rate_limit.clone()
    }

    fn get_cost(&self, tokens: u32) -> f64 {
        tokens as f64 * self.cost_per_token
    }
}

/// Breaker whose state is set by the test; it never trips on its own
#[derive(Default)]
pub struct MockCircuitBreaker {
    open: AtomicBool,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl MockCircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        let breaker = Self::default();
        breaker.set_open(true);
        breaker
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn success_count(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl CircuitBreaker for MockCircuitBreaker {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}
