use crate::breaker::CircuitBreaker;
use crate::constants;
use crate::providers::Provider;
use std::sync::Arc;

/// A registered provider together with its breaker and scheduling settings
#[derive(Clone)]
pub struct ProviderExecution {
    pub provider: Arc<dyn Provider + Send + Sync>,
    pub circuit_breaker: Arc<dyn CircuitBreaker + Send + Sync>,
    pub priority: i32,
    pub weight: f64,
    pub enabled: bool,
}

impl ProviderExecution {
    /// Create an enabled execution with default priority and weight
    pub fn new(
        provider: Arc<dyn Provider + Send + Sync>,
        circuit_breaker: Arc<dyn CircuitBreaker + Send + Sync>,
    ) -> Self {
        Self {
            provider,
            circuit_breaker,
            priority: constants::DEFAULT_PROVIDER_PRIORITY,
            weight: constants::DEFAULT_PROVIDER_WEIGHT,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enabled and not rejected by its breaker
    pub fn is_healthy(&self) -> bool {
        self.enabled && !self.circuit_breaker.is_open()
    }
}

impl std::fmt::Debug for ProviderExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderExecution")
            .field("priority", &self.priority)
            .field("weight", &self.weight)
            .field("enabled", &self.enabled)
            .field("circuit_breaker_open", &self.circuit_breaker.is_open())
            .finish()
    }
}
