use log::{debug, warn};
use std::sync::Arc;

use crate::breaker::{CircuitBreaker, ConsecutiveFailureBreaker};
use crate::config::{self, EnsembleConfig};
use crate::errors::EnsembleResult;
use crate::load_balancer::SelectionStrategy;
use crate::orchestrator::types::RegistrationOptions;
use crate::orchestrator::EnsembleOrchestrator;
use crate::providers::Provider;

/// Internal helper struct for Builder
struct PendingProvider {
    name: String,
    provider: Arc<dyn Provider + Send + Sync>,
    circuit_breaker: Option<Arc<dyn CircuitBreaker + Send + Sync>>,
    options: RegistrationOptions,
}

/// EnsembleOrchestrator Builder
pub struct EnsembleBuilder {
    config: EnsembleConfig,
    providers_to_register: Vec<PendingProvider>,
}

impl EnsembleBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        EnsembleBuilder {
            config: EnsembleConfig::default(),
            providers_to_register: Vec::new(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: EnsembleConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the minimum number of healthy providers an ensemble call needs.
    pub fn min_providers(mut self, required: usize) -> Self {
        self.config.orchestrator.min_providers_required = required;
        self
    }

    /// Lets the load balancer pick providers using `strategy`.
    pub fn load_balancing(mut self, strategy: SelectionStrategy) -> Self {
        self.config.orchestrator.enable_load_balancing = true;
        self.config.balancer.strategy = strategy;
        self
    }

    /// Begins configuring a new provider.
    /// Subsequent calls like `.circuit_breaker()`, `.priority()`, `.enabled()` will apply to this provider.
    pub fn add_provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider + Send + Sync>) -> Self {
        self.providers_to_register.push(PendingProvider {
            name: name.into(),
            provider,
            circuit_breaker: None,
            options: RegistrationOptions::default(),
        });
        self
    }

    /// Sets the circuit breaker of the *last added* provider.
    /// Panics if `add_provider` was not called before this.
    pub fn circuit_breaker(mut self, breaker: Arc<dyn CircuitBreaker + Send + Sync>) -> Self {
        self.last_provider("circuit_breaker").circuit_breaker = Some(breaker);
        self
    }

    /// Sets the priority of the *last added* provider.
    /// Panics if `add_provider` was not called before this.
    pub fn priority(mut self, priority: i32) -> Self {
        self.last_provider("priority").options.priority = Some(priority);
        self
    }

    /// Sets the weighted round-robin share of the *last added* provider.
    /// Panics if `add_provider` was not called before this.
    pub fn weight(mut self, weight: f64) -> Self {
        self.last_provider("weight").options.weight = Some(weight);
        self
    }

    /// Sets the enabled status for the *last added* provider.
    /// Panics if `add_provider` was not called before this.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.last_provider("enabled").options.enabled = Some(enabled);
        self
    }

    fn last_provider(&mut self, method: &str) -> &mut PendingProvider {
        match self.providers_to_register.last_mut() {
            Some(last_provider) => last_provider,
            None => panic!("'.{}()' called before '.add_provider()'", method),
        }
    }

    /// Consumes the builder and constructs the `EnsembleOrchestrator`.
    /// Returns an error if the configuration is invalid.
    pub async fn build(self) -> EnsembleResult<EnsembleOrchestrator> {
        config::validate_config(&self.config)?;
        let orchestrator = EnsembleOrchestrator::new(self.config);

        if self.providers_to_register.is_empty() {
            warn!("EnsembleOrchestrator built with no providers.");
        }

        for pending in self.providers_to_register {
            debug!("Building provider '{}'", pending.name);
            let breaker: Arc<dyn CircuitBreaker + Send + Sync> = match pending.circuit_breaker {
                Some(breaker) => breaker,
                None => Arc::new(ConsecutiveFailureBreaker::with_defaults(pending.name.clone())),
            };
            orchestrator
                .register_provider(pending.name, pending.provider, breaker, pending.options)
                .await;
        }

        Ok(orchestrator)
    }
}

impl Default for EnsembleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
