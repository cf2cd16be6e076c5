use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::config::{self, EnsembleConfig, EnsembleConfigUpdate};
use crate::constants;
use crate::errors::{EnsembleError, EnsembleResult};
use crate::load_balancer::ProviderLoadBalancer;
use crate::orchestrator::aggregation::{self, AggregationContext, ProviderOutcome};
use crate::orchestrator::builder::EnsembleBuilder;
use crate::orchestrator::types::{
    EnsembleOptions, EnsembleResponse, OrchestratorStatistics, ProviderStatus, RegistrationOptions,
};
use crate::providers::{AnalysisInput, AnalysisOptions, Provider, ProviderExecution, ProviderResponse};

/// Coordinates parallel analysis across every registered provider
///
/// The orchestrator owns the provider registry and a load balancer. Each
/// ensemble call fans out to the healthy providers (or to the balancer's
/// selection when load balancing is enabled), waits for every call to
/// settle and aggregates whatever succeeded into one `EnsembleResponse`.
pub struct EnsembleOrchestrator {
    providers: RwLock<HashMap<String, ProviderExecution>>,
    config: RwLock<EnsembleConfig>,
    balancer: Arc<ProviderLoadBalancer>,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl EnsembleOrchestrator {
    pub fn new(config: EnsembleConfig) -> Self {
        let balancer = Arc::new(ProviderLoadBalancer::new(config.effective_balancer_config()));
        Self {
            providers: RwLock::new(HashMap::new()),
            config: RwLock::new(config),
            balancer,
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    pub fn builder() -> EnsembleBuilder {
        EnsembleBuilder::new()
    }

    /// Create an orchestrator from a TOML configuration file
    pub fn from_config_file(path: impl AsRef<Path>) -> EnsembleResult<Self> {
        let config = config::load_config(path)?;
        Ok(Self::new(config))
    }

    /// The load balancer fed by this orchestrator
    pub fn balancer(&self) -> &Arc<ProviderLoadBalancer> {
        &self.balancer
    }

    pub async fn config(&self) -> EnsembleConfig {
        self.config.read().await.clone()
    }

    /// Register (or replace) a provider
    ///
    /// Priority, weight and enablement come from `options` first, then from
    /// the provider's entry in the configuration, then from the defaults.
    pub async fn register_provider(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn Provider + Send + Sync>,
        circuit_breaker: Arc<dyn CircuitBreaker + Send + Sync>,
        options: RegistrationOptions,
    ) {
        let name = name.into();
        let configured = self.config.read().await.providers.get(&name).cloned();

        let priority = options
            .priority
            .or(configured.as_ref().map(|s| s.priority))
            .unwrap_or(constants::DEFAULT_PROVIDER_PRIORITY);
        let weight = options
            .weight
            .or(configured.as_ref().map(|s| s.weight))
            .unwrap_or(constants::DEFAULT_PROVIDER_WEIGHT);
        let enabled = options
            .enabled
            .or(configured.as_ref().map(|s| s.enabled))
            .unwrap_or(true);

        let execution = ProviderExecution::new(provider, circuit_breaker)
            .with_priority(priority)
            .with_weight(weight)
            .with_enabled(enabled);

        self.providers.write().await.insert(name.clone(), execution.clone());
        self.balancer.register_execution(name.clone(), execution).await;

        info!(
            "Registered provider '{}' (priority {}, weight {}, {})",
            name,
            priority,
            weight,
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Remove a provider from the orchestrator and its load balancer
    ///
    /// # Returns
    /// * Whether the provider was registered
    pub async fn unregister_provider(&self, name: &str) -> bool {
        let removed = self.providers.write().await.remove(name).is_some();
        self.balancer.unregister_provider(name).await;
        if removed {
            info!("Unregistered provider '{}'", name);
        }
        removed
    }

    pub async fn set_provider_enabled(&self, name: &str, enabled: bool) -> EnsembleResult<()> {
        let execution = {
            let mut providers = self.providers.write().await;
            let execution = providers
                .get_mut(name)
                .ok_or_else(|| EnsembleError::ProviderNotFound(name.to_string()))?;
            execution.enabled = enabled;
            execution.clone()
        };
        self.balancer
            .update_provider_settings(name, execution.priority, execution.weight, enabled)
            .await;
        info!("Provider '{}' {}", name, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    pub async fn provider_count(&self) -> usize {
        self.providers.read().await.len()
    }

    /// Enabled providers, by priority desc then name
    pub async fn get_available_providers(&self) -> Vec<String> {
        self.ranked_providers(|e| e.enabled).await
    }

    /// Enabled providers whose breaker is closed, by priority desc then name
    pub async fn get_healthy_providers(&self) -> Vec<String> {
        self.ranked_providers(ProviderExecution::is_healthy).await
    }

    async fn ranked_providers(&self, keep: impl Fn(&ProviderExecution) -> bool) -> Vec<String> {
        let providers = self.providers.read().await;
        let mut ranked: Vec<(&String, &ProviderExecution)> =
            providers.iter().filter(|(_, e)| keep(e)).collect();
        ranked.sort_by(|(na, a), (nb, b)| b.priority.cmp(&a.priority).then_with(|| na.cmp(nb)));
        ranked.into_iter().map(|(name, _)| name.clone()).collect()
    }

    /// Analyze `input` with every healthy provider in parallel
    ///
    /// # Parameters
    /// * `input` - What to analyze
    /// * `prompt` - Instructions for the providers
    /// * `options` - Per-call budget, generation settings and selection constraints
    ///
    /// # Returns
    /// * A response built from the providers that succeeded, or the
    ///   whole-request error (`InsufficientProviders`, `AllProvidersFailed`,
    ///   `NoProvidersAvailable`)
    pub async fn analyze_with_ensemble(
        &self,
        input: &AnalysisInput,
        prompt: &str,
        options: &EnsembleOptions,
    ) -> EnsembleResult<EnsembleResponse> {
        let started = Instant::now();
        let id = Uuid::new_v4().to_string();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let result = self.run_ensemble(id, input, prompt, options, started).await;

        match &result {
            Ok(_) => {
                self.successful_requests.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
                warn!("Ensemble call failed after {:?}: {}", started.elapsed(), e);
            }
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record_ensemble(result.is_ok(), started.elapsed());

        result
    }

    async fn run_ensemble(
        &self,
        id: String,
        input: &AnalysisInput,
        prompt: &str,
        options: &EnsembleOptions,
        started: Instant,
    ) -> EnsembleResult<EnsembleResponse> {
        let config = self.config.read().await.clone();
        let required = config.orchestrator.min_providers_required;

        let healthy = self.get_healthy_providers().await;
        if healthy.len() < required {
            return Err(EnsembleError::InsufficientProviders {
                required,
                available: healthy.len(),
            });
        }

        let (targets, selection_reasoning) = if config.orchestrator.enable_load_balancing {
            let selection = self
                .balancer
                .select_providers(options.provider_count, &options.selection)
                .await?;
            let targets: Vec<String> = selection
                .selected_providers
                .into_iter()
                .filter(|name| healthy.contains(name))
                .collect();
            if targets.len() < required {
                return Err(EnsembleError::InsufficientProviders {
                    required,
                    available: targets.len(),
                });
            }
            (targets, Some(selection.reasoning))
        } else {
            (healthy, None)
        };

        debug!("Ensemble {} dispatching to {:?}", id, targets);

        let mut analysis_options = options.analysis_options();
        analysis_options.timeout = Some(options.timeout.unwrap_or(config.orchestrator.max_total_timeout()));

        let dispatches = targets
            .iter()
            .map(|name| self.dispatch(name, input, prompt, &analysis_options, &config));
        let outcomes: Vec<ProviderOutcome> = join_all(dispatches).await;

        let (total_registered, circuit_breaker_status) = {
            let providers = self.providers.read().await;
            let status: HashMap<String, BreakerState> = providers
                .iter()
                .map(|(name, e)| (name.clone(), BreakerState::of(&*e.circuit_breaker)))
                .collect();
            (providers.len(), status)
        };

        let context = AggregationContext {
            settings: config.aggregation.clone(),
            total_registered,
            circuit_breaker_status,
            selection_reasoning,
        };
        aggregation::build_ensemble_response(id, outcomes, started, context)
    }

    /// Run one provider call with breaker, timeout and error classification
    ///
    /// # Returns
    /// * The provider's response, or a structured provider error
    pub async fn execute_with_provider(
        &self,
        name: &str,
        input: &AnalysisInput,
        prompt: &str,
        options: &AnalysisOptions,
    ) -> EnsembleResult<ProviderResponse> {
        let config = self.config.read().await.clone();
        self.dispatch(name, input, prompt, options, &config).await.result
    }

    async fn dispatch(
        &self,
        name: &str,
        input: &AnalysisInput,
        prompt: &str,
        options: &AnalysisOptions,
        config: &EnsembleConfig,
    ) -> ProviderOutcome {
        let started = Instant::now();
        let outcome = |result: EnsembleResult<ProviderResponse>, cost: f64| ProviderOutcome {
            provider: name.to_string(),
            elapsed: started.elapsed(),
            result,
            cost,
        };

        let execution = match self.providers.read().await.get(name).cloned() {
            Some(execution) => execution,
            None => return outcome(Err(EnsembleError::ProviderNotFound(name.to_string())), 0.0),
        };

        if execution.circuit_breaker.is_open() {
            warn!("Provider '{}' rejected: circuit breaker open", name);
            let err = EnsembleError::CircuitBreakerOpen(name.to_string());
            #[cfg(feature = "metrics")]
            crate::metrics::record_provider_failure(name, &err, started.elapsed());
            return outcome(Err(err), 0.0);
        }

        let caller_timeout = options.timeout.unwrap_or(config.orchestrator.max_total_timeout());
        let timeout = caller_timeout.min(config.orchestrator.max_provider_timeout());
        let call_options = AnalysisOptions {
            timeout: Some(timeout),
            ..options.clone()
        };

        let tracking = if config.monitoring.enable_performance_tracking {
            Some(self.balancer.begin_execution(name).await)
        } else {
            None
        };

        let raced = tokio::time::timeout(timeout, execution.provider.analyze(input, prompt, &call_options)).await;
        let elapsed = started.elapsed();

        let (result, cost) = match raced {
            Ok(Ok(response)) => {
                execution.circuit_breaker.record_success();
                let cost = execution.provider.get_cost(response.tokens_used);
                debug!(
                    "Provider '{}' answered in {:?} ({} tokens, ${:.5})",
                    name, elapsed, response.tokens_used, cost
                );
                (Ok(response), cost)
            }
            Ok(Err(e)) => {
                execution.circuit_breaker.record_failure();
                let err = EnsembleError::classify(name, elapsed, timeout, e);
                warn!("Provider '{}' failed after {:?}: {}", name, elapsed, err);
                (Err(err), 0.0)
            }
            Err(_) => {
                execution.circuit_breaker.record_failure();
                warn!("Provider '{}' timed out after {:?}", name, timeout);
                (
                    Err(EnsembleError::ProviderTimeout {
                        provider: name.to_string(),
                        timeout,
                        elapsed,
                    }),
                    0.0,
                )
            }
        };

        if let Some(guard) = tracking {
            let tokens = result.as_ref().map(|r| r.tokens_used).unwrap_or(0);
            guard
                .finish(elapsed.as_secs_f64() * 1000.0, result.is_ok(), tokens, cost)
                .await;
        }

        #[cfg(feature = "metrics")]
        {
            match &result {
                Ok(response) => crate::metrics::record_provider_success(
                    name,
                    &response.model,
                    elapsed,
                    response.tokens_used,
                    cost,
                ),
                Err(e) => crate::metrics::record_provider_failure(name, e, elapsed),
            }
        }

        ProviderOutcome {
            provider: name.to_string(),
            elapsed,
            result,
            cost,
        }
    }

    /// Health-check every registered provider concurrently
    ///
    /// With health checks enabled the sweep goes through the load balancer so
    /// its availability data is refreshed too. Errors and timeouts count as
    /// unhealthy.
    pub async fn perform_health_check(&self) -> HashMap<String, bool> {
        let (enabled, timeout) = {
            let config = self.config.read().await;
            (config.monitoring.enable_health_checks, config.balancer.health_check_timeout())
        };
        if enabled {
            return self.balancer.update_health_status().await;
        }

        let executions: Vec<(String, ProviderExecution)> = {
            let providers = self.providers.read().await;
            providers.iter().map(|(n, e)| (n.clone(), e.clone())).collect()
        };

        let checks = executions.into_iter().map(|(name, execution)| async move {
            let healthy = matches!(
                tokio::time::timeout(timeout, execution.provider.health_check()).await,
                Ok(Ok(true))
            );
            (name, healthy)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Run `perform_health_check` every monitoring interval
    ///
    /// The task stops once the orchestrator is dropped or health checks are
    /// disabled.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let interval = match weak.upgrade() {
                    Some(orchestrator) => {
                        let config = orchestrator.config.read().await;
                        if !config.monitoring.enable_health_checks {
                            break;
                        }
                        config.monitoring.health_check_interval()
                    }
                    None => break,
                };
                tokio::time::sleep(interval).await;

                let Some(orchestrator) = weak.upgrade() else { break };
                let results = orchestrator.perform_health_check().await;
                let unhealthy: Vec<&String> =
                    results.iter().filter(|(_, healthy)| !**healthy).map(|(name, _)| name).collect();
                if !unhealthy.is_empty() {
                    warn!("Health monitor: unhealthy providers {:?}", unhealthy);
                }
            }
            debug!("Health monitor stopped");
        })
    }

    pub async fn get_statistics(&self) -> OrchestratorStatistics {
        let mut providers: Vec<ProviderStatus> = {
            let registry = self.providers.read().await;
            registry
                .iter()
                .map(|(name, e)| ProviderStatus {
                    name: name.clone(),
                    enabled: e.enabled,
                    priority: e.priority,
                    weight: e.weight,
                    circuit_breaker: BreakerState::of(&*e.circuit_breaker),
                })
                .collect()
        };
        providers.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

        OrchestratorStatistics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            registered_providers: providers.len(),
            available_providers: providers.iter().filter(|p| p.enabled).count(),
            healthy_providers: providers
                .iter()
                .filter(|p| p.enabled && p.circuit_breaker == BreakerState::Closed)
                .count(),
            providers,
            load_balancer: self.balancer.get_statistics().await,
        }
    }

    /// Apply a partial configuration update
    ///
    /// The merged configuration is validated before anything changes.
    /// Provider entries are applied to live registrations and balancer
    /// settings are forwarded to the load balancer.
    pub async fn update_config(&self, update: EnsembleConfigUpdate) -> EnsembleResult<()> {
        let new_config = {
            let mut config = self.config.write().await;
            let mut merged = config.clone();
            update.apply_to(&mut merged);
            config::validate_config(&merged)?;
            *config = merged.clone();
            merged
        };

        for (name, settings) in &update.providers {
            let updated = {
                let mut providers = self.providers.write().await;
                match providers.get_mut(name) {
                    Some(execution) => {
                        execution.priority = settings.priority;
                        execution.weight = settings.weight;
                        execution.enabled = settings.enabled;
                        true
                    }
                    None => false,
                }
            };
            if updated {
                self.balancer
                    .update_provider_settings(name, settings.priority, settings.weight, settings.enabled)
                    .await;
                debug!("Applied updated settings to provider '{}'", name);
            }
        }

        if update.balancer.is_some() || update.enable_health_checks.is_some() {
            self.balancer.update_config(new_config.effective_balancer_config()).await;
        }

        info!("Ensemble configuration updated");
        Ok(())
    }
}

impl Default for EnsembleOrchestrator {
    fn default() -> Self {
        Self::new(EnsembleConfig::default())
    }
}
