use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

use crate::breaker::CircuitBreaker;
use crate::config::BalancerConfig;
use crate::constants;
use crate::errors::{EnsembleError, EnsembleResult};
use crate::load_balancer::strategies::{
    self, LoadBalancingStrategy, ProviderCandidate,
};
use crate::load_balancer::tracker::ProviderMetrics;
use crate::load_balancer::types::{
    AlternativeSelection, BalancerStatistics, ExpectedPerformance, SelectionOptions,
    SelectionResult, SelectionStrategy,
};
use crate::providers::{Provider, ProviderExecution};

/// Registry entry: the execution record plus its own metrics lock
#[derive(Clone)]
struct TrackedProvider {
    execution: ProviderExecution,
    metrics: Arc<Mutex<ProviderMetrics>>,
}

#[derive(Default)]
struct HealthSweep {
    last_started: Option<Instant>,
    last_completed: Option<DateTime<Utc>>,
}

/// Adaptive provider selection over rolling performance statistics
///
/// The registry is shared by every concurrent request. Metrics are guarded
/// per provider so updates for different providers never contend, and the
/// strategy (with its rotation state) is guarded by a single mutex.
pub struct ProviderLoadBalancer {
    providers: RwLock<HashMap<String, TrackedProvider>>,
    strategy: Mutex<Box<dyn LoadBalancingStrategy + Send + Sync>>,
    config: RwLock<BalancerConfig>,
    health_sweep: Mutex<HealthSweep>,
}

impl ProviderLoadBalancer {
    pub fn new(config: BalancerConfig) -> Self {
        let strategy = strategies::create_strategy(config.strategy, config.scoring_weights());
        Self {
            providers: RwLock::new(HashMap::new()),
            strategy: Mutex::new(strategy),
            config: RwLock::new(config),
            health_sweep: Mutex::new(HealthSweep::default()),
        }
    }

    /// Register (or replace) a provider with default priority
    ///
    /// # Parameters
    /// * `name` - Unique registry name
    /// * `provider` - The provider implementation
    /// * `breaker` - Circuit breaker guarding the provider
    /// * `weight` - Weighted round-robin share
    pub async fn register_provider(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn Provider + Send + Sync>,
        breaker: Arc<dyn CircuitBreaker + Send + Sync>,
        weight: f64,
    ) {
        let execution = ProviderExecution::new(provider, breaker).with_weight(weight);
        self.register_execution(name, execution).await;
    }

    /// Register (or replace) a fully configured execution record
    pub async fn register_execution(&self, name: impl Into<String>, execution: ProviderExecution) {
        let name = name.into();
        let window_size = self.config.read().await.performance_window_size;
        let metrics = ProviderMetrics::new(name.clone(), window_size, execution.circuit_breaker.is_open());

        let tracked = TrackedProvider {
            execution,
            metrics: Arc::new(Mutex::new(metrics)),
        };

        let replaced = self.providers.write().await.insert(name.clone(), tracked).is_some();
        if replaced {
            debug!("Load balancer re-registered provider '{}'", name);
        } else {
            debug!("Load balancer registered provider '{}'", name);
        }
    }

    /// Remove a provider and its metrics
    ///
    /// # Returns
    /// * Whether the provider was registered
    pub async fn unregister_provider(&self, name: &str) -> bool {
        let removed = self.providers.write().await.remove(name).is_some();
        if removed {
            debug!("Load balancer unregistered provider '{}'", name);
        }
        removed
    }

    /// Change the scheduling settings of a registered provider, keeping its metrics
    pub async fn update_provider_settings(&self, name: &str, priority: i32, weight: f64, enabled: bool) -> bool {
        let mut providers = self.providers.write().await;
        match providers.get_mut(name) {
            Some(tracked) => {
                tracked.execution.priority = priority;
                tracked.execution.weight = weight;
                tracked.execution.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub async fn provider_count(&self) -> usize {
        self.providers.read().await.len()
    }

    pub async fn strategy(&self) -> SelectionStrategy {
        self.config.read().await.strategy
    }

    /// Switch the selection algorithm; rotation state starts over
    pub async fn set_strategy(&self, strategy: SelectionStrategy) {
        let weights = {
            let mut config = self.config.write().await;
            config.strategy = strategy;
            config.scoring_weights()
        };
        *self.strategy.lock().await = strategies::create_strategy(strategy, weights);
        info!("Load balancer strategy set to {}", strategy);
    }

    pub async fn config(&self) -> BalancerConfig {
        self.config.read().await.clone()
    }

    /// Replace the balancer configuration
    ///
    /// The strategy object is rebuilt when the strategy or its weights change.
    /// A new window size applies to providers registered afterwards.
    pub async fn update_config(&self, new_config: BalancerConfig) {
        let rebuild = {
            let mut config = self.config.write().await;
            let rebuild = config.strategy != new_config.strategy
                || config.scoring_weights() != new_config.scoring_weights();
            *config = new_config.clone();
            rebuild
        };
        if rebuild {
            *self.strategy.lock().await =
                strategies::create_strategy(new_config.strategy, new_config.scoring_weights());
        }
    }

    /// Answer "which providers should handle this request, and why"
    ///
    /// # Parameters
    /// * `count` - Number of providers wanted, `None` for every available one
    /// * `options` - Exclusions, requirements and adaptive ceilings
    ///
    /// # Returns
    /// * The selection, or `NoProvidersAvailable` when nothing is eligible
    pub async fn select_providers(
        &self,
        count: Option<usize>,
        options: &SelectionOptions,
    ) -> EnsembleResult<SelectionResult> {
        self.refresh_health_if_due().await;

        let candidates = self.available_candidates(options).await;
        if candidates.is_empty() {
            warn!("Load balancer has no available providers");
            return Err(EnsembleError::NoProvidersAvailable);
        }

        let target = match count {
            None => candidates.len(),
            Some(n) => n.min(candidates.len()),
        };

        let (kind, selection) = {
            let mut strategy = self.strategy.lock().await;
            (strategy.kind(), strategy.select_providers(&candidates, target, options))
        };

        // A strategy can only hand back available names, once each
        let mut selected: Vec<String> = Vec::with_capacity(selection.providers.len());
        for name in selection.providers {
            if candidates.iter().any(|c| c.name == name) && !selected.contains(&name) {
                selected.push(name);
            }
        }

        let mut reasoning = selection.reasoning;
        let mut required_added = Vec::new();
        for required in &options.require_providers {
            if candidates.iter().any(|c| &c.name == required) && !selected.contains(required) {
                selected.push(required.clone());
                required_added.push(required.clone());
            }
        }
        if !required_added.is_empty() {
            reasoning.push_str(&format!("; added required providers: {}", required_added.join(", ")));
        }

        let expected_performance = expected_for(&selected, &candidates);
        let alternatives = build_alternatives(&candidates, target, &selected, &expected_performance);

        #[cfg(feature = "metrics")]
        crate::metrics::record_selection(kind.as_str());

        info!(
            "Selected {:?} with {} strategy (expected success probability {:.3})",
            selected, kind, expected_performance.success_probability
        );

        Ok(SelectionResult {
            selected_providers: selected,
            reasoning,
            expected_performance,
            alternatives,
        })
    }

    /// Mark the start of a dispatch to `name`
    pub async fn record_execution_start(&self, name: &str) {
        let Some(tracked) = self.tracked(name).await else {
            debug!("Ignoring execution start for unknown provider '{}'", name);
            return;
        };
        let mut metrics = tracked.metrics.lock().await;
        metrics.record_start();

        #[cfg(feature = "metrics")]
        crate::metrics::set_active_connections(name, metrics.active_connections);
    }

    /// Mark the start of a dispatch and return the guard that completes it
    ///
    /// The guard must be finished with the call's outcome. If it is dropped
    /// first (the dispatching future was cancelled) a failed execution is
    /// recorded instead, so the active connection is released exactly once.
    pub async fn begin_execution(self: &Arc<Self>, name: &str) -> ExecutionGuard {
        self.record_execution_start(name).await;
        ExecutionGuard {
            balancer: Arc::clone(self),
            name: name.to_string(),
            started: Instant::now(),
            finished: false,
        }
    }

    /// Record the outcome of a dispatch to `name`
    ///
    /// # Parameters
    /// * `response_time_ms` - Time the call took
    /// * `success` - Whether the call produced a response
    /// * `tokens_used` - Tokens reported by the provider
    /// * `cost` - Cost of the call in USD
    pub async fn record_execution(
        &self,
        name: &str,
        response_time_ms: f64,
        success: bool,
        tokens_used: u32,
        cost: f64,
    ) {
        let Some(tracked) = self.tracked(name).await else {
            debug!("Ignoring execution result for unknown provider '{}'", name);
            return;
        };
        let breaker_open = tracked.execution.circuit_breaker.is_open();
        let mut metrics = tracked.metrics.lock().await;
        metrics.record_result(response_time_ms, success, tokens_used, cost);
        metrics.circuit_breaker_open = breaker_open;

        #[cfg(feature = "metrics")]
        crate::metrics::set_active_connections(name, metrics.active_connections);
    }

    /// Metrics snapshots, for one provider or for all of them sorted by name
    pub async fn get_provider_metrics(&self, name: Option<&str>) -> Vec<ProviderMetrics> {
        let tracked: Vec<TrackedProvider> = {
            let providers = self.providers.read().await;
            match name {
                Some(name) => providers.get(name).cloned().into_iter().collect(),
                None => providers.values().cloned().collect(),
            }
        };

        let mut snapshots = Vec::with_capacity(tracked.len());
        for t in tracked {
            snapshots.push(t.metrics.lock().await.clone());
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Expected performance of dispatching to `names` in parallel
    ///
    /// Unknown names are ignored; an empty selection yields all zeros.
    pub async fn calculate_expected_performance(&self, names: &[String]) -> ExpectedPerformance {
        let mut snapshots = Vec::with_capacity(names.len());
        for name in names {
            if let Some(tracked) = self.tracked(name).await {
                snapshots.push(tracked.metrics.lock().await.clone());
            }
        }
        let refs: Vec<&ProviderMetrics> = snapshots.iter().collect();
        ExpectedPerformance::from_metrics(&refs)
    }

    pub async fn get_statistics(&self) -> BalancerStatistics {
        let tracked: Vec<(String, TrackedProvider)> = {
            let providers = self.providers.read().await;
            providers.iter().map(|(n, t)| (n.clone(), t.clone())).collect()
        };

        let mut enabled = 0;
        let mut available = 0;
        let mut open_circuits = 0;
        let mut active = 0;
        let mut response_times = Vec::new();
        let mut success_rates = Vec::new();
        let mut costs = Vec::new();

        for (_name, t) in &tracked {
            let breaker_open = t.execution.circuit_breaker.is_open();
            if t.execution.enabled {
                enabled += 1;
                if !breaker_open {
                    available += 1;
                }
            }
            if breaker_open {
                open_circuits += 1;
            }

            let metrics = t.metrics.lock().await;
            active += metrics.active_connections;
            if let Some(avg) = metrics.response_time.average_or_none() {
                response_times.push(avg);
            }
            if let Some(avg) = metrics.success_rate.average_or_none() {
                success_rates.push(avg);
            }
            if let Some(avg) = metrics.cost.average_or_none() {
                costs.push(avg);
            }
        }

        BalancerStatistics {
            strategy: self.strategy().await,
            total_providers: tracked.len(),
            enabled_providers: enabled,
            available_providers: available,
            open_circuits,
            total_active_connections: active,
            average_response_time: mean(&response_times),
            average_success_rate: mean(&success_rates),
            average_cost: mean(&costs),
            last_health_sweep: self.health_sweep.lock().await.last_completed,
        }
    }

    /// Health-check every provider concurrently
    ///
    /// Failures and timeouts are absorbed and recorded as unhealthy. Each
    /// provider's metrics are updated as soon as its own check settles.
    ///
    /// # Returns
    /// * Health per provider name
    pub async fn update_health_status(&self) -> HashMap<String, bool> {
        // Explicit sweeps push the next automatic one back too
        self.health_sweep.lock().await.last_started = Some(Instant::now());
        let timeout = self.config.read().await.health_check_timeout();
        let tracked: Vec<(String, TrackedProvider)> = {
            let providers = self.providers.read().await;
            providers.iter().map(|(n, t)| (n.clone(), t.clone())).collect()
        };

        let mut checks: FuturesUnordered<_> = tracked
            .into_iter()
            .map(|(name, t)| async move {
                let healthy = match tokio::time::timeout(timeout, t.execution.provider.health_check()).await {
                    Ok(Ok(healthy)) => healthy,
                    Ok(Err(e)) => {
                        warn!("Health check for '{}' failed: {}", name, e);
                        false
                    }
                    Err(_) => {
                        warn!("Health check for '{}' timed out after {:?}", name, timeout);
                        false
                    }
                };
                let rate_limit = t.execution.provider.get_rate_limit();
                let breaker_open = t.execution.circuit_breaker.is_open();
                t.metrics.lock().await.record_health(healthy, rate_limit, breaker_open);

                #[cfg(feature = "metrics")]
                crate::metrics::set_provider_health(&name, healthy);

                (name, healthy)
            })
            .collect();

        let mut results = HashMap::new();
        while let Some((name, healthy)) = checks.next().await {
            results.insert(name, healthy);
        }

        let healthy_count = results.values().filter(|h| **h).count();
        info!("Health sweep finished: {}/{} providers healthy", healthy_count, results.len());

        self.health_sweep.lock().await.last_completed = Some(Utc::now());

        results
    }

    /// Run a health sweep when the configured interval has elapsed
    async fn refresh_health_if_due(&self) {
        let (enabled, interval) = {
            let config = self.config.read().await;
            (config.enable_health_checks, config.health_check_interval())
        };
        if !enabled {
            return;
        }

        let due = {
            let mut sweep = self.health_sweep.lock().await;
            let due = match sweep.last_started {
                None => true,
                Some(started) => started.elapsed() > interval,
            };
            if due {
                // Claim the sweep so concurrent selections don't start another
                sweep.last_started = Some(Instant::now());
            }
            due
        };

        if due {
            debug!("Health sweep due, checking all providers");
            self.update_health_status().await;
        }
    }

    async fn tracked(&self, name: &str) -> Option<TrackedProvider> {
        self.providers.read().await.get(name).cloned()
    }

    /// Enabled, non-excluded, breaker-closed providers sorted by name
    async fn available_candidates(&self, options: &SelectionOptions) -> Vec<ProviderCandidate> {
        let tracked: Vec<(String, TrackedProvider)> = {
            let providers = self.providers.read().await;
            providers
                .iter()
                .filter(|(name, t)| {
                    t.execution.enabled
                        && !options.exclude_providers.contains(*name)
                        && !t.execution.circuit_breaker.is_open()
                })
                .map(|(n, t)| (n.clone(), t.clone()))
                .collect()
        };

        let mut candidates = Vec::with_capacity(tracked.len());
        for (name, t) in tracked {
            let metrics = t.metrics.lock().await.clone();
            candidates.push(ProviderCandidate {
                name,
                weight: t.execution.weight,
                metrics,
            });
        }
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        candidates
    }
}

/// An in-flight dispatch counted in its provider's active connections
pub struct ExecutionGuard {
    balancer: Arc<ProviderLoadBalancer>,
    name: String,
    started: Instant,
    finished: bool,
}

impl ExecutionGuard {
    /// Record the dispatch outcome and release the connection
    pub async fn finish(mut self, response_time_ms: f64, success: bool, tokens_used: u32, cost: f64) {
        self.balancer
            .record_execution(&self.name, response_time_ms, success, tokens_used, cost)
            .await;
        // No await between recording and this flag, so a cancelled finish
        // either recorded nothing or recorded everything
        self.finished = true;
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let response_time_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "Dispatch to '{}' abandoned after {:.0}ms, recording failure",
            self.name, response_time_ms
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let balancer = Arc::clone(&self.balancer);
                let name = std::mem::take(&mut self.name);
                handle.spawn(async move {
                    balancer.record_execution(&name, response_time_ms, false, 0, 0.0).await;
                });
            }
            Err(_) => warn!(
                "No runtime to record abandoned dispatch to '{}'; active connections left as is",
                self.name
            ),
        }
    }
}

impl Default for ProviderLoadBalancer {
    fn default() -> Self {
        Self::new(BalancerConfig::default())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn expected_for(names: &[String], candidates: &[ProviderCandidate]) -> ExpectedPerformance {
    let metrics: Vec<&ProviderMetrics> = names
        .iter()
        .filter_map(|name| candidates.iter().find(|c| &c.name == name))
        .map(|c| &c.metrics)
        .collect();
    ExpectedPerformance::from_metrics(&metrics)
}

fn same_providers(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|name| b.contains(name))
}

/// Cost-, speed- and reliability-optimized selections of the same size
fn build_alternatives(
    candidates: &[ProviderCandidate],
    count: usize,
    primary: &[String],
    primary_performance: &ExpectedPerformance,
) -> Vec<AlternativeSelection> {
    let options = [
        (
            strategies::rank_by_cost(candidates, count),
            "Cost-optimized: lowest average cost per call",
        ),
        (
            strategies::rank_by_response_time(candidates, count),
            "Speed-optimized: lowest average response time",
        ),
        (
            strategies::rank_by_success_rate(candidates, count),
            "Reliability-optimized: highest observed success rate",
        ),
    ];

    let primary_score = primary_performance.score();
    let mut alternatives: Vec<AlternativeSelection> = Vec::new();
    for (providers, reason) in options {
        if providers.is_empty()
            || same_providers(&providers, primary)
            || alternatives.iter().any(|alt| same_providers(&alt.providers, &providers))
        {
            continue;
        }

        let expected_performance = expected_for(&providers, candidates);
        let score = if primary_score > 0.0 {
            expected_performance.score() / primary_score
        } else {
            expected_performance.score()
        };

        alternatives.push(AlternativeSelection {
            providers,
            score,
            reason: reason.to_string(),
            expected_performance,
        });

        if alternatives.len() >= constants::MAX_ALTERNATIVES {
            break;
        }
    }
    alternatives
}
