//! Configuration types for TOML-based configuration.
//!
//! These types map directly to the TOML configuration file structure.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::constants;
use crate::load_balancer::strategies::ScoringWeights;
use crate::load_balancer::SelectionStrategy;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct EnsembleConfig {
    /// Dispatch limits and load-balancing switch.
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Response aggregation and consensus settings.
    #[serde(default)]
    pub aggregation: AggregationSettings,

    /// Performance tracking and health check settings.
    #[serde(default)]
    pub monitoring: MonitoringSettings,

    /// Provider selection settings.
    #[serde(default)]
    pub balancer: BalancerConfig,

    /// Static per-provider defaults keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

impl EnsembleConfig {
    /// Balancer settings as the orchestrator hands them to its load balancer
    ///
    /// Balancer sweeps run only while both `[monitoring]` and `[balancer]`
    /// have health checks enabled.
    pub fn effective_balancer_config(&self) -> BalancerConfig {
        BalancerConfig {
            enable_health_checks: self.balancer.enable_health_checks && self.monitoring.enable_health_checks,
            ..self.balancer.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OrchestratorSettings {
    /// Default caller budget for one ensemble call.
    #[serde(default = "default_max_total_timeout_ms")]
    pub max_total_timeout_ms: u64,

    /// Upper bound for any single provider call.
    #[serde(default = "default_max_provider_timeout_ms")]
    pub max_provider_timeout_ms: u64,

    /// Ensemble calls fail before dispatch with fewer healthy providers.
    #[serde(default = "default_min_providers_required")]
    pub min_providers_required: usize,

    /// Ask the load balancer which providers to dispatch to.
    #[serde(default)]
    pub enable_load_balancing: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_total_timeout_ms: default_max_total_timeout_ms(),
            max_provider_timeout_ms: default_max_provider_timeout_ms(),
            min_providers_required: default_min_providers_required(),
            enable_load_balancing: false,
        }
    }
}

impl OrchestratorSettings {
    pub fn max_total_timeout(&self) -> Duration {
        Duration::from_millis(self.max_total_timeout_ms)
    }

    pub fn max_provider_timeout(&self) -> Duration {
        Duration::from_millis(self.max_provider_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AggregationSettings {
    /// Vote share a response cluster needs to become the consensus.
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,

    /// Weights of the ensemble-level confidence blend.
    #[serde(default)]
    pub confidence_weighting: ConfidenceWeighting,

    /// Similarity above which two responses count as the same answer.
    #[serde(default = "default_clustering_threshold")]
    pub component_clustering_threshold: f64,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            consensus_threshold: default_consensus_threshold(),
            confidence_weighting: ConfidenceWeighting::default(),
            component_clustering_threshold: default_clustering_threshold(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct ConfidenceWeighting {
    #[serde(default = "default_agreement_weight")]
    pub agreement: f64,
    #[serde(default = "default_completeness_weight")]
    pub completeness: f64,
    #[serde(default = "default_consistency_weight")]
    pub consistency: f64,
}

impl Default for ConfidenceWeighting {
    fn default() -> Self {
        Self {
            agreement: default_agreement_weight(),
            completeness: default_completeness_weight(),
            consistency: default_consistency_weight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MonitoringSettings {
    /// Feed every dispatch outcome to the load balancer.
    #[serde(default = "default_true")]
    pub enable_performance_tracking: bool,

    /// Run health sweeps (balancer sweeps and explicit checks).
    #[serde(default = "default_true")]
    pub enable_health_checks: bool,

    /// Interval between orchestrator-driven health checks.
    #[serde(default = "default_orchestrator_health_interval_ms")]
    pub health_check_interval_ms: u64,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            enable_performance_tracking: true,
            enable_health_checks: true,
            health_check_interval_ms: default_orchestrator_health_interval_ms(),
        }
    }
}

impl MonitoringSettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

/// Load balancer settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BalancerConfig {
    /// Selection strategy: "round_robin", "weighted_round_robin",
    /// "least_connections", "fastest_response", "lowest_cost" or "adaptive".
    #[serde(default)]
    pub strategy: SelectionStrategy,

    /// Samples kept per performance window.
    #[serde(default = "default_window_size")]
    pub performance_window_size: usize,

    #[serde(default = "default_performance_weighting")]
    pub performance_weighting: f64,

    #[serde(default = "default_cost_weighting")]
    pub cost_weighting: f64,

    #[serde(default = "default_availability_weighting")]
    pub availability_weighting: f64,

    /// Run health sweeps before selections when they are due.
    #[serde(default = "default_true")]
    pub enable_health_checks: bool,

    /// Minimum time between two health sweeps.
    #[serde(default = "default_balancer_health_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Budget for a single provider health check.
    #[serde(default = "default_health_check_timeout_ms")]
    pub health_check_timeout_ms: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::default(),
            performance_window_size: default_window_size(),
            performance_weighting: default_performance_weighting(),
            cost_weighting: default_cost_weighting(),
            availability_weighting: default_availability_weighting(),
            enable_health_checks: true,
            health_check_interval_ms: default_balancer_health_interval_ms(),
            health_check_timeout_ms: default_health_check_timeout_ms(),
        }
    }
}

impl BalancerConfig {
    /// Config using the given strategy and defaults for everything else
    pub fn with_strategy(strategy: SelectionStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        ScoringWeights {
            performance: self.performance_weighting,
            cost: self.cost_weighting,
            availability: self.availability_weighting,
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }
}

/// Static per-provider scheduling defaults.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProviderSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Higher priorities are dispatched and listed first.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Share of weighted round-robin slots.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: default_priority(),
            weight: default_weight(),
        }
    }
}

/// Partial configuration accepted by `update_config`.
///
/// `None` fields leave the current value untouched. Provider entries replace
/// the stored settings for that provider and are applied to live
/// registrations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EnsembleConfigUpdate {
    pub max_total_timeout_ms: Option<u64>,
    pub max_provider_timeout_ms: Option<u64>,
    pub min_providers_required: Option<usize>,
    pub enable_load_balancing: Option<bool>,
    pub consensus_threshold: Option<f64>,
    pub confidence_weighting: Option<ConfidenceWeighting>,
    pub component_clustering_threshold: Option<f64>,
    pub enable_performance_tracking: Option<bool>,
    pub enable_health_checks: Option<bool>,
    pub health_check_interval_ms: Option<u64>,
    pub balancer: Option<BalancerConfig>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

impl EnsembleConfigUpdate {
    /// Merge this update into `config`
    pub fn apply_to(&self, config: &mut EnsembleConfig) {
        if let Some(v) = self.max_total_timeout_ms {
            config.orchestrator.max_total_timeout_ms = v;
        }
        if let Some(v) = self.max_provider_timeout_ms {
            config.orchestrator.max_provider_timeout_ms = v;
        }
        if let Some(v) = self.min_providers_required {
            config.orchestrator.min_providers_required = v;
        }
        if let Some(v) = self.enable_load_balancing {
            config.orchestrator.enable_load_balancing = v;
        }
        if let Some(v) = self.consensus_threshold {
            config.aggregation.consensus_threshold = v;
        }
        if let Some(v) = self.confidence_weighting {
            config.aggregation.confidence_weighting = v;
        }
        if let Some(v) = self.component_clustering_threshold {
            config.aggregation.component_clustering_threshold = v;
        }
        if let Some(v) = self.enable_performance_tracking {
            config.monitoring.enable_performance_tracking = v;
        }
        if let Some(v) = self.enable_health_checks {
            config.monitoring.enable_health_checks = v;
        }
        if let Some(v) = self.health_check_interval_ms {
            config.monitoring.health_check_interval_ms = v;
        }
        if let Some(ref v) = self.balancer {
            config.balancer = v.clone();
        }
        for (name, settings) in &self.providers {
            config.providers.insert(name.clone(), settings.clone());
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_total_timeout_ms() -> u64 {
    constants::DEFAULT_MAX_TOTAL_TIMEOUT_MS
}

fn default_max_provider_timeout_ms() -> u64 {
    constants::DEFAULT_MAX_PROVIDER_TIMEOUT_MS
}

fn default_min_providers_required() -> usize {
    constants::DEFAULT_MIN_PROVIDERS_REQUIRED
}

fn default_consensus_threshold() -> f64 {
    constants::DEFAULT_CONSENSUS_THRESHOLD
}

fn default_clustering_threshold() -> f64 {
    constants::DEFAULT_CLUSTERING_THRESHOLD
}

fn default_agreement_weight() -> f64 {
    constants::DEFAULT_AGREEMENT_WEIGHT
}

fn default_completeness_weight() -> f64 {
    constants::DEFAULT_COMPLETENESS_WEIGHT
}

fn default_consistency_weight() -> f64 {
    constants::DEFAULT_CONSISTENCY_WEIGHT
}

fn default_orchestrator_health_interval_ms() -> u64 {
    constants::DEFAULT_ORCHESTRATOR_HEALTH_CHECK_INTERVAL_MS
}

fn default_window_size() -> usize {
    constants::DEFAULT_PERFORMANCE_WINDOW_SIZE
}

fn default_performance_weighting() -> f64 {
    constants::DEFAULT_PERFORMANCE_WEIGHTING
}

fn default_cost_weighting() -> f64 {
    constants::DEFAULT_COST_WEIGHTING
}

fn default_availability_weighting() -> f64 {
    constants::DEFAULT_AVAILABILITY_WEIGHTING
}

fn default_balancer_health_interval_ms() -> u64 {
    constants::DEFAULT_BALANCER_HEALTH_CHECK_INTERVAL_MS
}

fn default_health_check_timeout_ms() -> u64 {
    constants::DEFAULT_HEALTH_CHECK_TIMEOUT_MS
}

fn default_priority() -> i32 {
    constants::DEFAULT_PROVIDER_PRIORITY
}

fn default_weight() -> f64 {
    constants::DEFAULT_PROVIDER_WEIGHT
}
