use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EnsembleError;
use crate::load_balancer::tracker::ProviderMetrics;

/// Provider selection algorithm used by the load balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    FastestResponse,
    LowestCost,
    #[default]
    Adaptive,
}

impl SelectionStrategy {
    pub const ALL: [SelectionStrategy; 6] = [
        SelectionStrategy::RoundRobin,
        SelectionStrategy::WeightedRoundRobin,
        SelectionStrategy::LeastConnections,
        SelectionStrategy::FastestResponse,
        SelectionStrategy::LowestCost,
        SelectionStrategy::Adaptive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::RoundRobin => "round_robin",
            SelectionStrategy::WeightedRoundRobin => "weighted_round_robin",
            SelectionStrategy::LeastConnections => "least_connections",
            SelectionStrategy::FastestResponse => "fastest_response",
            SelectionStrategy::LowestCost => "lowest_cost",
            SelectionStrategy::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SelectionStrategy {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        SelectionStrategy::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = SelectionStrategy::ALL.iter().map(|s| s.as_str()).collect();
                EnsembleError::ConfigError(format!(
                    "Unknown strategy '{}'\n  \
                     → Valid strategies: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Caller constraints for one selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Never select these providers
    pub exclude_providers: Vec<String>,
    /// Always add these providers when they are available
    pub require_providers: Vec<String>,
    /// Maximum acceptable average cost in USD (adaptive strategy)
    pub max_cost: Option<f64>,
    /// Maximum acceptable average response time in ms (adaptive strategy)
    pub max_response_time: Option<f64>,
}

impl SelectionOptions {
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude_providers.push(name.into());
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.require_providers.push(name.into());
        self
    }

    pub fn max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    pub fn max_response_time(mut self, millis: f64) -> Self {
        self.max_response_time = Some(millis);
        self
    }
}

/// Predicted behavior of a set of providers dispatched in parallel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExpectedPerformance {
    pub average_response_time: f64,
    pub total_cost: f64,
    pub success_probability: f64,
}

impl ExpectedPerformance {
    /// Combine the provider statistics of a selection
    ///
    /// Success probability treats providers as independent parallel attempts:
    /// the selection succeeds if at least one of them would.
    pub fn from_metrics(metrics: &[&ProviderMetrics]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }

        let average_response_time = metrics
            .iter()
            .map(|m| m.response_time.average)
            .sum::<f64>()
            / metrics.len() as f64;
        let total_cost = metrics.iter().map(|m| m.cost.average).sum::<f64>();
        let failure_probability = metrics
            .iter()
            .map(|m| 1.0 - m.success_rate.average)
            .product::<f64>();

        Self {
            average_response_time,
            total_cost,
            success_probability: 1.0 - failure_probability,
        }
    }

    /// Single figure used to compare selections with each other
    pub fn score(&self) -> f64 {
        let speed = 1.0 / (1.0 + self.average_response_time / crate::constants::RESPONSE_TIME_REFERENCE_MS);
        let cost = (crate::constants::REFERENCE_COST_USD
            / self.total_cost.max(crate::constants::MIN_COST_USD))
            .min(1.0);
        (self.success_probability + speed + cost) / 3.0
    }
}

/// Another selection the caller could have made
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeSelection {
    pub providers: Vec<String>,
    /// Score relative to the primary selection (1.0 = equally good)
    pub score: f64,
    pub reason: String,
    pub expected_performance: ExpectedPerformance,
}

/// Answer to "which providers should handle this request, and why"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_providers: Vec<String>,
    pub reasoning: String,
    pub expected_performance: ExpectedPerformance,
    pub alternatives: Vec<AlternativeSelection>,
}

/// Aggregate view over every provider known to the balancer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerStatistics {
    pub strategy: SelectionStrategy,
    pub total_providers: usize,
    pub enabled_providers: usize,
    pub available_providers: usize,
    pub open_circuits: usize,
    pub total_active_connections: usize,
    pub average_response_time: f64,
    pub average_success_rate: f64,
    pub average_cost: f64,
    pub last_health_sweep: Option<DateTime<Utc>>,
}
