use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::breaker::BreakerState;
use crate::load_balancer::{BalancerStatistics, SelectionOptions};
use crate::providers::{AnalysisOptions, ProviderResponse};

/// Per-call options for `analyze_with_ensemble`
#[derive(Debug, Clone, Default)]
pub struct EnsembleOptions {
    /// Caller budget per provider call; defaults to the configured total timeout
    pub timeout: Option<Duration>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Providers to ask the load balancer for, `None` for all of them
    pub provider_count: Option<usize>,
    /// Constraints forwarded to the load balancer
    pub selection: SelectionOptions,
}

impl EnsembleOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_provider_count(mut self, count: usize) -> Self {
        self.provider_count = Some(count);
        self
    }

    pub fn with_selection(mut self, selection: SelectionOptions) -> Self {
        self.selection = selection;
        self
    }

    /// Provider-facing options for one call
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// Explicit registration settings; unset fields fall back to the provider's
/// config entry, then to the crate defaults
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegistrationOptions {
    pub priority: Option<i32>,
    pub weight: Option<f64>,
    pub enabled: Option<bool>,
}

impl RegistrationOptions {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

/// One provider's successful answer within an ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndividualResponse {
    pub provider: String,
    pub response: ProviderResponse,
    /// Measured by the orchestrator, including dispatch overhead
    pub response_time_ms: u64,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub provider: String,
    pub model: String,
    pub response_time_ms: u64,
    pub tokens_used: u32,
    pub confidence: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    /// `max(0, 1 - variance(confidences))`
    pub consistency: f64,
    /// Average content length relative to a complete answer, capped at 1
    pub completeness: f64,
    /// Mean confidence, in the absence of ground truth
    pub accuracy: f64,
}

/// Canonical answer plus a side-by-side view of every successful provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedAnalysis {
    pub primary_content: String,
    pub primary_provider: String,
    pub model_comparison: Vec<ModelComparison>,
    pub quality_scores: QualityScores,
}

/// A group of responses that say substantially the same thing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingResult {
    /// Content of the first response in the cluster
    pub content: String,
    pub providers: Vec<String>,
    /// Sum of member confidences
    pub votes: f64,
    /// Fraction of all votes held by this cluster
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disagreement {
    pub provider: String,
    pub content: String,
    /// Word-set similarity to the consensus content
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub agreement_level: f64,
    pub consensus_content: String,
    pub disagreements: Vec<Disagreement>,
    pub voting_results: Vec<VotingResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: f64,
    pub input: f64,
    pub output: f64,
    pub vision: f64,
    pub per_provider: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub average_response_time_ms: f64,
    pub fastest_provider: Option<String>,
    pub slowest_provider: Option<String>,
    /// Work done relative to wall-clock time spent
    pub parallel_efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleMetadata {
    /// Wall-clock time of the whole call
    pub total_time_ms: u64,
    /// Longest individual call, the critical path of the fan-out
    pub parallel_time_ms: u64,
    pub providers_attempted: Vec<String>,
    pub providers_successful: Vec<String>,
    pub providers_failed: Vec<ProviderFailure>,
    pub circuit_breaker_status: HashMap<String, BreakerState>,
    pub cost_breakdown: CostBreakdown,
    pub performance: PerformanceSummary,
    /// Load balancer explanation, when it picked the providers
    pub selection_reasoning: Option<String>,
}

/// Result of one ensemble call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResponse {
    pub id: String,
    pub individual: Vec<IndividualResponse>,
    pub aggregated: AggregatedAnalysis,
    pub consensus: ConsensusResult,
    /// Ensemble-level confidence in [0, 1]
    pub confidence: f64,
    pub metadata: EnsembleMetadata,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub name: String,
    pub enabled: bool,
    pub priority: i32,
    pub weight: f64,
    pub circuit_breaker: BreakerState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatistics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub registered_providers: usize,
    pub available_providers: usize,
    pub healthy_providers: usize,
    /// Sorted by priority desc, then name
    pub providers: Vec<ProviderStatus>,
    pub load_balancer: BalancerStatistics,
}
