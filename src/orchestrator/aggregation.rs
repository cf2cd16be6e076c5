use chrono::Utc;
use log::info;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::breaker::BreakerState;
use crate::config::AggregationSettings;
use crate::constants;
use crate::errors::{EnsembleError, EnsembleResult};
use crate::orchestrator::consensus;
use crate::orchestrator::types::{
    AggregatedAnalysis, CostBreakdown, EnsembleMetadata, EnsembleResponse, IndividualResponse,
    ModelComparison, PerformanceSummary, ProviderFailure, QualityScores,
};
use crate::providers::ProviderResponse;

/// How one dispatched provider call settled
#[derive(Debug)]
pub struct ProviderOutcome {
    pub provider: String,
    pub elapsed: Duration,
    pub result: EnsembleResult<ProviderResponse>,
    /// `get_cost(tokens_used)` of a successful call, 0 otherwise
    pub cost: f64,
}

/// Everything besides the outcomes that shapes the response
#[derive(Debug, Clone)]
pub struct AggregationContext {
    pub settings: AggregationSettings,
    pub total_registered: usize,
    pub circuit_breaker_status: HashMap<String, BreakerState>,
    pub selection_reasoning: Option<String>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64]) -> f64 {
    let avg = mean(values);
    mean(&values.iter().map(|v| (v - avg).powi(2)).collect::<Vec<_>>())
}

/// Turn settled provider outcomes into the final ensemble response
///
/// # Parameters
/// * `id` - Identifier of the ensemble call
/// * `outcomes` - One outcome per dispatched provider, in dispatch order
/// * `started` - When the ensemble call began
/// * `context` - Aggregation settings and registry snapshot
///
/// # Returns
/// * The response built from the successful subset, or `AllProvidersFailed`
pub fn build_ensemble_response(
    id: String,
    outcomes: Vec<ProviderOutcome>,
    started: Instant,
    context: AggregationContext,
) -> EnsembleResult<EnsembleResponse> {
    let providers_attempted: Vec<String> = outcomes.iter().map(|o| o.provider.clone()).collect();

    let mut individual: Vec<IndividualResponse> = Vec::new();
    let mut failures: Vec<ProviderFailure> = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(response) => individual.push(IndividualResponse {
                provider: outcome.provider,
                response,
                response_time_ms: outcome.elapsed.as_millis() as u64,
                cost: outcome.cost,
            }),
            Err(e) => failures.push(ProviderFailure {
                provider: outcome.provider,
                error: e.to_string(),
            }),
        }
    }

    if individual.is_empty() {
        return Err(EnsembleError::AllProvidersFailed {
            failures: failures.into_iter().map(|f| (f.provider, f.error)).collect(),
        });
    }

    let wall_clock = started.elapsed();
    let settings = &context.settings;
    let success_count = individual.len();

    let confidences: Vec<f64> = individual.iter().map(|r| r.response.confidence).collect();
    let avg_confidence = mean(&confidences);
    let avg_content_length = mean(
        &individual
            .iter()
            .map(|r| r.response.content.chars().count() as f64)
            .collect::<Vec<_>>(),
    );

    let quality_scores = QualityScores {
        consistency: (1.0 - variance(&confidences)).max(0.0),
        completeness: (avg_content_length / constants::COMPLETE_CONTENT_LENGTH).min(1.0),
        accuracy: avg_confidence,
    };

    let model_comparison: Vec<ModelComparison> = individual
        .iter()
        .map(|r| ModelComparison {
            provider: r.provider.clone(),
            model: r.response.model.clone(),
            response_time_ms: r.response_time_ms,
            tokens_used: r.response.tokens_used,
            confidence: r.response.confidence,
            cost: r.cost,
        })
        .collect();

    let aggregated = AggregatedAnalysis {
        primary_content: individual[0].response.content.clone(),
        primary_provider: individual[0].provider.clone(),
        model_comparison,
        quality_scores,
    };

    let consensus = consensus::build_consensus(
        &individual,
        settings.component_clustering_threshold,
        settings.consensus_threshold,
    );

    let weights = &settings.confidence_weighting;
    let completeness = if context.total_registered == 0 {
        1.0
    } else {
        (success_count as f64 / context.total_registered as f64).min(1.0)
    };
    let weight_sum = weights.agreement + weights.consistency + weights.completeness;
    let confidence = if weight_sum > 0.0 {
        (avg_confidence * weights.agreement
            + consensus.agreement_level * weights.consistency
            + completeness * weights.completeness)
            / weight_sum
    } else {
        avg_confidence
    }
    .clamp(0.0, 1.0);

    let total_cost: f64 = individual.iter().map(|r| r.cost).sum();
    let cost_breakdown = CostBreakdown {
        total: total_cost,
        input: total_cost * constants::INPUT_COST_SHARE,
        output: total_cost * constants::OUTPUT_COST_SHARE,
        vision: total_cost * constants::VISION_COST_SHARE,
        per_provider: individual.iter().map(|r| (r.provider.clone(), r.cost)).collect(),
    };

    let response_times: Vec<f64> = individual.iter().map(|r| r.response_time_ms as f64).collect();
    let wall_clock_ms = wall_clock.as_secs_f64() * 1000.0;
    let parallel_efficiency = if wall_clock_ms > 0.0 {
        response_times.iter().sum::<f64>() / (wall_clock_ms * success_count as f64)
    } else {
        0.0
    };
    let performance = PerformanceSummary {
        average_response_time_ms: mean(&response_times),
        fastest_provider: individual.iter().min_by_key(|r| r.response_time_ms).map(|r| r.provider.clone()),
        slowest_provider: individual.iter().max_by_key(|r| r.response_time_ms).map(|r| r.provider.clone()),
        parallel_efficiency,
    };

    let metadata = EnsembleMetadata {
        total_time_ms: wall_clock.as_millis() as u64,
        parallel_time_ms: individual.iter().map(|r| r.response_time_ms).max().unwrap_or(0),
        providers_attempted,
        providers_successful: individual.iter().map(|r| r.provider.clone()).collect(),
        providers_failed: failures,
        circuit_breaker_status: context.circuit_breaker_status,
        cost_breakdown,
        performance,
        selection_reasoning: context.selection_reasoning,
    };

    info!(
        "Ensemble {} completed: {}/{} providers succeeded, confidence {:.3}, cost ${:.5}",
        id,
        metadata.providers_successful.len(),
        metadata.providers_attempted.len(),
        confidence,
        total_cost
    );

    Ok(EnsembleResponse {
        id,
        individual,
        aggregated,
        consensus,
        confidence,
        metadata,
        timestamp: Utc::now(),
    })
}
