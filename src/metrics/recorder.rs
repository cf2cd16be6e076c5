//! Metric recording functions

use std::time::Duration;

use crate::errors::EnsembleError;

use super::{labels, names};

/// Record a successful provider call
pub fn record_provider_success(provider: &str, model: &str, duration: Duration, tokens: u32, cost: f64) {
    metrics::counter!(
        names::PROVIDER_CALLS_TOTAL,
        labels::keys::PROVIDER => provider.to_string(),
        labels::keys::MODEL => model.to_string()
    )
    .increment(1);

    metrics::histogram!(
        names::PROVIDER_CALL_DURATION,
        labels::keys::PROVIDER => provider.to_string()
    )
    .record(duration.as_secs_f64());

    metrics::counter!(
        names::PROVIDER_TOKENS,
        labels::keys::PROVIDER => provider.to_string(),
        labels::keys::MODEL => model.to_string()
    )
    .increment(tokens as u64);

    metrics::histogram!(
        names::PROVIDER_COST,
        labels::keys::PROVIDER => provider.to_string()
    )
    .record(cost);
}

/// Record a failed provider call, including breaker rejections and timeouts
pub fn record_provider_failure(provider: &str, error: &EnsembleError, duration: Duration) {
    // Failures still count as calls
    metrics::counter!(
        names::PROVIDER_CALLS_TOTAL,
        labels::keys::PROVIDER => provider.to_string(),
        labels::keys::MODEL => "unknown".to_string()
    )
    .increment(1);

    metrics::histogram!(
        names::PROVIDER_CALL_DURATION,
        labels::keys::PROVIDER => provider.to_string()
    )
    .record(duration.as_secs_f64());

    metrics::counter!(
        names::PROVIDER_ERRORS_TOTAL,
        labels::keys::PROVIDER => provider.to_string(),
        labels::keys::ERROR_TYPE => labels::error_type_label(error).to_string()
    )
    .increment(1);
}

/// Record the outcome of a whole ensemble call
pub fn record_ensemble(success: bool, duration: Duration) {
    metrics::counter!(
        names::ENSEMBLE_REQUESTS_TOTAL,
        labels::keys::OUTCOME => labels::outcome_label(success).to_string()
    )
    .increment(1);

    metrics::histogram!(
        names::ENSEMBLE_DURATION,
        labels::keys::OUTCOME => labels::outcome_label(success).to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record one load balancer selection
pub fn record_selection(strategy: &str) {
    metrics::counter!(
        names::SELECTIONS_TOTAL,
        labels::keys::STRATEGY => strategy.to_string()
    )
    .increment(1);
}

/// Update provider health gauge
pub fn set_provider_health(provider: &str, healthy: bool) {
    metrics::gauge!(
        names::PROVIDER_HEALTHY,
        labels::keys::PROVIDER => provider.to_string()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// Update the in-flight call gauge of a provider
pub fn set_active_connections(provider: &str, active: usize) {
    metrics::gauge!(
        names::ACTIVE_CONNECTIONS,
        labels::keys::PROVIDER => provider.to_string()
    )
    .set(active as f64);
}
