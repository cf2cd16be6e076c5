//! Metrics module for llm-ensemble
//!
//! This module provides optional metrics emission for monitoring ensemble
//! calls and provider selection. Enable with the `metrics` feature flag.
//!
//! # Example
//!
//! ```ignore
//! use llm_ensemble::metrics::describe_metrics;
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! // User sets up their preferred exporter
//! // Note: requires `metrics-exporter-prometheus` in your dependencies
//! PrometheusBuilder::new()
//!     .with_http_listener(([127, 0, 0, 1], 9090))
//!     .install()
//!     .expect("prometheus setup");
//!
//! // Describe metrics (optional, improves Prometheus discovery)
//! describe_metrics();
//! ```

pub mod labels;
mod recorder;

pub use recorder::*;

/// Metric name constants
pub mod names {
    /// Total number of ensemble calls by outcome
    pub const ENSEMBLE_REQUESTS_TOTAL: &str = "ensemble_requests_total";
    /// Ensemble call duration in seconds
    pub const ENSEMBLE_DURATION: &str = "ensemble_request_duration_seconds";
    /// Total number of provider calls
    pub const PROVIDER_CALLS_TOTAL: &str = "ensemble_provider_calls_total";
    /// Provider call duration in seconds
    pub const PROVIDER_CALL_DURATION: &str = "ensemble_provider_call_duration_seconds";
    /// Total tokens reported by providers
    pub const PROVIDER_TOKENS: &str = "ensemble_provider_tokens_total";
    /// Cost of individual provider calls in USD
    pub const PROVIDER_COST: &str = "ensemble_provider_cost_usd";
    /// Total number of provider errors by type
    pub const PROVIDER_ERRORS_TOTAL: &str = "ensemble_provider_errors_total";
    /// Provider health status (1=healthy, 0=unhealthy)
    pub const PROVIDER_HEALTHY: &str = "ensemble_provider_healthy";
    /// In-flight calls per provider
    pub const ACTIVE_CONNECTIONS: &str = "ensemble_provider_active_connections";
    /// Total number of load balancer selections by strategy
    pub const SELECTIONS_TOTAL: &str = "ensemble_selections_total";
}

/// Describe all metrics with their units and descriptions.
/// Call this after setting up your metrics exporter for better discovery.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

    describe_counter!(
        names::ENSEMBLE_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of ensemble calls by outcome"
    );
    describe_histogram!(
        names::ENSEMBLE_DURATION,
        Unit::Seconds,
        "Ensemble call duration in seconds"
    );
    describe_counter!(
        names::PROVIDER_CALLS_TOTAL,
        Unit::Count,
        "Total number of provider calls"
    );
    describe_histogram!(
        names::PROVIDER_CALL_DURATION,
        Unit::Seconds,
        "Provider call duration in seconds"
    );
    describe_counter!(
        names::PROVIDER_TOKENS,
        Unit::Count,
        "Total tokens reported by providers"
    );
    describe_histogram!(
        names::PROVIDER_COST,
        "Cost of individual provider calls in USD"
    );
    describe_counter!(
        names::PROVIDER_ERRORS_TOTAL,
        Unit::Count,
        "Total number of provider errors by type"
    );
    describe_gauge!(
        names::PROVIDER_HEALTHY,
        Unit::Count,
        "Provider health status (1=healthy, 0=unhealthy)"
    );
    describe_gauge!(
        names::ACTIVE_CONNECTIONS,
        Unit::Count,
        "In-flight calls per provider"
    );
    describe_counter!(
        names::SELECTIONS_TOTAL,
        Unit::Count,
        "Total number of load balancer selections by strategy"
    );
}
