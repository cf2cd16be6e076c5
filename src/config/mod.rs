//! Configuration module for TOML-based ensemble configuration.
//!
//! Providers are live objects and are registered in code; this module
//! covers everything else: dispatch limits, aggregation weights, health
//! monitoring, load-balancer tuning and static per-provider defaults.
//!
//! # Example Configuration File
//!
//! ```toml
//! [orchestrator]
//! max_provider_timeout_ms = 20000
//! min_providers_required = 2
//! enable_load_balancing = true
//!
//! [aggregation.confidence_weighting]
//! agreement = 0.5
//! completeness = 0.2
//! consistency = 0.3
//!
//! [balancer]
//! strategy = "adaptive"
//! performance_window_size = 50
//!
//! [providers.openai]
//! priority = 80
//! weight = 2.0
//! ```
//!
//! # Environment Variables
//!
//! Any value can reference an environment variable using the `${VAR_NAME}`
//! syntax. These are resolved at load time.

mod types;
mod loader;

pub use types::{
    EnsembleConfig, EnsembleConfigUpdate, OrchestratorSettings, AggregationSettings,
    ConfidenceWeighting, MonitoringSettings, BalancerConfig, ProviderSettings,
};
pub use loader::{load_config, parse_config, validate_config};
