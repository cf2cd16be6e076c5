//! Label helpers for consistent metric labeling

use crate::errors::EnsembleError;

/// Standard label keys
pub mod keys {
    /// Provider name label key
    pub const PROVIDER: &str = "provider";
    /// Model name label key
    pub const MODEL: &str = "model";
    /// Error type label key
    pub const ERROR_TYPE: &str = "error_type";
    /// Ensemble outcome label key
    pub const OUTCOME: &str = "outcome";
    /// Selection strategy label key
    pub const STRATEGY: &str = "strategy";
}

/// Convert EnsembleError to error type label string
pub fn error_type_label(error: &EnsembleError) -> &'static str {
    match error {
        EnsembleError::ApiError(_) => "api_error",
        EnsembleError::RateLimit(_) => "rate_limit",
        EnsembleError::ParseError(_) => "parse_error",
        EnsembleError::ProviderDisabled(_) => "provider_disabled",
        EnsembleError::ConfigError(_) => "config_error",
        EnsembleError::ProviderNotFound(_) => "provider_not_found",
        EnsembleError::CircuitBreakerOpen(_) => "circuit_breaker_open",
        EnsembleError::ProviderTimeout { .. } => "provider_timeout",
        EnsembleError::ProviderAnalysisFailure { .. } => "provider_analysis_failure",
        EnsembleError::InsufficientProviders { .. } => "insufficient_providers",
        EnsembleError::AllProvidersFailed { .. } => "all_providers_failed",
        EnsembleError::NoProvidersAvailable => "no_providers_available",
    }
}

/// Outcome label of an ensemble call
pub fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
