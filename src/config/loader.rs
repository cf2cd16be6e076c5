//! Configuration file loading and environment variable resolution.

use std::env;
use std::fs;
use std::path::Path;
use regex::Regex;

use crate::errors::{EnsembleError, EnsembleResult};
use super::types::EnsembleConfig;

/// Load and parse a TOML configuration file.
///
/// # Arguments
/// * `path` - Path to the TOML configuration file
///
/// # Returns
/// * `EnsembleResult<EnsembleConfig>` - Parsed and validated configuration
///
/// # Example
/// ```no_run
/// use llm_ensemble::config::load_config;
///
/// let config = load_config("ensemble.toml").unwrap();
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> EnsembleResult<EnsembleConfig> {
    let path = path.as_ref();

    let content = fs::read_to_string(path).map_err(|e| {
        EnsembleError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parse a TOML configuration string.
///
/// `${VAR_NAME}` references anywhere in the text are replaced with the
/// value of the environment variable before parsing.
pub fn parse_config(content: &str) -> EnsembleResult<EnsembleConfig> {
    let resolved = resolve_env_vars(content)?;

    let config: EnsembleConfig = toml::from_str(&resolved).map_err(|e| {
        EnsembleError::ConfigError(format!("Failed to parse TOML: {}", e))
    })?;

    validate_config(&config)?;

    Ok(config)
}

/// Resolve environment variable references in the raw configuration text.
fn resolve_env_vars(content: &str) -> EnsembleResult<String> {
    let env_var_pattern = Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| EnsembleError::ConfigError(format!("Invalid env var pattern: {}", e)))?;

    if !env_var_pattern.is_match(content) {
        return Ok(content.to_string());
    }

    let mut result = content.to_string();
    for caps in env_var_pattern.captures_iter(content) {
        let (Some(full_match), Some(var_name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        match env::var(var_name.as_str()) {
            Ok(value) => {
                result = result.replace(full_match.as_str(), &value);
            }
            Err(_) => {
                return Err(EnsembleError::ConfigError(format!(
                    "Environment variable '{}' not found\n  \
                     → Set it with: export {}=\"your-value\"",
                    var_name.as_str(),
                    var_name.as_str()
                )));
            }
        }
    }

    Ok(result)
}

/// Validate the configuration for consistency.
pub fn validate_config(config: &EnsembleConfig) -> EnsembleResult<()> {
    let orchestrator = &config.orchestrator;
    if orchestrator.max_total_timeout_ms == 0 || orchestrator.max_provider_timeout_ms == 0 {
        return Err(EnsembleError::ConfigError(
            "Timeouts must be greater than zero\n  \
             → Check orchestrator.max_total_timeout_ms and orchestrator.max_provider_timeout_ms"
                .to_string(),
        ));
    }
    if orchestrator.min_providers_required == 0 {
        return Err(EnsembleError::ConfigError(
            "orchestrator.min_providers_required must be at least 1".to_string(),
        ));
    }

    let aggregation = &config.aggregation;
    check_unit_interval("aggregation.consensus_threshold", aggregation.consensus_threshold)?;
    check_unit_interval(
        "aggregation.component_clustering_threshold",
        aggregation.component_clustering_threshold,
    )?;
    let weighting = &aggregation.confidence_weighting;
    check_weights(
        "aggregation.confidence_weighting",
        &[weighting.agreement, weighting.completeness, weighting.consistency],
    )?;

    let balancer = &config.balancer;
    if balancer.performance_window_size == 0 {
        return Err(EnsembleError::ConfigError(
            "balancer.performance_window_size must be at least 1".to_string(),
        ));
    }
    check_weights(
        "balancer weighting",
        &[
            balancer.performance_weighting,
            balancer.cost_weighting,
            balancer.availability_weighting,
        ],
    )?;

    for (name, provider) in &config.providers {
        if !provider.weight.is_finite() || provider.weight < 0.0 {
            return Err(EnsembleError::ConfigError(format!(
                "Provider '{}' has invalid weight {}\n  \
                 → Weights must be finite and non-negative",
                name, provider.weight
            )));
        }
    }

    Ok(())
}

fn check_unit_interval(field: &str, value: f64) -> EnsembleResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EnsembleError::ConfigError(format!(
            "{} must be between 0 and 1, got {}",
            field, value
        )));
    }
    Ok(())
}

fn check_weights(field: &str, weights: &[f64]) -> EnsembleResult<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(EnsembleError::ConfigError(format!(
            "{} must only contain finite, non-negative weights",
            field
        )));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err(EnsembleError::ConfigError(format!(
            "{} must have a positive sum",
            field
        )));
    }
    Ok(())
}
