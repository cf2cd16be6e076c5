use std::error::Error;
use std::fmt;
use std::time::Duration;
use serde_json;

/// Custom error types for ensemble operations
#[derive(Debug)]
pub enum EnsembleError {
    /// Error reported by a provider's API
    ApiError(String),
    /// Rate limiting error
    RateLimit(String),
    /// Parsing error
    ParseError(String),
    /// Provider is disabled
    ProviderDisabled(String),
    /// Configuration error
    ConfigError(String),
    /// No provider is registered under the given name
    ProviderNotFound(String),
    /// The provider's circuit breaker rejected the call
    CircuitBreakerOpen(String),
    /// The per-call budget expired before the provider answered
    ProviderTimeout {
        provider: String,
        timeout: Duration,
        elapsed: Duration,
    },
    /// Any other provider-side failure, keeping the original cause
    ProviderAnalysisFailure {
        provider: String,
        elapsed: Duration,
        cause: Box<EnsembleError>,
    },
    /// Too few healthy providers to start an ensemble call
    InsufficientProviders { required: usize, available: usize },
    /// Every dispatched provider failed or timed out
    AllProvidersFailed { failures: Vec<(String, String)> },
    /// The load balancer had nothing to select from
    NoProvidersAvailable,
}

impl fmt::Display for EnsembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleError::ApiError(msg) => write!(f, "API error: {}", msg),
            EnsembleError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            EnsembleError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            EnsembleError::ProviderDisabled(provider) => write!(f, "Provider disabled: {}", provider),
            EnsembleError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            EnsembleError::ProviderNotFound(provider) => write!(f, "Provider not found: {}", provider),
            EnsembleError::CircuitBreakerOpen(provider) => {
                write!(f, "Circuit breaker is open for provider: {}", provider)
            }
            EnsembleError::ProviderTimeout { provider, timeout, elapsed } => write!(
                f,
                "Provider '{}' timed out after {}ms (budget {}ms)",
                provider,
                elapsed.as_millis(),
                timeout.as_millis()
            ),
            EnsembleError::ProviderAnalysisFailure { provider, elapsed, cause } => write!(
                f,
                "Provider '{}' failed after {}ms: {}",
                provider,
                elapsed.as_millis(),
                cause
            ),
            EnsembleError::InsufficientProviders { required, available } => write!(
                f,
                "Insufficient providers: {} required, {} available",
                required, available
            ),
            EnsembleError::AllProvidersFailed { failures } => {
                let details: Vec<String> = failures
                    .iter()
                    .map(|(provider, error)| format!("{}: {}", provider, error))
                    .collect();
                write!(f, "All providers failed ({})", details.join("; "))
            }
            EnsembleError::NoProvidersAvailable => write!(f, "No providers available for selection"),
        }
    }
}

impl Error for EnsembleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EnsembleError::ProviderAnalysisFailure { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

/// Convert serde_json errors to EnsembleError
impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        EnsembleError::ParseError(err.to_string())
    }
}

/// Convert std::io::Error to EnsembleError
impl From<std::io::Error> for EnsembleError {
    fn from(err: std::io::Error) -> Self {
        EnsembleError::ConfigError(err.to_string())
    }
}

/// Convert toml parsing errors to EnsembleError
impl From<toml::de::Error> for EnsembleError {
    fn from(err: toml::de::Error) -> Self {
        EnsembleError::ConfigError(err.to_string())
    }
}

/// Result type alias for ensemble operations
pub type EnsembleResult<T> = Result<T, EnsembleError>;

impl EnsembleError {
    /// Whether this error already carries provider attribution and timing
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            EnsembleError::ProviderTimeout { .. }
                | EnsembleError::ProviderAnalysisFailure { .. }
                | EnsembleError::CircuitBreakerOpen(_)
                | EnsembleError::ProviderNotFound(_)
        )
    }

    /// Whether this error means the per-call budget ran out
    pub fn is_timeout(&self) -> bool {
        matches!(self, EnsembleError::ProviderTimeout { .. })
    }

    /// Re-classify a raw provider failure.
    ///
    /// Structured provider errors pass through untouched. Anything else becomes
    /// a `ProviderTimeout` when its message reports a timeout, or a
    /// `ProviderAnalysisFailure` wrapping the original error.
    pub fn classify(provider: &str, elapsed: Duration, timeout: Duration, err: EnsembleError) -> Self {
        if err.is_provider_error() {
            return err;
        }

        let msg_lower = err.to_string().to_lowercase();
        if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            return EnsembleError::ProviderTimeout {
                provider: provider.to_string(),
                timeout,
                elapsed,
            };
        }

        EnsembleError::ProviderAnalysisFailure {
            provider: provider.to_string(),
            elapsed,
            cause: Box::new(err),
        }
    }

    /// Returns RateLimit error for rate limit keywords, ApiError otherwise.
    /// Useful for provider implementations translating remote error bodies.
    pub fn from_api_message(error_message: String) -> Self {
        let msg_lower = error_message.to_lowercase();
        if msg_lower.contains("rate limit")
            || msg_lower.contains("too many requests")
            || msg_lower.contains("quota exceeded")
            || msg_lower.contains("overloaded")
            || msg_lower.contains("throttle") {
            return EnsembleError::RateLimit(error_message);
        }

        EnsembleError::ApiError(error_message)
    }
}
