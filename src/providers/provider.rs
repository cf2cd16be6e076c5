use crate::errors::EnsembleResult;
use crate::providers::types::{AnalysisInput, AnalysisOptions, ProviderResponse, RateLimitInfo};

use async_trait::async_trait;

/// Common interface for every analysis provider
///
/// This trait defines what the orchestrator and the load balancer need from
/// a remote inference service. Implementations are expected to be stateless
/// per call: a call the orchestrator stops waiting for may be dropped.
#[async_trait]
pub trait Provider {
    /// Run one analysis of `input` guided by `prompt`
    async fn analyze(
        &self,
        input: &AnalysisInput,
        prompt: &str,
        options: &AnalysisOptions,
    ) -> EnsembleResult<ProviderResponse>;
    /// Probe the provider. Errors are treated as unhealthy by callers
    async fn health_check(&self) -> EnsembleResult<bool>;
    /// Current rate-limit state
    fn get_rate_limit(&self) -> RateLimitInfo;
    /// Cost in USD for the given number of tokens
    fn get_cost(&self, tokens: u32) -> f64;
}
