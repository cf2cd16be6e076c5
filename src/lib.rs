//! llm-ensemble coordinates simultaneous requests to multiple unreliable inference providers.
//!
//! It fans an analysis request out to several providers in parallel, tolerates
//! partial failure, and aggregates whatever succeeded into one consensus result.
//! A load balancer keeps rolling statistics per provider and adapts which
//! providers to use based on observed performance, cost and availability.
//!
//! # Features
//!
//! - **Parallel ensembles**: Settle-all fan-out with per-provider timeouts and circuit breakers
//! - **Consensus**: Voting over similar responses plus quality and confidence scores
//! - **Load balancing**: Round-robin, weighted, least-connections, fastest, cheapest or adaptive selection
//! - **Health tracking**: Throttled concurrent health sweeps feeding provider availability
//! - **Metrics**: Optional `metrics` feature emitting counters, gauges and histograms
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use llm_ensemble::{AnalysisInput, EnsembleOptions, EnsembleOrchestrator};
//! use llm_ensemble::testing::MockProvider;
//!
//! async fn example() {
//!     let orchestrator = EnsembleOrchestrator::builder()
//!         .add_provider("vision-a", Arc::new(MockProvider::new("Low contrast in header")))
//!         .priority(80)
//!         .add_provider("vision-b", Arc::new(MockProvider::new("Low contrast in header")))
//!         .build()
//!         .await
//!         .expect("Failed to build orchestrator");
//!
//!     let response = orchestrator
//!         .analyze_with_ensemble(
//!             &AnalysisInput::text("<header>...</header>"),
//!             "Review this markup for accessibility issues",
//!             &EnsembleOptions::default(),
//!         )
//!         .await
//!         .expect("Ensemble failed");
//!
//!     println!("{} (confidence {:.2})", response.consensus.consensus_content, response.confidence);
//! }
//! ```

pub mod providers;
pub mod errors;
pub mod constants;
pub mod breaker;
pub mod load_balancer;
pub mod orchestrator;
pub mod config;
pub mod testing;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use providers::{
    Provider,
    ProviderExecution,
    AnalysisInput,
    AnalysisOptions,
    MediaInput,
    ProviderResponse,
    RateLimitInfo,
};

pub use errors::{EnsembleError, EnsembleResult};

pub use breaker::{CircuitBreaker, BreakerConfig, BreakerState, ConsecutiveFailureBreaker};

pub use load_balancer::{
    ProviderLoadBalancer,
    ProviderMetrics,
    SelectionOptions,
    SelectionResult,
    SelectionStrategy,
    ExpectedPerformance,
};

pub use orchestrator::{
    EnsembleBuilder,
    EnsembleOrchestrator,
    EnsembleOptions,
    EnsembleResponse,
    RegistrationOptions,
};

pub use config::{EnsembleConfig, EnsembleConfigUpdate};

#[cfg(feature = "metrics")]
pub use metrics::describe_metrics;

/// Initialize the logging system
///
/// This should be called at the start of your application in case
/// you want to activate the library's debug and info logging.
pub fn use_logging() {
    env_logger::init();
}
