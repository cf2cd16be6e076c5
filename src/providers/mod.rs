//! Provider abstraction consumed by the orchestrator and the load balancer
//!
//! Concrete clients (vision or LLM API wrappers) live outside this crate and
//! implement [`Provider`]. This module holds the trait, the request and
//! response types exchanged with it, and the registry record that pairs a
//! provider with its circuit breaker.

pub mod execution;
pub mod provider;
pub mod types;

pub use execution::ProviderExecution;
pub use provider::Provider;
pub use types::{AnalysisInput, AnalysisOptions, MediaInput, ProviderResponse, RateLimitInfo};
