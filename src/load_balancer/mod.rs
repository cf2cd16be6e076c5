pub mod balancer;
pub mod strategies;
pub mod tracker;
pub mod types;
pub mod window;

pub use balancer::{ExecutionGuard, ProviderLoadBalancer};
pub use strategies::{LoadBalancingStrategy, ProviderCandidate, ScoringWeights, StrategySelection};
pub use tracker::ProviderMetrics;
pub use types::{
    AlternativeSelection, BalancerStatistics, ExpectedPerformance, SelectionOptions,
    SelectionResult, SelectionStrategy,
};
pub use window::PerformanceWindow;
