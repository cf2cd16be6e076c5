pub mod aggregation;
pub mod builder;
pub mod consensus;
pub mod manager;
pub mod types;

pub use aggregation::{build_ensemble_response, AggregationContext, ProviderOutcome};
pub use builder::EnsembleBuilder;
pub use manager::EnsembleOrchestrator;
pub use types::{
    AggregatedAnalysis, ConsensusResult, CostBreakdown, Disagreement, EnsembleMetadata,
    EnsembleOptions, EnsembleResponse, IndividualResponse, ModelComparison, OrchestratorStatistics,
    PerformanceSummary, ProviderFailure, ProviderStatus, QualityScores, RegistrationOptions,
    VotingResult,
};
