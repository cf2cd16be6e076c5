// Orchestrator
pub const DEFAULT_MAX_TOTAL_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_MAX_PROVIDER_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MIN_PROVIDERS_REQUIRED: usize = 1;
pub const DEFAULT_ORCHESTRATOR_HEALTH_CHECK_INTERVAL_MS: u64 = 300_000;

// Registration
pub const DEFAULT_PROVIDER_PRIORITY: i32 = 50;
pub const DEFAULT_PROVIDER_WEIGHT: f64 = 1.0;

// Aggregation
pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.7;
pub const DEFAULT_CLUSTERING_THRESHOLD: f64 = 0.8;
pub const DEFAULT_AGREEMENT_WEIGHT: f64 = 0.4;
pub const DEFAULT_COMPLETENESS_WEIGHT: f64 = 0.3;
pub const DEFAULT_CONSISTENCY_WEIGHT: f64 = 0.3;
/// Content length treated as a complete answer
pub const COMPLETE_CONTENT_LENGTH: f64 = 1000.0;
/// Illustrative split of total cost into input/output/vision categories
pub const INPUT_COST_SHARE: f64 = 0.3;
pub const OUTPUT_COST_SHARE: f64 = 0.6;
pub const VISION_COST_SHARE: f64 = 0.1;

// Load balancer
pub const DEFAULT_PERFORMANCE_WINDOW_SIZE: usize = 100;
pub const DEFAULT_PERFORMANCE_WEIGHTING: f64 = 0.4;
pub const DEFAULT_COST_WEIGHTING: f64 = 0.3;
pub const DEFAULT_AVAILABILITY_WEIGHTING: f64 = 0.3;
pub const DEFAULT_BALANCER_HEALTH_CHECK_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;
pub const MAX_ALTERNATIVES: usize = 3;

// Adaptive scoring
pub const RESPONSE_TIME_REFERENCE_MS: f64 = 1000.0;
pub const REFERENCE_COST_USD: f64 = 0.01;
pub const MIN_COST_USD: f64 = 0.001;
pub const TREND_SENSITIVITY: f64 = 0.1;
pub const OPEN_BREAKER_PENALTY: f64 = 0.1;
pub const RATE_LIMIT_PRESSURE_THRESHOLD: f64 = 0.8;
pub const MIN_TREND_SAMPLES: usize = 5;

// Default circuit breaker
pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 30_000;
