use log::debug;

use crate::constants;
use crate::load_balancer::tracker::ProviderMetrics;
use crate::load_balancer::types::{SelectionOptions, SelectionStrategy};

/// A provider eligible for selection, as seen by a strategy
#[derive(Debug, Clone)]
pub struct ProviderCandidate {
    pub name: String,
    pub weight: f64,
    pub metrics: ProviderMetrics,
}

/// Providers picked by a strategy and a human-readable explanation
#[derive(Debug, Clone, Default)]
pub struct StrategySelection {
    pub providers: Vec<String>,
    pub reasoning: String,
}

/// Relative importance of the three adaptive score components
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub performance: f64,
    pub cost: f64,
    pub availability: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            performance: constants::DEFAULT_PERFORMANCE_WEIGHTING,
            cost: constants::DEFAULT_COST_WEIGHTING,
            availability: constants::DEFAULT_AVAILABILITY_WEIGHTING,
        }
    }
}

/// Trait defining the interface for provider selection strategies
///
/// Implementations decide which of the available providers handle a request.
/// The balancer hands candidates over sorted by name, never empty, and with
/// `count <= candidates.len()`.
pub trait LoadBalancingStrategy {
    /// Which algorithm this is
    fn kind(&self) -> SelectionStrategy;

    /// Pick `count` distinct providers from `candidates`
    ///
    /// # Parameters
    /// * `candidates` - Available providers with a snapshot of their metrics
    /// * `count` - Number of providers to return
    /// * `options` - Caller constraints
    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        options: &SelectionOptions,
    ) -> StrategySelection;
}

/// Build the strategy object for a configured algorithm
pub fn create_strategy(
    kind: SelectionStrategy,
    weights: ScoringWeights,
) -> Box<dyn LoadBalancingStrategy + Send + Sync> {
    match kind {
        SelectionStrategy::RoundRobin => Box::new(RoundRobinStrategy::new()),
        SelectionStrategy::WeightedRoundRobin => Box::new(WeightedRoundRobinStrategy::new()),
        SelectionStrategy::LeastConnections => Box::new(LeastConnectionsStrategy::new()),
        SelectionStrategy::FastestResponse => Box::new(FastestResponseStrategy::new()),
        SelectionStrategy::LowestCost => Box::new(LowestCostStrategy::new()),
        SelectionStrategy::Adaptive => Box::new(AdaptiveStrategy::new(weights)),
    }
}

/// Strategy that hands out providers in a rotating order.
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    index: usize,
}

impl RoundRobinStrategy {
    /// Creates a new RoundRobinStrategy
    pub fn new() -> Self {
        Self { index: 0 }
    }
}

impl LoadBalancingStrategy for RoundRobinStrategy {
    fn kind(&self) -> SelectionStrategy {
        SelectionStrategy::RoundRobin
    }

    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        _options: &SelectionOptions,
    ) -> StrategySelection {
        let n = candidates.len();
        if n == 0 {
            return StrategySelection::default();
        }

        let start = self.index % n;
        let providers: Vec<String> = (0..count.min(n))
            .map(|i| candidates[(start + i) % n].name.clone())
            .collect();
        self.index = (start + count) % n;

        debug!(
            "RoundRobinStrategy: Selected {:?} starting at index {} of {} candidates",
            providers, start, n
        );

        StrategySelection {
            reasoning: format!(
                "Round-robin rotation selected {} of {} available providers starting at position {}",
                providers.len(),
                n,
                start
            ),
            providers,
        }
    }
}

/// Strategy that rotates over virtual slots, `ceil(weight * 10)` per provider.
#[derive(Debug, Default)]
pub struct WeightedRoundRobinStrategy {
    index: usize,
}

impl WeightedRoundRobinStrategy {
    /// Creates a new WeightedRoundRobinStrategy
    pub fn new() -> Self {
        Self { index: 0 }
    }
}

/// Slot count of a provider for weighted rotation
pub fn virtual_slots(weight: f64) -> usize {
    if weight.is_finite() && weight > 0.0 {
        (weight * 10.0).ceil() as usize
    } else {
        0
    }
}

impl LoadBalancingStrategy for WeightedRoundRobinStrategy {
    fn kind(&self) -> SelectionStrategy {
        SelectionStrategy::WeightedRoundRobin
    }

    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        _options: &SelectionOptions,
    ) -> StrategySelection {
        let slots: Vec<usize> = candidates
            .iter()
            .enumerate()
            .flat_map(|(i, c)| std::iter::repeat(i).take(virtual_slots(c.weight)))
            .collect();

        let mut picked: Vec<usize> = Vec::with_capacity(count);
        if !slots.is_empty() {
            let start = self.index % slots.len();
            let mut consumed = 0;
            while picked.len() < count && consumed < slots.len() {
                let candidate = slots[(start + consumed) % slots.len()];
                consumed += 1;
                if !picked.contains(&candidate) {
                    picked.push(candidate);
                }
            }
            self.index = (start + consumed) % slots.len();
        }

        // Zero-weight providers only fill what the slots could not
        for i in 0..candidates.len() {
            if picked.len() >= count {
                break;
            }
            if !picked.contains(&i) {
                picked.push(i);
            }
        }

        let providers: Vec<String> = picked.iter().map(|&i| candidates[i].name.clone()).collect();

        debug!(
            "WeightedRoundRobinStrategy: Selected {:?} from {} virtual slots",
            providers,
            slots.len()
        );

        StrategySelection {
            reasoning: format!(
                "Weighted round-robin over {} virtual slots selected {} of {} available providers",
                slots.len(),
                providers.len(),
                candidates.len()
            ),
            providers,
        }
    }
}

/// Strategy that prefers the providers with the fewest in-flight calls.
#[derive(Debug, Default)]
pub struct LeastConnectionsStrategy;

impl LeastConnectionsStrategy {
    /// Creates a new LeastConnectionsStrategy
    pub fn new() -> Self {
        Self {}
    }
}

impl LoadBalancingStrategy for LeastConnectionsStrategy {
    fn kind(&self) -> SelectionStrategy {
        SelectionStrategy::LeastConnections
    }

    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        _options: &SelectionOptions,
    ) -> StrategySelection {
        let mut ranked: Vec<&ProviderCandidate> = candidates.iter().collect();
        ranked.sort_by(|a, b| {
            a.metrics
                .active_connections
                .cmp(&b.metrics.active_connections)
                .then_with(|| a.name.cmp(&b.name))
        });

        let providers = take_names(&ranked, count);
        debug!("LeastConnectionsStrategy: Selected {:?}", providers);

        StrategySelection {
            reasoning: format!(
                "Least-connections selected {} of {} available providers with the fewest active connections",
                providers.len(),
                candidates.len()
            ),
            providers,
        }
    }
}

/// Strategy that selects the providers with the lowest average response time.
#[derive(Debug, Default)]
pub struct FastestResponseStrategy;

impl FastestResponseStrategy {
    /// Creates a new FastestResponseStrategy
    pub fn new() -> Self {
        Self {}
    }
}

impl LoadBalancingStrategy for FastestResponseStrategy {
    fn kind(&self) -> SelectionStrategy {
        SelectionStrategy::FastestResponse
    }

    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        _options: &SelectionOptions,
    ) -> StrategySelection {
        let providers = rank_by_response_time(candidates, count);
        debug!("FastestResponseStrategy: Selected {:?}", providers);

        StrategySelection {
            reasoning: format!(
                "Fastest-response selected {} of {} available providers by average response time",
                providers.len(),
                candidates.len()
            ),
            providers,
        }
    }
}

/// Strategy that selects the providers with the lowest average cost.
#[derive(Debug, Default)]
pub struct LowestCostStrategy;

impl LowestCostStrategy {
    /// Creates a new LowestCostStrategy
    pub fn new() -> Self {
        Self {}
    }
}

impl LoadBalancingStrategy for LowestCostStrategy {
    fn kind(&self) -> SelectionStrategy {
        SelectionStrategy::LowestCost
    }

    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        _options: &SelectionOptions,
    ) -> StrategySelection {
        let providers = rank_by_cost(candidates, count);
        debug!("LowestCostStrategy: Selected {:?}", providers);

        StrategySelection {
            reasoning: format!(
                "Lowest-cost selected {} of {} available providers by average cost",
                providers.len(),
                candidates.len()
            ),
            providers,
        }
    }
}

/// Strategy blending performance, cost and availability into one score.
#[derive(Debug, Default)]
pub struct AdaptiveStrategy {
    weights: ScoringWeights,
}

impl AdaptiveStrategy {
    /// Creates a new AdaptiveStrategy with the given component weights
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }
}

impl LoadBalancingStrategy for AdaptiveStrategy {
    fn kind(&self) -> SelectionStrategy {
        SelectionStrategy::Adaptive
    }

    fn select_providers(
        &mut self,
        candidates: &[ProviderCandidate],
        count: usize,
        options: &SelectionOptions,
    ) -> StrategySelection {
        let mut scored: Vec<(&ProviderCandidate, f64)> = candidates
            .iter()
            .map(|c| (c, adaptive_score(&c.metrics, &self.weights, options)))
            .collect();
        scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.name.cmp(&b.name)));

        let chosen: Vec<(&ProviderCandidate, f64)> = scored.into_iter().take(count).collect();
        let providers: Vec<String> = chosen.iter().map(|(c, _)| c.name.clone()).collect();
        let scores: Vec<String> = chosen
            .iter()
            .map(|(c, score)| format!("{} ({:.3})", c.name, score))
            .collect();

        debug!("AdaptiveStrategy: Selected {}", scores.join(", "));

        StrategySelection {
            reasoning: format!(
                "Adaptive scoring selected {} of {} available providers: {}",
                providers.len(),
                candidates.len(),
                scores.join(", ")
            ),
            providers,
        }
    }
}

/// Composite adaptive score in [0, 1]
///
/// Providers breaking the caller's cost or response-time ceiling score 0.
pub fn adaptive_score(metrics: &ProviderMetrics, weights: &ScoringWeights, options: &SelectionOptions) -> f64 {
    let avg_response_time = metrics.response_time.average;
    let avg_cost = metrics.cost.average;

    if let Some(max_cost) = options.max_cost {
        if avg_cost > max_cost {
            return 0.0;
        }
    }
    if let Some(max_response_time) = options.max_response_time {
        if avg_response_time > max_response_time {
            return 0.0;
        }
    }

    let response_time_score = 1.0 / (1.0 + avg_response_time / constants::RESPONSE_TIME_REFERENCE_MS);
    let success_rate_score = metrics.success_rate.average;
    let trend_score = (0.5 + metrics.response_time.trend * constants::TREND_SENSITIVITY).clamp(0.0, 1.0);
    let performance_score = (response_time_score + success_rate_score + trend_score) / 3.0;

    let cost_score = (constants::REFERENCE_COST_USD / avg_cost.max(constants::MIN_COST_USD)).min(1.0);

    let mut availability_score = metrics.availability;
    if metrics.circuit_breaker_open {
        availability_score *= constants::OPEN_BREAKER_PENALTY;
    }
    let utilization = metrics.rate_limit.utilization();
    if utilization > constants::RATE_LIMIT_PRESSURE_THRESHOLD {
        availability_score *= 1.0 - utilization * 0.5;
    }

    let total_weight = weights.performance + weights.cost + weights.availability;
    if total_weight <= 0.0 {
        return 0.0;
    }

    (performance_score * weights.performance
        + cost_score * weights.cost
        + availability_score * weights.availability)
        / total_weight
}

/// Names of the `count` fastest candidates; unmeasured providers go last
pub fn rank_by_response_time(candidates: &[ProviderCandidate], count: usize) -> Vec<String> {
    let mut ranked: Vec<&ProviderCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        a.metrics
            .avg_response_time_or_inf()
            .total_cmp(&b.metrics.avg_response_time_or_inf())
            .then_with(|| a.name.cmp(&b.name))
    });
    take_names(&ranked, count)
}

/// Names of the `count` cheapest candidates; unmeasured providers go last
pub fn rank_by_cost(candidates: &[ProviderCandidate], count: usize) -> Vec<String> {
    let mut ranked: Vec<&ProviderCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        a.metrics
            .avg_cost_or_inf()
            .total_cmp(&b.metrics.avg_cost_or_inf())
            .then_with(|| a.name.cmp(&b.name))
    });
    take_names(&ranked, count)
}

/// Names of the `count` most reliable candidates
pub fn rank_by_success_rate(candidates: &[ProviderCandidate], count: usize) -> Vec<String> {
    let mut ranked: Vec<&ProviderCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| {
        b.metrics
            .success_rate
            .average
            .total_cmp(&a.metrics.success_rate.average)
            .then_with(|| a.name.cmp(&b.name))
    });
    take_names(&ranked, count)
}

fn take_names(ranked: &[&ProviderCandidate], count: usize) -> Vec<String> {
    ranked.iter().take(count).map(|c| c.name.clone()).collect()
}
