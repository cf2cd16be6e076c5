use crate::load_balancer::window::PerformanceWindow;
use crate::providers::RateLimitInfo;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// Rolling statistics for one registered provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetrics {
    pub name: String,
    /// Response times in milliseconds
    pub response_time: PerformanceWindow,
    /// 1.0 for a successful execution, 0.0 for a failed one
    pub success_rate: PerformanceWindow,
    /// Cost per execution in USD
    pub cost: PerformanceWindow,
    pub availability: f64,
    pub last_health_check: Option<DateTime<Utc>>,
    pub active_connections: usize,
    /// Tokens consumed across all recorded executions
    pub total_tokens: u64,
    pub rate_limit: RateLimitInfo,
    pub circuit_breaker_open: bool,
}

impl ProviderMetrics {
    /// Create fresh metrics with empty windows
    ///
    /// # Parameters
    /// * `name` - Registry name of the provider
    /// * `window_size` - Capacity of each performance window
    /// * `circuit_breaker_open` - Breaker state at registration time
    pub fn new(name: impl Into<String>, window_size: usize, circuit_breaker_open: bool) -> Self {
        Self {
            name: name.into(),
            response_time: PerformanceWindow::new(window_size),
            success_rate: PerformanceWindow::new(window_size),
            cost: PerformanceWindow::new(window_size),
            availability: 1.0,
            last_health_check: None,
            active_connections: 0,
            total_tokens: 0,
            rate_limit: RateLimitInfo::unlimited(),
            circuit_breaker_open,
        }
    }

    /// Mark the start of a dispatch
    pub fn record_start(&mut self) {
        self.active_connections += 1;
    }

    /// Record the outcome of a dispatch
    ///
    /// # Parameters
    /// * `response_time_ms` - How long the call took
    /// * `success` - Whether the call produced a response
    /// * `tokens_used` - Tokens reported by the provider
    /// * `cost` - Cost of the call in USD
    pub fn record_result(&mut self, response_time_ms: f64, success: bool, tokens_used: u32, cost: f64) {
        self.total_tokens += tokens_used as u64;
        self.response_time.push(response_time_ms);
        self.success_rate.push(if success { 1.0 } else { 0.0 });
        self.cost.push(cost);
        if self.active_connections > 0 {
            self.active_connections -= 1;
        }

        debug!(
            "Provider {} recorded {} in {:.0}ms (avg {:.0}ms, success rate {:.2})",
            self.name,
            if success { "success" } else { "failure" },
            response_time_ms,
            self.response_time.average,
            self.success_rate.average
        );
    }

    /// Record the outcome of a health probe
    pub fn record_health(&mut self, healthy: bool, rate_limit: RateLimitInfo, circuit_breaker_open: bool) {
        self.availability = if healthy { 1.0 } else { 0.0 };
        self.last_health_check = Some(Utc::now());
        self.rate_limit = rate_limit;
        self.circuit_breaker_open = circuit_breaker_open;
    }

    /// Average response time, `f64::INFINITY` when never measured
    pub fn avg_response_time_or_inf(&self) -> f64 {
        self.response_time.average_or_none().unwrap_or(f64::INFINITY)
    }

    /// Average cost, `f64::INFINITY` when never measured
    pub fn avg_cost_or_inf(&self) -> f64 {
        self.cost.average_or_none().unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_defaults() {
        let metrics = ProviderMetrics::new("alpha", 10, false);
        assert_eq!(metrics.availability, 1.0);
        assert_eq!(metrics.active_connections, 0);
        assert!(metrics.last_health_check.is_none());
        assert!(metrics.response_time.is_empty());
    }

    #[test]
    fn test_record_result_never_underflows_connections() {
        let mut metrics = ProviderMetrics::new("alpha", 10, false);
        metrics.record_result(120.0, true, 300, 0.002);
        assert_eq!(metrics.active_connections, 0);
        metrics.record_start();
        metrics.record_start();
        metrics.record_result(80.0, false, 0, 0.0);
        assert_eq!(metrics.total_tokens, 300);
        assert_eq!(metrics.active_connections, 1);
        assert_eq!(metrics.success_rate.average, 0.5);
    }

    #[test]
    fn test_record_health_sets_availability() {
        let mut metrics = ProviderMetrics::new("alpha", 10, false);
        metrics.record_health(false, RateLimitInfo::unlimited(), true);
        assert_eq!(metrics.availability, 0.0);
        assert!(metrics.circuit_breaker_open);
        assert!(metrics.last_health_check.is_some());
    }
}
