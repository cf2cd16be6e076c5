use crate::constants;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded FIFO of samples with derived statistics
///
/// Statistics are recomputed on every append so readers never pay for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceWindow {
    pub values: VecDeque<f64>,
    pub max_size: usize,
    pub average: f64,
    pub p95: f64,
    /// Slope of value vs. sample index; positive means growing values
    pub trend: f64,
}

impl PerformanceWindow {
    /// Create an empty window holding at most `max_size` samples
    pub fn new(max_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(max_size.max(1)),
            max_size: max_size.max(1),
            average: 0.0,
            p95: 0.0,
            trend: 0.0,
        }
    }

    /// Append a sample, evicting the oldest ones past capacity
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.max_size {
            self.values.pop_front();
        }
        self.recompute();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Average, or `None` when no sample was recorded yet
    pub fn average_or_none(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.average)
        }
    }

    fn recompute(&mut self) {
        let n = self.values.len();
        if n == 0 {
            self.average = 0.0;
            self.p95 = 0.0;
            self.trend = 0.0;
            return;
        }

        self.average = self.values.iter().sum::<f64>() / n as f64;

        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let index = ((n as f64 * 0.95).floor() as usize).min(n - 1);
        self.p95 = sorted[index];

        self.trend = linear_trend(&self.values);
    }
}

impl Default for PerformanceWindow {
    fn default() -> Self {
        Self::new(constants::DEFAULT_PERFORMANCE_WINDOW_SIZE)
    }
}

/// Least-squares slope of the samples against their index
fn linear_trend(values: &VecDeque<f64>) -> f64 {
    let n = values.len();
    if n < constants::MIN_TREND_SAMPLES {
        return 0.0;
    }

    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        covariance += dx * (y - mean_y);
        variance_x += dx * dx;
    }

    if variance_x == 0.0 {
        0.0
    } else {
        covariance / variance_x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_of_five_samples() {
        let mut window = PerformanceWindow::new(10);
        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            window.push(v);
        }
        assert_eq!(window.average, 30.0);
        assert_eq!(window.p95, 50.0);
    }

    #[test]
    fn test_evicts_oldest_values() {
        let mut window = PerformanceWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.values.iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
        assert_eq!(window.average, 4.0);
    }

    #[test]
    fn test_trend_needs_five_samples() {
        let mut window = PerformanceWindow::new(10);
        for v in [100.0, 200.0, 300.0, 400.0] {
            window.push(v);
        }
        assert_eq!(window.trend, 0.0);
        window.push(500.0);
        assert!((window.trend - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_series_has_zero_trend() {
        let mut window = PerformanceWindow::new(10);
        for _ in 0..6 {
            window.push(42.0);
        }
        assert_eq!(window.trend, 0.0);
    }

    #[test]
    fn test_empty_window_reports_none() {
        let window = PerformanceWindow::new(5);
        assert!(window.is_empty());
        assert!(window.average_or_none().is_none());
        assert_eq!(window.average, 0.0);
    }
}
