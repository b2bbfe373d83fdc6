//! Statistical models backing the categorization, prediction, and
//! anomaly-detection endpoints
//!
//! All three estimators are trained in-process on a user's own history and
//! held in the [`registry::ModelRegistry`]. Training is deterministic: the
//! forest models draw from a fixed-seed RNG.

pub mod categorizer;
pub mod detector;
pub mod forest;
pub mod predictor;
pub mod registry;
pub mod scaler;

pub use categorizer::Categorizer;
pub use detector::{AnomalyDetector, AnomalyReport, DetectorMetrics, SpendingInsights};
pub use predictor::{PredictorMetrics, SpendingForecast, SpendingPredictor};
pub use registry::ModelRegistry;
pub use scaler::StandardScaler;

/// Fixed RNG seed for forest training runs
pub(crate) const TRAINING_SEED: u64 = 42;

/// Minimum total transactions before the predictor or detector will train
pub const MIN_TRAINING_TRANSACTIONS: usize = 10;

/// Minimum spending (non-income) transactions before the predictor will train
pub const MIN_SPENDING_TRANSACTIONS: usize = 5;

/// Rolling mean over the trailing `window` values at each position
///
/// Matches a pandas `rolling(window, min_periods=1).mean()`: early rows
/// average whatever prefix is available.
pub(crate) fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        out.push(slice.iter().sum::<f64>() / slice.len() as f64);
    }
    out
}

/// Rolling sample standard deviation over the trailing `window` values
///
/// Single-element windows yield 0 (pandas' NaN, backfilled with 0 upstream).
pub(crate) fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        if slice.len() < 2 {
            out.push(0.0);
            continue;
        }
        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (slice.len() - 1) as f64;
        out.push(var.sqrt());
    }
    out
}

/// Linear-interpolation percentile of an unsorted sample, q in [0, 1]
pub(crate) fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = pos - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_mean_short_prefix() {
        let values = [2.0, 4.0, 6.0, 8.0];
        let means = rolling_mean(&values, 3);
        assert_eq!(means[0], 2.0);
        assert_eq!(means[1], 3.0);
        assert_eq!(means[2], 4.0);
        assert_eq!(means[3], 6.0);
    }

    #[test]
    fn rolling_std_first_is_zero() {
        let values = [1.0, 3.0, 5.0];
        let stds = rolling_std(&values, 2);
        assert_eq!(stds[0], 0.0);
        assert!(stds[1] > 0.0);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert_eq!(percentile(&values, 1.0), 5.0);
        assert!((percentile(&values, 0.1) - 1.4).abs() < 1e-9);
    }
}
