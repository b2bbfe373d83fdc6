//! Feature standardization

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Standardizes features to zero mean and unit variance
///
/// Fitted jointly with each model; the fitted means/stds travel with the
/// model state so prediction-time vectors go through the same transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit means and standard deviations per column
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(Error::Training("cannot fit scaler on empty data".into()));
        }
        let width = rows[0].len();

        let mut means = vec![0.0; width];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                means[j] += v;
            }
        }
        for m in &mut means {
            *m /= n as f64;
        }

        let mut stds = vec![0.0; width];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                stds[j] += (v - means[j]).powi(2);
            }
        }
        for s in &mut stds {
            *s = (*s / n as f64).sqrt();
            // Constant columns pass through unscaled
            if *s == 0.0 {
                *s = 1.0;
            }
        }

        Ok(Self { means, stds })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.stds.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    pub fn fit_transform(rows: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>)> {
        let scaler = Self::fit(rows)?;
        let transformed = scaler.transform(rows);
        Ok((scaler, transformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let (_, scaled) = StandardScaler::fit_transform(&rows).unwrap();

        for j in 0..2 {
            let mean: f64 = scaled.iter().map(|r| r[j]).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-9);
            let var: f64 = scaled.iter().map(|r| r[j].powi(2)).sum::<f64>() / 3.0;
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn constant_column_is_passthrough() {
        let rows = vec![vec![5.0], vec![5.0], vec![5.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&rows).unwrap();
        assert!(scaled.iter().all(|r| r[0] == 0.0));
        assert_eq!(scaler.transform_row(&[7.0]), vec![2.0]);
    }

    #[test]
    fn empty_fit_is_an_error() {
        assert!(StandardScaler::fit(&[]).is_err());
    }
}
