//! Future spending prediction
//!
//! Engineers calendar, rolling-window, category, and lag features per
//! transaction and fits a random-forest regressor against the raw amount.
//! Future-day forecasts reuse the most recent rolling statistics rather than
//! re-simulating the series; the per-category breakdown distributes the
//! model's own total by trailing-30-day category share, so the two views of
//! "next N days" always agree.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::forest::RandomForestRegressor;
use super::scaler::StandardScaler;
use super::{rolling_mean, rolling_std, MIN_SPENDING_TRANSACTIONS, TRAINING_SEED};
use crate::error::{Error, Result};
use crate::models::{Category, Transaction, ALL_CATEGORIES};

/// Trees in the spending forest
const N_ESTIMATORS: usize = 100;

/// Depth cap per tree
const MAX_DEPTH: usize = 10;

/// Context window of most recent transactions used when forecasting
const FORECAST_CONTEXT: usize = 100;

/// Training-set metrics reported after a fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2_score: f64,
}

/// One forecast day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    /// YYYY-MM-DD
    pub date: String,
    pub predicted_amount: f64,
}

/// Per-category slice of the forecast total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryForecast {
    pub predicted_total: f64,
    pub daily_average: f64,
}

/// Full forecast response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingForecast {
    pub daily_predictions: Vec<DailyForecast>,
    pub total_predicted: f64,
    pub category_breakdown: BTreeMap<String, CategoryForecast>,
    pub prediction_period: String,
}

/// Fitted spending predictor: forest + scaler + feature schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingPredictor {
    forest: RandomForestRegressor,
    scaler: StandardScaler,
    feature_names: Vec<String>,
}

/// Names of the engineered features, in column order
fn feature_names() -> Vec<String> {
    let mut names = vec![
        "day_of_week".to_string(),
        "day_of_month".to_string(),
        "month".to_string(),
        "is_weekend".to_string(),
        "rolling_7_mean".to_string(),
        "rolling_7_std".to_string(),
        "rolling_30_mean".to_string(),
        "rolling_30_std".to_string(),
    ];
    for cat in ALL_CATEGORIES {
        names.push(format!("cat_{}", cat.as_str()));
    }
    names.push("amount_lag_1".to_string());
    names.push("amount_lag_7".to_string());
    names
}

fn one_hot(category: Option<Category>) -> [f64; 12] {
    let mut row = [0.0; 12];
    if let Some(cat) = category {
        row[cat.index()] = 1.0;
    }
    row
}

/// Spending rows sorted ascending by date; income rows are dropped
fn spending_rows(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut rows: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_income).collect();
    rows.sort_by_key(|t| t.date);
    rows
}

/// Build the feature matrix and amount targets for sorted spending rows
fn build_features(rows: &[&Transaction]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let amounts: Vec<f64> = rows.iter().map(|t| t.amount).collect();
    let r7_mean = rolling_mean(&amounts, 7);
    let r7_std = rolling_std(&amounts, 7);
    let r30_mean = rolling_mean(&amounts, 30);
    let r30_std = rolling_std(&amounts, 30);

    let mut matrix = Vec::with_capacity(rows.len());
    for (i, tx) in rows.iter().enumerate() {
        let weekday = tx.date.weekday().num_days_from_monday() as f64;
        let mut row = vec![
            weekday,
            tx.date.day() as f64,
            tx.date.month() as f64,
            if weekday >= 5.0 { 1.0 } else { 0.0 },
            r7_mean[i],
            r7_std[i],
            r30_mean[i],
            r30_std[i],
        ];
        row.extend(one_hot(tx.category));
        row.push(if i >= 1 { amounts[i - 1] } else { 0.0 });
        row.push(if i >= 7 { amounts[i - 7] } else { 0.0 });
        matrix.push(row);
    }

    (matrix, amounts)
}

impl SpendingPredictor {
    /// Train on a user's history; income rows are excluded from the target
    pub fn train(transactions: &[Transaction]) -> Result<(Self, PredictorMetrics)> {
        let rows = spending_rows(transactions);
        if rows.len() < MIN_SPENDING_TRANSACTIONS {
            return Err(Error::InsufficientData(format!(
                "need at least {} spending transactions to train, got {}",
                MIN_SPENDING_TRANSACTIONS,
                rows.len()
            )));
        }

        let (matrix, targets) = build_features(&rows);
        let (scaler, scaled) = StandardScaler::fit_transform(&matrix)?;

        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        let forest = RandomForestRegressor::fit(&scaled, &targets, N_ESTIMATORS, MAX_DEPTH, &mut rng)?;

        let predictor = Self {
            forest,
            scaler,
            feature_names: feature_names(),
        };

        // Training-set fit metrics
        let predictions: Vec<f64> = scaled.iter().map(|r| predictor.forest.predict(r)).collect();
        let n = targets.len() as f64;
        let mae = targets
            .iter()
            .zip(&predictions)
            .map(|(y, p)| (y - p).abs())
            .sum::<f64>()
            / n;
        let mse = targets
            .iter()
            .zip(&predictions)
            .map(|(y, p)| (y - p).powi(2))
            .sum::<f64>()
            / n;
        let mean_y = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = targets
            .iter()
            .zip(&predictions)
            .map(|(y, p)| (y - p).powi(2))
            .sum();
        let r2_score = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        Ok((
            predictor,
            PredictorMetrics {
                mae,
                rmse: mse.sqrt(),
                r2_score,
            },
        ))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Forecast daily spend for the next `days_ahead` days
    ///
    /// Each future day gets its own calendar features combined with the most
    /// recent rolling statistics, mean category mix, and lag values from the
    /// context window. Predictions are clamped at zero.
    pub fn predict_future_spending(
        &self,
        transactions: &[Transaction],
        days_ahead: u32,
    ) -> Result<SpendingForecast> {
        let all_rows = spending_rows(transactions);
        if all_rows.is_empty() {
            return Err(Error::InsufficientData(
                "no spending transactions to forecast from".into(),
            ));
        }

        // Most recent context, like the training-side tail
        let start = all_rows.len().saturating_sub(FORECAST_CONTEXT);
        let rows = &all_rows[start..];

        let amounts: Vec<f64> = rows.iter().map(|t| t.amount).collect();
        let r7_mean = rolling_mean(&amounts, 7);
        let r7_std = rolling_std(&amounts, 7);
        let r30_mean = rolling_mean(&amounts, 30);
        let r30_std = rolling_std(&amounts, 30);

        // Mean category distribution across the trailing 30 rows
        let dist_window = &rows[rows.len().saturating_sub(30)..];
        let mut cat_mix = [0.0; 12];
        for tx in dist_window {
            let hot = one_hot(tx.category);
            for (acc, v) in cat_mix.iter_mut().zip(hot) {
                *acc += v;
            }
        }
        for v in &mut cat_mix {
            *v /= dist_window.len() as f64;
        }

        let lag_1 = *amounts.last().unwrap_or(&0.0);
        let lag_7 = if amounts.len() >= 7 {
            amounts[amounts.len() - 7]
        } else {
            0.0
        };

        let last_date = rows.last().map(|t| t.date).unwrap_or_else(Utc::now);

        let mut daily_predictions = Vec::with_capacity(days_ahead as usize);
        let mut total_predicted = 0.0;
        for offset in 1..=days_ahead {
            let future = last_date + Duration::days(offset as i64);
            let weekday = future.weekday().num_days_from_monday() as f64;

            let mut row = vec![
                weekday,
                future.day() as f64,
                future.month() as f64,
                if weekday >= 5.0 { 1.0 } else { 0.0 },
                *r7_mean.last().unwrap(),
                *r7_std.last().unwrap(),
                *r30_mean.last().unwrap(),
                *r30_std.last().unwrap(),
            ];
            row.extend(cat_mix);
            row.push(lag_1);
            row.push(lag_7);

            let scaled = self.scaler.transform_row(&row);
            let predicted = self.forest.predict(&scaled).max(0.0);

            total_predicted += predicted;
            daily_predictions.push(DailyForecast {
                date: future.format("%Y-%m-%d").to_string(),
                predicted_amount: predicted,
            });
        }

        let category_breakdown =
            category_breakdown(&all_rows, last_date, total_predicted, days_ahead);

        Ok(SpendingForecast {
            daily_predictions,
            total_predicted,
            category_breakdown,
            prediction_period: format!("{} days", days_ahead),
        })
    }
}

/// Distribute the forecast total across categories by trailing-30-day share
fn category_breakdown(
    rows: &[&Transaction],
    last_date: chrono::DateTime<Utc>,
    total_predicted: f64,
    days_ahead: u32,
) -> BTreeMap<String, CategoryForecast> {
    let cutoff = last_date - Duration::days(30);
    // History entirely older than the window falls back to the full set
    let has_recent = rows.iter().any(|t| t.date >= cutoff);

    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut total = 0.0;
    for tx in rows {
        if has_recent && tx.date < cutoff {
            continue;
        }
        let label = tx.category.unwrap_or(Category::Other).as_str().to_string();
        *by_category.entry(label).or_insert(0.0) += tx.amount;
        total += tx.amount;
    }

    let mut breakdown = BTreeMap::new();
    if total <= 0.0 {
        return breakdown;
    }
    for (label, amount) in by_category {
        let share = amount / total;
        let predicted_total = share * total_predicted;
        breakdown.insert(
            label,
            CategoryForecast {
                predicted_total,
                daily_average: predicted_total / days_ahead.max(1) as f64,
            },
        );
    }
    breakdown
}
