//! Anomalous-spending detection
//!
//! An isolation forest over per-transaction behavioral features flags
//! outliers; a separate rule overlay produces the human-readable reasons and
//! tiers. The reasons are threshold heuristics evaluated independently of
//! the forest's decision, not a decomposition of the score.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::forest::IsolationForest;
use super::scaler::StandardScaler;
use super::{percentile, rolling_mean, TRAINING_SEED};
use crate::error::{Error, Result};
use crate::models::{AnomalySeverity, Category, RiskLevel, Transaction};

/// Trees in the isolation forest
const N_ESTIMATORS: usize = 100;

/// Assumed fraction of outliers in any history
const CONTAMINATION: f64 = 0.1;

/// Training-set metrics reported after a fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorMetrics {
    pub total_transactions: usize,
    pub detected_anomalies: usize,
    pub anomaly_rate: f64,
    pub avg_anomaly_score: f64,
}

/// One flagged transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub transaction_id: i64,
    pub amount: f64,
    pub description: String,
    pub category: Option<Category>,
    pub date: DateTime<Utc>,
    /// Forest score; lower is more anomalous
    pub anomaly_score: f64,
    pub severity: AnomalySeverity,
    pub reasons: Vec<String>,
    pub risk_level: RiskLevel,
}

/// Recent-vs-historical spending comparison returned beside the anomalies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingTrend {
    pub recent_avg_daily: f64,
    pub historical_avg_daily: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryChange {
    pub change_percent: f64,
    pub recent_amount: f64,
    pub historical_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingInsights {
    pub spending_trend: SpendingTrend,
    pub category_changes: BTreeMap<String, CategoryChange>,
}

/// Per-row engineered features plus the overlay-only statistics
struct FeatureSet {
    /// Model input rows, one per transaction, in sorted order
    matrix: Vec<Vec<f64>>,
    amount_vs_30day_mean: Vec<f64>,
    is_night: Vec<bool>,
    category_frequency_norm: Vec<f64>,
    transactions_per_day: Vec<f64>,
    acceleration: Vec<f64>,
}

fn sorted_rows(transactions: &[Transaction]) -> Vec<&Transaction> {
    let mut rows: Vec<&Transaction> = transactions.iter().collect();
    rows.sort_by_key(|t| t.date);
    rows
}

fn build_features(rows: &[&Transaction]) -> FeatureSet {
    let n = rows.len();
    let amounts: Vec<f64> = rows.iter().map(|t| t.amount).collect();

    let mean = amounts.iter().sum::<f64>() / n as f64;
    let std = (amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n as f64).sqrt();

    let r7 = rolling_mean(&amounts, 7);
    let r30 = rolling_mean(&amounts, 30);

    let mut category_counts: HashMap<Option<Category>, usize> = HashMap::new();
    for tx in rows {
        *category_counts.entry(tx.category).or_insert(0) += 1;
    }
    let mut day_counts: HashMap<chrono::NaiveDate, usize> = HashMap::new();
    for tx in rows {
        *day_counts.entry(tx.date.date_naive()).or_insert(0) += 1;
    }

    let mut matrix = Vec::with_capacity(n);
    let mut amount_vs_30day_mean = Vec::with_capacity(n);
    let mut is_night = Vec::with_capacity(n);
    let mut category_frequency_norm = Vec::with_capacity(n);
    let mut transactions_per_day = Vec::with_capacity(n);
    let mut acceleration = vec![0.0; n];

    for (i, tx) in rows.iter().enumerate() {
        let hour = tx.date.hour() as f64;
        let weekday = tx.date.weekday().num_days_from_monday() as f64;
        let night = !(7.0..22.0).contains(&hour);
        let zscore = if std > 0.0 {
            (tx.amount - mean) / std
        } else {
            0.0
        };
        let vs7 = tx.amount / (r7[i] + 1e-6);
        let vs30 = tx.amount / (r30[i] + 1e-6);
        let cat_freq =
            category_counts.get(&tx.category).copied().unwrap_or(0) as f64 / n as f64;
        let per_day = day_counts
            .get(&tx.date.date_naive())
            .copied()
            .unwrap_or(1) as f64;

        matrix.push(vec![
            tx.amount.ln_1p(),
            zscore,
            hour,
            weekday,
            if weekday >= 5.0 { 1.0 } else { 0.0 },
            if night { 1.0 } else { 0.0 },
            vs7,
            vs30,
            cat_freq,
        ]);
        amount_vs_30day_mean.push(vs30);
        is_night.push(night);
        category_frequency_norm.push(cat_freq);
        transactions_per_day.push(per_day);
    }

    // First and second differences of the amount series
    for i in 2..n {
        let diff_i = amounts[i] - amounts[i - 1];
        let diff_prev = amounts[i - 1] - amounts[i - 2];
        acceleration[i] = diff_i - diff_prev;
    }

    FeatureSet {
        matrix,
        amount_vs_30day_mean,
        is_night,
        category_frequency_norm,
        transactions_per_day,
        acceleration,
    }
}

/// Fitted anomaly detector: forest + scaler + feature schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetector {
    forest: IsolationForest,
    scaler: StandardScaler,
    feature_names: Vec<String>,
}

fn feature_names() -> Vec<String> {
    [
        "amount_log",
        "amount_zscore",
        "hour",
        "day_of_week",
        "is_weekend",
        "is_night",
        "amount_vs_7day_mean",
        "amount_vs_30day_mean",
        "category_frequency_norm",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl AnomalyDetector {
    /// Train on a user's history
    pub fn train(transactions: &[Transaction]) -> Result<(Self, DetectorMetrics)> {
        if transactions.len() < 2 {
            return Err(Error::InsufficientData(format!(
                "need at least 2 transactions to train the detector, got {}",
                transactions.len()
            )));
        }

        let rows = sorted_rows(transactions);
        let features = build_features(&rows);
        let (scaler, scaled) = StandardScaler::fit_transform(&features.matrix)?;

        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        let forest = IsolationForest::fit(&scaled, N_ESTIMATORS, CONTAMINATION, &mut rng)?;

        let detector = Self {
            forest,
            scaler,
            feature_names: feature_names(),
        };

        let scores: Vec<f64> = scaled.iter().map(|r| detector.forest.score_sample(r)).collect();
        let flagged: Vec<f64> = scores
            .iter()
            .copied()
            .filter(|&s| detector.forest.is_anomaly(s))
            .collect();

        let metrics = DetectorMetrics {
            total_transactions: rows.len(),
            detected_anomalies: flagged.len(),
            anomaly_rate: flagged.len() as f64 / rows.len() as f64,
            avg_anomaly_score: if flagged.is_empty() {
                0.0
            } else {
                flagged.iter().sum::<f64>() / flagged.len() as f64
            },
        };

        Ok((detector, metrics))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Score a history and report the rows the forest flags
    ///
    /// Reports are sorted ascending by score, most anomalous first.
    pub fn detect_anomalies(&self, transactions: &[Transaction]) -> Result<Vec<AnomalyReport>> {
        if transactions.is_empty() {
            return Ok(vec![]);
        }

        let rows = sorted_rows(transactions);
        let features = build_features(&rows);
        let scaled = self.scaler.transform(&features.matrix);

        // Population quantiles for the reason rules
        let per_day_q95 = percentile(&features.transactions_per_day, 0.95);
        let accel_q95 = percentile(&features.acceleration, 0.95);

        let mut reports = Vec::new();
        for (i, tx) in rows.iter().enumerate() {
            let score = self.forest.score_sample(&scaled[i]);
            if !self.forest.is_anomaly(score) {
                continue;
            }

            let reasons = anomaly_reasons(&features, i, per_day_q95, accel_q95);
            let risk_level = assess_risk(tx.amount, &reasons);

            reports.push(AnomalyReport {
                transaction_id: tx.id,
                amount: tx.amount,
                description: tx.description.clone(),
                category: tx.category,
                date: tx.date,
                anomaly_score: score,
                severity: severity_of(score),
                reasons,
                risk_level,
            });
        }

        reports.sort_by(|a, b| {
            a.anomaly_score
                .partial_cmp(&b.anomaly_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(reports)
    }

    /// Recent-vs-historical spending comparison over the same history
    pub fn spending_insights(&self, transactions: &[Transaction]) -> SpendingInsights {
        spending_insights(transactions)
    }
}

/// Threshold rules explaining why a row looks unusual
fn anomaly_reasons(
    features: &FeatureSet,
    i: usize,
    per_day_q95: f64,
    accel_q95: f64,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if features.amount_vs_30day_mean[i] > 3.0 {
        reasons.push("Amount significantly higher than usual spending".to_string());
    }
    if features.is_night[i] {
        reasons.push("Transaction occurred during unusual hours (night)".to_string());
    }
    if features.category_frequency_norm[i] < 0.05 {
        reasons.push("Spending in rarely used category".to_string());
    }
    if features.transactions_per_day[i] > per_day_q95 {
        reasons.push("Unusually high number of transactions in one day".to_string());
    }
    if features.acceleration[i].abs() > accel_q95 && accel_q95 > 0.0 {
        reasons.push("Sudden change in spending pattern".to_string());
    }

    if reasons.is_empty() {
        reasons.push("General spending pattern deviation".to_string());
    }
    reasons
}

fn severity_of(score: f64) -> AnomalySeverity {
    if score < -0.5 {
        AnomalySeverity::High
    } else if score < -0.3 {
        AnomalySeverity::Medium
    } else {
        AnomalySeverity::Low
    }
}

/// Point-scoring risk heuristic over amount and the reason list
fn assess_risk(amount: f64, reasons: &[String]) -> RiskLevel {
    let mut risk_factors = 0usize;

    if amount > 1000.0 {
        risk_factors += 2;
    } else if amount > 500.0 {
        risk_factors += 1;
    }

    risk_factors += reasons.len();

    if reasons.iter().any(|r| r.to_lowercase().contains("night")) {
        risk_factors += 1;
    }

    if risk_factors >= 4 {
        RiskLevel::High
    } else if risk_factors >= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn spending_insights(transactions: &[Transaction]) -> SpendingInsights {
    let rows = sorted_rows(transactions);
    let Some(last) = rows.last() else {
        return SpendingInsights {
            spending_trend: SpendingTrend {
                recent_avg_daily: 0.0,
                historical_avg_daily: 0.0,
            },
            category_changes: BTreeMap::new(),
        };
    };

    let cutoff = last.date - Duration::days(30);
    let (recent, historical): (Vec<&&Transaction>, Vec<&&Transaction>) =
        rows.iter().partition(|t| t.date >= cutoff);

    let recent_sum: f64 = recent.iter().map(|t| t.amount).sum();
    let historical_sum: f64 = historical.iter().map(|t| t.amount).sum();
    let historical_days: HashSet<chrono::NaiveDate> =
        historical.iter().map(|t| t.date.date_naive()).collect();

    let spending_trend = SpendingTrend {
        recent_avg_daily: recent_sum / 30.0,
        historical_avg_daily: historical_sum / historical_days.len().max(1) as f64,
    };

    let mut recent_by_cat: BTreeMap<String, f64> = BTreeMap::new();
    for tx in &recent {
        let label = tx.category.unwrap_or(Category::Other).as_str().to_string();
        *recent_by_cat.entry(label).or_insert(0.0) += tx.amount;
    }
    let mut historical_by_cat: BTreeMap<String, f64> = BTreeMap::new();
    for tx in &historical {
        let label = tx.category.unwrap_or(Category::Other).as_str().to_string();
        *historical_by_cat.entry(label).or_insert(0.0) += tx.amount;
    }

    let mut category_changes = BTreeMap::new();
    for (label, recent_amount) in recent_by_cat {
        let historical_amount = historical_by_cat.get(&label).copied().unwrap_or(0.0);
        if historical_amount > 0.0 {
            category_changes.insert(
                label,
                CategoryChange {
                    change_percent: (recent_amount - historical_amount) / historical_amount
                        * 100.0,
                    recent_amount,
                    historical_amount,
                },
            );
        }
    }

    SpendingInsights {
        spending_trend,
        category_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tx(id: i64, day: i64, hour: u32, amount: f64, category: Category) -> Transaction {
        let date =
            Utc.with_ymd_and_hms(2025, 1, 1, hour, 15, 0).unwrap() + Duration::days(day);
        Transaction {
            id,
            user_id: "u1".into(),
            amount,
            description: format!("tx-{}", id),
            category: Some(category),
            predicted_category: None,
            confidence_score: None,
            date,
            is_income: false,
            is_anomaly: false,
            content_hash: String::new(),
            created_at: date,
        }
    }

    /// 40 unremarkable transactions spread over 90 days
    fn clean_history() -> Vec<Transaction> {
        (0..40)
            .map(|i| {
                let cat = match i % 3 {
                    0 => Category::FoodDining,
                    1 => Category::Shopping,
                    _ => Category::Transportation,
                };
                tx(i, (i * 90) / 40, 10 + (i % 8) as u32, 25.0 + (i % 6) as f64 * 5.0, cat)
            })
            .collect()
    }

    #[test]
    fn contamination_rate_holds_on_clean_data() {
        let history = clean_history();
        let (detector, metrics) = AnomalyDetector::train(&history).unwrap();

        assert_eq!(metrics.total_transactions, 40);
        // Contamination 0.1 over 40 rows: roughly 4 flagged
        assert!(
            (1..=8).contains(&metrics.detected_anomalies),
            "flagged {}",
            metrics.detected_anomalies
        );

        let reports = detector.detect_anomalies(&history).unwrap();
        assert_eq!(reports.len(), metrics.detected_anomalies);
    }

    #[test]
    fn reports_are_sorted_ascending_by_score() {
        let mut history = clean_history();
        history.push(tx(100, 45, 2, 4000.0, Category::Travel));

        let (detector, _) = AnomalyDetector::train(&history).unwrap();
        let reports = detector.detect_anomalies(&history).unwrap();

        assert!(!reports.is_empty());
        for pair in reports.windows(2) {
            assert!(pair[0].anomaly_score <= pair[1].anomaly_score);
        }
    }

    #[test]
    fn large_night_transaction_is_flagged_with_reasons() {
        let mut history = clean_history();
        history.push(tx(100, 45, 2, 4000.0, Category::Travel));

        let (detector, _) = AnomalyDetector::train(&history).unwrap();
        let reports = detector.detect_anomalies(&history).unwrap();

        let outlier = reports
            .iter()
            .find(|r| r.transaction_id == 100)
            .expect("outlier should be flagged");
        assert!(!outlier.reasons.is_empty());
        assert!(outlier
            .reasons
            .iter()
            .any(|r| r.contains("higher than usual")));
        assert_eq!(outlier.risk_level, RiskLevel::High);
    }

    #[test]
    fn severity_tiers_from_score() {
        assert_eq!(severity_of(-0.6), AnomalySeverity::High);
        assert_eq!(severity_of(-0.4), AnomalySeverity::Medium);
        assert_eq!(severity_of(-0.1), AnomalySeverity::Low);
    }

    #[test]
    fn insights_compare_recent_to_historical() {
        let history = clean_history();
        let (detector, _) = AnomalyDetector::train(&history).unwrap();
        let insights = detector.spending_insights(&history);

        assert!(insights.spending_trend.recent_avg_daily >= 0.0);
        assert!(insights.spending_trend.historical_avg_daily > 0.0);
    }
}
