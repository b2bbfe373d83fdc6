//! Model training, forecasting, and anomaly-detection handlers
//!
//! Minimum-transaction-count preconditions are enforced here before any
//! model work starts, so undersized histories fail fast with a client error.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState};
use finsight_core::ml::detector::SpendingInsights;
use finsight_core::ml::predictor::SpendingForecast;
use finsight_core::ml::{
    AnomalyReport, DetectorMetrics, PredictorMetrics, MIN_TRAINING_TRANSACTIONS,
};
use finsight_core::models::{validate_user_id, Transaction};
use finsight_core::recommend::{budget_recommendation, BudgetRecommendation};

/// Minimum transactions required by the anomaly-detection endpoint
const MIN_ANOMALY_TRANSACTIONS: usize = 20;

/// Minimum spending transactions required to train
const MIN_SPENDING_FOR_TRAIN: usize = 5;

fn load_history(state: &AppState, user_id: &str) -> Result<Vec<Transaction>, AppError> {
    if !validate_user_id(user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }
    Ok(state.db.user_history(user_id)?)
}

/// Response for model training
#[derive(Serialize)]
pub struct TrainResponse {
    pub message: String,
    pub user_id: String,
    pub transaction_count: usize,
    pub spending_transactions: usize,
    pub predictor_metrics: PredictorMetrics,
    pub anomaly_metrics: DetectorMetrics,
    pub predictor_version: u64,
    pub detector_version: u64,
}

/// POST /api/predictions/train/:user_id - Train prediction models for a user
pub async fn train_prediction_models(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<TrainResponse>, AppError> {
    let history = load_history(&state, &user_id)?;

    if history.len() < MIN_TRAINING_TRANSACTIONS {
        return Err(AppError::bad_request(
            "Need at least 10 transactions to train models",
        ));
    }

    let spending: Vec<Transaction> = history
        .iter()
        .filter(|t| !t.is_income)
        .cloned()
        .collect();
    if spending.len() < MIN_SPENDING_FOR_TRAIN {
        return Err(AppError::bad_request(
            "Need at least 5 spending transactions to train models",
        ));
    }

    let (predictor, predictor_metrics) = state.models.train_predictor(&user_id, &spending)?;
    let (detector, anomaly_metrics) = state.models.train_detector(&user_id, &spending)?;

    info!(user = %user_id, "Prediction models trained");

    Ok(Json(TrainResponse {
        message: "Models trained successfully".to_string(),
        user_id,
        transaction_count: history.len(),
        spending_transactions: spending.len(),
        predictor_metrics,
        anomaly_metrics,
        predictor_version: predictor.version,
        detector_version: detector.version,
    }))
}

/// Query parameters for the spending forecast
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
}

fn default_days_ahead() -> u32 {
    30
}

/// Response for the spending forecast
#[derive(Serialize)]
pub struct ForecastResponse {
    pub user_id: String,
    pub predictions: SpendingForecast,
    pub based_on_transactions: usize,
    pub model_version: u64,
}

/// GET /api/predictions/spending/:user_id - Forecast future spending
pub async fn predict_future_spending(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, AppError> {
    let history = load_history(&state, &user_id)?;

    let spending: Vec<Transaction> = history
        .iter()
        .filter(|t| !t.is_income)
        .cloned()
        .collect();
    if spending.len() < MIN_TRAINING_TRANSACTIONS {
        return Err(AppError::bad_request(
            "Need at least 10 transactions for predictions",
        ));
    }

    let days_ahead = params.days_ahead.clamp(1, 365);

    // Train lazily on first use for this user
    let trained = state.models.predictor_or_train(&user_id, &spending)?;
    let predictions = trained.model.predict_future_spending(&spending, days_ahead)?;

    Ok(Json(ForecastResponse {
        user_id,
        predictions,
        based_on_transactions: spending.len(),
        model_version: trained.version,
    }))
}

/// Response for anomaly detection
#[derive(Serialize)]
pub struct AnomalyResponse {
    pub user_id: String,
    pub anomalies: Vec<AnomalyReport>,
    pub anomaly_count: usize,
    pub total_transactions: usize,
    pub insights: SpendingInsights,
    pub model_version: u64,
}

/// GET /api/predictions/anomalies/:user_id - Detect anomalous spending
///
/// Side effect: every flagged transaction has its stored is_anomaly flag set.
pub async fn detect_spending_anomalies(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<AnomalyResponse>, AppError> {
    let history = load_history(&state, &user_id)?;

    if history.len() < MIN_ANOMALY_TRANSACTIONS {
        return Err(AppError::bad_request(
            "Need at least 20 transactions for anomaly detection",
        ));
    }

    // Train lazily on first use for this user
    let trained = state.models.detector_or_train(&user_id, &history)?;
    let anomalies = trained.model.detect_anomalies(&history)?;

    // Persist the anomaly flags
    let ids: Vec<i64> = anomalies.iter().map(|a| a.transaction_id).collect();
    let updated = state.db.mark_anomalies(&ids)?;
    info!(user = %user_id, flagged = updated, "Anomaly flags updated");

    let insights = trained.model.spending_insights(&history);

    Ok(Json(AnomalyResponse {
        user_id,
        anomaly_count: anomalies.len(),
        total_transactions: history.len(),
        anomalies,
        insights,
        model_version: trained.version,
    }))
}

/// Query parameters for the budget recommendation
#[derive(Debug, Deserialize)]
pub struct BudgetQuery {
    pub monthly_income: Option<f64>,
}

/// GET /api/predictions/budget-recommendation/:user_id - Budget recommendation
pub async fn get_budget_recommendation(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<BudgetQuery>,
) -> Result<Json<BudgetRecommendation>, AppError> {
    let history = load_history(&state, &user_id)?;

    if history.len() < MIN_TRAINING_TRANSACTIONS {
        return Err(AppError::bad_request(
            "Need at least 10 transactions for budget recommendations",
        ));
    }

    Ok(Json(budget_recommendation(&history, params.monthly_income)))
}
