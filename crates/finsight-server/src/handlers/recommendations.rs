//! Recommendation handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use finsight_core::models::{validate_user_id, RiskTolerance};
use finsight_core::recommend::{
    investment_recommendations, savings_goals, spending_optimization, InvestmentRecommendations,
    SavingsGoalsRecommendation, SpendingOptimization,
};

/// Query parameters for investment recommendations
#[derive(Debug, Deserialize)]
pub struct InvestmentQuery {
    pub risk_tolerance: Option<String>,
}

/// GET /api/recommendations/investment/:user_id - Investment recommendations
pub async fn get_investment_recommendations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<InvestmentQuery>,
) -> Result<Json<InvestmentRecommendations>, AppError> {
    if !validate_user_id(&user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    // Unrecognized tolerances fall back to moderate
    let risk_tolerance: RiskTolerance = params
        .risk_tolerance
        .as_deref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(RiskTolerance::Moderate);

    let history = state.db.user_history(&user_id)?;
    if history.len() < 10 {
        return Err(AppError::bad_request(
            "Need at least 10 transactions for investment recommendations",
        ));
    }

    Ok(Json(investment_recommendations(&history, risk_tolerance)))
}

/// GET /api/recommendations/savings-goals/:user_id - Savings goal plan
pub async fn get_savings_goals(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SavingsGoalsRecommendation>, AppError> {
    if !validate_user_id(&user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    let history = state.db.user_history(&user_id)?;
    if history.len() < 5 {
        return Err(AppError::bad_request(
            "Need at least 5 transactions for savings recommendations",
        ));
    }

    Ok(Json(savings_goals(&history)))
}

/// GET /api/recommendations/spending-optimization/:user_id - Optimization report
pub async fn get_spending_optimization(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SpendingOptimization>, AppError> {
    if !validate_user_id(&user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    let history = state.db.user_history(&user_id)?;
    let spending_count = history.iter().filter(|t| !t.is_income).count();
    if spending_count < 10 {
        return Err(AppError::bad_request(
            "Need at least 10 spending transactions for optimization analysis",
        ));
    }

    Ok(Json(spending_optimization(&history)))
}
