//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use finsight_core::models::{
    sanitize_description, validate_amount, validate_user_id, Category, NewTransaction, Transaction,
};
use finsight_core::reports::{category_stats, CategoryStats};
use finsight_core::TransactionInsertResult;

/// Request body for creating a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub user_id: String,
    pub amount: f64,
    pub description: String,
    pub category: Option<Category>,
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_income: bool,
}

/// Validate a create request and categorize it when no label was supplied
///
/// Categorization failures are swallowed: the transaction is stored with the
/// default label (Other) and a fixed 0.5 confidence.
fn prepare_transaction(
    state: &AppState,
    req: &CreateTransactionRequest,
) -> Result<NewTransaction, AppError> {
    if !validate_user_id(&req.user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }
    if !validate_amount(req.amount) {
        return Err(AppError::bad_request("Invalid transaction amount"));
    }

    let description = sanitize_description(&req.description);
    if description.is_empty() {
        return Err(AppError::bad_request("Transaction description is required"));
    }

    let (predicted_category, confidence_score) = if req.category.is_none() {
        let predicted = state
            .models
            .categorizer()
            .and_then(|model| model.model.predict(&description));
        match predicted {
            Ok((category, confidence)) => (Some(category), Some(confidence)),
            Err(e) => {
                warn!(error = %e, "Categorization failed, using default label");
                (Some(Category::Other), Some(0.5))
            }
        }
    } else {
        (None, None)
    };

    Ok(NewTransaction {
        user_id: req.user_id.clone(),
        amount: req.amount,
        description,
        category: req.category.or(predicted_category),
        predicted_category,
        confidence_score,
        date: req.date.unwrap_or_else(Utc::now),
        is_income: req.is_income,
    })
}

/// POST /api/transactions - Create a transaction, categorizing when needed
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<Transaction>, AppError> {
    let new_tx = prepare_transaction(&state, &req)?;

    let id = match state.db.insert_transaction(&new_tx)? {
        TransactionInsertResult::Inserted(id) => id,
        // Idempotent create: duplicates return the stored row
        TransactionInsertResult::Duplicate(id) => id,
    };

    let stored = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::internal("Inserted transaction not found"))?;
    Ok(Json(stored))
}

/// Response for bulk creation
#[derive(Serialize)]
pub struct BulkCreateResponse {
    pub message: String,
    pub count: usize,
    pub duplicates: usize,
}

/// POST /api/transactions/bulk - Create multiple transactions at once
pub async fn create_bulk_transactions(
    State(state): State<Arc<AppState>>,
    Json(requests): Json<Vec<CreateTransactionRequest>>,
) -> Result<Json<BulkCreateResponse>, AppError> {
    if requests.is_empty() {
        return Err(AppError::bad_request("No transactions provided"));
    }

    let mut created = 0usize;
    let mut duplicates = 0usize;
    for req in &requests {
        let new_tx = prepare_transaction(&state, req)?;
        match state.db.insert_transaction(&new_tx)? {
            TransactionInsertResult::Inserted(_) => created += 1,
            TransactionInsertResult::Duplicate(_) => duplicates += 1,
        }
    }

    Ok(Json(BulkCreateResponse {
        message: format!("Created {} transactions", created),
        count: created,
        duplicates,
    }))
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// GET /api/transactions - List a user's transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    if !validate_user_id(&params.user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    // Input validation: clamp pagination parameters
    let limit = params.limit.max(1).min(MAX_PAGE_LIMIT);

    let transactions = state.db.list_transactions(&params.user_id, limit)?;
    Ok(Json(transactions))
}

/// GET /api/transactions/:id - Get a specific transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;
    Ok(Json(transaction))
}

/// Query parameters for category stats
#[derive(Debug, Deserialize)]
pub struct CategoryStatsQuery {
    pub user_id: String,
}

/// GET /api/transactions/categories/stats - Spending statistics by category
pub async fn get_category_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoryStatsQuery>,
) -> Result<Json<CategoryStats>, AppError> {
    if !validate_user_id(&params.user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    let history = state.db.user_history(&params.user_id)?;
    Ok(Json(category_stats(&history)))
}
