//! Dashboard handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use finsight_core::export::{export_csv, export_json, ExportFormat, ExportPayload};
use finsight_core::models::validate_user_id;
use finsight_core::reports::{chart_data_for, dashboard_overview, ChartData, DashboardOverview};

/// GET /api/dashboard/overview/:user_id - Full dashboard for a user
pub async fn get_dashboard_overview(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<DashboardOverview>, AppError> {
    if !validate_user_id(&user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    let history = state.db.user_history(&user_id)?;
    Ok(Json(dashboard_overview(&user_id, &history)))
}

/// Query parameters for the charts endpoint
#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub chart_type: String,
}

#[derive(Serialize)]
pub struct ChartResponse {
    pub data: ChartData,
    pub chart_type: String,
}

/// GET /api/dashboard/charts/:user_id - Chart data for dashboard visualizations
pub async fn get_chart_data(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ChartQuery>,
) -> Result<Json<ChartResponse>, AppError> {
    if !validate_user_id(&user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    let history = state.db.user_history(&user_id)?;
    let data = chart_data_for(&history, &params.chart_type)?;
    Ok(Json(ChartResponse {
        data,
        chart_type: params.chart_type,
    }))
}

/// Query parameters for export
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

/// Export response: a structured JSON payload, or CSV text wrapped with its
/// suggested filename
#[derive(Serialize)]
#[serde(untagged)]
pub enum ExportResponse {
    Json(ExportPayload),
    Csv {
        format: ExportFormat,
        filename: String,
        data: String,
    },
}

/// GET /api/dashboard/export/:user_id - Export a user's financial data
pub async fn export_financial_data(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ExportQuery>,
) -> Result<Json<ExportResponse>, AppError> {
    if !validate_user_id(&user_id) {
        return Err(AppError::bad_request("Invalid user ID format"));
    }

    let format: ExportFormat = params
        .format
        .as_deref()
        .unwrap_or("json")
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    let history = state.db.user_history(&user_id)?;
    if history.is_empty() {
        return Err(AppError::not_found("No transactions found"));
    }

    let response = match format {
        ExportFormat::Json => ExportResponse::Json(export_json(&user_id, &history)),
        ExportFormat::Csv => ExportResponse::Csv {
            format,
            filename: format!(
                "finsight_export_{}_{}.csv",
                user_id,
                chrono::Utc::now().format("%Y%m%d")
            ),
            data: export_csv(&history)?,
        },
    };
    Ok(Json(response))
}
