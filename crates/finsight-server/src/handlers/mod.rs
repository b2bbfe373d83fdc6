//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod dashboard;
pub mod predictions;
pub mod recommendations;
pub mod transactions;

// Re-export all handlers for use in router
pub use dashboard::*;
pub use predictions::*;
pub use recommendations::*;
pub use transactions::*;

use axum::Json;

/// GET / - Service banner
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Finsight API - Intelligent Personal Finance Advisor"
    }))
}

/// GET /health - Liveness check
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "finsight"
    }))
}
