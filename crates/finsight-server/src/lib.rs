//! Finsight Web Server
//!
//! Axum-based REST API for the Finsight personal finance backend.
//!
//! Request flow: handlers validate inputs, load the user's history from the
//! database, and hand the in-memory collection to the core reports/models.
//! Trained model state lives in the shared [`ModelRegistry`]. There is no
//! authentication layer; the server carries a restrictive CORS policy,
//! security headers, and request tracing.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

use finsight_core::db::Database;
use finsight_core::ml::ModelRegistry;

mod handlers;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Environment variable holding comma-separated allowed CORS origins
pub const ALLOWED_ORIGINS_ENV: &str = "FINSIGHT_ALLOWED_ORIGINS";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Read configuration from the environment
    pub fn from_env() -> Self {
        let allowed_origins = std::env::var(ALLOWED_ORIGINS_ENV)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Self { allowed_origins }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    /// Owned, versioned trained-model storage shared across requests
    pub models: ModelRegistry,
}

/// Create the application router
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        models: ModelRegistry::new(),
    });

    let api_routes = Router::new()
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/bulk", post(handlers::create_bulk_transactions))
        .route(
            "/transactions/categories/stats",
            get(handlers::get_category_stats),
        )
        .route("/transactions/:id", get(handlers::get_transaction))
        // Dashboard
        .route(
            "/dashboard/overview/:user_id",
            get(handlers::get_dashboard_overview),
        )
        .route("/dashboard/charts/:user_id", get(handlers::get_chart_data))
        .route(
            "/dashboard/export/:user_id",
            get(handlers::export_financial_data),
        )
        // Predictions
        .route(
            "/predictions/train/:user_id",
            post(handlers::train_prediction_models),
        )
        .route(
            "/predictions/spending/:user_id",
            get(handlers::predict_future_spending),
        )
        .route(
            "/predictions/anomalies/:user_id",
            get(handlers::detect_spending_anomalies),
        )
        .route(
            "/predictions/budget-recommendation/:user_id",
            get(handlers::get_budget_recommendation),
        )
        // Recommendations
        .route(
            "/recommendations/investment/:user_id",
            get(handlers::get_investment_recommendations),
        )
        .route(
            "/recommendations/savings-goals/:user_id",
            get(handlers::get_savings_goals),
        )
        .route(
            "/recommendations/spending-optimization/:user_id",
            get(handlers::get_spending_optimization),
        );

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn conflict(msg: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<finsight_core::Error> for AppError {
    fn from(err: finsight_core::Error) -> Self {
        use finsight_core::Error;
        match err {
            Error::InvalidData(msg) | Error::InsufficientData(msg) => Self::bad_request(&msg),
            Error::NotFound(msg) => Self::not_found(&msg),
            Error::ModelNotTrained(msg) => Self::conflict(&msg),
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(other.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests;
