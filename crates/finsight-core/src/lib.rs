//! Finsight Core Library
//!
//! Shared functionality for the Finsight personal finance backend:
//! - Database access and migrations
//! - Transaction validation and categorization
//! - Spending prediction and anomaly detection models
//! - Dashboard aggregation and insight rules
//! - Budget, investment, and savings recommendations
//! - Transaction export

pub mod db;
pub mod error;
pub mod export;
pub mod insights;
pub mod ml;
pub mod models;
pub mod recommend;
pub mod reports;

pub use db::{Database, TransactionInsertResult};
pub use error::{Error, Result};
pub use export::{ExportFormat, ExportPayload};
pub use insights::{generate_insights, Insight, InsightType};
pub use ml::{
    AnomalyDetector, AnomalyReport, Categorizer, ModelRegistry, SpendingForecast,
    SpendingPredictor, MIN_TRAINING_TRANSACTIONS,
};
pub use models::{Category, NewTransaction, Transaction};
pub use reports::{dashboard_overview, DashboardOverview};
