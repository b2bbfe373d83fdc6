//! Transaction history export

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Transaction;

/// Export formats for the dashboard export endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// One exported row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: i64,
    pub date: String,
    pub amount: f64,
    pub description: String,
    pub category: Option<String>,
    pub predicted_category: Option<String>,
    pub is_income: bool,
    pub is_anomaly: bool,
    pub confidence_score: Option<f64>,
}

impl From<&Transaction> for ExportRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            date: tx.date.to_rfc3339(),
            amount: tx.amount,
            description: tx.description.clone(),
            category: tx.category.map(|c| c.as_str().to_string()),
            predicted_category: tx.predicted_category.map(|c| c.as_str().to_string()),
            is_income: tx.is_income,
            is_anomaly: tx.is_anomaly,
            confidence_score: tx.confidence_score,
        }
    }
}

/// JSON export payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    pub format: ExportFormat,
    pub data: Vec<ExportRow>,
    pub export_date: String,
    pub user_id: String,
    pub transaction_count: usize,
}

/// Build the JSON export payload for a user's history
pub fn export_json(user_id: &str, transactions: &[Transaction]) -> ExportPayload {
    ExportPayload {
        format: ExportFormat::Json,
        data: transactions.iter().map(ExportRow::from).collect(),
        export_date: Utc::now().to_rfc3339(),
        user_id: user_id.to_string(),
        transaction_count: transactions.len(),
    }
}

/// Render a user's history as CSV text
pub fn export_csv(transactions: &[Transaction]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for tx in transactions {
        writer.serialize(ExportRow::from(tx))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::InvalidData(format!("CSV buffer error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidData(format!("CSV encoding error: {}", e)))
}
