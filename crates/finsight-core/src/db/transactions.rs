//! Transaction operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Category, NewTransaction, Transaction};

/// Result of inserting a transaction
#[derive(Debug, Clone)]
pub enum TransactionInsertResult {
    /// Transaction was inserted successfully, contains new transaction ID
    Inserted(i64),
    /// Transaction was a duplicate, contains existing transaction ID
    Duplicate(i64),
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let category: Option<String> = row.get(4)?;
    let predicted: Option<String> = row.get(5)?;
    let date: String = row.get(7)?;
    let created_at: String = row.get(11)?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        category: category.and_then(|s| s.parse::<Category>().ok()),
        predicted_category: predicted.and_then(|s| s.parse::<Category>().ok()),
        confidence_score: row.get(6)?,
        date: parse_datetime(&date),
        is_income: row.get(8)?,
        is_anomaly: row.get(9)?,
        content_hash: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
        created_at: parse_datetime(&created_at),
    })
}

const SELECT_COLUMNS: &str = "id, user_id, amount, description, category, predicted_category, \
     confidence_score, date, is_income, is_anomaly, content_hash, created_at";

impl Database {
    /// Insert a transaction, skipping duplicates based on content hash
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<TransactionInsertResult> {
        let conn = self.conn()?;
        let hash = tx.content_hash();

        // Check for duplicate
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE content_hash = ?",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(existing_id) = existing {
            return Ok(TransactionInsertResult::Duplicate(existing_id));
        }

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, amount, description, category, predicted_category, confidence_score, date, is_income, content_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                tx.amount,
                tx.description,
                tx.category.map(|c| c.as_str()),
                tx.predicted_category.map(|c| c.as_str()),
                tx.confidence_score,
                tx.date.to_rfc3339(),
                tx.is_income,
                hash,
            ],
        )?;

        Ok(TransactionInsertResult::Inserted(conn.last_insert_rowid()))
    }

    /// Get a single transaction by id
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM transactions WHERE id = ?", SELECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], row_to_transaction)
            .optional()?)
    }

    /// List a user's transactions, newest first
    pub fn list_transactions(&self, user_id: &str, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, limit], row_to_transaction)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Load a user's full history in date order (oldest first)
    ///
    /// The ML pipelines and reports consume this as an in-memory collection;
    /// the rolling-window features depend on the ascending date order.
    pub fn user_history(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date ASC, id ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], row_to_transaction)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Count a user's transactions
    pub fn count_transactions(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    /// Count all transactions and distinct users (for status output)
    pub fn transaction_stats(&self) -> Result<(i64, i64)> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT user_id) FROM transactions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }

    /// Flip the anomaly flag on the given transaction ids
    ///
    /// Returns the number of rows updated. The flag only moves false -> true;
    /// re-running detection never clears prior flags.
    pub fn mark_anomalies(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn()?;
        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            "UPDATE transactions SET is_anomaly = 1 WHERE id IN ({})",
            placeholders.join(", ")
        );
        let params: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        Ok(conn.execute(&sql, params.as_slice())?)
    }
}
