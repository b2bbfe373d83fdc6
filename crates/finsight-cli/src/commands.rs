//! Command implementations

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use finsight_core::db::Database;
use finsight_core::ml::Categorizer;
use finsight_core::TransactionInsertResult;
use finsight_server::ServerConfig;

use crate::demo;

/// Open the database, honoring the --no-encrypt flag
pub fn open_db(path: &str, no_encrypt: bool) -> Result<Database> {
    let db = if no_encrypt {
        Database::new_unencrypted(path)?
    } else {
        Database::new(path)?
    };
    Ok(db)
}

pub fn cmd_init(db_path: &str, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    println!("Database initialized at {}", db.path());
    Ok(())
}

pub async fn cmd_serve(db_path: &str, host: &str, port: u16, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    finsight_server::serve(db, host, port, ServerConfig::from_env()).await
}

pub fn cmd_seed(
    db_path: &str,
    user: &str,
    days: u32,
    seed: Option<u64>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let transactions = demo::generate(user, days, &mut rng);

    let mut inserted = 0usize;
    let mut duplicates = 0usize;
    for tx in &transactions {
        match db.insert_transaction(tx)? {
            TransactionInsertResult::Inserted(_) => inserted += 1,
            TransactionInsertResult::Duplicate(_) => duplicates += 1,
        }
    }

    info!(user, inserted, duplicates, "Demo data seeded");
    println!(
        "Seeded {} transactions for {} ({} duplicates skipped)",
        inserted, user, duplicates
    );
    Ok(())
}

pub fn cmd_status(db_path: &str, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let (transactions, users) = db.transaction_stats()?;

    println!("Database: {}", db.path());
    println!("Transactions: {}", transactions);
    println!("Users: {}", users);
    Ok(())
}

pub fn cmd_categorize(description: &str) -> Result<()> {
    let model = Categorizer::train().context("Failed to train categorizer")?;
    let (category, confidence) = model
        .predict(description)
        .context("Failed to categorize description")?;

    println!("{} ({:.1}% confidence)", category, confidence * 100.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_then_status_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let path = path.to_str().unwrap();

        cmd_seed(path, "demo_user", 10, Some(7), true).unwrap();

        let db = open_db(path, true).unwrap();
        let (transactions, users) = db.transaction_stats().unwrap();
        assert!(transactions >= 10);
        assert_eq!(users, 1);
    }

    #[test]
    fn encrypted_open_requires_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.db");

        // No FINSIGHT_DB_KEY in the test environment
        std::env::remove_var(finsight_core::db::DB_KEY_ENV);
        assert!(open_db(path.to_str().unwrap(), false).is_err());
    }
}
