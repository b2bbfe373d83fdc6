//! CLI argument definitions

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "finsight")]
#[command(about = "Personal finance backend with spending prediction and anomaly detection")]
#[command(version)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, global = true, default_value = "finsight.db")]
    pub db: String,

    /// Use an unencrypted database (not recommended for production)
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Generate and insert demo transactions for a user
    Seed {
        /// User to seed
        #[arg(long, default_value = "demo_user")]
        user: String,

        /// Days of history to generate
        #[arg(long, default_value = "90")]
        days: u32,

        /// RNG seed for reproducible demo data
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show database status
    Status,

    /// Categorize a description without storing anything
    Categorize {
        /// Transaction description to classify
        description: String,
    },
}
