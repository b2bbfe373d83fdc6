//! Finsight CLI - personal finance backend
//!
//! Usage:
//!   finsight init                 Initialize database
//!   finsight seed --user demo     Generate demo transactions
//!   finsight serve --port 8000    Start web server
//!   finsight categorize "uber"    Classify a description

mod cli;
mod commands;
mod demo;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve { port, host } => {
            commands::cmd_serve(&cli.db, &host, port, cli.no_encrypt).await
        }
        Commands::Seed { user, days, seed } => {
            commands::cmd_seed(&cli.db, &user, days, seed, cli.no_encrypt)
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
        Commands::Categorize { description } => commands::cmd_categorize(&description),
    }
}
