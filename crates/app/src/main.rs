//! Ramburs CLI - cash-on-delivery reconciliation
//!
//! Usage:
//!   ramburs import-bank extras.csv
//!   ramburs import-parcels fan.csv --courier a
//!   ramburs import-invoices facturi.csv
//!   ramburs reconcile --from 2025-07 --out iulie.csv
//!   ramburs settle ./emag/iulie

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so JSON on stdout stays pipeable.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::ImportBank { file } => commands::cmd_import_bank(&cli.db, &config, &file).await,
        Commands::ImportParcels { file, courier } => {
            commands::cmd_import_parcels(&cli.db, &file, courier.into()).await
        }
        Commands::ImportInvoices { file } => commands::cmd_import_invoices(&cli.db, &file).await,
        Commands::Reconcile {
            from,
            to,
            gateway,
            marketplace,
            out,
        } => {
            let args = commands::ReconcileArgs {
                from,
                to,
                gateway,
                marketplace,
            };
            commands::cmd_reconcile(&cli.db, &config, &args, out.as_deref()).await
        }
        Commands::Settle { dir } => commands::cmd_settle(&config, &dir),
        Commands::Classify { text } => commands::cmd_classify(&config, &text),
    }
}
