//! CLI argument definitions using clap
//!
//! Command implementations live in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ramburs_core::{ReportingMonth, Source};

/// Ramburs - reconcile bank credits against parcels, settlements and invoices
#[derive(Parser)]
#[command(name = "ramburs")]
#[command(about = "Cash-on-delivery and marketplace settlement reconciliation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "ramburs.db", global = true)]
    pub db: PathBuf,

    /// TOML configuration file (defaults to ./ramburs.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import bank statement credits from CSV
    ImportBank {
        /// Statement export
        file: PathBuf,
    },

    /// Import a courier parcel export from CSV
    ImportParcels {
        /// Parcel export
        file: PathBuf,

        /// Which courier produced the export
        #[arg(long, value_enum)]
        courier: CourierArg,
    },

    /// Import issued invoices from CSV
    ImportInvoices {
        /// Invoice register export
        file: PathBuf,
    },

    /// Reconcile one or more months and print the reports as JSON
    Reconcile {
        /// First month (YYYY-MM)
        #[arg(long)]
        from: ReportingMonth,

        /// Last month, inclusive (defaults to --from)
        #[arg(long)]
        to: Option<ReportingMonth>,

        /// Payment gateway settlement CSV
        #[arg(long)]
        gateway: Option<PathBuf>,

        /// Folder with marketplace settlement reports
        #[arg(long)]
        marketplace: Option<PathBuf>,

        /// Also write the flat CSV export here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Aggregate a folder of marketplace settlement reports
    Settle {
        /// Folder with dp_/dc_/dcs_/dv_ report files
        dir: PathBuf,
    },

    /// Show which source a bank statement detail line belongs to
    Classify {
        /// Free text, e.g. the details column of a statement row
        text: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CourierArg {
    A,
    B,
}

impl From<CourierArg> for Source {
    fn from(arg: CourierArg) -> Self {
        match arg {
            CourierArg::A => Source::CourierA,
            CourierArg::B => Source::CourierB,
        }
    }
}
