use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::money::Money;

/// Conditions that end a run without producing a report.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("No usable input data for {0}")]
    NoInputData(String),
    #[error("Configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

/// Problems recorded while a run continues. The report lists them in its
/// errors section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoftError {
    #[error("{source_name}: no column for '{column}'")]
    MissingColumn { source_name: String, column: String },
    #[error(
        "credit {reference}: no parcel combination reaches {target} (pool {pool_sum} over {pool_size} parcels{})",
        cap_note(.cap_hit)
    )]
    NoCombinationFound {
        reference: String,
        target: Money,
        pool_sum: Money,
        pool_size: usize,
        cap_hit: bool,
    },
    #[error("{reference}: no invoice for {amount}")]
    InvoiceNotFound { reference: String, amount: Money },
    #[error("{file}: skipped ({reason})")]
    MalformedPeriodFile { file: String, reason: String },
    #[error("{source_name} row {row}: {reason}")]
    MalformedRow {
        source_name: String,
        row: usize,
        reason: String,
    },
    #[error("period {period}: {reason}")]
    IncompletePeriod { period: String, reason: String },
}

fn cap_note(cap_hit: &bool) -> &'static str {
    if *cap_hit {
        ", search cap hit"
    } else {
        ""
    }
}

/// Collected soft errors for one run. Every entry is logged as it arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLog(Vec<SoftError>);

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: SoftError) {
        tracing::warn!("{error}");
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorLog) {
        self.0.extend(other.0);
    }

    pub fn entries(&self) -> &[SoftError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}
