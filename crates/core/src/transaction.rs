use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Money;

/// Where a bank credit (or a settlement row) originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    CourierA,
    CourierB,
    PaymentGateway,
    Marketplace,
    Other,
}

impl Source {
    pub fn is_courier(self) -> bool {
        matches!(self, Source::CourierA | Source::CourierB)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Source::CourierA => "courier_a",
            Source::CourierB => "courier_b",
            Source::PaymentGateway => "payment_gateway",
            Source::Marketplace => "marketplace",
            Source::Other => "other",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "courier_a" | "a" => Ok(Source::CourierA),
            "courier_b" | "b" => Ok(Source::CourierB),
            "payment_gateway" | "gateway" => Ok(Source::PaymentGateway),
            "marketplace" => Ok(Source::Marketplace),
            "other" => Ok(Source::Other),
            other => Err(format!("Unknown source: '{other}'")),
        }
    }
}

/// Canonical bank or settlement movement after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub reference: String,
    /// Signed; credits are positive.
    pub amount: Money,
    pub date: NaiveDate,
    pub source: Source,
    pub batch_id: Option<String>,
    pub details: String,
}

impl Transaction {
    /// Incoming money. Only credits take part in remittance matching.
    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }
}

/// Orders credits chronologically, breaking ties on reference so repeated
/// runs walk the statement identically.
pub fn sort_chronologically(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.reference.cmp(&b.reference)));
}
