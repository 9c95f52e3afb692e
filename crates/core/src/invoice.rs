use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvoiceId(pub i64);

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An issued accounting invoice as returned by the invoicing system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub number: String,
    pub total: Money,
    pub issue_date: NaiveDate,
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceMatch {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub invoice_total: Money,
    pub used: bool,
}

impl InvoiceMatch {
    pub fn consumed(invoice: &Invoice) -> Self {
        InvoiceMatch {
            invoice_id: invoice.id,
            invoice_number: invoice.number.clone(),
            invoice_total: invoice.total,
            used: true,
        }
    }
}

/// Invoice ids already attributed during a run.
///
/// The same set must be threaded through every lookup of the run; an id in
/// here is never handed out again.
#[derive(Debug, Clone, Default)]
pub struct UsedInvoices(HashSet<InvoiceId>);

impl UsedInvoices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: InvoiceId) -> bool {
        self.0.contains(&id)
    }

    /// Returns `false` if the id was already used.
    pub fn claim(&mut self, id: InvoiceId) -> bool {
        self.0.insert(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of linking one amount (or order) to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Unmatched,
    AmountMatched,
    NumberMatched,
    NoInvoiceFound,
    /// Refunded marketplace order; linking is never attempted.
    Refunded,
}
