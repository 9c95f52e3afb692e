//! Invoice lookup with at-most-once consumption.

use chrono::{Duration, NaiveDate};
use ramburs_core::{Invoice, InvoiceMatch, LinkStatus, Money, UsedInvoices};
use ramburs_import::util::name_similarity;
use std::cmp::Reverse;

/// Extra context used to choose between invoices with the same amount.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkHint<'a> {
    pub client_name: Option<&'a str>,
    pub date: Option<NaiveDate>,
}

/// Invoices available to one run, in scan order.
#[derive(Debug, Clone, Default)]
pub struct InvoiceBook {
    invoices: Vec<Invoice>,
}

impl InvoiceBook {
    pub fn new(invoices: Vec<Invoice>) -> Self {
        Self { invoices }
    }

    /// Keeps invoices issued in the `lookback_days` before `as_of`, inclusive.
    pub fn within_lookback(invoices: Vec<Invoice>, as_of: NaiveDate, lookback_days: i64) -> Self {
        let from = as_of - Duration::days(lookback_days);
        Self {
            invoices: invoices
                .into_iter()
                .filter(|i| i.issue_date >= from && i.issue_date <= as_of)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }

    /// First unused invoice whose total is within `tolerance` of `amount`.
    /// With several candidates the closest client name wins, then the closest
    /// issue date, then scan order. The winner is claimed in `used`.
    pub fn find_invoice(
        &self,
        amount: Money,
        used: &mut UsedInvoices,
        tolerance: Money,
        hint: LinkHint<'_>,
    ) -> Option<InvoiceMatch> {
        let best = self
            .invoices
            .iter()
            .enumerate()
            .filter(|(_, inv)| !used.contains(inv.id) && inv.total.within(amount, tolerance))
            .min_by_key(|(pos, inv)| {
                let similarity = match (hint.client_name, inv.client_name.as_deref()) {
                    (Some(wanted), Some(client)) => (name_similarity(wanted, client) * 10_000.0) as i64,
                    _ => 0,
                };
                let distance = hint
                    .date
                    .map(|d| (inv.issue_date - d).num_days().abs())
                    .unwrap_or(0);
                (Reverse(similarity), distance, *pos)
            })
            .map(|(_, inv)| inv)?;

        used.claim(best.id);
        Some(InvoiceMatch::consumed(best))
    }

    /// Resolves by invoice number: normalized equality first, then either
    /// number containing the other.
    pub fn find_invoice_by_number(&self, number: &str, used: &mut UsedInvoices) -> Option<InvoiceMatch> {
        let wanted = compact(number);
        if wanted.is_empty() {
            return None;
        }
        let taken: &UsedInvoices = used;
        let available = || self.invoices.iter().filter(move |i| !taken.contains(i.id));

        let found = available().find(|i| compact(&i.number) == wanted).or_else(|| {
            available().find(|i| {
                let have = compact(&i.number);
                !have.is_empty() && (have.contains(&wanted) || wanted.contains(&have))
            })
        })?;

        let id = found.id;
        let result = InvoiceMatch::consumed(found);
        used.claim(id);
        Some(result)
    }

    /// Amount lookup, then number lookup when `number` is given.
    pub fn link(
        &self,
        amount: Money,
        number: Option<&str>,
        used: &mut UsedInvoices,
        tolerance: Money,
        hint: LinkHint<'_>,
    ) -> (LinkStatus, Option<InvoiceMatch>) {
        if let Some(m) = self.find_invoice(amount, used, tolerance, hint) {
            return (LinkStatus::AmountMatched, Some(m));
        }
        if let Some(m) = number.and_then(|n| self.find_invoice_by_number(n, used)) {
            return (LinkStatus::NumberMatched, Some(m));
        }
        (LinkStatus::NoInvoiceFound, None)
    }
}

/// Uppercase alphanumerics only: `fct-0101` and `FCT 0101` compare equal.
fn compact(number: &str) -> String {
    number
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
