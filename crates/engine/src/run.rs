//! One reconciliation run over fully materialized inputs.

use ramburs_core::{
    DateRange, ErrorLog, Invoice, InvoiceMatch, LinkStatus, Money, Parcel, ReconConfig, ReconError, SoftError,
    Source, Transaction, UsedInvoices,
};
use ramburs_core::transaction::sort_chronologically;
use std::collections::HashSet;

use crate::gateway::{group_batches, match_batches};
use crate::invoice::{InvoiceBook, LinkHint};
use crate::remittance::match_remittances;
use crate::report::{GatewayLine, OrderLink, ParcelLink, PeriodLine, ReconReport, RemittanceLine, Summary};
use crate::settlement::{aggregate_periods, SettlementFile, SettlementOutcome};

/// Inputs for one run. Everything is loaded before matching starts.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub period: DateRange,
    /// Bank credits; only those dated inside `period` are reconciled.
    pub credits: Vec<Transaction>,
    /// All known parcels; earlier unmatched ones stay eligible.
    pub parcels: Vec<Parcel>,
    pub gateway_rows: Vec<Transaction>,
    pub settlement_files: Vec<SettlementFile>,
    pub invoices: Vec<Invoice>,
    /// Soft errors raised while loading the inputs.
    pub errors: ErrorLog,
}

impl ReconInput {
    pub fn new(period: DateRange) -> Self {
        Self {
            period,
            credits: Vec::new(),
            parcels: Vec::new(),
            gateway_rows: Vec::new(),
            settlement_files: Vec::new(),
            invoices: Vec::new(),
            errors: ErrorLog::new(),
        }
    }
}

struct Linker<'a> {
    book: InvoiceBook,
    used: &'a mut UsedInvoices,
    tolerance: Money,
    errors: &'a mut ErrorLog,
    linked: usize,
}

impl Linker<'_> {
    fn link(
        &mut self,
        reference: &str,
        amount: Money,
        number: Option<&str>,
        hint: LinkHint<'_>,
    ) -> (LinkStatus, Option<InvoiceMatch>) {
        let (status, invoice) = self.book.link(amount, number, self.used, self.tolerance, hint);
        if invoice.is_some() {
            self.linked += 1;
        } else {
            self.errors.record(SoftError::InvoiceNotFound {
                reference: reference.to_string(),
                amount,
            });
        }
        (status, invoice)
    }

    fn order(&mut self, reference: &str, amount: Money, refunded: bool, hint: LinkHint<'_>) -> OrderLink {
        let (link, invoice) = if refunded {
            (LinkStatus::Refunded, None)
        } else {
            self.link(reference, amount, Some(reference), hint)
        };
        OrderLink {
            reference: reference.to_string(),
            amount,
            link,
            invoice,
        }
    }
}

/// Runs matching, aggregation and invoice linking for `input.period`.
///
/// Invoices are consumed in a fixed order: courier parcels, gateway orders,
/// marketplace orders. Fails with [`ReconError::NoInputData`] only when no
/// source yielded anything to reconcile.
pub fn reconcile(input: ReconInput, config: &ReconConfig) -> Result<ReconReport, ReconError> {
    reconcile_with(input, config, &mut UsedInvoices::new())
}

/// [`reconcile`] with a caller-owned set of consumed invoices, so runs over
/// consecutive periods never attribute the same invoice twice. Invoices are
/// claimed in `used` only when the run succeeds.
pub fn reconcile_with(
    input: ReconInput,
    config: &ReconConfig,
    used: &mut UsedInvoices,
) -> Result<ReconReport, ReconError> {
    let ReconInput {
        period,
        credits,
        parcels,
        gateway_rows,
        settlement_files,
        invoices,
        mut errors,
    } = input;

    let credits: Vec<Transaction> = credits
        .into_iter()
        .filter(|t| t.is_credit() && period.contains(t.date))
        .collect();
    let has_other_data = !credits.is_empty() || !parcels.is_empty() || !gateway_rows.is_empty();
    if !has_other_data && settlement_files.is_empty() {
        return Err(ReconError::NoInputData(period.to_string()));
    }

    let settlement = if settlement_files.is_empty() {
        SettlementOutcome::default()
    } else {
        match aggregate_periods(&settlement_files, &config.tax) {
            Ok(outcome) => outcome,
            Err(ReconError::NoInputData(what)) if has_other_data => {
                errors.record(SoftError::IncompletePeriod {
                    period: period.to_string(),
                    reason: format!("no usable data in {what}"),
                });
                SettlementOutcome::default()
            }
            Err(e) => return Err(e),
        }
    };

    let remittances = match_remittances(&credits, parcels, &config.matching);
    errors.extend(remittances.errors);
    errors.extend(settlement.errors);

    let tolerance = config.matching.tolerance;
    let mut linker = Linker {
        book: InvoiceBook::within_lookback(invoices, period.end, config.invoices.lookback_days),
        used,
        tolerance: config.invoices.tolerance,
        errors: &mut errors,
        linked: 0,
    };

    let remittance_lines: Vec<RemittanceLine> = remittances
        .matched
        .into_iter()
        .map(|m| {
            let parcels = m
                .parcels
                .into_iter()
                .map(|parcel| {
                    let hint = LinkHint {
                        client_name: Some(parcel.recipient_name.as_str()).filter(|n| !n.is_empty()),
                        date: Some(parcel.delivery_date),
                    };
                    let (link, invoice) = linker.link(&parcel.parcel_number, parcel.cod_amount, None, hint);
                    ParcelLink { parcel, link, invoice }
                })
                .collect();
            RemittanceLine {
                bank_reference: m.bank_reference,
                bank_date: m.bank_date,
                source: m.source,
                credit_amount: m.credit_amount,
                matched_sum: m.matched_sum,
                parcels,
            }
        })
        .collect();

    let batches = group_batches(&gateway_rows);
    let batch_matches = match_batches(&batches, &credits, tolerance);
    let gateway_lines: Vec<GatewayLine> = batches
        .iter()
        .zip(batch_matches)
        .map(|(batch, matched)| GatewayLine {
            batch: matched,
            orders: batch
                .rows
                .iter()
                .map(|row| {
                    let hint = LinkHint {
                        client_name: None,
                        date: Some(row.date),
                    };
                    linker.order(&row.reference, row.amount, row.amount.is_negative(), hint)
                })
                .collect(),
        })
        .collect();

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut marketplace_credits: Vec<Transaction> = credits
        .iter()
        .filter(|t| t.source == Source::Marketplace)
        .cloned()
        .collect();
    sort_chronologically(&mut marketplace_credits);
    let period_lines: Vec<PeriodLine> = settlement
        .periods
        .into_iter()
        .map(|settlement_period| {
            let key = settlement_period.period;
            let credit = marketplace_credits
                .iter()
                .enumerate()
                .find(|(i, c)| {
                    !claimed.contains(i)
                        && c.date >= key.end
                        && c.amount.within(settlement_period.net_total, tolerance)
                })
                .map(|(i, c)| {
                    claimed.insert(i);
                    c
                });
            let orders = settlement
                .orders
                .iter()
                .filter(|o| o.period == key)
                .map(|o| linker.order(&o.order_id, o.amount, o.refunded, LinkHint::default()))
                .collect();
            PeriodLine {
                bank_reference: credit.map(|c| c.reference.clone()),
                bank_date: credit.map(|c| c.date),
                settlement: settlement_period,
                orders,
            }
        })
        .collect();

    let invoices_linked = linker.linked;

    let summary = Summary {
        credits: credits.len(),
        matched_credits: remittance_lines.len()
            + gateway_lines.iter().filter(|g| g.batch.bank_reference.is_some()).count()
            + period_lines.iter().filter(|p| p.bank_reference.is_some()).count(),
        matched_total: remittance_lines.iter().map(|r| r.matched_sum).sum(),
        pending_parcels: remittances.pending.len(),
        pending_total: remittances.pending_total,
        gateway_batches: gateway_lines.len(),
        settlement_periods: period_lines.len(),
        invoices_linked,
        soft_errors: errors.len(),
    };

    tracing::info!(
        period = %period,
        credits = summary.credits,
        matched = summary.matched_credits,
        pending = summary.pending_parcels,
        pending_total = %summary.pending_total,
        errors = summary.soft_errors,
        "reconciliation finished"
    );

    Ok(ReconReport {
        period,
        summary,
        remittances: remittance_lines,
        unmatched_credits: remittances.unmatched_credits,
        pending: remittances.pending,
        pending_total: remittances.pending_total,
        gateway: gateway_lines,
        periods: period_lines,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ramburs_core::InvoiceId;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn july() -> DateRange {
        DateRange::new(date(7, 1), date(7, 31))
    }

    fn parcel(number: &str, cod: &str, day: u32, recipient: &str) -> Parcel {
        Parcel {
            parcel_number: number.into(),
            courier: Source::CourierA,
            cod_amount: money(cod),
            delivery_date: date(7, day),
            recipient_name: recipient.into(),
            recipient_city: String::new(),
            is_delivered: true,
            matched: false,
        }
    }

    fn credit(reference: &str, source: Source, amount: &str, on: NaiveDate) -> Transaction {
        Transaction {
            reference: reference.into(),
            amount: money(amount),
            date: on,
            source,
            batch_id: None,
            details: String::new(),
        }
    }

    fn invoice(id: i64, total: &str, client: &str) -> Invoice {
        Invoice {
            id: InvoiceId(id),
            number: format!("FCT-{id}"),
            total: money(total),
            issue_date: date(7, 1),
            client_name: Some(client.into()),
        }
    }

    #[test]
    fn empty_input_is_fatal() {
        let result = reconcile(ReconInput::new(july()), &ReconConfig::default());
        assert!(matches!(result, Err(ReconError::NoInputData(_))));
    }

    #[test]
    fn credits_outside_period_do_not_count() {
        let mut input = ReconInput::new(july());
        input.credits = vec![credit("OP1", Source::CourierA, "10.00", date(8, 2))];
        assert!(reconcile(input, &ReconConfig::default()).is_err());
    }

    #[test]
    fn parcels_link_to_invoices_by_amount_and_name() {
        let mut input = ReconInput::new(july());
        input.credits = vec![credit("OP1", Source::CourierA, "75.49", date(7, 4))];
        input.parcels = vec![
            parcel("P1", "30.00", 1, "Ion Pop"),
            parcel("P2", "45.50", 1, "Ana Pop"),
            parcel("P3", "19.99", 2, "Dan Pop"),
        ];
        input.invoices = vec![
            invoice(1, "45.50", "Maria Ionescu"),
            invoice(2, "45.50", "Ana Pop"),
            invoice(3, "30.00", "Ion Pop"),
        ];

        let report = reconcile(input, &ReconConfig::default()).unwrap();

        assert_eq!(report.remittances.len(), 1);
        let parcels = &report.remittances[0].parcels;
        assert_eq!(parcels[0].invoice.as_ref().unwrap().invoice_id, InvoiceId(3));
        assert_eq!(parcels[1].invoice.as_ref().unwrap().invoice_id, InvoiceId(2));
        assert_eq!(parcels[1].link, LinkStatus::AmountMatched);
        assert_eq!(report.pending.len(), 1);
        assert_eq!(report.pending_total, money("19.99"));
        assert_eq!(report.summary.invoices_linked, 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn missing_invoice_is_reported_not_fatal() {
        let mut input = ReconInput::new(july());
        input.credits = vec![credit("OP1", Source::CourierA, "10.00", date(7, 4))];
        input.parcels = vec![parcel("P1", "10.00", 1, "")];

        let report = reconcile(input, &ReconConfig::default()).unwrap();

        assert_eq!(report.remittances[0].parcels[0].link, LinkStatus::NoInvoiceFound);
        assert_eq!(
            report.errors.entries(),
            &[SoftError::InvoiceNotFound {
                reference: "P1".into(),
                amount: money("10.00"),
            }]
        );
    }

    #[test]
    fn shared_used_set_spans_consecutive_periods() {
        let august = DateRange::new(date(8, 1), date(8, 31));
        let invoices = vec![invoice(1, "30.00", "Ion Pop")];
        let mut used = UsedInvoices::new();

        let mut first = ReconInput::new(july());
        first.credits = vec![credit("OP1", Source::CourierA, "30.00", date(7, 4))];
        first.parcels = vec![parcel("P1", "30.00", 1, "Ion Pop")];
        first.invoices = invoices.clone();
        let report = reconcile_with(first, &ReconConfig::default(), &mut used).unwrap();
        assert_eq!(report.remittances[0].parcels[0].link, LinkStatus::AmountMatched);

        let mut second = ReconInput::new(august);
        second.credits = vec![credit("OP2", Source::CourierA, "30.00", date(8, 4))];
        let mut p2 = parcel("P2", "30.00", 1, "Ion Pop");
        p2.delivery_date = date(8, 1);
        second.parcels = vec![p2];
        second.invoices = invoices;
        let report = reconcile_with(second, &ReconConfig::default(), &mut used).unwrap();

        let line = &report.remittances[0].parcels[0];
        assert_eq!(line.link, LinkStatus::NoInvoiceFound);
        assert!(line.invoice.is_none());
        assert_eq!(used.len(), 1);
    }

    #[test]
    fn failed_run_claims_nothing() {
        let mut used = UsedInvoices::new();
        let result = reconcile_with(ReconInput::new(july()), &ReconConfig::default(), &mut used);
        assert!(result.is_err());
        assert!(used.is_empty());
    }

    #[test]
    fn gateway_refund_rows_are_never_linked() {
        let mut input = ReconInput::new(july());
        let mut gw = credit("A1", Source::PaymentGateway, "100.00", date(7, 14));
        gw.batch_id = Some("4512".into());
        let mut refund = credit("A2", Source::PaymentGateway, "-20.00", date(7, 14));
        refund.batch_id = Some("4512".into());
        input.gateway_rows = vec![gw, refund];
        let mut bank = credit("OP7", Source::PaymentGateway, "80.00", date(7, 16));
        bank.batch_id = Some("004512".into());
        input.credits = vec![bank];
        input.invoices = vec![invoice(1, "100.00", "x"), invoice(2, "20.00", "y")];

        let report = reconcile(input, &ReconConfig::default()).unwrap();

        let line = &report.gateway[0];
        assert_eq!(line.batch.bank_reference.as_deref(), Some("OP7"));
        assert_eq!(line.orders[0].link, LinkStatus::AmountMatched);
        assert_eq!(line.orders[1].link, LinkStatus::Refunded);
        assert!(line.orders[1].invoice.is_none());
        assert_eq!(report.summary.matched_credits, 1);
    }
}
