//! Reconciliation report and its flat CSV export.

use chrono::NaiveDate;
use ramburs_core::{DateRange, ErrorLog, InvoiceMatch, LinkStatus, Money, Parcel, SettlementPeriod, Source, Transaction};
use serde::Serialize;
use std::io::Write;

use crate::gateway::BatchMatch;

/// A parcel attributed to a credit, with its invoice link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcelLink {
    #[serde(flatten)]
    pub parcel: Parcel,
    pub link: LinkStatus,
    pub invoice: Option<InvoiceMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemittanceLine {
    pub bank_reference: String,
    pub bank_date: NaiveDate,
    pub source: Source,
    pub credit_amount: Money,
    pub matched_sum: Money,
    pub parcels: Vec<ParcelLink>,
}

/// A gateway order or marketplace order and its invoice link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLink {
    pub reference: String,
    pub amount: Money,
    pub link: LinkStatus,
    pub invoice: Option<InvoiceMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayLine {
    #[serde(flatten)]
    pub batch: BatchMatch,
    pub orders: Vec<OrderLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodLine {
    #[serde(flatten)]
    pub settlement: SettlementPeriod,
    pub bank_reference: Option<String>,
    pub bank_date: Option<NaiveDate>,
    pub orders: Vec<OrderLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub credits: usize,
    pub matched_credits: usize,
    pub matched_total: Money,
    pub pending_parcels: usize,
    pub pending_total: Money,
    pub gateway_batches: usize,
    pub settlement_periods: usize,
    pub invoices_linked: usize,
    pub soft_errors: usize,
}

/// Everything one run produced. Always carries an errors section, empty or
/// not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconReport {
    pub period: DateRange,
    pub summary: Summary,
    pub remittances: Vec<RemittanceLine>,
    pub unmatched_credits: Vec<Transaction>,
    pub pending: Vec<Parcel>,
    pub pending_total: Money,
    pub gateway: Vec<GatewayLine>,
    pub periods: Vec<PeriodLine>,
    pub errors: ErrorLog,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    section: &'static str,
    bank_reference: &'a str,
    date: Option<NaiveDate>,
    source: &'a str,
    item: &'a str,
    amount: Money,
    invoice_number: &'a str,
    status: &'static str,
}

fn status_label(link: LinkStatus) -> &'static str {
    match link {
        LinkStatus::Unmatched => "unmatched",
        LinkStatus::AmountMatched => "amount_matched",
        LinkStatus::NumberMatched => "number_matched",
        LinkStatus::NoInvoiceFound => "no_invoice",
        LinkStatus::Refunded => "refunded",
    }
}

fn invoice_number(invoice: &Option<InvoiceMatch>) -> &str {
    invoice.as_ref().map(|i| i.invoice_number.as_str()).unwrap_or_default()
}

impl ReconReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(out);
        self.write_rows(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// One row per attributed parcel, pending parcel, gateway order and
    /// settlement period, followed by the soft errors. Several reports can
    /// share one writer; the header is written once.
    pub fn write_rows<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<(), csv::Error> {
        for line in &self.remittances {
            for p in &line.parcels {
                writer.serialize(ExportRow {
                    section: "remittance",
                    bank_reference: &line.bank_reference,
                    date: Some(line.bank_date),
                    source: line.source.as_str(),
                    item: &p.parcel.parcel_number,
                    amount: p.parcel.cod_amount,
                    invoice_number: invoice_number(&p.invoice),
                    status: status_label(p.link),
                })?;
            }
        }

        for p in &self.pending {
            writer.serialize(ExportRow {
                section: "pending",
                bank_reference: "",
                date: Some(p.delivery_date),
                source: p.courier.as_str(),
                item: &p.parcel_number,
                amount: p.cod_amount,
                invoice_number: "",
                status: "pending",
            })?;
        }

        for g in &self.gateway {
            for o in &g.orders {
                writer.serialize(ExportRow {
                    section: "gateway",
                    bank_reference: g.batch.bank_reference.as_deref().unwrap_or_default(),
                    date: g.batch.bank_date,
                    source: &g.batch.batch_id,
                    item: &o.reference,
                    amount: o.amount,
                    invoice_number: invoice_number(&o.invoice),
                    status: status_label(o.link),
                })?;
            }
        }

        for p in &self.periods {
            let label = p.settlement.period.to_string();
            writer.serialize(ExportRow {
                section: "period",
                bank_reference: p.bank_reference.as_deref().unwrap_or_default(),
                date: p.bank_date,
                source: Source::Marketplace.as_str(),
                item: &label,
                amount: p.settlement.net_total,
                invoice_number: "",
                status: if p.bank_reference.is_some() { "matched" } else { "unmatched" },
            })?;
            for o in &p.orders {
                writer.serialize(ExportRow {
                    section: "order",
                    bank_reference: "",
                    date: None,
                    source: &label,
                    item: &o.reference,
                    amount: o.amount,
                    invoice_number: invoice_number(&o.invoice),
                    status: status_label(o.link),
                })?;
            }
        }

        for e in self.errors.entries() {
            let message = e.to_string();
            writer.serialize(ExportRow {
                section: "error",
                bank_reference: "",
                date: None,
                source: "",
                item: &message,
                amount: Money::zero(),
                invoice_number: "",
                status: "error",
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramburs_core::{InvoiceId, SoftError};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn sample() -> ReconReport {
        let parcel = Parcel {
            parcel_number: "2001".into(),
            courier: Source::CourierA,
            cod_amount: "30.00".parse().unwrap(),
            delivery_date: date(1),
            recipient_name: "Ion Pop".into(),
            recipient_city: "Cluj".into(),
            is_delivered: true,
            matched: true,
        };
        let mut pending = parcel.clone();
        pending.parcel_number = "2002".into();
        pending.matched = false;

        let mut errors = ErrorLog::new();
        errors.record(SoftError::InvoiceNotFound {
            reference: "2009".into(),
            amount: Money::from_cents(1000),
        });

        ReconReport {
            period: DateRange::new(date(1), date(31)),
            summary: Summary::default(),
            remittances: vec![RemittanceLine {
                bank_reference: "OP1".into(),
                bank_date: date(4),
                source: Source::CourierA,
                credit_amount: parcel.cod_amount,
                matched_sum: parcel.cod_amount,
                parcels: vec![ParcelLink {
                    parcel,
                    link: LinkStatus::AmountMatched,
                    invoice: Some(InvoiceMatch {
                        invoice_id: InvoiceId(3),
                        invoice_number: "FCT-3".into(),
                        invoice_total: Money::from_cents(3000),
                        used: true,
                    }),
                }],
            }],
            unmatched_credits: vec![],
            pending_total: pending.cod_amount,
            pending: vec![pending],
            gateway: vec![],
            periods: vec![],
            errors,
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_item() {
        let mut buf = Vec::new();
        sample().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "section,bank_reference,date,source,item,amount,invoice_number,status"
        );
        assert_eq!(lines[1], "remittance,OP1,2025-07-04,courier_a,2001,30.00,FCT-3,amount_matched");
        assert_eq!(lines[2], "pending,,2025-07-01,courier_a,2002,30.00,,pending");
        assert!(lines[3].starts_with("error,,,,"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn json_always_has_errors_section() {
        let mut report = sample();
        report.errors = ErrorLog::new();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["errors"], serde_json::json!([]));
        assert_eq!(json["remittances"][0]["parcels"][0]["parcel_number"], "2001");
        assert_eq!(json["remittances"][0]["parcels"][0]["link"], "amount_matched");
    }
}
