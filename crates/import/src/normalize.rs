//! Turns tabular extracts into canonical records.
//!
//! Validation happens here, once: a row either becomes a well-formed record
//! or is skipped with a soft error. A missing required column skips the whole
//! extract.

use ramburs_core::{ErrorLog, Invoice, InvoiceId, Money, Parcel, SoftError, Source, Transaction};

use crate::classify::SourceClassifier;
use crate::csv::{parse_amount, parse_date, Row, TabularExtract};
use crate::extract::{candidates, find_column, find_reference_column};
use crate::util::normalize_header;

#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub errors: ErrorLog,
}

impl<T> Normalized<T> {
    fn empty(errors: ErrorLog) -> Self {
        Self { records: Vec::new(), errors }
    }
}

fn require<'a>(
    extract: &'a TabularExtract,
    column: Option<&'a str>,
    semantic: &str,
    errors: &mut ErrorLog,
) -> Option<&'a str> {
    if column.is_none() {
        errors.record(SoftError::MissingColumn {
            source_name: extract.name.clone(),
            column: semantic.to_string(),
        });
    }
    column
}

fn cell<'r>(row: &'r Row, column: Option<&str>) -> &'r str {
    column
        .and_then(|c| row.get(c))
        .map(|v| v.trim())
        .unwrap_or_default()
}

fn malformed(extract: &TabularExtract, row: usize, reason: String) -> SoftError {
    SoftError::MalformedRow {
        source_name: extract.name.clone(),
        row,
        reason,
    }
}

/// Bank statement credits. Debits are dropped here so everything downstream
/// can rely on positive remittance amounts.
pub fn normalize_bank_statement(
    extract: &TabularExtract,
    classifier: &SourceClassifier,
) -> Normalized<Transaction> {
    let mut errors = ErrorLog::new();
    let headers = &extract.headers;

    let reference_col = find_reference_column(headers, candidates::REFERENCE);
    let details_col = find_column(headers, candidates::DETAILS);
    let batch_col = find_column(headers, candidates::BATCH);
    let credit_col = find_column(headers, candidates::CREDIT);
    let amount_col = credit_col.or_else(|| find_column(headers, candidates::AMOUNT));

    let date_col = require(extract, find_column(headers, candidates::DATE), "date", &mut errors);
    let amount_col = require(extract, amount_col, "amount", &mut errors);
    let (Some(date_col), Some(amount_col)) = (date_col, amount_col) else {
        return Normalized::empty(errors);
    };

    let mut records = Vec::new();
    for (i, row) in extract.rows.iter().enumerate() {
        let line = i + 1;
        let raw_amount = cell(row, Some(amount_col));
        if raw_amount.is_empty() {
            // Debit-only line in a split credit/debit layout.
            continue;
        }
        let amount = match parse_amount(raw_amount) {
            Ok(a) => a,
            Err(e) => {
                errors.record(malformed(extract, line, e.to_string()));
                continue;
            }
        };
        if !amount.is_positive() {
            continue;
        }
        let date = match parse_date(cell(row, Some(date_col))) {
            Ok(d) => d,
            Err(e) => {
                errors.record(malformed(extract, line, e.to_string()));
                continue;
            }
        };

        let details = cell(row, details_col).to_string();
        let reference = match cell(row, reference_col) {
            "" => format!("{}#{}", extract.name, line),
            r => r.to_string(),
        };
        let batch_id = match cell(row, batch_col) {
            "" => classifier.batch_id(&details),
            b => Some(b.to_string()),
        };

        records.push(Transaction {
            reference,
            amount,
            date,
            source: classifier.classify(&details),
            batch_id,
            details,
        });
    }

    tracing::debug!(file = %extract.name, credits = records.len(), "bank statement normalized");
    Normalized { records, errors }
}

fn is_delivered_status(status: &str) -> bool {
    let s = normalize_header(status);
    let negative = ["nelivrat", "undelivered", "not delivered", "returnat", "returned", "refuzat"];
    let positive = ["livrat", "delivered", "predat"];
    !negative.iter().any(|n| s.contains(n)) && positive.iter().any(|p| s.contains(p))
}

/// Courier delivery/status export. Rows without a COD amount are ignored.
pub fn normalize_parcels(extract: &TabularExtract, courier: Source) -> Normalized<Parcel> {
    let mut errors = ErrorLog::new();
    let headers = &extract.headers;

    let number_col = require(
        extract,
        find_column(headers, candidates::PARCEL_NUMBER),
        "parcel number",
        &mut errors,
    );
    let cod_col = require(extract, find_column(headers, candidates::COD_AMOUNT), "cod amount", &mut errors);
    let date_col = require(
        extract,
        find_column(headers, candidates::DELIVERY_DATE),
        "delivery date",
        &mut errors,
    );
    let (Some(number_col), Some(cod_col), Some(date_col)) = (number_col, cod_col, date_col) else {
        return Normalized::empty(errors);
    };
    let status_col = find_column(headers, candidates::STATUS);
    let name_col = find_column(headers, candidates::RECIPIENT_NAME);
    let city_col = find_column(headers, candidates::RECIPIENT_CITY);

    let mut records = Vec::new();
    for (i, row) in extract.rows.iter().enumerate() {
        let line = i + 1;
        let parcel_number = cell(row, Some(number_col));
        if parcel_number.is_empty() {
            errors.record(malformed(extract, line, "empty parcel number".into()));
            continue;
        }
        let cod_amount = match cell(row, Some(cod_col)) {
            "" => Money::zero(),
            raw => match parse_amount(raw) {
                Ok(a) => a,
                Err(e) => {
                    errors.record(malformed(extract, line, e.to_string()));
                    continue;
                }
            },
        };
        if !cod_amount.is_positive() {
            continue;
        }

        let raw_date = cell(row, Some(date_col));
        let is_delivered = match status_col {
            Some(_) => is_delivered_status(cell(row, status_col)),
            None => !raw_date.is_empty(),
        };
        if raw_date.is_empty() {
            if is_delivered {
                errors.record(malformed(extract, line, "delivered parcel without delivery date".into()));
            }
            continue;
        }
        let delivery_date = match parse_date(raw_date) {
            Ok(d) => d,
            Err(e) => {
                errors.record(malformed(extract, line, e.to_string()));
                continue;
            }
        };

        records.push(Parcel {
            parcel_number: parcel_number.to_string(),
            courier,
            cod_amount,
            delivery_date,
            recipient_name: cell(row, name_col).to_string(),
            recipient_city: cell(row, city_col).to_string(),
            is_delivered,
            matched: false,
        });
    }

    tracing::debug!(file = %extract.name, %courier, parcels = records.len(), "parcels normalized");
    Normalized { records, errors }
}

/// Payment-gateway settlement export: one row per card transaction, signed
/// net amount, grouped by batch id.
pub fn normalize_gateway_settlement(extract: &TabularExtract) -> Normalized<Transaction> {
    let mut errors = ErrorLog::new();
    let headers = &extract.headers;

    let batch_col = require(extract, find_column(headers, candidates::BATCH), "batch", &mut errors);
    let amount_col = require(extract, find_column(headers, candidates::AMOUNT), "amount", &mut errors);
    let date_col = require(extract, find_column(headers, candidates::DATE), "date", &mut errors);
    let (Some(batch_col), Some(amount_col), Some(date_col)) = (batch_col, amount_col, date_col) else {
        return Normalized::empty(errors);
    };
    let reference_col = find_reference_column(headers, candidates::REFERENCE)
        .or_else(|| find_column(headers, candidates::ORDER_ID));
    let details_col = find_column(headers, candidates::DETAILS);

    let mut records = Vec::new();
    for (i, row) in extract.rows.iter().enumerate() {
        let line = i + 1;
        let batch_id = cell(row, Some(batch_col));
        if batch_id.is_empty() {
            errors.record(malformed(extract, line, "row without batch id".into()));
            continue;
        }
        let parsed = parse_amount(cell(row, Some(amount_col)))
            .and_then(|amount| parse_date(cell(row, Some(date_col))).map(|date| (amount, date)));
        let (amount, date) = match parsed {
            Ok(v) => v,
            Err(e) => {
                errors.record(malformed(extract, line, e.to_string()));
                continue;
            }
        };
        let reference = match cell(row, reference_col) {
            "" => format!("{}#{}", extract.name, line),
            r => r.to_string(),
        };

        records.push(Transaction {
            reference,
            amount,
            date,
            source: Source::PaymentGateway,
            batch_id: Some(batch_id.to_string()),
            details: cell(row, details_col).to_string(),
        });
    }

    Normalized { records, errors }
}

/// Invoice register export. Without an id column the 1-based row index is
/// used, which only identifies an invoice within this extract.
pub fn normalize_invoices(extract: &TabularExtract) -> Normalized<Invoice> {
    let mut errors = ErrorLog::new();
    let headers = &extract.headers;

    let number_col = require(
        extract,
        find_column(headers, candidates::INVOICE_NUMBER),
        "invoice number",
        &mut errors,
    );
    let total_col = require(extract, find_column(headers, candidates::INVOICE_TOTAL), "total", &mut errors);
    let date_col = require(extract, find_column(headers, candidates::INVOICE_DATE), "issue date", &mut errors);
    let (Some(number_col), Some(total_col), Some(date_col)) = (number_col, total_col, date_col) else {
        return Normalized::empty(errors);
    };
    let id_col = headers
        .iter()
        .find(|h| candidates::INVOICE_ID.contains(&normalize_header(h).as_str()))
        .map(|h| h.as_str());
    let client_col = find_column(headers, candidates::INVOICE_CLIENT);

    let mut records = Vec::new();
    for (i, row) in extract.rows.iter().enumerate() {
        let line = i + 1;
        let number = cell(row, Some(number_col));
        if number.is_empty() {
            errors.record(malformed(extract, line, "empty invoice number".into()));
            continue;
        }
        let id = match cell(row, id_col) {
            "" => Ok(line as i64),
            raw => raw.parse::<i64>().map_err(|_| format!("invalid invoice id '{raw}'")),
        };
        let parsed = id.and_then(|id| {
            let total = parse_amount(cell(row, Some(total_col))).map_err(|e| e.to_string())?;
            let date = parse_date(cell(row, Some(date_col))).map_err(|e| e.to_string())?;
            Ok((id, total, date))
        });
        let (id, total, issue_date) = match parsed {
            Ok(v) => v,
            Err(reason) => {
                errors.record(malformed(extract, line, reason));
                continue;
            }
        };

        records.push(Invoice {
            id: InvoiceId(id),
            number: number.to_string(),
            total,
            issue_date,
            client_name: Some(cell(row, client_col)).filter(|c| !c.is_empty()).map(str::to_string),
        });
    }

    Normalized { records, errors }
}
