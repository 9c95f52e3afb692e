//! Marketplace settlement: groups a folder of report files into reporting
//! periods and computes one signed net total per period.

use chrono::NaiveDate;
use ramburs_core::{
    DateRange, ErrorLog, Money, PeriodBreakdown, PeriodFile, ReconError, ReportingMonth, SettlementFileKind,
    SettlementPeriod, SoftError, TaxTable,
};
use ramburs_import::csv::{parse_amount, parse_date, TabularExtract};
use ramburs_import::extract::{candidates, find_column};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One marketplace report file, typed by its name prefix.
#[derive(Debug, Clone)]
pub struct SettlementFile {
    pub name: String,
    pub kind: SettlementFileKind,
    pub extract: TabularExtract,
}

impl SettlementFile {
    /// `None` when the file name carries no known report prefix.
    pub fn from_extract(extract: TabularExtract) -> Option<Self> {
        let kind = SettlementFileKind::from_file_name(&extract.name)?;
        Some(Self {
            name: extract.name.clone(),
            kind,
            extract,
        })
    }
}

/// A payout order after deduplication by order id. `amount` is the signed sum
/// of its rows; any negative row marks a refund.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutOrder {
    pub period: DateRange,
    pub order_id: String,
    pub amount: Money,
    pub row_count: usize,
    pub refunded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SettlementOutcome {
    pub periods: Vec<SettlementPeriod>,
    pub orders: Vec<PayoutOrder>,
    pub errors: ErrorLog,
}

/// The period a file says it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declared {
    Range(DateRange),
    Month(ReportingMonth),
}

impl Declared {
    fn span(self) -> DateRange {
        match self {
            Declared::Range(r) => r,
            Declared::Month(m) => m.range(),
        }
    }

    /// Month used for the tax multiplier. A range reports under its closing
    /// month.
    fn tax_month(self) -> ReportingMonth {
        match self {
            Declared::Range(r) => r.closing_month(),
            Declared::Month(m) => m,
        }
    }
}

struct ParsedRow {
    order_id: Option<String>,
    value: Money,
}

struct ParsedFile<'a> {
    file: &'a SettlementFile,
    declared: Declared,
    rows: Vec<ParsedRow>,
}

#[derive(Default)]
struct PeriodAccumulator {
    files: Vec<PeriodFile>,
    breakdown: PeriodBreakdown,
    orders: Vec<PayoutOrder>,
    order_index: HashMap<String, usize>,
    has_payout: bool,
    has_components: bool,
}

fn value_candidates(kind: SettlementFileKind) -> &'static [&'static str] {
    match kind {
        SettlementFileKind::Payout => candidates::PAYOUT_VALUE,
        SettlementFileKind::Voucher | SettlementFileKind::VoucherReversal => candidates::VOUCHER_VALUE,
        _ => candidates::NET_VALUE,
    }
}

fn declared_period(file: &SettlementFile) -> Result<Declared, String> {
    let extract = &file.extract;
    let start = find_column(&extract.headers, candidates::PERIOD_START);
    let end = find_column(&extract.headers, candidates::PERIOD_END);

    if let (Some(start), Some(end)) = (start, end) {
        let read = |column: &str| -> Result<NaiveDate, String> {
            let raw = extract
                .first_value(column)
                .ok_or_else(|| format!("empty '{column}' column"))?;
            parse_date(raw).map_err(|e| e.to_string())
        };
        return Ok(Declared::Range(DateRange::new(read(start)?, read(end)?)));
    }
    if file.kind == SettlementFileKind::Payout {
        return Err("payout file declares no period start/end".into());
    }

    let month_col = find_column(&extract.headers, candidates::REPORTING_MONTH)
        .ok_or_else(|| "no reporting month column".to_string())?;
    let raw = extract
        .first_value(month_col)
        .ok_or_else(|| "empty reporting month".to_string())?;
    raw.parse::<ReportingMonth>()
        .map(Declared::Month)
        .map_err(|e| e.to_string())
}

fn parse_file<'a>(file: &'a SettlementFile, errors: &mut ErrorLog) -> Option<ParsedFile<'a>> {
    let skip = |errors: &mut ErrorLog, reason: String| {
        errors.record(SoftError::MalformedPeriodFile {
            file: file.name.clone(),
            reason,
        });
    };

    if file.extract.is_empty() {
        skip(errors, "no data rows".into());
        return None;
    }
    let declared = match declared_period(file) {
        Ok(d) => d,
        Err(reason) => {
            skip(errors, reason);
            return None;
        }
    };
    let headers = &file.extract.headers;
    let Some(value_col) = find_column(headers, value_candidates(file.kind)) else {
        skip(errors, "no value column".into());
        return None;
    };
    let order_col = find_column(headers, candidates::ORDER_ID);

    let mut rows = Vec::new();
    for (i, row) in file.extract.rows.iter().enumerate() {
        let raw = row.get(value_col).map(|v| v.trim()).unwrap_or_default();
        if raw.is_empty() {
            continue;
        }
        match parse_amount(raw) {
            Ok(value) => rows.push(ParsedRow {
                order_id: order_col
                    .and_then(|c| row.get(c))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
                value,
            }),
            Err(e) => errors.record(SoftError::MalformedRow {
                source_name: file.name.clone(),
                row: i + 1,
                reason: e.to_string(),
            }),
        }
    }

    Some(ParsedFile { file, declared, rows })
}

/// Picks the period key a non-payout file joins: the identical payout range,
/// else the latest payout period overlapping the declared span. `None` when
/// no payout period fits.
fn join_payout_period(declared: Declared, payout_keys: &[DateRange]) -> Option<DateRange> {
    if let Declared::Range(range) = declared {
        if payout_keys.contains(&range) {
            return Some(range);
        }
    }
    let span = declared.span();
    payout_keys
        .iter()
        .filter(|k| k.overlaps(span))
        .max_by_key(|k| (k.end, k.start))
        .copied()
}

/// Multiplier for the file's tax month and the grossed-up absolute total.
fn tax_burden(parsed: &ParsedFile<'_>, tax: &TaxTable) -> (Decimal, Money) {
    let m = tax.multiplier(parsed.declared.tax_month());
    (m, parsed.rows.iter().map(|r| r.value.abs().scale(m)).sum())
}

impl PeriodAccumulator {
    fn add(&mut self, key: DateRange, parsed: &ParsedFile<'_>, tax: &TaxTable) {
        let kind = parsed.file.kind;
        let mut multiplier: Option<Decimal> = None;

        match kind {
            SettlementFileKind::Payout => {
                self.has_payout = true;
                for row in &parsed.rows {
                    self.breakdown.payout_total += row.value;
                    if let Some(order_id) = &row.order_id {
                        self.add_order(key, order_id, row.value);
                    }
                }
            }
            k if k.is_voucher() => {
                self.has_components = true;
                self.breakdown.voucher_total += parsed.rows.iter().map(|r| r.value).sum::<Money>();
            }
            k if k.is_commission() => {
                self.has_components = true;
                let (m, burden) = tax_burden(parsed, tax);
                multiplier = Some(m);
                self.breakdown.commission_total += burden;
            }
            SettlementFileKind::CommissionReversal => {
                self.has_components = true;
                let (m, burden) = tax_burden(parsed, tax);
                multiplier = Some(m);
                self.breakdown.reversed_commission_total += burden;
            }
            // Every remaining kind is covered by the predicates above.
            _ => {}
        }

        self.files.push(PeriodFile {
            name: parsed.file.name.clone(),
            kind,
            row_count: parsed.rows.len(),
            tax_multiplier: multiplier,
        });
    }

    fn add_order(&mut self, period: DateRange, order_id: &str, value: Money) {
        match self.order_index.get(order_id) {
            Some(&i) => {
                let order = &mut self.orders[i];
                order.amount += value;
                order.row_count += 1;
                order.refunded |= value.is_negative();
            }
            None => {
                self.order_index.insert(order_id.to_string(), self.orders.len());
                self.orders.push(PayoutOrder {
                    period,
                    order_id: order_id.to_string(),
                    amount: value,
                    row_count: 1,
                    refunded: value.is_negative(),
                });
            }
        }
    }
}

/// Runs the period aggregator over every file of a marketplace export.
///
/// Payout files define the period keys. Other files join a payout period by
/// their declared range or month; a file no payout period covers opens its own
/// period with zero payout. Unreadable files are skipped with a soft error.
/// Fails only when no file yields usable data. The result does not depend on
/// the order of `files`.
pub fn aggregate_periods(files: &[SettlementFile], tax: &TaxTable) -> Result<SettlementOutcome, ReconError> {
    let mut errors = ErrorLog::new();

    let mut ordered: Vec<&SettlementFile> = files.iter().collect();
    ordered.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
    let parsed: Vec<ParsedFile<'_>> = ordered
        .into_iter()
        .filter_map(|f| parse_file(f, &mut errors))
        .collect();

    if parsed.is_empty() {
        return Err(ReconError::NoInputData("marketplace settlement files".into()));
    }

    let payout_keys: Vec<DateRange> = {
        let mut keys: Vec<DateRange> = parsed
            .iter()
            .filter(|p| p.file.kind == SettlementFileKind::Payout)
            .map(|p| p.declared.span())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    };

    let mut periods: BTreeMap<DateRange, PeriodAccumulator> = BTreeMap::new();
    for p in &parsed {
        let key = if p.file.kind == SettlementFileKind::Payout {
            p.declared.span()
        } else {
            join_payout_period(p.declared, &payout_keys).unwrap_or_else(|| p.declared.span())
        };
        tracing::debug!(file = %p.file.name, kind = %p.file.kind, period = %key, "file grouped");
        periods.entry(key).or_default().add(key, p, tax);
    }

    let mut outcome = SettlementOutcome::default();
    for (key, acc) in periods {
        if !acc.has_payout {
            errors.record(SoftError::IncompletePeriod {
                period: key.to_string(),
                reason: "no payout file covers this period; payout counted as zero".into(),
            });
        } else if !acc.has_components {
            errors.record(SoftError::IncompletePeriod {
                period: key.to_string(),
                reason: "no commission or voucher files; counted as zero".into(),
            });
        }

        let net_total = acc.breakdown.net_total();
        tracing::info!(period = %key, net = %net_total, files = acc.files.len(), "period aggregated");
        outcome.orders.extend(acc.orders);
        outcome.periods.push(SettlementPeriod {
            period: key,
            files: acc.files,
            breakdown: acc.breakdown,
            net_total,
        });
    }
    outcome.errors = errors;
    Ok(outcome)
}
