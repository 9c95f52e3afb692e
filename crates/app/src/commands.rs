//! Command implementations
//!
//! Each command has an inner function that does the work and returns data,
//! and a `cmd_*` wrapper that opens the store and prints the result.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use ramburs_core::{
    DateRange, ErrorLog, Invoice, ReconConfig, ReconError, ReportingMonth, SoftError, Source, TimedCache, Transaction,
    UsedInvoices,
};
use ramburs_engine::{aggregate_periods, reconcile_with, ReconInput, ReconReport, SettlementFile, SettlementOutcome};
use ramburs_import::{
    normalize_bank_statement, normalize_gateway_settlement, normalize_invoices, normalize_parcels, read_extract_file,
    ReadOptions, SourceClassifier, TabularExtract,
};
use ramburs_storage::{
    create_db, get_credits, get_invoices, get_pending_parcels, insert_bank_transactions, mark_parcels_matched,
    upsert_invoices, upsert_parcels, DbPool,
};
use tracing::{debug, info, warn};

const DEFAULT_CONFIG: &str = "ramburs.toml";

/// Statement exports carry a preamble (account, period) above the header.
const BANK_HEADER_HINTS: &[&str] = &["data", "suma", "detalii", "credit", "referinta", "numar op"];

// ── Configuration ────────────────────────────────────────────────────────────

/// `path` when given, else `./ramburs.toml` if it exists, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<ReconConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG);
            if !fallback.exists() {
                debug!("no {DEFAULT_CONFIG}, using defaults");
                return Ok(ReconConfig::default());
            }
            fallback
        }
    };
    ReconConfig::load(&path).with_context(|| format!("Failed to load config from {}", path.display()))
}

pub fn build_classifier(config: &ReconConfig) -> Result<SourceClassifier> {
    SourceClassifier::new(&config.classifier).context("Invalid classifier batch_pattern")
}

fn read_csv(path: &Path, hints: &[&str]) -> Result<TabularExtract> {
    let options = ReadOptions {
        delimiter: None,
        header_hints: hints.iter().map(|h| h.to_string()).collect(),
    };
    read_extract_file(path, &options).with_context(|| format!("Failed to read {}", path.display()))
}

async fn open_db(db_path: &Path) -> Result<DbPool> {
    create_db(db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}

fn print_soft_errors(errors: &ErrorLog) {
    for e in errors.entries() {
        println!("  ! {e}");
    }
}

// ── Import ───────────────────────────────────────────────────────────────────

/// What an import read and stored.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub read: usize,
    pub stored: u64,
    pub errors: ErrorLog,
}

pub async fn import_bank(pool: &DbPool, file: &Path, classifier: &SourceClassifier) -> Result<ImportSummary> {
    let extract = read_csv(file, BANK_HEADER_HINTS)?;
    let normalized = normalize_bank_statement(&extract, classifier);
    let stored = insert_bank_transactions(pool, &normalized.records)
        .await
        .context("Failed to store bank credits")?;
    Ok(ImportSummary {
        read: normalized.records.len(),
        stored,
        errors: normalized.errors,
    })
}

pub async fn import_parcels(pool: &DbPool, file: &Path, courier: Source) -> Result<ImportSummary> {
    let extract = read_csv(file, &[])?;
    let normalized = normalize_parcels(&extract, courier);
    let stored = upsert_parcels(pool, &normalized.records)
        .await
        .context("Failed to store parcels")?;
    Ok(ImportSummary {
        read: normalized.records.len(),
        stored,
        errors: normalized.errors,
    })
}

pub async fn import_invoices(pool: &DbPool, file: &Path) -> Result<ImportSummary> {
    let extract = read_csv(file, &[])?;
    let normalized = normalize_invoices(&extract);
    let stored = upsert_invoices(pool, &normalized.records)
        .await
        .context("Failed to store invoices")?;
    Ok(ImportSummary {
        read: normalized.records.len(),
        stored,
        errors: normalized.errors,
    })
}

fn print_import(what: &str, file: &Path, summary: &ImportSummary) {
    println!(
        "Imported {} {what} from {} ({} new or updated)",
        summary.read,
        file.display(),
        summary.stored
    );
    print_soft_errors(&summary.errors);
}

pub async fn cmd_import_bank(db_path: &Path, config: &ReconConfig, file: &Path) -> Result<()> {
    let classifier = build_classifier(config)?;
    let pool = open_db(db_path).await?;
    let summary = import_bank(&pool, file, &classifier).await?;
    print_import("bank credits", file, &summary);
    Ok(())
}

pub async fn cmd_import_parcels(db_path: &Path, file: &Path, courier: Source) -> Result<()> {
    let pool = open_db(db_path).await?;
    let summary = import_parcels(&pool, file, courier).await?;
    print_import(&format!("{} parcels", courier.as_str()), file, &summary);
    Ok(())
}

pub async fn cmd_import_invoices(db_path: &Path, file: &Path) -> Result<()> {
    let pool = open_db(db_path).await?;
    let summary = import_invoices(&pool, file).await?;
    print_import("invoices", file, &summary);
    Ok(())
}

// ── Reconcile ────────────────────────────────────────────────────────────────

/// Invoices for a whole run, fetched once and reused while fresh.
pub struct InvoiceCache {
    cache: TimedCache<Vec<Invoice>>,
    window: DateRange,
}

impl InvoiceCache {
    pub fn new(ttl: Duration, window: DateRange) -> Self {
        Self {
            cache: TimedCache::new(ttl),
            window,
        }
    }

    pub async fn invoices(&mut self, pool: &DbPool, now: DateTime<Utc>) -> Result<Vec<Invoice>, sqlx::Error> {
        if let Some(invoices) = self.cache.get(now) {
            return Ok(invoices.clone());
        }
        let fresh = get_invoices(pool, self.window).await?;
        debug!(count = fresh.len(), window = %self.window, "invoice cache refreshed");
        Ok(self.cache.refresh(fresh, now).clone())
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileArgs {
    pub from: ReportingMonth,
    pub to: Option<ReportingMonth>,
    pub gateway: Option<PathBuf>,
    pub marketplace: Option<PathBuf>,
}

impl ReconcileArgs {
    fn months(&self) -> Result<Vec<ReportingMonth>> {
        let to = self.to.unwrap_or(self.from);
        if to < self.from {
            bail!("--to {to} is before --from {}", self.from);
        }
        Ok(DateRange::new(self.from.first_day(), to.last_day()).months())
    }
}

/// Reads every `*.csv` in `dir` whose name carries a settlement report
/// prefix. Files that cannot be read are reported, not fatal.
pub fn load_settlement_files(dir: &Path) -> Result<(Vec<SettlementFile>, ErrorLog)> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    paths.sort();

    let mut files = Vec::new();
    let mut errors = ErrorLog::new();
    for path in paths {
        match read_extract_file(&path, &ReadOptions::default()) {
            Ok(extract) => match SettlementFile::from_extract(extract) {
                Some(file) => files.push(file),
                None => debug!(file = %path.display(), "not a settlement report, skipped"),
            },
            Err(e) => errors.record(SoftError::MalformedPeriodFile {
                file: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
    Ok((files, errors))
}

/// Runs the engine once per month, oldest first, and persists matched
/// parcel flags after each month so later months only see what is left.
///
/// Gateway rows are split by month. Marketplace reports go to the last
/// month of the run, where their payout credits land. A month with no data
/// is skipped; the run fails only when every month is empty.
pub async fn reconcile_months(
    pool: &DbPool,
    config: &ReconConfig,
    args: &ReconcileArgs,
    now: DateTime<Utc>,
) -> Result<Vec<ReconReport>> {
    let months = args.months()?;
    let (first, last) = match (months.first(), months.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => bail!("no months to reconcile"),
    };

    let mut load_errors = ErrorLog::new();

    let gateway_rows: Vec<Transaction> = match &args.gateway {
        Some(path) => {
            let normalized = normalize_gateway_settlement(&read_csv(path, &[])?);
            load_errors.extend(normalized.errors);
            normalized.records
        }
        None => Vec::new(),
    };

    let mut settlement_files = match &args.marketplace {
        Some(dir) => {
            let (files, errors) = load_settlement_files(dir)?;
            load_errors.extend(errors);
            files
        }
        None => Vec::new(),
    };

    let window = DateRange::new(
        first.first_day() - Duration::days(config.invoices.lookback_days),
        last.last_day(),
    );
    let mut invoices = InvoiceCache::new(Duration::seconds(config.invoices.cache_ttl_secs), window);

    // One used-set for the whole run: an invoice linked in one month is not
    // offered again in a later one.
    let mut used = UsedInvoices::new();
    let mut reports = Vec::new();
    for month in months {
        let period = month.range();
        let mut input = ReconInput::new(period);
        input.credits = get_credits(pool, period)
            .await
            .with_context(|| format!("Failed to load credits for {month}"))?;
        input.parcels = get_pending_parcels(pool).await.context("Failed to load parcels")?;
        input.gateway_rows = gateway_rows
            .iter()
            .filter(|row| period.contains(row.date))
            .cloned()
            .collect();
        if month == last {
            input.settlement_files = std::mem::take(&mut settlement_files);
        }
        input.invoices = invoices
            .invoices(pool, now)
            .await
            .context("Failed to load invoices")?;
        input.errors = load_errors.clone();

        let report = match reconcile_with(input, config, &mut used) {
            Ok(report) => report,
            Err(ReconError::NoInputData(what)) => {
                warn!(month = %month, "nothing to reconcile for {what}, skipped");
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Reconciliation failed for {month}")),
        };
        load_errors = ErrorLog::new();

        for line in &report.remittances {
            let numbers: Vec<String> = line.parcels.iter().map(|p| p.parcel.parcel_number.clone()).collect();
            mark_parcels_matched(pool, line.source, &numbers)
                .await
                .with_context(|| format!("Failed to mark parcels for {}", line.bank_reference))?;
        }
        info!(
            month = %month,
            remittances = report.remittances.len(),
            "matched parcels persisted"
        );
        reports.push(report);
    }

    if reports.is_empty() {
        bail!(ReconError::NoInputData(format!("{first} to {last}")));
    }
    Ok(reports)
}

pub fn write_export(path: &Path, reports: &[ReconReport]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    for report in reports {
        report.write_rows(&mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub async fn cmd_reconcile(db_path: &Path, config: &ReconConfig, args: &ReconcileArgs, out: Option<&Path>) -> Result<()> {
    let pool = open_db(db_path).await?;
    let reports = reconcile_months(&pool, config, args, Utc::now()).await?;

    println!("{}", serde_json::to_string_pretty(&reports)?);

    if let Some(path) = out {
        write_export(path, &reports)?;
        info!(file = %path.display(), "export written");
    }
    Ok(())
}

// ── Settle ───────────────────────────────────────────────────────────────────

pub fn settle_dir(dir: &Path, config: &ReconConfig) -> Result<SettlementOutcome> {
    let (files, load_errors) = load_settlement_files(dir)?;
    let mut outcome = aggregate_periods(&files, &config.tax)
        .with_context(|| format!("No settlement reports in {}", dir.display()))?;
    let mut errors = load_errors;
    errors.extend(outcome.errors);
    outcome.errors = errors;
    Ok(outcome)
}

pub fn cmd_settle(config: &ReconConfig, dir: &Path) -> Result<()> {
    let outcome = settle_dir(dir, config)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

// ── Classify ─────────────────────────────────────────────────────────────────

pub fn classify_text(classifier: &SourceClassifier, text: &str) -> (Source, Option<String>) {
    (classifier.classify(text), classifier.batch_id(text))
}

pub fn cmd_classify(config: &ReconConfig, text: &str) -> Result<()> {
    let classifier = build_classifier(config)?;
    let (source, batch) = classify_text(&classifier, text);
    match batch {
        Some(batch) => println!("{} (batch {batch})", source.as_str()),
        None => println!("{}", source.as_str()),
    }
    Ok(())
}
