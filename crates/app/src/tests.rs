//! CLI command tests

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeZone, Utc};
use ramburs_core::{DateRange, LinkStatus, Money, ReconConfig, Source};
use ramburs_storage::{create_db, get_invoices, get_pending_parcels, DbPool};
use tempfile::TempDir;

use crate::cli::CourierArg;
use crate::commands::{self, ReconcileArgs};

const BANK: &str = "\
Extras de cont;;;
Cont: RO49AAAA1B31007593840000;;;
Dată operațiune;Număr OP;Sumă;Detalii
04.07.2025;OP100;75,49;INCASARE RAMBURS FAN COURIER EXPRESS
16.07.2025;OP102;80,00;Decontare card BATCH 004512
21.07.2025;OP103;662,27;DANTE INTERNATIONAL SA
22.07.2025;OP104;-150,00;Plata chirie
";

const FAN: &str = "\
AWB,Ramburs,Data livrare,Status,Destinatar
2001,30.00,01.07.2025,Livrat,Ion Pop
2002,45.50,01.07.2025,Livrat,Ana Pop
2003,19.99,02.07.2025,Livrat,Dan Pop
";

const INVOICES: &str = "\
ID,Numar factura,Total,Data emiterii,Client
1,FCT-0001,30.00,01.07.2025,Ion Pop
2,FCT-0002,45.50,01.07.2025,Ana Pop
3,FCT-0003,100.00,14.07.2025,Web Client
";

const GATEWAY: &str = "\
Batch,Order ID,Amount,Date
4512,W1,100.00,14.07.2025
4512,W2,-20.00,15.07.2025
";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn marketplace_dir(root: &Path) -> PathBuf {
    let dir = root.join("emag");
    std::fs::create_dir(&dir).unwrap();
    write(
        &dir,
        "dp_iulie.csv",
        "ID comanda,Data inceput perioada,Data sfarsit perioada,Valoare\n\
         A1,01.07.2025,15.07.2025,500.00\n\
         X,01.07.2025,15.07.2025,120.00\n\
         X,01.07.2025,15.07.2025,-120.00\n\
         A2,01.07.2025,15.07.2025,500.00\n",
    );
    write(&dir, "dc_iulie.csv", "Luna raportare,Valoare neta\n07.2025,-335.82\n");
    write(&dir, "dcs_iulie.csv", "Luna raportare,Valoare neta\n07.2025,-10.00\n");
    write(&dir, "dv_iulie.csv", "Luna raportare,Valoare voucher\n07.2025,50.00\n");
    write(&dir, "notes.csv", "a,b\n1,2\n");
    write(&dir, "readme.txt", "not a report");
    dir
}

async fn seeded_db(dir: &Path) -> DbPool {
    let pool = create_db(&dir.join("test.db")).await.unwrap();
    let classifier = commands::build_classifier(&ReconConfig::default()).unwrap();

    let bank = commands::import_bank(&pool, &write(dir, "bank.csv", BANK), &classifier)
        .await
        .unwrap();
    assert_eq!(bank.read, 3);
    assert_eq!(bank.stored, 3);

    let parcels = commands::import_parcels(&pool, &write(dir, "fan.csv", FAN), CourierArg::A.into())
        .await
        .unwrap();
    assert_eq!(parcels.read, 3);

    let invoices = commands::import_invoices(&pool, &write(dir, "facturi.csv", INVOICES))
        .await
        .unwrap();
    assert_eq!(invoices.stored, 3);
    pool
}

fn july(gateway: Option<PathBuf>, marketplace: Option<PathBuf>) -> ReconcileArgs {
    ReconcileArgs {
        from: "2025-07".parse().unwrap(),
        to: None,
        gateway,
        marketplace,
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap()
}

// ========== Config ==========

#[test]
fn test_load_config_defaults_without_file() {
    let config = commands::load_config(None).unwrap();
    assert_eq!(config, ReconConfig::default());
}

#[test]
fn test_load_config_from_path() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "custom.toml", "[matching]\nmax_pool_size = 10\n");
    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.matching.max_pool_size, 10);
}

#[test]
fn test_load_config_missing_path_errors() {
    let dir = TempDir::new().unwrap();
    assert!(commands::load_config(Some(&dir.path().join("absent.toml"))).is_err());
}

// ========== Import ==========

#[tokio::test]
async fn test_reimport_bank_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let pool = seeded_db(dir.path()).await;
    let classifier = commands::build_classifier(&ReconConfig::default()).unwrap();

    let again = commands::import_bank(&pool, &dir.path().join("bank.csv"), &classifier)
        .await
        .unwrap();
    assert_eq!(again.read, 3);
    assert_eq!(again.stored, 0);
}

#[tokio::test]
async fn test_import_parcels_missing_column_is_soft() {
    let dir = TempDir::new().unwrap();
    let pool = create_db(&dir.path().join("test.db")).await.unwrap();
    let file = write(dir.path(), "bad.csv", "AWB,Greutate\n1,2.5\n");

    let summary = commands::import_parcels(&pool, &file, Source::CourierB).await.unwrap();
    assert_eq!(summary.read, 0);
    assert!(!summary.errors.is_empty());
}

// ========== Reconcile ==========

#[tokio::test]
async fn test_reconcile_month_persists_matched_parcels() {
    let dir = TempDir::new().unwrap();
    let pool = seeded_db(dir.path()).await;

    let reports = commands::reconcile_months(&pool, &ReconConfig::default(), &july(None, None), now())
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.remittances[0].bank_reference, "OP100");
    assert_eq!(report.remittances[0].parcels.len(), 2);
    assert_eq!(report.pending_total, Money::from_cents(1999));

    let pending = get_pending_parcels(&pool).await.unwrap();
    let numbers: Vec<&str> = pending.iter().map(|p| p.parcel_number.as_str()).collect();
    assert_eq!(numbers, vec!["2003"]);

    // A second run has nothing left to explain OP100 with.
    let rerun = commands::reconcile_months(&pool, &ReconConfig::default(), &july(None, None), now())
        .await
        .unwrap();
    assert!(rerun[0].remittances.is_empty());
    assert!(rerun[0].unmatched_credits.iter().any(|c| c.reference == "OP100"));
}

#[tokio::test]
async fn test_reconcile_with_gateway_and_marketplace() {
    let dir = TempDir::new().unwrap();
    let pool = seeded_db(dir.path()).await;
    let args = july(
        Some(write(dir.path(), "netopia.csv", GATEWAY)),
        Some(marketplace_dir(dir.path())),
    );

    let reports = commands::reconcile_months(&pool, &ReconConfig::default(), &args, now())
        .await
        .unwrap();
    let report = &reports[0];

    let gw = &report.gateway[0];
    assert_eq!(gw.batch.bank_reference.as_deref(), Some("OP102"));
    assert_eq!(gw.orders[0].invoice.as_ref().unwrap().invoice_number, "FCT-0003");
    assert_eq!(gw.orders[1].link, LinkStatus::Refunded);

    let period = &report.periods[0];
    assert_eq!(period.settlement.net_total, "662.27".parse::<Money>().unwrap());
    assert_eq!(period.bank_reference.as_deref(), Some("OP103"));
    assert_eq!(report.summary.matched_credits, 3);
}

#[tokio::test]
async fn test_reconcile_runs_each_month() {
    let dir = TempDir::new().unwrap();
    let pool = seeded_db(dir.path()).await;
    let args = ReconcileArgs {
        from: "2025-06".parse().unwrap(),
        to: Some("2025-07".parse().unwrap()),
        gateway: None,
        marketplace: None,
    };

    let reports = commands::reconcile_months(&pool, &ReconConfig::default(), &args, now())
        .await
        .unwrap();
    // June has no credits but pending parcels keep it non-empty.
    assert_eq!(reports.len(), 2);
    assert!(reports[0].remittances.is_empty());
    assert_eq!(reports[1].remittances.len(), 1);
}

#[tokio::test]
async fn test_reconcile_skips_empty_months() {
    let dir = TempDir::new().unwrap();
    let pool = create_db(&dir.path().join("test.db")).await.unwrap();
    let classifier = commands::build_classifier(&ReconConfig::default()).unwrap();
    commands::import_bank(&pool, &write(dir.path(), "bank.csv", BANK), &classifier)
        .await
        .unwrap();
    let args = ReconcileArgs {
        from: "2025-06".parse().unwrap(),
        to: Some("2025-07".parse().unwrap()),
        gateway: None,
        marketplace: None,
    };

    let reports = commands::reconcile_months(&pool, &ReconConfig::default(), &args, now())
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].period, "2025-07".parse::<ramburs_core::ReportingMonth>().unwrap().range());
}

#[tokio::test]
async fn test_reconcile_empty_store_fails() {
    let dir = TempDir::new().unwrap();
    let pool = create_db(&dir.path().join("test.db")).await.unwrap();

    let err = commands::reconcile_months(&pool, &ReconConfig::default(), &july(None, None), now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("No usable input data"));
}

#[tokio::test]
async fn test_reconcile_rejects_reversed_range() {
    let dir = TempDir::new().unwrap();
    let pool = create_db(&dir.path().join("test.db")).await.unwrap();
    let args = ReconcileArgs {
        from: "2025-07".parse().unwrap(),
        to: Some("2025-06".parse().unwrap()),
        gateway: None,
        marketplace: None,
    };
    assert!(commands::reconcile_months(&pool, &ReconConfig::default(), &args, now())
        .await
        .is_err());
}

#[tokio::test]
async fn test_export_writes_single_header() {
    let dir = TempDir::new().unwrap();
    let pool = seeded_db(dir.path()).await;
    let args = ReconcileArgs {
        from: "2025-06".parse().unwrap(),
        to: Some("2025-07".parse().unwrap()),
        gateway: None,
        marketplace: None,
    };
    let reports = commands::reconcile_months(&pool, &ReconConfig::default(), &args, now())
        .await
        .unwrap();

    let out = dir.path().join("export.csv");
    commands::write_export(&out, &reports).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.matches("section,bank_reference").count(), 1);
    assert!(text.contains("remittance,OP100,2025-07-04,courier_a,2001,30.00,FCT-0001,amount_matched"));
}

#[tokio::test]
async fn test_invoice_used_once_across_months() {
    let dir = TempDir::new().unwrap();
    let pool = create_db(&dir.path().join("test.db")).await.unwrap();
    let classifier = commands::build_classifier(&ReconConfig::default()).unwrap();

    let bank = "\
Data;Numar OP;Suma;Detalii
04.07.2025;OP1;30,00;FAN COURIER ramburs
04.08.2025;OP2;30,00;FAN COURIER ramburs
";
    let fan = "\
AWB,Ramburs,Data livrare,Status
2001,30.00,01.07.2025,Livrat
2005,30.00,01.08.2025,Livrat
";
    let invoices = "\
Numar factura,Total,Data emiterii
FCT-1,30.00,01.07.2025
";
    commands::import_bank(&pool, &write(dir.path(), "bank.csv", bank), &classifier)
        .await
        .unwrap();
    commands::import_parcels(&pool, &write(dir.path(), "fan.csv", fan), Source::CourierA)
        .await
        .unwrap();
    commands::import_invoices(&pool, &write(dir.path(), "facturi.csv", invoices))
        .await
        .unwrap();

    let args = ReconcileArgs {
        from: "2025-07".parse().unwrap(),
        to: Some("2025-08".parse().unwrap()),
        gateway: None,
        marketplace: None,
    };
    let reports = commands::reconcile_months(&pool, &ReconConfig::default(), &args, now())
        .await
        .unwrap();
    assert_eq!(reports.len(), 2);

    let numbers: Vec<&str> = reports
        .iter()
        .flat_map(|r| r.remittances.iter())
        .flat_map(|line| line.parcels.iter())
        .filter_map(|p| p.invoice.as_ref())
        .map(|m| m.invoice_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["FCT-1"]);
    assert_eq!(reports[1].remittances[0].parcels[0].link, LinkStatus::NoInvoiceFound);
}

#[tokio::test]
async fn test_import_invoice_registers_without_ids() {
    let dir = TempDir::new().unwrap();
    let pool = create_db(&dir.path().join("test.db")).await.unwrap();

    let june = write(dir.path(), "iunie.csv", "Numar factura,Total,Data emiterii\nFCT-1,30.00,30.06.2025\n");
    let july = write(dir.path(), "iulie.csv", "Numar factura,Total,Data emiterii\nFCT-2,45.00,01.07.2025\n");
    commands::import_invoices(&pool, &june).await.unwrap();
    commands::import_invoices(&pool, &july).await.unwrap();

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
    );
    let stored = get_invoices(&pool, range).await.unwrap();
    let numbers: Vec<&str> = stored.iter().map(|i| i.number.as_str()).collect();
    assert_eq!(numbers, vec!["FCT-1", "FCT-2"]);
}

// ========== Settle ==========

#[test]
fn test_settle_dir_skips_unrelated_files() {
    let dir = TempDir::new().unwrap();
    let emag = marketplace_dir(dir.path());

    let (files, errors) = commands::load_settlement_files(&emag).unwrap();
    assert_eq!(files.len(), 4);
    assert!(errors.is_empty());

    let outcome = commands::settle_dir(&emag, &ReconConfig::default()).unwrap();
    assert_eq!(outcome.periods.len(), 1);
    assert_eq!(outcome.periods[0].net_total, "662.27".parse::<Money>().unwrap());
}

#[test]
fn test_settle_empty_dir_fails() {
    let dir = TempDir::new().unwrap();
    assert!(commands::settle_dir(dir.path(), &ReconConfig::default()).is_err());
}

// ========== Classify ==========

#[test]
fn test_classify_text() {
    let classifier = commands::build_classifier(&ReconConfig::default()).unwrap();

    let (source, batch) = commands::classify_text(&classifier, "INCASARE RAMBURS FAN COURIER");
    assert_eq!(source, Source::CourierA);
    assert!(batch.is_none());

    let (source, batch) = commands::classify_text(&classifier, "Decontare card BATCH 004512");
    assert_eq!(source, Source::PaymentGateway);
    assert_eq!(batch.as_deref(), Some("004512"));
}
