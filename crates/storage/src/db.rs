use chrono::NaiveDate;
use ramburs_core::{DateRange, Invoice, InvoiceId, Money, Parcel, Source, Transaction};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bank_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT NOT NULL,
            date TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            source TEXT NOT NULL,
            batch_id TEXT,
            details TEXT NOT NULL DEFAULT '',
            imported_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (reference, date, amount_cents)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parcels (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            courier TEXT NOT NULL,
            parcel_number TEXT NOT NULL,
            cod_cents INTEGER NOT NULL,
            delivery_date TEXT NOT NULL,
            recipient_name TEXT NOT NULL DEFAULT '',
            recipient_city TEXT NOT NULL DEFAULT '',
            is_delivered INTEGER NOT NULL DEFAULT 0,
            matched INTEGER NOT NULL DEFAULT 0,
            UNIQUE (courier, parcel_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            number TEXT NOT NULL UNIQUE,
            total_cents INTEGER NOT NULL,
            issue_date TEXT NOT NULL,
            client_name TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bank_transactions_date ON bank_transactions (date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_invoices_issue_date ON invoices (issue_date)")
        .execute(pool)
        .await?;

    Ok(())
}

fn decode_source(raw: &str) -> Result<Source, sqlx::Error> {
    raw.parse::<Source>()
        .map_err(|e| sqlx::Error::Decode(e.into()))
}

// ── Bank transactions ────────────────────────────────────────────────────────

/// Inserts statement lines, skipping ones already stored (same reference,
/// date and amount). Returns how many rows were new.
pub async fn insert_bank_transactions(pool: &DbPool, transactions: &[Transaction]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for t in transactions {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO bank_transactions (reference, date, amount_cents, source, batch_id, details) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&t.reference)
        .bind(t.date)
        .bind(t.amount.to_cents())
        .bind(t.source.as_str())
        .bind(t.batch_id.as_deref())
        .bind(&t.details)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

/// Credits dated inside `range`, oldest first.
pub async fn get_credits(pool: &DbPool, range: DateRange) -> Result<Vec<Transaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, NaiveDate, i64, String, Option<String>, String)>(
        "SELECT reference, date, amount_cents, source, batch_id, details FROM bank_transactions WHERE amount_cents > 0 AND date BETWEEN ? AND ? ORDER BY date, reference"
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(Transaction {
                reference: r.0,
                date: r.1,
                amount: Money::from_cents(r.2),
                source: decode_source(&r.3)?,
                batch_id: r.4,
                details: r.5,
            })
        })
        .collect()
}

// ── Parcels ──────────────────────────────────────────────────────────────────

/// Inserts or refreshes parcels. Delivery data is overwritten with the latest
/// export; the matched flag is never cleared.
pub async fn upsert_parcels(pool: &DbPool, parcels: &[Parcel]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut affected = 0;
    for p in parcels {
        let result = sqlx::query(
            r#"
            INSERT INTO parcels (courier, parcel_number, cod_cents, delivery_date, recipient_name, recipient_city, is_delivered, matched)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (courier, parcel_number) DO UPDATE SET
                cod_cents = excluded.cod_cents,
                delivery_date = excluded.delivery_date,
                recipient_name = excluded.recipient_name,
                recipient_city = excluded.recipient_city,
                is_delivered = excluded.is_delivered,
                matched = MAX(parcels.matched, excluded.matched)
            "#,
        )
        .bind(p.courier.as_str())
        .bind(&p.parcel_number)
        .bind(p.cod_amount.to_cents())
        .bind(p.delivery_date)
        .bind(&p.recipient_name)
        .bind(&p.recipient_city)
        .bind(p.is_delivered as i64)
        .bind(p.matched as i64)
        .execute(&mut *tx)
        .await?;
        affected += result.rows_affected();
    }
    tx.commit().await?;
    Ok(affected)
}

type ParcelRow = (String, String, i64, NaiveDate, String, String, i64, i64);

fn parcel_from_row(r: ParcelRow) -> Result<Parcel, sqlx::Error> {
    Ok(Parcel {
        courier: decode_source(&r.0)?,
        parcel_number: r.1,
        cod_amount: Money::from_cents(r.2),
        delivery_date: r.3,
        recipient_name: r.4,
        recipient_city: r.5,
        is_delivered: r.6 != 0,
        matched: r.7 != 0,
    })
}

/// Delivered parcels not yet attributed to a credit, in delivery order.
pub async fn get_pending_parcels(pool: &DbPool) -> Result<Vec<Parcel>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ParcelRow>(
        "SELECT courier, parcel_number, cod_cents, delivery_date, recipient_name, recipient_city, is_delivered, matched FROM parcels WHERE is_delivered = 1 AND matched = 0 ORDER BY delivery_date, courier, parcel_number"
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(parcel_from_row).collect()
}

pub async fn mark_parcels_matched(
    pool: &DbPool,
    courier: Source,
    parcel_numbers: &[String],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut updated = 0;
    for number in parcel_numbers {
        let result = sqlx::query("UPDATE parcels SET matched = 1 WHERE courier = ? AND parcel_number = ? AND matched = 0")
            .bind(courier.as_str())
            .bind(number)
            .execute(&mut *tx)
            .await?;
        updated += result.rows_affected();
    }
    tx.commit().await?;
    Ok(updated)
}

// ── Invoices ─────────────────────────────────────────────────────────────────

/// Inserts or refreshes invoices keyed on their number. Ids are assigned by
/// the store; the ids an export carries are not kept, so registers exported
/// without an id column never collide.
pub async fn upsert_invoices(pool: &DbPool, invoices: &[Invoice]) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut affected = 0;
    for i in invoices {
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (number, total_cents, issue_date, client_name)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (number) DO UPDATE SET
                total_cents = excluded.total_cents,
                issue_date = excluded.issue_date,
                client_name = excluded.client_name
            "#,
        )
        .bind(&i.number)
        .bind(i.total.to_cents())
        .bind(i.issue_date)
        .bind(i.client_name.as_deref())
        .execute(&mut *tx)
        .await?;
        affected += result.rows_affected();
    }
    tx.commit().await?;
    Ok(affected)
}

/// Invoices issued inside `range`, in issue order.
pub async fn get_invoices(pool: &DbPool, range: DateRange) -> Result<Vec<Invoice>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String, i64, NaiveDate, Option<String>)>(
        "SELECT id, number, total_cents, issue_date, client_name FROM invoices WHERE issue_date BETWEEN ? AND ? ORDER BY issue_date, id"
    )
    .bind(range.start)
    .bind(range.end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Invoice {
            id: InvoiceId(r.0),
            number: r.1,
            total: Money::from_cents(r.2),
            issue_date: r.3,
            client_name: r.4,
        })
        .collect())
}
