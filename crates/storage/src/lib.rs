pub mod db;

pub use db::{
    create_db, get_credits, get_invoices, get_pending_parcels, insert_bank_transactions,
    mark_parcels_matched, upsert_invoices, upsert_parcels, DbPool,
};
