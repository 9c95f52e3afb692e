pub mod classify;
pub mod csv;
pub mod extract;
pub mod normalize;
pub mod util;

pub use classify::SourceClassifier;
pub use csv::{parse_amount, parse_date, read_extract, read_extract_file, ExtractError, ReadOptions, Row, TabularExtract};
pub use extract::{find_column, find_reference_column};
pub use normalize::{
    normalize_bank_statement, normalize_gateway_settlement, normalize_invoices, normalize_parcels, Normalized,
};
