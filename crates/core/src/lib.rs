pub mod cache;
pub mod config;
pub mod error;
pub mod invoice;
pub mod money;
pub mod parcel;
pub mod period;
pub mod settlement;
pub mod transaction;

pub use cache::TimedCache;
pub use config::{ClassifierConfig, ConfigError, InvoiceConfig, MatchingConfig, ReconConfig, TaxStep, TaxTable};
pub use error::{ErrorLog, ReconError, SoftError};
pub use invoice::{Invoice, InvoiceId, InvoiceMatch, LinkStatus, UsedInvoices};
pub use money::Money;
pub use parcel::Parcel;
pub use period::{DateRange, InvalidMonth, ReportingMonth};
pub use settlement::{PeriodBreakdown, PeriodFile, SettlementFileKind, SettlementPeriod};
pub use transaction::{Source, Transaction};
