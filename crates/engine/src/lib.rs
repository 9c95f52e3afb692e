//! Matching and aggregation over normalized records. Everything here is
//! synchronous and works on data already loaded in memory.

pub mod gateway;
pub mod invoice;
pub mod remittance;
pub mod report;
pub mod run;
pub mod settlement;
pub mod subset;

pub use gateway::{group_batches, match_batches, BatchMatch, BatchMatchKind, GatewayBatch};
pub use invoice::{InvoiceBook, LinkHint};
pub use remittance::{match_remittances, RemittanceMatch, RemittanceOutcome};
pub use report::{GatewayLine, OrderLink, ParcelLink, PeriodLine, ReconReport, RemittanceLine, Summary};
pub use run::{reconcile, reconcile_with, ReconInput};
pub use settlement::{aggregate_periods, PayoutOrder, SettlementFile, SettlementOutcome};
pub use subset::{find_subset, find_subset_by, SubsetMatch};
