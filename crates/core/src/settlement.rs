use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::money::Money;
use super::period::DateRange;

/// Marketplace report types. The tags are the prefixes the marketplace uses in
/// its export (`dp_...`, `dc_...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementFileKind {
    /// `dp`: payout.
    Payout,
    /// `dv`: vouchers issued.
    Voucher,
    /// `dvs`: vouchers reversed.
    VoucherReversal,
    /// `dc`: sales commission.
    Commission,
    /// `dcco`: order commission.
    OrderCommission,
    /// `dccd`: delivery commission.
    DeliveryCommission,
    /// `ded`: extended-delivery charges.
    Delivery,
    /// `dcs`: commission reversed (storno).
    CommissionReversal,
}

impl SettlementFileKind {
    pub const ALL: [SettlementFileKind; 8] = [
        SettlementFileKind::Payout,
        SettlementFileKind::Voucher,
        SettlementFileKind::VoucherReversal,
        SettlementFileKind::Commission,
        SettlementFileKind::OrderCommission,
        SettlementFileKind::DeliveryCommission,
        SettlementFileKind::Delivery,
        SettlementFileKind::CommissionReversal,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            SettlementFileKind::Payout => "dp",
            SettlementFileKind::Voucher => "dv",
            SettlementFileKind::VoucherReversal => "dvs",
            SettlementFileKind::Commission => "dc",
            SettlementFileKind::OrderCommission => "dcco",
            SettlementFileKind::DeliveryCommission => "dccd",
            SettlementFileKind::Delivery => "ded",
            SettlementFileKind::CommissionReversal => "dcs",
        }
    }

    /// Commission burdens are taxed; vouchers and payouts are not.
    pub fn is_commission(self) -> bool {
        matches!(
            self,
            SettlementFileKind::Commission
                | SettlementFileKind::OrderCommission
                | SettlementFileKind::DeliveryCommission
                | SettlementFileKind::Delivery
        )
    }

    pub fn is_voucher(self) -> bool {
        matches!(self, SettlementFileKind::Voucher | SettlementFileKind::VoucherReversal)
    }

    /// Detects the kind from a file stem like `dccd_2025_07_shop.csv`. Only the
    /// type is read from the name; the period always comes from file content.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.rsplit(['/', '\\']).next().unwrap_or(name).to_lowercase();
        let token = stem.split(|c: char| !c.is_ascii_alphanumeric()).next()?;
        token.parse().ok()
    }
}

impl fmt::Display for SettlementFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for SettlementFileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        SettlementFileKind::ALL
            .into_iter()
            .find(|k| k.tag() == s)
            .ok_or_else(|| format!("Unknown settlement file type: '{s}'"))
    }
}

/// Component totals behind a period's net figure, kept for audit display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeriodBreakdown {
    pub payout_total: Money,
    pub voucher_total: Money,
    pub commission_total: Money,
    pub reversed_commission_total: Money,
}

impl PeriodBreakdown {
    /// `payout + voucher - (commission - reversed_commission)`
    pub fn net_total(&self) -> Money {
        self.payout_total + self.voucher_total
            - (self.commission_total - self.reversed_commission_total)
    }
}

/// A file grouped into a period, as listed in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFile {
    pub name: String,
    pub kind: SettlementFileKind,
    pub row_count: usize,
    /// Tax multiplier applied to this file's rows, for commission kinds.
    pub tax_multiplier: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementPeriod {
    pub period: DateRange,
    pub files: Vec<PeriodFile>,
    pub breakdown: PeriodBreakdown,
    pub net_total: Money,
}

impl SettlementPeriod {
    pub fn period_start(&self) -> chrono::NaiveDate {
        self.period.start
    }

    pub fn period_end(&self) -> chrono::NaiveDate {
        self.period.end
    }
}
