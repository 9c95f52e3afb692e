//! Run configuration, loaded from TOML.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below.
//!
//! ```toml
//! [matching]
//! tolerance = "0.02"
//! max_pool_size = 22
//!
//! [invoices]
//! tolerance = "0.01"
//! lookback_days = 90
//!
//! [tax]
//! base = "1.19"
//! steps = [{ from = "2025-08", multiplier = "1.21" }]
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::money::Money;
use super::period::ReportingMonth;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub tolerance: Money,
    /// Pools larger than this skip the exhaustive subset search.
    pub max_pool_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: Money::from_cents(2),
            max_pool_size: 22,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceConfig {
    pub tolerance: Money,
    pub lookback_days: i64,
    pub cache_ttl_secs: i64,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            tolerance: Money::from_cents(1),
            lookback_days: 90,
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxStep {
    pub from: ReportingMonth,
    pub multiplier: Decimal,
}

/// VAT multiplier applied to marketplace commissions, as a step function over
/// calendar months. The cutoffs are jurisdiction and time specific: the
/// default reflects the Romanian standard rate moving from 19% to 21% in
/// August 2025.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxTable {
    /// Multiplier for months before the first step.
    pub base: Decimal,
    /// Ascending by `from`.
    pub steps: Vec<TaxStep>,
}

impl Default for TaxTable {
    fn default() -> Self {
        Self {
            base: Decimal::new(119, 2),
            steps: vec![TaxStep {
                from: ReportingMonth::known(2025, 8),
                multiplier: Decimal::new(121, 2),
            }],
        }
    }
}

impl TaxTable {
    pub fn multiplier(&self, month: ReportingMonth) -> Decimal {
        self.steps
            .iter()
            .take_while(|step| step.from <= month)
            .last()
            .map(|step| step.multiplier)
            .unwrap_or(self.base)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base <= Decimal::ZERO || self.steps.iter().any(|s| s.multiplier <= Decimal::ZERO) {
            return Err(ConfigError::Invalid("tax multipliers must be positive".into()));
        }
        if self.steps.windows(2).any(|w| w[0].from >= w[1].from) {
            return Err(ConfigError::Invalid(
                "tax steps must be strictly ascending by month".into(),
            ));
        }
        Ok(())
    }
}

/// Keyword lists for the source classifier, checked in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub courier_a: Vec<String>,
    pub courier_b: Vec<String>,
    pub gateway: Vec<String>,
    pub marketplace: Vec<String>,
    /// Regex for a gateway settlement batch token in bank details.
    pub batch_pattern: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let words = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            courier_a: words(&["fan courier", "fancourier"]),
            courier_b: words(&["sameday", "delivery solutions"]),
            gateway: words(&["netopia", "mobilpay", "card settlement"]),
            marketplace: words(&["emag", "dante international"]),
            batch_pattern: r"(?i)\bbatch\s*(?:id)?\s*[:#]?\s*([0-9]{4,})".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub matching: MatchingConfig,
    pub invoices: InvoiceConfig,
    pub tax: TaxTable,
    pub classifier: ClassifierConfig,
}

impl ReconConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ReconConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matching.tolerance.is_negative() || self.invoices.tolerance.is_negative() {
            return Err(ConfigError::Invalid("tolerances must not be negative".into()));
        }
        if self.invoices.lookback_days < 0 {
            return Err(ConfigError::Invalid("lookback_days must not be negative".into()));
        }
        self.tax.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(s: &str) -> ReportingMonth {
        s.parse().unwrap()
    }

    #[test]
    fn default_tax_table_steps_in_august_2025() {
        let table = TaxTable::default();
        assert_eq!(table.multiplier(month("2025-07")), Decimal::new(119, 2));
        assert_eq!(table.multiplier(month("2025-08")), Decimal::new(121, 2));
        assert_eq!(table.multiplier(month("2026-01")), Decimal::new(121, 2));
        assert_eq!(table.multiplier(month("2019-01")), Decimal::new(119, 2));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config, ReconConfig::default());
        assert_eq!(config.matching.max_pool_size, 22);
        assert_eq!(config.invoices.lookback_days, 90);
    }

    #[test]
    fn toml_overrides_sections() {
        let config = ReconConfig::from_toml(
            r#"
            [matching]
            tolerance = "0.05"

            [tax]
            base = "1.24"
            steps = [
                { from = "2016-01", multiplier = "1.20" },
                { from = "2017-01", multiplier = "1.19" },
            ]

            [classifier]
            courier_a = ["cargus"]
            "#,
        )
        .unwrap();
        assert_eq!(config.matching.tolerance, Money::from_cents(5));
        assert_eq!(config.matching.max_pool_size, 22);
        assert_eq!(config.tax.multiplier(month("2015-12")), Decimal::new(124, 2));
        assert_eq!(config.tax.multiplier(month("2016-06")), Decimal::new(120, 2));
        assert_eq!(config.tax.multiplier(month("2024-06")), Decimal::new(119, 2));
        assert_eq!(config.classifier.courier_a, vec!["cargus".to_string()]);
        assert!(!config.classifier.marketplace.is_empty());
    }

    #[test]
    fn rejects_unordered_tax_steps() {
        let err = ReconConfig::from_toml(
            r#"
            [tax]
            steps = [
                { from = "2025-08", multiplier = "1.21" },
                { from = "2025-01", multiplier = "1.19" },
            ]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let err = ReconConfig::from_toml("[invoices]\ntolerance = \"-0.01\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
