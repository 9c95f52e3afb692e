use ramburs_core::{ClassifierConfig, Source};
use regex::Regex;

use crate::util::strip_diacritics;

/// Keywords for one source, already lowercased and diacritic-free.
struct KeywordRule {
    source: Source,
    keywords: Vec<String>,
}

/// Tags free text (bank statement details, file names) with its [`Source`].
///
/// Rules are checked in a fixed order: courier A, courier B, payment gateway,
/// marketplace. The first rule with a keyword contained in the text wins. A
/// gateway batch token also classifies as [`Source::PaymentGateway`].
pub struct SourceClassifier {
    rules: Vec<KeywordRule>,
    batch_pattern: Option<Regex>,
}

impl Default for SourceClassifier {
    fn default() -> Self {
        let config = ClassifierConfig::default();
        Self {
            rules: rules_from(&config),
            batch_pattern: Regex::new(&config.batch_pattern).ok(),
        }
    }
}

impl SourceClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, regex::Error> {
        let batch_pattern = if config.batch_pattern.trim().is_empty() {
            None
        } else {
            Some(Regex::new(&config.batch_pattern)?)
        };
        Ok(Self {
            rules: rules_from(config),
            batch_pattern,
        })
    }

    pub fn classify(&self, text: &str) -> Source {
        let haystack = strip_diacritics(text).to_lowercase();

        for rule in &self.rules {
            if rule.keywords.iter().any(|k| haystack.contains(k.as_str())) {
                return rule.source;
            }
            if rule.source == Source::PaymentGateway && self.batch_id(text).is_some() {
                return Source::PaymentGateway;
            }
        }

        Source::Other
    }

    /// Gateway settlement batch id mentioned in `text`, if any. The first
    /// capture group of the pattern is the id; without groups the whole match
    /// is used.
    pub fn batch_id(&self, text: &str) -> Option<String> {
        let re = self.batch_pattern.as_ref()?;
        let caps = re.captures(text)?;
        caps.get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().trim().to_string())
    }
}

fn rules_from(config: &ClassifierConfig) -> Vec<KeywordRule> {
    let normalize = |list: &[String]| -> Vec<String> {
        list.iter()
            .map(|k| strip_diacritics(k.trim()).to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    };
    vec![
        KeywordRule { source: Source::CourierA, keywords: normalize(&config.courier_a) },
        KeywordRule { source: Source::CourierB, keywords: normalize(&config.courier_b) },
        KeywordRule { source: Source::PaymentGateway, keywords: normalize(&config.gateway) },
        KeywordRule { source: Source::Marketplace, keywords: normalize(&config.marketplace) },
    ]
}
