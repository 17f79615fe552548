//! Per-platform rule tables.
//!
//! A [`PlatformSpec`] is the serde-able, data-only description of one
//! platform: sender domains, signal phrases, reference pattern chains, and
//! the plausible amount range. Specs compile into [`PlatformRules`] with
//! ready-to-run regexes. Rule tables carry no extraction logic; the shared
//! extractors interpret them.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RulesError;
use crate::domain::PlatformId;

/// One reference-extraction pattern in uncompiled form.
///
/// The regex must contain exactly one capture group holding the reference
/// token. Higher priority patterns are tried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Name used in extraction diagnostics (e.g. "amazon_order_id").
    pub name: String,
    /// Regex with one capture group.
    pub pattern: String,
    /// Higher runs first.
    pub priority: u8,
}

impl PatternSpec {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            priority,
        }
    }
}

/// Plausible range for extracted amounts, inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl AmountRange {
    /// True when the amount falls inside the range.
    pub fn contains(&self, amount: Decimal) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Data-only description of one platform's rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSpec {
    /// Platform identifier ("amazon", "flipkart").
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Substrings matched against the sender's domain, lowercase.
    pub sender_domains: Vec<String>,
    /// Phrases matched against subject and body, lowercase.
    pub signal_phrases: Vec<String>,
    /// Order-reference pattern chain.
    pub order_reference_patterns: Vec<PatternSpec>,
    /// Tracking-reference pattern chain.
    pub tracking_reference_patterns: Vec<PatternSpec>,
    /// Plausible amount range for validation.
    pub amount_range: AmountRange,
}

impl PlatformSpec {
    /// Compiles the spec's patterns. Fails on the first invalid regex, naming
    /// the platform and pattern so user-supplied rule files are debuggable.
    pub fn compile(&self) -> Result<PlatformRules, RulesError> {
        Ok(PlatformRules {
            id: PlatformId::from(self.id.as_str()),
            display_name: self.display_name.clone(),
            sender_domains: lowercased(&self.sender_domains),
            signal_phrases: lowercased(&self.signal_phrases),
            order_reference_patterns: compile_patterns(&self.id, &self.order_reference_patterns)?,
            tracking_reference_patterns: compile_patterns(
                &self.id,
                &self.tracking_reference_patterns,
            )?,
            amount_range: self.amount_range,
        })
    }
}

fn lowercased(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

fn compile_patterns(
    platform: &str,
    specs: &[PatternSpec],
) -> Result<Vec<ReferencePattern>, RulesError> {
    let mut compiled = specs
        .iter()
        .map(|spec| {
            let regex = Regex::new(&spec.pattern).map_err(|source| RulesError::InvalidPattern {
                platform: platform.to_string(),
                name: spec.name.clone(),
                source,
            })?;
            Ok(ReferencePattern {
                name: spec.name.clone(),
                regex,
                priority: spec.priority,
            })
        })
        .collect::<Result<Vec<_>, RulesError>>()?;
    // Extractors walk the chain in order; sort once here.
    compiled.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(compiled)
}

/// A compiled reference pattern.
#[derive(Debug, Clone)]
pub struct ReferencePattern {
    /// Name used in extraction diagnostics.
    pub name: String,
    /// Compiled regex with one capture group.
    pub regex: Regex,
    /// Higher runs first.
    pub priority: u8,
}

/// Compiled rules for one platform, ready for the classifier and extractors.
#[derive(Debug, Clone)]
pub struct PlatformRules {
    /// Platform identifier.
    pub id: PlatformId,
    /// Human-readable name.
    pub display_name: String,
    /// Lowercase substrings matched against the sender domain.
    pub sender_domains: Vec<String>,
    /// Lowercase phrases matched against subject and body.
    pub signal_phrases: Vec<String>,
    /// Order-reference patterns, highest priority first.
    pub order_reference_patterns: Vec<ReferencePattern>,
    /// Tracking-reference patterns, highest priority first.
    pub tracking_reference_patterns: Vec<ReferencePattern>,
    /// Plausible amount range.
    pub amount_range: AmountRange,
}

impl PlatformRules {
    /// The configured domain substring that matches the sender domain, if
    /// any.
    pub fn sender_match<'a>(&'a self, sender_domain: &str) -> Option<&'a str> {
        let domain = sender_domain.to_lowercase();
        self.sender_domains
            .iter()
            .find(|d| domain.contains(d.as_str()))
            .map(|d| d.as_str())
    }

    /// True when any configured domain is a substring of the sender domain.
    pub fn matches_sender(&self, sender_domain: &str) -> bool {
        self.sender_match(sender_domain).is_some()
    }

    /// First signal phrase found in the text, if any. Expects lowercased
    /// input.
    pub fn signal_in<'a>(&'a self, text: &str) -> Option<&'a str> {
        self.signal_phrases
            .iter()
            .find(|phrase| text.contains(phrase.as_str()))
            .map(|phrase| phrase.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spec() -> PlatformSpec {
        PlatformSpec {
            id: "amazon".to_string(),
            display_name: "Amazon".to_string(),
            sender_domains: vec!["Amazon.in".to_string()],
            signal_phrases: vec!["Your Amazon order".to_string()],
            order_reference_patterns: vec![
                PatternSpec::new("labelled", r"(?i)order[ #:]*([0-9-]{10,})", 5),
                PatternSpec::new("amazon_order_id", r"\b(\d{3}-\d{7}-\d{7})\b", 10),
            ],
            tracking_reference_patterns: vec![],
            amount_range: AmountRange {
                min: dec!(1),
                max: dec!(1000000),
            },
        }
    }

    #[test]
    fn compile_sorts_patterns_by_priority() {
        let rules = spec().compile().unwrap();
        assert_eq!(rules.order_reference_patterns[0].name, "amazon_order_id");
        assert_eq!(rules.order_reference_patterns[1].name, "labelled");
    }

    #[test]
    fn compile_lowercases_match_data() {
        let rules = spec().compile().unwrap();
        assert_eq!(rules.sender_domains, vec!["amazon.in"]);
        assert_eq!(rules.signal_phrases, vec!["your amazon order"]);
    }

    #[test]
    fn compile_reports_bad_pattern_with_context() {
        let mut bad = spec();
        bad.order_reference_patterns
            .push(PatternSpec::new("broken", r"([0-9", 1));
        let err = bad.compile().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("amazon"));
        assert!(message.contains("broken"));
    }

    #[test]
    fn sender_matching_is_substring_and_case_insensitive() {
        let rules = spec().compile().unwrap();
        assert!(rules.matches_sender("marketplace.Amazon.in"));
        assert!(!rules.matches_sender("flipkart.com"));
    }

    #[test]
    fn amount_range_is_inclusive() {
        let range = AmountRange {
            min: dec!(1),
            max: dec!(100),
        };
        assert!(range.contains(dec!(1)));
        assert!(range.contains(dec!(100)));
        assert!(!range.contains(dec!(0.99)));
        assert!(!range.contains(dec!(100.01)));
    }

    #[test]
    fn spec_roundtrips_through_json() {
        let json = serde_json::to_string(&spec()).unwrap();
        let back: PlatformSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "amazon");
        assert_eq!(back.order_reference_patterns.len(), 2);
    }
}
