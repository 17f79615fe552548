//! The platform rule registry.
//!
//! One registry instance holds every known platform's compiled rules plus
//! the shared keyword tables (promotional deny list, order-keyword gate,
//! placeholder deny list). The classifier and extractors read from it; they
//! never hard-code vendor knowledge.

use regex::Regex;
use rust_decimal_macros::dec;

use super::platform::{AmountRange, PatternSpec, PlatformRules, PlatformSpec};
use super::RulesError;
use crate::domain::PlatformId;

/// Compiled rule tables for every known platform.
pub struct RuleRegistry {
    platforms: Vec<PlatformRules>,
    generic: PlatformRules,
    promotional_keywords: Vec<String>,
    order_keyword: Regex,
    reference_token: Regex,
    reference_placeholders: Vec<String>,
}

impl RuleRegistry {
    /// Registry with the builtin platform tables.
    pub fn builtin() -> Self {
        let platforms = vec![
            // Amazon: bare order ids are distinctive enough to outrank labels.
            PlatformSpec {
                id: "amazon".to_string(),
                display_name: "Amazon".to_string(),
                sender_domains: vec!["amazon.in".to_string(), "amazon.com".to_string()],
                signal_phrases: vec![
                    "amazon order".to_string(),
                    "your package from amazon".to_string(),
                ],
                order_reference_patterns: vec![
                    PatternSpec::new("amazon_order_id", r"\b(\d{3}-\d{7}-\d{7})\b", 10),
                    PatternSpec::new("labelled_order", LABELLED_ORDER, 5),
                ],
                tracking_reference_patterns: tracking_patterns(),
                amount_range: default_amount_range(),
            },
            // Flipkart: OD-prefixed ids.
            PlatformSpec {
                id: "flipkart".to_string(),
                display_name: "Flipkart".to_string(),
                sender_domains: vec!["flipkart.com".to_string()],
                signal_phrases: vec![
                    "flipkart order".to_string(),
                    "your flipkart".to_string(),
                ],
                order_reference_patterns: vec![
                    PatternSpec::new("flipkart_order_id", r"\b(OD\d{15,18})\b", 10),
                    PatternSpec::new("labelled_order", LABELLED_ORDER, 5),
                ],
                tracking_reference_patterns: tracking_patterns(),
                amount_range: default_amount_range(),
            },
            // Myntra: no distinctive bare format; labelled patterns only.
            PlatformSpec {
                id: "myntra".to_string(),
                display_name: "Myntra".to_string(),
                sender_domains: vec!["myntra.com".to_string()],
                signal_phrases: vec!["myntra order".to_string(), "your myntra".to_string()],
                order_reference_patterns: vec![PatternSpec::new(
                    "labelled_order",
                    LABELLED_ORDER,
                    5,
                )],
                tracking_reference_patterns: tracking_patterns(),
                amount_range: default_amount_range(),
            },
        ]
        .into_iter()
        .map(|spec| spec.compile().expect("builtin platform spec compiles"))
        .collect();

        let generic = PlatformSpec {
            id: "generic".to_string(),
            display_name: "Generic".to_string(),
            sender_domains: vec![],
            signal_phrases: vec![],
            order_reference_patterns: vec![
                PatternSpec::new("labelled_order", LABELLED_ORDER, 5),
                PatternSpec::new("labelled_reference", LABELLED_REFERENCE, 4),
            ],
            tracking_reference_patterns: tracking_patterns(),
            amount_range: default_amount_range(),
        }
        .compile()
        .expect("builtin generic spec compiles");

        Self {
            platforms,
            generic,
            promotional_keywords: vec![
                "unsubscribe".to_string(),
                "discount".to_string(),
                "% off".to_string(),
                "sale ends".to_string(),
                "flash sale".to_string(),
                "deal of the day".to_string(),
                "deals of the day".to_string(),
                "coupon".to_string(),
                "promo code".to_string(),
                "limited time offer".to_string(),
                "clearance".to_string(),
                "best deals".to_string(),
                "newsletter".to_string(),
            ],
            order_keyword: Regex::new(
                r"(?i)\b(order|purchase|invoice|receipt|shipment|tracking|delivery)\b",
            )
            .unwrap(),
            reference_token: Regex::new(r"\b[A-Za-z0-9][A-Za-z0-9-]{5,}\b").unwrap(),
            reference_placeholders: vec![
                "XXXXXXXXXX".to_string(),
                "0000000000".to_string(),
                "1234567890".to_string(),
                "YOUR-ORDER".to_string(),
                "ORDER-ID".to_string(),
                "ORDERNUMBER".to_string(),
            ],
        }
    }

    /// Adds or replaces a platform's rules from a user-supplied spec.
    pub fn register(&mut self, spec: &PlatformSpec) -> Result<(), RulesError> {
        let compiled = spec.compile()?;
        if compiled.id == self.generic.id {
            self.generic = compiled;
            return Ok(());
        }
        match self.platforms.iter_mut().find(|p| p.id == compiled.id) {
            Some(existing) => *existing = compiled,
            None => self.platforms.push(compiled),
        }
        Ok(())
    }

    /// Every registered platform, excluding the generic fallback.
    pub fn platforms(&self) -> &[PlatformRules] {
        &self.platforms
    }

    /// The generic fallback rules.
    pub fn generic(&self) -> &PlatformRules {
        &self.generic
    }

    /// Rules for a platform id, falling back to generic for unknown ids.
    pub fn rules_for(&self, id: &PlatformId) -> &PlatformRules {
        self.platforms
            .iter()
            .find(|p| &p.id == id)
            .unwrap_or(&self.generic)
    }

    /// First promotional keyword present in the text, if any. Expects
    /// lowercased input.
    pub fn promotional_keyword_in<'a>(&'a self, text: &str) -> Option<&'a str> {
        self.promotional_keywords
            .iter()
            .find(|keyword| text.contains(keyword.as_str()))
            .map(|keyword| keyword.as_str())
    }

    /// True when the text contains a whole-word order keyword.
    pub fn has_order_keyword(&self, text: &str) -> bool {
        self.order_keyword.is_match(text)
    }

    /// True when the text contains a token shaped like a reference: at
    /// least six alphanumeric/hyphen characters including a digit.
    pub fn has_reference_shaped_token(&self, text: &str) -> bool {
        self.reference_token
            .find_iter(text)
            .any(|token| token.as_str().chars().any(|c| c.is_ascii_digit()))
    }

    /// True when a normalized candidate is a known placeholder token.
    pub fn is_reference_placeholder(&self, candidate: &str) -> bool {
        self.reference_placeholders
            .iter()
            .any(|p| p == candidate)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Labelled order-reference pattern shared by every platform chain. The
/// separator class absorbs any mix of spaces, colons, and hash marks
/// ("Order number: #OD123").
const LABELLED_ORDER: &str =
    r"(?i)order\s*(?:number|no\.?|id)?[\s:#]*([A-Za-z0-9][A-Za-z0-9-]{3,24})";

/// Labelled generic reference pattern ("Reference: ...").
const LABELLED_REFERENCE: &str =
    r"(?i)reference\s*(?:number|no\.?|id)?[\s:#]*([A-Za-z0-9][A-Za-z0-9-]{3,24})";

fn tracking_patterns() -> Vec<PatternSpec> {
    vec![
        PatternSpec::new(
            "labelled_tracking",
            r"(?i)tracking\s*(?:number|no\.?|id|code)?[\s:#]*([A-Za-z0-9][A-Za-z0-9-]{3,24})",
            8,
        ),
        PatternSpec::new(
            "labelled_awb",
            r"(?i)\bawb\s*(?:number|no\.?)?[\s:#]*([A-Za-z0-9][A-Za-z0-9-]{4,24})",
            6,
        ),
        PatternSpec::new(
            "labelled_shipment",
            r"(?i)shipment\s*(?:number|no\.?|id)?[\s:#]*([A-Za-z0-9][A-Za-z0-9-]{3,24})",
            5,
        ),
    ]
}

fn default_amount_range() -> AmountRange {
    AmountRange {
        min: dec!(1),
        max: dec!(1000000),
    }
}
