//! Amount extraction.
//!
//! Scans subject and body for money values. Labelled amounts ("Total:
//! ₹804") outrank bare currency-prefixed numbers; every candidate is
//! validated against the platform's plausible range; ties at equal
//! priority go to the larger magnitude, which keeps an order total ahead
//! of a labelled item count.

use regex::Regex;
use rust_decimal::Decimal;

use super::EmailText;
use crate::domain::{ExtractedField, ExtractionDiagnostics};
use crate::rules::PlatformRules;

const LABELLED_PRIORITY: u8 = 10;
const BARE_PRIORITY: u8 = 5;

/// Compiled amount patterns.
pub(crate) struct AmountScanner {
    labelled: Regex,
    bare: Regex,
}

struct Candidate {
    amount: Decimal,
    currency: Option<String>,
    priority: u8,
    strategy: &'static str,
}

impl AmountScanner {
    pub(crate) fn new() -> Self {
        // The rupee alternation covers the symbol, its UTF-8-as-Latin-1
        // mangling, and the textual forms; HTML entities are decoded before
        // scanning.
        Self {
            labelled: Regex::new(
                r"(?i)\b(?:grand total|order total|total amount|order amount|amount payable|amount paid|total|amount)\b\s*[:\-]*\s*(?:(\u{20B9}|â‚¹|\brs\.?|\binr\b|\$|€|£)\s*)?([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
            )
            .unwrap(),
            bare: Regex::new(
                r"(?i)(\u{20B9}|â‚¹|\brs\.?|\binr\b|\$|€|£)\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)",
            )
            .unwrap(),
        }
    }

    /// Best validated amount in the email, with its currency when a symbol
    /// was present.
    pub(crate) fn scan(
        &self,
        text: &EmailText,
        rules: &PlatformRules,
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Option<(Decimal, Option<String>)> {
        let mut candidates = Vec::new();
        for haystack in [text.subject.as_str(), text.body.as_str()] {
            self.collect(haystack, rules, diagnostics, &mut candidates);
        }

        let best = candidates
            .into_iter()
            .max_by(|a, b| (a.priority, a.amount).cmp(&(b.priority, b.amount)))?;
        diagnostics.used(ExtractedField::Amount, best.strategy);
        Some((best.amount, best.currency))
    }

    fn collect(
        &self,
        haystack: &str,
        rules: &PlatformRules,
        diagnostics: &mut ExtractionDiagnostics,
        candidates: &mut Vec<Candidate>,
    ) {
        for (regex, priority, strategy) in [
            (&self.labelled, LABELLED_PRIORITY, "labelled_amount"),
            (&self.bare, BARE_PRIORITY, "bare_currency_amount"),
        ] {
            for caps in regex.captures_iter(haystack) {
                let raw = &caps[2];
                let Ok(amount) = raw.replace(',', "").parse::<Decimal>() else {
                    diagnostics.rejected(ExtractedField::Amount, raw, "unparsable number");
                    continue;
                };
                if !rules.amount_range.contains(amount) {
                    diagnostics.rejected(ExtractedField::Amount, raw, "outside plausible range");
                    continue;
                }
                candidates.push(Candidate {
                    amount,
                    currency: caps.get(1).and_then(|c| currency_code(c.as_str())),
                    priority,
                    strategy,
                });
            }
        }
    }
}

fn currency_code(symbol: &str) -> Option<String> {
    let code = match symbol.to_lowercase().trim_end_matches('.') {
        "\u{20B9}" | "â‚¹" | "rs" | "inr" => "INR",
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        _ => return None,
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleRegistry;
    use rust_decimal_macros::dec;

    fn scan(subject: &str, body: &str) -> Option<(Decimal, Option<String>)> {
        let registry = RuleRegistry::builtin();
        let text = EmailText {
            subject: subject.to_string(),
            body: body.to_string(),
            html: None,
        };
        let mut diagnostics = ExtractionDiagnostics::default();
        AmountScanner::new().scan(&text, registry.generic(), &mut diagnostics)
    }

    #[test]
    fn labelled_total_beats_bare_amount() {
        let result = scan(
            "Order confirmed",
            "Shipping \u{20B9}40\nOrder Total: \u{20B9}804.00",
        );
        assert_eq!(result, Some((dec!(804.00), Some("INR".to_string()))));
    }

    #[test]
    fn mangled_rupee_symbol_is_recognized() {
        let result = scan("Receipt", "Total: â‚¹1,299");
        assert_eq!(result, Some((dec!(1299), Some("INR".to_string()))));
    }

    #[test]
    fn textual_rupee_forms() {
        assert_eq!(
            scan("Receipt", "Amount paid: Rs. 499"),
            Some((dec!(499), Some("INR".to_string())))
        );
        assert_eq!(
            scan("Receipt", "Total INR 2500"),
            Some((dec!(2500), Some("INR".to_string())))
        );
    }

    #[test]
    fn equal_priority_ties_go_to_larger_magnitude() {
        // Item subtotal and grand total are both labelled; the larger value
        // is the order amount.
        let result = scan("Receipt", "Item Total: \u{20B9}300\nGrand Total: \u{20B9}804");
        assert_eq!(result, Some((dec!(804), Some("INR".to_string()))));
    }

    #[test]
    fn labelled_amount_without_symbol_has_no_currency() {
        let result = scan("Receipt", "Grand Total 659.00");
        assert_eq!(result, Some((dec!(659.00), None)));
    }

    #[test]
    fn out_of_range_candidates_are_rejected_with_diagnostics() {
        let registry = RuleRegistry::builtin();
        let text = EmailText {
            subject: String::new(),
            body: "Total: \u{20B9}0.50".to_string(),
            html: None,
        };
        let mut diagnostics = ExtractionDiagnostics::default();
        let result = AmountScanner::new().scan(&text, registry.generic(), &mut diagnostics);
        assert!(result.is_none());
        // The labelled and bare patterns both see the value; every rejection
        // is for range.
        assert!(!diagnostics.rejected.is_empty());
        assert!(diagnostics
            .rejected
            .iter()
            .all(|r| r.reason == "outside plausible range"));
    }

    #[test]
    fn dollar_amounts_map_to_usd() {
        let result = scan("Receipt", "Total: $59.99");
        assert_eq!(result, Some((dec!(59.99), Some("USD".to_string()))));
    }

    #[test]
    fn no_amount_in_text() {
        assert_eq!(scan("Your order", "It has shipped."), None);
    }
}
