//! Product name extraction.
//!
//! Five-stage fallback chain: structured markup, subject patterns,
//! aggressive subject stripping, body keyword search, and finally a
//! deterministic synthesized placeholder. Every stage's output passes the
//! garbage filter; stages one through four must additionally look like a
//! real product name. The placeholder stage cannot fail and marks the
//! fragment so the reconciler knows a real name is still wanted.

use regex::Regex;

use super::EmailText;
use crate::domain::{EmailType, ExtractedField, ExtractionDiagnostics, Item};
use crate::normalize;
use crate::rules::PlatformRules;

/// Words that never count as the descriptive part of a product name.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "your", "has", "been", "with", "from", "was", "is", "of", "on", "to",
    "a", "an",
];

/// A candidate containing any of these is boilerplate, not a product.
const DENY_PHRASES: &[&str] = &[
    "your order",
    "order confirmation",
    "order number",
    "order id",
    "order update",
    "thank you",
    "view in browser",
    "email preferences",
    "customer support",
    "privacy policy",
    "all rights reserved",
    "shipping confirmation",
    "shipment confirmation",
    "tracking number",
    "out for delivery",
    "has been",
];

/// Generic tokens dropped wholesale during aggressive subject stripping.
const STRIP_TOKENS: &[&str] = &[
    "order",
    "orders",
    "package",
    "shipment",
    "delivery",
    "confirmation",
    "update",
    "your",
    "the",
    "for",
    "of",
    "has",
    "been",
    "is",
    "a",
    "an",
];

/// Result of the product-name chain.
pub(crate) struct ProductOutcome {
    pub name: String,
    pub synthesized: bool,
}

/// Compiled product-name patterns.
pub(crate) struct ProductScanner {
    markup: Vec<Regex>,
    subject_patterns: Vec<Regex>,
    strip_phrases: Regex,
    strip_prefix: Regex,
    body_patterns: Vec<Regex>,
}

impl ProductScanner {
    pub(crate) fn new() -> Self {
        Self {
            markup: vec![
                Regex::new(
                    r#"(?is)<(?:td|div|span|a|h1|h2|h3)[^>]*class="[^"]*(?:product|item)[^"]*"[^>]*>\s*([^<>]{3,160}?)\s*<"#,
                )
                .unwrap(),
                Regex::new(
                    r#"(?is)<img[^>]*class="[^"]*(?:product|item)[^"]*"[^>]*\balt="([^"]{3,160})""#,
                )
                .unwrap(),
            ],
            subject_patterns: vec![
                Regex::new(r#"(?i)your (?:order|purchase) (?:of|for) ['"]?(.+?)['"]? (?:has|is|was|will|have)\b"#)
                    .unwrap(),
                Regex::new(r#"(?i)your (?:order|purchase) (?:of|for) ['"]?(.+?)['"]?$"#).unwrap(),
                Regex::new(r#""([^"]{3,80})""#).unwrap(),
                Regex::new(r"(?i)^(?:shipped|delivered|arriving(?: today)?):\s*(.{3,80})$").unwrap(),
                Regex::new(r"(?i)^(.{3,80}?) (?:has been|was|is) (?:shipped|delivered|dispatched|out for delivery)\b")
                    .unwrap(),
            ],
            strip_phrases: Regex::new(
                r"(?i)\b(?:order confirmation|order confirmed|order update|order placed|shipping confirmation|shipment confirmation|delivery update|delivery confirmation|your order|your package|your shipment|has been shipped|has shipped|has been delivered|was delivered|out for delivery|is on its way|thank you for|thanks for|order details|invoice|receipt)\b",
            )
            .unwrap(),
            strip_prefix: Regex::new(r"(?i)^\s*(?:re|fwd?|fw)\s*:\s*").unwrap(),
            body_patterns: vec![
                Regex::new(r#"(?im)^you (?:ordered|purchased|bought)\s+['"]?(.+?)['"]?\.?\s*$"#)
                    .unwrap(),
                Regex::new(r"(?im)^(?:item|product)(?: name)?\s*[:\-]\s*(.+?)\s*$").unwrap(),
                Regex::new(r#"(?i)your ['"]?(.{3,80}?)['"]? (?:has been|was|is) (?:shipped|delivered|dispatched)"#)
                    .unwrap(),
            ],
        }
    }

    /// Runs the chain and always produces a name.
    pub(crate) fn scan(
        &self,
        text: &EmailText,
        rules: &PlatformRules,
        email_type: EmailType,
        reference: &str,
        items: &[Item],
        max_chars: usize,
        diagnostics: &mut ExtractionDiagnostics,
    ) -> ProductOutcome {
        // Stage 1: structured markup.
        if let Some(html) = &text.html {
            for pattern in &self.markup {
                for caps in pattern.captures_iter(html) {
                    let raw = normalize::decode_entities(&caps[1]);
                    if let Some(name) = accept(&raw, max_chars, diagnostics) {
                        diagnostics.used(ExtractedField::ProductName, "structured_markup");
                        return real(name);
                    }
                }
            }
        }

        // Stage 2: subject patterns.
        for pattern in &self.subject_patterns {
            if let Some(caps) = pattern.captures(&text.subject) {
                if let Some(name) = accept(&caps[1], max_chars, diagnostics) {
                    diagnostics.used(ExtractedField::ProductName, "subject_pattern");
                    return real(name);
                }
            }
        }

        // Stage 3: aggressive subject stripping.
        let stripped = self.strip_subject(&text.subject, rules);
        if let Some(name) = accept(&stripped, max_chars, diagnostics) {
            diagnostics.used(ExtractedField::ProductName, "subject_stripped");
            return real(name);
        }

        // Stage 4: body keyword search, then extracted item names.
        for pattern in &self.body_patterns {
            if let Some(caps) = pattern.captures(&text.body) {
                if let Some(name) = accept(&caps[1], max_chars, diagnostics) {
                    diagnostics.used(ExtractedField::ProductName, "body_keyword");
                    return real(name);
                }
            }
        }
        if let Some(item) = items.first() {
            if let Some(name) = accept(&item.name, max_chars, diagnostics) {
                diagnostics.used(ExtractedField::ProductName, "item_name");
                return real(name);
            }
        }

        // Stage 5: deterministic placeholder. Bypasses the product-likeness
        // check only.
        let placeholder = format!("{} {} {}", rules.id, email_type, reference);
        diagnostics.used(ExtractedField::ProductName, "synthesized");
        ProductOutcome {
            name: normalize::clean_text(normalize::truncate_chars(&placeholder, max_chars)),
            synthesized: true,
        }
    }

    /// Removes boilerplate phrases, platform names, reference-shaped
    /// tokens, and filler words from a subject line, keeping original case
    /// of what remains.
    fn strip_subject(&self, subject: &str, rules: &PlatformRules) -> String {
        let without_prefix = self.strip_prefix.replace(subject, " ");
        let without_phrases = self.strip_phrases.replace_all(&without_prefix, " ");

        let mut kept: Vec<&str> = Vec::new();
        for token in without_phrases.split_whitespace() {
            let word = token.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                continue;
            }
            if word.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            if STRIP_TOKENS.iter().any(|t| word.eq_ignore_ascii_case(t)) {
                continue;
            }
            if word.eq_ignore_ascii_case(&rules.id.to_string())
                || rules
                    .display_name
                    .split_whitespace()
                    .any(|d| word.eq_ignore_ascii_case(d))
            {
                continue;
            }
            kept.push(word);
        }
        kept.join(" ")
    }
}

fn real(name: String) -> ProductOutcome {
    ProductOutcome {
        name,
        synthesized: false,
    }
}

/// Garbage filter plus product-likeness heuristic, recording rejections.
fn accept(
    raw: &str,
    max_chars: usize,
    diagnostics: &mut ExtractionDiagnostics,
) -> Option<String> {
    let name = normalize::clean_text(normalize::truncate_chars(raw.trim(), max_chars));
    if let Err(reason) = check(&name) {
        if !name.is_empty() {
            diagnostics.rejected(ExtractedField::ProductName, name, reason);
        }
        return None;
    }
    Some(name)
}

fn check(name: &str) -> Result<(), &'static str> {
    // Garbage filter.
    if name.len() < 3 {
        return Err("too short");
    }
    if !name.chars().any(|c| c.is_alphabetic()) {
        return Err("no letters");
    }
    let lower = name.to_lowercase();
    if lower.contains("http") || lower.contains("www.") || lower.contains('@') {
        return Err("link or address");
    }

    // Product-likeness heuristic.
    if name.split_whitespace().count() < 2 {
        return Err("single word");
    }
    if !name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("no capitalization");
    }
    if DENY_PHRASES.iter().any(|p| lower.contains(p)) {
        return Err("boilerplate phrase");
    }
    let descriptive = name.split_whitespace().any(|word| {
        word.len() >= 3
            && word.chars().all(|c| c.is_alphabetic())
            && !STOPWORDS.iter().any(|s| word.eq_ignore_ascii_case(s))
    });
    if !descriptive {
        return Err("no descriptive word");
    }
    Ok(())
}
