//! Order and tracking reference extraction.
//!
//! Walks a platform's pattern chain (highest priority first), subject
//! before body. Captures are normalized, then validated: a usable
//! reference carries a digit, is not a placeholder token, and is not one
//! repeated character. The first capture to survive validation wins.

use super::EmailText;
use crate::domain::{ExtractedField, ExtractionDiagnostics};
use crate::normalize;
use crate::rules::{ReferencePattern, RuleRegistry};

const MIN_LEN: usize = 4;
const MAX_LEN: usize = 40;

/// First validated reference in the email for the given pattern chain.
pub(crate) fn extract_reference(
    text: &EmailText,
    patterns: &[ReferencePattern],
    registry: &RuleRegistry,
    field: ExtractedField,
    diagnostics: &mut ExtractionDiagnostics,
) -> Option<String> {
    for pattern in patterns {
        for haystack in [text.subject.as_str(), text.body.as_str()] {
            for caps in pattern.regex.captures_iter(haystack) {
                let Some(capture) = caps.get(1) else {
                    continue;
                };
                let candidate = normalize::normalize_reference(capture.as_str());
                match validate(&candidate, registry) {
                    Ok(()) => {
                        diagnostics.used(field, pattern.name.clone());
                        return Some(candidate);
                    }
                    Err(reason) => {
                        diagnostics.rejected(field, candidate, reason);
                    }
                }
            }
        }
    }
    None
}

fn validate(candidate: &str, registry: &RuleRegistry) -> Result<(), &'static str> {
    if candidate.len() < MIN_LEN || candidate.len() > MAX_LEN {
        return Err("length out of bounds");
    }
    // Placeholders first: some carry digits, some don't.
    if registry.is_reference_placeholder(candidate) {
        return Err("placeholder token");
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err("no digit");
    }
    let mut chars = candidate.chars();
    let first = chars.next();
    if first.is_some() && chars.all(|c| Some(c) == first) {
        return Err("repeated character");
    }
    Ok(())
}
