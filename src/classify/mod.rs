//! Platform classification.
//!
//! Decides which platform an email belongs to before any extraction runs.
//! Promotional rejection is checked first and wins over every positive
//! signal; platform matches check sender domains, then signal phrases; a
//! generic fallback catches order-like mail from unknown vendors when the
//! text carries both a reference-shaped token and an order keyword.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{PlatformId, RawEmail};
use crate::rules::RuleRegistry;

/// Outcome of classifying one email, including which signal decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The email belongs to a platform.
    Matched {
        platform: PlatformId,
        signal: MatchSignal,
    },
    /// A promotional keyword matched; the email is never extracted.
    RejectedPromotional { keyword: String },
    /// Nothing matched; the email is skipped.
    Unrecognized,
}

impl Classification {
    /// The matched platform, if any.
    pub fn platform(&self) -> Option<&PlatformId> {
        match self {
            Self::Matched { platform, .. } => Some(platform),
            _ => None,
        }
    }
}

/// The positive signal that matched an email to a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSignal {
    /// A configured domain substring matched the sender domain.
    SenderDomain(String),
    /// A configured phrase was found in the subject or body.
    SignalPhrase(String),
    /// The generic gate passed: reference-shaped token plus order keyword.
    GenericReference,
}

/// Classifies raw emails against the rule registry.
pub struct PlatformClassifier {
    registry: Arc<RuleRegistry>,
}

impl PlatformClassifier {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    /// Classifies one email. Promotional rejection runs first; sender
    /// domains beat signal phrases; the generic gate runs last.
    pub fn classify(&self, email: &RawEmail) -> Classification {
        let text = email.searchable_text();

        if let Some(keyword) = self.registry.promotional_keyword_in(&text) {
            debug!(
                message_id = %email.message_id,
                keyword,
                "rejected promotional email"
            );
            return Classification::RejectedPromotional {
                keyword: keyword.to_string(),
            };
        }

        let sender_domain = email.sender_domain();
        for rules in self.registry.platforms() {
            if let Some(domain) = rules.sender_match(&sender_domain) {
                debug!(
                    message_id = %email.message_id,
                    platform = %rules.id,
                    domain,
                    "classified by sender domain"
                );
                return Classification::Matched {
                    platform: rules.id.clone(),
                    signal: MatchSignal::SenderDomain(domain.to_string()),
                };
            }
        }

        for rules in self.registry.platforms() {
            if let Some(phrase) = rules.signal_in(&text) {
                debug!(
                    message_id = %email.message_id,
                    platform = %rules.id,
                    phrase,
                    "classified by signal phrase"
                );
                return Classification::Matched {
                    platform: rules.id.clone(),
                    signal: MatchSignal::SignalPhrase(phrase.to_string()),
                };
            }
        }

        if self.registry.has_reference_shaped_token(&text)
            && self.registry.has_order_keyword(&text)
        {
            debug!(message_id = %email.message_id, "classified by generic gate");
            return Classification::Matched {
                platform: self.registry.generic().id.clone(),
                signal: MatchSignal::GenericReference,
            };
        }

        debug!(message_id = %email.message_id, "unrecognized email");
        Classification::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderMessageId;
    use chrono::Utc;

    fn email(sender: &str, subject: &str, body: &str) -> RawEmail {
        RawEmail {
            message_id: ProviderMessageId::from("msg-1"),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body_html: None,
            body_text: Some(body.to_string()),
            received_at: Utc::now(),
        }
    }

    fn classifier() -> PlatformClassifier {
        PlatformClassifier::new(Arc::new(RuleRegistry::builtin()))
    }

    #[test]
    fn matches_by_sender_domain() {
        let result = classifier().classify(&email(
            "auto-confirm@amazon.in",
            "Your order",
            "Thanks for shopping.",
        ));
        assert_eq!(
            result,
            Classification::Matched {
                platform: PlatformId::from("amazon"),
                signal: MatchSignal::SenderDomain("amazon.in".to_string()),
            }
        );
    }

    #[test]
    fn matches_by_signal_phrase_when_sender_is_unknown() {
        let result = classifier().classify(&email(
            "notices@shipping-partner.example",
            "Update on your Flipkart order",
            "It is on its way.",
        ));
        assert_eq!(
            result,
            Classification::Matched {
                platform: PlatformId::from("flipkart"),
                signal: MatchSignal::SignalPhrase("flipkart order".to_string()),
            }
        );
    }

    #[test]
    fn promotional_rejection_beats_platform_signals() {
        let result = classifier().classify(&email(
            "deals@amazon.in",
            "Order the best sellers today",
            "Huge savings. Unsubscribe at any time.",
        ));
        assert_eq!(
            result,
            Classification::RejectedPromotional {
                keyword: "unsubscribe".to_string(),
            }
        );
    }

    #[test]
    fn discount_mail_is_rejected_as_promotional() {
        let result = classifier().classify(&email(
            "offers@myntra.com",
            "Extra 40% discount on your next order",
            "Styles you liked are now cheaper.",
        ));
        assert_eq!(
            result,
            Classification::RejectedPromotional {
                keyword: "discount".to_string(),
            }
        );
    }

    #[test]
    fn generic_gate_requires_token_and_keyword() {
        let matched = classifier().classify(&email(
            "store@smallshop.example",
            "Order confirmation",
            "Your order SS-2024-0042 is confirmed.",
        ));
        assert!(matches!(
            matched,
            Classification::Matched {
                signal: MatchSignal::GenericReference,
                ..
            }
        ));

        // A reference-shaped token without an order keyword is not enough.
        let no_keyword = classifier().classify(&email(
            "alerts@smallshop.example",
            "Reminder",
            "Code SS-2024-0042 expires soon.",
        ));
        assert_eq!(no_keyword, Classification::Unrecognized);

        // An order keyword without any reference-shaped token is not enough.
        let no_token = classifier().classify(&email(
            "store@smallshop.example",
            "About your order",
            "We will email again when it ships.",
        ));
        assert_eq!(no_token, Classification::Unrecognized);
    }

    #[test]
    fn personal_mail_is_unrecognized() {
        let result = classifier().classify(&email(
            "friend@mail.example",
            "Lunch tomorrow?",
            "Same place at noon.",
        ));
        assert_eq!(result, Classification::Unrecognized);
    }
}
