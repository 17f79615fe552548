//! Status, email-type, order-date, and delivery-location extraction.
//!
//! Status keywords are organized as ranked sets scanned highest rank
//! first, subject before body, so a delivery confirmation that recaps the
//! shipping history still reads as delivered. Phrases use past/perfect
//! forms ("has been delivered") to avoid matching promises about the
//! future ("will be delivered").

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use super::EmailText;
use crate::domain::{EmailType, ExtractedField, ExtractionDiagnostics, OrderStatus};

/// Keyword table, highest rank first. Terminal statuses outrank delivery.
const RANKS: &[(OrderStatus, EmailType, &[&str])] = &[
    (
        OrderStatus::Returned,
        EmailType::Other,
        &[
            "return initiated",
            "has been returned",
            "refund initiated",
            "refund processed",
            "return request received",
            "return confirmed",
        ],
    ),
    (
        OrderStatus::Cancelled,
        EmailType::Other,
        &[
            "has been cancelled",
            "has been canceled",
            "order cancelled",
            "order canceled",
            "was cancelled",
            "was canceled",
            "cancellation confirmed",
        ],
    ),
    (
        OrderStatus::Delivered,
        EmailType::Delivered,
        &[
            "has been delivered",
            "was delivered",
            "delivered successfully",
            "delivery confirmed",
            "order delivered",
            "package delivered",
            "item delivered",
            "delivered:",
        ],
    ),
    // Post-delivery feedback requests rank with delivered; clusters put
    // them after the delivery notice by receipt time.
    (
        OrderStatus::Delivered,
        EmailType::Other,
        &[
            "rate your purchase",
            "rate your experience",
            "how was your order",
            "how was your delivery",
            "review your purchase",
            "share your feedback",
        ],
    ),
    (
        OrderStatus::OutForDelivery,
        EmailType::OutForDelivery,
        &["out for delivery", "arriving today"],
    ),
    (
        OrderStatus::Shipped,
        EmailType::Shipped,
        &[
            "has shipped",
            "has been shipped",
            "was shipped",
            "is on its way",
            "has been dispatched",
            "shipment confirmation",
            "shipping confirmation",
            "shipped:",
        ],
    ),
    (
        OrderStatus::Processing,
        EmailType::Other,
        &[
            "being processed",
            "is being prepared",
            "preparing your order",
            "processing your order",
            "is being packed",
        ],
    ),
    (
        OrderStatus::Confirmed,
        EmailType::Confirmation,
        &[
            "order confirmed",
            "order confirmation",
            "has been confirmed",
            "order placed",
            "order received",
            "thank you for your order",
            "thanks for your order",
            "we have received your order",
        ],
    ),
];

/// Result of a status scan.
pub(crate) struct StatusScan {
    pub status: OrderStatus,
    pub email_type: EmailType,
    pub keyword: Option<&'static str>,
}

/// Compiled status, date, and location patterns.
pub(crate) struct StatusScanner {
    date_patterns: Vec<Regex>,
    postal_patterns: Vec<Regex>,
}

impl StatusScanner {
    pub(crate) fn new() -> Self {
        const DATE_LABEL: &str =
            r"(?i)\b(?:order date|ordered on|placed on|order placed on|purchased on)\s*[:\-]?\s*";
        Self {
            date_patterns: vec![
                Regex::new(&[DATE_LABEL, r"(\d{4}-\d{2}-\d{2})"].concat()).unwrap(),
                Regex::new(&[DATE_LABEL, r"(\d{1,2}[/-]\d{1,2}[/-]\d{4})"].concat()).unwrap(),
                Regex::new(&[DATE_LABEL, r"([A-Za-z]{3,9}\.? \d{1,2},? \d{4})"].concat()).unwrap(),
                Regex::new(&[DATE_LABEL, r"(\d{1,2} [A-Za-z]{3,9},? \d{4})"].concat()).unwrap(),
            ],
            postal_patterns: vec![
                Regex::new(r"(?i)\b(?:pincode|pin code|pin|postal code|zip(?: code)?)\s*[:\-]?\s*(\d{5,6})\b")
                    .unwrap(),
                Regex::new(r"(?i)\bdelivered to[^\n]{0,60}?\b(\d{6})\b").unwrap(),
                Regex::new(r"(?i)\b(?:delivery address|shipping address)[^\n]{0,80}?\b(\d{6})\b")
                    .unwrap(),
            ],
        }
    }

    /// Scans for status keywords, subject first. A subject hit wins over
    /// any body hit; within one haystack higher ranks win.
    pub(crate) fn scan(&self, text: &EmailText) -> StatusScan {
        let subject = text.subject.to_lowercase();
        let body = text.body.to_lowercase();
        for haystack in [subject.as_str(), body.as_str()] {
            for &(status, email_type, keywords) in RANKS {
                for &keyword in keywords {
                    if haystack.contains(keyword) {
                        return StatusScan {
                            status,
                            email_type,
                            keyword: Some(keyword),
                        };
                    }
                }
            }
        }
        StatusScan {
            status: OrderStatus::Ordered,
            email_type: EmailType::Other,
            keyword: None,
        }
    }

    /// Labelled order date from the body, or the receipt date for
    /// confirmation emails. Non-confirmation emails without a labelled date
    /// carry no order date.
    pub(crate) fn order_date(
        &self,
        text: &EmailText,
        received_at: DateTime<Utc>,
        email_type: EmailType,
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Option<NaiveDate> {
        for haystack in [text.subject.as_str(), text.body.as_str()] {
            for pattern in &self.date_patterns {
                for caps in pattern.captures_iter(haystack) {
                    let raw = caps[1].trim();
                    if let Some(date) = parse_date(raw) {
                        diagnostics.used(ExtractedField::OrderDate, "labelled_date");
                        return Some(date);
                    }
                    diagnostics.rejected(ExtractedField::OrderDate, raw, "unparsable date");
                }
            }
        }
        if email_type == EmailType::Confirmation {
            diagnostics.used(ExtractedField::OrderDate, "received_date");
            return Some(received_at.date_naive());
        }
        None
    }

    /// Labelled postal code from the body, if any.
    pub(crate) fn delivery_location(
        &self,
        text: &EmailText,
        diagnostics: &mut ExtractionDiagnostics,
    ) -> Option<String> {
        for pattern in &self.postal_patterns {
            if let Some(caps) = pattern.captures(&text.body) {
                diagnostics.used(ExtractedField::DeliveryLocation, "postal_code");
                return Some(caps[1].to_string());
            }
        }
        None
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%b %d %Y",
        "%B %d %Y",
        "%b. %d, %Y",
        "%d %b %Y",
        "%d %B %Y",
        "%d %b, %Y",
    ];
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}
