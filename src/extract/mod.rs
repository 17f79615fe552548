//! Field extraction.
//!
//! The [`FieldExtractor`] turns one classified email into a
//! [`ParsedOrderFragment`]. Each field has its own scanner with a fallback
//! chain; subject text runs before body text, labelled patterns before bare
//! ones, and every candidate is validated before acceptance. An email
//! yielding neither an order reference nor a tracking reference produces no
//! fragment.

mod amount;
mod items;
mod product;
mod reference;
mod status;

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::EngineSettings;
use crate::domain::{
    ExtractedField, ExtractionDiagnostics, FragmentSource, Item, ParsedOrderFragment, PlatformId,
    RawEmail,
};
use crate::normalize;
use crate::rules::RuleRegistry;

use amount::AmountScanner;
use items::ItemScanner;
use product::ProductScanner;
use status::StatusScanner;

/// Decoded, truncated email text shared by the field scanners.
pub(crate) struct EmailText {
    /// Subject with entities decoded.
    pub subject: String,
    /// Plain-text body, truncated to the scan limit.
    pub body: String,
    /// Raw HTML body, when the message carried one.
    pub html: Option<String>,
}

/// Extracts structured order data from classified emails.
pub struct FieldExtractor {
    registry: Arc<RuleRegistry>,
    settings: EngineSettings,
    amounts: AmountScanner,
    items: ItemScanner,
    products: ProductScanner,
    status: StatusScanner,
}

impl FieldExtractor {
    pub fn new(registry: Arc<RuleRegistry>, settings: EngineSettings) -> Self {
        Self {
            registry,
            settings,
            amounts: AmountScanner::new(),
            items: ItemScanner::new(),
            products: ProductScanner::new(),
            status: StatusScanner::new(),
        }
    }

    /// Extracts a fragment from one email classified as `platform`.
    ///
    /// Returns `None` when neither an order reference nor a tracking
    /// reference can be extracted; such mail is terminally unparseable and
    /// is dropped without retry.
    pub fn extract(&self, email: &RawEmail, platform: &PlatformId) -> Option<ParsedOrderFragment> {
        let rules = self.registry.rules_for(platform);
        let text = self.email_text(email);
        let mut diagnostics = ExtractionDiagnostics::default();

        let order_reference = reference::extract_reference(
            &text,
            &rules.order_reference_patterns,
            &self.registry,
            ExtractedField::OrderReference,
            &mut diagnostics,
        );
        let mut tracking_reference = reference::extract_reference(
            &text,
            &rules.tracking_reference_patterns,
            &self.registry,
            ExtractedField::TrackingReference,
            &mut diagnostics,
        );
        // A tracking pattern re-matching the order id adds no signal.
        if tracking_reference == order_reference {
            tracking_reference = None;
        }
        if order_reference.is_none() && tracking_reference.is_none() {
            debug!(message_id = %email.message_id, "no reference extracted, dropping email");
            return None;
        }

        let (amount, currency) = self
            .amounts
            .scan(&text, rules, &mut diagnostics)
            .map_or((None, None), |(amount, currency)| (Some(amount), currency));
        let items = self
            .items
            .scan(&text, self.settings.text.item_name_max_chars, &mut diagnostics);
        let scan = self.status.scan(&text);
        if let Some(keyword) = scan.keyword {
            diagnostics.used(ExtractedField::Status, keyword);
        }

        let display_reference = order_reference
            .as_deref()
            .or(tracking_reference.as_deref())
            .unwrap_or_default();
        let product = self.products.scan(
            &text,
            rules,
            scan.email_type,
            display_reference,
            &items,
            self.settings.text.product_name_max_chars,
            &mut diagnostics,
        );
        let order_date =
            self.status
                .order_date(&text, email.received_at, scan.email_type, &mut diagnostics);
        let delivery_location = self.status.delivery_location(&text, &mut diagnostics);
        let confidence = self.confidence(&order_reference, amount, &items, scan.keyword.is_some());

        Some(ParsedOrderFragment {
            platform: platform.clone(),
            order_reference,
            tracking_reference,
            amount,
            currency,
            items,
            product_name: product.name,
            product_name_synthesized: product.synthesized,
            status: scan.status,
            email_type: scan.email_type,
            order_date,
            delivery_location,
            confidence,
            source: FragmentSource {
                message_id: email.message_id.clone(),
                received_at: email.received_at,
            },
            diagnostics,
        })
    }

    fn email_text(&self, email: &RawEmail) -> EmailText {
        let body = email.body_as_text();
        EmailText {
            subject: normalize::decode_entities(&email.subject),
            body: normalize::truncate_chars(&body, self.settings.text.body_scan_max_chars)
                .to_string(),
            html: email.body_html.clone(),
        }
    }

    /// Weighted sum over the populated required fields.
    fn confidence(
        &self,
        order_reference: &Option<String>,
        amount: Option<Decimal>,
        items: &[Item],
        status_identified: bool,
    ) -> f64 {
        let weights = &self.settings.confidence;
        let mut score = 0.0;
        if order_reference.is_some() {
            score += weights.order_reference;
        }
        if amount.is_some() {
            score += weights.amount;
        }
        if !items.is_empty() {
            score += weights.items;
        }
        if status_identified {
            score += weights.status;
        }
        score
    }
}
