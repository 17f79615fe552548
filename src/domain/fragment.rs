//! Parsed order fragment types.
//!
//! A [`ParsedOrderFragment`] is the structured data extracted from one raw
//! email. Fragments are created once by the extractor and never mutated;
//! the reconciler folds them into canonical orders.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{FragmentIdentities, OrderIdentity, OrderStatus, PlatformId, ProviderMessageId, UserId};
use crate::normalize;

/// The kind of lifecycle email a fragment was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Order confirmation / receipt.
    Confirmation,
    /// Shipping notice.
    Shipped,
    /// Out-for-delivery notice.
    OutForDelivery,
    /// Delivery confirmation.
    Delivered,
    /// Order-related but not a recognized lifecycle notice.
    Other,
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Confirmation => "confirmation",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// One purchased item within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item name as extracted (cleaned).
    pub name: String,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Per-unit price, if stated.
    pub unit_price: Option<Decimal>,
    /// Line total, if stated.
    pub total_price: Option<Decimal>,
}

impl Item {
    /// Creates an item with quantity 1 and no prices.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: 1,
            unit_price: None,
            total_price: None,
        }
    }

    /// Key used to de-duplicate items: normalized name plus price.
    pub fn dedup_key(&self) -> String {
        let price = self
            .unit_price
            .or(self.total_price)
            .map(|p| p.normalize().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{}|{}", normalize::product_key(&self.name), price)
    }
}

/// Back-reference from a fragment to the email it was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSource {
    /// Provider-assigned id of the source email.
    pub message_id: ProviderMessageId,
    /// When the source email was received.
    pub received_at: DateTime<Utc>,
}

/// Which extracted field a diagnostic entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedField {
    OrderReference,
    TrackingReference,
    Amount,
    Items,
    ProductName,
    Status,
    OrderDate,
    DeliveryLocation,
}

/// Record of the strategy that produced an accepted field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyUse {
    /// The field that was populated.
    pub field: ExtractedField,
    /// Label of the winning strategy (e.g. "subject_pattern").
    pub strategy: String,
}

/// A candidate value that matched a pattern but failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    /// The field the candidate was extracted for.
    pub field: ExtractedField,
    /// The rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Structured record of extraction decisions for one fragment.
///
/// Returned alongside the fragment instead of being logged, so tests and
/// callers can assert on which strategies fired and what was discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionDiagnostics {
    /// Winning strategy per populated field.
    pub strategies: Vec<StrategyUse>,
    /// Candidates that matched but failed validation.
    pub rejected: Vec<RejectedCandidate>,
}

impl ExtractionDiagnostics {
    /// Records the strategy that populated a field.
    pub fn used(&mut self, field: ExtractedField, strategy: impl Into<String>) {
        self.strategies.push(StrategyUse {
            field,
            strategy: strategy.into(),
        });
    }

    /// Records a candidate that failed validation.
    pub fn rejected(
        &mut self,
        field: ExtractedField,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.rejected.push(RejectedCandidate {
            field,
            value: value.into(),
            reason: reason.into(),
        });
    }

    /// Returns the strategy label that populated a field, if any.
    pub fn strategy_for(&self, field: ExtractedField) -> Option<&str> {
        self.strategies
            .iter()
            .find(|s| s.field == field)
            .map(|s| s.strategy.as_str())
    }
}

/// Structured data extracted from one classified email.
///
/// At least one of `order_reference` / `tracking_reference` is always
/// populated; an email yielding neither produces no fragment at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedOrderFragment {
    /// Platform the source email was classified as.
    pub platform: PlatformId,
    /// Normalized order reference, if extracted.
    pub order_reference: Option<String>,
    /// Normalized tracking/shipment reference, if extracted.
    pub tracking_reference: Option<String>,
    /// Order amount, if extracted.
    pub amount: Option<Decimal>,
    /// ISO-ish currency code for the amount ("INR", "USD").
    pub currency: Option<String>,
    /// Items, de-duplicated by [`Item::dedup_key`].
    pub items: Vec<Item>,
    /// Product name; synthesized if no real name survived the fallback chain.
    pub product_name: String,
    /// True when `product_name` is the deterministic stage-five placeholder.
    pub product_name_synthesized: bool,
    /// Order status derived from keyword sets.
    pub status: OrderStatus,
    /// Kind of lifecycle email this fragment came from.
    pub email_type: EmailType,
    /// Order date, parsed from the body or taken from the email receipt date.
    pub order_date: Option<NaiveDate>,
    /// Normalized delivery postal code, when one was found.
    pub delivery_location: Option<String>,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
    /// Back-reference to the source email.
    pub source: FragmentSource,
    /// Extraction decision record.
    pub diagnostics: ExtractionDiagnostics,
}

impl ParsedOrderFragment {
    /// Computes the identity keys this fragment can be correlated by.
    pub fn identities(&self, user: &UserId) -> FragmentIdentities {
        FragmentIdentities {
            order: self
                .order_reference
                .as_deref()
                .map(|r| OrderIdentity::derive(&self.platform, r, user)),
            tracking: self
                .tracking_reference
                .as_deref()
                .map(|r| OrderIdentity::derive(&self.platform, r, user)),
        }
    }

    /// True when the fragment is a tracking/delivery notice with no order
    /// reference. Such fragments never seed a new canonical order.
    pub fn is_delivery_only(&self) -> bool {
        self.order_reference.is_none() && self.email_type != EmailType::Confirmation
    }
}
