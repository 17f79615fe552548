//! Canonical order types.
//!
//! A [`CanonicalOrder`] is the merged view of every fragment that was
//! matched to the same purchase. Orders advance through [`OrderStatus`]
//! monotonically; terminal statuses override the ordering.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    EmailType, FragmentIdentities, Item, OrderId, OrderIdentity, ParsedOrderFragment, PlatformId,
    ProviderMessageId, UserId,
};

/// Lifecycle status of an order.
///
/// Statuses are ordered by lifecycle progression; [`OrderStatus::rank`]
/// encodes the ordering and the reconciler never moves an order to a
/// lower-ranked status. `Cancelled` and `Returned` are terminal and apply
/// regardless of rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Ordered,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Position in the lifecycle. Terminal statuses rank above everything.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Ordered => 0,
            Self::Confirmed => 1,
            Self::Processing => 2,
            Self::Shipped => 3,
            Self::OutForDelivery => 4,
            Self::Delivered => 5,
            Self::Cancelled | Self::Returned => 6,
        }
    }

    /// True for statuses that end the lifecycle early.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Ordered => "ordered",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        };
        write!(f, "{label}")
    }
}

/// Link from a canonical order back to one contributing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLink {
    /// Provider-assigned id of the contributing email.
    pub message_id: ProviderMessageId,
    /// Kind of lifecycle email it was.
    pub email_type: EmailType,
    /// When it was received.
    pub received_at: DateTime<Utc>,
}

/// Category of a non-fatal inconsistency noticed during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityCheck {
    /// An incoming fragment carried a lower-ranked status.
    StatusRegression,
    /// Two fragments stated different amounts for the same order.
    AmountMismatch,
    /// Two fragments carried dissimilar real product names.
    ProductNameDivergence,
    /// A fragment arrived out of lifecycle order by timestamp.
    TimestampOutOfOrder,
}

/// A warning attached to an order instead of failing the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    /// Which check fired.
    pub check: IntegrityCheck,
    /// Human-readable detail for the record.
    pub detail: String,
    /// Email whose fragment triggered the warning.
    pub message_id: ProviderMessageId,
}

/// The merged, de-duplicated view of one real-world purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalOrder {
    /// Stable id assigned when the order was first created.
    pub id: OrderId,
    /// Owner of the mailbox the order was extracted from.
    pub user_id: UserId,
    /// Platform the order belongs to.
    pub platform: PlatformId,
    /// Normalized order reference, once any fragment supplies one.
    pub order_reference: Option<String>,
    /// Normalized tracking reference, once any fragment supplies one.
    pub tracking_reference: Option<String>,
    /// Order amount; earliest fragment that states one wins.
    pub amount: Option<Decimal>,
    /// Currency code for the amount.
    pub currency: Option<String>,
    /// Items unioned across fragments by dedup key.
    pub items: Vec<Item>,
    /// Best product name seen so far.
    pub product_name: String,
    /// True while `product_name` is still a synthesized placeholder.
    pub product_name_synthesized: bool,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Order date, if any fragment carried one.
    pub order_date: Option<NaiveDate>,
    /// Normalized delivery postal code, if any fragment carried one.
    pub delivery_location: Option<String>,
    /// Merged confidence; grows with corroborating fragments.
    pub confidence: f64,
    /// When the delivery confirmation arrived. Set once, never overwritten.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Every email folded into this order, in fold order.
    pub fragments: Vec<FragmentLink>,
    /// Non-fatal inconsistencies noticed during merges.
    pub integrity_warnings: Vec<IntegrityWarning>,
    /// When the order record was created.
    pub created_at: DateTime<Utc>,
    /// When the order record last changed.
    pub updated_at: DateTime<Utc>,
}

impl CanonicalOrder {
    /// Seeds a new order from its first fragment.
    pub fn from_fragment(user_id: UserId, fragment: &ParsedOrderFragment) -> Self {
        let now = Utc::now();
        let delivered_at = (fragment.status == OrderStatus::Delivered
            || fragment.email_type == EmailType::Delivered)
            .then_some(fragment.source.received_at);
        Self {
            id: OrderId::new(),
            user_id,
            platform: fragment.platform.clone(),
            order_reference: fragment.order_reference.clone(),
            tracking_reference: fragment.tracking_reference.clone(),
            amount: fragment.amount,
            currency: fragment.currency.clone(),
            items: fragment.items.clone(),
            product_name: fragment.product_name.clone(),
            product_name_synthesized: fragment.product_name_synthesized,
            status: fragment.status,
            order_date: fragment.order_date,
            delivery_location: fragment.delivery_location.clone(),
            confidence: fragment.confidence,
            delivered_at,
            fragments: vec![FragmentLink {
                message_id: fragment.source.message_id.clone(),
                email_type: fragment.email_type,
                received_at: fragment.source.received_at,
            }],
            integrity_warnings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Identity keys this order can currently be matched by.
    pub fn identities(&self) -> FragmentIdentities {
        FragmentIdentities {
            order: self
                .order_reference
                .as_deref()
                .map(|r| OrderIdentity::derive(&self.platform, r, &self.user_id)),
            tracking: self
                .tracking_reference
                .as_deref()
                .map(|r| OrderIdentity::derive(&self.platform, r, &self.user_id)),
        }
    }

    /// True if the given email has already been folded into this order.
    pub fn links_message(&self, message_id: &ProviderMessageId) -> bool {
        self.fragments.iter().any(|f| &f.message_id == message_id)
    }

    /// Timestamp of the most recently received linked email.
    pub fn latest_fragment_at(&self) -> Option<DateTime<Utc>> {
        self.fragments.iter().map(|f| f.received_at).max()
    }
}
