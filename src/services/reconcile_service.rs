//! Order reconciliation.
//!
//! Folds fragments into canonical orders. Each fold applies the merge
//! rules field by field: references only fill empty slots, the first
//! stated non-zero amount wins, product names are replaced only by
//! strictly better ones, status moves forward monotonically, and
//! confidence grows with corroboration but stays capped below 1.0.
//! Inconsistencies between fragments are recorded as integrity warnings
//! on the order; they never block a merge.

use chrono::Utc;
use tracing::warn;

use crate::config::{ConfidenceWeights, ReconcileSettings};
use crate::domain::{
    CanonicalOrder, EmailType, FragmentLink, IntegrityCheck, IntegrityWarning, OrderStatus,
    ParsedOrderFragment, UserId,
};
use crate::normalize;

/// Merges fragments into canonical orders.
pub struct ReconcileService {
    settings: ReconcileSettings,
    confidence: ConfidenceWeights,
}

impl ReconcileService {
    pub fn new(settings: ReconcileSettings, confidence: ConfidenceWeights) -> Self {
        Self {
            settings,
            confidence,
        }
    }

    /// Seeds a new order from its first fragment.
    pub fn seed(&self, user: UserId, fragment: &ParsedOrderFragment) -> CanonicalOrder {
        let mut order = CanonicalOrder::from_fragment(user, fragment);
        order.confidence = order.confidence.min(self.confidence.cap);
        order
    }

    /// Merges a batch of fragments already known to describe one purchase.
    ///
    /// Fragments are folded in lifecycle order (status rank, then receipt
    /// time), so a cluster merges to the same order regardless of the
    /// order its emails arrived in. A single-fragment cluster produces an
    /// order identical to seeding from that fragment.
    pub fn merge_cluster(
        &self,
        user: &UserId,
        mut fragments: Vec<ParsedOrderFragment>,
    ) -> Option<CanonicalOrder> {
        fragments.sort_by(|a, b| {
            (a.status.rank(), a.source.received_at).cmp(&(b.status.rank(), b.source.received_at))
        });
        let mut iter = fragments.iter();
        let mut order = self.seed(user.clone(), iter.next()?);
        for fragment in iter {
            self.fold(&mut order, fragment);
        }
        Some(order)
    }

    /// Folds one fragment into an existing order.
    ///
    /// Callers ensure each email is folded at most once; re-folding is
    /// guarded upstream via [`CanonicalOrder::links_message`].
    pub fn fold(&self, order: &mut CanonicalOrder, fragment: &ParsedOrderFragment) {
        self.check_integrity(order, fragment);

        if order.order_reference.is_none() {
            order.order_reference = fragment.order_reference.clone();
        }
        if order.tracking_reference.is_none() {
            order.tracking_reference = fragment.tracking_reference.clone();
        }

        // First stated non-zero amount wins; later fragments never blank
        // or zero it out.
        if order.amount.map_or(true, |a| a.is_zero()) {
            if let Some(amount) = fragment.amount.filter(|a| !a.is_zero()) {
                order.amount = Some(amount);
                if fragment.currency.is_some() {
                    order.currency = fragment.currency.clone();
                }
            }
        }
        if order.currency.is_none() {
            order.currency = fragment.currency.clone();
        }

        for item in &fragment.items {
            let key = item.dedup_key();
            if !order.items.iter().any(|existing| existing.dedup_key() == key) {
                order.items.push(item.clone());
            }
        }

        if self.name_improves(order, fragment) {
            order.product_name = fragment.product_name.clone();
            order.product_name_synthesized = fragment.product_name_synthesized;
        }

        // Terminal statuses rank above everything, so they always apply.
        if fragment.status.rank() >= order.status.rank() {
            order.status = fragment.status;
        }

        if order.order_date.is_none() {
            order.order_date = fragment.order_date;
        }
        if order.delivery_location.is_none() {
            order.delivery_location = fragment.delivery_location.clone();
        }

        if order.delivered_at.is_none()
            && (fragment.status == OrderStatus::Delivered
                || fragment.email_type == EmailType::Delivered)
        {
            order.delivered_at = Some(fragment.source.received_at);
        }

        order.confidence = (order.confidence.max(fragment.confidence)
            + self.confidence.corroboration_bonus)
            .min(self.confidence.cap);

        order.fragments.push(FragmentLink {
            message_id: fragment.source.message_id.clone(),
            email_type: fragment.email_type,
            received_at: fragment.source.received_at,
        });
        order.updated_at = Utc::now();
    }

    /// A real, non-empty candidate name beats a synthesized current one;
    /// between two real names the candidate must carry both more words and
    /// more characters.
    fn name_improves(&self, order: &CanonicalOrder, fragment: &ParsedOrderFragment) -> bool {
        if fragment.product_name_synthesized || fragment.product_name.is_empty() {
            return false;
        }
        if order.product_name_synthesized {
            return true;
        }
        let more_words = fragment.product_name.split_whitespace().count()
            > order.product_name.split_whitespace().count();
        let more_chars =
            fragment.product_name.chars().count() > order.product_name.chars().count();
        more_words && more_chars
    }

    /// Records non-fatal inconsistencies against the pre-fold order state.
    fn check_integrity(&self, order: &mut CanonicalOrder, fragment: &ParsedOrderFragment) {
        if fragment.status.rank() < order.status.rank() {
            self.record(
                order,
                fragment,
                IntegrityCheck::StatusRegression,
                format!(
                    "fragment status {} ranks below current {}",
                    fragment.status, order.status
                ),
            );
        }

        if let (Some(existing), Some(incoming)) = (order.amount, fragment.amount) {
            if !existing.is_zero()
                && !incoming.is_zero()
                && (existing - incoming).abs() > self.settings.amount_warn_tolerance
            {
                self.record(
                    order,
                    fragment,
                    IntegrityCheck::AmountMismatch,
                    format!("fragment amount {incoming} disagrees with {existing}"),
                );
            }
        }

        if !order.product_name_synthesized
            && !fragment.product_name_synthesized
            && !order.product_name.is_empty()
            && !fragment.product_name.is_empty()
        {
            let similarity =
                normalize::name_similarity(&order.product_name, &fragment.product_name);
            if similarity < self.settings.name_similarity_floor {
                self.record(
                    order,
                    fragment,
                    IntegrityCheck::ProductNameDivergence,
                    format!(
                        "name {:?} diverges from {:?} (similarity {similarity:.2})",
                        fragment.product_name, order.product_name
                    ),
                );
            }
        }

        let advances = fragment.status.rank() > order.status.rank();
        if advances
            && order
                .latest_fragment_at()
                .is_some_and(|latest| fragment.source.received_at < latest)
        {
            self.record(
                order,
                fragment,
                IntegrityCheck::TimestampOutOfOrder,
                format!(
                    "{} email predates an already linked email",
                    fragment.email_type
                ),
            );
        }
    }

    fn record(
        &self,
        order: &mut CanonicalOrder,
        fragment: &ParsedOrderFragment,
        check: IntegrityCheck,
        detail: String,
    ) {
        warn!(
            order_id = %order.id,
            message_id = %fragment.source.message_id,
            ?check,
            detail,
            "integrity warning"
        );
        order.integrity_warnings.push(IntegrityWarning {
            check,
            detail,
            message_id: fragment.source.message_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtractionDiagnostics, FragmentSource, PlatformId, ProviderMessageId};
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn fragment(email_type: EmailType, status: OrderStatus, minute: u32) -> ParsedOrderFragment {
        ParsedOrderFragment {
            platform: PlatformId::from("amazon"),
            order_reference: Some("123-4567890-1234567".to_string()),
            tracking_reference: None,
            amount: None,
            currency: None,
            items: vec![],
            product_name: "Desk Lamp".to_string(),
            product_name_synthesized: false,
            status,
            email_type,
            order_date: None,
            delivery_location: None,
            confidence: 0.6,
            source: FragmentSource {
                message_id: ProviderMessageId::from(format!("msg-{minute}").as_str()),
                received_at: Utc.with_ymd_and_hms(2025, 6, 3, 10, minute, 0).unwrap(),
            },
            diagnostics: ExtractionDiagnostics::default(),
        }
    }

    fn service() -> ReconcileService {
        ReconcileService::new(ReconcileSettings::default(), ConfidenceWeights::default())
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    #[test]
    fn merge_cluster_folds_a_full_lifecycle() {
        let mut confirmation = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        confirmation.amount = Some(dec!(804));
        confirmation.currency = Some("INR".to_string());
        confirmation.order_date = NaiveDate::from_ymd_opt(2025, 6, 1);

        let mut shipped = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        shipped.tracking_reference = Some("TRK99".to_string());

        let delivered = fragment(EmailType::Delivered, OrderStatus::Delivered, 20);

        // Receipt order scrambled; the fold order comes from lifecycle rank.
        let order = service()
            .merge_cluster(&user(), vec![delivered.clone(), confirmation, shipped])
            .unwrap();

        assert_eq!(order.amount, Some(dec!(804)));
        assert_eq!(order.tracking_reference, Some("TRK99".to_string()));
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.delivered_at, Some(delivered.source.received_at));
        assert_eq!(order.fragments.len(), 3);
        assert!(order.integrity_warnings.is_empty());
    }

    #[test]
    fn singleton_cluster_matches_a_plain_seed() {
        let frag = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        let merged = service().merge_cluster(&user(), vec![frag.clone()]).unwrap();
        let seeded = service().seed(user(), &frag);

        assert_eq!(merged.order_reference, seeded.order_reference);
        assert_eq!(merged.status, seeded.status);
        assert_eq!(merged.confidence, seeded.confidence);
        assert_eq!(merged.fragments.len(), 1);
    }

    #[test]
    fn empty_cluster_yields_nothing() {
        assert!(service().merge_cluster(&user(), vec![]).is_none());
    }

    #[test]
    fn amount_is_never_overwritten_by_zero_or_missing() {
        let mut first = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        first.amount = Some(dec!(804));
        let mut order = service().seed(user(), &first);

        let absent = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        service().fold(&mut order, &absent);
        assert_eq!(order.amount, Some(dec!(804)));

        let mut zero = fragment(EmailType::Delivered, OrderStatus::Delivered, 20);
        zero.amount = Some(dec!(0));
        service().fold(&mut order, &zero);
        assert_eq!(order.amount, Some(dec!(804)));
    }

    #[test]
    fn first_nonzero_amount_fills_an_empty_slot() {
        let first = fragment(EmailType::Shipped, OrderStatus::Shipped, 0);
        let mut order = service().seed(user(), &first);
        assert_eq!(order.amount, None);

        let mut priced = fragment(EmailType::Delivered, OrderStatus::Delivered, 10);
        priced.amount = Some(dec!(804));
        priced.currency = Some("INR".to_string());
        service().fold(&mut order, &priced);

        assert_eq!(order.amount, Some(dec!(804)));
        assert_eq!(order.currency, Some("INR".to_string()));
    }

    #[test]
    fn synthesized_name_gives_way_to_a_real_one() {
        let mut first = fragment(EmailType::Shipped, OrderStatus::Shipped, 0);
        first.product_name = "amazon shipped 123-4567890-1234567".to_string();
        first.product_name_synthesized = true;
        let mut order = service().seed(user(), &first);

        let real = fragment(EmailType::Delivered, OrderStatus::Delivered, 10);
        service().fold(&mut order, &real);

        assert_eq!(order.product_name, "Desk Lamp");
        assert!(!order.product_name_synthesized);
    }

    #[test]
    fn real_name_is_replaced_only_by_a_longer_one() {
        let first = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        let mut order = service().seed(user(), &first);

        let mut longer = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        longer.product_name = "Desk Lamp with USB Charging Port".to_string();
        service().fold(&mut order, &longer);
        assert_eq!(order.product_name, "Desk Lamp with USB Charging Port");

        let mut shorter = fragment(EmailType::Delivered, OrderStatus::Delivered, 20);
        shorter.product_name = "Desk Lamp".to_string();
        service().fold(&mut order, &shorter);
        assert_eq!(order.product_name, "Desk Lamp with USB Charging Port");
    }

    #[test]
    fn status_never_regresses_and_the_regression_is_recorded() {
        let first = fragment(EmailType::Delivered, OrderStatus::Delivered, 0);
        let mut order = service().seed(user(), &first);

        let late = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        service().fold(&mut order, &late);

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.integrity_warnings.len(), 1);
        assert_eq!(
            order.integrity_warnings[0].check,
            IntegrityCheck::StatusRegression
        );
    }

    #[test]
    fn terminal_status_applies_even_after_delivery() {
        let first = fragment(EmailType::Delivered, OrderStatus::Delivered, 0);
        let mut order = service().seed(user(), &first);

        let cancelled = fragment(EmailType::Other, OrderStatus::Cancelled, 10);
        service().fold(&mut order, &cancelled);

        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn delivered_at_is_set_exactly_once() {
        let first = fragment(EmailType::Delivered, OrderStatus::Delivered, 0);
        let mut order = service().seed(user(), &first);
        let original = order.delivered_at;
        assert!(original.is_some());

        let repeat = fragment(EmailType::Delivered, OrderStatus::Delivered, 30);
        service().fold(&mut order, &repeat);

        assert_eq!(order.delivered_at, original);
    }

    #[test]
    fn amount_disagreement_is_recorded_but_does_not_block() {
        let mut first = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        first.amount = Some(dec!(804));
        let mut order = service().seed(user(), &first);

        let mut disagreeing = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        disagreeing.amount = Some(dec!(890));
        service().fold(&mut order, &disagreeing);

        assert_eq!(order.amount, Some(dec!(804)));
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(
            order.integrity_warnings[0].check,
            IntegrityCheck::AmountMismatch
        );
    }

    #[test]
    fn divergent_real_names_raise_a_warning() {
        let first = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        let mut order = service().seed(user(), &first);

        let mut other = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        other.product_name = "Bluetooth Headphones".to_string();
        service().fold(&mut order, &other);

        assert_eq!(order.product_name, "Desk Lamp");
        assert_eq!(
            order.integrity_warnings[0].check,
            IntegrityCheck::ProductNameDivergence
        );
    }

    #[test]
    fn backdated_advancing_email_is_flagged() {
        let first = fragment(EmailType::Shipped, OrderStatus::Shipped, 30);
        let mut order = service().seed(user(), &first);

        // Delivery notice timestamped before the shipping notice.
        let delivered = fragment(EmailType::Delivered, OrderStatus::Delivered, 5);
        service().fold(&mut order, &delivered);

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(
            order.integrity_warnings[0].check,
            IntegrityCheck::TimestampOutOfOrder
        );
    }

    #[test]
    fn confidence_grows_with_corroboration_but_stays_capped() {
        let first = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        let mut order = service().seed(user(), &first);
        let seeded = order.confidence;

        for minute in 1..20 {
            let frag = fragment(EmailType::Other, OrderStatus::Processing, minute);
            service().fold(&mut order, &frag);
        }

        assert!(order.confidence > seeded);
        assert!(order.confidence <= ConfidenceWeights::default().cap);
    }

    #[test]
    fn items_union_by_dedup_key() {
        use crate::domain::Item;

        let mut first = fragment(EmailType::Confirmation, OrderStatus::Confirmed, 0);
        first.items = vec![Item::named("Desk Lamp")];
        let mut order = service().seed(user(), &first);

        let mut second = fragment(EmailType::Shipped, OrderStatus::Shipped, 10);
        second.items = vec![Item::named("Desk Lamp"), Item::named("Spare Bulb")];
        service().fold(&mut order, &second);

        assert_eq!(order.items.len(), 2);
    }
}
