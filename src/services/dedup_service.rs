//! Order deduplication.
//!
//! Decides whether a fragment belongs to an existing canonical order. The
//! match cascade runs most-specific-first: exact order reference, exact
//! tracking reference, identity-hash overlap across reference kinds, then
//! the heuristic rule for purchases whose emails never share an explicit
//! identifier. The first rule that matches wins.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::HeuristicSettings;
use crate::domain::{CanonicalOrder, OrderId, OrderIdentity, ParsedOrderFragment, UserId};
use crate::normalize;
use crate::storage::{OrderStore, Result};

/// Which cascade rule matched a fragment to an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Fragment and order share the normalized order reference.
    OrderReference,
    /// Fragment and order share the normalized tracking reference.
    TrackingReference,
    /// An identity hash overlapped across reference kinds.
    IdentityHash,
    /// Product key, amount, date window, and location agreed.
    Heuristic,
}

/// A resolved match: the order to fold into and the rule that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Existing order the fragment belongs to.
    pub order_id: OrderId,
    /// The cascade rule that produced the match.
    pub rule: MatchRule,
}

/// Matches fragments against known canonical orders.
pub struct DedupService<S: OrderStore> {
    store: Arc<S>,
    settings: HeuristicSettings,
}

impl<S: OrderStore> DedupService<S> {
    pub fn new(store: Arc<S>, settings: HeuristicSettings) -> Self {
        Self { store, settings }
    }

    /// Resolves a fragment against the in-run map and the store.
    ///
    /// The in-run map is consulted first; it carries identities learned
    /// earlier in the same sync run, including references that were folded
    /// into an order without filling one of its reference slots. Returns
    /// `None` when no existing order matches; the caller decides whether
    /// the fragment seeds a new order.
    pub async fn resolve(
        &self,
        user: &UserId,
        fragment: &ParsedOrderFragment,
        run_map: &HashMap<OrderIdentity, OrderId>,
    ) -> Result<Option<MatchOutcome>> {
        let identities = fragment.identities(user);

        let order_hit = match &identities.order {
            Some(identity) => self.lookup(identity, run_map).await?,
            None => None,
        };
        let tracking_hit = match &identities.tracking {
            Some(identity) => self.lookup(identity, run_map).await?,
            None => None,
        };

        // Exact order reference.
        if let (Some(identity), Some(order)) = (&identities.order, &order_hit) {
            if order.identities().order.as_ref() == Some(identity) {
                debug!(order_id = %order.id, "matched by order reference");
                return Ok(Some(MatchOutcome {
                    order_id: order.id.clone(),
                    rule: MatchRule::OrderReference,
                }));
            }
        }

        // Exact tracking reference.
        if let (Some(identity), Some(order)) = (&identities.tracking, &tracking_hit) {
            if order.identities().tracking.as_ref() == Some(identity) {
                debug!(order_id = %order.id, "matched by tracking reference");
                return Ok(Some(MatchOutcome {
                    order_id: order.id.clone(),
                    rule: MatchRule::TrackingReference,
                }));
            }
        }

        // Any remaining identity overlap: a vendor reusing the order id as
        // the tracking id, or an identity the run map learned from a folded
        // fragment.
        if let Some(order) = order_hit.or(tracking_hit) {
            debug!(order_id = %order.id, "matched by identity hash");
            return Ok(Some(MatchOutcome {
                order_id: order.id,
                rule: MatchRule::IdentityHash,
            }));
        }

        self.resolve_heuristic(user, fragment).await
    }

    async fn lookup(
        &self,
        identity: &OrderIdentity,
        run_map: &HashMap<OrderIdentity, OrderId>,
    ) -> Result<Option<CanonicalOrder>> {
        if let Some(order_id) = run_map.get(identity) {
            return self.store.get(order_id).await;
        }
        self.store.find_by_identity(identity).await
    }

    /// The heuristic rule: same product key, amount within tolerance, order
    /// dates within the day window, and (when both sides carry one) the
    /// same delivery-location key. A fragment missing its amount or order
    /// date never matches heuristically.
    async fn resolve_heuristic(
        &self,
        user: &UserId,
        fragment: &ParsedOrderFragment,
    ) -> Result<Option<MatchOutcome>> {
        if !self.settings.enabled {
            return Ok(None);
        }
        let Some(amount) = fragment.amount else {
            return Ok(None);
        };
        let Some(date) = fragment.order_date else {
            return Ok(None);
        };
        let product_key = normalize::product_key(&fragment.product_name);
        if product_key.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .store
            .find_by_heuristic_keys(user, &product_key, date, self.settings.date_window_days)
            .await?;
        for order in candidates {
            let Some(order_amount) = order.amount else {
                continue;
            };
            if (order_amount - amount).abs() > self.settings.amount_tolerance {
                continue;
            }
            if let (Some(ours), Some(theirs)) =
                (&fragment.delivery_location, &order.delivery_location)
            {
                if ours != theirs {
                    continue;
                }
            }
            debug!(order_id = %order.id, "matched heuristically");
            return Ok(Some(MatchOutcome {
                order_id: order.id,
                rule: MatchRule::Heuristic,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        EmailType, ExtractionDiagnostics, FragmentSource, OrderStatus, PlatformId,
        ProviderMessageId,
    };
    use crate::storage::MemoryOrderStore;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn fragment(
        order_reference: Option<&str>,
        tracking_reference: Option<&str>,
    ) -> ParsedOrderFragment {
        ParsedOrderFragment {
            platform: PlatformId::from("amazon"),
            order_reference: order_reference.map(String::from),
            tracking_reference: tracking_reference.map(String::from),
            amount: Some(dec!(804)),
            currency: Some("INR".to_string()),
            items: vec![],
            product_name: "Desk Lamp".to_string(),
            product_name_synthesized: false,
            status: OrderStatus::Confirmed,
            email_type: EmailType::Confirmation,
            order_date: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            delivery_location: None,
            confidence: 0.8,
            source: FragmentSource {
                message_id: ProviderMessageId::from("msg-1"),
                received_at: Utc::now(),
            },
            diagnostics: ExtractionDiagnostics::default(),
        }
    }

    fn user() -> UserId {
        UserId::from("user-1")
    }

    async fn seeded(fragment: &ParsedOrderFragment) -> (Arc<MemoryOrderStore>, CanonicalOrder) {
        let store = Arc::new(MemoryOrderStore::new());
        let order = CanonicalOrder::from_fragment(user(), fragment);
        store.create(&order).await.unwrap();
        (store, order)
    }

    fn service(store: Arc<MemoryOrderStore>) -> DedupService<MemoryOrderStore> {
        DedupService::new(store, HeuristicSettings::default())
    }

    #[tokio::test]
    async fn order_reference_match_wins_first() {
        let (store, order) = seeded(&fragment(Some("123-4567890-1234567"), None)).await;
        let outcome = service(store)
            .resolve(&user(), &fragment(Some("123-4567890-1234567"), None), &HashMap::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.order_id, order.id);
        assert_eq!(outcome.rule, MatchRule::OrderReference);
    }

    #[tokio::test]
    async fn tracking_reference_match() {
        let (store, order) = seeded(&fragment(Some("123-4567890-1234567"), Some("TRK99"))).await;
        let outcome = service(store)
            .resolve(&user(), &fragment(None, Some("TRK99")), &HashMap::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.order_id, order.id);
        assert_eq!(outcome.rule, MatchRule::TrackingReference);
    }

    #[tokio::test]
    async fn cross_reference_hit_reports_identity_hash() {
        // The vendor reused the tracking id as this email's order id.
        let (store, order) = seeded(&fragment(Some("REF-A"), Some("TRK99"))).await;
        let outcome = service(store)
            .resolve(&user(), &fragment(Some("TRK99"), None), &HashMap::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.order_id, order.id);
        assert_eq!(outcome.rule, MatchRule::IdentityHash);
    }

    #[tokio::test]
    async fn run_map_resolves_identities_the_store_never_indexed() {
        let (store, order) = seeded(&fragment(Some("AMZ-1"), None)).await;

        // Earlier in this run a fragment with reference FLP-9 was folded
        // into the order without filling a reference slot; only the run map
        // remembers it.
        let mut run_map = HashMap::new();
        run_map.insert(
            OrderIdentity::derive(&PlatformId::from("amazon"), "FLP-9", &user()),
            order.id.clone(),
        );

        let outcome = service(store)
            .resolve(&user(), &fragment(Some("FLP-9"), None), &run_map)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.order_id, order.id);
        assert_eq!(outcome.rule, MatchRule::IdentityHash);
    }

    #[tokio::test]
    async fn heuristic_links_same_product_within_tolerances() {
        let (store, order) = seeded(&fragment(Some("AMZ-1"), None)).await;

        let mut incoming = fragment(Some("FLP-9"), None);
        incoming.amount = Some(dec!(804.50));
        incoming.order_date = Some(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());

        let outcome = service(store)
            .resolve(&user(), &incoming, &HashMap::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.order_id, order.id);
        assert_eq!(outcome.rule, MatchRule::Heuristic);
    }

    #[tokio::test]
    async fn heuristic_respects_amount_tolerance() {
        let (store, _order) = seeded(&fragment(Some("AMZ-1"), None)).await;

        let mut incoming = fragment(Some("FLP-9"), None);
        incoming.amount = Some(dec!(810));

        let outcome = service(store)
            .resolve(&user(), &incoming, &HashMap::new())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn heuristic_respects_date_window() {
        let (store, _order) = seeded(&fragment(Some("AMZ-1"), None)).await;

        let mut incoming = fragment(Some("FLP-9"), None);
        incoming.order_date = Some(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());

        let outcome = service(store)
            .resolve(&user(), &incoming, &HashMap::new())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn heuristic_rejects_location_mismatch() {
        let mut seeded_fragment = fragment(Some("AMZ-1"), None);
        seeded_fragment.delivery_location = Some("560001".to_string());
        let (store, _order) = seeded(&seeded_fragment).await;

        let mut incoming = fragment(Some("FLP-9"), None);
        incoming.delivery_location = Some("110001".to_string());

        let outcome = service(store)
            .resolve(&user(), &incoming, &HashMap::new())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn heuristic_can_be_disabled() {
        let (store, _order) = seeded(&fragment(Some("AMZ-1"), None)).await;

        let settings = HeuristicSettings {
            enabled: false,
            ..HeuristicSettings::default()
        };
        let outcome = DedupService::new(store, settings)
            .resolve(&user(), &fragment(Some("FLP-9"), None), &HashMap::new())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn no_match_for_unrelated_fragment() {
        let (store, _order) = seeded(&fragment(Some("AMZ-1"), None)).await;

        let mut incoming = fragment(Some("FLP-9"), None);
        incoming.product_name = "Running Shoes".to_string();

        let outcome = service(store)
            .resolve(&user(), &incoming, &HashMap::new())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
