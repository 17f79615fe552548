//! Sync orchestration.
//!
//! The [`SyncService`] drives the full pipeline for a batch of emails:
//! classify, extract, match against known orders, fold or seed, persist.
//! Emails are processed oldest first and each order write completes before
//! the next email starts, so later lifecycle notices always see the state
//! their predecessors produced.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::classify::{Classification, PlatformClassifier};
use crate::config::EngineSettings;
use crate::domain::{CanonicalOrder, OrderId, OrderIdentity, RawEmail, UserId};
use crate::extract::FieldExtractor;
use crate::providers::mail::{fetch_all, FetchWindow, MailSource};
use crate::rules::RuleRegistry;
use crate::services::{DedupService, MatchRule, ReconcileService};
use crate::storage::OrderStore;

/// Result of one sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Orders created from first-seen purchases.
    pub created: usize,
    /// Orders that absorbed at least one new fragment.
    pub updated: usize,
    /// Emails that produced no order change.
    pub skipped: usize,
    /// Emails that failed to process or fetch.
    pub errored: usize,
    /// Final state of every order touched by this run, oldest first.
    pub orders: Vec<CanonicalOrder>,
    /// Duration of the run.
    pub duration_ms: u64,
}

impl SyncSummary {
    /// True if the run completed without per-email failures.
    pub fn is_success(&self) -> bool {
        self.errored == 0
    }
}

/// Event emitted by the sync service.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A sync run started.
    Started { user_id: UserId, emails: usize },
    /// An order was created or updated.
    OrderPersisted {
        order_id: OrderId,
        /// The match rule that linked the email, `None` for a new order.
        rule: Option<MatchRule>,
    },
    /// The run finished.
    Completed {
        user_id: UserId,
        summary: SyncSummary,
    },
}

/// What one email contributed to the run.
enum EmailOutcome {
    Created(OrderId),
    Updated(OrderId),
    Skipped,
}

/// Orchestrates classification, extraction, matching, and persistence.
///
/// # Example
///
/// ```ignore
/// let store = Arc::new(MemoryOrderStore::new());
/// let service = SyncService::new(store, Arc::new(RuleRegistry::builtin()), settings);
///
/// let summary = service.sync_batch(&user, emails).await?;
/// println!("{} created, {} updated", summary.created, summary.updated);
/// ```
pub struct SyncService<S: OrderStore> {
    store: Arc<S>,
    classifier: PlatformClassifier,
    extractor: FieldExtractor,
    dedup: DedupService<S>,
    reconciler: ReconcileService,
    settings: EngineSettings,
    event_sender: broadcast::Sender<SyncEvent>,
}

impl<S: OrderStore + 'static> SyncService<S> {
    /// Creates a sync service wired to the given store and rule registry.
    pub fn new(store: Arc<S>, registry: Arc<RuleRegistry>, settings: EngineSettings) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            classifier: PlatformClassifier::new(registry.clone()),
            extractor: FieldExtractor::new(registry, settings.clone()),
            dedup: DedupService::new(store.clone(), settings.heuristics.clone()),
            reconciler: ReconcileService::new(
                settings.reconcile.clone(),
                settings.confidence.clone(),
            ),
            store,
            settings,
            event_sender,
        }
    }

    /// Subscribes to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_sender.subscribe()
    }

    /// Runs the pipeline over a batch of already-fetched emails.
    ///
    /// Emails are sorted oldest first and the batch is capped at the
    /// configured per-run limit. A failure on one email is recorded in the
    /// summary and the run continues with the rest.
    pub async fn sync_batch(
        &self,
        user: &UserId,
        mut emails: Vec<RawEmail>,
    ) -> Result<SyncSummary> {
        let start = std::time::Instant::now();

        emails.sort_by_key(|e| e.received_at);
        let limit = self.settings.sync.max_emails_per_sync;
        if emails.len() > limit {
            debug!(dropped = emails.len() - limit, limit, "batch capped");
            emails.truncate(limit);
        }

        info!(user_id = %user, emails = emails.len(), "sync started");
        let _ = self.event_sender.send(SyncEvent::Started {
            user_id: user.clone(),
            emails: emails.len(),
        });

        let mut summary = SyncSummary::default();
        let mut run_map: HashMap<OrderIdentity, OrderId> = HashMap::new();
        let mut touched: Vec<OrderId> = Vec::new();

        for email in &emails {
            match self.process_email(user, email, &mut run_map).await {
                Ok(EmailOutcome::Created(order_id)) => {
                    summary.created += 1;
                    if !touched.contains(&order_id) {
                        touched.push(order_id);
                    }
                }
                Ok(EmailOutcome::Updated(order_id)) => {
                    summary.updated += 1;
                    if !touched.contains(&order_id) {
                        touched.push(order_id);
                    }
                }
                Ok(EmailOutcome::Skipped) => summary.skipped += 1,
                Err(error) => {
                    warn!(message_id = %email.message_id, %error, "email failed to sync");
                    summary.errored += 1;
                }
            }
        }

        for order_id in touched {
            if let Some(order) = self.store.get(&order_id).await? {
                summary.orders.push(order);
            }
        }
        summary.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            user_id = %user,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            errored = summary.errored,
            "sync completed"
        );
        let _ = self.event_sender.send(SyncEvent::Completed {
            user_id: user.clone(),
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Lists and fetches messages from a mail source, then syncs them.
    ///
    /// Fetches run with bounded concurrency but results keep listing
    /// order. A message that fails to fetch is counted as errored and the
    /// rest of the run proceeds.
    pub async fn sync_from_source(
        &self,
        user: &UserId,
        source: &dyn MailSource,
        window: &FetchWindow,
    ) -> Result<SyncSummary> {
        let mut ids = source.list_messages(window).await?;
        debug!(user_id = %user, messages = ids.len(), "listed messages");

        // Listings come back oldest first, so the cap keeps the oldest
        // messages; a later window picks up the rest.
        ids.truncate(self.settings.sync.max_emails_per_sync);

        let results = fetch_all(source, ids, self.settings.sync.fetch_concurrency).await;

        let mut emails = Vec::with_capacity(results.len());
        let mut fetch_failures = 0usize;
        for result in results {
            match result {
                Ok(email) => emails.push(email),
                Err(error) => {
                    warn!(%error, "failed to fetch message");
                    fetch_failures += 1;
                }
            }
        }

        let mut summary = self.sync_batch(user, emails).await?;
        summary.errored += fetch_failures;
        Ok(summary)
    }

    /// Runs one email through the pipeline and persists the result.
    async fn process_email(
        &self,
        user: &UserId,
        email: &RawEmail,
        run_map: &mut HashMap<OrderIdentity, OrderId>,
    ) -> Result<EmailOutcome> {
        let platform = match self.classifier.classify(email) {
            Classification::Matched { platform, .. } => platform,
            Classification::RejectedPromotional { keyword } => {
                debug!(message_id = %email.message_id, keyword, "promotional email rejected");
                return Ok(EmailOutcome::Skipped);
            }
            Classification::Unrecognized => {
                debug!(message_id = %email.message_id, "unrecognized sender, skipping");
                return Ok(EmailOutcome::Skipped);
            }
        };

        let Some(fragment) = self.extractor.extract(email, &platform) else {
            return Ok(EmailOutcome::Skipped);
        };

        let matched = self.dedup.resolve(user, &fragment, run_map).await?;

        let (order, outcome, rule) = match matched {
            Some(matched) => {
                let mut order = self
                    .store
                    .get(&matched.order_id)
                    .await?
                    .ok_or_else(|| anyhow!("matched order {} not in store", matched.order_id))?;

                if order.links_message(&fragment.source.message_id) {
                    debug!(
                        message_id = %email.message_id,
                        order_id = %order.id,
                        "email already folded, skipping"
                    );
                    Self::remember(run_map, &order, fragment.identities(user).iter());
                    return Ok(EmailOutcome::Skipped);
                }

                self.reconciler.fold(&mut order, &fragment);
                self.store.update(&order).await?;
                let outcome = EmailOutcome::Updated(order.id.clone());
                (order, outcome, Some(matched.rule))
            }
            None => {
                if fragment.is_delivery_only() {
                    debug!(
                        message_id = %email.message_id,
                        "unmatched delivery-only fragment discarded"
                    );
                    return Ok(EmailOutcome::Skipped);
                }
                let order = self.reconciler.seed(user.clone(), &fragment);
                self.store.create(&order).await?;
                let outcome = EmailOutcome::Created(order.id.clone());
                (order, outcome, None)
            }
        };

        // The run map remembers every identity seen this run, including
        // fragment references that did not land in an order slot.
        Self::remember(run_map, &order, fragment.identities(user).iter());
        Self::remember(run_map, &order, order.identities().iter());

        let _ = self.event_sender.send(SyncEvent::OrderPersisted {
            order_id: order.id.clone(),
            rule,
        });
        Ok(outcome)
    }

    fn remember<'a>(
        run_map: &mut HashMap<OrderIdentity, OrderId>,
        order: &CanonicalOrder,
        identities: impl Iterator<Item = &'a OrderIdentity>,
    ) {
        for identity in identities {
            run_map.insert(identity.clone(), order.id.clone());
        }
    }
}
