//! Bounded-parallel message fetching.

use futures::stream::{self, StreamExt};

use crate::domain::{ProviderMessageId, RawEmail};

use super::traits::{MailSource, Result};

/// Fetches every listed message with at most `concurrency` requests in
/// flight.
///
/// Results come back in listing order regardless of completion order, and
/// each element carries its own outcome so callers choose how to handle
/// per-message failures.
pub async fn fetch_all(
    source: &dyn MailSource,
    ids: Vec<ProviderMessageId>,
    concurrency: usize,
) -> Vec<Result<RawEmail>> {
    stream::iter(ids)
        .map(|id| async move { source.fetch_message(&id).await })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mail::StaticMailSource;
    use chrono::{TimeZone, Utc};

    fn email(id: &str, day: u32) -> RawEmail {
        RawEmail {
            message_id: ProviderMessageId::from(id),
            sender: "ship-confirm@amazon.in".to_string(),
            subject: "Order Confirmed".to_string(),
            body_html: None,
            body_text: Some("Order #123-4567890-1234567".to_string()),
            received_at: Utc.with_ymd_and_hms(2025, 6, day, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn results_keep_listing_order() {
        let source = StaticMailSource::new(vec![email("a", 1), email("b", 2), email("c", 3)]);
        let ids = vec![
            ProviderMessageId::from("c"),
            ProviderMessageId::from("a"),
            ProviderMessageId::from("b"),
        ];

        let results = fetch_all(&source, ids, 2).await;

        let fetched: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().message_id)
            .collect();
        assert_eq!(
            fetched,
            vec![
                ProviderMessageId::from("c"),
                ProviderMessageId::from("a"),
                ProviderMessageId::from("b"),
            ]
        );
    }

    #[tokio::test]
    async fn one_failure_does_not_poison_the_rest() {
        let source = StaticMailSource::new(vec![email("a", 1)]);
        let ids = vec![ProviderMessageId::from("a"), ProviderMessageId::from("gone")];

        let results = fetch_all(&source, ids, 4).await;

        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped() {
        let source = StaticMailSource::new(vec![email("a", 1)]);
        let results = fetch_all(&source, vec![ProviderMessageId::from("a")], 0).await;
        assert!(results[0].is_ok());
    }
}
