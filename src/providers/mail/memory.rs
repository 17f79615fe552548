//! In-memory mail source.

use async_trait::async_trait;

use crate::domain::{ProviderMessageId, RawEmail};

use super::traits::{FetchWindow, MailSource, MailSourceError, Result};

/// A mail source backed by a fixed set of already-parsed emails.
///
/// Used in tests and for replaying exported mailboxes. Listing returns
/// ids oldest first, matching what the engine expects from real sources.
pub struct StaticMailSource {
    emails: Vec<RawEmail>,
}

impl StaticMailSource {
    pub fn new(emails: Vec<RawEmail>) -> Self {
        Self { emails }
    }
}

#[async_trait]
impl MailSource for StaticMailSource {
    async fn list_messages(&self, window: &FetchWindow) -> Result<Vec<ProviderMessageId>> {
        let mut matching: Vec<&RawEmail> = self
            .emails
            .iter()
            .filter(|e| window.contains(e.received_at))
            .collect();
        matching.sort_by_key(|e| e.received_at);
        Ok(matching.iter().map(|e| e.message_id.clone()).collect())
    }

    async fn fetch_message(&self, id: &ProviderMessageId) -> Result<RawEmail> {
        self.emails
            .iter()
            .find(|e| &e.message_id == id)
            .cloned()
            .ok_or_else(|| MailSourceError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn lists_ids_oldest_first() {
        let source = StaticMailSource::new(vec![email("b", 5), email("a", 1), email("c", 9)]);

        let ids = source.list_messages(&FetchWindow::default()).await.unwrap();
        assert_eq!(
            ids,
            vec![
                ProviderMessageId::from("a"),
                ProviderMessageId::from("b"),
                ProviderMessageId::from("c"),
            ]
        );
    }

    #[tokio::test]
    async fn window_filters_listing() {
        let source = StaticMailSource::new(vec![email("a", 1), email("b", 5)]);
        let window = FetchWindow::since(Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap());

        let ids = source.list_messages(&window).await.unwrap();
        assert_eq!(ids, vec![ProviderMessageId::from("b")]);
    }

    #[tokio::test]
    async fn fetch_of_unknown_id_is_not_found() {
        let source = StaticMailSource::new(vec![email("a", 1)]);
        let result = source.fetch_message(&ProviderMessageId::from("zzz")).await;
        assert!(matches!(result, Err(MailSourceError::NotFound(_))));
    }
}
