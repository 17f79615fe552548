//! Raw email input type.
//!
//! A [`RawEmail`] is the immutable unit of input supplied by the mail source
//! collaborator. The engine never fetches mail itself; it only consumes
//! already-retrieved messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderMessageId;
use crate::normalize;

/// One raw email as delivered by the mail source collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEmail {
    /// Provider-assigned message identifier.
    pub message_id: ProviderMessageId,
    /// Sender address (bare address, no display name).
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// HTML body, if the message carried one.
    pub body_html: Option<String>,
    /// Plain-text body, if the message carried one.
    pub body_text: Option<String>,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl RawEmail {
    /// Returns the plain-text content of the message body.
    ///
    /// Prefers the text part; falls back to the HTML part with tags stripped
    /// and entities decoded. Returns an empty string for body-less mail.
    pub fn body_as_text(&self) -> String {
        if let Some(text) = &self.body_text {
            if !text.trim().is_empty() {
                return normalize::decode_entities(text);
            }
        }
        self.body_html
            .as_deref()
            .map(normalize::strip_html)
            .unwrap_or_default()
    }

    /// Returns lowercased subject + body text for keyword scanning.
    pub fn searchable_text(&self) -> String {
        let mut text = self.subject.to_lowercase();
        text.push('\n');
        text.push_str(&self.body_as_text().to_lowercase());
        text
    }

    /// Returns the sender's domain part, lowercased, or an empty string.
    pub fn sender_domain(&self) -> String {
        self.sender
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .unwrap_or_default()
    }
}
