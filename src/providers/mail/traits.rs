//! Mail source trait definition.
//!
//! This module defines the [`MailSource`] trait which abstracts over the
//! mailbox backends the engine can pull from (Gmail API, IMAP, exported
//! archives). The engine only reads: a source lists message ids for a time
//! window and fetches individual messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ProviderMessageId, RawEmail};

/// Result type alias for mail source operations.
pub type Result<T> = std::result::Result<T, MailSourceError>;

/// Errors that can occur while talking to a mail source.
#[derive(Debug, thiserror::Error)]
pub enum MailSourceError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested message was not found.
    #[error("message not found: {0}")]
    NotFound(String),

    /// The message could not be parsed.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Source-specific error.
    #[error("source error: {0}")]
    Source(String),
}

/// Time window for listing messages from a mail source.
///
/// Open bounds mean "no limit on that side"; the default window matches
/// every message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FetchWindow {
    /// Only messages received at or after this instant.
    pub after: Option<DateTime<Utc>>,
    /// Only messages received before this instant.
    pub before: Option<DateTime<Utc>>,
}

impl FetchWindow {
    /// Creates a window open on the recent side.
    pub fn since(after: DateTime<Utc>) -> Self {
        Self {
            after: Some(after),
            before: None,
        }
    }

    /// True when the given receipt time falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.after.map_or(true, |a| at >= a) && self.before.map_or(true, |b| at < b)
    }
}

/// Read-only access to one mailbox.
///
/// Implementations handle their own authentication and transport. The
/// engine treats a source as a flat stream of messages; folder structure
/// and mutation (labels, read state) are out of scope.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Lists ids of messages received within the window, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached or refuses the
    /// listing request.
    async fn list_messages(&self, window: &FetchWindow) -> Result<Vec<ProviderMessageId>>;

    /// Fetches one message by provider id.
    ///
    /// # Errors
    ///
    /// Returns [`MailSourceError::NotFound`] if the id is unknown and
    /// [`MailSourceError::Malformed`] if the message cannot be parsed.
    async fn fetch_message(&self, id: &ProviderMessageId) -> Result<RawEmail>;
}
