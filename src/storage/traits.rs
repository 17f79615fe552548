//! Order store trait definition.
//!
//! The [`OrderStore`] trait abstracts over whatever persistence backs the
//! engine. The engine owns matching and merging; the store owns durability
//! and the identity index that backs lookup-before-create.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{CanonicalOrder, OrderId, OrderIdentity, UserId};

/// Result type alias for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during order store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced order does not exist.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// An identity key is already mapped to a different order.
    #[error("identity already belongs to order {0}")]
    IdentityConflict(OrderId),

    /// Backend failure (connection, transaction, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence collaborator for canonical orders.
///
/// Each method is one transactional unit: when `create` or `update`
/// returns, the order and its identity index entries are visible to every
/// subsequent lookup. The sync orchestrator relies on this to keep
/// partially processed batches consistent.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads one order by id.
    async fn get(&self, id: &OrderId) -> Result<Option<CanonicalOrder>>;

    /// Finds the order currently mapped to an identity key, if any.
    async fn find_by_identity(&self, identity: &OrderIdentity) -> Result<Option<CanonicalOrder>>;

    /// Finds candidate orders for the heuristic match rule: same user, same
    /// product key, order date within `window_days` of `date`.
    ///
    /// Orders without an order date never match.
    async fn find_by_heuristic_keys(
        &self,
        user: &UserId,
        product_key: &str,
        date: NaiveDate,
        window_days: i64,
    ) -> Result<Vec<CanonicalOrder>>;

    /// Persists a new order and indexes its identity keys.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IdentityConflict`] if any of the order's
    /// identities is already mapped to a different order.
    async fn create(&self, order: &CanonicalOrder) -> Result<()>;

    /// Replaces a stored order and indexes any identity keys it gained.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order was never created.
    async fn update(&self, order: &CanonicalOrder) -> Result<()>;
}
