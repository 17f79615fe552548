//! In-memory order store.
//!
//! Reference [`OrderStore`] implementation. One `RwLock` guards the whole
//! state, so every trait method is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::traits::{OrderStore, Result, StoreError};
use crate::domain::{CanonicalOrder, OrderId, OrderIdentity, UserId};
use crate::normalize;

/// Order store backed by process memory.
#[derive(Default)]
pub struct MemoryOrderStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, CanonicalOrder>,
    identities: HashMap<OrderIdentity, OrderId>,
}

impl State {
    /// References only ever fill empty slots, so index entries are never
    /// removed or re-pointed.
    fn index(&mut self, order: &CanonicalOrder) {
        for identity in order.identities().iter() {
            self.identities.insert(identity.clone(), order.id.clone());
        }
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored order for a user, oldest first.
    ///
    /// Inspection helper for tests and embedders; not part of the
    /// collaborator trait.
    pub async fn orders_for(&self, user: &UserId) -> Vec<CanonicalOrder> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| &order.user_id == user)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        orders
    }

    /// Number of stored orders across all users.
    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// True when no orders are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, id: &OrderId) -> Result<Option<CanonicalOrder>> {
        Ok(self.state.read().await.orders.get(id).cloned())
    }

    async fn find_by_identity(&self, identity: &OrderIdentity) -> Result<Option<CanonicalOrder>> {
        let state = self.state.read().await;
        Ok(state
            .identities
            .get(identity)
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    async fn find_by_heuristic_keys(
        &self,
        user: &UserId,
        product_key: &str,
        date: NaiveDate,
        window_days: i64,
    ) -> Result<Vec<CanonicalOrder>> {
        let state = self.state.read().await;
        let mut matches: Vec<_> = state
            .orders
            .values()
            .filter(|order| &order.user_id == user)
            .filter(|order| {
                order
                    .order_date
                    .is_some_and(|d| (d - date).num_days().abs() <= window_days)
            })
            .filter(|order| normalize::product_key(&order.product_name) == product_key)
            .cloned()
            .collect();
        matches.sort_by_key(|order| order.created_at);
        Ok(matches)
    }

    async fn create(&self, order: &CanonicalOrder) -> Result<()> {
        let mut state = self.state.write().await;
        for identity in order.identities().iter() {
            if let Some(existing) = state.identities.get(identity) {
                if existing != &order.id {
                    return Err(StoreError::IdentityConflict(existing.clone()));
                }
            }
        }
        state.index(order);
        state.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn update(&self, order: &CanonicalOrder) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&order.id) {
            return Err(StoreError::NotFound(order.id.clone()));
        }
        state.index(order);
        state.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }
}
