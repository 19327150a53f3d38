//! Persistence boundary
//!
//! The engine is local-authoritative: writes commit to the in-memory
//! store first, then flow to the repository as a write-through. A failed
//! write-through is logged and surfaced nowhere else; the change stream
//! carries the authoritative record back eventually.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::Order;
use std::collections::HashMap;

/// Durable order storage
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the current state of an order aggregate
    async fn save_order(&self, order: &Order) -> anyhow::Result<()>;

    /// Load every active order together with its items
    async fn fetch_active_orders(&self) -> anyhow::Result<Vec<Order>>;
}

/// Repository that stores nothing and loads nothing
///
/// For deployments where the change stream is the only source of remote
/// state, and for tests that do not care about persistence.
#[derive(Debug, Default)]
pub struct NullRepository;

#[async_trait]
impl OrderRepository for NullRepository {
    async fn save_order(&self, _order: &Order) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch_active_orders(&self) -> anyhow::Result<Vec<Order>> {
        Ok(Vec::new())
    }
}

/// In-memory repository
#[derive(Debug, Default)]
pub struct MemoryRepository {
    orders: Mutex<HashMap<String, Order>>,
}

impl MemoryRepository {
    /// Pre-load orders, as if an earlier session had written them
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: Mutex::new(orders.into_iter().map(|o| (o.id.clone(), o)).collect()),
        }
    }

    pub fn saved_order(&self, order_id: &str) -> Option<Order> {
        self.orders.lock().get(order_id).cloned()
    }
}

#[async_trait]
impl OrderRepository for MemoryRepository {
    async fn save_order(&self, order: &Order) -> anyhow::Result<()> {
        self.orders
            .lock()
            .insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn fetch_active_orders(&self) -> anyhow::Result<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect())
    }
}
