//! Fulfillment dispatch
//!
//! Runs once per successful payment, outside the store's critical
//! section: emits one kitchen request covering the order's preparable
//! items and one inventory decrement per stock-tracked item row. Which
//! downstream an item reaches is decided by its snapshotted category.
//!
//! Dispatch failures never affect the paid order. Each failed emission
//! becomes a `DispatchWarning` for the caller to surface; a failed
//! inventory decrement for one item does not stop the others.

use async_trait::async_trait;
use shared::models::{InventoryDecrement, KitchenRequest, KitchenRequestStatus, Order};

use crate::config::Config;

/// Item categories that require kitchen preparation
pub const KITCHEN_CATEGORIES: &[&str] = &[
    "Main Course",
    "Appetizers",
    "Desserts",
    "Salads",
    "Soups",
    "Sides",
    "Cocktails",
    "Hot Beverages",
];

/// Item categories tracked as sellable stock
pub const INVENTORY_CATEGORIES: &[&str] = &[
    "Soft Drinks",
    "Alcoholic Beverages",
    "Beer",
    "Spirits",
    "Red Wine",
    "White Wine",
    "Rosé Wine",
    "Sparkling Wine",
];

/// Non-fatal fulfillment failure, surfaced alongside the paid order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchWarning {
    /// The kitchen request could not be submitted
    KitchenUnavailable { order_id: String, reason: String },
    /// One inventory decrement failed
    InventoryUpdateFailed { item_name: String, reason: String },
}

impl std::fmt::Display for DispatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KitchenUnavailable { order_id, reason } => {
                write!(f, "kitchen request for order {order_id} failed: {reason}")
            }
            Self::InventoryUpdateFailed { item_name, reason } => {
                write!(f, "inventory decrement for {item_name} failed: {reason}")
            }
        }
    }
}

/// Kitchen request sink
#[async_trait]
pub trait KitchenQueue: Send + Sync {
    async fn submit(&self, request: KitchenRequest) -> anyhow::Result<()>;
}

/// Stock ledger accepting per-item decrements
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn decrement(&self, decrement: InventoryDecrement) -> anyhow::Result<()>;
}

/// Emits fulfillment effects for freshly paid orders
pub struct FulfillmentDispatcher {
    kitchen: Box<dyn KitchenQueue>,
    inventory: Box<dyn InventoryLedger>,
    prep_minutes_per_item: i64,
    kitchen_priority: i32,
}

impl FulfillmentDispatcher {
    pub fn new(
        kitchen: Box<dyn KitchenQueue>,
        inventory: Box<dyn InventoryLedger>,
        config: &Config,
    ) -> Self {
        Self {
            kitchen,
            inventory,
            prep_minutes_per_item: config.prep_minutes_per_item,
            kitchen_priority: config.kitchen_priority,
        }
    }

    /// Emit kitchen and inventory effects for a paid order
    ///
    /// Returns the warnings collected along the way; an empty vec means
    /// every applicable downstream accepted its effect.
    pub async fn dispatch(&self, order: &Order) -> Vec<DispatchWarning> {
        let mut warnings = Vec::new();

        let kitchen_items: Vec<_> = order
            .items
            .iter()
            .filter(|i| KITCHEN_CATEGORIES.contains(&i.item_category.as_str()))
            .cloned()
            .collect();

        if !kitchen_items.is_empty() {
            // Estimate scales with distinct rows, not quantities
            let estimated_minutes = kitchen_items.len() as i64 * self.prep_minutes_per_item;
            let request = KitchenRequest {
                order_id: order.id.clone(),
                location: order.location_label(),
                guest_name: order.guest_name.clone(),
                items: kitchen_items,
                status: KitchenRequestStatus::Received,
                priority: self.kitchen_priority,
                estimated_minutes,
                created_at: chrono::Utc::now(),
            };
            if let Err(e) = self.kitchen.submit(request).await {
                tracing::warn!(order_id = %order.id, error = %e, "Kitchen request failed");
                warnings.push(DispatchWarning::KitchenUnavailable {
                    order_id: order.id.clone(),
                    reason: e.to_string(),
                });
            } else {
                tracing::info!(order_id = %order.id, "Kitchen request submitted");
            }
        }

        for item in order
            .items
            .iter()
            .filter(|i| INVENTORY_CATEGORIES.contains(&i.item_category.as_str()))
        {
            let decrement = InventoryDecrement {
                item_name: item.item_name.clone(),
                quantity: item.quantity,
            };
            if let Err(e) = self.inventory.decrement(decrement).await {
                tracing::warn!(item = %item.item_name, error = %e, "Inventory decrement failed");
                warnings.push(DispatchWarning::InventoryUpdateFailed {
                    item_name: item.item_name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        warnings
    }
}
