//! Fulfillment Models
//!
//! Records emitted exactly once when an order transitions to paid: a
//! kitchen preparation request and per-item inventory decrements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::OrderItem;

/// Kitchen request status (initial state only; further transitions belong
/// to the kitchen system)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KitchenRequestStatus {
    #[default]
    Received,
    Preparing,
    Ready,
    Completed,
}

/// One kitchen preparation request for a paid order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KitchenRequest {
    pub order_id: String,
    /// Human-readable location, e.g. "Table T5" or "Room 204"
    pub location: String,
    pub guest_name: String,
    /// Subset of the order's items that require preparation
    pub items: Vec<OrderItem>,
    pub status: KitchenRequestStatus,
    pub priority: i32,
    /// Item-row count multiplied by the configured per-item minutes
    pub estimated_minutes: i64,
    pub created_at: DateTime<Utc>,
}

/// Atomic stock decrement request, keyed by item name
///
/// The inventory ledger performs the subtraction server-side; the
/// coordinator never formats arithmetic into an update payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryDecrement {
    pub item_name: String,
    /// Units to subtract from current stock
    pub quantity: i32,
}
