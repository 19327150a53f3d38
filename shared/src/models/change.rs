//! Change notification events
//!
//! Events delivered by the external change-notification stream, echoing the
//! authoritative state of order and order-item records. Update records use
//! patch semantics: a field that is `None` was absent from the notification
//! payload and must never clobber the locally-known value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::{GuestType, ItemStatus, Order, OrderItem, OrderStatus};

/// Change operation kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Order record as observed by the external source
///
/// Only `id` is mandatory. Totals are intentionally absent: the engine
/// recomputes them from the item set after every merge, so an echoed total
/// can never diverge from the local calculator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_type: Option<GuestType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            guest_name: Some(order.guest_name.clone()),
            guest_type: Some(order.guest_type),
            table_id: order.table_id.clone(),
            room_number: order.room_number.clone(),
            status: Some(order.status),
            payment_method: order.payment_method.clone(),
            created_at: Some(order.created_at),
        }
    }
}

/// Order item record as observed by the external source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderItemRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&OrderItem> for OrderItemRecord {
    fn from(item: &OrderItem) -> Self {
        Self {
            id: item.id.clone(),
            order_id: Some(item.order_id.clone()),
            item_name: Some(item.item_name.clone()),
            item_category: Some(item.item_category.clone()),
            price: Some(item.price),
            quantity: Some(item.quantity),
            special_instructions: item.special_instructions.clone(),
            status: Some(item.status),
            created_at: Some(item.created_at),
        }
    }
}

/// Affected entity of a change event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "entity_type", content = "record", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEntity {
    Order(OrderRecord),
    OrderItem(OrderItemRecord),
}

impl ChangeEntity {
    /// Id of the affected entity
    pub fn id(&self) -> &str {
        match self {
            Self::Order(r) => &r.id,
            Self::OrderItem(r) => &r.id,
        }
    }
}

/// One change notification
///
/// `timestamp` is the authoritative source's record time; the merger uses
/// it (not arrival order) for per-entity recency decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    #[serde(flatten)]
    pub entity: ChangeEntity,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(op: ChangeOp, entity: ChangeEntity) -> Self {
        Self {
            op,
            entity,
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
