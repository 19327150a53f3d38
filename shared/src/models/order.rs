//! Order Model
//!
//! An `Order` together with its owned `OrderItem`s forms one consistency
//! boundary: totals are derived from the item set and never settable by a
//! caller directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guest context for an order; decides which location field is meaningful
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuestType {
    /// Hotel room charge, `room_number` expected
    Room,
    /// Dine-in, `table_id` expected
    Table,
    /// Walk-in or takeaway, no location context
    Standalone,
}

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Active,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// Paid and cancelled orders never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

/// Order item preparation status (owned by kitchen fulfillment; the
/// coordinator only ever initializes it to `Pending`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Served,
}

/// One line entry of a menu item within an order
///
/// `item_name`, `item_category` and `price` are copied from the catalog at
/// the moment the item was added and never re-resolved, so historical
/// totals stay stable when the catalog changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: String,
    /// Back-reference to the owning order (relation, not ownership)
    pub order_id: String,
    pub item_name: String,
    pub item_category: String,
    /// Unit price in currency unit, snapshot at add time
    pub price: f64,
    /// Always >= 1; a quantity driven to zero deletes the row
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Create a new pending line item from catalog data
    pub fn new(
        order_id: impl Into<String>,
        item_name: impl Into<String>,
        item_category: impl Into<String>,
        price: f64,
        quantity: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            item_name: item_name.into(),
            item_category: item_category.into(),
            price,
            quantity,
            special_instructions: None,
            status: ItemStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Order entity: one guest's open tab
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub guest_name: String,
    pub guest_type: GuestType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    pub status: OrderStatus,
    /// Sum of item line totals, derived (currency unit)
    pub subtotal: f64,
    /// subtotal * tax rate, derived (currency unit)
    pub tax_amount: f64,
    /// subtotal + tax_amount, derived (currency unit)
    pub total_amount: f64,
    /// Set exactly once, on the transition to `Paid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Advances on every mutation; reconciliation recency checks compare
    /// against this field
    pub updated_at: DateTime<Utc>,
    /// Owned items; no independent existence once the order is gone
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Create a new active order with empty items and zero totals
    pub fn new(
        guest_name: impl Into<String>,
        guest_type: GuestType,
        table_id: Option<String>,
        room_number: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            guest_name: guest_name.into(),
            guest_type,
            table_id,
            room_number,
            status: OrderStatus::Active,
            subtotal: 0.0,
            tax_amount: 0.0,
            total_amount: 0.0,
            payment_method: None,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    /// Find an item row by menu item name (at most one exists per order)
    pub fn item_by_name(&self, name: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_name == name)
    }

    /// Find an item row by id
    pub fn item_by_id(&self, item_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Human-readable location label for kitchen tickets
    pub fn location_label(&self) -> String {
        match self.guest_type {
            GuestType::Table => match &self.table_id {
                Some(t) => format!("Table {t}"),
                None => "Table".to_string(),
            },
            GuestType::Room => match &self.room_number {
                Some(r) => format!("Room {r}"),
                None => "Room".to_string(),
            },
            GuestType::Standalone => "Standalone".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_is_active_with_zero_totals() {
        let order = Order::new("Alice", GuestType::Table, Some("T5".into()), None);
        assert_eq!(order.status, OrderStatus::Active);
        assert_eq!(order.subtotal, 0.0);
        assert_eq!(order.tax_amount, 0.0);
        assert_eq!(order.total_amount, 0.0);
        assert!(order.items.is_empty());
        assert!(order.payment_method.is_none());
    }

    #[test]
    fn test_location_label() {
        let table = Order::new("A", GuestType::Table, Some("T5".into()), None);
        assert_eq!(table.location_label(), "Table T5");

        let room = Order::new("B", GuestType::Room, None, Some("204".into()));
        assert_eq!(room.location_label(), "Room 204");

        let standalone = Order::new("C", GuestType::Standalone, None, None);
        assert_eq!(standalone.location_label(), "Standalone");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Active.is_terminal());
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_serde_roundtrip_preserves_items() {
        let mut order = Order::new("Alice", GuestType::Table, Some("T5".into()), None);
        order
            .items
            .push(OrderItem::new(&order.id, "Burger", "Main Course", 12.0, 2));

        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
        assert_eq!(back.items[0].status, ItemStatus::Pending);
    }

    #[test]
    fn test_status_wire_format_is_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }
}
