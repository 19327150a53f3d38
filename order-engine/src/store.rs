//! OrderStore - the authoritative in-memory order collection
//!
//! This is the single serialization point for both mutation sources
//! (caller operations and reconciled change notifications). Orders and
//! their items live behind ONE lock, so totals recomputation always sees
//! a consistent item set and no reader observes a half-updated aggregate.
//!
//! Critical sections are short and never call out to collaborators;
//! catalog lookups and dispatch emission happen in the manager, outside
//! the lock.
//!
//! Every mutation is published on a broadcast channel (`StoreChange`);
//! UI fan-out and other push consumers subscribe downstream.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared::models::{
    GuestType, MenuItem, Order, OrderItem, OrderItemRecord, OrderRecord, OrderStatus,
};
use shared::{OrderError, OrderResult};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::money;

/// Store change log entry, broadcast after every committed mutation
#[derive(Debug, Clone)]
pub enum StoreChange {
    /// Order created or mutated (carries the full aggregate)
    Upserted(Box<Order>),
    /// Order removed (reconciled remote delete)
    Removed(String),
}

/// Outcome of merging one reconciled record into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeOutcome {
    /// Local state changed
    Applied,
    /// Local copy was at least as new; event ignored
    Stale,
    /// Entity already absent (deletes only)
    Absent,
    /// Item event whose owning order is not locally known
    MissingOrder,
}

/// Authoritative in-memory collection of order aggregates
pub struct OrderStore {
    orders: RwLock<HashMap<String, Order>>,
    change_tx: broadcast::Sender<StoreChange>,
    tax_rate: f64,
}

impl std::fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStore")
            .field("orders", &self.orders.read().len())
            .field("tax_rate", &self.tax_rate)
            .finish()
    }
}

impl OrderStore {
    pub fn new(config: &Config) -> Self {
        let (change_tx, _) = broadcast::channel(config.change_channel_capacity);
        Self {
            orders: RwLock::new(HashMap::new()),
            change_tx,
            tax_rate: config.tax_rate,
        }
    }

    /// Subscribe to the store's change log
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }

    fn publish(&self, change: StoreChange) {
        // No receivers is fine
        let _ = self.change_tx.send(change);
    }

    /// Recompute derived totals from the current item set
    fn recompute(&self, order: &mut Order) {
        let totals = money::compute_totals(&order.items, self.tax_rate);
        order.subtotal = totals.subtotal;
        order.tax_amount = totals.tax_amount;
        order.total_amount = totals.total_amount;
    }

    // ========== Caller-facing operations ==========

    /// Create a new active order with empty items and zero totals
    ///
    /// Guest context policy: `Table` requires a table id, `Room` requires
    /// a room number, `Standalone` expects neither.
    pub fn create_order(
        &self,
        guest_name: &str,
        guest_type: GuestType,
        table_id: Option<String>,
        room_number: Option<String>,
    ) -> OrderResult<Order> {
        match guest_type {
            GuestType::Table if table_id.is_none() => {
                return Err(OrderError::Validation(
                    "table orders require a table id".into(),
                ));
            }
            GuestType::Room if room_number.is_none() => {
                return Err(OrderError::Validation(
                    "room orders require a room number".into(),
                ));
            }
            GuestType::Standalone if table_id.is_some() || room_number.is_some() => {
                return Err(OrderError::Validation(
                    "standalone orders take no table or room context".into(),
                ));
            }
            _ => {}
        }

        let order = Order::new(guest_name, guest_type, table_id, room_number);
        self.orders.write().insert(order.id.clone(), order.clone());

        tracing::info!(order_id = %order.id, guest = %order.guest_name, "Order created");
        self.publish(StoreChange::Upserted(Box::new(order.clone())));
        Ok(order)
    }

    /// Get a snapshot of one order
    pub fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.orders
            .read()
            .get(order_id)
            .cloned()
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    /// All active orders, most recently created first (id breaks ties so
    /// the ordering is a stable total order)
    pub fn list_active_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        orders
    }

    /// Add `quantity_delta` of a catalog item to an order
    ///
    /// If a row with the same item name exists its quantity is adjusted
    /// (a delta driving it to zero or below deletes the row); otherwise a
    /// new row is created, skipped when the delta is not positive. Totals
    /// are recomputed before returning.
    pub fn upsert_item(
        &self,
        order_id: &str,
        entry: &MenuItem,
        quantity_delta: i32,
    ) -> OrderResult<Order> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        require_active(order)?;

        let now = Utc::now();
        match order.items.iter().position(|i| i.item_name == entry.name) {
            Some(idx) => {
                let new_quantity = order.items[idx]
                    .quantity
                    .saturating_add(quantity_delta)
                    .min(money::MAX_QUANTITY);
                if new_quantity <= 0 {
                    let removed = order.items.remove(idx);
                    tracing::debug!(order_id = %order.id, item = %removed.item_name, "Item removed by delta");
                } else {
                    let item = &mut order.items[idx];
                    item.quantity = new_quantity;
                    item.updated_at = now;
                }
            }
            None => {
                let quantity = quantity_delta.max(0);
                if quantity > 0 {
                    order.items.push(OrderItem::new(
                        order_id,
                        &entry.name,
                        &entry.category,
                        entry.price,
                        quantity,
                    ));
                }
            }
        }

        order.updated_at = now;
        self.recompute(order);
        let snapshot = order.clone();
        drop(orders);

        self.publish(StoreChange::Upserted(Box::new(snapshot.clone())));
        Ok(snapshot)
    }

    /// Set an item's quantity to an absolute value; zero or below deletes
    /// the row. Returns the owning order with recomputed totals.
    pub fn set_item_quantity(&self, item_id: &str, quantity: i32) -> OrderResult<Order> {
        let mut orders = self.orders.write();
        let order = orders
            .values_mut()
            .find(|o| o.items.iter().any(|i| i.id == item_id))
            .ok_or_else(|| OrderError::ItemNotFound(item_id.to_string()))?;
        require_active(order)?;

        let now = Utc::now();
        if quantity <= 0 {
            order.items.retain(|i| i.id != item_id);
        } else if let Some(item) = order.items.iter_mut().find(|i| i.id == item_id) {
            item.quantity = quantity;
            item.updated_at = now;
        }

        order.updated_at = now;
        self.recompute(order);
        let snapshot = order.clone();
        drop(orders);

        self.publish(StoreChange::Upserted(Box::new(snapshot.clone())));
        Ok(snapshot)
    }

    /// Transition an active order to paid
    ///
    /// Freezes the item set and stamps the payment method. Fulfillment
    /// dispatch is the manager's responsibility and happens outside this
    /// critical section, exactly once per successful transition.
    pub fn mark_paid(&self, order_id: &str, payment_method: &str) -> OrderResult<Order> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        require_active(order)?;

        order.status = OrderStatus::Paid;
        order.payment_method = Some(payment_method.to_string());
        order.updated_at = Utc::now();
        let snapshot = order.clone();
        drop(orders);

        tracing::info!(order_id = %order_id, method = %payment_method, "Order paid");
        self.publish(StoreChange::Upserted(Box::new(snapshot.clone())));
        Ok(snapshot)
    }

    /// Transition an active order to cancelled (terminal, no side effects)
    pub fn cancel_order(&self, order_id: &str) -> OrderResult<Order> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        require_active(order)?;

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        let snapshot = order.clone();
        drop(orders);

        tracing::info!(order_id = %order_id, "Order cancelled");
        self.publish(StoreChange::Upserted(Box::new(snapshot.clone())));
        Ok(snapshot)
    }

    /// Replace the local collection with freshly loaded orders
    ///
    /// Used by `refresh`: the persistent store's active-order query is
    /// authoritative for which tabs are open.
    pub fn replace_all(&self, loaded: Vec<Order>) {
        let mut orders = self.orders.write();
        orders.clear();
        let mut snapshots = Vec::with_capacity(loaded.len());
        for mut order in loaded {
            self.recompute(&mut order);
            snapshots.push(order.clone());
            orders.insert(order.id.clone(), order);
        }
        drop(orders);

        for snapshot in snapshots {
            self.publish(StoreChange::Upserted(Box::new(snapshot)));
        }
    }

    // ========== Reconciliation entry points ==========
    //
    // Remote records are the authoritative echo, so these bypass the
    // active-only rule that governs caller operations. Recency decides:
    // an event older than the local copy's updated_at never changes state.

    /// Merge a reconciled order record (insert or update)
    pub(crate) fn merge_order(
        &self,
        record: &OrderRecord,
        timestamp: DateTime<Utc>,
    ) -> MergeOutcome {
        let mut orders = self.orders.write();

        let order = orders.entry(record.id.clone()).or_insert_with(|| {
            let mut order = Order::new("", GuestType::Standalone, None, None);
            order.id = record.id.clone();
            order.created_at = record.created_at.unwrap_or(timestamp);
            // Forces the patch below to apply on first materialization
            order.updated_at = DateTime::<Utc>::MIN_UTC;
            order
        });

        if timestamp <= order.updated_at {
            return MergeOutcome::Stale;
        }

        if let Some(guest_name) = &record.guest_name {
            order.guest_name = guest_name.clone();
        }
        if let Some(guest_type) = record.guest_type {
            order.guest_type = guest_type;
        }
        if let Some(table_id) = &record.table_id {
            order.table_id = Some(table_id.clone());
        }
        if let Some(room_number) = &record.room_number {
            order.room_number = Some(room_number.clone());
        }
        if let Some(status) = record.status {
            order.status = status;
        }
        if let Some(payment_method) = &record.payment_method {
            order.payment_method = Some(payment_method.clone());
        }
        if let Some(created_at) = record.created_at {
            order.created_at = created_at;
        }
        order.updated_at = timestamp;
        self.recompute(order);
        let snapshot = order.clone();
        drop(orders);

        self.publish(StoreChange::Upserted(Box::new(snapshot)));
        MergeOutcome::Applied
    }

    /// Remove a reconciled-deleted order, cascading its items
    pub(crate) fn remove_order(&self, order_id: &str, timestamp: DateTime<Utc>) -> MergeOutcome {
        let mut orders = self.orders.write();
        match orders.get(order_id) {
            None => MergeOutcome::Absent,
            Some(order) if order.updated_at >= timestamp => MergeOutcome::Stale,
            Some(_) => {
                orders.remove(order_id);
                drop(orders);
                self.publish(StoreChange::Removed(order_id.to_string()));
                MergeOutcome::Applied
            }
        }
    }

    /// Merge a reconciled item record into its owning order
    pub(crate) fn merge_item(
        &self,
        record: &OrderItemRecord,
        timestamp: DateTime<Utc>,
    ) -> MergeOutcome {
        let mut orders = self.orders.write();

        // Resolve the owning order: by the record's back-reference, or by
        // locating the existing row when the payload omits order_id.
        let order = match &record.order_id {
            Some(order_id) => orders.get_mut(order_id),
            None => orders
                .values_mut()
                .find(|o| o.items.iter().any(|i| i.id == record.id)),
        };
        let Some(order) = order else {
            return MergeOutcome::MissingOrder;
        };

        if let Some(existing) = order.items.iter().find(|i| i.id == record.id) {
            if timestamp <= existing.updated_at {
                return MergeOutcome::Stale;
            }
        }

        let idx = match order.items.iter().position(|i| i.id == record.id) {
            Some(idx) => idx,
            None => {
                // A same-name row under a different id would violate the
                // one-row-per-item-name invariant; the authoritative record
                // supersedes it.
                if let Some(name) = &record.item_name
                    && let Some(dup) = order.items.iter().position(|i| &i.item_name == name)
                {
                    tracing::debug!(order_id = %order.id, item = %name, "Replacing same-name row with authoritative record");
                    order.items.remove(dup);
                }
                let mut item = OrderItem::new(
                    order.id.clone(),
                    record.item_name.clone().unwrap_or_default(),
                    record.item_category.clone().unwrap_or_default(),
                    record.price.unwrap_or(0.0),
                    record.quantity.unwrap_or(0),
                );
                item.id = record.id.clone();
                item.created_at = record.created_at.unwrap_or(timestamp);
                order.items.push(item);
                order.items.len() - 1
            }
        };

        {
            let item = &mut order.items[idx];
            if let Some(name) = &record.item_name {
                item.item_name = name.clone();
            }
            if let Some(category) = &record.item_category {
                item.item_category = category.clone();
            }
            if let Some(price) = record.price {
                item.price = price;
            }
            if let Some(quantity) = record.quantity {
                // Remote records are not caller-validated; cap them at the
                // same per-row bound
                item.quantity = quantity.min(money::MAX_QUANTITY);
            }
            if let Some(instructions) = &record.special_instructions {
                item.special_instructions = Some(instructions.clone());
            }
            if let Some(status) = record.status {
                item.status = status;
            }
            item.updated_at = timestamp;
        }

        // Zero or negative quantity means absence, never a retained row
        order.items.retain(|i| i.quantity > 0);

        if order.updated_at < timestamp {
            order.updated_at = timestamp;
        }
        self.recompute(order);
        let snapshot = order.clone();
        drop(orders);

        self.publish(StoreChange::Upserted(Box::new(snapshot)));
        MergeOutcome::Applied
    }

    /// Remove a reconciled-deleted item and recompute the owner's totals
    pub(crate) fn remove_item(&self, item_id: &str, timestamp: DateTime<Utc>) -> MergeOutcome {
        let mut orders = self.orders.write();
        let Some(order) = orders
            .values_mut()
            .find(|o| o.items.iter().any(|i| i.id == item_id))
        else {
            return MergeOutcome::Absent;
        };

        if let Some(item) = order.items.iter().find(|i| i.id == item_id)
            && item.updated_at >= timestamp
        {
            return MergeOutcome::Stale;
        }

        order.items.retain(|i| i.id != item_id);
        if order.updated_at < timestamp {
            order.updated_at = timestamp;
        }
        self.recompute(order);
        let snapshot = order.clone();
        drop(orders);

        self.publish(StoreChange::Upserted(Box::new(snapshot)));
        MergeOutcome::Applied
    }
}

/// Item mutations are permitted only while an order is active
fn require_active(order: &Order) -> OrderResult<()> {
    if !order.is_active() {
        return Err(OrderError::InvalidState(format!(
            "order {} is {:?}",
            order.id, order.status
        )));
    }
    Ok(())
}
