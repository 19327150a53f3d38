//! Change-notification reconciliation
//!
//! Absorbs events from the external change stream into the store under a
//! recency-wins rule: per entity, an event older than the local copy's
//! `updated_at` never changes state. Applying the same batch twice, or the
//! same events in a different arrival order, converges to the same state.
//!
//! Deletes leave tombstones so a late insert or update cannot resurrect a
//! removed entity. Item events that arrive before their owning order are
//! buffered and replayed once the order materializes.
//!
//! Reconciliation never triggers fulfillment dispatch: a paid-status echo
//! reflects a transition whose effects already ran wherever it happened.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::models::{ChangeEntity, ChangeEvent, ChangeOp, OrderItemRecord, OrderRecord};

use crate::store::{MergeOutcome, OrderStore};

#[derive(Default)]
struct ReconcileState {
    /// Deleted order ids with the delete's timestamp
    order_tombstones: HashMap<String, DateTime<Utc>>,
    /// Deleted item ids with the delete's timestamp
    item_tombstones: HashMap<String, DateTime<Utc>>,
    /// Item events awaiting their owning order, keyed by order id
    orphan_items: HashMap<String, Vec<(OrderItemRecord, DateTime<Utc>)>>,
}

/// Merges external change events into the store
pub struct Reconciler {
    store: Arc<OrderStore>,
    state: Mutex<ReconcileState>,
}

impl Reconciler {
    pub fn new(store: Arc<OrderStore>) -> Self {
        Self {
            store,
            state: Mutex::new(ReconcileState::default()),
        }
    }

    /// Absorb a batch of events in arrival order
    pub fn apply_batch(&self, events: &[ChangeEvent]) {
        for event in events {
            self.apply(event);
        }
    }

    /// Absorb one event
    pub fn apply(&self, event: &ChangeEvent) {
        match (&event.op, &event.entity) {
            (ChangeOp::Delete, ChangeEntity::Order(record)) => {
                self.delete_order(record, event.timestamp);
            }
            (_, ChangeEntity::Order(record)) => {
                self.upsert_order(record, event.timestamp);
            }
            (ChangeOp::Delete, ChangeEntity::OrderItem(record)) => {
                self.delete_item(record, event.timestamp);
            }
            (_, ChangeEntity::OrderItem(record)) => {
                self.upsert_item(record, event.timestamp);
            }
        }
    }

    fn upsert_order(&self, record: &OrderRecord, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock();
        if let Some(&deleted_at) = state.order_tombstones.get(&record.id) {
            if timestamp <= deleted_at {
                tracing::debug!(order_id = %record.id, "Ignoring event for deleted order");
                return;
            }
            // Newer than the delete: the order came back
            state.order_tombstones.remove(&record.id);
        }
        let pending = state.orphan_items.remove(&record.id);
        drop(state);

        match self.store.merge_order(record, timestamp) {
            MergeOutcome::Applied => {
                tracing::debug!(order_id = %record.id, "Order record merged");
            }
            MergeOutcome::Stale => {
                tracing::debug!(order_id = %record.id, "Stale order record ignored");
            }
            _ => {}
        }

        // The order now exists locally either way; replay buffered items
        if let Some(pending) = pending {
            for (item_record, item_ts) in pending {
                self.upsert_item(&item_record, item_ts);
            }
        }
    }

    fn delete_order(&self, record: &OrderRecord, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock();
        let tombstone = state
            .order_tombstones
            .entry(record.id.clone())
            .or_insert(timestamp);
        if *tombstone < timestamp {
            *tombstone = timestamp;
        }
        // Buffered items belonged to the deleted incarnation
        state.orphan_items.remove(&record.id);
        drop(state);

        match self.store.remove_order(&record.id, timestamp) {
            MergeOutcome::Applied => {
                tracing::info!(order_id = %record.id, "Order removed by remote delete");
            }
            MergeOutcome::Stale => {
                tracing::debug!(order_id = %record.id, "Local copy newer than remote delete");
            }
            _ => {}
        }
    }

    fn upsert_item(&self, record: &OrderItemRecord, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock();
        if let Some(&deleted_at) = state.item_tombstones.get(&record.id) {
            if timestamp <= deleted_at {
                tracing::debug!(item_id = %record.id, "Ignoring event for deleted item");
                return;
            }
            state.item_tombstones.remove(&record.id);
        }
        drop(state);

        match self.store.merge_item(record, timestamp) {
            MergeOutcome::Applied => {
                tracing::debug!(item_id = %record.id, "Item record merged");
            }
            MergeOutcome::Stale => {
                tracing::debug!(item_id = %record.id, "Stale item record ignored");
            }
            MergeOutcome::MissingOrder => {
                let Some(order_id) = &record.order_id else {
                    tracing::warn!(item_id = %record.id, "Unroutable item event dropped");
                    return;
                };
                let mut state = self.state.lock();
                if let Some(&deleted_at) = state.order_tombstones.get(order_id)
                    && timestamp <= deleted_at
                {
                    tracing::debug!(item_id = %record.id, "Item event for deleted order dropped");
                    return;
                }
                tracing::debug!(item_id = %record.id, order_id = %order_id, "Buffering item for unknown order");
                state
                    .orphan_items
                    .entry(order_id.clone())
                    .or_default()
                    .push((record.clone(), timestamp));
            }
            MergeOutcome::Absent => {}
        }
    }

    fn delete_item(&self, record: &OrderItemRecord, timestamp: DateTime<Utc>) {
        let mut state = self.state.lock();
        let tombstone = state
            .item_tombstones
            .entry(record.id.clone())
            .or_insert(timestamp);
        if *tombstone < timestamp {
            *tombstone = timestamp;
        }
        if let Some(order_id) = &record.order_id
            && let Some(pending) = state.orphan_items.get_mut(order_id)
        {
            pending.retain(|(r, ts)| r.id != record.id || *ts > timestamp);
        }
        drop(state);

        if self.store.remove_item(&record.id, timestamp) == MergeOutcome::Applied {
            tracing::debug!(item_id = %record.id, "Item removed by remote delete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use shared::models::{GuestType, ItemStatus, OrderStatus};

    fn setup() -> (Arc<OrderStore>, Reconciler) {
        let store = Arc::new(OrderStore::new(&Config::default()));
        let reconciler = Reconciler::new(Arc::clone(&store));
        (store, reconciler)
    }

    /// Event timestamp offset from now, so remote events can be made
    /// strictly newer or older than locally stamped mutations
    fn ts_in(seconds: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(seconds)
    }

    fn order_event(op: ChangeOp, record: OrderRecord, timestamp: DateTime<Utc>) -> ChangeEvent {
        ChangeEvent::new(op, ChangeEntity::Order(record)).with_timestamp(timestamp)
    }

    fn item_event(op: ChangeOp, record: OrderItemRecord, timestamp: DateTime<Utc>) -> ChangeEvent {
        ChangeEvent::new(op, ChangeEntity::OrderItem(record)).with_timestamp(timestamp)
    }

    fn remote_order(id: &str) -> OrderRecord {
        OrderRecord {
            id: id.into(),
            guest_name: Some("Remote".into()),
            guest_type: Some(GuestType::Standalone),
            status: Some(OrderStatus::Active),
            ..Default::default()
        }
    }

    fn remote_item(id: &str, order_id: &str, name: &str, price: f64, quantity: i32) -> OrderItemRecord {
        OrderItemRecord {
            id: id.into(),
            order_id: Some(order_id.into()),
            item_name: Some(name.into()),
            item_category: Some("Main Course".into()),
            price: Some(price),
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_materializes_order_with_recomputed_totals() {
        let (store, reconciler) = setup();

        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i1", "o1", "Burger", 12.0, 2),
            ts_in(11),
        ));

        let order = store.get_order("o1").unwrap();
        assert_eq!(order.guest_name, "Remote");
        assert_eq!(order.subtotal, 24.0);
        assert_eq!(order.tax_amount, 2.04);
        assert_eq!(order.total_amount, 26.04);
    }

    #[test]
    fn test_stale_update_is_ignored() {
        let (store, reconciler) = setup();
        let order = store
            .create_order("Local", GuestType::Standalone, None, None)
            .unwrap();

        let stale = OrderRecord {
            id: order.id.clone(),
            guest_name: Some("Old Name".into()),
            ..Default::default()
        };
        reconciler.apply(&order_event(ChangeOp::Update, stale, ts_in(-60)));

        let current = store.get_order(&order.id).unwrap();
        assert_eq!(current.guest_name, "Local");
        assert_eq!(current.updated_at, order.updated_at);
    }

    #[test]
    fn test_newer_update_wins_and_is_idempotent() {
        let (store, reconciler) = setup();
        let order = store
            .create_order("Local", GuestType::Standalone, None, None)
            .unwrap();

        let update = OrderRecord {
            id: order.id.clone(),
            guest_name: Some("Renamed".into()),
            ..Default::default()
        };
        let event = order_event(ChangeOp::Update, update, ts_in(30));
        reconciler.apply(&event);
        let after_first = store.get_order(&order.id).unwrap();
        assert_eq!(after_first.guest_name, "Renamed");
        assert_eq!(after_first.updated_at, event.timestamp);

        // Redelivery of the same event is a no-op
        reconciler.apply(&event);
        assert_eq!(store.get_order(&order.id).unwrap(), after_first);
    }

    #[test]
    fn test_out_of_order_arrival_converges() {
        let (store, reconciler) = setup();
        let newer = order_event(
            ChangeOp::Update,
            OrderRecord {
                id: "o1".into(),
                guest_name: Some("Second".into()),
                ..remote_order("o1")
            },
            ts_in(20),
        );
        let older = order_event(
            ChangeOp::Update,
            OrderRecord {
                id: "o1".into(),
                guest_name: Some("First".into()),
                ..remote_order("o1")
            },
            ts_in(10),
        );

        // Newer event arrives first; the older one must not regress state
        reconciler.apply(&newer);
        reconciler.apply(&older);

        assert_eq!(store.get_order("o1").unwrap().guest_name, "Second");
    }

    #[test]
    fn test_delete_tombstone_blocks_resurrection() {
        let (store, reconciler) = setup();
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));
        reconciler.apply(&order_event(ChangeOp::Delete, remote_order("o1"), ts_in(30)));
        assert!(store.get_order("o1").is_err());

        // A late insert older than the delete stays dead
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(20)));
        assert!(store.get_order("o1").is_err());

        // A genuinely newer insert re-materializes the order
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(40)));
        assert!(store.get_order("o1").is_ok());
    }

    #[test]
    fn test_delete_at_equal_timestamp_is_stale() {
        let (store, reconciler) = setup();
        let ts = ts_in(10);
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts));

        // "At least as new" is a no-op for deletes too
        reconciler.apply(&order_event(ChangeOp::Delete, remote_order("o1"), ts));
        assert!(store.get_order("o1").is_ok());

        let item_ts = ts_in(11);
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i1", "o1", "Burger", 12.0, 1),
            item_ts,
        ));
        reconciler.apply(&item_event(
            ChangeOp::Delete,
            remote_item("i1", "o1", "Burger", 12.0, 1),
            item_ts,
        ));
        assert_eq!(store.get_order("o1").unwrap().items.len(), 1);
    }

    #[test]
    fn test_order_delete_cascades_items() {
        let (store, reconciler) = setup();
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i1", "o1", "Burger", 12.0, 1),
            ts_in(11),
        ));

        reconciler.apply(&order_event(ChangeOp::Delete, remote_order("o1"), ts_in(20)));
        assert!(store.get_order("o1").is_err());

        // The cascaded item is gone too: its update has nowhere to land
        // and must not recreate the order
        reconciler.apply(&item_event(
            ChangeOp::Update,
            remote_item("i1", "o1", "Burger", 12.0, 5),
            ts_in(15),
        ));
        assert!(store.get_order("o1").is_err());
    }

    #[test]
    fn test_orphan_item_buffered_until_order_arrives() {
        let (store, reconciler) = setup();

        // Item event outruns its order's insert
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i1", "o1", "Burger", 12.0, 2),
            ts_in(11),
        ));
        assert!(store.get_order("o1").is_err());

        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));

        let order = store.get_order("o1").unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].item_name, "Burger");
        assert_eq!(order.subtotal, 24.0);
    }

    #[test]
    fn test_item_delete_recomputes_totals() {
        let (store, reconciler) = setup();
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i1", "o1", "Burger", 12.0, 2),
            ts_in(11),
        ));
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i2", "o1", "Fries", 4.0, 1),
            ts_in(12),
        ));

        reconciler.apply(&item_event(
            ChangeOp::Delete,
            remote_item("i1", "o1", "Burger", 12.0, 2),
            ts_in(20),
        ));

        let order = store.get_order("o1").unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.subtotal, 4.0);
        assert_eq!(order.tax_amount, 0.34);
        assert_eq!(order.total_amount, 4.34);
    }

    #[test]
    fn test_item_status_echo_applies_to_paid_order() {
        // Kitchen owns item status; the echo lands even after payment
        let (store, reconciler) = setup();
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));
        reconciler.apply(&item_event(
            ChangeOp::Insert,
            remote_item("i1", "o1", "Burger", 12.0, 1),
            ts_in(11),
        ));
        store.mark_paid("o1", "CASH").unwrap();

        let mut progressed = remote_item("i1", "o1", "Burger", 12.0, 1);
        progressed.status = Some(ItemStatus::Preparing);
        reconciler.apply(&item_event(ChangeOp::Update, progressed, ts_in(30)));

        let order = store.get_order("o1").unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.items[0].status, ItemStatus::Preparing);
    }

    #[test]
    fn test_patch_update_preserves_unmentioned_fields() {
        let (store, reconciler) = setup();
        reconciler.apply(&order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)));

        let patch = OrderRecord {
            id: "o1".into(),
            status: Some(OrderStatus::Paid),
            payment_method: Some("CARD".into()),
            ..Default::default()
        };
        reconciler.apply(&order_event(ChangeOp::Update, patch, ts_in(20)));

        let order = store.get_order("o1").unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.guest_name, "Remote");
        assert_eq!(order.payment_method.as_deref(), Some("CARD"));
    }

    #[test]
    fn test_batch_in_any_order_converges() {
        let make_events = || {
            vec![
                order_event(ChangeOp::Insert, remote_order("o1"), ts_in(10)),
                item_event(
                    ChangeOp::Insert,
                    remote_item("i1", "o1", "Burger", 12.0, 2),
                    ts_in(11),
                ),
                item_event(
                    ChangeOp::Update,
                    remote_item("i1", "o1", "Burger", 12.0, 3),
                    ts_in(12),
                ),
            ]
        };

        let (store_a, rec_a) = setup();
        rec_a.apply_batch(&make_events());

        let (store_b, rec_b) = setup();
        let mut reversed = make_events();
        reversed.reverse();
        rec_b.apply_batch(&reversed);

        let a = store_a.get_order("o1").unwrap();
        let b = store_b.get_order("o1").unwrap();
        assert_eq!(a.items[0].quantity, 3);
        assert_eq!(b.items[0].quantity, 3);
        assert_eq!(a.subtotal, b.subtotal);
        assert_eq!(a.total_amount, b.total_amount);
    }
}
