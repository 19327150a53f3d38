//! Order lifecycle coordination
//!
//! `OrderManager` is the public surface: it composes the store, catalog,
//! repository, reconciler and fulfillment dispatcher, and sequences each
//! operation as commit-locally-first, then write through, then (for
//! payment) dispatch. Side effects always run outside the store's lock.

use std::sync::Arc;

use shared::models::{ChangeEvent, GuestType, Order};
use shared::{OrderError, OrderResult};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::catalog::CatalogLookup;
use crate::config::Config;
use crate::dispatch::{DispatchWarning, FulfillmentDispatcher, InventoryLedger, KitchenQueue};
use crate::money;
use crate::reconcile::Reconciler;
use crate::repository::OrderRepository;
use crate::store::{OrderStore, StoreChange};

/// Handle to a spawned change-stream listener
pub struct ListenerHandle {
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop the listener and wait for it to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}

/// Coordinates order lifecycle operations
pub struct OrderManager {
    store: Arc<OrderStore>,
    catalog: Arc<dyn CatalogLookup>,
    repository: Arc<dyn OrderRepository>,
    dispatcher: FulfillmentDispatcher,
    reconciler: Arc<Reconciler>,
}

impl OrderManager {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn CatalogLookup>,
        repository: Arc<dyn OrderRepository>,
        kitchen: Box<dyn KitchenQueue>,
        inventory: Box<dyn InventoryLedger>,
    ) -> Self {
        let store = Arc::new(OrderStore::new(config));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&store)));
        Self {
            store,
            catalog,
            repository,
            dispatcher: FulfillmentDispatcher::new(kitchen, inventory, config),
            reconciler,
        }
    }

    /// Subscribe to the store's change log
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    /// Open a new order for a guest
    pub async fn create_order(
        &self,
        guest_name: &str,
        guest_type: GuestType,
        table_id: Option<String>,
        room_number: Option<String>,
    ) -> OrderResult<Order> {
        let order = self
            .store
            .create_order(guest_name, guest_type, table_id, room_number)?;
        self.persist(&order).await;
        Ok(order)
    }

    /// Add `quantity` of a catalog item to an order
    ///
    /// The item's name, category and price are snapshotted from the
    /// catalog at this moment.
    pub async fn add_item(
        &self,
        order_id: &str,
        item_name: &str,
        quantity: i32,
    ) -> OrderResult<Order> {
        money::validate_quantity(quantity)?;
        let entry = self
            .catalog
            .lookup(item_name)
            .ok_or_else(|| OrderError::Validation(format!("unknown menu item: {item_name}")))?;
        money::validate_price(entry.price)?;

        let order = self.store.upsert_item(order_id, &entry, quantity)?;
        self.persist(&order).await;
        Ok(order)
    }

    /// Set an item row's quantity to an absolute value; zero removes it
    pub async fn set_item_quantity(&self, item_id: &str, quantity: i32) -> OrderResult<Order> {
        if quantity > 0 {
            money::validate_quantity(quantity)?;
        }
        let order = self.store.set_item_quantity(item_id, quantity)?;
        self.persist(&order).await;
        Ok(order)
    }

    /// Pay an order, then emit fulfillment effects
    ///
    /// The status transition commits before dispatch runs; fulfillment
    /// failures come back as warnings, never as an error.
    pub async fn pay(
        &self,
        order_id: &str,
        payment_method: &str,
    ) -> OrderResult<(Order, Vec<DispatchWarning>)> {
        let order = self.store.mark_paid(order_id, payment_method)?;
        self.persist(&order).await;
        let warnings = self.dispatcher.dispatch(&order).await;
        Ok((order, warnings))
    }

    /// Cancel an active order; no fulfillment effects
    pub async fn cancel(&self, order_id: &str) -> OrderResult<Order> {
        let order = self.store.cancel_order(order_id)?;
        self.persist(&order).await;
        Ok(order)
    }

    pub fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.store.get_order(order_id)
    }

    /// Active orders, most recently created first
    pub fn list_active_orders(&self) -> Vec<Order> {
        self.store.list_active_orders()
    }

    /// Reload the local collection from the repository
    pub async fn refresh(&self) -> anyhow::Result<Vec<Order>> {
        let loaded = self.repository.fetch_active_orders().await?;
        tracing::info!(count = loaded.len(), "Orders refreshed from repository");
        self.store.replace_all(loaded);
        Ok(self.store.list_active_orders())
    }

    /// Absorb a batch of change-stream events
    pub fn absorb(&self, events: &[ChangeEvent]) {
        self.reconciler.apply_batch(events);
    }

    /// Spawn a task that absorbs events from `rx` until shutdown
    pub fn spawn_listener(&self, mut rx: mpsc::Receiver<ChangeEvent>) -> ListenerHandle {
        let token = CancellationToken::new();
        let child = token.child_token();
        let reconciler = Arc::clone(&self.reconciler);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        tracing::info!("Change listener shutting down");
                        break;
                    }
                    event = rx.recv() => {
                        match event {
                            Some(event) => reconciler.apply(&event),
                            None => {
                                tracing::info!("Change stream closed");
                                break;
                            }
                        }
                    }
                }
            }
        });

        ListenerHandle { token, handle }
    }

    async fn persist(&self, order: &Order) {
        if let Err(e) = self.repository.save_order(order).await {
            tracing::warn!(order_id = %order.id, error = %e, "Write-through failed");
        }
    }
}
