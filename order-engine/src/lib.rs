//! Order Engine
//!
//! In-memory order coordination for a food-and-beverage venue: an
//! authoritative order store with derived totals, recency-wins
//! reconciliation of external change notifications, and exactly-once
//! fulfillment dispatch on payment.

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod manager;
pub mod money;
pub mod reconcile;
pub mod repository;
pub mod store;

pub use catalog::{CatalogLookup, StaticCatalog};
pub use config::Config;
pub use dispatch::{DispatchWarning, FulfillmentDispatcher, InventoryLedger, KitchenQueue};
pub use manager::{ListenerHandle, OrderManager};
pub use reconcile::Reconciler;
pub use repository::{MemoryRepository, NullRepository, OrderRepository};
pub use store::{OrderStore, StoreChange};
