//! Data models
//!
//! Shared between the order engine and API/UI consumers. All IDs are
//! opaque UUID strings assigned at creation.

pub mod change;
pub mod fulfillment;
pub mod menu_item;
pub mod order;

// Re-exports
pub use change::*;
pub use fulfillment::*;
pub use menu_item::*;
pub use order::*;
