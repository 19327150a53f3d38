//! Menu Item Model
//!
//! Read-only catalog entry. The coordinator trusts the category and price
//! returned by the catalog at the moment an item is added to an order.

use serde::{Deserialize, Serialize};

/// Catalog entry for one menu item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub name: String,
    pub category: String,
    /// Unit price in currency unit
    pub price: f64,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price,
        }
    }
}
