//! Catalog lookup boundary
//!
//! The menu catalog is an external collaborator; the engine only needs a
//! read-only name -> (category, price) lookup. Prices and categories are
//! snapshotted into order items at add time and never re-resolved.

use std::collections::HashMap;

use shared::models::MenuItem;

/// Read-only menu catalog lookup
pub trait CatalogLookup: Send + Sync {
    /// Resolve a menu item by name, or `None` if the catalog has no entry
    fn lookup(&self, item_name: &str) -> Option<MenuItem>;
}

/// In-memory catalog backed by a fixed item list
///
/// Suitable for tests and for callers that load the menu up front.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: HashMap<String, MenuItem>,
}

impl StaticCatalog {
    pub fn new(items: impl IntoIterator<Item = MenuItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.name.clone(), item))
                .collect(),
        }
    }
}

impl CatalogLookup for StaticCatalog {
    fn lookup(&self, item_name: &str) -> Option<MenuItem> {
        self.items.get(item_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_catalog_lookup() {
        let catalog = StaticCatalog::new([
            MenuItem::new("Burger", "Main Course", 12.0),
            MenuItem::new("Beer", "Beer", 5.5),
        ]);

        let burger = catalog.lookup("Burger").unwrap();
        assert_eq!(burger.category, "Main Course");
        assert_eq!(burger.price, 12.0);
        assert!(catalog.lookup("Sushi").is_none());
    }
}
