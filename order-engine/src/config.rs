//! Engine configuration
//!
//! Pricing/tax policy is supplied here, not decided by the engine.

/// Configuration for the order engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Tax rate applied to order subtotals (e.g. 0.085 for 8.5%)
    pub tax_rate: f64,
    /// Estimated preparation time per kitchen item row, in minutes
    pub prep_minutes_per_item: i64,
    /// Priority stamped on emitted kitchen requests
    pub kitchen_priority: i32,
    /// Capacity of the store's change broadcast channel
    pub change_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            tax_rate: std::env::var("TAX_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.085),
            prep_minutes_per_item: std::env::var("PREP_MINUTES_PER_ITEM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            kitchen_priority: std::env::var("KITCHEN_PRIORITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            change_channel_capacity: std::env::var("CHANGE_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tax_rate: 0.085,
            prep_minutes_per_item: 10,
            kitchen_priority: 1,
            change_channel_capacity: 1024,
        }
    }
}
