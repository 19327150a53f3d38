//! Money calculation using rust_decimal for precision
//!
//! All arithmetic is done on `Decimal` internally and converted back to
//! `f64` for storage/serialization, rounded to 2 decimal places half-up.
//! `compute_totals` is pure and idempotent: it runs after every mutation,
//! including reconciliation of identical remote state, and recomputing on
//! unchanged input must yield identical output.

use rust_decimal::prelude::*;
use shared::OrderError;
use shared::models::OrderItem;

/// Rounding precision for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed unit price
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per item row
pub(crate) const MAX_QUANTITY: i32 = 9999;

/// Derived monetary totals of an order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Compute subtotal, tax and total over an order's items
///
/// subtotal = sum(price * quantity), tax = subtotal * tax_rate rounded
/// half-up to the smallest currency unit, total = subtotal + tax.
pub fn compute_totals(items: &[OrderItem], tax_rate: f64) -> OrderTotals {
    let subtotal: Decimal = items
        .iter()
        .map(|item| to_decimal(item.price) * Decimal::from(item.quantity))
        .sum();
    let subtotal =
        subtotal.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);

    let tax = (subtotal * to_decimal(tax_rate))
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);

    OrderTotals {
        subtotal: to_f64(subtotal),
        tax_amount: to_f64(tax),
        total_amount: to_f64(subtotal + tax),
    }
}

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), OrderError> {
    if !value.is_finite() {
        return Err(OrderError::Validation(format!(
            "{field_name} must be a finite number, got {value}"
        )));
    }
    Ok(())
}

/// Validate a catalog price before snapshotting it into an order item
pub fn validate_price(price: f64) -> Result<(), OrderError> {
    require_finite(price, "price")?;
    if price < 0.0 {
        return Err(OrderError::Validation(format!(
            "price must be non-negative, got {price}"
        )));
    }
    if price > MAX_PRICE {
        return Err(OrderError::Validation(format!(
            "price exceeds maximum allowed ({MAX_PRICE}), got {price}"
        )));
    }
    Ok(())
}

/// Validate a caller-supplied quantity (for add-item requests)
pub fn validate_quantity(quantity: i32) -> Result<(), OrderError> {
    if quantity <= 0 {
        return Err(OrderError::Validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(OrderError::Validation(format!(
            "quantity exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    Ok(())
}
