//! Error taxonomy for order operations
//!
//! Every caller-facing operation either fully succeeds or fails with one of
//! these variants and leaves the store unchanged. Dispatch failures after a
//! committed payment are deliberately NOT errors; they surface as a warning
//! set on the payment result (see `order-engine::dispatch`).

use thiserror::Error;

/// Order operation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Malformed input, rejected before any state change
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced order does not exist
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Referenced order item does not exist
    #[error("order item not found: {0}")]
    ItemNotFound(String),

    /// Operation illegal for the order's current status
    #[error("invalid state: {0}")]
    InvalidState(String),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl OrderError {
    /// Stable machine-readable code (for API layers and logs)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(OrderError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(
            OrderError::OrderNotFound("o1".into()).code(),
            "ORDER_NOT_FOUND"
        );
        assert_eq!(OrderError::ItemNotFound("i1".into()).code(), "ITEM_NOT_FOUND");
        assert_eq!(OrderError::InvalidState("paid".into()).code(), "INVALID_STATE");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = OrderError::OrderNotFound("order-42".into());
        assert_eq!(err.to_string(), "order not found: order-42");
    }
}
