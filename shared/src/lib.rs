//! Shared types for the order coordinator
//!
//! Data models and error types used by the order engine and any
//! transport/UI crate built on top of it.

pub mod error;
pub mod models;

// Re-exports
pub use error::{OrderError, OrderResult};
pub use serde::{Deserialize, Serialize};
