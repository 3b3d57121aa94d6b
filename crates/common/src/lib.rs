//! Shared identifiers and value types used across the order services.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownStatus};
pub use types::{CustomerId, IdempotencyKey, OrderId, ProductId};
