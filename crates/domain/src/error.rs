//! Order error types.

use common::{OrderId, OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the order transaction engine.
///
/// Every business-rule variant is detected inside the transaction that
/// discovered it, and that transaction is rolled back before the error is
/// returned.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// The referenced customer does not exist.
    #[error("customer not found")]
    InvalidCustomer,

    /// A referenced product does not exist.
    #[error("product {0} not found")]
    InvalidProduct(ProductId),

    /// A line asks for more than the product's current stock.
    #[error("insufficient stock for product {0}")]
    OutOfStock(ProductId),

    /// A priced line or the order total does not fit in cents.
    #[error("order amount out of range for product {0}")]
    AmountOverflow(ProductId),

    /// The order does not exist.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Confirmation was requested for a canceled order.
    #[error("order {0} canceled")]
    OrderCanceled(OrderId),

    /// The order is not eligible for cancellation.
    #[error("cannot cancel order {order_id} in {status} state")]
    CannotCancel {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A response payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrderError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) | OrderError::AmountOverflow(_) => "VALIDATION",
            OrderError::InvalidCustomer => "INVALID_CUSTOMER",
            OrderError::InvalidProduct(_) => "INVALID_PRODUCT",
            OrderError::OutOfStock(_) => "OUT_OF_STOCK",
            OrderError::NotFound(_) => "NOT_FOUND",
            OrderError::OrderCanceled(_) => "ORDER_CANCELED",
            OrderError::CannotCancel { .. } => "CANNOT_CANCEL",
            OrderError::Store(_) | OrderError::Serialization(_) => "DB_ERROR",
        }
    }

    /// Returns true for failures of the infrastructure rather than the request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, OrderError::Store(_) | OrderError::Serialization(_))
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, OrderError>;
