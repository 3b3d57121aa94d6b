//! Row types mirroring the `products`, `orders`, `order_items` and
//! `idempotency_keys` tables.

use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, Money, OrderId, OrderStatus, ProductId};
use serde::Serialize;

/// Stock-bearing product row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub id: ProductId,
    pub price: Money,
    pub stock: i32,
}

impl ProductRow {
    pub fn new(id: ProductId, price: Money, stock: i32) -> Self {
        Self { id, price, stock }
    }
}

/// Values for a new `orders` row. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

/// An `orders` row, serialized as the public order representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    #[serde(rename = "total_cents")]
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An `order_items` row. Price and subtotal are snapshots taken at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineRow {
    pub product_id: ProductId,
    pub qty: i32,
    #[serde(rename = "unit_price_cents")]
    pub unit_price: Money,
    #[serde(rename = "subtotal_cents")]
    pub subtotal: Money,
}

/// Composite key of an idempotency record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyScope {
    pub key: IdempotencyKey,
    pub operation: String,
    pub target_id: i64,
}

impl IdempotencyScope {
    pub fn new(key: IdempotencyKey, operation: impl Into<String>, target_id: i64) -> Self {
        Self {
            key,
            operation: operation.into(),
            target_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    Pending,
    Done,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdempotencyStatus::Pending => "PENDING",
            IdempotencyStatus::Done => "DONE",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(IdempotencyStatus::Pending),
            "DONE" => Some(IdempotencyStatus::Done),
            _ => None,
        }
    }
}

/// Stored state of an idempotent operation.
///
/// `response_body` holds the exact serialized response once the record is DONE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub status: IdempotencyStatus,
    pub response_body: Option<String>,
}

impl IdempotencyRecord {
    pub fn pending() -> Self {
        Self {
            status: IdempotencyStatus::Pending,
            response_body: None,
        }
    }

    /// Returns the frozen response if the operation already completed.
    pub fn completed_body(&self) -> Option<&str> {
        match self.status {
            IdempotencyStatus::Done => self.response_body.as_deref(),
            IdempotencyStatus::Pending => None,
        }
    }
}
