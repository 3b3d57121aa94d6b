use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ProductId};

use crate::{
    IdempotencyRecord, IdempotencyScope, NewOrder, OrderLineRow, OrderQuery, OrderRow, ProductRow,
    Result,
};

/// An open unit of work.
///
/// Every `lock_*` method takes a row lock held until [`commit`](Self::commit)
/// or [`rollback`](Self::rollback). Dropping the transaction rolls it back.
#[async_trait]
pub trait Transaction: Send {
    /// Locks the given products for update and returns the rows that exist.
    ///
    /// Locks are acquired in ascending id order; duplicate ids are ignored.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<ProductRow>>;

    /// Subtracts `qty` from a product's stock.
    ///
    /// Returns false, leaving the row untouched, if the product is missing
    /// or holds less than `qty`.
    async fn decrement_stock(&mut self, id: ProductId, qty: i32) -> Result<bool>;

    /// Adds `qty` back to a product's stock. Returns false if the product is missing.
    async fn increment_stock(&mut self, id: ProductId, qty: i32) -> Result<bool>;

    /// Inserts an order with status CREATED and returns the stored row.
    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderRow>;

    async fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLineRow) -> Result<()>;

    /// Locks an order row for update.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRow>>;

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLineRow>>;

    /// Writes a new status and returns the fresh row.
    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<OrderRow>;

    /// Locks an idempotency record for update.
    async fn lock_idempotency(
        &mut self,
        scope: &IdempotencyScope,
    ) -> Result<Option<IdempotencyRecord>>;

    /// Inserts a PENDING record.
    ///
    /// Returns false if a record with the same scope already exists. A
    /// concurrent uncommitted insert of the same scope blocks this call
    /// until that transaction finishes.
    async fn insert_pending_idempotency(
        &mut self,
        scope: &IdempotencyScope,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Marks a record DONE with its frozen response body.
    async fn complete_idempotency(
        &mut self,
        scope: &IdempotencyScope,
        response_body: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Handle to the relational store.
///
/// Reads outside a transaction see committed data only.
#[async_trait]
pub trait Database: Send + Sync {
    type Tx: Transaction;

    /// Acquires a connection and opens a transaction on it.
    async fn begin(&self) -> Result<Self::Tx>;

    async fn fetch_order(&self, id: OrderId) -> Result<Option<OrderRow>>;

    async fn fetch_order_lines(&self, id: OrderId) -> Result<Vec<OrderLineRow>>;

    async fn fetch_product(&self, id: ProductId) -> Result<Option<ProductRow>>;

    async fn fetch_idempotency(
        &self,
        scope: &IdempotencyScope,
    ) -> Result<Option<IdempotencyRecord>>;

    /// Lists orders matching the query, ordered by ascending id.
    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderRow>>;
}
