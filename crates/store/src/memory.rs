use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, ProductId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    IdempotencyRecord, IdempotencyScope, IdempotencyStatus, NewOrder, OrderLineRow, OrderQuery,
    OrderRow, ProductRow, Result, StoreError,
    store::{Database, Transaction},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    products: BTreeMap<ProductId, ProductRow>,
    orders: BTreeMap<OrderId, OrderRow>,
    lines: BTreeMap<OrderId, Vec<OrderLineRow>>,
    idempotency: HashMap<IdempotencyScope, IdempotencyRecord>,
    last_order_id: i64,
}

/// In-memory store for tests.
///
/// A transaction holds an exclusive lock over every table for its whole
/// lifetime and works on a private copy, so transactions are serialized and
/// nothing becomes visible until commit.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    fail_on_commit: Arc<AtomicBool>,
    status_writes: Arc<AtomicU64>,
}

impl InMemoryDatabase {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product row.
    pub async fn put_product(&self, product: ProductRow) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    /// Deletes a product row.
    pub async fn remove_product(&self, id: ProductId) {
        self.tables.lock().await.products.remove(&id);
    }

    /// Makes every following commit fail, discarding the transaction's writes.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns how many committed order status updates were applied.
    pub fn status_write_count(&self) -> u64 {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let work = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            work,
            status_writes: 0,
            fail_on_commit: self.fail_on_commit.clone(),
            committed_status_writes: self.status_writes.clone(),
        })
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<OrderRow>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn fetch_order_lines(&self, id: OrderId) -> Result<Vec<OrderLineRow>> {
        Ok(self
            .tables
            .lock()
            .await
            .lines
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<ProductRow>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn fetch_idempotency(
        &self,
        scope: &IdempotencyScope,
    ) -> Result<Option<IdempotencyRecord>> {
        Ok(self.tables.lock().await.idempotency.get(scope).cloned())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderRow>> {
        let tables = self.tables.lock().await;
        let orders = tables
            .orders
            .values()
            .filter(|o| {
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                if let Some(from) = query.from
                    && o.created_at < from
                {
                    return false;
                }
                if let Some(to) = query.to
                    && o.created_at > to
                {
                    return false;
                }
                true
            })
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(orders)
    }
}

/// Transaction over [`InMemoryDatabase`]. Dropping it discards the private copy.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
    status_writes: u64,
    fail_on_commit: Arc<AtomicBool>,
    committed_status_writes: Arc<AtomicU64>,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<ProductRow>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        Ok(ids
            .iter()
            .filter_map(|id| self.work.products.get(id).cloned())
            .collect())
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: i32) -> Result<bool> {
        match self.work.products.get_mut(&id) {
            Some(product) if product.stock >= qty => {
                product.stock -= qty;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_stock(&mut self, id: ProductId, qty: i32) -> Result<bool> {
        match self.work.products.get_mut(&id) {
            Some(product) => {
                product.stock += qty;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderRow> {
        self.work.last_order_id += 1;
        let row = OrderRow {
            id: OrderId::new(self.work.last_order_id),
            customer_id: order.customer_id,
            status: OrderStatus::Created,
            total: order.total,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        self.work.orders.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLineRow) -> Result<()> {
        self.work
            .lines
            .entry(order_id)
            .or_default()
            .push(line.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRow>> {
        Ok(self.work.orders.get(&id).cloned())
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLineRow>> {
        Ok(self.work.lines.get(&id).cloned().unwrap_or_default())
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<OrderRow> {
        let order = self
            .work
            .orders
            .get_mut(&id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        order.status = status;
        order.updated_at = at;
        self.status_writes += 1;
        Ok(order.clone())
    }

    async fn lock_idempotency(
        &mut self,
        scope: &IdempotencyScope,
    ) -> Result<Option<IdempotencyRecord>> {
        Ok(self.work.idempotency.get(scope).cloned())
    }

    async fn insert_pending_idempotency(
        &mut self,
        scope: &IdempotencyScope,
        _at: DateTime<Utc>,
    ) -> Result<bool> {
        if self.work.idempotency.contains_key(scope) {
            return Ok(false);
        }
        self.work
            .idempotency
            .insert(scope.clone(), IdempotencyRecord::pending());
        Ok(true)
    }

    async fn complete_idempotency(
        &mut self,
        scope: &IdempotencyScope,
        response_body: &str,
        _at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(record) = self.work.idempotency.get_mut(scope) {
            record.status = IdempotencyStatus::Done;
            record.response_body = Some(response_body.to_string());
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if self.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::CommitFailed(
                "commit rejected by test configuration".to_string(),
            ));
        }

        let Self {
            mut guard,
            work,
            status_writes,
            committed_status_writes,
            ..
        } = self;
        *guard = work;
        committed_status_writes.fetch_add(status_writes, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
