use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, OrderStatus, ProductId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};

use crate::{
    IdempotencyRecord, IdempotencyScope, IdempotencyStatus, NewOrder, OrderLineRow, OrderQuery,
    OrderRow, ProductRow, Result, StoreError,
    store::{Database, Transaction},
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Creates a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a bounded connection pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_order(row: PgRow) -> Result<OrderRow> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::CorruptRow {
            table: "orders",
            reason: e.to_string(),
        })?;

    Ok(OrderRow {
        id: OrderId::new(row.try_get("id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        status,
        total: Money::from_cents(row.try_get("total_cents")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_line(row: PgRow) -> Result<OrderLineRow> {
    Ok(OrderLineRow {
        product_id: ProductId::new(row.try_get("product_id")?),
        qty: row.try_get("qty")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
    })
}

fn row_to_product(row: PgRow) -> Result<ProductRow> {
    Ok(ProductRow {
        id: ProductId::new(row.try_get("id")?),
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: row.try_get("stock")?,
    })
}

fn row_to_idempotency(row: PgRow) -> Result<IdempotencyRecord> {
    let status: String = row.try_get("status")?;
    let status = IdempotencyStatus::parse(&status).ok_or_else(|| StoreError::CorruptRow {
        table: "idempotency_keys",
        reason: format!("unknown status: {status}"),
    })?;

    Ok(IdempotencyRecord {
        status,
        response_body: row.try_get("response_body")?,
    })
}

#[async_trait]
impl Database for PostgresDatabase {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<OrderRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, status, total_cents, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn fetch_order_lines(&self, id: OrderId) -> Result<Vec<OrderLineRow>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, qty, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_line).collect()
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<ProductRow>> {
        let row = sqlx::query("SELECT id, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_product).transpose()
    }

    async fn fetch_idempotency(
        &self,
        scope: &IdempotencyScope,
    ) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT status, response_body
            FROM idempotency_keys
            WHERE key = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(scope.key.as_str())
        .bind(&scope.operation)
        .bind(scope.target_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_idempotency).transpose()
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderRow>> {
        let mut sql = String::from(
            "SELECT id, customer_id, status, total_cents, created_at, updated_at FROM orders WHERE 1=1",
        );
        let mut param_count = 0;

        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }
        sql.push_str(&format!(
            " ORDER BY id ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        ));

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(from) = query.from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.to {
            sqlx_query = sqlx_query.bind(to);
        }
        sqlx_query = sqlx_query.bind(query.limit).bind(query.offset);

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_order).collect()
    }
}

/// A PostgreSQL transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<ProductRow>> {
        let mut raw: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        raw.sort_unstable();
        raw.dedup();

        // ORDER BY makes Postgres take the row locks in ascending id order.
        let rows = sqlx::query(
            r#"
            SELECT id, price_cents, stock
            FROM products
            WHERE id = ANY($1)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(raw)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn decrement_stock(&mut self, id: ProductId, qty: i32) -> Result<bool> {
        let result =
            sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                .bind(id.as_i64())
                .bind(qty)
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_stock(&mut self, id: ProductId, qty: i32) -> Result<bool> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(qty)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<OrderRow> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (customer_id, status, total_cents, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, customer_id, status, total_cents, created_at, updated_at
            "#,
        )
        .bind(order.customer_id.as_i64())
        .bind(OrderStatus::Created.as_str())
        .bind(order.total.cents())
        .bind(order.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(row)
    }

    async fn insert_order_line(&mut self, order_id: OrderId, line: &OrderLineRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, qty, unit_price_cents, subtotal_cents)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_id.as_i64())
        .bind(line.product_id.as_i64())
        .bind(line.qty)
        .bind(line.unit_price.cents())
        .bind(line.subtotal.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, customer_id, status, total_cents, created_at, updated_at
            FROM orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLineRow>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, qty, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_line).collect()
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<OrderRow> {
        let row = sqlx::query(
            r#"
            UPDATE orders SET status = $2, updated_at = $3
            WHERE id = $1
            RETURNING id, customer_id, status, total_cents, created_at, updated_at
            "#,
        )
        .bind(id.as_i64())
        .bind(status.as_str())
        .bind(at)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(row)
    }

    async fn lock_idempotency(
        &mut self,
        scope: &IdempotencyScope,
    ) -> Result<Option<IdempotencyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT status, response_body
            FROM idempotency_keys
            WHERE key = $1 AND target_type = $2 AND target_id = $3
            FOR UPDATE
            "#,
        )
        .bind(scope.key.as_str())
        .bind(&scope.operation)
        .bind(scope.target_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_idempotency).transpose()
    }

    async fn insert_pending_idempotency(
        &mut self,
        scope: &IdempotencyScope,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, target_type, target_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (key, target_type, target_id) DO NOTHING
            "#,
        )
        .bind(scope.key.as_str())
        .bind(&scope.operation)
        .bind(scope.target_id)
        .bind(IdempotencyStatus::Pending.as_str())
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_idempotency(
        &mut self,
        scope: &IdempotencyScope,
        response_body: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET status = $4, response_body = $5, updated_at = $6
            WHERE key = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(scope.key.as_str())
        .bind(&scope.operation)
        .bind(scope.target_id)
        .bind(IdempotencyStatus::Done.as_str())
        .bind(response_body)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
