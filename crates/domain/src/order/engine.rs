//! The order transaction engine.

use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, OrderId, OrderStatus};
use store::{Database, IdempotencyScope, NewOrder, OrderQuery, OrderRow, Transaction};

use super::view::ConfirmPayload;
use super::{ConfirmReceipt, CreateOrder, OrderPage, OrderView, can_cancel};
use crate::error::{OrderError, Result};
use crate::idempotency::{self, Claim, ORDER_CONFIRM};
use crate::inventory::{self, LineRequest};

/// Runs every order write inside a single store transaction.
///
/// The engine keeps no state of its own; each call re-reads the rows it
/// needs under lock.
pub struct OrderEngine<D: Database> {
    db: D,
}

impl<D: Database> OrderEngine<D> {
    /// Creates an engine over the given store.
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying store.
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Creates an order, reserving stock for every line.
    ///
    /// Two concurrent calls over the same products are serialized by the
    /// product row locks, so their combined demand can never oversell.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = ?cmd.customer_id, lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderView> {
        let customer_id = cmd.validate()?;

        let mut tx = self.db.begin().await?;
        let result = create_in(&mut tx, customer_id, &cmd.items, Utc::now()).await;
        let view = finish(tx, result).await.inspect_err(|e| {
            metrics::counter!("orders_create_rejected_total", "code" => e.code()).increment(1);
        })?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %view.order.id, total = %view.order.total, "order created");
        Ok(view)
    }

    /// Confirms an order at most once per idempotency key.
    ///
    /// The first completion freezes its response body; every later call with
    /// the same key gets that body back verbatim, whatever the order's
    /// current state.
    #[tracing::instrument(skip(self, key))]
    pub async fn confirm_order(
        &self,
        order_id: OrderId,
        key: Option<IdempotencyKey>,
    ) -> Result<ConfirmReceipt> {
        let key = key
            .ok_or_else(|| OrderError::Validation("X-Idempotency-Key required".to_string()))?;
        let scope = IdempotencyScope::new(key, ORDER_CONFIRM, order_id.as_i64());

        let mut tx = self.db.begin().await?;
        let result = confirm_in(&mut tx, order_id, &scope, Utc::now()).await;
        let receipt = finish(tx, result).await?;

        if receipt.replayed {
            metrics::counter!("order_confirm_replays_total").increment(1);
            tracing::debug!("confirm replayed from idempotency record");
        } else if receipt.transitioned {
            metrics::counter!("orders_confirmed_total").increment(1);
            tracing::info!(%order_id, "order confirmed");
        }
        Ok(receipt)
    }

    /// Cancels an order, restoring its stock.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<OrderRow> {
        self.cancel_order_at(order_id, Utc::now()).await
    }

    /// Cancels an order, judging the reversal window against `now`.
    pub async fn cancel_order_at(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<OrderRow> {
        let mut tx = self.db.begin().await?;
        let result = cancel_in(&mut tx, order_id, now).await;
        let order = finish(tx, result).await?;

        metrics::counter!("orders_canceled_total").increment(1);
        tracing::info!(%order_id, "order canceled");
        Ok(order)
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderView> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        let items = self.db.fetch_order_lines(order_id).await?;
        Ok(OrderView { order, items })
    }

    /// Lists one page of orders.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<OrderPage> {
        let data = self.db.list_orders(&query).await?;
        Ok(OrderPage {
            next_cursor: query.next_offset(data.len()),
            limit: query.limit,
            data,
        })
    }
}

/// Commits on success and rolls back on error, so the connection is
/// released on every path.
async fn finish<T: Transaction, R>(tx: T, result: Result<R>) -> Result<R> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

async fn create_in<T: Transaction>(
    tx: &mut T,
    customer_id: CustomerId,
    lines: &[LineRequest],
    now: DateTime<Utc>,
) -> Result<OrderView> {
    let reservation = inventory::reserve(tx, lines).await?;

    let order = tx
        .insert_order(NewOrder {
            customer_id,
            total: reservation.total,
            created_at: now,
        })
        .await?;
    for line in &reservation.lines {
        tx.insert_order_line(order.id, line).await?;
    }

    Ok(OrderView {
        order,
        items: reservation.lines,
    })
}

async fn confirm_in<T: Transaction>(
    tx: &mut T,
    order_id: OrderId,
    scope: &IdempotencyScope,
    now: DateTime<Utc>,
) -> Result<ConfirmReceipt> {
    match idempotency::claim(tx, scope, now).await? {
        Claim::Completed(body) => {
            return Ok(ConfirmReceipt {
                body,
                replayed: true,
                transitioned: false,
            });
        }
        Claim::Resumed => tracing::info!("resuming pending confirm attempt"),
        Claim::Fresh => {}
    }

    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(OrderError::NotFound(order_id))?;

    if order.status.is_terminal() {
        return Err(OrderError::OrderCanceled(order_id));
    }
    let already_confirmed = !order.status.can_confirm();
    let order = if already_confirmed {
        order
    } else {
        tx.set_order_status(order_id, OrderStatus::Confirmed, now)
            .await?
    };

    let body = serde_json::to_string(&ConfirmPayload {
        order: &order,
        already_confirmed,
    })?;
    idempotency::complete(tx, scope, &body, now).await?;

    Ok(ConfirmReceipt {
        body,
        replayed: false,
        transitioned: !already_confirmed,
    })
}

async fn cancel_in<T: Transaction>(
    tx: &mut T,
    order_id: OrderId,
    now: DateTime<Utc>,
) -> Result<OrderRow> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(OrderError::NotFound(order_id))?;
    let lines = tx.order_lines(order_id).await?;

    if !can_cancel(&order, now) {
        return Err(OrderError::CannotCancel {
            order_id,
            status: order.status,
        });
    }

    inventory::restore(tx, &lines).await?;
    let fresh = tx
        .set_order_status(order_id, OrderStatus::Canceled, now)
        .await?;
    Ok(fresh)
}
