//! Inventory ledger: stock-aware view over the `products` table.
//!
//! Both operations run inside a caller-owned transaction and never commit.

use std::collections::HashMap;

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{OrderLineRow, StoreError, Transaction};

use crate::error::{OrderError, Result};

/// A requested product line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub qty: i32,
}

impl LineRequest {
    pub fn new(product_id: i64, qty: i32) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            qty,
        }
    }
}

/// Outcome of a successful reservation, priced at the locked rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub lines: Vec<OrderLineRow>,
    pub total: Money,
}

/// Locks every referenced product and decrements stock for each line.
///
/// Fails with `InvalidProduct` if any id is absent and `OutOfStock` if the
/// combined demand for a product exceeds its stock. A line or total that does
/// not fit in cents fails with `AmountOverflow`. On failure nothing has
/// been written; the caller rolls the transaction back.
pub async fn reserve<T: Transaction>(tx: &mut T, lines: &[LineRequest]) -> Result<Reservation> {
    let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let products: HashMap<_, _> = tx
        .lock_products(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut demand: HashMap<ProductId, i64> = HashMap::new();
    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Money::zero();
    for line in lines {
        let product = products
            .get(&line.product_id)
            .ok_or(OrderError::InvalidProduct(line.product_id))?;

        let wanted = demand.entry(line.product_id).or_insert(0);
        *wanted += i64::from(line.qty);
        if *wanted > i64::from(product.stock) {
            return Err(OrderError::OutOfStock(line.product_id));
        }

        let subtotal = product
            .price
            .checked_multiply(line.qty)
            .ok_or(OrderError::AmountOverflow(line.product_id))?;
        total = total
            .checked_add(subtotal)
            .ok_or(OrderError::AmountOverflow(line.product_id))?;
        priced.push(OrderLineRow {
            product_id: line.product_id,
            qty: line.qty,
            unit_price: product.price,
            subtotal,
        });
    }

    for line in lines {
        if !tx.decrement_stock(line.product_id, line.qty).await? {
            return Err(OrderError::OutOfStock(line.product_id));
        }
    }

    Ok(Reservation {
        lines: priced,
        total,
    })
}

/// Adds every line's quantity back to stock, in ascending product order.
///
/// A product that no longer exists is logged and skipped.
pub async fn restore<T: Transaction>(
    tx: &mut T,
    lines: &[OrderLineRow],
) -> std::result::Result<(), StoreError> {
    let mut ordered: Vec<&OrderLineRow> = lines.iter().collect();
    ordered.sort_by_key(|l| l.product_id);

    for line in ordered {
        if !tx.increment_stock(line.product_id, line.qty).await? {
            tracing::warn!(
                product_id = %line.product_id,
                qty = line.qty,
                "product missing while restoring stock, skipped"
            );
        }
    }
    Ok(())
}
