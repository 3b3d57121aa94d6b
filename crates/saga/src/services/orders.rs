//! Order service gateway trait with HTTP and in-memory implementations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{CustomerId, IdempotencyKey, Money, OrderId, OrderStatus, ProductId};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// One requested order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub qty: i32,
}

impl LineItem {
    pub fn new(product_id: i64, qty: i32) -> Self {
        Self {
            product_id: ProductId::new(product_id),
            qty,
        }
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderRequest<'a> {
    pub customer_id: CustomerId,
    pub items: &'a [LineItem],
}

/// A priced order line as returned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub qty: i32,
    pub unit_price_cents: Money,
    pub subtotal_cents: Money,
}

/// The fields of a freshly created order the saga needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedOrder {
    pub id: OrderId,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

/// The fields of a confirmed order the saga needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmedOrder {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_cents: Money,
}

/// Creates and confirms orders on the order service.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Creates an order, reserving its stock.
    async fn create_order(&self, request: NewOrderRequest<'_>) -> Result<CreatedOrder, SagaError>;

    /// Confirms an order under the given idempotency key.
    async fn confirm_order(
        &self,
        order_id: OrderId,
        key: &IdempotencyKey,
    ) -> Result<ConfirmedOrder, SagaError>;
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    code: Option<String>,
}

/// Turns a non-2xx response into [`SagaError::Upstream`], reading the
/// `{error, code}` envelope when the body has one.
async fn upstream_error(step: &str, response: Response) -> SagaError {
    let status = response.status().as_u16();
    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    SagaError::upstream(step, status, body.error, body.code)
}

/// Talks to the order service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOrderGateway {
    client: Client,
    base_url: String,
}

impl HttpOrderGateway {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    #[tracing::instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    async fn create_order(&self, request: NewOrderRequest<'_>) -> Result<CreatedOrder, SagaError> {
        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error("create", response).await);
        }
        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self, key))]
    async fn confirm_order(
        &self,
        order_id: OrderId,
        key: &IdempotencyKey,
    ) -> Result<ConfirmedOrder, SagaError> {
        let response = self
            .client
            .post(format!("{}/orders/{}/confirm", self.base_url, order_id))
            .header("X-Idempotency-Key", key.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_error("confirm", response).await);
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Clone)]
struct StoredOrder {
    status: OrderStatus,
    total: Money,
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    prices: HashMap<ProductId, Money>,
    orders: HashMap<OrderId, StoredOrder>,
    confirm_keys: Vec<(OrderId, IdempotencyKey)>,
    next_id: i64,
    create_calls: usize,
    confirm_calls: usize,
    fail_on_create: Option<u16>,
    fail_on_confirm: Option<u16>,
}

/// In-memory order service for testing.
///
/// Unknown products are rejected the way the order service rejects them;
/// stock is not tracked.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderGateway {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderGateway {
    /// Creates a gateway that knows no products.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product price.
    pub fn set_price(&self, product_id: i64, price: Money) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .prices
            .insert(ProductId::new(product_id), price);
    }

    /// Makes every following create fail with the given upstream status.
    pub fn set_fail_on_create(&self, status: Option<u16>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_create = status;
    }

    /// Makes every following confirm fail with the given upstream status.
    pub fn set_fail_on_confirm(&self, status: Option<u16>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_confirm = status;
    }

    /// Returns the number of create calls received.
    pub fn create_calls(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .create_calls
    }

    /// Returns the number of confirm calls received.
    pub fn confirm_calls(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .confirm_calls
    }

    /// Returns the idempotency keys received by confirm calls for an order, in order.
    pub fn confirm_keys(&self, order_id: OrderId) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .confirm_keys
            .iter()
            .filter(|(id, _)| *id == order_id)
            .map(|(_, key)| key.as_str().to_string())
            .collect()
    }

    /// Returns the current status of an order, if it exists.
    pub fn order_status(&self, order_id: OrderId) -> Option<OrderStatus> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .orders
            .get(&order_id)
            .map(|o| o.status)
    }
}

#[async_trait]
impl OrderGateway for InMemoryOrderGateway {
    async fn create_order(&self, request: NewOrderRequest<'_>) -> Result<CreatedOrder, SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.create_calls += 1;

        if let Some(status) = state.fail_on_create {
            return Err(SagaError::upstream("create", status, None, None));
        }

        let mut items = Vec::with_capacity(request.items.len());
        for item in request.items {
            let price = state.prices.get(&item.product_id).copied().ok_or_else(|| {
                SagaError::upstream(
                    "create",
                    400,
                    Some(format!("product {} does not exist", item.product_id)),
                    Some("INVALID_PRODUCT".to_string()),
                )
            })?;
            items.push(OrderLine {
                product_id: item.product_id,
                qty: item.qty,
                unit_price_cents: price,
                subtotal_cents: price.multiply(item.qty),
            });
        }

        state.next_id += 1;
        let id = OrderId::new(state.next_id);
        let total = items.iter().map(|l| l.subtotal_cents).sum();
        state.orders.insert(
            id,
            StoredOrder {
                status: OrderStatus::Created,
                total,
            },
        );

        Ok(CreatedOrder { id, items })
    }

    async fn confirm_order(
        &self,
        order_id: OrderId,
        key: &IdempotencyKey,
    ) -> Result<ConfirmedOrder, SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.confirm_calls += 1;

        if let Some(status) = state.fail_on_confirm {
            return Err(SagaError::upstream("confirm", status, None, None));
        }

        let order = state.orders.get(&order_id).cloned().ok_or_else(|| {
            SagaError::upstream(
                "confirm",
                404,
                Some(format!("order {order_id} not found")),
                Some("NOT_FOUND".to_string()),
            )
        })?;
        if order.status == OrderStatus::Canceled {
            return Err(SagaError::upstream(
                "confirm",
                409,
                Some(format!("order {order_id} is canceled")),
                Some("ORDER_CANCELED".to_string()),
            ));
        }

        state.confirm_keys.push((order_id, key.clone()));
        if let Some(stored) = state.orders.get_mut(&order_id) {
            stored.status = OrderStatus::Confirmed;
        }

        Ok(ConfirmedOrder {
            id: order_id,
            status: OrderStatus::Confirmed,
            total_cents: order.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> IdempotencyKey {
        IdempotencyKey::parse(Some(raw)).unwrap()
    }

    #[tokio::test]
    async fn test_create_prices_lines() {
        let gateway = InMemoryOrderGateway::new();
        gateway.set_price(7, Money::from_cents(500));

        let items = [LineItem::new(7, 2)];
        let created = gateway
            .create_order(NewOrderRequest {
                customer_id: CustomerId::new(1),
                items: &items,
            })
            .await
            .unwrap();

        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].subtotal_cents, Money::from_cents(1000));
        assert_eq!(gateway.order_status(created.id), Some(OrderStatus::Created));
    }

    #[tokio::test]
    async fn test_create_unknown_product() {
        let gateway = InMemoryOrderGateway::new();
        let items = [LineItem::new(9, 1)];

        let err = gateway
            .create_order(NewOrderRequest {
                customer_id: CustomerId::new(1),
                items: &items,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_PRODUCT");
        assert_eq!(err.to_string(), "create order failed: 400 product 9 does not exist");
    }

    #[tokio::test]
    async fn test_confirm_unknown_order() {
        let gateway = InMemoryOrderGateway::new();
        let err = gateway
            .confirm_order(OrderId::new(1), &key("k1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), reqwest::StatusCode::NOT_FOUND);
        assert_eq!(gateway.confirm_calls(), 1);
    }

    #[test]
    fn test_created_order_tolerates_missing_items() {
        let created: CreatedOrder =
            serde_json::from_str(r#"{"id":4,"status":"CREATED","total_cents":0}"#).unwrap();
        assert_eq!(created.id, OrderId::new(4));
        assert!(created.items.is_empty());
    }
}
