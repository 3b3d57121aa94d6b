//! Saga orchestrator for the create-and-confirm order flow.

use common::{CustomerId, IdempotencyKey, Money, OrderId, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::services::customers::{Customer, CustomerDirectory};
use crate::services::orders::{LineItem, NewOrderRequest, OrderGateway, OrderLine};

/// Body of `POST /orchestrator/create-and-confirm-order`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAndConfirmOrder {
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub idempotency_key: Option<String>,
    /// Passed through to the response untouched.
    pub correlation_id: Option<serde_json::Value>,
}

impl CreateAndConfirmOrder {
    pub fn new(customer_id: i64, items: Vec<LineItem>, idempotency_key: &str) -> Self {
        Self {
            customer_id: Some(CustomerId::new(customer_id)),
            items,
            idempotency_key: Some(idempotency_key.to_string()),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: serde_json::Value) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    fn validate(&self) -> Result<(CustomerId, IdempotencyKey)> {
        let customer_id = match self.customer_id {
            Some(id) if id.as_i64() > 0 && !self.items.is_empty() => id,
            _ => {
                return Err(SagaError::Validation(
                    "customer_id and items[] required".to_string(),
                ));
            }
        };
        let key = IdempotencyKey::parse(self.idempotency_key.as_deref())
            .ok_or_else(|| SagaError::Validation("idempotency_key required".to_string()))?;
        Ok((customer_id, key))
    }
}

/// The confirmed order as reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_cents: Money,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SagaData {
    pub customer: Customer,
    pub order: OrderSummary,
}

/// Successful saga response.
#[derive(Debug, Clone, Serialize)]
pub struct SagaOutcome {
    pub success: bool,
    #[serde(rename = "correlationId")]
    pub correlation_id: Option<serde_json::Value>,
    pub data: SagaData,
}

/// Runs validate customer → create order → confirm order as one synchronous call.
///
/// No step is compensated. If confirmation fails the order stays CREATED;
/// retrying with the same idempotency key is safe.
pub struct SagaOrchestrator<C, O>
where
    C: CustomerDirectory,
    O: OrderGateway,
{
    customers: C,
    orders: O,
}

impl<C, O> SagaOrchestrator<C, O>
where
    C: CustomerDirectory,
    O: OrderGateway,
{
    /// Creates a new orchestrator.
    pub fn new(customers: C, orders: O) -> Self {
        Self { customers, orders }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(saga_type = "CreateAndConfirmOrder", correlation_id = ?request.correlation_id)
    )]
    pub async fn create_and_confirm_order(
        &self,
        request: CreateAndConfirmOrder,
    ) -> Result<SagaOutcome> {
        let (customer_id, key) = request.validate()?;

        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        let result = self.run(customer_id, &key, &request.items).await;
        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());

        match result {
            Ok(data) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(order_id = %data.order.id, "saga completed successfully");
                Ok(SagaOutcome {
                    success: true,
                    correlation_id: request.correlation_id,
                    data,
                })
            }
            Err(e) => {
                metrics::counter!("saga_failed").increment(1);
                tracing::warn!(error = %e, "saga failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        customer_id: CustomerId,
        key: &IdempotencyKey,
        items: &[LineItem],
    ) -> Result<SagaData> {
        tracing::info!(step = "validate_customer", "saga step started");
        let customer = self
            .customers
            .find_customer(customer_id)
            .await?
            .ok_or(SagaError::CustomerNotFound)?;

        tracing::info!(step = "create_order", "saga step started");
        let created = self
            .orders
            .create_order(NewOrderRequest { customer_id, items })
            .await?;

        tracing::info!(step = "confirm_order", order_id = %created.id, "saga step started");
        let confirmed = self.orders.confirm_order(created.id, key).await?;

        Ok(SagaData {
            customer,
            order: OrderSummary {
                id: confirmed.id,
                status: confirmed.status,
                total_cents: confirmed.total_cents,
                items: created.items,
            },
        })
    }
}
