//! Order endpoints: create, read, list, confirm and cancel.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, OrderId, OrderStatus};
use domain::{CreateOrder, OrderEngine, OrderError, OrderPage, OrderView};
use saga::CustomerDirectory;
use serde::Deserialize;
use store::{Database, OrderQuery, OrderRow};

use crate::error::ApiError;

/// Header carrying the caller's idempotency key on confirm.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Shared application state accessible from all order handlers.
pub struct AppState<D: Database> {
    pub engine: OrderEngine<D>,
    pub customers: Arc<dyn CustomerDirectory>,
}

impl<D: Database> AppState<D> {
    pub fn new(db: D, customers: Arc<dyn CustomerDirectory>) -> Self {
        Self {
            engine: OrderEngine::new(db),
            customers,
        }
    }
}

/// `:id` path segment parsed as an order id, rejected with the error envelope.
pub struct OrderIdParam(pub OrderId);

impl<S: Send + Sync> FromRequestParts<S> for OrderIdParam {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state).await?;
        Ok(Self(OrderId::new(id)))
    }
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<OrderQuery, ApiError> {
        let mut query = OrderQuery::new();

        if let Some(status) = non_empty(self.status) {
            let status: OrderStatus = status
                .parse()
                .map_err(|e: common::UnknownStatus| ApiError::BadRequest(e.to_string()))?;
            query = query.status(status);
        }
        if let Some(from) = non_empty(self.from) {
            query = query.created_from(parse_instant("from", &from)?);
        }
        if let Some(to) = non_empty(self.to) {
            query = query.created_to(parse_instant("to", &to)?);
        }
        if let Some(cursor) = self.cursor.and_then(|c| c.parse().ok()) {
            query = query.offset(cursor);
        }
        if let Some(limit) = self.limit.and_then(|l| l.parse().ok()) {
            query = query.limit(limit);
        }

        Ok(query)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_instant(name: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("{name} must be an RFC 3339 timestamp")))
}

// -- Handlers --

/// POST /orders: validate the customer, then create the order and reserve stock.
#[tracing::instrument(skip(state, payload))]
pub async fn create<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<CreateOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let Json(cmd) = payload?;
    let customer_id = cmd.validate()?;

    if state.customers.find_customer(customer_id).await?.is_none() {
        metrics::counter!("orders_create_rejected_total", "code" => "INVALID_CUSTOMER")
            .increment(1);
        return Err(OrderError::InvalidCustomer.into());
    }

    let view = state.engine.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders/:id: load an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    OrderIdParam(id): OrderIdParam,
) -> Result<Json<OrderView>, ApiError> {
    Ok(Json(state.engine.get_order(id).await?))
}

/// GET /orders: one filtered page of orders.
#[tracing::instrument(skip(state, params))]
pub async fn list<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<OrderPage>, ApiError> {
    let Query(params) = params?;
    let page = state.engine.list_orders(params.into_query()?).await?;
    Ok(Json(page))
}

/// POST /orders/:id/confirm: idempotent confirmation keyed by `X-Idempotency-Key`.
///
/// The body is written out exactly as stored, so replays are byte-identical.
#[tracing::instrument(skip(state, headers))]
pub async fn confirm<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    OrderIdParam(id): OrderIdParam,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let key = IdempotencyKey::parse(
        headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let receipt = state.engine.confirm_order(id, key).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        receipt.body,
    ))
}

/// POST /orders/:id/cancel: cancel and restore stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<D: Database + 'static>(
    State(state): State<Arc<AppState<D>>>,
    OrderIdParam(id): OrderIdParam,
) -> Result<Json<OrderRow>, ApiError> {
    Ok(Json(state.engine.cancel_order(id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut p = ListParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "status" => p.status = v,
                "from" => p.from = v,
                "to" => p.to = v,
                "cursor" => p.cursor = v,
                "limit" => p.limit = v,
                _ => unreachable!(),
            }
        }
        p
    }

    #[test]
    fn test_list_defaults() {
        let query = params(&[]).into_query().unwrap();
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, 20);
        assert!(query.status.is_none());
    }

    #[test]
    fn test_list_limit_is_clamped() {
        let query = params(&[("limit", "1000"), ("cursor", "40")])
            .into_query()
            .unwrap();
        assert_eq!(query.limit, 100);
        assert_eq!(query.offset, 40);

        let query = params(&[("limit", "0")]).into_query().unwrap();
        assert_eq!(query.limit, 1);
    }

    #[test]
    fn test_list_parses_filters() {
        let query = params(&[
            ("status", "CONFIRMED"),
            ("from", "2024-01-01T00:00:00Z"),
            ("to", "2024-01-02T00:00:00+02:00"),
        ])
        .into_query()
        .unwrap();

        assert_eq!(query.status, Some(OrderStatus::Confirmed));
        assert_eq!(query.from.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(query.to.unwrap().to_rfc3339(), "2024-01-01T22:00:00+00:00");
    }

    #[test]
    fn test_list_rejects_bad_filters() {
        assert!(params(&[("status", "SHIPPED")]).into_query().is_err());
        assert!(params(&[("from", "yesterday")]).into_query().is_err());
    }

    #[test]
    fn test_list_ignores_unparsable_paging() {
        let query = params(&[("cursor", "abc"), ("limit", "")])
            .into_query()
            .unwrap();
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, 20);
    }
}
