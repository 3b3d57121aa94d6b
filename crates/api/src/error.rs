//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use saga::SagaError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request the handler could not even parse.
    BadRequest(String),
    /// Order engine error.
    Order(OrderError),
    /// Saga or remote service error.
    Saga(SagaError),
}

/// The `{error, code}` envelope every failure is rendered as.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION".to_string(), msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        (
            status,
            axum::Json(ErrorBody {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

fn order_error_to_response(err: OrderError) -> (StatusCode, String, String) {
    let status = match &err {
        OrderError::Validation(_)
        | OrderError::InvalidCustomer
        | OrderError::InvalidProduct(_)
        | OrderError::AmountOverflow(_) => StatusCode::BAD_REQUEST,
        OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderError::OutOfStock(_)
        | OrderError::OrderCanceled(_)
        | OrderError::CannotCancel { .. } => StatusCode::CONFLICT,
        OrderError::Store(_) | OrderError::Serialization(_) => {
            tracing::error!(error = %err, "order operation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code().to_string(),
                "internal server error".to_string(),
            );
        }
    };
    (status, err.code().to_string(), err.to_string())
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String, String) {
    let status = err.status();
    let code = err.code().to_string();
    let message = match &err {
        SagaError::Transport(source) => {
            tracing::error!(error = %source, "upstream request failed");
            "upstream service unavailable".to_string()
        }
        other => {
            if other.is_infrastructure() {
                tracing::warn!(error = %other, "upstream service error");
            }
            other.to_string()
        }
    };
    (status, code, message)
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        ApiError::Saga(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, OrderStatus, ProductId};

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_order_errors_map_to_statuses() {
        let cases = [
            (OrderError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (OrderError::InvalidCustomer, StatusCode::BAD_REQUEST),
            (OrderError::InvalidProduct(ProductId::new(1)), StatusCode::BAD_REQUEST),
            (OrderError::AmountOverflow(ProductId::new(1)), StatusCode::BAD_REQUEST),
            (OrderError::OutOfStock(ProductId::new(1)), StatusCode::CONFLICT),
            (OrderError::NotFound(OrderId::new(1)), StatusCode::NOT_FOUND),
            (OrderError::OrderCanceled(OrderId::new(1)), StatusCode::CONFLICT),
            (
                OrderError::CannotCancel {
                    order_id: OrderId::new(1),
                    status: OrderStatus::Canceled,
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, expected) in cases {
            let code = err.code();
            let (status, json) = render(ApiError::Order(err)).await;
            assert_eq!(status, expected);
            assert_eq!(json["code"], code);
        }
    }

    #[tokio::test]
    async fn test_store_errors_hide_details() {
        let err = OrderError::Store(store::StoreError::CommitFailed("disk on fire".into()));
        let (status, json) = render(ApiError::Order(err)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "DB_ERROR");
        assert_eq!(json["error"], "internal server error");
    }

    #[tokio::test]
    async fn test_saga_errors_keep_mapped_status() {
        let err = SagaError::upstream("create", 409, Some("out of stock".into()), None);
        let (status, json) = render(ApiError::Saga(err)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "create order failed: 409 out of stock");
        assert_eq!(json["code"], "UPSTREAM_ERROR");
    }
}
