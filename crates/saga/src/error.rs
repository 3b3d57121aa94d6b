//! Saga error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while running the create-and-confirm saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was rejected before any remote call.
    #[error("{0}")]
    Validation(String),

    /// The customer service answered 404.
    #[error("customer not found")]
    CustomerNotFound,

    /// The customer service answered with an unexpected status.
    #[error("customers/internal error: {0}")]
    CustomerService(u16),

    /// The order service rejected a step.
    #[error("{message}")]
    Upstream {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A remote call could not be completed at all.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SagaError {
    /// Builds the error for a failed order step, e.g. `create order failed: 409 out of stock`.
    pub fn upstream(
        step: &str,
        status: u16,
        upstream_error: Option<String>,
        code: Option<String>,
    ) -> Self {
        let message = format!(
            "{step} order failed: {status} {}",
            upstream_error.unwrap_or_default()
        )
        .trim_end()
        .to_string();

        SagaError::Upstream {
            status,
            code,
            message,
        }
    }

    /// Returns the outward HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            SagaError::Validation(_) | SagaError::CustomerNotFound => StatusCode::BAD_REQUEST,
            SagaError::CustomerService(_) | SagaError::Transport(_) => StatusCode::BAD_GATEWAY,
            SagaError::Upstream { status, .. } => map_status(*status),
        }
    }

    /// Returns the machine-readable error code.
    pub fn code(&self) -> &str {
        match self {
            SagaError::Validation(_) => "VALIDATION",
            SagaError::CustomerNotFound => "INVALID_CUSTOMER",
            SagaError::CustomerService(_) | SagaError::Transport(_) => "UPSTREAM_ERROR",
            SagaError::Upstream { code, .. } => code.as_deref().unwrap_or("UPSTREAM_ERROR"),
        }
    }

    /// Returns true when the failure came from an unreachable or failing dependency.
    pub fn is_infrastructure(&self) -> bool {
        self.status().is_server_error()
    }
}

/// Collapses an upstream status into the small outward set.
pub fn map_status(upstream: u16) -> StatusCode {
    match upstream {
        s if s >= 500 => StatusCode::BAD_GATEWAY,
        404 => StatusCode::NOT_FOUND,
        409 => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_statuses_collapse() {
        assert_eq!(map_status(500), StatusCode::BAD_GATEWAY);
        assert_eq!(map_status(503), StatusCode::BAD_GATEWAY);
        assert_eq!(map_status(404), StatusCode::NOT_FOUND);
        assert_eq!(map_status(409), StatusCode::CONFLICT);
        assert_eq!(map_status(400), StatusCode::BAD_REQUEST);
        assert_eq!(map_status(401), StatusCode::BAD_REQUEST);
        assert_eq!(map_status(422), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_message_includes_step_and_reason() {
        let err = SagaError::upstream(
            "create",
            409,
            Some("insufficient stock for product 7".to_string()),
            Some("OUT_OF_STOCK".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "create order failed: 409 insufficient stock for product 7"
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "OUT_OF_STOCK");
    }

    #[test]
    fn upstream_message_without_reason_is_trimmed() {
        let err = SagaError::upstream("confirm", 502, None, None);
        assert_eq!(err.to_string(), "confirm order failed: 502");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        assert!(err.is_infrastructure());
    }

    #[test]
    fn customer_errors() {
        assert_eq!(SagaError::CustomerNotFound.status(), StatusCode::BAD_REQUEST);
        assert_eq!(SagaError::CustomerNotFound.to_string(), "customer not found");
        let err = SagaError::CustomerService(500);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "customers/internal error: 500");
    }
}
