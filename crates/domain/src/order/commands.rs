use common::CustomerId;
use serde::Deserialize;

use crate::error::{OrderError, Result};
use crate::inventory::LineRequest;

/// Request to create an order.
///
/// Fields are optional so that missing input is reported as a validation
/// error rather than a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOrder {
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub items: Vec<LineRequest>,
}

impl CreateOrder {
    pub fn new(customer_id: CustomerId, items: Vec<LineRequest>) -> Self {
        Self {
            customer_id: Some(customer_id),
            items,
        }
    }

    /// Checks the preconditions that need no database access.
    pub fn validate(&self) -> Result<CustomerId> {
        let customer_id = match self.customer_id {
            Some(id) if id.as_i64() > 0 => id,
            _ => return Err(required()),
        };
        if self.items.is_empty() {
            return Err(required());
        }
        if let Some(line) = self.items.iter().find(|l| l.qty <= 0) {
            return Err(OrderError::Validation(format!(
                "qty for product {} must be a positive integer",
                line.product_id
            )));
        }
        Ok(customer_id)
    }
}

fn required() -> OrderError {
    OrderError::Validation("customer_id and items[] required".to_string())
}
