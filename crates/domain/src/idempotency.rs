//! Idempotency records scoped by (key, operation, target).

use chrono::{DateTime, Utc};
use store::{IdempotencyScope, StoreError, Transaction};

/// Operation tag for order confirmation.
pub const ORDER_CONFIRM: &str = "ORDER_CONFIRM";

/// Result of claiming an idempotency scope inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// No record existed; a PENDING one was inserted and is locked.
    Fresh,
    /// A PENDING record from an earlier attempt was found and locked.
    Resumed,
    /// The operation already completed; holds the frozen response body.
    Completed(String),
}

/// Looks up the record under lock, inserting a PENDING one if absent.
///
/// A concurrent claim on the same scope blocks until the other transaction
/// finishes, then observes its outcome.
pub async fn claim<T: Transaction>(
    tx: &mut T,
    scope: &IdempotencyScope,
    now: DateTime<Utc>,
) -> Result<Claim, StoreError> {
    if let Some(record) = tx.lock_idempotency(scope).await? {
        return Ok(classify(record.completed_body()));
    }

    if tx.insert_pending_idempotency(scope, now).await? {
        return Ok(Claim::Fresh);
    }

    // Lost an insert race against a transaction that has since committed.
    let record = tx
        .lock_idempotency(scope)
        .await?
        .ok_or_else(|| StoreError::CorruptRow {
            table: "idempotency_keys",
            reason: format!("record for key {} vanished after conflict", scope.key),
        })?;
    Ok(classify(record.completed_body()))
}

/// Freezes the response body and marks the record DONE.
pub async fn complete<T: Transaction>(
    tx: &mut T,
    scope: &IdempotencyScope,
    response_body: &str,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.complete_idempotency(scope, response_body, now).await
}

fn classify(body: Option<&str>) -> Claim {
    match body {
        Some(body) => Claim::Completed(body.to_string()),
        None => Claim::Resumed,
    }
}
