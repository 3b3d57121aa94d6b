//! Cancellation rules on top of the order status.

use chrono::{DateTime, Duration, Utc};
use store::OrderRow;

/// Minutes after creation during which a CONFIRMED order may still be canceled.
pub const REVERSAL_WINDOW_MINUTES: i64 = 10;

/// Returns true if the order may be canceled at `now`.
///
/// CREATED orders are always cancelable; CONFIRMED ones only inside the
/// reversal window; CANCELED is terminal.
pub fn can_cancel(order: &OrderRow, now: DateTime<Utc>) -> bool {
    if order.status.is_terminal() {
        return false;
    }
    order.status.can_confirm()
        || now - order.created_at <= Duration::minutes(REVERSAL_WINDOW_MINUTES)
}
