use serde::Serialize;
use store::{OrderLineRow, OrderRow};

/// An order together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: OrderRow,
    pub items: Vec<OrderLineRow>,
}

/// One page of orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub data: Vec<OrderRow>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<i64>,
    pub limit: i64,
}

/// Response of a confirm call.
///
/// `body` is the serialized payload exactly as first produced for the key;
/// replays return the stored text unchanged. `transitioned` is set only on
/// the call that moved the order from CREATED to CONFIRMED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmReceipt {
    pub body: String,
    pub replayed: bool,
    pub transitioned: bool,
}

/// Payload frozen into the idempotency record on confirm.
#[derive(Debug, Serialize)]
pub(crate) struct ConfirmPayload<'a> {
    #[serde(flatten)]
    pub order: &'a OrderRow,
    #[serde(rename = "alreadyConfirmed", skip_serializing_if = "is_false")]
    pub already_confirmed: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}
