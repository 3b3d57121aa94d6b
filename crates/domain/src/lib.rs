//! Order transaction engine.
//!
//! This crate owns the invariants of the order services:
//! - product stock never goes negative (the inventory ledger reserves under row locks)
//! - confirming an order is idempotent per caller-supplied key
//! - cancellation restores stock atomically and honours the reversal window

pub mod error;
pub mod idempotency;
pub mod inventory;
pub mod order;

pub use error::{OrderError, Result};
pub use idempotency::{Claim, ORDER_CONFIRM};
pub use inventory::{LineRequest, Reservation};
pub use order::{
    ConfirmReceipt, CreateOrder, OrderEngine, OrderPage, OrderView, REVERSAL_WINDOW_MINUTES,
    can_cancel,
};
