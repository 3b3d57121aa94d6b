//! Orders: lifecycle rules, commands, views and the transaction engine.

mod commands;
mod engine;
mod state;
mod view;

pub use commands::CreateOrder;
pub use engine::OrderEngine;
pub use state::{REVERSAL_WINDOW_MINUTES, can_cancel};
pub use view::{ConfirmReceipt, OrderPage, OrderView};
