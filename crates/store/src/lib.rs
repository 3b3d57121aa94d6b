//! Relational store for the order services.
//!
//! All mutations go through a [`Transaction`] obtained from a [`Database`].
//! A transaction that is dropped without [`Transaction::commit`] is rolled
//! back, so every exit path releases its locks and leaves no partial writes.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod rows;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryDatabase, InMemoryTransaction};
pub use postgres::{PostgresDatabase, PostgresTransaction};
pub use query::OrderQuery;
pub use rows::{
    IdempotencyRecord, IdempotencyScope, IdempotencyStatus, NewOrder, OrderLineRow, OrderRow,
    ProductRow,
};
pub use store::{Database, Transaction};
