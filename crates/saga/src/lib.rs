//! Saga orchestration for the create-and-confirm order flow.
//!
//! The orchestrator runs three remote steps in order:
//! 1. Validate the customer
//! 2. Create the order
//! 3. Confirm the order under the caller's idempotency key
//!
//! Nothing is compensated on failure. A failed confirm leaves a CREATED order
//! that the caller may confirm again or cancel.

pub mod coordinator;
pub mod error;
pub mod services;

pub use coordinator::{CreateAndConfirmOrder, OrderSummary, SagaData, SagaOrchestrator, SagaOutcome};
pub use error::{Result, SagaError, map_status};
pub use services::{
    ConfirmedOrder, CreatedOrder, Customer, CustomerDirectory, HttpCustomerDirectory,
    HttpOrderGateway, InMemoryCustomerDirectory, InMemoryOrderGateway, LineItem, NewOrderRequest,
    OrderGateway, OrderLine,
};
