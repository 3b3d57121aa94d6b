//! Remote service traits with HTTP and in-memory implementations.

pub mod customers;
pub mod orders;

pub use customers::{Customer, CustomerDirectory, HttpCustomerDirectory, InMemoryCustomerDirectory};
pub use orders::{
    ConfirmedOrder, CreatedOrder, HttpOrderGateway, InMemoryOrderGateway, LineItem,
    NewOrderRequest, OrderGateway, OrderLine,
};
