//! Customer directory trait with HTTP and in-memory implementations.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::CustomerId;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Public fields of a customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Customer {
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(id),
            name: name.into(),
            email: email.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Looks up customers by id.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Returns `None` when the customer does not exist.
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, SagaError>;
}

/// Calls `GET {base}/internal/customers/{id}` with the service token.
#[derive(Debug, Clone)]
pub struct HttpCustomerDirectory {
    client: Client,
    base_url: String,
    service_token: String,
}

impl HttpCustomerDirectory {
    pub fn new(client: Client, base_url: impl Into<String>, service_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_token: service_token.into(),
        }
    }
}

#[async_trait]
impl CustomerDirectory for HttpCustomerDirectory {
    #[tracing::instrument(skip(self))]
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, SagaError> {
        let response = self
            .client
            .get(format!("{}/internal/customers/{}", self.base_url, id))
            .bearer_auth(&self.service_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Customer>().await?)),
            status => {
                tracing::warn!(status = status.as_u16(), "customer lookup failed");
                Err(SagaError::CustomerService(status.as_u16()))
            }
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryCustomerState {
    customers: HashMap<CustomerId, Customer>,
    lookups: usize,
    fail_on_lookup: bool,
}

/// In-memory customer directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerDirectory {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a customer.
    pub fn add_customer(&self, customer: Customer) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.customers.insert(customer.id, customer);
    }

    /// Makes every following lookup fail as if the service answered 503.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_lookup = fail;
    }

    /// Returns the number of lookups made so far.
    pub fn lookup_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookups
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>, SagaError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.lookups += 1;

        if state.fail_on_lookup {
            return Err(SagaError::CustomerService(503));
        }
        Ok(state.customers.get(&id).cloned())
    }
}
