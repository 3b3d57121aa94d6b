use chrono::{DateTime, Utc};
use common::OrderStatus;

/// Filter and page selection for listing orders.
///
/// Results are always ordered by ascending order id.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    /// Filter by status.
    pub status: Option<OrderStatus>,

    /// Orders created at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Orders created at or before this instant.
    pub to: Option<DateTime<Utc>>,

    /// Number of rows to skip.
    pub offset: i64,

    /// Maximum number of rows to return.
    pub limit: i64,
}

impl OrderQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    /// Creates a query for the first default-sized page.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn created_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn created_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0);
        self
    }

    /// Sets the page size, clamped to `1..=MAX_LIMIT`.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit.clamp(1, Self::MAX_LIMIT);
        self
    }

    /// Offset of the following page, if `returned` filled this one.
    pub fn next_offset(&self, returned: usize) -> Option<i64> {
        if returned as i64 >= self.limit {
            Some(self.offset + returned as i64)
        } else {
            None
        }
    }
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            from: None,
            to: None,
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}
