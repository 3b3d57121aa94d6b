use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// ```text
/// CREATED ──► CONFIRMED ──► CANCELED (within the reversal window)
///    │                          ▲
///    └──────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    Confirmed,
    Canceled,
}

impl OrderStatus {
    /// Returns true if the order can move to CONFIRMED.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Canceled)
    }

    /// Returns the persisted name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown order status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(OrderStatus::Created),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELED" => Ok(OrderStatus::Canceled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
