use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::direction::Direction;
use crate::models::signal::OrderType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Submitted,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Submitted => write!(f, "submitted"),
            OrderStatus::Partial => write!(f, "partial"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub signal_id: String,
    pub direction: Direction,
    pub order_type: OrderType,
    /// Requested notional, account currency.
    pub size: f64,
    pub price: f64,
    pub status: OrderStatus,
    /// Filled notional.
    pub filled_size: f64,
    pub fill_price: f64,
    pub fees: f64,
    pub submitted_at: i64,
    pub filled_at: Option<i64>,
}

/// An order plus what the simulator observed while working it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub order: Order,
    /// Realized slippage as a fraction of the requested price.
    pub slippage: f64,
    pub latency_ms: f64,
    pub market_impact: f64,
    pub success: bool,
    pub error: Option<String>,
}
