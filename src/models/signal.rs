use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::direction::{Direction, FlowDirection};
use crate::models::features::VolRegime;

/// Compact structural context carried on every signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContext {
    pub gamma_level: f64,
    pub liquidity_support: f64,
    pub volatility: VolRegime,
    pub dealer_flow: FlowDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub strategy_id: String,
    pub direction: Direction,
    pub strength: f64,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_price: f64,
    /// One or two target prices, nearest first.
    pub targets: Vec<f64>,
    pub timeframe: String,
    pub rationale: String,
    pub context: SignalContext,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Medium => write!(f, "medium"),
            Urgency::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day,
    Ioc,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Day => write!(f, "day"),
            TimeInForce::Ioc => write!(f, "ioc"),
        }
    }
}

/// Risk metrics computed at approval time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub correlation: f64,
    pub gamma_exposure: f64,
    pub var_contribution: f64,
    pub max_loss: f64,
    pub margin_required: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConstraints {
    pub max_slippage: f64,
    pub urgency: Urgency,
    pub order_type: OrderType,
    pub iceberg_ratio: f64,
    pub time_in_force: TimeInForce,
}

/// A signal that passed risk governance, with sized notional and
/// execution constraints attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedSignal {
    pub signal: Signal,
    /// Approved notional, in account currency.
    pub approved_size: f64,
    pub risk: RiskMetrics,
    pub constraints: ExecutionConstraints,
    pub risk_score: f64,
}
