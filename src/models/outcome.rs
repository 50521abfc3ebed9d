use serde::{Deserialize, Serialize};

use crate::models::features::StructuralFeatures;
use crate::models::regime::RegimeClassification;

/// The thirteen raw values a structural snapshot reduces to. Used as the
/// trade-outcome feature snapshot, the memory fingerprint source, and the
/// meta-controller's similarity vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub momentum: f64,
    pub trend_strength: f64,
    pub implied_vol: f64,
    pub vol_spread: f64,
    pub skew: f64,
    pub pull_direction: f64,
    pub pull_magnitude: f64,
    pub imbalance: f64,
    pub absorption: f64,
    pub hedging_pressure: f64,
    pub dealer_confidence: f64,
    pub regime_confidence: f64,
    pub transition_probability: f64,
}

impl FeatureVector {
    pub const DIM: usize = 13;

    pub fn capture(features: &StructuralFeatures, regime: &RegimeClassification) -> Self {
        Self {
            momentum: features.price_history.momentum,
            trend_strength: features.price_history.trend_strength,
            implied_vol: features.volatility.implied / 100.0,
            vol_spread: features.volatility.spread / 100.0,
            skew: features.volatility.skew / 100.0,
            pull_direction: features.gravitational_pull.direction as f64,
            pull_magnitude: features.gravitational_pull.magnitude,
            imbalance: features.liquidity.imbalance,
            absorption: features.liquidity.absorption_rate,
            hedging_pressure: features.dealer.hedging_pressure,
            dealer_confidence: features.dealer.confidence,
            regime_confidence: regime.confidence,
            transition_probability: regime.transition_probability,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.momentum,
            self.trend_strength,
            self.implied_vol,
            self.vol_spread,
            self.skew,
            self.pull_direction,
            self.pull_magnitude,
            self.imbalance,
            self.absorption,
            self.hedging_pressure,
            self.dealer_confidence,
            self.regime_confidence,
            self.transition_probability,
        ]
    }
}

/// The full record of one completed (simulated) trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub trade_id: String,
    pub strategy_id: String,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Filled notional, account currency.
    pub size: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_period_ms: i64,
    pub max_drawdown: f64,
    pub max_runup: f64,
    pub entry_features: FeatureVector,
    pub exit_features: FeatureVector,
    pub direction_correct: bool,
    pub execution_quality: f64,
    pub timestamp: i64,
}
