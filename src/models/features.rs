use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::direction::{FlowDirection, TrendDirection};

/// Aggregated option gamma across strikes x expiries. `values` is indexed
/// `[expiry][strike]` and its dimensions always equal
/// `expiries.len() x strikes.len()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GammaSurface {
    pub strikes: Vec<f64>,
    pub expiries: Vec<i64>,
    pub values: Vec<Vec<f64>>,
    pub min_gamma: f64,
    pub max_gamma: f64,
    pub net_gamma: f64,
}

impl GammaSurface {
    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty() || self.expiries.is_empty()
    }

    /// max - min of the aggregated cell values.
    pub fn range(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_gamma - self.min_gamma
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    PositiveToNegative,
    NegativeToPositive,
}

impl fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlipDirection::PositiveToNegative => write!(f, "positive_to_negative"),
            FlipDirection::NegativeToPositive => write!(f, "negative_to_positive"),
        }
    }
}

/// A strike at which aggregated gamma changes sign within one expiry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GammaFlip {
    pub price: f64,
    pub strength: f64,
    pub direction: FlipDirection,
    pub expiry: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttractorKind {
    GammaMax,
}

/// A strike concentration treated as a price-attracting point mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attractor {
    pub price: f64,
    pub strength: f64,
    pub kind: AttractorKind,
}

/// Net gamma-weighted attraction of price toward strike concentrations.
/// `direction` is -1, 0, or +1; `magnitude` is in [0, 1]; at most ten
/// attractors, strongest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GravitationalPull {
    pub direction: i8,
    pub magnitude: f64,
    pub attractors: Vec<Attractor>,
}

/// One resting book level annotated with observed flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityLevel {
    pub price: f64,
    pub size: f64,
    pub side: crate::models::market::BookSide,
    pub flow_rate: f64,
    pub persistence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityMap {
    pub levels: Vec<LiquidityLevel>,
    /// (bidVol - askVol) / (bidVol + askVol), in [-1, 1].
    pub imbalance: f64,
    /// Total resting size within 1% of mid, both sides.
    pub depth: f64,
    /// Recent traded volume relative to resting book volume.
    pub absorption_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolRegime {
    Low,
    Normal,
    Elevated,
    High,
    Extreme,
}

impl fmt::Display for VolRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolRegime::Low => write!(f, "low"),
            VolRegime::Normal => write!(f, "normal"),
            VolRegime::Elevated => write!(f, "elevated"),
            VolRegime::High => write!(f, "high"),
            VolRegime::Extreme => write!(f, "extreme"),
        }
    }
}

impl VolRegime {
    /// Parameter multiplier applied when adapting stop/target widths.
    pub fn adaptation_multiplier(&self) -> f64 {
        match self {
            VolRegime::Low => 1.2,
            VolRegime::Normal => 1.0,
            VolRegime::Elevated => 0.8,
            VolRegime::High => 0.5,
            VolRegime::Extreme => 0.25,
        }
    }
}

/// Volatility snapshot. `historical` and `implied` are annualized
/// percentages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityState {
    pub regime: VolRegime,
    pub historical: f64,
    pub implied: f64,
    pub spread: f64,
    pub vol_of_vol: f64,
    pub skew: f64,
    pub term_structure: f64,
}

impl Default for VolatilityState {
    fn default() -> Self {
        Self {
            regime: VolRegime::Low,
            historical: 0.0,
            implied: 0.0,
            spread: 0.0,
            vol_of_vol: 0.0,
            skew: 0.0,
            term_structure: 0.0,
        }
    }
}

/// Inferred dealer book positioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealerPositioning {
    pub net_gamma_exposure: f64,
    pub net_delta_exposure: f64,
    pub hedging_pressure: f64,
    pub flow_direction: FlowDirection,
    pub confidence: f64,
}

impl Default for DealerPositioning {
    fn default() -> Self {
        Self {
            net_gamma_exposure: 0.0,
            net_delta_exposure: 0.0,
            hedging_pressure: 0.0,
            flow_direction: FlowDirection::Neutral,
            confidence: 0.0,
        }
    }
}

/// Bounded window of recent closes with derived trend measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub closes: Vec<f64>,
    pub momentum: f64,
    pub trend: TrendDirection,
    pub trend_strength: f64,
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self {
            closes: Vec::new(),
            momentum: 0.0,
            trend: TrendDirection::Sideways,
            trend_strength: 0.0,
        }
    }
}

/// Everything Perception produces from one bundle. Immutable after
/// production; later phases consume it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralFeatures {
    pub timestamp: i64,
    pub spot: f64,
    pub gamma_surface: GammaSurface,
    pub gamma_flips: Vec<GammaFlip>,
    pub gravitational_pull: GravitationalPull,
    pub liquidity: LiquidityMap,
    pub volatility: VolatilityState,
    pub dealer: DealerPositioning,
    pub price_history: PriceHistory,
}

impl StructuralFeatures {
    pub fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            spot: 0.0,
            gamma_surface: GammaSurface::default(),
            gamma_flips: Vec::new(),
            gravitational_pull: GravitationalPull::default(),
            liquidity: LiquidityMap::default(),
            volatility: VolatilityState::default(),
            dealer: DealerPositioning::default(),
            price_history: PriceHistory::default(),
        }
    }
}
