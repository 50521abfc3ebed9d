use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::numerics::sigmoid;
use crate::models::direction::TrendDirection;
use crate::models::features::VolRegime;

/// The closed set of market regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    TrendingBullish,
    TrendingBearish,
    RangeBound,
    Breakout,
    Breakdown,
    Consolidation,
    HighVolatility,
    LowVolatility,
    GammaSqueeze,
    MeanReversion,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketRegime::TrendingBullish => "trending_bullish",
            MarketRegime::TrendingBearish => "trending_bearish",
            MarketRegime::RangeBound => "range_bound",
            MarketRegime::Breakout => "breakout",
            MarketRegime::Breakdown => "breakdown",
            MarketRegime::Consolidation => "consolidation",
            MarketRegime::HighVolatility => "high_volatility",
            MarketRegime::LowVolatility => "low_volatility",
            MarketRegime::GammaSqueeze => "gamma_squeeze",
            MarketRegime::MeanReversion => "mean_reversion",
        };
        write!(f, "{}", s)
    }
}

impl MarketRegime {
    pub const ALL: [MarketRegime; 10] = [
        MarketRegime::TrendingBullish,
        MarketRegime::TrendingBearish,
        MarketRegime::RangeBound,
        MarketRegime::Breakout,
        MarketRegime::Breakdown,
        MarketRegime::Consolidation,
        MarketRegime::HighVolatility,
        MarketRegime::LowVolatility,
        MarketRegime::GammaSqueeze,
        MarketRegime::MeanReversion,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WyckoffPhase {
    Accumulation,
    Markup,
    Distribution,
    Markdown,
}

impl fmt::Display for WyckoffPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WyckoffPhase::Accumulation => write!(f, "accumulation"),
            WyckoffPhase::Markup => write!(f, "markup"),
            WyckoffPhase::Distribution => write!(f, "distribution"),
            WyckoffPhase::Markdown => write!(f, "markdown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeCharacteristics {
    pub volatility: VolRegime,
    pub trend: TrendDirection,
    pub momentum: f64,
    pub phase: WyckoffPhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub regime: MarketRegime,
    pub confidence: f64,
    /// Consecutive classifications of this same regime, including this one.
    pub duration: usize,
    pub transition_probability: f64,
    pub characteristics: RegimeCharacteristics,
}

/// Named projections of the coherence sub-scores for downstream display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceComponents {
    pub alignment: f64,
    pub stability: f64,
    pub resonance: f64,
    pub agreement: f64,
}

/// Internal self-consistency of market structure and strategy beliefs.
/// `total` is the fixed weighted sum of the five sub-scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceScore {
    pub total: f64,
    pub structural: f64,
    pub regime_alignment: f64,
    pub temporal: f64,
    pub fractal: f64,
    pub convergence: f64,
    pub confidence: f64,
    pub components: CoherenceComponents,
}

impl CoherenceScore {
    pub const W_STRUCTURAL: f64 = 0.30;
    pub const W_REGIME: f64 = 0.25;
    pub const W_TEMPORAL: f64 = 0.20;
    pub const W_FRACTAL: f64 = 0.15;
    pub const W_CONVERGENCE: f64 = 0.10;

    /// Midpoint score used for the first activation pass, before real
    /// coherence exists for the tick.
    pub fn neutral() -> Self {
        Self::compose(0.5, 0.5, 0.5, 0.5, 0.5)
    }

    /// Build a score from the five sub-scores, applying the fixed weights
    /// and the sigmoid confidence.
    pub fn compose(
        structural: f64,
        regime_alignment: f64,
        temporal: f64,
        fractal: f64,
        convergence: f64,
    ) -> Self {
        let total = Self::W_STRUCTURAL * structural
            + Self::W_REGIME * regime_alignment
            + Self::W_TEMPORAL * temporal
            + Self::W_FRACTAL * fractal
            + Self::W_CONVERGENCE * convergence;
        let confidence = sigmoid(2.0 * total - 1.0);
        Self {
            total,
            structural,
            regime_alignment,
            temporal,
            fractal,
            convergence,
            confidence,
            components: CoherenceComponents {
                alignment: structural,
                stability: temporal,
                resonance: fractal,
                agreement: convergence,
            },
        }
    }
}
