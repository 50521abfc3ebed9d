use crate::core::numerics::clamp;
use crate::models::features::StructuralFeatures;
use crate::models::regime::{MarketRegime, WyckoffPhase};

/// The ten features the regime cascade reads, extracted once per tick.
/// `implied_vol` is a fraction here (0.40 = 40 vol points).
#[derive(Debug, Clone, Copy)]
pub struct RegimeInputs {
    pub momentum: f64,
    pub trend_strength: f64,
    pub implied_vol: f64,
    pub vol_of_vol: f64,
    pub vol_spread: f64,
    pub skew: f64,
    pub gamma_direction: f64,
    pub gamma_magnitude: f64,
    pub net_gamma: f64,
    pub imbalance: f64,
    pub absorption: f64,
}

impl RegimeInputs {
    pub fn from_features(features: &StructuralFeatures) -> Self {
        Self {
            momentum: features.price_history.momentum,
            trend_strength: features.price_history.trend_strength,
            implied_vol: features.volatility.implied / 100.0,
            vol_of_vol: features.volatility.vol_of_vol,
            vol_spread: features.volatility.spread,
            skew: features.volatility.skew,
            gamma_direction: features.gravitational_pull.direction as f64,
            gamma_magnitude: features.gravitational_pull.magnitude,
            net_gamma: features.gamma_surface.net_gamma,
            imbalance: features.liquidity.imbalance,
            absorption: features.liquidity.absorption_rate,
        }
    }
}

/// A reading below 5 vol points means there is no usable vol data, not
/// a quiet market; the low-vol rule must not fire on it.
const MIN_OBSERVED_VOL: f64 = 0.05;

/// Rule-ordered cascade; the first matching rule wins.
pub fn classify_regime(x: &RegimeInputs) -> MarketRegime {
    if x.implied_vol > 0.40 {
        return MarketRegime::HighVolatility;
    }
    if x.implied_vol >= MIN_OBSERVED_VOL && x.implied_vol < 0.15 {
        return MarketRegime::LowVolatility;
    }
    if x.gamma_magnitude > 0.7 && x.net_gamma.abs() > 1e6 {
        return MarketRegime::GammaSqueeze;
    }
    if x.momentum > 0.02 && x.trend_strength > 0.6 {
        return MarketRegime::TrendingBullish;
    }
    if x.momentum < -0.02 && x.trend_strength > 0.6 {
        return MarketRegime::TrendingBearish;
    }
    if x.vol_of_vol > 0.3 && x.momentum > 0.01 {
        return MarketRegime::Breakout;
    }
    if x.vol_of_vol > 0.3 && x.momentum < -0.01 {
        return MarketRegime::Breakdown;
    }
    if x.momentum.abs() < 0.005 && x.implied_vol > 0.2 {
        return MarketRegime::MeanReversion;
    }
    if x.trend_strength < 0.3 && x.momentum.abs() < 0.01 {
        return MarketRegime::RangeBound;
    }
    if x.implied_vol < 0.2 && x.trend_strength < 0.4 {
        return MarketRegime::Consolidation;
    }
    MarketRegime::RangeBound
}

/// Regime-specific confidence, bounded to [0, 1].
pub fn confidence_for(regime: MarketRegime, x: &RegimeInputs) -> f64 {
    let raw = match regime {
        MarketRegime::TrendingBullish | MarketRegime::TrendingBearish => {
            0.5 + 0.3 * clamp(10.0 * x.momentum.abs(), 0.0, 1.0) + 0.2 * x.trend_strength
        }
        MarketRegime::HighVolatility => 0.5 + 0.5 * clamp(x.implied_vol - 0.3, 0.0, 1.0),
        MarketRegime::LowVolatility => {
            0.5 + 0.5 * clamp((0.15 - x.implied_vol) / 0.15, 0.0, 1.0)
        }
        MarketRegime::GammaSqueeze => {
            0.5 + 0.3 * clamp(x.gamma_magnitude, 0.0, 1.0)
                + 0.2 * clamp(x.net_gamma.abs() / 5e6, 0.0, 1.0)
        }
        MarketRegime::Breakout | MarketRegime::Breakdown => {
            0.5 + 0.3 * clamp(x.vol_of_vol, 0.0, 1.0)
                + 0.2 * clamp(20.0 * x.momentum.abs(), 0.0, 1.0)
        }
        MarketRegime::MeanReversion => 0.5 + 0.5 * clamp(x.implied_vol - 0.2, 0.0, 1.0),
        MarketRegime::RangeBound => {
            0.5 + 0.3 * clamp(1.0 - x.trend_strength, 0.0, 1.0)
                + 0.2 * clamp(1.0 - 100.0 * x.momentum.abs(), 0.0, 1.0)
        }
        MarketRegime::Consolidation => {
            0.5 + 0.3 * clamp((0.2 - x.implied_vol) / 0.2, 0.0, 1.0)
                + 0.2 * clamp(1.0 - x.trend_strength, 0.0, 1.0)
        }
    };
    clamp(raw, 0.0, 1.0)
}

/// Wyckoff phase from momentum, trend strength, and book imbalance.
pub fn phase_for(x: &RegimeInputs) -> WyckoffPhase {
    if x.momentum > 0.01 && x.trend_strength > 0.5 {
        return WyckoffPhase::Markup;
    }
    if x.momentum < -0.01 && x.trend_strength > 0.5 {
        return WyckoffPhase::Markdown;
    }
    if x.imbalance > 0.2 && x.momentum.abs() < 0.01 {
        return WyckoffPhase::Accumulation;
    }
    if x.imbalance < -0.2 && x.momentum.abs() < 0.01 {
        return WyckoffPhase::Distribution;
    }
    if x.momentum >= 0.0 {
        WyckoffPhase::Markup
    } else {
        WyckoffPhase::Markdown
    }
}
