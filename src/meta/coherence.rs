use crate::core::numerics::{clamp, cosine_similarity, std_dev};
use crate::models::direction::{Direction, FlowDirection, TrendDirection};
use crate::models::features::{StructuralFeatures, VolRegime};
use crate::models::signal::Signal;

/// Hedging pressure above this is treated as materially active.
const HEDGING_ACTIVE: f64 = 1e3;
/// Samples of momentum / realized-vol history the temporal score reads.
pub const TEMPORAL_WINDOW: usize = 20;
/// Historical feature vectors the fractal score compares against.
pub const FRACTAL_WINDOW: usize = 50;

/// Average of four structure alignments. The gamma and flow checks are
/// strict booleans; the imbalance check half-credits a zero reading and
/// the hedging check caps out at half credit.
pub fn structural_score(features: &StructuralFeatures) -> f64 {
    let trend = features.price_history.trend;
    let momentum = features.price_history.momentum;

    // Gamma pull vs price trend
    let gamma_align = match (features.gravitational_pull.direction, trend) {
        (1, TrendDirection::Up) | (-1, TrendDirection::Down) => 1.0,
        _ => 0.0,
    };

    // Book imbalance vs momentum sign
    let imbalance = features.liquidity.imbalance;
    let imbalance_align = if imbalance == 0.0 || momentum == 0.0 {
        0.5
    } else if imbalance.signum() == momentum.signum() {
        1.0
    } else {
        0.0
    };

    // Dealer flow vs trend; neutral flow counts as aligned
    let flow_align = match (features.dealer.flow_direction, trend) {
        (FlowDirection::Neutral, _) => 1.0,
        (FlowDirection::Buying, TrendDirection::Up) => 1.0,
        (FlowDirection::Selling, TrendDirection::Down) => 1.0,
        _ => 0.0,
    };

    // Hedging pressure magnitude consistent with a non-low vol regime
    let pressure_active = features.dealer.hedging_pressure.abs() > HEDGING_ACTIVE;
    let vol_active = features.volatility.regime != VolRegime::Low;
    let pressure_align = if pressure_active == vol_active { 0.5 } else { 0.0 };

    (gamma_align + imbalance_align + flow_align + pressure_align) / 4.0
}

/// Fraction of active strategies whose valid regimes contain the
/// current regime; 0.5 with no active strategies.
pub fn regime_alignment_score(aligned: usize, total: usize) -> f64 {
    if total == 0 {
        0.5
    } else {
        aligned as f64 / total as f64
    }
}

/// Stability of recent momentum and realized vol: low dispersion scores
/// high. A series too short to have a dispersion scores the midpoint.
pub fn temporal_score(recent_momentum: &[f64], recent_vol: &[f64]) -> f64 {
    let part = |xs: &[f64], scale: f64| {
        if xs.len() < 2 {
            0.5
        } else {
            1.0 - clamp(scale * std_dev(xs), 0.0, 1.0)
        }
    };
    (part(recent_momentum, 10.0) + part(recent_vol, 5.0)) / 2.0
}

/// Best cosine match between the current feature vector and recent
/// history; 0.5 with no history yet.
pub fn fractal_score(current: &[f64], history: &[Vec<f64>]) -> f64 {
    if history.is_empty() {
        return 0.5;
    }
    history
        .iter()
        .map(|past| cosine_similarity(current, past))
        .fold(f64::NEG_INFINITY, f64::max)
        .max(0.0)
}

/// Largest fraction of signals agreeing on a direction; 0.5 with fewer
/// than two signals.
pub fn convergence_score(signals: &[&Signal]) -> f64 {
    if signals.len() < 2 {
        return 0.5;
    }
    let total = signals.len() as f64;
    [Direction::Long, Direction::Short, Direction::Neutral]
        .iter()
        .map(|&d| signals.iter().filter(|s| s.direction == d).count() as f64 / total)
        .fold(0.0, f64::max)
}
