pub mod coherence;
pub mod regime;

use tracing::debug;

use crate::core::ring::RingBuffer;
use crate::models::features::StructuralFeatures;
use crate::models::outcome::FeatureVector;
use crate::models::regime::{
    CoherenceScore, MarketRegime, RegimeCharacteristics, RegimeClassification,
};
use crate::strategies::pool::ActiveStrategy;

use coherence::{FRACTAL_WINDOW, TEMPORAL_WINDOW};
use regime::RegimeInputs;

const REGIME_HISTORY: usize = 100;
const COHERENCE_HISTORY: usize = 100;
const FEATURE_HISTORY: usize = 100;
/// Classifications needed before transition statistics are trusted.
const MIN_TRANSITION_SAMPLES: usize = 10;
const DEFAULT_TRANSITION_PROB: f64 = 0.1;

/// Classifies the market regime and scores coherence. Owns the bounded
/// regime / coherence / per-feature histories that make both paths
/// stateful across ticks.
pub struct MetaController {
    regime_history: RingBuffer<MarketRegime>,
    coherence_history: RingBuffer<f64>,
    momentum_history: RingBuffer<f64>,
    volatility_history: RingBuffer<f64>,
    gamma_history: RingBuffer<f64>,
    liquidity_history: RingBuffer<f64>,
    trend_history: RingBuffer<f64>,
    vector_history: RingBuffer<Vec<f64>>,
}

impl MetaController {
    pub fn new() -> Self {
        Self {
            regime_history: RingBuffer::new(REGIME_HISTORY),
            coherence_history: RingBuffer::new(COHERENCE_HISTORY),
            momentum_history: RingBuffer::new(FEATURE_HISTORY),
            volatility_history: RingBuffer::new(FEATURE_HISTORY),
            gamma_history: RingBuffer::new(FEATURE_HISTORY),
            liquidity_history: RingBuffer::new(FEATURE_HISTORY),
            trend_history: RingBuffer::new(FEATURE_HISTORY),
            vector_history: RingBuffer::new(FRACTAL_WINDOW),
        }
    }

    pub fn classify(&mut self, features: &StructuralFeatures) -> RegimeClassification {
        let inputs = RegimeInputs::from_features(features);
        let regime = regime::classify_regime(&inputs);
        let confidence = regime::confidence_for(regime, &inputs);
        let phase = regime::phase_for(&inputs);

        self.regime_history.push(regime);
        self.momentum_history.push(inputs.momentum);
        self.volatility_history.push(inputs.implied_vol);
        self.gamma_history.push(inputs.gamma_magnitude);
        self.liquidity_history.push(inputs.imbalance);
        self.trend_history.push(inputs.trend_strength);

        let duration = self.current_run_length(regime);
        let transition_probability = self.transition_probability(regime, inputs.vol_of_vol);

        debug!(%regime, confidence, duration, "regime classified");

        RegimeClassification {
            regime,
            confidence,
            duration,
            transition_probability,
            characteristics: RegimeCharacteristics {
                volatility: features.volatility.regime,
                trend: features.price_history.trend,
                momentum: inputs.momentum,
                phase,
            },
        }
    }

    /// Compose the five sub-scores into the tick's coherence. Consumes
    /// the preliminary activations for the alignment and convergence
    /// parts, then records this tick's feature vector and total.
    pub fn coherence(
        &mut self,
        features: &StructuralFeatures,
        regime: &RegimeClassification,
        active: &[ActiveStrategy],
    ) -> CoherenceScore {
        let structural = coherence::structural_score(features);

        let aligned = active
            .iter()
            .filter(|s| s.template.valid_regimes.contains(&regime.regime))
            .count();
        let regime_alignment = coherence::regime_alignment_score(aligned, active.len());

        let recent_momentum = self.momentum_history.recent(TEMPORAL_WINDOW);
        let recent_vol = self.volatility_history.recent(TEMPORAL_WINDOW);
        let temporal = coherence::temporal_score(&recent_momentum, &recent_vol);

        let current = FeatureVector::capture(features, regime).to_vec();
        let fractal = coherence::fractal_score(&current, &self.vector_history.to_vec());
        self.vector_history.push(current);

        let signals: Vec<&crate::models::signal::Signal> =
            active.iter().filter_map(|s| s.signal.as_ref()).collect();
        let convergence = coherence::convergence_score(&signals);

        let score =
            CoherenceScore::compose(structural, regime_alignment, temporal, fractal, convergence);
        self.coherence_history.push(score.total);

        debug!(
            total = score.total,
            structural, regime_alignment, temporal, fractal, convergence, "coherence scored"
        );
        score
    }

    /// Mean coherence over the retained history.
    pub fn average_coherence(&self) -> f64 {
        self.coherence_history.mean()
    }

    /// Mean of each tracked feature history: momentum, implied vol,
    /// gamma magnitude, imbalance, trend strength.
    pub fn feature_means(&self) -> (f64, f64, f64, f64, f64) {
        (
            self.momentum_history.mean(),
            self.volatility_history.mean(),
            self.gamma_history.mean(),
            self.liquidity_history.mean(),
            self.trend_history.mean(),
        )
    }

    /// Run length of the current regime at the tail of history,
    /// including this classification.
    fn current_run_length(&self, regime: MarketRegime) -> usize {
        let mut run = 0;
        for i in (0..self.regime_history.len()).rev() {
            match self.regime_history.get(i) {
                Some(&r) if r == regime => run += 1,
                _ => break,
            }
        }
        run
    }

    /// Entries-into-this-regime over occurrences, boosted by vol-of-vol
    /// and clamped to [0, 0.9].
    fn transition_probability(&self, regime: MarketRegime, vol_of_vol: f64) -> f64 {
        if self.regime_history.len() < MIN_TRANSITION_SAMPLES {
            return DEFAULT_TRANSITION_PROB;
        }
        let history = self.regime_history.to_vec();
        let occurrences = history.iter().filter(|&&r| r == regime).count();
        if occurrences == 0 {
            return DEFAULT_TRANSITION_PROB;
        }
        let entries = history
            .windows(2)
            .filter(|w| w[1] == regime && w[0] != regime)
            .count();
        let base = entries as f64 / occurrences as f64;
        (base + 0.5 * vol_of_vol).clamp(0.0, 0.9)
    }
}
