use tracing::debug;

use crate::core::dealer::DealerAnalyzer;
use crate::core::gamma::GammaAnalyzer;
use crate::core::liquidity::LiquidityMapper;
use crate::core::numerics::{self, finite_or_zero};
use crate::core::ring::RingBuffer;
use crate::core::volatility::VolatilityAnalyzer;
use crate::models::direction::TrendDirection;
use crate::models::features::{PriceHistory, StructuralFeatures};
use crate::models::market::MarketBundle;

/// Closes exposed on the price-history snapshot.
const HISTORY_WINDOW: usize = 100;
/// Momentum EMA periods.
const EMA_FAST: usize = 10;
const EMA_SLOW: usize = 30;
/// Momentum beyond which the trend label leaves sideways.
const TREND_EPSILON: f64 = 0.005;
const ANNUALIZATION_DAYS: f64 = 252.0;

/// Turns a raw market bundle into one structural-features snapshot.
/// Owns the bounded price / volume / realized-vol buffers that persist
/// across ticks. Missing inputs degrade to sentinel defaults; a tick
/// never fails.
pub struct Perception {
    price_buffer: RingBuffer<f64>,
    volume_buffer: RingBuffer<f64>,
    realized_vol: RingBuffer<f64>,
    last_bar_ts: i64,
    gamma: GammaAnalyzer,
    liquidity: LiquidityMapper,
    volatility: VolatilityAnalyzer,
    dealer: DealerAnalyzer,
}

impl Perception {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            price_buffer: RingBuffer::new(buffer_capacity),
            volume_buffer: RingBuffer::new(buffer_capacity),
            realized_vol: RingBuffer::new(buffer_capacity),
            last_bar_ts: i64::MIN,
            gamma: GammaAnalyzer::new(),
            liquidity: LiquidityMapper::new(),
            volatility: VolatilityAnalyzer::new(),
            dealer: DealerAnalyzer::new(),
        }
    }

    pub fn perceive(&mut self, bundle: &MarketBundle) -> StructuralFeatures {
        self.ingest_bars(bundle);

        let spot = finite_or_zero(bundle.spot());
        let surface = self.gamma.build_surface(&bundle.chain);
        let flips = self.gamma.find_flips(&surface);
        let pull = self.gamma.gravitational_pull(&surface, spot);
        let liquidity = self.liquidity.map(&bundle.fast.book, &bundle.fast.prints);

        let closes = self.price_buffer.to_vec();
        let rets = numerics::log_returns(&closes);
        let realized = numerics::std_dev(&rets) * ANNUALIZATION_DAYS.sqrt();
        self.realized_vol.push(finite_or_zero(realized));
        let volatility =
            self.volatility
                .analyze(&closes, &bundle.chain, &self.realized_vol.to_vec());

        let dealer = self.dealer.analyze(&bundle.chain, &surface);
        let price_history = self.price_history();

        debug!(
            spot,
            net_gamma = surface.net_gamma,
            imbalance = liquidity.imbalance,
            iv = volatility.implied,
            "perception snapshot"
        );

        let mut features = StructuralFeatures {
            timestamp: bundle.timestamp,
            spot,
            gamma_surface: surface,
            gamma_flips: flips,
            gravitational_pull: pull,
            liquidity,
            volatility,
            dealer,
            price_history,
        };
        sanitize(&mut features);
        features
    }

    /// Mean of the retained volume observations.
    pub fn average_volume(&self) -> f64 {
        self.volume_buffer.mean()
    }

    fn ingest_bars(&mut self, bundle: &MarketBundle) {
        for bar in &bundle.fast.bars {
            if bar.timestamp > self.last_bar_ts {
                self.price_buffer.push(finite_or_zero(bar.close));
                self.volume_buffer.push(finite_or_zero(bar.volume));
                self.last_bar_ts = bar.timestamp;
            }
        }
    }

    fn price_history(&self) -> PriceHistory {
        let window: Vec<f64> = {
            let mut recent = self.price_buffer.recent(HISTORY_WINDOW);
            recent.reverse(); // oldest -> newest
            recent
        };
        if window.len() < 2 {
            return PriceHistory {
                closes: window,
                ..PriceHistory::default()
            };
        }

        let ema_fast = numerics::ema(&window, EMA_FAST);
        let ema_slow = numerics::ema(&window, EMA_SLOW);
        let momentum = if ema_slow == 0.0 {
            0.0
        } else {
            (ema_fast - ema_slow) / ema_slow
        };

        let trend = if momentum > TREND_EPSILON {
            TrendDirection::Up
        } else if momentum < -TREND_EPSILON {
            TrendDirection::Down
        } else {
            TrendDirection::Sideways
        };

        let latest = *window.last().unwrap();
        let lo = window.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let half_range = (hi - lo) / 2.0;
        let trend_strength = if half_range == 0.0 {
            0.0
        } else {
            ((latest - (lo + hi) / 2.0).abs() / half_range).min(1.0)
        };

        PriceHistory {
            closes: window,
            momentum: finite_or_zero(momentum),
            trend,
            trend_strength: finite_or_zero(trend_strength),
        }
    }
}

/// Boundary guard: every scalar leaving Perception is finite.
fn sanitize(features: &mut StructuralFeatures) {
    let s = &mut features.gamma_surface;
    s.min_gamma = finite_or_zero(s.min_gamma);
    s.max_gamma = finite_or_zero(s.max_gamma);
    s.net_gamma = finite_or_zero(s.net_gamma);

    features.gravitational_pull.magnitude = finite_or_zero(features.gravitational_pull.magnitude);

    let l = &mut features.liquidity;
    l.imbalance = finite_or_zero(l.imbalance);
    l.depth = finite_or_zero(l.depth);
    l.absorption_rate = finite_or_zero(l.absorption_rate);

    let v = &mut features.volatility;
    v.historical = finite_or_zero(v.historical);
    v.implied = finite_or_zero(v.implied);
    v.spread = finite_or_zero(v.spread);
    v.vol_of_vol = finite_or_zero(v.vol_of_vol);
    v.skew = finite_or_zero(v.skew);
    v.term_structure = finite_or_zero(v.term_structure);

    let d = &mut features.dealer;
    d.net_gamma_exposure = finite_or_zero(d.net_gamma_exposure);
    d.net_delta_exposure = finite_or_zero(d.net_delta_exposure);
    d.hedging_pressure = finite_or_zero(d.hedging_pressure);
    d.confidence = finite_or_zero(d.confidence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::features::VolRegime;
    use crate::test_helpers::{bundle_with_chain, bundle_with_closes, squeeze_chain};

    #[test]
    fn empty_bundle_produces_default_features() {
        let mut perception = Perception::new(100);
        let bundle = MarketBundle::empty("TEST", 1_000);
        let features = perception.perceive(&bundle);

        assert_eq!(features.spot, 0.0);
        assert!(features.gamma_surface.is_empty());
        assert!(features.gamma_flips.is_empty());
        assert_eq!(features.gravitational_pull.direction, 0);
        assert_eq!(features.volatility.regime, VolRegime::Low);
        assert_eq!(features.price_history.trend, TrendDirection::Sideways);
    }

    #[test]
    fn flat_prices_have_no_momentum() {
        let mut perception = Perception::new(100);
        let closes = vec![100.0; 30];
        let features = perception.perceive(&bundle_with_closes(&closes));

        assert_eq!(features.price_history.momentum, 0.0);
        assert_eq!(features.price_history.trend, TrendDirection::Sideways);
        assert_eq!(features.price_history.trend_strength, 0.0);
        assert!((features.spot - 100.0).abs() < 1e-9);
    }

    #[test]
    fn steady_uptrend_is_detected() {
        let mut perception = Perception::new(100);
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
        let features = perception.perceive(&bundle_with_closes(&closes));

        assert!(features.price_history.momentum > 0.02);
        assert_eq!(features.price_history.trend, TrendDirection::Up);
        assert!(features.price_history.trend_strength > 0.6);
    }

    #[test]
    fn bars_are_ingested_once_across_ticks() {
        let mut perception = Perception::new(100);
        let closes = vec![100.0, 101.0, 102.0];
        let bundle = bundle_with_closes(&closes);
        perception.perceive(&bundle);
        perception.perceive(&bundle); // same bars again

        assert_eq!(perception.price_buffer.len(), 3);
    }

    #[test]
    fn chain_produces_surface_and_dealer_estimate() {
        let mut perception = Perception::new(100);
        let bundle = bundle_with_chain(&[100.0; 30], squeeze_chain(100.0));
        let features = perception.perceive(&bundle);

        assert!(!features.gamma_surface.is_empty());
        assert!(features.gamma_surface.net_gamma > 0.0);
        assert!(features.dealer.confidence > 0.0);
    }

    #[test]
    fn all_outputs_are_finite() {
        let mut perception = Perception::new(100);
        let features = perception.perceive(&MarketBundle::empty("TEST", 0));
        assert!(features.spot.is_finite());
        assert!(features.volatility.implied.is_finite());
        assert!(features.liquidity.imbalance.is_finite());
        assert!(features.dealer.hedging_pressure.is_finite());
    }
}
