use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::core::numerics::clamp;
use crate::core::ring::RingBuffer;
use crate::models::direction::Direction;
use crate::models::features::StructuralFeatures;
use crate::models::regime::{CoherenceScore, MarketRegime, RegimeClassification};
use crate::models::signal::{Signal, SignalContext};
use crate::strategies::templates::{default_templates, StrategyTemplate, StrategyType};

/// Per-template performance records retained.
const PERFORMANCE_HISTORY: usize = 100;
/// Records the recent-performance activation term reads.
const RECENT_WINDOW: usize = 20;
/// Signals weaker than this are suppressed.
const MIN_SIGNAL_STRENGTH: f64 = 0.3;
/// Flip proximity that counts as "at spot" for the gamma-scalp bonus.
const FLIP_PROXIMITY: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub pnl_pct: f64,
    pub win: bool,
}

/// Running record attached to an activation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub trades: usize,
    pub win_rate: f64,
    pub total_pnl_pct: f64,
}

/// Snapshot of the tick context an activation was made under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationContext {
    pub regime: MarketRegime,
    pub regime_confidence: f64,
    pub coherence_total: f64,
    pub spot: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStrategy {
    pub template: StrategyTemplate,
    pub activation_score: f64,
    /// Template parameters after regime adaptation.
    pub parameters: BTreeMap<String, f64>,
    pub context: ActivationContext,
    pub signal: Option<Signal>,
    pub performance: PerformanceSummary,
    pub active: bool,
}

/// Holds the strategy templates, scores them against the tick context,
/// and generates signals for the ones that activate. Strategy behavior
/// dispatches on `StrategyType`; adding a strategy means a new tag plus
/// an arm in each dispatch table.
pub struct StrategyPool {
    templates: Vec<StrategyTemplate>,
    active: HashMap<String, ActiveStrategy>,
    performance: HashMap<String, RingBuffer<PerformanceRecord>>,
    signal_counter: u64,
    max_active: usize,
}

impl StrategyPool {
    pub fn new(max_active: usize) -> Self {
        Self {
            templates: default_templates(),
            active: HashMap::new(),
            performance: HashMap::new(),
            signal_counter: 0,
            max_active,
        }
    }

    /// Register an extra template. Intended for use before the first tick.
    pub fn add_template(&mut self, template: StrategyTemplate) {
        self.templates.retain(|t| t.id != template.id);
        self.templates.push(template);
    }

    pub fn remove_template(&mut self, id: &str) {
        self.templates.retain(|t| t.id != id);
    }

    pub fn templates(&self) -> &[StrategyTemplate] {
        &self.templates
    }

    pub fn active_strategies(&self) -> Vec<&ActiveStrategy> {
        self.active.values().collect()
    }

    /// Score every template valid in the current regime and activate the
    /// ones clearing their threshold, capped by coherence confidence.
    pub fn activate(
        &mut self,
        features: &StructuralFeatures,
        regime: &RegimeClassification,
        coherence: &CoherenceScore,
    ) -> Vec<ActiveStrategy> {
        let cap = self
            .max_active
            .min((20.0 * coherence.confidence).floor() as usize);

        let mut activated: Vec<ActiveStrategy> = Vec::new();
        let templates = self.templates.clone();
        for template in &templates {
            if !template.valid_regimes.contains(&regime.regime) {
                continue;
            }

            let bonus = self.bonus(template, features, coherence);
            let recent = self.recent_performance(&template.id);
            let score = clamp(
                0.3 * regime.confidence + 0.2 * coherence.total + bonus + 0.1 * recent,
                0.0,
                1.0,
            );
            if score < template.activation_threshold {
                debug!(
                    strategy = %template.id,
                    score,
                    threshold = template.activation_threshold,
                    "below activation threshold"
                );
                continue;
            }

            let parameters = adapt_parameters(template, features);
            let signal = self.generate_signal(template, &parameters, features, regime, score);
            activated.push(ActiveStrategy {
                template: template.clone(),
                activation_score: score,
                parameters,
                context: ActivationContext {
                    regime: regime.regime,
                    regime_confidence: regime.confidence,
                    coherence_total: coherence.total,
                    spot: features.spot,
                },
                signal,
                performance: self.performance_summary(&template.id),
                active: true,
            });
        }

        activated.sort_by(|a, b| {
            b.activation_score
                .partial_cmp(&a.activation_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        activated.truncate(cap);

        self.active = activated
            .iter()
            .map(|s| (s.template.id.clone(), s.clone()))
            .collect();
        activated
    }

    /// Append a realized result to the template's running record.
    pub fn record_outcome(&mut self, strategy_id: &str, pnl_pct: f64) {
        self.performance
            .entry(strategy_id.to_string())
            .or_insert_with(|| RingBuffer::new(PERFORMANCE_HISTORY))
            .push(PerformanceRecord {
                pnl_pct,
                win: pnl_pct > 0.0,
            });
    }

    fn performance_summary(&self, strategy_id: &str) -> PerformanceSummary {
        match self.performance.get(strategy_id) {
            Some(history) if !history.is_empty() => {
                let records = history.to_vec();
                let wins = records.iter().filter(|r| r.win).count();
                PerformanceSummary {
                    trades: records.len(),
                    win_rate: wins as f64 / records.len() as f64,
                    total_pnl_pct: records.iter().map(|r| r.pnl_pct).sum(),
                }
            }
            _ => PerformanceSummary::default(),
        }
    }

    /// Win rate over the last 20 records; 0.5 before any history.
    fn recent_performance(&self, strategy_id: &str) -> f64 {
        match self.performance.get(strategy_id) {
            Some(history) if !history.is_empty() => {
                let recent = history.recent(RECENT_WINDOW);
                recent.iter().filter(|r| r.win).count() as f64 / recent.len() as f64
            }
            _ => 0.5,
        }
    }

    /// Hand-calibrated per-type activation bonus, ceiling around 0.5.
    fn bonus(
        &self,
        template: &StrategyTemplate,
        features: &StructuralFeatures,
        coherence: &CoherenceScore,
    ) -> f64 {
        let p = |key: &str, default: f64| param(&template.parameters, key, default);
        let momentum = features.price_history.momentum;
        let trend_strength = features.price_history.trend_strength;
        let iv = features.volatility.implied;
        let spot = features.spot;

        match template.strategy_type {
            StrategyType::GammaScalp => {
                let mut b = 0.0;
                if features.gravitational_pull.magnitude > p("min_concentration", 0.3) {
                    b += 0.3;
                }
                if spot > 0.0
                    && features
                        .gamma_flips
                        .iter()
                        .any(|f| (f.price - spot).abs() / spot < FLIP_PROXIMITY)
                {
                    b += 0.2;
                }
                b
            }
            StrategyType::MomentumFollow => {
                let mut b = 0.0;
                if momentum.abs() > p("min_momentum", 0.01) {
                    b += 0.25;
                }
                if trend_strength > p("min_trend_strength", 0.5) {
                    b += 0.25;
                }
                b
            }
            StrategyType::MeanReversion => {
                let mut b = 0.0;
                if iv > 25.0 && momentum.abs() < 0.01 {
                    b += 0.3;
                }
                if trend_strength > 0.6 {
                    b += 0.2;
                }
                b
            }
            StrategyType::VolatilityExpansion => {
                let mut b = 0.0;
                if features.volatility.spread > 5.0 {
                    b += 0.25;
                }
                if features.volatility.vol_of_vol > 0.2 {
                    b += 0.25;
                }
                b
            }
            StrategyType::VolatilityContraction => {
                let mut b = 0.0;
                // An unobserved vol is missing data, not a quiet market
                if iv > 0.0 && iv < p("max_iv", 20.0) {
                    b += 0.3;
                }
                if features.volatility.spread < 0.0 {
                    b += 0.2;
                }
                b
            }
            StrategyType::LiquidityHunt => {
                let mut b = 0.0;
                if features.liquidity.imbalance.abs() > 0.3 {
                    b += 0.25;
                }
                let pocket = p("min_pocket", 100.0);
                let proximity = p("proximity", 0.005);
                if spot > 0.0
                    && features
                        .liquidity
                        .levels
                        .iter()
                        .any(|l| l.size >= pocket && (l.price - spot).abs() / spot < proximity)
                {
                    b += 0.25;
                }
                b
            }
            StrategyType::FlowAlignment => {
                let mut b = 0.0;
                if features.dealer.hedging_pressure.abs() > p("min_pressure", 1_000.0) {
                    b += 0.25;
                }
                if features.gamma_surface.net_gamma.abs() > p("gamma_threshold", 1e6) {
                    b += 0.25;
                }
                b
            }
            StrategyType::StructuralBreak => {
                let mut b = 0.0;
                if trend_strength > p("min_trend_strength", 0.5) {
                    b += 0.25;
                }
                if features.volatility.vol_of_vol > 0.2 {
                    b += 0.25;
                }
                b
            }
            StrategyType::PatternRecognition => 0.25,
            StrategyType::FractalResonance => {
                let res = p("resonance_threshold", 0.7);
                let mut b = 0.0;
                if coherence.temporal > res {
                    b += 0.3;
                }
                if coherence.fractal > res {
                    b += 0.2;
                }
                b
            }
        }
    }

    /// Per-type signal generation. Returns None when the derived
    /// direction is neutral or the strength is below the floor.
    fn generate_signal(
        &mut self,
        template: &StrategyTemplate,
        parameters: &BTreeMap<String, f64>,
        features: &StructuralFeatures,
        regime: &RegimeClassification,
        activation_score: f64,
    ) -> Option<Signal> {
        let entry = features.spot;
        if entry <= 0.0 {
            return None;
        }
        let p = |key: &str, default: f64| param(parameters, key, default);

        let (direction, strength, stop_frac, target_frac, note) = match template.strategy_type {
            StrategyType::GammaScalp => {
                let direction = Direction::from_sign(features.gravitational_pull.direction as f64);
                (
                    direction,
                    features.gravitational_pull.magnitude,
                    p("stop_loss", 0.005),
                    p("target_profit", 0.01),
                    format!(
                        "gamma pull {} mag {:.2}",
                        features.gravitational_pull.direction, features.gravitational_pull.magnitude
                    ),
                )
            }
            StrategyType::MomentumFollow => {
                let momentum = features.price_history.momentum;
                let trailing = p("trailing_stop", 0.01);
                (
                    Direction::from_sign(momentum),
                    clamp(20.0 * momentum.abs(), 0.0, 1.0),
                    trailing,
                    trailing * p("target_multiple", 2.0),
                    format!("momentum {:+.4} trailing {:.3}", momentum, trailing),
                )
            }
            StrategyType::MeanReversion => {
                // Fade a strong trend with widened stops
                if features.price_history.trend_strength <= 0.6 {
                    return None;
                }
                let direction = features.price_history.trend.to_direction().opposite();
                (
                    direction,
                    features.price_history.trend_strength,
                    p("stop_loss", 0.01) * p("stop_loss_multiple", 1.0),
                    p("target_profit", 0.015),
                    format!(
                        "fading {} trend str {:.2}",
                        features.price_history.trend, features.price_history.trend_strength
                    ),
                )
            }
            StrategyType::FlowAlignment => {
                if features.dealer.confidence <= 0.5 {
                    return None;
                }
                (
                    features.dealer.flow_direction.to_direction(),
                    features.dealer.confidence,
                    p("stop_loss", 0.01),
                    p("target_profit", 0.02),
                    format!(
                        "dealer {} conf {:.2}",
                        features.dealer.flow_direction, features.dealer.confidence
                    ),
                )
            }
            _ => {
                // Default path reads the regime characteristics
                let direction = regime.characteristics.trend.to_direction();
                (
                    direction,
                    clamp(
                        regime.confidence * features.price_history.trend_strength,
                        0.0,
                        1.0,
                    ),
                    p("stop_loss", 0.01),
                    p("target_profit", 0.02),
                    format!("{} {}", regime.regime, regime.characteristics.phase),
                )
            }
        };

        if direction == Direction::Neutral || strength < MIN_SIGNAL_STRENGTH {
            return None;
        }

        let sign = direction.sign();
        let stop_price = entry * (1.0 - sign * stop_frac);
        let target = entry * (1.0 + sign * target_frac);
        let mut targets = vec![target];
        if strength > 0.6 {
            targets.push(entry * (1.0 + sign * target_frac * 2.0));
        }

        self.signal_counter += 1;
        let confidence = clamp(0.5 * strength + 0.5 * activation_score, 0.0, 1.0);
        let rationale = format!(
            "[{}] {} @ {:.2} | {} | regime {} conf {:.2} | stop {:.2} target {:.2}",
            template.id,
            direction.as_str().to_uppercase(),
            entry,
            note,
            regime.regime,
            regime.confidence,
            stop_price,
            target,
        );

        Some(Signal {
            id: format!("sig-{}", self.signal_counter),
            strategy_id: template.id.clone(),
            direction,
            strength,
            confidence,
            entry_price: entry,
            stop_price,
            targets,
            timeframe: template.timeframe.clone(),
            rationale,
            context: SignalContext {
                gamma_level: features.gamma_surface.net_gamma,
                liquidity_support: features.liquidity.depth,
                volatility: features.volatility.regime,
                dealer_flow: features.dealer.flow_direction,
            },
            timestamp: features.timestamp,
        })
    }
}

/// Widen or tighten the price-distance parameters for the prevailing
/// volatility regime.
fn adapt_parameters(
    template: &StrategyTemplate,
    features: &StructuralFeatures,
) -> BTreeMap<String, f64> {
    let multiplier = features.volatility.regime.adaptation_multiplier();
    let mut parameters = template.parameters.clone();
    for key in ["stop_loss", "trailing_stop", "target_profit"] {
        if let Some(v) = parameters.get_mut(key) {
            *v *= multiplier;
        }
    }
    parameters
}

fn param(parameters: &BTreeMap<String, f64>, key: &str, default: f64) -> f64 {
    parameters.get(key).copied().unwrap_or(default)
}
