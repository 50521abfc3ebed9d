use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::core::numerics::{self, clamp};
use crate::core::ring::RingBuffer;
use crate::models::features::StructuralFeatures;
use crate::models::order::ExecutionResult;
use crate::models::outcome::{FeatureVector, TradeOutcome};
use crate::models::regime::RegimeClassification;
use crate::models::signal::ApprovedSignal;

/// Outcomes retained.
const OUTCOME_CAPACITY: usize = 10_000;
/// Parameter versions retained per strategy.
const MAX_EVOLUTION_VERSIONS: usize = 50;
/// Adjustment suggestions retained.
const MAX_SUGGESTIONS: usize = 100;
/// Outcomes feeding the recent-performance mean.
const RECENT_WINDOW: usize = 20;
/// Equity-curve seed for drawdown rollups.
const EQUITY_SEED: f64 = 100_000.0;
const ANNUALIZATION: f64 = 15.874_507_866_387_544; // sqrt(252)

/// The eight features whose importance is tracked, with their index in
/// the thirteen-value feature vector.
const IMPORTANCE_FEATURES: [(&str, usize); 8] = [
    ("momentum", 0),
    ("trend_strength", 1),
    ("implied_vol", 2),
    ("vol_spread", 3),
    ("pull_magnitude", 6),
    ("imbalance", 7),
    ("absorption", 8),
    ("hedging_pressure", 9),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningProgress {
    pub strategy_id: String,
    pub trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub recent_performance: f64,
    pub adaptation_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterAdjustment {
    pub strategy_id: String,
    pub parameter: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterEvolution {
    pub version: usize,
    pub timestamp: i64,
    pub parameter: String,
    pub value: f64,
}

/// Turns fills into trade outcomes and outcomes into per-strategy
/// rollups, parameter-adjustment suggestions, and feature-importance
/// weights.
pub struct LearningEngine {
    outcomes: RingBuffer<TradeOutcome>,
    progress: HashMap<String, LearningProgress>,
    evolution: HashMap<String, Vec<ParameterEvolution>>,
    suggestions: Vec<ParameterAdjustment>,
    feature_importance: HashMap<String, f64>,
    trade_counter: u64,
}

impl LearningEngine {
    pub fn new() -> Self {
        let uniform = 1.0 / IMPORTANCE_FEATURES.len() as f64;
        Self {
            outcomes: RingBuffer::new(OUTCOME_CAPACITY),
            progress: HashMap::new(),
            evolution: HashMap::new(),
            suggestions: Vec::new(),
            feature_importance: IMPORTANCE_FEATURES
                .iter()
                .map(|&(name, _)| (name.to_string(), uniform))
                .collect(),
            trade_counter: 0,
        }
    }

    /// Build a trade outcome from a successful fill. The same feature
    /// snapshot serves as both entry and exit context since no exit
    /// stream exists; the exit price is the current spot.
    pub fn synthesize_outcome(
        &mut self,
        result: &ExecutionResult,
        approved: &ApprovedSignal,
        features: &StructuralFeatures,
        regime: &RegimeClassification,
    ) -> Option<TradeOutcome> {
        if !result.success || result.order.filled_size <= 0.0 {
            return None;
        }
        let order = &result.order;
        let exit_price = if features.spot > 0.0 {
            features.spot
        } else {
            order.fill_price
        };
        let units = order.filled_size / order.fill_price;
        let pnl = order.direction.sign() * (exit_price - order.fill_price) * units;
        let pnl_pct = if order.filled_size > 0.0 {
            pnl / order.filled_size
        } else {
            0.0
        };
        let holding_period_ms = order
            .filled_at
            .map(|t| t - order.submitted_at)
            .unwrap_or(0);

        let closes = &features.price_history.closes;
        let max_drawdown = numerics::max_drawdown(closes);
        let max_runup = max_runup(closes);

        let fill_quality = order.filled_size / order.size;
        let slip_allowance = approved.constraints.max_slippage.max(f64::EPSILON);
        let slip_quality = clamp(1.0 - result.slippage / (2.0 * slip_allowance), 0.0, 1.0);
        let speed_quality = clamp(1.0 - (result.latency_ms - 10.0) / 50.0, 0.0, 1.0);
        let execution_quality = 0.3 * fill_quality + 0.4 * slip_quality + 0.3 * speed_quality;

        let snapshot = FeatureVector::capture(features, regime);
        self.trade_counter += 1;

        Some(TradeOutcome {
            trade_id: format!("trade-{}", self.trade_counter),
            strategy_id: approved.signal.strategy_id.clone(),
            entry_price: order.fill_price,
            exit_price,
            size: order.filled_size,
            pnl,
            pnl_pct,
            holding_period_ms,
            max_drawdown,
            max_runup,
            entry_features: snapshot.clone(),
            exit_features: snapshot,
            direction_correct: pnl > 0.0,
            execution_quality,
            timestamp: features.timestamp,
        })
    }

    /// Fold one outcome into the history, the strategy rollup, the
    /// suggestion rules, and the feature-importance weights.
    pub fn record_outcome(&mut self, outcome: TradeOutcome) {
        self.update_importance(&outcome);
        self.outcomes.push(outcome.clone());

        let rollup = self.rollup(&outcome.strategy_id);
        self.suggest(&rollup, outcome.timestamp);
        self.progress.insert(outcome.strategy_id.clone(), rollup);
    }

    pub fn progress_list(&self) -> Vec<LearningProgress> {
        let mut list: Vec<LearningProgress> = self.progress.values().cloned().collect();
        list.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id));
        list
    }

    pub fn evolution_list(&self) -> Vec<(String, Vec<ParameterEvolution>)> {
        let mut list: Vec<(String, Vec<ParameterEvolution>)> = self
            .evolution
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    pub fn suggestions(&self) -> &[ParameterAdjustment] {
        &self.suggestions
    }

    pub fn feature_importance(&self) -> &HashMap<String, f64> {
        &self.feature_importance
    }

    pub fn recent_outcomes(&self, n: usize) -> Vec<TradeOutcome> {
        let mut recent = self.outcomes.recent(n);
        recent.reverse();
        recent
    }

    pub fn total_outcomes(&self) -> usize {
        self.outcomes.len()
    }

    fn rollup(&self, strategy_id: &str) -> LearningProgress {
        let trades: Vec<&TradeOutcome> = self
            .outcomes
            .iter()
            .filter(|o| o.strategy_id == strategy_id)
            .collect();
        let n = trades.len();
        let wins: Vec<f64> = trades.iter().filter(|o| o.pnl > 0.0).map(|o| o.pnl).collect();
        let losses: Vec<f64> = trades
            .iter()
            .filter(|o| o.pnl <= 0.0)
            .map(|o| o.pnl.abs())
            .collect();

        let win_rate = if n == 0 {
            0.0
        } else {
            wins.len() as f64 / n as f64
        };
        let avg_win = numerics::mean(&wins);
        let avg_loss = numerics::mean(&losses);
        let profit_factor = if avg_loss == 0.0 {
            if avg_win > 0.0 {
                999.0
            } else {
                0.0
            }
        } else {
            avg_win / avg_loss
        };

        let pnl_pcts: Vec<f64> = trades.iter().map(|o| o.pnl_pct).collect();
        let sharpe = numerics::sharpe(&pnl_pcts, ANNUALIZATION);

        let mut equity = vec![EQUITY_SEED];
        for t in &trades {
            equity.push(equity.last().unwrap() + t.pnl);
        }
        let max_drawdown = numerics::max_drawdown(&equity);

        let recent_start = pnl_pcts.len().saturating_sub(RECENT_WINDOW);
        let recent_performance = numerics::mean(&pnl_pcts[recent_start..]);

        let half = pnl_pcts.len() / 2;
        let adaptation_score = if half == 0 {
            0.0
        } else {
            numerics::mean(&pnl_pcts[half..]) - numerics::mean(&pnl_pcts[..half])
        };

        LearningProgress {
            strategy_id: strategy_id.to_string(),
            trades: n,
            win_rate,
            profit_factor,
            sharpe,
            max_drawdown,
            recent_performance,
            adaptation_score,
        }
    }

    fn suggest(&mut self, rollup: &LearningProgress, timestamp: i64) {
        let mut candidates: Vec<(&str, f64, f64, String)> = Vec::new();
        if rollup.win_rate < 0.4 && rollup.trades > 20 {
            candidates.push((
                "activation_threshold",
                0.6,
                0.7,
                format!("tighten entry: win rate {:.2}", rollup.win_rate),
            ));
        }
        if rollup.profit_factor < 1.0 && rollup.trades > 30 {
            candidates.push((
                "stop_loss_multiple",
                1.0,
                0.8,
                format!("tighten stops: profit factor {:.2}", rollup.profit_factor),
            ));
        }
        if rollup.max_drawdown > 0.15 {
            candidates.push((
                "position_size_multiple",
                1.0,
                0.7,
                format!("reduce size: drawdown {:.1}%", rollup.max_drawdown * 100.0),
            ));
        }
        if rollup.recent_performance < -0.02 {
            candidates.push((
                "confidence_threshold",
                0.5,
                0.6,
                format!(
                    "increase selectivity: recent performance {:+.3}",
                    rollup.recent_performance
                ),
            ));
        }

        for (parameter, old_value, new_value, reason) in candidates {
            let already = self.suggestions.iter().any(|s| {
                s.strategy_id == rollup.strategy_id && s.parameter == parameter
            });
            if already {
                continue;
            }
            info!(
                strategy = %rollup.strategy_id,
                parameter,
                old_value,
                new_value,
                "{}", reason
            );
            self.suggestions.push(ParameterAdjustment {
                strategy_id: rollup.strategy_id.clone(),
                parameter: parameter.to_string(),
                old_value,
                new_value,
                reason,
                timestamp,
            });
            if self.suggestions.len() > MAX_SUGGESTIONS {
                let excess = self.suggestions.len() - MAX_SUGGESTIONS;
                self.suggestions.drain(..excess);
            }

            let versions = self.evolution.entry(rollup.strategy_id.clone()).or_default();
            if versions.len() < MAX_EVOLUTION_VERSIONS {
                versions.push(ParameterEvolution {
                    version: versions.len() + 1,
                    timestamp,
                    parameter: parameter.to_string(),
                    value: new_value,
                });
            }
        }
    }

    /// Contributing features (normalized magnitude above 0.5) move by
    /// 0.01, the rest by 0.005, signed by the outcome; floored at 0.01
    /// and re-normalized to sum to 1.
    fn update_importance(&mut self, outcome: &TradeOutcome) {
        let normalized = numerics::normalize(&outcome.entry_features.to_vec());
        let won = outcome.pnl > 0.0;
        for &(name, index) in IMPORTANCE_FEATURES.iter() {
            let contributed = normalized.get(index).copied().unwrap_or(0.0) > 0.5;
            let delta = match (won, contributed) {
                (true, true) => 0.01,
                (true, false) => -0.005,
                (false, true) => -0.01,
                (false, false) => 0.005,
            };
            let w = self.feature_importance.entry(name.to_string()).or_insert(0.0);
            *w = (*w + delta).max(0.01);
        }
        let total: f64 = self.feature_importance.values().sum();
        if total > 0.0 {
            for w in self.feature_importance.values_mut() {
                *w /= total;
            }
        }
        debug!(outcome = %outcome.trade_id, won, "feature importance updated");
    }
}

/// Largest trough-to-peak gain of an equity/price series, as a fraction.
fn max_runup(series: &[f64]) -> f64 {
    let mut trough = f64::INFINITY;
    let mut best = 0.0f64;
    for &x in series {
        trough = trough.min(x);
        if trough > 0.0 {
            best = best.max((x - trough) / trough);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(strategy: &str, pnl: f64, pnl_pct: f64) -> TradeOutcome {
        TradeOutcome {
            trade_id: "trade-1".to_string(),
            strategy_id: strategy.to_string(),
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 10.0,
            size: 1_000.0,
            pnl,
            pnl_pct,
            holding_period_ms: 30,
            max_drawdown: 0.0,
            max_runup: 0.0,
            entry_features: FeatureVector {
                momentum: 0.9,
                ..FeatureVector::default()
            },
            exit_features: FeatureVector::default(),
            direction_correct: pnl > 0.0,
            execution_quality: 0.8,
            timestamp: 1_000,
        }
    }

    #[test]
    fn rollup_win_rate_and_profit_factor() {
        let mut engine = LearningEngine::new();
        for _ in 0..6 {
            engine.record_outcome(outcome("momentum_follow", 20.0, 0.02));
        }
        for _ in 0..4 {
            engine.record_outcome(outcome("momentum_follow", -10.0, -0.01));
        }
        let progress = engine.progress_list();
        let p = progress
            .iter()
            .find(|p| p.strategy_id == "momentum_follow")
            .unwrap();
        assert_eq!(p.trades, 10);
        assert!((p.win_rate - 0.6).abs() < 1e-9);
        assert!((p.profit_factor - 2.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_sentinel_with_no_losses() {
        let mut engine = LearningEngine::new();
        for _ in 0..5 {
            engine.record_outcome(outcome("gamma_scalp", 10.0, 0.01));
        }
        let p = &engine.progress_list()[0];
        assert!((p.profit_factor - 999.0).abs() < 1e-9);
    }

    #[test]
    fn losing_streak_triggers_entry_tightening() {
        let mut engine = LearningEngine::new();
        for _ in 0..25 {
            engine.record_outcome(outcome("mean_reversion", -10.0, -0.03));
        }
        let params: Vec<&str> = engine
            .suggestions()
            .iter()
            .map(|s| s.parameter.as_str())
            .collect();
        assert!(params.contains(&"activation_threshold"));
        assert!(params.contains(&"confidence_threshold"));
        // Not duplicated on every outcome
        assert_eq!(
            params.iter().filter(|&&p| p == "activation_threshold").count(),
            1
        );
    }

    #[test]
    fn drawdown_triggers_size_reduction() {
        let mut engine = LearningEngine::new();
        // One catastrophic trade against the 100k equity seed
        engine.record_outcome(outcome("structural_break", -20_000.0, -0.2));
        let params: Vec<&str> = engine
            .suggestions()
            .iter()
            .map(|s| s.parameter.as_str())
            .collect();
        assert!(params.contains(&"position_size_multiple"));
    }

    #[test]
    fn evolution_versions_are_recorded_and_capped() {
        let mut engine = LearningEngine::new();
        for _ in 0..25 {
            engine.record_outcome(outcome("mean_reversion", -10.0, -0.03));
        }
        let evolution = engine.evolution_list();
        let (_, versions) = evolution
            .iter()
            .find(|(id, _)| id == "mean_reversion")
            .unwrap();
        assert!(!versions.is_empty());
        assert!(versions.len() <= MAX_EVOLUTION_VERSIONS);
        assert_eq!(versions[0].version, 1);
    }

    #[test]
    fn importance_stays_normalized_with_floor() {
        let mut engine = LearningEngine::new();
        for i in 0..50 {
            let pnl = if i % 2 == 0 { 10.0 } else { -10.0 };
            engine.record_outcome(outcome("momentum_follow", pnl, pnl / 1_000.0));
        }
        let importance = engine.feature_importance();
        assert_eq!(importance.len(), 8);
        let total: f64 = importance.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        for &w in importance.values() {
            assert!(w > 0.0);
        }
    }

    #[test]
    fn adaptation_score_rewards_improvement() {
        let mut engine = LearningEngine::new();
        for _ in 0..10 {
            engine.record_outcome(outcome("flow_alignment", -10.0, -0.01));
        }
        for _ in 0..10 {
            engine.record_outcome(outcome("flow_alignment", 10.0, 0.01));
        }
        let p = &engine.progress_list()[0];
        assert!(p.adaptation_score > 0.0);
    }

    #[test]
    fn max_runup_known_series() {
        assert!((max_runup(&[100.0, 80.0, 120.0]) - 0.5).abs() < 1e-9);
        assert_eq!(max_runup(&[]), 0.0);
    }
}
