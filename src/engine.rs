use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::execution::ExecutionSimulator;
use crate::learning::{LearningEngine, LearningProgress, ParameterEvolution};
use crate::memory::FractalMemory;
use crate::meta::MetaController;
use crate::models::features::StructuralFeatures;
use crate::models::market::MarketBundle;
use crate::models::order::ExecutionResult;
use crate::models::outcome::TradeOutcome;
use crate::models::portfolio::{Portfolio, Position};
use crate::models::regime::{CoherenceScore, RegimeClassification};
use crate::models::signal::{ApprovedSignal, Signal};
use crate::perception::Perception;
use crate::risk::RiskGovernor;
use crate::strategies::pool::{ActiveStrategy, StrategyPool};

/// Trade outcomes carried on the state snapshot.
const STATE_OUTCOMES: usize = 50;
const MARGIN_RATE: f64 = 0.5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub data_latency_ms: i64,
    pub processing_time_ms: f64,
    /// Patterns held in fractal memory.
    pub memory_usage: usize,
    pub error_rate: f64,
}

/// Everything one tick produced, for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemState {
    pub features: StructuralFeatures,
    pub regime: RegimeClassification,
    pub coherence: CoherenceScore,
    pub active_strategies: Vec<ActiveStrategy>,
    pub signals: Vec<Signal>,
    pub approved: Vec<ApprovedSignal>,
    pub results: Vec<ExecutionResult>,
    pub portfolio: Portfolio,
    pub recent_outcomes: Vec<TradeOutcome>,
    pub learning_progress: Vec<LearningProgress>,
    pub evolution: Vec<(String, Vec<ParameterEvolution>)>,
    pub timestamp: i64,
    pub health: HealthMetrics,
}

/// The root orchestrator: owns the seven subsystems, the portfolio, and
/// the last produced state, and sequences the eight phases per tick.
pub struct Engine {
    config: EngineConfig,
    perception: Perception,
    meta: MetaController,
    strategies: StrategyPool,
    risk: RiskGovernor,
    execution: ExecutionSimulator,
    learning: LearningEngine,
    memory: FractalMemory,
    portfolio: Portfolio,
    last_state: Option<SystemState>,
    position_counter: u64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let execution = match config.execution_seed {
            Some(seed) => ExecutionSimulator::with_seed(seed),
            None => ExecutionSimulator::new(),
        };
        Self {
            perception: Perception::new(config.buffer_capacity),
            meta: MetaController::new(),
            strategies: StrategyPool::new(config.max_strategies),
            risk: RiskGovernor::new(config.risk.clone()),
            execution,
            learning: LearningEngine::new(),
            memory: FractalMemory::new(config.memory_capacity),
            portfolio: Portfolio::new(config.initial_balance),
            last_state: None,
            position_counter: 0,
            config,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn last_state(&self) -> Option<&SystemState> {
        self.last_state.as_ref()
    }

    pub fn risk(&self) -> &RiskGovernor {
        &self.risk
    }

    pub fn risk_mut(&mut self) -> &mut RiskGovernor {
        &mut self.risk
    }

    pub fn memory(&self) -> &FractalMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut FractalMemory {
        &mut self.memory
    }

    /// Template surface, intended for use before the first tick.
    pub fn strategies_mut(&mut self) -> &mut StrategyPool {
        &mut self.strategies
    }

    /// Run one full pipeline pass over a bundle. Never fails; in the
    /// worst case the returned state carries empty signal, approval,
    /// and result sets.
    pub fn tick(&mut self, bundle: &MarketBundle) -> SystemState {
        let started = Instant::now();

        // Phases 1-2: perception and regime
        let features = self.perception.perceive(bundle);
        let regime = self.meta.classify(&features);

        // Phases 3-5: two-pass activation around coherence, since
        // coherence needs activations and activation weights need
        // coherence
        let preliminary = self
            .strategies
            .activate(&features, &regime, &CoherenceScore::neutral());
        let coherence = self.meta.coherence(&features, &regime, &preliminary);
        let active = self.strategies.activate(&features, &regime, &coherence);

        // Phase 6: collect signals
        let signals: Vec<Signal> = active.iter().filter_map(|s| s.signal.clone()).collect();

        // Phase 7: risk approval against the current portfolio snapshot
        self.revalue_portfolio(features.spot);
        let approved = self.risk.filter(&signals, &self.portfolio, &features);

        // Phase 8: simulated execution
        let results = self.execution.simulate(&approved, &features);

        // Portfolio mutation on fills
        for result in &results {
            if result.success {
                self.apply_fill(result, &features, bundle);
            }
        }
        self.revalue_portfolio(features.spot);

        // Learning and memory
        if self.config.learning_enabled {
            for result in &results {
                if !result.success {
                    continue;
                }
                let matching = approved
                    .iter()
                    .find(|a| a.signal.id == result.order.signal_id);
                if let Some(approved_signal) = matching {
                    if let Some(outcome) = self.learning.synthesize_outcome(
                        result,
                        approved_signal,
                        &features,
                        &regime,
                    ) {
                        self.strategies
                            .record_outcome(&outcome.strategy_id, outcome.pnl_pct);
                        self.memory.store(
                            &outcome.entry_features,
                            outcome.clone(),
                            regime.regime,
                            bundle.timestamp,
                        );
                        self.learning.record_outcome(outcome);
                    }
                }
            }
        }

        let health = HealthMetrics {
            data_latency_ms: Utc::now().timestamp_millis() - bundle.timestamp,
            processing_time_ms: started.elapsed().as_secs_f64() * 1_000.0,
            memory_usage: self.memory.stats().total,
            error_rate: self.execution.error_rate(),
        };

        info!(
            regime = %regime.regime,
            coherence = coherence.total,
            active = active.len(),
            signals = signals.len(),
            approved = approved.len(),
            filled = results.iter().filter(|r| r.success).count(),
            "tick complete"
        );

        let state = SystemState {
            features,
            regime,
            coherence,
            active_strategies: active,
            signals,
            approved,
            results,
            portfolio: self.portfolio.clone(),
            recent_outcomes: self.learning.recent_outcomes(STATE_OUTCOMES),
            learning_progress: self.learning.progress_list(),
            evolution: self.learning.evolution_list(),
            timestamp: bundle.timestamp,
            health,
        };
        self.last_state = Some(state.clone());
        state
    }

    /// Log a balance / activity summary.
    pub fn log_status(&self) {
        info!("symbol: {}", self.config.symbol);
        info!(
            "balance: {:.2} | total value: {:.2} | positions: {}",
            self.portfolio.cash,
            self.portfolio.total_value,
            self.portfolio.positions.len()
        );
        info!(
            "realized pnl: {:+.2} | unrealized: {:+.2} | drawdown: {:.2}%",
            self.portfolio.realized_pnl,
            self.portfolio.unrealized_pnl,
            self.portfolio.current_drawdown * 100.0
        );
        if let Some(reason) = self.risk.kill_switch_reason() {
            info!("kill switch ACTIVE: {}", reason);
        }
        let (momentum, iv, gamma, imbalance, trend) = self.meta.feature_means();
        info!(
            "feature drift: momentum {:+.4} iv {:.3} gamma {:.3} imbalance {:+.3} trend {:.3}",
            momentum, iv, gamma, imbalance, trend
        );
        info!("avg coherence: {:.3}", self.meta.average_coherence());
        info!("avg bar volume: {:.1}", self.perception.average_volume());
        info!(
            "patterns: {} | outcomes: {}",
            self.memory.stats().total,
            self.learning.total_outcomes()
        );
        for progress in self.learning.progress_list() {
            info!(
                "  {}: {} trades wr {:.1}% pf {:.2} recent {:+.4}",
                progress.strategy_id,
                progress.trades,
                progress.win_rate * 100.0,
                progress.profit_factor,
                progress.recent_performance
            );
        }
    }

    fn apply_fill(
        &mut self,
        result: &ExecutionResult,
        features: &StructuralFeatures,
        bundle: &MarketBundle,
    ) {
        let order = &result.order;
        if order.fill_price <= 0.0 || order.filled_size <= 0.0 {
            return;
        }
        self.position_counter += 1;
        let units = order.filled_size / order.fill_price;

        self.portfolio.cash -= order.filled_size + order.fees;
        self.portfolio.realized_pnl -= order.fees;
        self.portfolio.margin_used += order.filled_size * MARGIN_RATE;
        self.portfolio.positions.push(Position {
            id: format!("pos-{}", self.position_counter),
            symbol: bundle.symbol.clone(),
            direction: order.direction,
            size: units,
            entry_price: order.fill_price,
            current_price: order.fill_price,
            unrealized_pnl: 0.0,
            opened_at: order.filled_at.unwrap_or(bundle.timestamp),
        });

        debug!(
            order = %order.id,
            notional = order.filled_size,
            units,
            spot = features.spot,
            "position opened"
        );
    }

    fn revalue_portfolio(&mut self, spot: f64) {
        if spot > 0.0 {
            self.portfolio.revalue(spot);
        }
        self.portfolio.daily_pnl =
            self.portfolio.realized_pnl + self.portfolio.unrealized_pnl;

        let initial = self.config.initial_balance;
        if initial > 0.0 {
            let peak = initial.max(self.portfolio.total_value);
            let dd = (peak - self.portfolio.total_value) / peak;
            self.portfolio.current_drawdown = dd.max(0.0);
            self.portfolio.max_drawdown = self.portfolio.max_drawdown.max(self.portfolio.current_drawdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::regime::MarketRegime;
    use crate::test_helpers::{bundle_with_chain, bundle_with_closes, squeeze_chain};

    fn test_config() -> EngineConfig {
        EngineConfig {
            execution_seed: Some(42),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn flat_tick_produces_calm_state() {
        let mut engine = Engine::new(test_config());
        let state = engine.tick(&bundle_with_closes(&[100.0; 30]));

        assert!(matches!(
            state.regime.regime,
            MarketRegime::RangeBound | MarketRegime::Consolidation
        ));
        assert!(state.coherence.total >= 0.4 && state.coherence.total <= 0.7);
        assert!(state.signals.is_empty());
        assert!(!engine.risk().kill_switch_active());
        assert!((state.portfolio.total_value - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn trending_tick_opens_positions() {
        let mut engine = Engine::new(test_config());
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
        let state = engine.tick(&bundle_with_closes(&closes));

        assert_eq!(state.regime.regime, MarketRegime::TrendingBullish);
        assert!(!state.signals.is_empty());
        assert!(!state.approved.is_empty());
        let filled = state.results.iter().filter(|r| r.success).count();
        assert!(filled > 0);
        assert_eq!(engine.portfolio().positions.len(), filled);
        assert!(engine.portfolio().cash < 100_000.0);
    }

    #[test]
    fn squeeze_tick_classifies_and_activates() {
        let mut engine = Engine::new(test_config());
        let state = engine.tick(&bundle_with_chain(&[100.0; 30], squeeze_chain(100.0)));

        assert_eq!(state.regime.regime, MarketRegime::GammaSqueeze);
        let spot = state.features.spot;
        assert!(state
            .features
            .gravitational_pull
            .attractors
            .iter()
            .any(|a| (a.price - spot).abs() / spot < 0.01));
        assert!(state
            .active_strategies
            .iter()
            .any(|s| s.template.id == "gamma_scalp" || s.template.id == "flow_alignment"));
    }

    #[test]
    fn learning_records_fill_outcomes() {
        let mut engine = Engine::new(test_config());
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
        let state = engine.tick(&bundle_with_closes(&closes));
        let filled = state.results.iter().filter(|r| r.success).count();

        assert!(filled > 0);
        assert_eq!(state.recent_outcomes.len(), filled);
        assert_eq!(state.health.memory_usage, filled);
        assert!(!state.learning_progress.is_empty());
    }

    #[test]
    fn learning_disabled_stores_nothing() {
        let config = EngineConfig {
            learning_enabled: false,
            ..test_config()
        };
        let mut engine = Engine::new(config);
        let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
        let state = engine.tick(&bundle_with_closes(&closes));
        assert!(state.recent_outcomes.is_empty());
        assert_eq!(state.health.memory_usage, 0);
    }

    #[test]
    fn empty_bundle_never_aborts() {
        let mut engine = Engine::new(test_config());
        let state = engine.tick(&MarketBundle::empty("TEST", 1_000));
        assert!(state.signals.is_empty());
        assert!(state.approved.is_empty());
        assert!(state.results.is_empty());
    }

    #[test]
    fn last_state_is_retained() {
        let mut engine = Engine::new(test_config());
        assert!(engine.last_state().is_none());
        engine.tick(&bundle_with_closes(&[100.0; 30]));
        assert!(engine.last_state().is_some());
    }
}
