mod common;

use common::{bundle_with_chain, bundle_with_closes, squeeze_chain};

use resonance_engine::config::EngineConfig;
use resonance_engine::engine::{Engine, HealthMetrics};
use resonance_engine::memory::FractalMemory;
use resonance_engine::models::direction::Direction;
use resonance_engine::models::outcome::{FeatureVector, TradeOutcome};
use resonance_engine::models::portfolio::Portfolio;
use resonance_engine::models::regime::MarketRegime;
use resonance_engine::risk::{RiskGovernor, RiskLimits};

fn test_config() -> EngineConfig {
    EngineConfig {
        execution_seed: Some(42),
        ..EngineConfig::default()
    }
}

fn sample_outcome(pnl: f64) -> TradeOutcome {
    TradeOutcome {
        trade_id: "trade-1".to_string(),
        strategy_id: "momentum_follow".to_string(),
        entry_price: 100.0,
        exit_price: 100.0,
        size: 1_000.0,
        pnl,
        pnl_pct: pnl / 1_000.0,
        holding_period_ms: 30,
        max_drawdown: 0.0,
        max_runup: 0.0,
        entry_features: FeatureVector::default(),
        exit_features: FeatureVector::default(),
        direction_correct: pnl > 0.0,
        execution_quality: 0.8,
        timestamp: 0,
    }
}

#[test]
fn flat_market_stays_calm_across_ticks() {
    let mut engine = Engine::new(test_config());
    let bundle = bundle_with_closes(&[100.0; 30]);

    for _ in 0..5 {
        let state = engine.tick(&bundle);
        assert!(matches!(
            state.regime.regime,
            MarketRegime::RangeBound | MarketRegime::Consolidation
        ));
        assert!(
            state.coherence.total >= 0.4 && state.coherence.total <= 0.7,
            "coherence {} out of envelope",
            state.coherence.total
        );
        assert!(state.signals.is_empty());
        assert!(!engine.risk().kill_switch_active());
    }
}

#[test]
fn sharp_uptrend_goes_long() {
    let mut engine = Engine::new(test_config());
    let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
    let state = engine.tick(&bundle_with_closes(&closes));

    assert_eq!(state.regime.regime, MarketRegime::TrendingBullish);
    assert!(state.features.price_history.momentum > 0.02);
    assert!(state.features.price_history.trend_strength > 0.6);

    let momentum = state
        .active_strategies
        .iter()
        .find(|s| s.template.id == "momentum_follow")
        .expect("momentum strategy active in a sharp uptrend");
    assert_eq!(
        momentum.signal.as_ref().map(|s| s.direction),
        Some(Direction::Long)
    );
}

#[test]
fn gamma_squeeze_is_recognized() {
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
        .any(|s| s.template.id == "flow_alignment" || s.template.id == "gamma_scalp"));
}

#[test]
fn drawdown_breach_suppresses_approvals() {
    let mut governor = RiskGovernor::new(RiskLimits::default());

    let mut portfolio = Portfolio::new(100_000.0);
    governor.update_risk_state(&portfolio);
    assert!(!governor.kill_switch_active());

    portfolio.cash = 80_000.0;
    portfolio.total_value = 80_000.0;
    governor.update_risk_state(&portfolio);

    assert!(governor.kill_switch_active());
    assert!(governor.kill_switch_reason().unwrap().contains("drawdown"));

    let features = resonance_engine::models::StructuralFeatures::empty(0);
    assert!(governor.filter(&[], &portfolio, &features).is_empty());
}

#[test]
fn memory_eviction_keeps_three_most_recent() {
    let mut memory = FractalMemory::new(3);
    for i in 0..5i64 {
        let vector = FeatureVector {
            momentum: 0.1 * i as f64,
            ..FeatureVector::default()
        };
        memory.store(
            &vector,
            sample_outcome(1.0),
            MarketRegime::RangeBound,
            1_000 * (i + 1),
        );
    }

    let stats = memory.stats();
    assert_eq!(stats.total, 3);
    let timestamps: Vec<i64> = memory
        .export_patterns()
        .iter()
        .map(|p| p.timestamp)
        .collect();
    assert_eq!(timestamps, vec![3_000, 4_000, 5_000]);
    assert_eq!(stats.by_regime[&MarketRegime::RangeBound], 3);
    assert_eq!(stats.positive + stats.negative, 3);
}

#[test]
fn cosine_retrieval_ranks_exact_match_first() {
    let mut memory = FractalMemory::new(100);
    let unit_x = FeatureVector {
        momentum: 1.0,
        ..FeatureVector::default()
    };
    let unit_y = FeatureVector {
        trend_strength: 1.0,
        ..FeatureVector::default()
    };
    let first = memory.store(&unit_x, sample_outcome(1.0), MarketRegime::RangeBound, 1_000);
    memory.store(&unit_y, sample_outcome(1.0), MarketRegime::RangeBound, 2_000);

    let hits = memory.retrieve_similar(&unit_x, MarketRegime::RangeBound, 2);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, first);
    assert!((hits[0].similarity - 1.0).abs() < 1e-9);
    assert!(hits[1].similarity.abs() < 1e-9);
}

#[test]
fn pattern_store_round_trips_through_export() {
    let mut memory = FractalMemory::new(100);
    for i in 0..10i64 {
        let vector = FeatureVector {
            momentum: 0.05 * i as f64,
            imbalance: -0.3,
            ..FeatureVector::default()
        };
        memory.store(
            &vector,
            sample_outcome(if i % 2 == 0 { 5.0 } else { -5.0 }),
            MarketRegime::MeanReversion,
            1_000 + i,
        );
    }

    let exported = memory.export_patterns();
    let before = memory.stats();
    memory.clear();
    memory.import_patterns(exported.clone());

    assert_eq!(memory.stats().total, before.total);
    assert_eq!(memory.stats().positive, before.positive);
    assert_eq!(memory.stats().negative, before.negative);

    let re_exported = memory.export_patterns();
    assert_eq!(
        serde_json::to_string(&exported).unwrap(),
        serde_json::to_string(&re_exported).unwrap()
    );
}

#[test]
fn approved_sizes_respect_position_limit() {
    let mut engine = Engine::new(test_config());
    let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
    let state = engine.tick(&bundle_with_closes(&closes));

    assert!(!state.approved.is_empty());
    // Sizing ran against the pre-fill portfolio worth the initial balance
    for approved in &state.approved {
        assert!(approved.approved_size <= 0.10 * 100_000.0 + 1e-6);
        assert!(approved.risk.max_loss >= 0.0);
    }
}

#[test]
fn identical_input_and_seed_reproduce_identical_state() {
    let closes: Vec<f64> = (0..21).map(|i| 100.0 + i as f64 * 0.5).collect();
    let bundle = bundle_with_closes(&closes);

    let mut a = Engine::new(test_config());
    let mut b = Engine::new(test_config());
    let mut state_a = a.tick(&bundle);
    let mut state_b = b.tick(&bundle);

    // Health carries wall-clock readings; everything else must match
    // byte for byte.
    state_a.health = HealthMetrics::default();
    state_b.health = HealthMetrics::default();
    assert_eq!(
        serde_json::to_string(&state_a).unwrap(),
        serde_json::to_string(&state_b).unwrap()
    );
}

#[test]
fn empty_bundle_produces_valid_default_state() {
    let mut engine = Engine::new(test_config());
    let bundle = resonance_engine::models::MarketBundle::empty("TEST", 1_000);
    let state = engine.tick(&bundle);

    assert!(state.signals.is_empty());
    assert!(state.approved.is_empty());
    assert!(state.results.is_empty());
    assert!(state.features.spot.is_finite());
    assert!(state.coherence.total.is_finite());
}
