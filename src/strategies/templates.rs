use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::regime::MarketRegime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    GammaScalp,
    MomentumFollow,
    MeanReversion,
    VolatilityExpansion,
    VolatilityContraction,
    LiquidityHunt,
    FlowAlignment,
    StructuralBreak,
    PatternRecognition,
    FractalResonance,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyType::GammaScalp => "gamma_scalp",
            StrategyType::MomentumFollow => "momentum_follow",
            StrategyType::MeanReversion => "mean_reversion",
            StrategyType::VolatilityExpansion => "volatility_expansion",
            StrategyType::VolatilityContraction => "volatility_contraction",
            StrategyType::LiquidityHunt => "liquidity_hunt",
            StrategyType::FlowAlignment => "flow_alignment",
            StrategyType::StructuralBreak => "structural_break",
            StrategyType::PatternRecognition => "pattern_recognition",
            StrategyType::FractalResonance => "fractal_resonance",
        };
        write!(f, "{}", s)
    }
}

/// Immutable strategy descriptor. Instances are data; behavior lives in
/// the pool's dispatch tables keyed by `strategy_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyTemplate {
    pub id: String,
    pub strategy_type: StrategyType,
    pub valid_regimes: Vec<MarketRegime>,
    pub activation_threshold: f64,
    pub parameters: BTreeMap<String, f64>,
    pub expected_win_rate: f64,
    pub risk_reward: f64,
    pub timeframe: String,
}

fn params(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|&(k, v)| (k.to_string(), v))
        .collect()
}

/// The ten default templates.
pub fn default_templates() -> Vec<StrategyTemplate> {
    use MarketRegime::*;
    vec![
        StrategyTemplate {
            id: "gamma_scalp".to_string(),
            strategy_type: StrategyType::GammaScalp,
            valid_regimes: vec![GammaSqueeze, RangeBound, MeanReversion],
            activation_threshold: 0.6,
            parameters: params(&[
                ("stop_loss", 0.005),
                ("target_profit", 0.01),
                ("min_concentration", 0.3),
            ]),
            expected_win_rate: 0.55,
            risk_reward: 2.0,
            timeframe: "1m".to_string(),
        },
        StrategyTemplate {
            id: "momentum_follow".to_string(),
            strategy_type: StrategyType::MomentumFollow,
            valid_regimes: vec![TrendingBullish, TrendingBearish, Breakout, Breakdown],
            activation_threshold: 0.55,
            parameters: params(&[
                ("trailing_stop", 0.01),
                ("target_multiple", 2.0),
                ("min_momentum", 0.01),
                ("min_trend_strength", 0.5),
            ]),
            expected_win_rate: 0.45,
            risk_reward: 2.5,
            timeframe: "5m".to_string(),
        },
        StrategyTemplate {
            id: "mean_reversion".to_string(),
            strategy_type: StrategyType::MeanReversion,
            valid_regimes: vec![MeanReversion, RangeBound, HighVolatility],
            activation_threshold: 0.6,
            parameters: params(&[
                ("stop_loss", 0.01),
                ("stop_loss_multiple", 1.0),
                ("target_profit", 0.015),
            ]),
            expected_win_rate: 0.6,
            risk_reward: 1.2,
            timeframe: "15m".to_string(),
        },
        StrategyTemplate {
            id: "volatility_expansion".to_string(),
            strategy_type: StrategyType::VolatilityExpansion,
            valid_regimes: vec![Breakout, Breakdown, HighVolatility],
            activation_threshold: 0.6,
            parameters: params(&[("stop_loss", 0.015), ("target_profit", 0.03)]),
            expected_win_rate: 0.4,
            risk_reward: 3.0,
            timeframe: "15m".to_string(),
        },
        StrategyTemplate {
            id: "volatility_contraction".to_string(),
            strategy_type: StrategyType::VolatilityContraction,
            valid_regimes: vec![LowVolatility, Consolidation, RangeBound],
            activation_threshold: 0.55,
            parameters: params(&[
                ("max_iv", 20.0),
                ("stop_loss", 0.008),
                ("target_profit", 0.012),
            ]),
            expected_win_rate: 0.55,
            risk_reward: 1.5,
            timeframe: "1h".to_string(),
        },
        StrategyTemplate {
            id: "liquidity_hunt".to_string(),
            strategy_type: StrategyType::LiquidityHunt,
            valid_regimes: vec![RangeBound, Consolidation, MeanReversion],
            activation_threshold: 0.6,
            parameters: params(&[
                ("min_pocket", 500.0),
                ("proximity", 0.005),
                ("stop_loss", 0.006),
                ("target_profit", 0.01),
            ]),
            expected_win_rate: 0.5,
            risk_reward: 1.8,
            timeframe: "5m".to_string(),
        },
        StrategyTemplate {
            id: "flow_alignment".to_string(),
            strategy_type: StrategyType::FlowAlignment,
            valid_regimes: vec![GammaSqueeze, TrendingBullish, TrendingBearish],
            activation_threshold: 0.55,
            parameters: params(&[
                ("min_pressure", 1_000.0),
                ("gamma_threshold", 1e6),
                ("stop_loss", 0.01),
                ("target_profit", 0.02),
            ]),
            expected_win_rate: 0.5,
            risk_reward: 2.0,
            timeframe: "5m".to_string(),
        },
        StrategyTemplate {
            id: "structural_break".to_string(),
            strategy_type: StrategyType::StructuralBreak,
            valid_regimes: vec![Breakout, Breakdown],
            activation_threshold: 0.65,
            parameters: params(&[
                ("min_trend_strength", 0.5),
                ("stop_loss", 0.012),
                ("target_profit", 0.025),
            ]),
            expected_win_rate: 0.4,
            risk_reward: 2.8,
            timeframe: "15m".to_string(),
        },
        StrategyTemplate {
            id: "pattern_recognition".to_string(),
            strategy_type: StrategyType::PatternRecognition,
            valid_regimes: MarketRegime::ALL.to_vec(),
            activation_threshold: 0.75,
            parameters: params(&[("stop_loss", 0.01), ("target_profit", 0.02)]),
            expected_win_rate: 0.5,
            risk_reward: 1.5,
            timeframe: "15m".to_string(),
        },
        StrategyTemplate {
            id: "fractal_resonance".to_string(),
            strategy_type: StrategyType::FractalResonance,
            valid_regimes: MarketRegime::ALL.to_vec(),
            activation_threshold: 0.65,
            parameters: params(&[
                ("resonance_threshold", 0.7),
                ("stop_loss", 0.01),
                ("target_profit", 0.02),
            ]),
            expected_win_rate: 0.5,
            risk_reward: 1.8,
            timeframe: "1h".to_string(),
        },
    ]
}
