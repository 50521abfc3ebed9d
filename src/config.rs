use serde::{Deserialize, Serialize};

use crate::risk::RiskLimits;

/// Engine configuration. Defaults match the documented limits; every
/// field can be overridden from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub symbol: String,
    pub tick_interval_secs: u64,
    pub initial_balance: f64,

    /// Cap on simultaneously active strategies.
    pub max_strategies: usize,
    pub risk: RiskLimits,

    pub learning_enabled: bool,
    pub memory_capacity: usize,
    pub buffer_capacity: usize,

    /// Seed for the execution simulator; unset means entropy-seeded.
    pub execution_seed: Option<u64>,

    pub log_dir: String,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "SPX".to_string(),
            tick_interval_secs: 1,
            initial_balance: 100_000.0,
            max_strategies: 10,
            risk: RiskLimits::default(),
            learning_enabled: true,
            memory_capacity: 10_000,
            buffer_capacity: 1_000,
            execution_seed: None,
            log_dir: "logs".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        let parse = |key: &str, default: f64| -> f64 {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let defaults = Self::default();
        Self {
            symbol: env("SYMBOL", &defaults.symbol),
            tick_interval_secs: parse("TICK_INTERVAL_SECS", 1.0) as u64,
            initial_balance: parse("INITIAL_BALANCE", defaults.initial_balance),
            max_strategies: parse("MAX_STRATEGIES", 10.0) as usize,
            risk: RiskLimits {
                max_position_size: parse("MAX_POSITION_SIZE", 0.10),
                max_portfolio_risk: parse("MAX_PORTFOLIO_RISK", 0.02),
                max_correlation: parse("MAX_CORRELATION", 0.7),
                max_drawdown: parse("MAX_DRAWDOWN", 0.15),
                max_daily_loss: parse("MAX_DAILY_LOSS", 0.05),
                max_concentration: parse("MAX_CONCENTRATION", 0.30),
            },
            learning_enabled: env("LEARNING_ENABLED", "true").to_lowercase() == "true",
            memory_capacity: parse("MEMORY_CAPACITY", 10_000.0) as usize,
            buffer_capacity: parse("BUFFER_CAPACITY", 1_000.0) as usize,
            execution_seed: std::env::var("EXECUTION_SEED")
                .ok()
                .and_then(|s| s.parse().ok()),
            log_dir: env("LOG_DIR", &defaults.log_dir),
            log_level: env("LOG_LEVEL", &defaults.log_level),
        }
    }
}
