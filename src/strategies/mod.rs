pub mod pool;
pub mod templates;

pub use pool::{ActivationContext, ActiveStrategy, PerformanceSummary, StrategyPool};
pub use templates::{default_templates, StrategyTemplate, StrategyType};
