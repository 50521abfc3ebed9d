pub mod direction;
pub mod features;
pub mod market;
pub mod order;
pub mod outcome;
pub mod portfolio;
pub mod regime;
pub mod signal;

pub use direction::{Direction, FlowDirection, TrendDirection};
pub use features::{
    Attractor, AttractorKind, DealerPositioning, FlipDirection, GammaFlip, GammaSurface,
    GravitationalPull, LiquidityLevel, LiquidityMap, PriceHistory, StructuralFeatures,
    VolRegime, VolatilityState,
};
pub use market::{
    Bar, BookLevel, BookSide, FastStream, MarketBundle, OptionQuote, OptionRight, OrderBook,
    Print, SlowStream,
};
pub use order::{ExecutionResult, Order, OrderStatus};
pub use outcome::{FeatureVector, TradeOutcome};
pub use portfolio::{Portfolio, Position};
pub use regime::{
    CoherenceComponents, CoherenceScore, MarketRegime, RegimeCharacteristics,
    RegimeClassification, WyckoffPhase,
};
pub use signal::{
    ApprovedSignal, ExecutionConstraints, OrderType, RiskMetrics, Signal, SignalContext,
    TimeInForce, Urgency,
};
