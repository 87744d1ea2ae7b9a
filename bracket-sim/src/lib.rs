pub mod batch;
pub mod cooldown;
pub mod data;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod metrics;
pub mod portfolio;
pub mod signals;
pub mod summary;

pub use batch::{BatchOutcome, BatchRunner, InstrumentRequest};
pub use cooldown::{CooldownGate, CooldownState};
pub use data::{
    generate_synthetic_bars, load_file, load_series, BarRange, CsvDirectorySource, InMemorySource,
    MarketDataSource, SyntheticSource, Timeframe,
};
pub use engine::{SimulationEngine, SimulationState};
pub use execution::{LiveTrader, OrderExecutor, OrderRequest, OrderResult, PaperExecutor};
pub use indicators::{compute, IndicatorOutput, IndicatorSeries, IndicatorSet, IndicatorSpec};
pub use metrics::MetricsCalculator;
pub use portfolio::{bracket_levels, Portfolio};
pub use signals::{SignalEvaluator, SignalRules, StrategyPlan};
pub use summary::{BatchSummary, ResultAggregator, SkippedInstrument};

// Re-export common types
pub use common::{
    BandParams, Bar, BarSeries, BracketSizing, Direction, EndOfSeriesPolicy, ExitReason,
    InstrumentSummary, MaKind, MovingAverage, PerformanceMetrics, Position, Result, SessionClose,
    SimError, SimulationParameters, SimulationResult, Signal, StrategyVariant, Trade,
};
