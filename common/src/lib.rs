pub mod config;
pub mod error;
pub mod types;

pub use config::{
    BandParams, BracketSizing, EndOfSeriesPolicy, MaKind, MovingAverage, SessionClose,
    SimulationParameters, StrategyVariant,
};
pub use error::{Result, SimError};
pub use types::*;
