use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// OHLC bar data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

/// Ordered bars for one instrument. Timestamps are strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarSeries {
    instrument: String,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(instrument: impl Into<String>, bars: Vec<Bar>) -> Result<Self> {
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(SimError::UnorderedBars { index: pos + 1 });
        }
        Ok(Self {
            instrument: instrument.into(),
            bars,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    /// Same bars under another instrument name
    pub fn renamed(&self, instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            bars: self.bars.clone(),
        }
    }
}

/// Position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

/// Per-bar classification produced by the signal evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Buy,
    Sell,
    NoSignal,
}

impl Signal {
    /// Direction of the position this signal would open
    pub fn direction(self) -> Option<Direction> {
        match self {
            Signal::Buy => Some(Direction::Long),
            Signal::Sell => Some(Direction::Short),
            Signal::NoSignal => None,
        }
    }
}

/// Open position with fixed bracket levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Stop-loss level reached within the bar's range
    pub fn stop_hit(&self, bar: &Bar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.stop_loss,
            Direction::Short => bar.high >= self.stop_loss,
        }
    }

    /// Take-profit level reached within the bar's range
    pub fn target_hit(&self, bar: &Bar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.take_profit,
            Direction::Short => bar.low <= self.take_profit,
        }
    }

    /// P&L per unit of (contract size * lot size) at `price`
    pub fn price_move(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.direction.sign()
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SessionClose,
    OppositeSignal,
    EndOfSeries,
}

/// Closed trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub realized_pnl: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn holding_minutes(&self) -> i64 {
        (self.closed_at - self.opened_at).num_minutes()
    }
}

/// Performance metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Returns
    pub net_profit: f64,
    pub net_profit_pct: f64,
    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_duration_bars: usize,
    // Trade statistics
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub avg_holding_minutes: f64,
}

/// Outcome of one instrument's simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub instrument: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub net_profit: f64,
    /// Index of the first simulated bar
    pub warmup_index: usize,
    pub bars_processed: usize,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub drawdown_curve: Vec<(DateTime<Utc>, f64)>,
    pub trades: Vec<Trade>,
    /// Positions still open when the series ended
    pub open_positions: Vec<Position>,
    pub metrics: PerformanceMetrics,
}

impl SimulationResult {
    pub fn summary(&self) -> InstrumentSummary {
        InstrumentSummary {
            instrument: self.instrument.clone(),
            initial_balance: self.initial_balance,
            final_balance: self.final_balance,
            net_profit: self.net_profit,
            net_profit_pct: if self.initial_balance != 0.0 {
                self.net_profit / self.initial_balance * 100.0
            } else {
                0.0
            },
            total_trades: self.trades.len(),
        }
    }
}

/// Row of the multi-instrument summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub instrument: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub net_profit: f64,
    pub net_profit_pct: f64,
    pub total_trades: usize,
}
