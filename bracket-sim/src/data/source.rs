use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use common::{Bar, BarSeries, Result, SimError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::loader::load_csv;

/// Bar interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn duration(self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            other => Err(SimError::InvalidParameter(format!("unknown timeframe: {}", other))),
        }
    }
}

/// Which bars to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarRange {
    /// Inclusive on both ends
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// The most recent `n` bars
    Lookback(usize),
}

impl BarRange {
    /// Slice of `bars` that falls inside the range
    pub fn select<'a>(&self, bars: &'a [Bar]) -> &'a [Bar] {
        match *self {
            BarRange::Between { start, end } => {
                let from = bars.partition_point(|b| b.timestamp < start);
                let to = bars.partition_point(|b| b.timestamp <= end);
                &bars[from..to.max(from)]
            }
            BarRange::Lookback(n) => &bars[bars.len().saturating_sub(n)..],
        }
    }
}

/// Market-data collaborator
pub trait MarketDataSource: Send + Sync {
    /// Fetch bars for one instrument; `NoData` when nothing matches
    fn fetch_bars(&self, instrument: &str, timeframe: Timeframe, range: BarRange) -> Result<BarSeries>;
}

fn select_series(instrument: &str, bars: &[Bar], range: BarRange) -> Result<BarSeries> {
    let selected = range.select(bars);
    if selected.is_empty() {
        return Err(SimError::NoData {
            instrument: instrument.to_string(),
        });
    }
    BarSeries::new(instrument, selected.to_vec())
}

/// Series held in memory, keyed by instrument and timeframe
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    series: HashMap<(String, Timeframe), BarSeries>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timeframe: Timeframe, series: BarSeries) {
        self.series
            .insert((series.instrument().to_string(), timeframe), series);
    }

    pub fn with_series(mut self, timeframe: Timeframe, series: BarSeries) -> Self {
        self.insert(timeframe, series);
        self
    }
}

impl MarketDataSource for InMemorySource {
    fn fetch_bars(&self, instrument: &str, timeframe: Timeframe, range: BarRange) -> Result<BarSeries> {
        let series = self
            .series
            .get(&(instrument.to_string(), timeframe))
            .ok_or_else(|| SimError::NoData {
                instrument: instrument.to_string(),
            })?;
        select_series(instrument, series.bars(), range)
    }
}

/// CSV files laid out as `<dir>/<INSTRUMENT>_<TF>.csv` or `<dir>/<INSTRUMENT>.csv`
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidates(&self, instrument: &str, timeframe: Timeframe) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{}_{}.csv", instrument, timeframe)),
            self.dir.join(format!("{}.csv", instrument)),
        ]
    }
}

impl MarketDataSource for CsvDirectorySource {
    fn fetch_bars(&self, instrument: &str, timeframe: Timeframe, range: BarRange) -> Result<BarSeries> {
        let path = self
            .candidates(instrument, timeframe)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| SimError::NoData {
                instrument: instrument.to_string(),
            })?;

        debug!(instrument, path = %path.display(), "loading bars");
        let bars = load_csv(&path)?;
        select_series(instrument, &bars, range)
    }
}
