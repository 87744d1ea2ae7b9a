pub mod align;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;

use std::collections::BTreeMap;

use common::{BarSeries, MaKind, MovingAverage, Result, SimError};

pub use align::align_to;
pub use atr::{calculate_atr, true_range};
pub use bollinger::{calculate_bollinger_bands, BollingerBands};
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use sma::{calculate_sma, rolling_std_dev};

/// Indicator values aligned 1:1 with a bar series; `None` while warming up
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSeries {
    values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn from_values(values: Vec<Option<f64>>) -> Self {
        Self { values }
    }

    pub fn undefined(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied().flatten()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the first defined value
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(|v| v.is_some())
    }

    pub fn is_all_undefined(&self) -> bool {
        self.values.iter().all(|v| v.is_none())
    }
}

/// Supported indicator kinds and their parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorSpec {
    Sma { window: usize },
    Ema { window: usize },
    Rsi { window: usize },
    BollingerBands { window: usize, num_std_dev: f64 },
    Atr { window: usize },
}

impl IndicatorSpec {
    pub fn moving_average(ma: MovingAverage) -> Self {
        match ma.kind {
            MaKind::Sma => IndicatorSpec::Sma { window: ma.window },
            MaKind::Ema => IndicatorSpec::Ema { window: ma.window },
        }
    }

    /// Fewest bars that yield at least one defined value
    pub fn min_bars(&self) -> usize {
        match *self {
            IndicatorSpec::Rsi { window } => window + 1,
            IndicatorSpec::Sma { window }
            | IndicatorSpec::Ema { window }
            | IndicatorSpec::BollingerBands { window, .. }
            | IndicatorSpec::Atr { window } => window,
        }
    }

    /// Name under which the output is stored in an [`IndicatorSet`]
    pub fn label(&self) -> String {
        match *self {
            IndicatorSpec::Sma { window } => format!("sma_{}", window),
            IndicatorSpec::Ema { window } => format!("ema_{}", window),
            IndicatorSpec::Rsi { window } => format!("rsi_{}", window),
            IndicatorSpec::BollingerBands {
                window,
                num_std_dev,
            } => format!("bb_{}_{}", window, num_std_dev),
            IndicatorSpec::Atr { window } => format!("atr_{}", window),
        }
    }
}

/// Result of [`compute`]
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutput {
    Single(IndicatorSeries),
    Bands(BollingerBands),
}

/// Compute one indicator over a bar series.
///
/// Fails with `InsufficientData` when the series cannot produce a single
/// defined value.
pub fn compute(series: &BarSeries, spec: &IndicatorSpec) -> Result<IndicatorOutput> {
    let required = spec.min_bars();
    if series.len() < required || required == 0 {
        return Err(SimError::InsufficientData {
            required,
            actual: series.len(),
        });
    }

    let closes = series.closes();
    let output = match *spec {
        IndicatorSpec::Sma { window } => IndicatorOutput::Single(calculate_sma(&closes, window)),
        IndicatorSpec::Ema { window } => IndicatorOutput::Single(calculate_ema(&closes, window)),
        IndicatorSpec::Rsi { window } => IndicatorOutput::Single(calculate_rsi(&closes, window)),
        IndicatorSpec::BollingerBands {
            window,
            num_std_dev,
        } => IndicatorOutput::Bands(calculate_bollinger_bands(&closes, window, num_std_dev)),
        IndicatorSpec::Atr { window } => IndicatorOutput::Single(calculate_atr(
            &series.highs(),
            &series.lows(),
            &closes,
            window,
        )),
    };
    Ok(output)
}

/// Key of a band inside an [`IndicatorSet`], e.g. `bb_20_2.upper`
pub fn band_key(label: &str, band: &str) -> String {
    format!("{}.{}", label, band)
}

/// Named indicator series sharing one bar series' index space
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    len: usize,
    series: BTreeMap<String, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            series: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, series: IndicatorSeries) -> Result<()> {
        let name = name.into();
        if series.len() != self.len {
            return Err(SimError::InvalidParameter(format!(
                "indicator {} has {} values, expected {}",
                name,
                series.len(),
                self.len
            )));
        }
        self.series.insert(name, series);
        Ok(())
    }

    /// Store a computed output; bands land under `<label>.upper|middle|lower`
    pub fn insert_output(&mut self, label: &str, output: IndicatorOutput) -> Result<()> {
        match output {
            IndicatorOutput::Single(series) => self.insert(label, series),
            IndicatorOutput::Bands(bands) => {
                self.insert(band_key(label, "upper"), bands.upper)?;
                self.insert(band_key(label, "middle"), bands.middle)?;
                self.insert(band_key(label, "lower"), bands.lower)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorSeries> {
        self.series.get(name)
    }

    pub fn value(&self, name: &str, idx: usize) -> Option<f64> {
        self.series.get(name).and_then(|s| s.get(idx))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// First index at which every series is defined; `None` if some series
    /// never becomes defined.
    pub fn warmup_boundary(&self) -> Option<usize> {
        self.series
            .values()
            .map(|s| s.first_defined())
            .try_fold(0usize, |acc, first| first.map(|f| acc.max(f)))
    }
}
