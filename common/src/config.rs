use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Moving average flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaKind {
    Sma,
    Ema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverage {
    pub kind: MaKind,
    pub window: usize,
}

impl MovingAverage {
    pub fn sma(window: usize) -> Self {
        Self {
            kind: MaKind::Sma,
            window,
        }
    }

    pub fn ema(window: usize) -> Self {
        Self {
            kind: MaKind::Ema,
            window,
        }
    }
}

/// Bollinger band parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandParams {
    pub window: usize,
    pub num_std_dev: f64,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            window: 20,
            num_std_dev: 2.0,
        }
    }
}

/// Entry rule family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyVariant {
    /// Fast MA above/below slow MA, optionally requiring a fresh crossover,
    /// an RSI split and a close beyond the opposite Bollinger band.
    TrendCross {
        fast: MovingAverage,
        slow: MovingAverage,
        require_crossover: bool,
        rsi_window: usize,
        /// Buy requires RSI above this
        rsi_buy_above: Option<f64>,
        /// Sell requires RSI below this
        rsi_sell_below: Option<f64>,
        /// Buy requires close above the upper band, sell below the lower band
        #[serde(default)]
        band_breakout: Option<BandParams>,
    },
    /// Buy when trending up but the close touches the lower band, sell the mirror image.
    MeanReversionBand {
        fast: MovingAverage,
        slow: MovingAverage,
        rsi_window: usize,
        /// Buy requires RSI above this
        rsi_floor: f64,
        /// Sell requires RSI below this
        rsi_ceiling: f64,
        band: BandParams,
    },
    /// RSI inside (low, high); direction picked by close versus a
    /// higher-timeframe SMA.
    RsiBandTrendFilter {
        rsi_window: usize,
        rsi_low: f64,
        rsi_high: f64,
        trend_window: usize,
    },
}

/// Stop-loss / take-profit placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BracketSizing {
    AtrMultiple {
        atr_window: usize,
        stop_mult: f64,
        target_mult: f64,
    },
    /// Fractions of the entry price (0.01 = 1%)
    FixedPercent { stop_pct: f64, target_pct: f64 },
}

impl BracketSizing {
    pub fn atr(atr_window: usize, stop_mult: f64, target_mult: f64) -> Self {
        BracketSizing::AtrMultiple {
            atr_window,
            stop_mult,
            target_mult,
        }
    }

    pub fn fixed_percent(stop_pct: f64, target_pct: f64) -> Self {
        BracketSizing::FixedPercent {
            stop_pct,
            target_pct,
        }
    }
}

/// Forced close of all positions at a fixed UTC hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClose {
    pub close_hour: u32,
    #[serde(default = "default_true")]
    pub block_entries_after_close: bool,
}

fn default_true() -> bool {
    true
}

impl SessionClose {
    pub fn at_hour(close_hour: u32) -> Self {
        Self {
            close_hour,
            block_entries_after_close: true,
        }
    }
}

/// What happens to positions still open on the final bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfSeriesPolicy {
    /// Leave them open; their P&L never reaches the balance
    #[default]
    LeaveOpen,
    /// Close them at the last bar's close
    MarkToMarket,
}

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub initial_balance: f64,
    /// Units per lot (100 000 for standard FX lots)
    pub contract_size: f64,
    pub lot_size: f64,
    pub strategy: StrategyVariant,
    pub sizing: BracketSizing,
    /// Minimum seconds between consecutive entries
    #[serde(default)]
    pub cooldown_secs: Option<i64>,
    #[serde(default)]
    pub session_close: Option<SessionClose>,
    /// At most one open position at a time
    #[serde(default)]
    pub single_position: bool,
    /// Close positions at the bar's close when the opposite signal fires
    #[serde(default)]
    pub exit_on_opposite_signal: bool,
    #[serde(default)]
    pub end_of_series: EndOfSeriesPolicy,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            initial_balance: 10000.0,
            contract_size: 100_000.0,
            lot_size: 0.1,
            strategy: StrategyVariant::MeanReversionBand {
                fast: MovingAverage::ema(9),
                slow: MovingAverage::ema(21),
                rsi_window: 14,
                rsi_floor: 30.0,
                rsi_ceiling: 70.0,
                band: BandParams::default(),
            },
            sizing: BracketSizing::atr(14, 1.0, 1.5),
            cooldown_secs: None,
            session_close: None,
            single_position: false,
            exit_on_opposite_signal: false,
            end_of_series: EndOfSeriesPolicy::LeaveOpen,
        }
    }
}

impl SimulationParameters {
    /// EMA 20/50 trend with an RSI 50 split, flat by 16:00
    pub fn intraday_trend() -> Self {
        Self {
            strategy: StrategyVariant::TrendCross {
                fast: MovingAverage::ema(20),
                slow: MovingAverage::ema(50),
                require_crossover: false,
                rsi_window: 14,
                rsi_buy_above: Some(50.0),
                rsi_sell_below: Some(50.0),
                band_breakout: None,
            },
            sizing: BracketSizing::atr(14, 1.5, 2.0),
            session_close: Some(SessionClose::at_hour(16)),
            ..Default::default()
        }
    }

    /// Fresh SMA 10/30 crossover confirmed by RSI and a band breakout
    pub fn crossover_breakout() -> Self {
        Self {
            strategy: StrategyVariant::TrendCross {
                fast: MovingAverage::sma(10),
                slow: MovingAverage::sma(30),
                require_crossover: true,
                rsi_window: 14,
                rsi_buy_above: Some(50.0),
                rsi_sell_below: Some(50.0),
                band_breakout: Some(BandParams::default()),
            },
            sizing: BracketSizing::atr(14, 1.0, 2.0),
            cooldown_secs: Some(15 * 60),
            ..Default::default()
        }
    }

    /// Band mean reversion with a short cooldown
    pub fn scalping() -> Self {
        Self {
            cooldown_secs: Some(2 * 60),
            ..Default::default()
        }
    }

    /// RSI 40-60 band filtered by a higher-timeframe SMA(200)
    pub fn conservative_intraday() -> Self {
        Self {
            strategy: StrategyVariant::RsiBandTrendFilter {
                rsi_window: 14,
                rsi_low: 40.0,
                rsi_high: 60.0,
                trend_window: 200,
            },
            sizing: BracketSizing::fixed_percent(0.01, 0.03),
            cooldown_secs: Some(15 * 60),
            ..Default::default()
        }
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "default" | "mean-reversion" => Ok(Self::default()),
            "intraday-trend" => Ok(Self::intraday_trend()),
            "crossover-breakout" => Ok(Self::crossover_breakout()),
            "scalping" => Ok(Self::scalping()),
            "conservative-intraday" => Ok(Self::conservative_intraday()),
            other => Err(SimError::InvalidParameter(format!("unknown preset: {}", other))),
        }
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let params: Self = match ext.as_str() {
            "toml" => toml::from_str(&text).map_err(|e| SimError::ConfigError(e.to_string()))?,
            "json" => serde_json::from_str(&text)?,
            _ => {
                return Err(SimError::ConfigError(format!(
                    "Unsupported config format: {}",
                    ext
                )))
            }
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(SimError::InvalidParameter(format!("{} must be positive, got {}", name, v)))
            }
        };
        let non_negative = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(SimError::InvalidParameter(format!("{} must not be negative, got {}", name, v)))
            }
        };
        let window = |name: &str, w: usize| {
            if w > 0 {
                Ok(())
            } else {
                Err(SimError::InvalidParameter(format!("{} window must be non-zero", name)))
            }
        };

        positive("initial_balance", self.initial_balance)?;
        positive("contract_size", self.contract_size)?;
        positive("lot_size", self.lot_size)?;

        match &self.strategy {
            StrategyVariant::TrendCross {
                fast,
                slow,
                rsi_window,
                band_breakout,
                ..
            } => {
                window("fast", fast.window)?;
                window("slow", slow.window)?;
                window("rsi", *rsi_window)?;
                if let Some(band) = band_breakout {
                    window("band", band.window)?;
                    non_negative("num_std_dev", band.num_std_dev)?;
                }
            }
            StrategyVariant::MeanReversionBand {
                fast,
                slow,
                rsi_window,
                band,
                ..
            } => {
                window("fast", fast.window)?;
                window("slow", slow.window)?;
                window("rsi", *rsi_window)?;
                window("band", band.window)?;
                non_negative("num_std_dev", band.num_std_dev)?;
            }
            StrategyVariant::RsiBandTrendFilter {
                rsi_window,
                rsi_low,
                rsi_high,
                trend_window,
            } => {
                window("rsi", *rsi_window)?;
                window("trend", *trend_window)?;
                if rsi_low >= rsi_high {
                    return Err(SimError::InvalidParameter(format!(
                        "rsi_low ({}) must be below rsi_high ({})",
                        rsi_low, rsi_high
                    )));
                }
            }
        }

        match self.sizing {
            BracketSizing::AtrMultiple {
                atr_window,
                stop_mult,
                target_mult,
            } => {
                window("atr", atr_window)?;
                non_negative("stop_mult", stop_mult)?;
                non_negative("target_mult", target_mult)?;
            }
            BracketSizing::FixedPercent {
                stop_pct,
                target_pct,
            } => {
                non_negative("stop_pct", stop_pct)?;
                non_negative("target_pct", target_pct)?;
            }
        }

        if let Some(secs) = self.cooldown_secs {
            if secs < 0 {
                return Err(SimError::InvalidParameter(format!(
                    "cooldown_secs must not be negative, got {}",
                    secs
                )));
            }
        }

        if let Some(session) = self.session_close {
            if session.close_hour > 23 {
                return Err(SimError::InvalidParameter(format!(
                    "close_hour must be 0-23, got {}",
                    session.close_hour
                )));
            }
        }

        Ok(())
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_balance = capital;
        self
    }

    pub fn with_lot_size(mut self, lot_size: f64) -> Self {
        self.lot_size = lot_size;
        self
    }

    pub fn with_contract_size(mut self, contract_size: f64) -> Self {
        self.contract_size = contract_size;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyVariant) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_sizing(mut self, sizing: BracketSizing) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn with_cooldown_secs(mut self, secs: i64) -> Self {
        self.cooldown_secs = Some(secs);
        self
    }

    pub fn with_session_close(mut self, close_hour: u32) -> Self {
        self.session_close = Some(SessionClose::at_hour(close_hour));
        self
    }

    pub fn with_single_position(mut self) -> Self {
        self.single_position = true;
        self
    }

    pub fn with_exit_on_opposite_signal(mut self) -> Self {
        self.exit_on_opposite_signal = true;
        self
    }

    pub fn with_end_of_series(mut self, policy: EndOfSeriesPolicy) -> Self {
        self.end_of_series = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        for name in [
            "default",
            "intraday-trend",
            "crossover-breakout",
            "scalping",
            "conservative-intraday",
        ] {
            let params = SimulationParameters::preset(name).unwrap();
            assert!(params.validate().is_ok(), "preset {} should validate", name);
        }
    }

    #[test]
    fn test_unknown_preset() {
        assert!(SimulationParameters::preset("martingale").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SimulationParameters::default().with_lot_size(0.0).validate().is_err());
        assert!(SimulationParameters::default().with_cooldown_secs(-1).validate().is_err());
        assert!(SimulationParameters::default().with_session_close(24).validate().is_err());
        let zero_atr = SimulationParameters::default().with_sizing(BracketSizing::atr(0, 1.0, 1.0));
        assert!(zero_atr.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let params = SimulationParameters::crossover_breakout().with_single_position();
        let text = toml::to_string(&params).unwrap();
        let parsed: SimulationParameters = toml::from_str(&text).unwrap();
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_toml_optional_fields_default() {
        let text = r#"
initial_balance = 5000.0
contract_size = 100000.0
lot_size = 0.05

[strategy]
type = "rsi_band_trend_filter"
rsi_window = 14
rsi_low = 40.0
rsi_high = 60.0
trend_window = 200

[sizing]
type = "fixed_percent"
stop_pct = 0.01
target_pct = 0.03
"#;
        let params: SimulationParameters = toml::from_str(text).unwrap();
        assert_eq!(params.cooldown_secs, None);
        assert!(!params.single_position);
        assert_eq!(params.end_of_series, EndOfSeriesPolicy::LeaveOpen);
        assert!(params.validate().is_ok());
    }
}
