use common::{BarSeries, BracketSizing, Result, SimError, SimulationParameters, StrategyVariant};
use tracing::debug;

use super::evaluator::{CmpOp, Condition, Operand, SignalRules};
use crate::indicators::{align_to, band_key, compute, IndicatorOutput, IndicatorSet, IndicatorSpec};

/// Prefix for indicators computed on the higher-timeframe series
const TREND_PREFIX: &str = "trend.";

/// Indicators and rules a strategy variant needs, resolved once per run
#[derive(Debug, Clone)]
pub struct StrategyPlan {
    /// Computed on the traded series
    pub indicators: Vec<IndicatorSpec>,
    /// Computed on the higher-timeframe series when one is supplied
    pub trend_indicators: Vec<IndicatorSpec>,
    pub rules: SignalRules,
    pub sizing: BracketSizing,
}

impl StrategyPlan {
    pub fn from_params(params: &SimulationParameters) -> Self {
        let mut plan = Self {
            indicators: Vec::new(),
            trend_indicators: Vec::new(),
            rules: SignalRules::default(),
            sizing: params.sizing,
        };

        match &params.strategy {
            StrategyVariant::TrendCross {
                fast,
                slow,
                require_crossover,
                rsi_window,
                rsi_buy_above,
                rsi_sell_below,
                band_breakout,
            } => {
                let fast = plan.add(IndicatorSpec::moving_average(*fast));
                let slow = plan.add(IndicatorSpec::moving_average(*slow));
                if *require_crossover {
                    plan.rules.buy.push(Condition::CrossAbove {
                        fast: fast.clone(),
                        slow: slow.clone(),
                    });
                    plan.rules.sell.push(Condition::CrossBelow { fast, slow });
                } else {
                    plan.rules
                        .buy
                        .push(Condition::compare(fast.clone(), CmpOp::Gt, slow.clone()));
                    plan.rules.sell.push(Condition::compare(fast, CmpOp::Lt, slow));
                }

                if rsi_buy_above.is_some() || rsi_sell_below.is_some() {
                    let rsi = plan.add(IndicatorSpec::Rsi {
                        window: *rsi_window,
                    });
                    if let Some(level) = rsi_buy_above {
                        plan.rules.buy.push(Condition::compare(
                            rsi.clone(),
                            CmpOp::Gt,
                            Operand::Value(*level),
                        ));
                    }
                    if let Some(level) = rsi_sell_below {
                        plan.rules
                            .sell
                            .push(Condition::compare(rsi, CmpOp::Lt, Operand::Value(*level)));
                    }
                }

                if let Some(band) = band_breakout {
                    let (upper, lower) = plan.add_bands(band.window, band.num_std_dev);
                    plan.rules
                        .buy
                        .push(Condition::compare(Operand::Close, CmpOp::Gt, upper));
                    plan.rules
                        .sell
                        .push(Condition::compare(Operand::Close, CmpOp::Lt, lower));
                }
            }
            StrategyVariant::MeanReversionBand {
                fast,
                slow,
                rsi_window,
                rsi_floor,
                rsi_ceiling,
                band,
            } => {
                let fast = plan.add(IndicatorSpec::moving_average(*fast));
                let slow = plan.add(IndicatorSpec::moving_average(*slow));
                let rsi = plan.add(IndicatorSpec::Rsi {
                    window: *rsi_window,
                });
                let (upper, lower) = plan.add_bands(band.window, band.num_std_dev);

                plan.rules.buy = vec![
                    Condition::compare(fast.clone(), CmpOp::Gt, slow.clone()),
                    Condition::compare(rsi.clone(), CmpOp::Gt, Operand::Value(*rsi_floor)),
                    Condition::compare(Operand::Close, CmpOp::Le, lower),
                ];
                plan.rules.sell = vec![
                    Condition::compare(fast, CmpOp::Lt, slow),
                    Condition::compare(rsi, CmpOp::Lt, Operand::Value(*rsi_ceiling)),
                    Condition::compare(Operand::Close, CmpOp::Ge, upper),
                ];
            }
            StrategyVariant::RsiBandTrendFilter {
                rsi_window,
                rsi_low,
                rsi_high,
                trend_window,
            } => {
                let rsi = plan.add(IndicatorSpec::Rsi {
                    window: *rsi_window,
                });
                let trend_spec = IndicatorSpec::Sma {
                    window: *trend_window,
                };
                plan.trend_indicators.push(trend_spec);
                let trend = Operand::indicator(trend_key(&trend_spec));

                let in_band = Condition::Between {
                    operand: rsi,
                    low: *rsi_low,
                    high: *rsi_high,
                };
                plan.rules.buy = vec![
                    in_band.clone(),
                    Condition::compare(Operand::Close, CmpOp::Gt, trend.clone()),
                ];
                plan.rules.sell = vec![
                    in_band,
                    Condition::compare(Operand::Close, CmpOp::Lt, trend),
                ];
            }
        }

        if let BracketSizing::AtrMultiple { atr_window, .. } = params.sizing {
            plan.add(IndicatorSpec::Atr { window: atr_window });
        }

        plan
    }

    fn add(&mut self, spec: IndicatorSpec) -> Operand {
        if !self.indicators.contains(&spec) {
            self.indicators.push(spec);
        }
        Operand::indicator(spec.label())
    }

    fn add_bands(&mut self, window: usize, num_std_dev: f64) -> (Operand, Operand) {
        let spec = IndicatorSpec::BollingerBands {
            window,
            num_std_dev,
        };
        self.add(spec);
        let label = spec.label();
        (
            Operand::indicator(band_key(&label, "upper")),
            Operand::indicator(band_key(&label, "lower")),
        )
    }

    /// Key of the ATR series used for bracket sizing
    pub fn atr_key(&self) -> Option<String> {
        match self.sizing {
            BracketSizing::AtrMultiple { atr_window, .. } => {
                Some(IndicatorSpec::Atr { window: atr_window }.label())
            }
            BracketSizing::FixedPercent { .. } => None,
        }
    }

    /// Fewest bars of the traded series needed to leave warmup
    pub fn min_bars(&self, has_trend_series: bool) -> usize {
        let primary = self.indicators.iter().map(IndicatorSpec::min_bars);
        if has_trend_series {
            primary.max().unwrap_or(1)
        } else {
            primary
                .chain(self.trend_indicators.iter().map(IndicatorSpec::min_bars))
                .max()
                .unwrap_or(1)
        }
    }

    /// Compute every indicator the plan needs, aligned with `series`.
    ///
    /// Trend indicators come from `trend` when supplied, otherwise from
    /// `series` itself.
    pub fn compute_indicators(&self, series: &BarSeries, trend: Option<&BarSeries>) -> Result<IndicatorSet> {
        let required = self.min_bars(trend.is_some());
        if series.len() < required {
            return Err(SimError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let mut set = IndicatorSet::new(series.len());
        for spec in &self.indicators {
            set.insert_output(&spec.label(), compute(series, spec)?)?;
        }

        for spec in &self.trend_indicators {
            let key = trend_key(spec);
            let output = match trend {
                Some(trend_series) => {
                    let projected = match compute(trend_series, spec)? {
                        IndicatorOutput::Single(values) => align_to(series, trend_series, &values),
                        IndicatorOutput::Bands(bands) => align_to(series, trend_series, &bands.middle),
                    };
                    IndicatorOutput::Single(projected)
                }
                None => {
                    debug!(indicator = %key, "no trend series supplied, using traded series");
                    compute(series, spec)?
                }
            };
            set.insert_output(&key, output)?;
        }

        Ok(set)
    }
}

fn trend_key(spec: &IndicatorSpec) -> String {
    format!("{}{}", TREND_PREFIX, spec.label())
}
