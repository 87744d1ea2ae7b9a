use std::time::Instant;

use chrono::{DateTime, Timelike, Utc};
use common::{
    Bar, BarSeries, Direction, EndOfSeriesPolicy, ExitReason, Result, SimError, SimulationParameters,
    SimulationResult, Signal,
};
use tracing::{debug, info};

use crate::cooldown::CooldownGate;
use crate::indicators::IndicatorSet;
use crate::metrics::MetricsCalculator;
use crate::portfolio::{bracket_levels, Portfolio};
use crate::signals::{BarContext, SignalEvaluator, StrategyPlan};

/// Mutable state of one instrument's run, owned by the loop driving it
#[derive(Debug)]
pub struct SimulationState {
    pub instrument: String,
    pub portfolio: Portfolio,
    pub cooldown: CooldownGate,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
}

impl SimulationState {
    pub fn new(instrument: impl Into<String>, params: &SimulationParameters) -> Self {
        Self {
            instrument: instrument.into(),
            portfolio: Portfolio::new(params.initial_balance, params.contract_size, params.lot_size),
            cooldown: CooldownGate::from_secs(params.cooldown_secs),
            equity_curve: Vec::new(),
        }
    }
}

/// Bar-by-bar bracket-order simulation for one instrument
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    params: SimulationParameters,
    plan: StrategyPlan,
    evaluator: SignalEvaluator,
}

impl SimulationEngine {
    pub fn new(params: SimulationParameters) -> Result<Self> {
        params.validate()?;
        let plan = StrategyPlan::from_params(&params);
        let evaluator = SignalEvaluator::new(plan.rules.clone());
        Ok(Self {
            params,
            plan,
            evaluator,
        })
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn plan(&self) -> &StrategyPlan {
        &self.plan
    }

    /// Run the simulation over `series`.
    ///
    /// # Arguments
    /// * `series` - Traded bars
    /// * `trend` - Optional higher-timeframe bars for trend-filtered variants
    ///
    /// # Returns
    /// The equity curve holds one sample per bar from the warmup boundary
    /// to the end of the series. Fails with `InsufficientData` when the series
    /// is too short for the configured indicators.
    pub fn run(&self, series: &BarSeries, trend: Option<&BarSeries>) -> Result<SimulationResult> {
        let start_time = Instant::now();

        let indicators = self.plan.compute_indicators(series, trend)?;
        let warmup = indicators
            .warmup_boundary()
            .ok_or_else(|| SimError::InsufficientData {
                required: self.plan.min_bars(trend.is_some()),
                actual: series.len(),
            })?;

        info!(
            instrument = series.instrument(),
            bars = series.len(),
            warmup,
            "starting simulation"
        );

        let mut state = SimulationState::new(series.instrument(), &self.params);
        state.equity_curve.reserve(series.len() - warmup);

        for index in warmup..series.len() {
            self.step(&mut state, series.bars(), &indicators, index)?;
        }

        let result = self.finish(state, series, warmup);
        info!(
            instrument = %result.instrument,
            trades = result.trades.len(),
            open = result.open_positions.len(),
            net_profit = result.net_profit,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "simulation finished"
        );
        Ok(result)
    }

    /// Advance `state` by the bar at `index`
    pub fn step(
        &self,
        state: &mut SimulationState,
        bars: &[Bar],
        indicators: &IndicatorSet,
        index: usize,
    ) -> Result<()> {
        let bar = &bars[index];

        // Bracket exits use fixed levels, so they resolve even when the
        // indicators are undefined on this bar
        state.portfolio.resolve_exits(bar);

        let mut entries_blocked = false;
        if let Some(session) = self.params.session_close {
            if bar.timestamp.hour() >= session.close_hour {
                let closed = state
                    .portfolio
                    .close_all(bar.close, bar.timestamp, ExitReason::SessionClose);
                if closed > 0 {
                    debug!(instrument = %state.instrument, closed, ts = %bar.timestamp, "session close");
                }
                entries_blocked = session.block_entries_after_close;
            }
        }

        let ctx = BarContext::new(index, bars, indicators);
        let signal = match self.evaluator.evaluate(&ctx) {
            Ok(signal) => signal,
            Err(SimError::IndicatorUndefined { indicator, index }) => {
                debug!(%indicator, index, "indicator undefined, skipping signal");
                Signal::NoSignal
            }
            Err(e) => return Err(e),
        };

        if let Some(direction) = signal.direction() {
            if self.params.exit_on_opposite_signal {
                state.portfolio.close_direction(
                    direction.opposite(),
                    bar.close,
                    bar.timestamp,
                    ExitReason::OppositeSignal,
                );
            }

            if !entries_blocked {
                self.try_entry(state, bar, indicators, index, direction)?;
            }
        }

        if index + 1 == bars.len() && self.params.end_of_series == EndOfSeriesPolicy::MarkToMarket {
            state
                .portfolio
                .close_all(bar.close, bar.timestamp, ExitReason::EndOfSeries);
        }

        state
            .equity_curve
            .push((bar.timestamp, state.portfolio.balance()));
        Ok(())
    }

    fn try_entry(
        &self,
        state: &mut SimulationState,
        bar: &Bar,
        indicators: &IndicatorSet,
        index: usize,
        direction: Direction,
    ) -> Result<()> {
        if !state.cooldown.allow_entry(&state.instrument, bar.timestamp) {
            debug!(instrument = %state.instrument, ts = %bar.timestamp, "entry blocked by cooldown");
            return Ok(());
        }
        if self.params.single_position && state.portfolio.has_open_positions() {
            return Ok(());
        }

        let atr = self
            .plan
            .atr_key()
            .and_then(|key| indicators.value(&key, index));
        let Some((stop_loss, take_profit)) =
            bracket_levels(&self.plan.sizing, direction, bar.close, atr)
        else {
            debug!(index, "ATR undefined, skipping entry");
            return Ok(());
        };

        state
            .portfolio
            .open_position(direction, bar.close, stop_loss, take_profit, bar.timestamp)?;
        state.cooldown.record_entry(&state.instrument, bar.timestamp);
        Ok(())
    }

    fn finish(&self, state: SimulationState, series: &BarSeries, warmup: usize) -> SimulationResult {
        let SimulationState {
            instrument,
            portfolio,
            equity_curve,
            ..
        } = state;

        let trades = portfolio.trades().to_vec();
        let metrics =
            MetricsCalculator::calculate(&equity_curve, &trades, self.params.initial_balance);
        let drawdown_curve = MetricsCalculator::calculate_drawdown_curve(&equity_curve);
        let final_balance = portfolio.balance();

        SimulationResult {
            instrument,
            initial_balance: self.params.initial_balance,
            final_balance,
            net_profit: final_balance - self.params.initial_balance,
            warmup_index: warmup,
            bars_processed: series.len() - warmup,
            equity_curve,
            drawdown_curve,
            trades,
            open_positions: portfolio.open_positions().to_vec(),
            metrics,
        }
    }
}
