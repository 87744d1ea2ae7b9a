//! Order submission seam for live trading
//!
//! The simulation never goes through here. A [`LiveTrader`] evaluates the
//! latest bar of a freshly fetched series with the same plan, cooldown gate
//! and bracket sizing as the engine, then hands at most one order to an
//! [`OrderExecutor`]. Polling and broker connectivity live outside the crate.

use chrono::{DateTime, Timelike, Utc};
use common::{BarSeries, Direction, Result, SimError, SimulationParameters};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cooldown::CooldownGate;
use crate::data::{BarRange, MarketDataSource, Timeframe};
use crate::portfolio::bracket_levels;
use crate::signals::{BarContext, SignalEvaluator, StrategyPlan};

/// Market order with attached bracket levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub instrument: String,
    pub direction: Direction,
    pub lot_size: f64,
    /// Reference price the brackets were computed from
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Accepted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub ticket: u64,
    pub fill_price: f64,
}

/// External execution collaborator
pub trait OrderExecutor {
    /// Submit one order. Rejections surface as `OrderRejected`; no retry.
    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderResult>;
}

/// Records orders instead of sending them
#[derive(Debug, Default)]
pub struct PaperExecutor {
    submitted: Vec<OrderRequest>,
    reject_code: Option<i32>,
    next_ticket: u64,
}

impl PaperExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every order with `code`
    pub fn rejecting(code: i32) -> Self {
        Self {
            reject_code: Some(code),
            ..Default::default()
        }
    }

    pub fn set_reject_code(&mut self, code: Option<i32>) {
        self.reject_code = code;
    }

    /// Orders accepted so far
    pub fn submitted(&self) -> &[OrderRequest] {
        &self.submitted
    }
}

impl OrderExecutor for PaperExecutor {
    fn submit_order(&mut self, request: &OrderRequest) -> Result<OrderResult> {
        if let Some(code) = self.reject_code {
            return Err(SimError::OrderRejected { code });
        }
        self.next_ticket += 1;
        self.submitted.push(request.clone());
        Ok(OrderResult {
            ticket: self.next_ticket,
            fill_price: request.price,
        })
    }
}

/// Evaluates the newest bar and places bracket orders
///
/// Live mode keeps no position book. Brackets are resting orders at the
/// broker, and the forced session close is not issued from here. The caller
/// reports how many positions are open through [`LiveTrader::set_open_positions`]
/// so that `single_position` can be honoured. Each accepted order counts as
/// one more until the caller reports again.
pub struct LiveTrader<E: OrderExecutor> {
    params: SimulationParameters,
    plan: StrategyPlan,
    evaluator: SignalEvaluator,
    cooldown: CooldownGate,
    executor: E,
    open_positions: usize,
}

impl<E: OrderExecutor> LiveTrader<E> {
    pub fn new(params: SimulationParameters, executor: E) -> Result<Self> {
        params.validate()?;
        let plan = StrategyPlan::from_params(&params);
        let evaluator = SignalEvaluator::new(plan.rules.clone());
        let cooldown = CooldownGate::from_secs(params.cooldown_secs);
        Ok(Self {
            params,
            plan,
            evaluator,
            cooldown,
            executor,
            open_positions: 0,
        })
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    pub fn open_positions(&self) -> usize {
        self.open_positions
    }

    /// Open position count as reported by the broker
    pub fn set_open_positions(&mut self, count: usize) {
        self.open_positions = count;
    }

    /// Fetch the latest bars and act on them
    pub fn poll(
        &mut self,
        source: &dyn MarketDataSource,
        instrument: &str,
        timeframe: Timeframe,
        lookback: usize,
        trend_timeframe: Option<Timeframe>,
    ) -> Result<Option<OrderResult>> {
        let range = BarRange::Lookback(lookback);
        let series = source.fetch_bars(instrument, timeframe, range)?;
        let trend = match trend_timeframe {
            Some(tf) => Some(source.fetch_bars(instrument, tf, range)?),
            None => None,
        };
        self.on_series(&series, trend.as_ref(), Utc::now())
    }

    /// Evaluate the last bar of `series` and submit at most one order.
    ///
    /// Returns `Ok(None)` when no order is warranted. The cooldown is only
    /// updated when the executor accepts the order.
    pub fn on_series(
        &mut self,
        series: &BarSeries,
        trend: Option<&BarSeries>,
        now: DateTime<Utc>,
    ) -> Result<Option<OrderResult>> {
        let Some(bar) = series.last() else {
            return Err(SimError::NoData {
                instrument: series.instrument().to_string(),
            });
        };
        let instrument = series.instrument();
        let index = series.len() - 1;

        let indicators = self.plan.compute_indicators(series, trend)?;
        let signal = match self
            .evaluator
            .evaluate(&BarContext::new(index, series.bars(), &indicators))
        {
            Ok(signal) => signal,
            Err(SimError::IndicatorUndefined { indicator, .. }) => {
                debug!(instrument, %indicator, "indicator undefined on latest bar");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(direction) = signal.direction() else {
            return Ok(None);
        };

        if let Some(session) = self.params.session_close {
            if session.block_entries_after_close && bar.timestamp.hour() >= session.close_hour {
                debug!(instrument, "past session close, not entering");
                return Ok(None);
            }
        }

        if self.params.single_position && self.open_positions > 0 {
            debug!(instrument, open = self.open_positions, "position already open");
            return Ok(None);
        }

        if !self.cooldown.allow_entry(instrument, now) {
            debug!(instrument, %now, "cooldown active");
            return Ok(None);
        }

        let atr = self
            .plan
            .atr_key()
            .and_then(|key| indicators.value(&key, index));
        let Some((stop_loss, take_profit)) = bracket_levels(&self.plan.sizing, direction, bar.close, atr)
        else {
            return Ok(None);
        };

        let request = OrderRequest {
            instrument: instrument.to_string(),
            direction,
            lot_size: self.params.lot_size,
            price: bar.close,
            stop_loss,
            take_profit,
        };

        match self.executor.submit_order(&request) {
            Ok(result) => {
                self.cooldown.record_entry(instrument, now);
                self.open_positions += 1;
                info!(
                    instrument,
                    ?direction,
                    ticket = result.ticket,
                    price = result.fill_price,
                    sl = stop_loss,
                    tp = take_profit,
                    "order placed"
                );
                Ok(Some(result))
            }
            Err(e) => {
                warn!(instrument, error = %e, "order failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::{Bar, BracketSizing, MovingAverage, StrategyVariant};

    fn crossing_series() -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let closes = [10.0, 10.0, 10.0, 10.0, 10.5];
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::minutes(i as i64), c, c + 0.5, c - 0.5, c))
            .collect();
        BarSeries::new("BTCUSD", bars).unwrap()
    }

    fn params() -> SimulationParameters {
        SimulationParameters::default()
            .with_strategy(StrategyVariant::TrendCross {
                fast: MovingAverage::sma(2),
                slow: MovingAverage::sma(3),
                require_crossover: true,
                rsi_window: 14,
                rsi_buy_above: None,
                rsi_sell_below: None,
                band_breakout: None,
            })
            .with_sizing(BracketSizing::fixed_percent(0.01, 0.02))
            .with_cooldown_secs(120)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_places_order_on_signal() {
        let mut trader = LiveTrader::new(params(), PaperExecutor::new()).unwrap();
        let result = trader.on_series(&crossing_series(), None, now()).unwrap();

        assert_eq!(result.map(|r| r.ticket), Some(1));
        let order = &trader.executor().submitted()[0];
        assert_eq!(order.direction, Direction::Long);
        assert_eq!(order.price, 10.5);
        assert!((order.stop_loss - 10.395).abs() < 1e-9);
        assert!((order.take_profit - 10.71).abs() < 1e-9);
    }

    #[test]
    fn test_cooldown_blocks_repeat() {
        let mut trader = LiveTrader::new(params(), PaperExecutor::new()).unwrap();
        let series = crossing_series();

        assert!(trader.on_series(&series, None, now()).unwrap().is_some());
        assert!(trader
            .on_series(&series, None, now() + Duration::seconds(60))
            .unwrap()
            .is_none());
        assert!(trader
            .on_series(&series, None, now() + Duration::seconds(120))
            .unwrap()
            .is_some());
        assert_eq!(trader.executor().submitted().len(), 2);
    }

    #[test]
    fn test_rejection_leaves_cooldown_untouched() {
        let mut trader = LiveTrader::new(params(), PaperExecutor::rejecting(10019)).unwrap();
        let err = trader
            .on_series(&crossing_series(), None, now())
            .unwrap_err();

        assert!(matches!(err, SimError::OrderRejected { code: 10019 }));
        assert_eq!(trader.cooldown().state("BTCUSD").last_entry_time, None);
    }

    #[test]
    fn test_no_signal_no_order() {
        let mut trader = LiveTrader::new(params(), PaperExecutor::new()).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let bars = (0..5)
            .map(|i| Bar::new(start + Duration::minutes(i), 10.0, 10.5, 9.5, 10.0))
            .collect();
        let flat = BarSeries::new("BTCUSD", bars).unwrap();

        assert!(trader.on_series(&flat, None, now()).unwrap().is_none());
        assert!(trader.executor().submitted().is_empty());
    }

    #[test]
    fn test_poll_uses_source() {
        let source = crate::data::InMemorySource::new().with_series(Timeframe::M1, crossing_series());
        let mut trader = LiveTrader::new(params(), PaperExecutor::new()).unwrap();
        let placed = trader
            .poll(&source, "BTCUSD", Timeframe::M1, 5, None)
            .unwrap();
        assert!(placed.is_some());
    }

    #[test]
    fn test_single_position_uses_reported_count() {
        let mut trader =
            LiveTrader::new(params().with_cooldown_secs(0).with_single_position(), PaperExecutor::new()).unwrap();
        let series = crossing_series();

        assert!(trader.on_series(&series, None, now()).unwrap().is_some());
        assert_eq!(trader.open_positions(), 1);
        assert!(trader.on_series(&series, None, now()).unwrap().is_none());

        // broker reports the bracket was hit
        trader.set_open_positions(0);
        assert!(trader.on_series(&series, None, now()).unwrap().is_some());
        assert_eq!(trader.executor().submitted().len(), 2);
    }

    #[test]
    fn test_session_block_applies_live() {
        let mut trader = LiveTrader::new(params().with_session_close(9), PaperExecutor::new()).unwrap();
        assert!(trader.on_series(&crossing_series(), None, now()).unwrap().is_none());
        assert!(trader.executor().submitted().is_empty());
    }
}
