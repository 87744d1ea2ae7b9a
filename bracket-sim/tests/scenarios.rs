//! End-to-end runs over hand-built bar series.

use approx::assert_relative_eq;
use chrono::{Duration, TimeZone, Utc};

use bracket_sim::{
    generate_synthetic_bars, Bar, BarRange, BarSeries, BatchRunner, BracketSizing, Direction,
    ExitReason, InMemorySource, InstrumentRequest, MovingAverage, SimError, SimulationEngine,
    SimulationParameters, StrategyVariant, Timeframe,
};

fn hourly_bars(closes: &[f64], start_hour: u32) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, start_hour, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(start + Duration::hours(i as i64), c, c + 0.5, c - 0.5, c))
        .collect()
}

fn sma_crossover() -> StrategyVariant {
    StrategyVariant::TrendCross {
        fast: MovingAverage::sma(2),
        slow: MovingAverage::sma(3),
        require_crossover: true,
        rsi_window: 14,
        rsi_buy_above: None,
        rsi_sell_below: None,
        band_breakout: None,
    }
}

fn base_params() -> SimulationParameters {
    SimulationParameters::default()
        .with_capital(10000.0)
        .with_contract_size(1000.0)
        .with_lot_size(0.1)
        .with_strategy(sma_crossover())
}

#[test]
fn crossover_long_stopped_out() {
    let mut bars = hourly_bars(&[10.0, 10.0, 10.0, 10.0, 10.5, 10.0], 8);
    bars[5].low = 9.4;
    let series = BarSeries::new("EURUSD", bars).unwrap();

    let params = base_params().with_sizing(BracketSizing::atr(3, 1.0, 2.0));
    let result = SimulationEngine::new(params).unwrap().run(&series, None).unwrap();

    assert_eq!(result.warmup_index, 2);
    assert_eq!(result.equity_curve.len(), 4);
    assert_eq!(result.trades.len(), 1);
    assert!(result.open_positions.is_empty());

    let trade = &result.trades[0];
    assert_eq!(trade.direction, Direction::Long);
    assert_eq!(trade.entry_price, 10.5);
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_relative_eq!(trade.stop_loss, 9.5, epsilon = 1e-9);
    assert_relative_eq!(trade.take_profit, 12.5, epsilon = 1e-9);
    assert_eq!(trade.exit_price, trade.stop_loss);

    // initial - (entry - stop) * contract * lot
    let expected = 10000.0 - (10.5 - trade.stop_loss) * 1000.0 * 0.1;
    assert_relative_eq!(result.final_balance, expected, epsilon = 1e-9);
    assert_relative_eq!(result.final_balance, 9900.0, epsilon = 1e-9);
    assert_relative_eq!(result.equity_curve[2].1, 10000.0);
    assert_relative_eq!(result.equity_curve[3].1, 9900.0, epsilon = 1e-9);
}

fn crossover_with_rsi_gate(buy_above: f64) -> StrategyVariant {
    StrategyVariant::TrendCross {
        fast: MovingAverage::sma(2),
        slow: MovingAverage::sma(3),
        require_crossover: true,
        rsi_window: 4,
        rsi_buy_above: Some(buy_above),
        rsi_sell_below: None,
        band_breakout: None,
    }
}

#[test]
fn crossover_long_with_neutral_rsi() {
    // one gain and one loss of 0.5 in the first RSI(4) window: RSI reads 50 on the crossover bar
    let mut bars = hourly_bars(&[10.5, 10.0, 10.0, 10.0, 10.5, 10.0], 8);
    bars[5].low = 9.4;
    let series = BarSeries::new("EURUSD", bars).unwrap();

    let params = base_params()
        .with_strategy(crossover_with_rsi_gate(45.0))
        .with_sizing(BracketSizing::atr(3, 1.0, 2.0));
    let result = SimulationEngine::new(params.clone()).unwrap().run(&series, None).unwrap();

    // RSI(4) is the last indicator to come defined, on the crossover bar itself
    assert_eq!(result.warmup_index, 4);
    assert_eq!(result.equity_curve.len(), 2);
    assert_eq!(result.trades.len(), 1);

    let trade = &result.trades[0];
    assert_eq!(trade.direction, Direction::Long);
    assert_eq!(trade.opened_at, series.bars()[4].timestamp);
    assert_eq!(trade.entry_price, 10.5);
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_relative_eq!(trade.stop_loss, 9.5, epsilon = 1e-9);
    assert_relative_eq!(result.final_balance, 9900.0, epsilon = 1e-9);

    // a gate above the neutral reading keeps the same crossover out
    let gated = base_params()
        .with_strategy(crossover_with_rsi_gate(55.0))
        .with_sizing(BracketSizing::atr(3, 1.0, 2.0));
    let result = SimulationEngine::new(gated).unwrap().run(&series, None).unwrap();
    assert!(result.trades.is_empty());
    assert!(result.open_positions.is_empty());
    assert_relative_eq!(result.final_balance, 10000.0);
}

#[test]
fn session_close_flattens_position() {
    // 10:00 .. 16:00, crossover on the 14:00 bar
    let bars = hourly_bars(&[10.0, 10.0, 10.0, 10.0, 10.5, 10.6, 10.8], 10);
    let series = BarSeries::new("EURUSD", bars).unwrap();

    let params = base_params()
        .with_sizing(BracketSizing::fixed_percent(0.5, 0.5))
        .with_session_close(16);
    let result = SimulationEngine::new(params).unwrap().run(&series, None).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_price, 10.5);
    assert_eq!(trade.exit_price, 10.8);
    assert_eq!(trade.exit_reason, ExitReason::SessionClose);
    assert_eq!(trade.closed_at, series.bars()[6].timestamp);

    // balance += (close - entry) * contract * lot
    assert_relative_eq!(result.final_balance, 10030.0, epsilon = 1e-9);
    assert!(result.open_positions.is_empty());
}

#[test]
fn short_series_is_skipped_in_batch() {
    let short = BarSeries::new("SHORT", hourly_bars(&[10.0; 10], 0)).unwrap();
    let params = base_params().with_sizing(BracketSizing::atr(14, 1.0, 2.0));

    let err = SimulationEngine::new(params.clone())
        .unwrap()
        .run(&short, None)
        .unwrap_err();
    assert!(matches!(
        err,
        SimError::InsufficientData {
            required: 14,
            actual: 10
        }
    ));

    let long_closes: Vec<f64> = (0..50).map(|i| 10.0 + (i as f64 * 0.4).sin()).collect();
    let long = BarSeries::new("LONG", hourly_bars(&long_closes, 0)).unwrap();
    let source = InMemorySource::new()
        .with_series(Timeframe::H1, short)
        .with_series(Timeframe::H1, long);

    let requests = vec![
        InstrumentRequest::new("SHORT", Timeframe::H1, BarRange::Lookback(100)),
        InstrumentRequest::new("LONG", Timeframe::H1, BarRange::Lookback(100)),
    ];
    let outcome = BatchRunner::new(&source, params).run(&requests);

    assert_eq!(outcome.summary.rows.len(), 1);
    assert_eq!(outcome.summary.rows[0].instrument, "LONG");
    assert!(outcome.summary.row("SHORT").is_none());
    assert_eq!(outcome.summary.skipped.len(), 1);
    assert_eq!(outcome.summary.skipped[0].instrument, "SHORT");
    assert!(outcome.summary.skipped[0].reason.contains("Insufficient data"));
}

#[test]
fn instruments_do_not_share_state() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = generate_synthetic_bars(600, 1.1, start, Duration::minutes(15), 11);
    let small = BarSeries::new("SMALL", bars).unwrap();
    let large = small.renamed("LARGE");
    let rich = small.renamed("RICH");

    let source = InMemorySource::new()
        .with_series(Timeframe::M15, small.clone())
        .with_series(Timeframe::M15, large)
        .with_series(Timeframe::M15, rich);

    let params = base_params()
        .with_contract_size(100_000.0)
        .with_sizing(BracketSizing::fixed_percent(0.001, 0.002));
    let range = BarRange::Lookback(600);
    let requests = vec![
        InstrumentRequest::new("SMALL", Timeframe::M15, range)
            .with_initial_balance(10000.0)
            .with_lot_size(0.1),
        InstrumentRequest::new("LARGE", Timeframe::M15, range)
            .with_initial_balance(20000.0)
            .with_lot_size(0.2),
        InstrumentRequest::new("RICH", Timeframe::M15, range)
            .with_initial_balance(20000.0)
            .with_lot_size(0.1),
    ];

    let outcome = BatchRunner::new(&source, params.clone()).run(&requests);
    let summary = &outcome.summary;
    let small_row = summary.row("SMALL").unwrap();
    let large_row = summary.row("LARGE").unwrap();
    let rich_row = summary.row("RICH").unwrap();

    assert!(small_row.total_trades > 0);
    assert_eq!(small_row.total_trades, large_row.total_trades);
    assert_relative_eq!(small_row.net_profit_pct, large_row.net_profit_pct, epsilon = 1e-9);
    assert_relative_eq!(large_row.net_profit, 2.0 * small_row.net_profit, epsilon = 1e-6);
    // same lot, more capital: same money, half the percentage
    assert_relative_eq!(rich_row.net_profit, small_row.net_profit, epsilon = 1e-9);

    // a solo run matches the batched one
    let solo = SimulationEngine::new(params.with_capital(10000.0).with_lot_size(0.1))
        .unwrap()
        .run(&small, None)
        .unwrap();
    assert_relative_eq!(solo.net_profit, small_row.net_profit, epsilon = 1e-9);
}
