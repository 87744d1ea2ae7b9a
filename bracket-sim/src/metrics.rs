use chrono::{DateTime, Utc};
use common::{PerformanceMetrics, Trade};

/// Calculate performance metrics from equity curve and trades
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all performance metrics
    ///
    /// # Arguments
    /// * `equity_curve` - Realized balance sampled once per simulated bar
    /// * `trades` - Closed trades in close order
    /// * `initial_balance` - Starting balance
    ///
    /// Net profit comes from the final equity sample, so positions left
    /// open contribute nothing.
    pub fn calculate(
        equity_curve: &[(DateTime<Utc>, f64)],
        trades: &[Trade],
        initial_balance: f64,
    ) -> PerformanceMetrics {
        let final_balance = equity_curve
            .last()
            .map(|(_, e)| *e)
            .unwrap_or(initial_balance);
        let net_profit = final_balance - initial_balance;
        let net_profit_pct = if initial_balance != 0.0 {
            net_profit / initial_balance * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration_bars) = Self::calculate_max_drawdown(equity_curve);
        let stats = Self::calculate_trade_stats(trades);

        PerformanceMetrics {
            net_profit,
            net_profit_pct,
            max_drawdown,
            max_drawdown_duration_bars,
            total_trades: trades.len() as u32,
            winning_trades: stats.winning,
            losing_trades: stats.losing,
            win_rate: stats.win_rate,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            profit_factor: stats.profit_factor,
            expectancy: stats.expectancy,
            best_trade: stats.best,
            worst_trade: stats.worst,
            avg_holding_minutes: stats.avg_holding_minutes,
        }
    }

    /// Maximum drawdown in percent of the running peak, and the number of
    /// bars from that peak to the deepest point.
    fn calculate_max_drawdown(equity_curve: &[(DateTime<Utc>, f64)]) -> (f64, usize) {
        let Some(&(_, first)) = equity_curve.first() else {
            return (0.0, 0);
        };

        let mut peak = first;
        let mut peak_idx = 0;
        let mut max_drawdown = 0.0;
        let mut duration = 0;

        for (i, (_, equity)) in equity_curve.iter().enumerate() {
            if *equity > peak {
                peak = *equity;
                peak_idx = i;
            }
            if peak <= 0.0 {
                continue;
            }

            let drawdown = (peak - equity) / peak * 100.0;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                duration = i - peak_idx;
            }
        }

        (max_drawdown, duration)
    }

    /// Calculate drawdown curve
    pub fn calculate_drawdown_curve(
        equity_curve: &[(DateTime<Utc>, f64)],
    ) -> Vec<(DateTime<Utc>, f64)> {
        let Some(&(_, first)) = equity_curve.first() else {
            return vec![];
        };

        let mut peak = first;
        equity_curve
            .iter()
            .map(|(ts, equity)| {
                if *equity > peak {
                    peak = *equity;
                }
                let drawdown = if peak > 0.0 {
                    (peak - equity) / peak * 100.0
                } else {
                    0.0
                };
                (*ts, drawdown)
            })
            .collect()
    }

    fn calculate_trade_stats(trades: &[Trade]) -> TradeStats {
        if trades.is_empty() {
            return TradeStats::default();
        }

        let mut stats = TradeStats {
            best: f64::MIN,
            worst: f64::MAX,
            ..Default::default()
        };
        let mut total_wins = 0.0;
        let mut total_losses = 0.0;
        let mut total_minutes = 0i64;

        for trade in trades {
            let pnl = trade.realized_pnl;
            if pnl > 0.0 {
                stats.winning += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                stats.losing += 1;
                total_losses += pnl.abs();
            }
            total_minutes += trade.holding_minutes();
            stats.best = stats.best.max(pnl);
            stats.worst = stats.worst.min(pnl);
        }

        let n = trades.len() as f64;
        stats.win_rate = stats.winning as f64 / n * 100.0;
        if stats.winning > 0 {
            stats.avg_win = total_wins / stats.winning as f64;
        }
        if stats.losing > 0 {
            stats.avg_loss = total_losses / stats.losing as f64;
        }

        stats.profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let win_frac = stats.win_rate / 100.0;
        stats.expectancy = win_frac * stats.avg_win - (1.0 - win_frac) * stats.avg_loss;
        stats.avg_holding_minutes = total_minutes as f64 / n;

        stats
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    winning: u32,
    losing: u32,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    expectancy: f64,
    best: f64,
    worst: f64,
    avg_holding_minutes: f64,
}
