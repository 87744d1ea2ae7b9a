use chrono::{DateTime, Utc};
use common::{Bar, BracketSizing, Direction, ExitReason, Position, Result, SimError, Trade};
use tracing::debug;

/// Stop-loss and take-profit levels for a new position.
///
/// Returns `None` when the sizing needs an ATR value that is not defined yet.
pub fn bracket_levels(
    sizing: &BracketSizing,
    direction: Direction,
    entry_price: f64,
    atr: Option<f64>,
) -> Option<(f64, f64)> {
    let sign = direction.sign();
    match *sizing {
        BracketSizing::AtrMultiple {
            stop_mult,
            target_mult,
            ..
        } => {
            let atr = atr?;
            Some((
                entry_price - sign * atr * stop_mult,
                entry_price + sign * atr * target_mult,
            ))
        }
        BracketSizing::FixedPercent {
            stop_pct,
            target_pct,
        } => Some((
            entry_price * (1.0 - sign * stop_pct),
            entry_price * (1.0 + sign * target_pct),
        )),
    }
}

/// Balance, open positions and closed trades for one instrument
#[derive(Debug)]
pub struct Portfolio {
    initial_balance: f64,
    balance: f64,
    contract_size: f64,
    lot_size: f64,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    next_id: u64,
}

impl Portfolio {
    pub fn new(initial_balance: f64, contract_size: f64, lot_size: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            contract_size,
            lot_size,
            positions: Vec::new(),
            trades: Vec::new(),
            next_id: 1,
        }
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Realized balance; open positions are not marked to market
    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn has_open_positions(&self) -> bool {
        !self.positions.is_empty()
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.positions
    }

    /// Get all closed trades
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Unrealized P&L of every open position at `price`
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.positions
            .iter()
            .map(|p| self.pnl(p, price))
            .sum()
    }

    /// Realized P&L of closing `position` at `exit_price`
    pub fn pnl(&self, position: &Position, exit_price: f64) -> f64 {
        position.price_move(exit_price) * self.contract_size * self.lot_size
    }

    /// Open a new position with fixed bracket levels
    pub fn open_position(
        &mut self,
        direction: Direction,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<&Position> {
        if !(entry_price.is_finite() && stop_loss.is_finite() && take_profit.is_finite()) {
            return Err(SimError::InvalidParameter(format!(
                "non-finite bracket: entry {} stop {} target {}",
                entry_price, stop_loss, take_profit
            )));
        }

        let position = Position {
            id: self.next_id,
            direction,
            entry_price,
            stop_loss,
            take_profit,
            opened_at: timestamp,
        };
        self.next_id += 1;

        debug!(
            id = position.id,
            ?direction,
            entry = entry_price,
            stop = stop_loss,
            target = take_profit,
            %timestamp,
            "opened position"
        );

        self.positions.push(position);
        Ok(&self.positions[self.positions.len() - 1])
    }

    /// Close positions whose stop-loss or take-profit lies within the bar.
    ///
    /// When a bar spans both levels the stop-loss wins. Positions are
    /// resolved in the order they were opened.
    pub fn resolve_exits(&mut self, bar: &Bar) -> usize {
        let mut closed = 0;
        let mut remaining = Vec::with_capacity(self.positions.len());

        for position in std::mem::take(&mut self.positions) {
            let exit = if position.stop_hit(bar) {
                Some((position.stop_loss, ExitReason::StopLoss))
            } else if position.target_hit(bar) {
                Some((position.take_profit, ExitReason::TakeProfit))
            } else {
                None
            };

            match exit {
                Some((price, reason)) => {
                    self.record_close(position, price, bar.timestamp, reason);
                    closed += 1;
                }
                None => remaining.push(position),
            }
        }

        self.positions = remaining;
        closed
    }

    /// Close every open position at `price` regardless of its levels
    pub fn close_all(&mut self, price: f64, timestamp: DateTime<Utc>, reason: ExitReason) -> usize {
        let positions = std::mem::take(&mut self.positions);
        let closed = positions.len();
        for position in positions {
            self.record_close(position, price, timestamp, reason);
        }
        closed
    }

    /// Close open positions in `direction` at `price`
    pub fn close_direction(
        &mut self,
        direction: Direction,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    ) -> usize {
        let (to_close, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut self.positions)
            .into_iter()
            .partition(|p| p.direction == direction);
        self.positions = remaining;

        let closed = to_close.len();
        for position in to_close {
            self.record_close(position, price, timestamp, reason);
        }
        closed
    }

    fn record_close(
        &mut self,
        position: Position,
        exit_price: f64,
        timestamp: DateTime<Utc>,
        reason: ExitReason,
    ) {
        let realized_pnl = self.pnl(&position, exit_price);
        self.balance += realized_pnl;

        debug!(
            id = position.id,
            direction = ?position.direction,
            exit = exit_price,
            pnl = realized_pnl,
            ?reason,
            %timestamp,
            "closed position"
        );

        self.trades.push(Trade {
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            realized_pnl,
            opened_at: position.opened_at,
            closed_at: timestamp,
            exit_reason: reason,
        });
    }
}
