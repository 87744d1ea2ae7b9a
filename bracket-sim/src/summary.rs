use std::fmt::Write;

use common::{InstrumentSummary, SimError, SimulationResult};
use serde::{Deserialize, Serialize};

/// Instrument left out of a batch and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: String,
}

/// Summary table over independent instrument runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub rows: Vec<InstrumentSummary>,
    pub skipped: Vec<SkippedInstrument>,
}

impl BatchSummary {
    pub fn total_initial_balance(&self) -> f64 {
        self.rows.iter().map(|r| r.initial_balance).sum()
    }

    pub fn total_final_balance(&self) -> f64 {
        self.rows.iter().map(|r| r.final_balance).sum()
    }

    pub fn total_net_profit(&self) -> f64 {
        self.rows.iter().map(|r| r.net_profit).sum()
    }

    pub fn row(&self, instrument: &str) -> Option<&InstrumentSummary> {
        self.rows.iter().find(|r| r.instrument == instrument)
    }

    /// Plain-text table, one row per instrument plus a total line
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let rule = "-".repeat(72);

        let _ = writeln!(
            out,
            "{:<12} {:>14} {:>14} {:>12} {:>9} {:>7}",
            "Instrument", "Initial", "Final", "Net", "Net %", "Trades"
        );
        let _ = writeln!(out, "{}", rule);

        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<12} {:>14.2} {:>14.2} {:>12.2} {:>8.2}% {:>7}",
                row.instrument,
                row.initial_balance,
                row.final_balance,
                row.net_profit,
                row.net_profit_pct,
                row.total_trades
            );
        }

        let _ = writeln!(out, "{}", rule);
        let initial = self.total_initial_balance();
        let total_pct = if initial != 0.0 {
            self.total_net_profit() / initial * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            out,
            "{:<12} {:>14.2} {:>14.2} {:>12.2} {:>8.2}% {:>7}",
            "TOTAL",
            initial,
            self.total_final_balance(),
            self.total_net_profit(),
            total_pct,
            self.rows.iter().map(|r| r.total_trades).sum::<usize>()
        );

        for skipped in &self.skipped {
            let _ = writeln!(out, "skipped {}: {}", skipped.instrument, skipped.reason);
        }

        out
    }
}

/// Collects per-instrument outcomes into a [`BatchSummary`]
#[derive(Debug, Default)]
pub struct ResultAggregator {
    summary: BatchSummary,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: &SimulationResult) {
        self.summary.rows.push(result.summary());
    }

    pub fn add_failure(&mut self, instrument: &str, error: &SimError) {
        self.summary.skipped.push(SkippedInstrument {
            instrument: instrument.to_string(),
            reason: error.to_string(),
        });
    }

    pub fn record(&mut self, instrument: &str, outcome: &Result<SimulationResult, SimError>) {
        match outcome {
            Ok(result) => self.add_result(result),
            Err(e) => self.add_failure(instrument, e),
        }
    }

    pub fn finish(self) -> BatchSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use common::PerformanceMetrics;

    fn result(instrument: &str, initial: f64, fin: f64) -> SimulationResult {
        SimulationResult {
            instrument: instrument.to_string(),
            initial_balance: initial,
            final_balance: fin,
            net_profit: fin - initial,
            warmup_index: 20,
            bars_processed: 100,
            equity_curve: vec![],
            drawdown_curve: vec![],
            trades: vec![],
            open_positions: vec![],
            metrics: PerformanceMetrics::default(),
        }
    }

    #[test]
    fn test_aggregates_rows_and_skips() {
        let mut agg = ResultAggregator::new();
        agg.record("EURUSD", &Ok(result("EURUSD", 10000.0, 10250.0)));
        agg.record(
            "GBPUSD",
            &Err(SimError::InsufficientData {
                required: 14,
                actual: 10,
            }),
        );
        agg.add_result(&result("USDJPY", 10000.0, 9900.0));
        let summary = agg.finish();

        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].instrument, "GBPUSD");
        assert!(summary.row("GBPUSD").is_none());

        let eur = summary.row("EURUSD").unwrap();
        assert_relative_eq!(eur.net_profit, 250.0);
        assert_relative_eq!(eur.net_profit_pct, 2.5);
        assert_relative_eq!(summary.total_net_profit(), 150.0);
        assert_relative_eq!(summary.total_initial_balance(), 20000.0);
    }

    #[test]
    fn test_render_table() {
        let mut agg = ResultAggregator::new();
        agg.add_result(&result("EURUSD", 10000.0, 10250.0));
        agg.add_failure("XAUUSD", &SimError::NoData { instrument: "XAUUSD".into() });
        let table = agg.finish().render_table();

        assert!(table.contains("EURUSD"));
        assert!(table.contains("10250.00"));
        assert!(table.contains("TOTAL"));
        assert!(table.contains("skipped XAUUSD: No data available for XAUUSD"));
    }
}
