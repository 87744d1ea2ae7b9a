use common::{Result, SimulationParameters, SimulationResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::data::{BarRange, MarketDataSource, Timeframe};
use crate::engine::SimulationEngine;
use crate::summary::{BatchSummary, ResultAggregator};

/// One instrument to simulate inside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRequest {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub range: BarRange,
    pub initial_balance: Option<f64>,
    pub lot_size: Option<f64>,
    /// Higher timeframe fetched for trend-filtered variants
    pub trend_timeframe: Option<Timeframe>,
}

impl InstrumentRequest {
    pub fn new(instrument: impl Into<String>, timeframe: Timeframe, range: BarRange) -> Self {
        Self {
            instrument: instrument.into(),
            timeframe,
            range,
            initial_balance: None,
            lot_size: None,
            trend_timeframe: None,
        }
    }

    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = Some(balance);
        self
    }

    pub fn with_lot_size(mut self, lot_size: f64) -> Self {
        self.lot_size = Some(lot_size);
        self
    }

    pub fn with_trend_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.trend_timeframe = Some(timeframe);
        self
    }

    fn params(&self, base: &SimulationParameters) -> SimulationParameters {
        let mut params = base.clone();
        if let Some(balance) = self.initial_balance {
            params.initial_balance = balance;
        }
        if let Some(lot_size) = self.lot_size {
            params.lot_size = lot_size;
        }
        params
    }
}

/// Results of every instrument that ran, plus the summary table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<SimulationResult>,
    pub summary: BatchSummary,
}

/// Runs independent instrument simulations in parallel
pub struct BatchRunner<'a> {
    source: &'a dyn MarketDataSource,
    params: SimulationParameters,
    parallel: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(source: &'a dyn MarketDataSource, params: SimulationParameters) -> Self {
        Self {
            source,
            params,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Simulate one instrument end to end
    pub fn run_one(&self, request: &InstrumentRequest) -> Result<SimulationResult> {
        let engine = SimulationEngine::new(request.params(&self.params))?;
        let series = self
            .source
            .fetch_bars(&request.instrument, request.timeframe, request.range)?;
        let trend = match request.trend_timeframe {
            Some(tf) => Some(self.source.fetch_bars(&request.instrument, tf, request.range)?),
            None => None,
        };
        engine.run(&series, trend.as_ref())
    }

    /// Run every request. A failing instrument is logged and listed as
    /// skipped; the others still run.
    pub fn run(&self, requests: &[InstrumentRequest]) -> BatchOutcome {
        info!(instruments = requests.len(), parallel = self.parallel, "starting batch");

        let outcomes: Vec<Result<SimulationResult>> = if self.parallel {
            requests.par_iter().map(|r| self.run_one(r)).collect()
        } else {
            requests.iter().map(|r| self.run_one(r)).collect()
        };

        let mut aggregator = ResultAggregator::new();
        let mut results = Vec::with_capacity(outcomes.len());
        for (request, outcome) in requests.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    aggregator.add_result(&result);
                    results.push(result);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(instrument = %request.instrument, error = %e, "skipping instrument");
                    aggregator.add_failure(&request.instrument, &e);
                }
                Err(e) => {
                    error!(instrument = %request.instrument, error = %e, "instrument failed");
                    aggregator.add_failure(&request.instrument, &e);
                }
            }
        }

        BatchOutcome {
            results,
            summary: aggregator.finish(),
        }
    }
}
