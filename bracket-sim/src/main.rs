use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use bracket_sim::{
    BarRange, BatchOutcome, BatchRunner, CsvDirectorySource, EndOfSeriesPolicy, InstrumentRequest,
    MarketDataSource, SimulationParameters, SimulationResult, StrategyVariant, SyntheticSource,
    Timeframe,
};

#[derive(Parser, Debug)]
#[command(name = "bracket-sim")]
#[command(version)]
#[command(about = "Bar-by-bar bracket-order strategy simulator", long_about = None)]
struct Args {
    /// Directory of <SYMBOL>_<TF>.csv or <SYMBOL>.csv files. Synthetic data when omitted.
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// Number of bars per instrument
    #[arg(short, long, default_value = "2000")]
    bars: usize,

    /// Seed for synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Comma-separated instruments
    #[arg(short, long, value_delimiter = ',', default_value = "EURUSD,GBPUSD,USDJPY")]
    symbols: Vec<String>,

    /// Bar timeframe (M1, M5, M15, M30, H1, H4, D1)
    #[arg(short, long, default_value = "M15")]
    timeframe: Timeframe,

    /// Higher timeframe for trend-filtered presets
    #[arg(long)]
    trend_timeframe: Option<Timeframe>,

    /// Parameter preset (default, intraday-trend, crossover-breakout, scalping, conservative-intraday)
    #[arg(short, long, default_value = "default")]
    preset: String,

    /// TOML or JSON parameter file; replaces the preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial balance per instrument
    #[arg(short, long)]
    capital: Option<f64>,

    /// Lot size per trade
    #[arg(long)]
    lot_size: Option<f64>,

    /// Minimum seconds between entries
    #[arg(long)]
    cooldown_secs: Option<i64>,

    /// Close everything from this UTC hour on
    #[arg(long)]
    session_close_hour: Option<u32>,

    /// Allow at most one open position
    #[arg(long)]
    single_position: bool,

    /// Close open positions at the last bar's close
    #[arg(long)]
    mark_to_market: bool,

    /// Output format (json, text)
    #[arg(short, long, default_value = "text")]
    output: String,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let params = build_params(&args)?;

    let source: Box<dyn MarketDataSource> = match &args.data_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "loading CSV data");
            Box::new(CsvDirectorySource::new(dir))
        }
        None => {
            info!(bars = args.bars, seed = args.seed, "using synthetic data");
            Box::new(SyntheticSource::new(args.seed))
        }
    };

    let trend_timeframe = args.trend_timeframe.or(match params.strategy {
        StrategyVariant::RsiBandTrendFilter { .. } => Some(Timeframe::H1),
        _ => None,
    });

    let requests: Vec<InstrumentRequest> = args
        .symbols
        .iter()
        .map(|symbol| {
            let request = InstrumentRequest::new(
                symbol.trim().to_uppercase(),
                args.timeframe,
                BarRange::Lookback(args.bars),
            );
            match trend_timeframe {
                Some(tf) => request.with_trend_timeframe(tf),
                None => request,
            }
        })
        .collect();

    let outcome = BatchRunner::new(source.as_ref(), params).run(&requests);

    match args.output.as_str() {
        "json" => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&outcome)?
            } else {
                serde_json::to_string(&outcome)?
            };
            println!("{}", json);
        }
        "text" => print_text_report(&outcome),
        other => {
            eprintln!("Unknown output format: {}. Using text.", other);
            print_text_report(&outcome);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,bracket_sim=debug")
    } else {
        EnvFilter::new("info,bracket_sim=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_params(args: &Args) -> Result<SimulationParameters> {
    let mut params = match &args.config {
        Some(path) => SimulationParameters::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimulationParameters::preset(&args.preset)?,
    };

    if let Some(capital) = args.capital {
        params = params.with_capital(capital);
    }
    if let Some(lot_size) = args.lot_size {
        params = params.with_lot_size(lot_size);
    }
    if let Some(secs) = args.cooldown_secs {
        params = params.with_cooldown_secs(secs);
    }
    if let Some(hour) = args.session_close_hour {
        params = params.with_session_close(hour);
    }
    if args.single_position {
        params = params.with_single_position();
    }
    if args.mark_to_market {
        params = params.with_end_of_series(EndOfSeriesPolicy::MarkToMarket);
    }

    params.validate()?;
    Ok(params)
}

fn print_text_report(outcome: &BatchOutcome) {
    for result in &outcome.results {
        print_instrument_report(result);
    }

    println!();
    println!("  SUMMARY");
    println!("================================================================");
    print!("{}", outcome.summary.render_table());
}

fn print_instrument_report(result: &SimulationResult) {
    let m = &result.metrics;

    println!();
    println!("================================================================");
    println!("  {}", result.instrument);
    println!("================================================================");
    if let (Some((first, _)), Some((last, _))) =
        (result.equity_curve.first(), result.equity_curve.last())
    {
        println!("  Period: {} to {}", first.format("%Y-%m-%d %H:%M"), last.format("%Y-%m-%d %H:%M"));
    }
    println!("  Bars simulated: {} (warmup {})", result.bars_processed, result.warmup_index);
    println!();
    println!("  Initial Balance:  ${:>12.2}", result.initial_balance);
    println!("  Final Balance:    ${:>12.2}", result.final_balance);
    println!(
        "  Net Profit:       ${:>12.2} ({:+.2}%)",
        m.net_profit, m.net_profit_pct
    );
    println!("  Max Drawdown:     {:>12.2}%", m.max_drawdown);
    println!("  Max DD Duration:  {:>12} bars", m.max_drawdown_duration_bars);
    println!("----------------------------------------------------------------");
    println!("  Total Trades:     {:>12}", m.total_trades);
    println!("  Win Rate:         {:>12.1}%", m.win_rate);
    println!("  Avg Win:          ${:>12.2}", m.avg_win);
    println!("  Avg Loss:         ${:>12.2}", m.avg_loss);
    println!("  Profit Factor:    {:>12.3}", m.profit_factor);
    println!("  Expectancy:       ${:>12.2}", m.expectancy);
    println!("  Avg Holding:      {:>12.1} min", m.avg_holding_minutes);
    println!("  Open at End:      {:>12}", result.open_positions.len());

    if !result.trades.is_empty() {
        println!();
        println!("  RECENT TRADES (last 5)");
        println!("----------------------------------------------------------------");
        for trade in result.trades.iter().rev().take(5) {
            println!(
                "  {} -> {} | {:?} {:.5} -> {:.5} | P&L: ${:+.2} | {:?}",
                trade.opened_at.format("%m-%d %H:%M"),
                trade.closed_at.format("%m-%d %H:%M"),
                trade.direction,
                trade.entry_price,
                trade.exit_price,
                trade.realized_pnl,
                trade.exit_reason
            );
        }
    }
}
