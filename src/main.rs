use analytics::RunSummary;
use anyhow::Context;
use backtester::error::BacktestError;
use backtester::{Backtester, build_backtester, live_data_store, load_data};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Table};
use configuration::{Config, SlippageKind, load_config};
use core_types::Kline;
use data::{Candles, ReplaySource, load_csv};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The main entry point for the Meridian simulation engine.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; overrides can also come from the real environment.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Run(args) => handle_run(args).await,
        Commands::Validate { config } => handle_validate(config),
        Commands::Strategies => {
            handle_strategies();
            Ok(())
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An event-driven market simulation engine.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a strategy over the configured pairs and print the results.
    Run(RunArgs),
    /// Load and validate a configuration file without running it.
    Validate {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// List the strategies that can be named in a configuration.
    Strategies,
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Feed the candles through the live poller instead of replaying them in one pass.
    #[arg(long)]
    live: bool,

    /// Override the configured slippage model.
    #[arg(long, value_enum)]
    slippage: Option<SlippageKind>,

    /// Hide the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Also write the full summary as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    if let Some(slippage) = args.slippage {
        config.run.slippage = slippage;
    }
    let _log_guard = configuration::logging::init_tracing(&config.logging)?;
    tracing::info!(nickname = %config.nickname, config = %args.config.display(), "configuration loaded");

    let backtester = if args.live {
        run_live(&config).await?
    } else {
        let data = load_data(&config)?;
        let mut backtester = build_backtester(&config, data)?;
        if !args.no_progress {
            backtester = backtester.with_progress()?;
        }
        backtester.run().await?;
        backtester
    };

    let summary = backtester.results()?;
    summary.print_results();
    println!("{}", results_table(&summary));

    if let Some(path) = args.json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "summary written");
    }
    Ok(())
}

/// Rehearses live mode: each pair's CSV is replayed through the poller a
/// candle at a time until the files run dry or Ctrl-C is pressed.
async fn run_live(config: &Config) -> anyhow::Result<Backtester> {
    let settings = config.live.clone().unwrap_or_default();
    let source = ReplaySource::new(1);
    for currency in &config.currencies {
        let key = currency.key();
        let path = currency
            .data_file
            .as_ref()
            .with_context(|| format!("{key}: no data_file configured"))?;
        let candles = load_csv(path, key.clone(), config.run.interval)?;
        source.push(key, recorded_klines(&candles));
    }

    let mut backtester = build_backtester(config, live_data_store(config)?)?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match backtester.run_live(Arc::new(source), &settings, cancel).await {
        Ok(()) => {}
        // A replay ends by going quiet.
        Err(BacktestError::NoDataTimeout(window)) => {
            tracing::info!(?window, "replay exhausted");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(backtester)
}

/// The candles actually present in a file, without the gap fillers.
fn recorded_klines(candles: &Candles) -> Vec<Kline> {
    candles
        .events()
        .iter()
        .filter(|e| !e.missing)
        .map(|e| Kline {
            open_time: e.base.time,
            open: e.open,
            high: e.high,
            low: e.low,
            close: e.close,
            volume: e.volume,
        })
        .collect()
}

fn handle_validate(path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&path).with_context(|| format!("failed to load {}", path.display()))?;
    strategies::create_strategy(&config.strategy.name, &config.strategy)?;
    println!(
        "{} is valid: strategy {}, {} pair(s)",
        path.display(),
        config.strategy.name,
        config.currencies.len()
    );
    for currency in &config.currencies {
        let source = match &currency.data_file {
            Some(file) => file.display().to_string(),
            None => "no data file".to_string(),
        };
        println!("  {} ({source})", currency.key());
    }
    Ok(())
}

fn handle_strategies() {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Name", "Description"]);
    for (name, description) in strategies::STRATEGIES {
        table.add_row(vec![*name, *description]);
    }
    println!("{table}");
}

// ==============================================================================
// Results Table
// ==============================================================================

fn results_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Pair",
        "Events",
        "Orders (buy/sell)",
        "Market %",
        "Strategy %",
        "Max drawdown %",
        "Fees",
        "Sharpe",
        "Final value",
    ]);
    for pair in &summary.pairs {
        let drawdown = pair.max_drawdown.as_ref().map(|s| s.percent);
        table.add_row(vec![
            Cell::new(&pair.key),
            Cell::new(pair.events),
            Cell::new(format!("{} ({}/{})", pair.total_orders, pair.buy_orders, pair.sell_orders)),
            Cell::new(pct(pair.market_movement)),
            Cell::new(pct(pair.strategy_movement)),
            Cell::new(optional(drawdown)),
            Cell::new(pair.total_fees.round_dp(4)),
            Cell::new(optional(pair.arithmetic.sharpe)),
            Cell::new(pair.final_value.round_dp(2)),
        ]);
    }

    let funding = &summary.funding;
    table.add_row(vec![
        Cell::new("Total funding"),
        Cell::new(summary.total_events),
        Cell::new(summary.total_orders),
        Cell::new("-"),
        Cell::new(pct(funding.strategy_movement)),
        Cell::new(optional(funding.max_drawdown.as_ref().map(|s| s.percent))),
        Cell::new("-"),
        Cell::new("-"),
        Cell::new(funding.final_total_value.round_dp(2)),
    ]);
    table
}

fn pct(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

fn optional(value: Option<Decimal>) -> String {
    value.map(pct).unwrap_or_else(|| "-".to_string())
}
