//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::config_file::FileConfigAdapter;
use crate::adapters::csv_bars::{self, CsvBarAdapter};
use crate::adapters::failover::FailoverBarSource;
use crate::adapters::sqlite_store::SqliteStoreAdapter;
use crate::adapters::web::{build_router, AppState};
use crate::domain::definition::StrategyDefinition;
use crate::ports::bar_port::BarSeriesPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{InsertOutcome, SignalStorePort, StrategyRecord};
use crate::runner::{self, BacktestRequest};

#[derive(Parser, Debug)]
#[command(name = "stratlab", about = "RSI strategy backtester and forward signal runner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the JSON API server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a backtest against live or CSV bars
    Backtest {
        /// Strategy definition JSON file
        #[arg(short, long)]
        definition: PathBuf,
        /// Directory of SYMBOL_TIMEFRAME.csv files; omit to fetch live bars
        #[arg(long)]
        bars: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        capital: Option<f64>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Evaluate forward configs once, as the scheduler would
    ForwardRun {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluate a single strategy immediately, ignoring its frequency gate
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Validate a strategy definition and print its normalized parameters
    Validate {
        #[arg(short, long)]
        definition: PathBuf,
    },
    /// Create the SQLite schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Store or replace a strategy in the database
    ImportStrategy {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        /// Strategy definition JSON file
        #[arg(short, long)]
        definition: PathBuf,
        /// Enable forward testing for the imported strategy
        #[arg(long)]
        enable_forward: bool,
        /// Forward evaluation frequency in seconds
        #[arg(long)]
        frequency: Option<i64>,
    },
    /// Dump persisted signals as CSV
    ExportSignals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::Backtest {
            definition,
            bars,
            symbol,
            timeframe,
            limit,
            capital,
            output,
        } => run_backtest(
            &definition,
            bars.as_ref(),
            symbol,
            timeframe,
            limit,
            capital,
            output,
        ),
        Command::ForwardRun { config, strategy } => run_forward(&config, strategy.as_deref()),
        Command::Validate { definition } => run_validate(&definition),
        Command::InitDb { config } => run_init_db(&config),
        Command::ImportStrategy {
            config,
            id,
            name,
            symbol,
            timeframe,
            definition,
            enable_forward,
            frequency,
        } => run_import_strategy(
            &config,
            &id,
            name.as_deref(),
            symbol.as_deref(),
            timeframe.as_deref(),
            &definition,
            enable_forward,
            frequency,
        ),
        Command::ExportSignals {
            config,
            strategy,
            output,
        } => run_export_signals(&config, strategy.as_deref(), &output),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn open_store(config: &dyn ConfigPort) -> Result<SqliteStoreAdapter, ExitCode> {
    let store = SqliteStoreAdapter::from_config(config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    store.initialize_schema().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(store)
}

fn read_definition(path: &PathBuf) -> Result<(String, StrategyDefinition), ExitCode> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: failed to read {}: {}", path.display(), e);
            return Err(ExitCode::from(1));
        }
    };
    let definition = StrategyDefinition::from_json(&raw).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok((raw, definition))
}

fn build_runtime() -> Result<tokio::runtime::Runtime, ExitCode> {
    tokio::runtime::Runtime::new().map_err(|e| {
        eprintln!("error: failed to start runtime: {e}");
        ExitCode::from(1)
    })
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let addr: std::net::SocketAddr = match config
        .get_string("server", "bind")
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()
    {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: invalid server.bind address: {e}");
            return ExitCode::from(2);
        }
    };

    let state = AppState {
        bars: Arc::new(FailoverBarSource::from_config(&config)),
        store: Arc::new(store),
        config: Arc::new(config),
    };
    let router = build_router(state);

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(code) => return code,
    };

    eprintln!("Listening on {}", addr);
    let served = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await
    });

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: server failed: {e}");
            ExitCode::from(1)
        }
    }
}

fn run_backtest(
    definition_path: &PathBuf,
    bars_dir: Option<&PathBuf>,
    symbol: Option<String>,
    timeframe: Option<String>,
    limit: Option<i64>,
    capital: Option<f64>,
    output: OutputFormat,
) -> ExitCode {
    let (raw, _) = match read_definition(definition_path) {
        Ok(d) => d,
        Err(code) => return code,
    };
    let definition_value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: invalid definition JSON: {e}");
            return ExitCode::from(4);
        }
    };

    let source: Box<dyn BarSeriesPort + Send + Sync> = match bars_dir {
        Some(dir) => Box::new(CsvBarAdapter::new(dir.clone())),
        None => Box::new(FailoverBarSource::default_chain()),
    };

    let request = BacktestRequest {
        symbol,
        timeframe,
        definition: Some(definition_value),
        initial_capital: capital,
        bars_limit: limit,
    };

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(code) => return code,
    };

    let response = match runtime.block_on(runner::run_backtest(source.as_ref(), request)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&response) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: failed to serialize response: {e}");
                return ExitCode::from(1);
            }
        },
        OutputFormat::Text => {
            let s = &response.summary;
            eprintln!("\n=== Backtest Results ===");
            eprintln!("Symbol:         {} ({})", response.symbol, response.timeframe);
            eprintln!("Initial:        {:.2}", response.initial_capital);
            eprintln!("Final Equity:   {:.2}", s.final_equity);
            eprintln!("Total Return:   {:.2}%", s.total_return * 100.0);
            eprintln!("Max Drawdown:   {:.2}%", s.max_drawdown * 100.0);
            eprintln!("Trades:         {}", s.trades_count);
            eprintln!("Win Rate:       {:.1}%", s.win_rate * 100.0);
            match s.profit_factor {
                Some(pf) => eprintln!("Profit Factor:  {:.2}", pf),
                None => eprintln!("Profit Factor:  n/a"),
            }
        }
    }

    ExitCode::SUCCESS
}

fn run_forward(config_path: &PathBuf, strategy_id: Option<&str>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let bars = FailoverBarSource::from_config(&config);

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(code) => return code,
    };

    let now = chrono::Utc::now().timestamp_millis();

    match strategy_id {
        Some(id) => {
            let result = runtime.block_on(runner::run_forward_for_strategy(&bars, &store, id));
            let (outcome, error) = match result {
                Ok(outcome) => (outcome, None),
                Err(e) => (None, Some(e)),
            };
            if let Err(e) =
                store.mark_checked(id, now, error.as_ref().map(|e| e.to_string()).as_deref())
            {
                eprintln!("warning: failed to record check: {e}");
            }
            match (outcome, error) {
                (_, Some(e)) => {
                    eprintln!("error: {e}");
                    ExitCode::from(&e)
                }
                (Some(InsertOutcome::Inserted), None) => {
                    eprintln!("Signal inserted for {id}");
                    ExitCode::SUCCESS
                }
                (Some(InsertOutcome::Duplicate), None) => {
                    eprintln!("Signal already recorded for {id}");
                    ExitCode::SUCCESS
                }
                (None, None) => {
                    eprintln!("No new signal for {id}");
                    ExitCode::SUCCESS
                }
            }
        }
        None => {
            let report = match runtime.block_on(runner::run_forward_sweep(&bars, &store, now)) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::from(&e);
                }
            };
            match serde_json::to_string_pretty(&report.to_json()) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("error: failed to serialize report: {e}");
                    return ExitCode::from(1);
                }
            }
            ExitCode::SUCCESS
        }
    }
}

fn run_validate(definition_path: &PathBuf) -> ExitCode {
    eprintln!("Validating definition: {}", definition_path.display());
    let (_, definition) = match read_definition(definition_path) {
        Ok(d) => d,
        Err(code) => return code,
    };

    let params = match definition.params() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    eprintln!("\nNormalized parameters:");
    eprintln!("  RSI length:      {}", params.rsi_length);
    eprintln!("  Entry rules:     {}", definition.entry_rules().len());
    eprintln!("  Exit rules:      {}", definition.exit_rules().len());
    eprintln!("  Fixed quote:     {:.2}", params.fixed_quote);
    eprintln!("  Stop loss:       {:.2}%", params.stop_loss_pct);
    eprintln!("  Take profit:     {:.2}%", params.take_profit_pct);
    eprintln!("  Fee rate:        {:.6}", params.fee_rate);
    eprintln!("  Slippage rate:   {:.6}", params.slip_rate);
    eprintln!("\nDefinition is valid.");
    ExitCode::SUCCESS
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match open_store(&config) {
        Ok(_) => {
            eprintln!("Schema initialized");
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}

fn run_import_strategy(
    config_path: &PathBuf,
    id: &str,
    name: Option<&str>,
    symbol: Option<&str>,
    timeframe: Option<&str>,
    definition_path: &PathBuf,
    enable_forward: bool,
    frequency: Option<i64>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let (raw, definition) = match read_definition(definition_path) {
        Ok(d) => d,
        Err(code) => return code,
    };
    if let Err(e) = definition.params() {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    let record = StrategyRecord {
        id: id.to_string(),
        name: name.unwrap_or(id).to_string(),
        symbol: runner::normalize_symbol(symbol.unwrap_or("")),
        timeframe: timeframe.unwrap_or(runner::DEFAULT_TIMEFRAME).to_string(),
        definition: raw,
    };

    if let Err(e) = store.put_strategy(&record) {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    if enable_forward {
        let freq = frequency.unwrap_or(300);
        if let Err(e) = store.upsert_forward_config(id, true, freq) {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
        eprintln!(
            "Imported {} ({} {}), forward testing enabled every {}s",
            record.id, record.symbol, record.timeframe, freq
        );
    } else {
        eprintln!("Imported {} ({} {})", record.id, record.symbol, record.timeframe);
    }

    ExitCode::SUCCESS
}

fn run_export_signals(
    config_path: &PathBuf,
    strategy_id: Option<&str>,
    output: &PathBuf,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let signals = match store.list_signals(strategy_id) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let file = match fs::File::create(output) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: failed to create {}: {}", output.display(), e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = csv_bars::write_signals_csv(file, &signals) {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    eprintln!("{} signals written to {}", signals.len(), output.display());
    ExitCode::SUCCESS
}
