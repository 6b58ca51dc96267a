//! CLI definition and dispatch.
//!
//! Each stage subcommand opens the configured store, runs one job and prints
//! its summary as JSON on stdout. Diagnostics go to stderr through `log`.

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{error, info};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::config_validation::{build_jobs_config, check_limit};
use crate::domain::error::PaperTraderError;
use crate::domain::jobs::{self, JobsConfig};
use crate::domain::simulator::{Frequency, NewSimulator, PriceMode, SimulatorSettings};
use crate::domain::strategy::StrategyRegistry;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::store_port::UnitOfWork;

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Paper trading simulation jobs")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    InitDb,
    /// Create a simulator account
    CreateSimulator {
        #[arg(long)]
        name: String,
        #[arg(long)]
        starting_cash: Decimal,
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long, default_value = "daily")]
        frequency: Frequency,
        #[arg(long, default_value = "close")]
        price_mode: PriceMode,
        #[arg(long)]
        max_position_pct: Option<Decimal>,
        #[arg(long)]
        max_order_value: Option<Decimal>,
    },
    /// Track a ticker for a simulator, or disable tracking
    Track {
        #[arg(long)]
        simulator_id: i64,
        #[arg(long)]
        ticker: String,
        #[arg(long, default_value = "0")]
        allocation: Decimal,
        #[arg(long)]
        disable: bool,
    },
    /// Import daily price bars from a CSV file
    IngestPrices {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Generate signals for every evaluable simulator
    Evaluate {
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Execute pending signals
    Execute {
        #[arg(long)]
        simulator_id: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Replay trade ledgers and heal stored cash and positions
    Reconcile {
        #[arg(long)]
        simulator_id: Option<i64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Evaluate, execute and reconcile in order
    RunDaily {
        #[arg(long)]
        user_id: Option<i64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(code) => return code,
    };
    init_logging(&config);

    match execute_command(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PaperTraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// `RUST_LOG` wins over `[logging] level`, which wins over `info`.
pub fn init_logging(config: &dyn ConfigPort) {
    let level = config
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

fn open_store(config: &dyn ConfigPort) -> Result<SqliteAdapter, PaperTraderError> {
    SqliteAdapter::from_config(config)
}

fn print_summary<T: Serialize>(summary: &T) -> Result<ExitCode, PaperTraderError> {
    let json = serde_json::to_string_pretty(summary).map_err(std::io::Error::other)?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn execute_command(command: Command, config: &dyn ConfigPort) -> Result<ExitCode, PaperTraderError> {
    let jobs_config: JobsConfig = build_jobs_config(config)?;
    let store = open_store(config)?;
    let now = Utc::now();

    match command {
        Command::InitDb => {
            store.initialize_schema()?;
            info!("Schema initialized");
            print_summary(&serde_json::json!({ "initialized": true }))
        }
        Command::CreateSimulator {
            name,
            starting_cash,
            user_id,
            frequency,
            price_mode,
            max_position_pct,
            max_order_value,
        } => {
            if starting_cash <= Decimal::ZERO {
                return Err(PaperTraderError::ConfigInvalid {
                    section: "simulator".into(),
                    key: "starting_cash".into(),
                    reason: "starting_cash must be positive".into(),
                });
            }
            let mut work = store.begin()?;
            let simulator_id = work.create_simulator(&NewSimulator {
                user_id,
                name,
                starting_cash,
                settings: SimulatorSettings {
                    frequency,
                    price_mode,
                    max_position_pct,
                    max_order_value,
                },
            })?;
            work.commit()?;
            info!("Created simulator {}", simulator_id);
            print_summary(&serde_json::json!({ "simulator_id": simulator_id }))
        }
        Command::Track {
            simulator_id,
            ticker,
            allocation,
            disable,
        } => {
            let mut work = store.begin()?;
            if work.get_simulator(simulator_id)?.is_none() {
                return Err(PaperTraderError::SimulatorNotFound { simulator_id });
            }
            let id = work.add_tracked_stock(simulator_id, &ticker, allocation, !disable)?;
            work.commit()?;
            print_summary(&serde_json::json!({
                "tracked_stock_id": id,
                "simulator_id": simulator_id,
                "enabled": !disable,
            }))
        }
        Command::IngestPrices { file } => {
            let bars = CsvAdapter::new(jobs_config.evaluation.price_source.clone()).read_file(&file)?;
            let summary = jobs::ingest_prices(store.begin()?, bars)?;
            print_summary(&summary)
        }
        Command::Evaluate { user_id } => {
            let registry = StrategyRegistry::with_defaults();
            let summary = jobs::evaluate(
                store.begin()?,
                &registry,
                &jobs_config.evaluation,
                user_id,
                now,
            )?;
            print_summary(&summary)
        }
        Command::Execute {
            simulator_id,
            limit,
        } => {
            let mut execution = jobs_config.execution.clone();
            if let Some(limit) = limit {
                execution.batch_limit = check_limit("execution", "batch_limit", limit)?;
            }
            let summary = jobs::execute(store.begin()?, &execution, simulator_id, now)?;
            print_summary(&summary)
        }
        Command::Reconcile {
            simulator_id,
            limit,
        } => {
            let mut reconciliation = jobs_config.reconciliation.clone();
            if let Some(limit) = limit {
                reconciliation.limit = check_limit("reconciliation", "limit", limit)?;
            }
            let summary = jobs::reconcile(store.begin()?, &reconciliation, simulator_id, now)?;
            print_summary(&summary)
        }
        Command::RunDaily { user_id } => {
            let registry = StrategyRegistry::with_defaults();
            let summary = jobs::run_daily(|| store.begin(), &registry, &jobs_config, user_id, now)?;
            print_summary(&summary)
        }
    }
}
