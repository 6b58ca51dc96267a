//! Strategy evaluation across simulators.
//!
//! One run visits every simulator with an enabled tracked stock, builds its
//! portfolio snapshot, loads a bounded window of price history, runs the
//! configured strategy and persists the validated signals as `pending`.
//! A fault scoped to one simulator is recorded in the summary and the run
//! moves on; storage faults abort the run.

use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::error::PaperTraderError;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::price_bar::{DEFAULT_PRICE_SOURCE, PriceBar, normalize_symbol};
use crate::domain::signal::Signal;
use crate::domain::simulator::Simulator;
use crate::domain::strategy::sma_crossover::SMA_CROSSOVER;
use crate::domain::strategy::{Strategy, StrategyParams, StrategyRegistry};
use crate::ports::store_port::TradingStore;

/// Longest price lookback, in calendar days, a run may request.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    pub strategy_name: String,
    pub params: StrategyParams,
    /// Extra calendar days loaded beyond `long_window` to cover weekends
    /// and holidays.
    pub buffer_days: u32,
    pub price_source: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            strategy_name: SMA_CROSSOVER.to_string(),
            params: StrategyParams::default(),
            buffer_days: 10,
            price_source: DEFAULT_PRICE_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Ok,
    SkippedPriceDataMissing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorEvaluationResult {
    pub simulator_id: i64,
    pub status: EvaluationStatus,
    pub signals_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SimulatorEvaluationResult {
    fn ok(simulator_id: i64, signals_count: usize) -> Self {
        SimulatorEvaluationResult {
            simulator_id,
            status: EvaluationStatus::Ok,
            signals_count,
            error: None,
        }
    }

    fn skipped(simulator_id: i64) -> Self {
        SimulatorEvaluationResult {
            simulator_id,
            status: EvaluationStatus::SkippedPriceDataMissing,
            signals_count: 0,
            error: None,
        }
    }

    fn error(simulator_id: i64, error: String) -> Self {
        SimulatorEvaluationResult {
            simulator_id,
            status: EvaluationStatus::Error,
            signals_count: 0,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub user_id: Option<i64>,
    pub strategy_name: String,
    pub simulators_processed: usize,
    pub total_signals: usize,
    pub skipped: usize,
    pub errors: usize,
    pub simulator_results: Vec<SimulatorEvaluationResult>,
}

/// Run one evaluation pass. `today` bounds the price window.
pub fn run_evaluation(
    store: &mut dyn TradingStore,
    registry: &StrategyRegistry,
    config: &EvaluationConfig,
    user_id: Option<i64>,
    today: NaiveDate,
) -> Result<EvaluationSummary, PaperTraderError> {
    let strategy = registry.get(&config.strategy_name)?;
    config.params.validate()?;
    let since = window_start(config, today)?;

    let targets = store.list_evaluable_simulators(user_id)?;
    info!(
        "Evaluating {} simulator(s) with strategy {}",
        targets.len(),
        config.strategy_name
    );

    let mut summary = EvaluationSummary {
        user_id,
        strategy_name: config.strategy_name.clone(),
        simulators_processed: targets.len(),
        total_signals: 0,
        skipped: 0,
        errors: 0,
        simulator_results: Vec::with_capacity(targets.len()),
    };

    for simulator in &targets {
        let result = match evaluate_simulator(store, strategy, config, simulator, since, today) {
            Ok(result) => result,
            Err(err) if err.is_infrastructure() => return Err(err),
            Err(err) => {
                warn!("Evaluation failed for simulator {}: {}", simulator.id, err);
                SimulatorEvaluationResult::error(simulator.id, err.to_string())
            }
        };

        match result.status {
            EvaluationStatus::Ok => summary.total_signals += result.signals_count,
            EvaluationStatus::SkippedPriceDataMissing => summary.skipped += 1,
            EvaluationStatus::Error => summary.errors += 1,
        }
        summary.simulator_results.push(result);
    }

    info!(
        "Evaluation complete: {} signal(s), {} skipped, {} error(s)",
        summary.total_signals, summary.skipped, summary.errors
    );
    Ok(summary)
}

fn evaluate_simulator(
    store: &mut dyn TradingStore,
    strategy: &dyn Strategy,
    config: &EvaluationConfig,
    simulator: &Simulator,
    since: NaiveDate,
    today: NaiveDate,
) -> Result<SimulatorEvaluationResult, PaperTraderError> {
    let snapshot = load_portfolio_snapshot(store, simulator)?;
    let prices = load_price_history(store, simulator.id, config, since, today)?;
    if prices.is_empty() {
        warn!(
            "Skipping simulator {}: no {} price data since {}",
            simulator.id,
            config.price_source, since
        );
        return Ok(SimulatorEvaluationResult::skipped(simulator.id));
    }

    let signals = strategy.generate_signals(&prices, &snapshot, &config.params)?;
    let signals = validate_signal_batch(signals);
    let stored = store.insert_signals(simulator.id, &signals)?;
    debug!("Simulator {}: stored {} signal(s)", simulator.id, stored);

    Ok(SimulatorEvaluationResult::ok(simulator.id, stored))
}

/// Cash and positions as currently stored for `simulator`.
pub fn load_portfolio_snapshot(
    store: &dyn TradingStore,
    simulator: &Simulator,
) -> Result<PortfolioSnapshot, PaperTraderError> {
    let user_id = simulator
        .user_id
        .ok_or(PaperTraderError::SimulatorWithoutUser {
            simulator_id: simulator.id,
        })?;

    let mut snapshot = PortfolioSnapshot::new(
        simulator.id,
        user_id,
        simulator.cash_balance,
        simulator.updated_at,
    );
    for mut position in store.list_positions(simulator.id)? {
        position.symbol = normalize_symbol(&position.symbol);
        if position.symbol.is_empty() {
            continue;
        }
        snapshot.add_position(position);
    }
    Ok(snapshot)
}

/// First day of the price window, `today - (long_window + buffer_days)`.
/// Windows longer than [`MAX_LOOKBACK_DAYS`] are rejected.
pub fn window_start(config: &EvaluationConfig, today: NaiveDate) -> Result<NaiveDate, PaperTraderError> {
    i64::try_from(config.params.long_window)
        .ok()
        .and_then(|window| window.checked_add(i64::from(config.buffer_days)))
        .filter(|days| *days <= MAX_LOOKBACK_DAYS)
        .and_then(|days| today.checked_sub_signed(Duration::days(days)))
        .ok_or_else(|| PaperTraderError::ConfigInvalid {
            section: "evaluation".into(),
            key: "long_window".into(),
            reason: format!("long_window + buffer_days must not exceed {MAX_LOOKBACK_DAYS} days"),
        })
}

/// Bars for the simulator's enabled tickers over `[since, today]` from the
/// configured source.
pub fn load_price_history(
    store: &dyn TradingStore,
    simulator_id: i64,
    config: &EvaluationConfig,
    since: NaiveDate,
    today: NaiveDate,
) -> Result<Vec<PriceBar>, PaperTraderError> {
    let tickers = store.enabled_tickers(simulator_id)?;
    if tickers.is_empty() {
        return Ok(Vec::new());
    }
    store.list_bars(&tickers, since, today, &config.price_source)
}

/// Drop signals with a blank symbol or a negative quantity; normalize the
/// remaining symbols.
pub fn validate_signal_batch(signals: Vec<Signal>) -> Vec<Signal> {
    signals
        .into_iter()
        .filter_map(|mut signal| {
            signal.symbol = normalize_symbol(&signal.symbol);
            if signal.symbol.is_empty() || signal.quantity < Decimal::ZERO {
                debug!("Dropping invalid signal for {:?}", signal.symbol);
                return None;
            }
            Some(signal)
        })
        .collect()
}
