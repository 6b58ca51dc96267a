//! Scheduler entry points, one per stage.
//!
//! Each stage runs inside one unit of work: the stage's writes are committed
//! together when it succeeds and rolled back when it returns an error.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::domain::error::PaperTraderError;
use crate::domain::evaluation::{EvaluationConfig, EvaluationSummary, run_evaluation};
use crate::domain::execution::{ExecutionConfig, ExecutionSummary, execute_pending_signals};
use crate::domain::price_bar::PriceBar;
use crate::domain::pricing::{IngestSummary, ingest_bars};
use crate::domain::reconciliation::{ReconciliationConfig, ReconciliationSummary, reconcile_all};
use crate::domain::strategy::StrategyRegistry;
use crate::ports::store_port::UnitOfWork;

/// Typed settings for every stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobsConfig {
    pub evaluation: EvaluationConfig,
    pub execution: ExecutionConfig,
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRunSummary {
    pub evaluation: EvaluationSummary,
    pub execution: ExecutionSummary,
    pub reconciliation: ReconciliationSummary,
}

/// Run `stage` against `work` and commit on success. On error `work` is
/// dropped, which rolls it back.
fn in_unit_of_work<U, T, F>(mut work: U, stage: F) -> Result<T, PaperTraderError>
where
    U: UnitOfWork,
    F: FnOnce(&mut U) -> Result<T, PaperTraderError>,
{
    let output = stage(&mut work)?;
    work.commit()?;
    Ok(output)
}

pub fn ingest_prices<U: UnitOfWork>(
    work: U,
    bars: Vec<PriceBar>,
) -> Result<IngestSummary, PaperTraderError> {
    in_unit_of_work(work, |store| ingest_bars(store, bars))
}

pub fn evaluate<U: UnitOfWork>(
    work: U,
    registry: &StrategyRegistry,
    config: &EvaluationConfig,
    user_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<EvaluationSummary, PaperTraderError> {
    in_unit_of_work(work, |store| {
        run_evaluation(store, registry, config, user_id, now.date_naive())
    })
}

pub fn execute<U: UnitOfWork>(
    work: U,
    config: &ExecutionConfig,
    simulator_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ExecutionSummary, PaperTraderError> {
    in_unit_of_work(work, |store| {
        execute_pending_signals(store, config, simulator_id, now)
    })
}

pub fn reconcile<U: UnitOfWork>(
    work: U,
    config: &ReconciliationConfig,
    simulator_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ReconciliationSummary, PaperTraderError> {
    in_unit_of_work(work, |store| reconcile_all(store, config, simulator_id, now))
}

/// Evaluation, execution and reconciliation in order, each in its own unit
/// of work opened by `begin`. A failing stage stops the run; earlier stages
/// stay committed.
pub fn run_daily<U, F>(
    mut begin: F,
    registry: &StrategyRegistry,
    config: &JobsConfig,
    user_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<DailyRunSummary, PaperTraderError>
where
    U: UnitOfWork,
    F: FnMut() -> Result<U, PaperTraderError>,
{
    info!("Starting daily run for {}", now.date_naive());
    let evaluation = evaluate(begin()?, registry, &config.evaluation, user_id, now)?;
    let execution = execute(begin()?, &config.execution, None, now)?;
    let reconciliation = reconcile(begin()?, &config.reconciliation, None, now)?;
    Ok(DailyRunSummary {
        evaluation,
        execution,
        reconciliation,
    })
}
