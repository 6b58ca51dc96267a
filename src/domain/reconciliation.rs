//! Portfolio reconciliation by trade ledger replay.
//!
//! The trade ledger is the source of truth. Replaying it from the
//! simulator's starting cash yields the canonical cash balance and position
//! set; stored projections are compared against that, the drift is reported,
//! and the projections are overwritten with the replayed values.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::action::TradeSide;
use crate::domain::cash_ledger::CashLedgerEntry;
use crate::domain::error::PaperTraderError;
use crate::domain::position::Position;
use crate::domain::trade::Trade;
use crate::ports::store_port::TradingStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Maximum simulators visited by one run.
    pub limit: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        ReconciliationConfig { limit: 500 }
    }
}

/// Canonical state reproduced from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedLedger {
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub simulator_id: i64,
    pub trades_replayed: usize,
    pub stored_cash: Decimal,
    pub replayed_cash: Decimal,
    /// stored − replayed.
    pub cash_drift: Decimal,
    pub position_drift_count: usize,
    pub positions: Vec<Position>,
}

impl ReconciliationReport {
    pub fn has_drift(&self) -> bool {
        !self.cash_drift.is_zero() || self.position_drift_count > 0
    }
}

fn corruption(simulator_id: i64, reason: String) -> PaperTraderError {
    PaperTraderError::LedgerCorruption {
        simulator_id,
        reason,
    }
}

fn overflow(simulator_id: i64, trade: &Trade) -> PaperTraderError {
    corruption(
        simulator_id,
        format!(
            "trade {} overflows cash or cost basis ({} {} @ {})",
            trade.id, trade.quantity, trade.symbol, trade.price
        ),
    )
}

/// Replay `trades` (already ordered by executed_at, then id) from
/// `starting_cash`. Any malformed row or oversell aborts with
/// [`PaperTraderError::LedgerCorruption`].
pub fn replay_trades(
    simulator_id: i64,
    starting_cash: Decimal,
    trades: &[Trade],
) -> Result<ReplayedLedger, PaperTraderError> {
    let mut cash = starting_cash;
    let mut positions: BTreeMap<String, Position> = BTreeMap::new();

    for trade in trades {
        let side: TradeSide = trade
            .side
            .parse()
            .map_err(|e| corruption(simulator_id, format!("trade {}: {}", trade.id, e)))?;
        if trade.quantity <= Decimal::ZERO {
            return Err(corruption(
                simulator_id,
                format!("trade {} has non-positive quantity {}", trade.id, trade.quantity),
            ));
        }
        if trade.price <= Decimal::ZERO {
            return Err(corruption(
                simulator_id,
                format!("trade {} has non-positive price {}", trade.id, trade.price),
            ));
        }
        if trade.fee < Decimal::ZERO {
            return Err(corruption(
                simulator_id,
                format!("trade {} has negative fee {}", trade.id, trade.fee),
            ));
        }

        let gross = trade
            .price
            .checked_mul(trade.quantity)
            .ok_or_else(|| overflow(simulator_id, trade))?;
        match side {
            TradeSide::Buy => {
                cash = gross
                    .checked_add(trade.fee)
                    .and_then(|cost| cash.checked_sub(cost))
                    .ok_or_else(|| overflow(simulator_id, trade))?;
                let booked = positions
                    .entry(trade.symbol.clone())
                    .or_insert_with(|| Position::empty(&trade.symbol))
                    .add_purchase(trade.quantity, trade.price, trade.fee);
                if !booked {
                    return Err(overflow(simulator_id, trade));
                }
            }
            TradeSide::Sell => {
                let held = positions
                    .get(&trade.symbol)
                    .map(|pos| pos.quantity)
                    .unwrap_or(Decimal::ZERO);
                let removed = positions
                    .get_mut(&trade.symbol)
                    .is_some_and(|pos| pos.remove_shares(trade.quantity));
                if !removed {
                    return Err(corruption(
                        simulator_id,
                        format!(
                            "trade {} sells {} {} but only {} held",
                            trade.id, trade.quantity, trade.symbol, held
                        ),
                    ));
                }
                cash = gross
                    .checked_sub(trade.fee)
                    .and_then(|proceeds| cash.checked_add(proceeds))
                    .ok_or_else(|| overflow(simulator_id, trade))?;
                if positions.get(&trade.symbol).is_some_and(Position::is_closed) {
                    positions.remove(&trade.symbol);
                }
            }
        }
    }

    Ok(ReplayedLedger { cash, positions })
}

/// Number of symbols whose quantity or average cost differ between the two
/// sides, counting symbols present on only one side.
pub fn position_drift_count(stored: &[Position], replayed: &BTreeMap<String, Position>) -> usize {
    let stored: BTreeMap<&str, &Position> = stored.iter().map(|p| (p.symbol.as_str(), p)).collect();
    let symbols: BTreeSet<&str> = stored
        .keys()
        .copied()
        .chain(replayed.keys().map(String::as_str))
        .collect();

    symbols
        .into_iter()
        .filter(|symbol| match (stored.get(symbol), replayed.get(*symbol)) {
            (Some(s), Some(r)) => s.quantity != r.quantity || s.average_cost != r.average_cost,
            _ => true,
        })
        .count()
}

/// Replay one simulator's ledger and overwrite its stored cash and positions.
pub fn reconcile_simulator(
    store: &mut dyn TradingStore,
    simulator_id: i64,
    now: DateTime<Utc>,
) -> Result<ReconciliationReport, PaperTraderError> {
    let simulator = store
        .get_simulator(simulator_id)?
        .ok_or(PaperTraderError::SimulatorNotFound { simulator_id })?;
    let trades = store.list_trades(simulator_id)?;
    let replayed = replay_trades(simulator_id, simulator.starting_cash, &trades)?;

    let stored_positions = store.list_positions(simulator_id)?;
    let cash_drift = simulator
        .cash_balance
        .checked_sub(replayed.cash)
        .ok_or_else(|| {
            corruption(
                simulator_id,
                format!(
                    "stored cash {} is out of range of replayed cash {}",
                    simulator.cash_balance, replayed.cash
                ),
            )
        })?;
    let drift_count = position_drift_count(&stored_positions, &replayed.positions);

    let positions: Vec<Position> = replayed.positions.into_values().collect();
    store.replace_positions(simulator_id, &positions)?;
    store.update_cash_balance(simulator_id, replayed.cash, now)?;
    if !cash_drift.is_zero() {
        store.append_cash_entries(
            simulator_id,
            &[CashLedgerEntry::adjustment(-cash_drift, replayed.cash, now)],
        )?;
    }

    let report = ReconciliationReport {
        simulator_id,
        trades_replayed: trades.len(),
        stored_cash: simulator.cash_balance,
        replayed_cash: replayed.cash,
        cash_drift,
        position_drift_count: drift_count,
        positions,
    };
    if report.has_drift() {
        warn!(
            "Simulator {} drifted: cash {} ({} position(s)), healed",
            simulator_id, cash_drift, drift_count
        );
    } else {
        debug!("Simulator {} reconciled with no drift", simulator_id);
    }
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationFailure {
    pub simulator_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationSummary {
    pub simulators_processed: usize,
    pub drifted: usize,
    pub failed: usize,
    pub reports: Vec<ReconciliationReport>,
    pub failures: Vec<ReconciliationFailure>,
}

/// Reconcile one simulator, or every simulator up to `config.limit`.
/// Ledger corruption aborts only the affected simulator and is reported in
/// `failures`; storage faults abort the run.
pub fn reconcile_all(
    store: &mut dyn TradingStore,
    config: &ReconciliationConfig,
    simulator_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ReconciliationSummary, PaperTraderError> {
    let ids: Vec<i64> = match simulator_id {
        Some(id) => vec![id],
        None => store
            .list_simulators(config.limit)?
            .into_iter()
            .map(|sim| sim.id)
            .collect(),
    };
    info!("Reconciling {} simulator(s)", ids.len());

    let mut summary = ReconciliationSummary::default();
    for id in ids {
        summary.simulators_processed += 1;
        match reconcile_simulator(store, id, now) {
            Ok(report) => {
                if report.has_drift() {
                    summary.drifted += 1;
                }
                summary.reports.push(report);
            }
            Err(err) if err.is_infrastructure() => return Err(err),
            Err(err) => {
                warn!("Reconciliation failed for simulator {}: {}", id, err);
                summary.failed += 1;
                summary.failures.push(ReconciliationFailure {
                    simulator_id: id,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        "Reconciliation complete: {} processed, {} drifted, {} failed",
        summary.simulators_processed, summary.drifted, summary.failed
    );
    Ok(summary)
}
