//! Simulator, tracked stock, position and cash ledger storage port trait.

use crate::domain::cash_ledger::CashLedgerEntry;
use crate::domain::error::PaperTraderError;
use crate::domain::position::Position;
use crate::domain::simulator::{NewSimulator, Simulator, TrackedStock};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub trait LedgerPort {
    fn create_simulator(&mut self, simulator: &NewSimulator) -> Result<i64, PaperTraderError>;

    fn get_simulator(&self, simulator_id: i64) -> Result<Option<Simulator>, PaperTraderError>;

    /// Simulators ordered by id, at most `limit`.
    fn list_simulators(&self, limit: usize) -> Result<Vec<Simulator>, PaperTraderError>;

    /// Simulators with at least one enabled tracked stock, ordered by id,
    /// optionally restricted to one user.
    fn list_evaluable_simulators(
        &self,
        user_id: Option<i64>,
    ) -> Result<Vec<Simulator>, PaperTraderError>;

    /// Delete a simulator and every row that belongs to it.
    fn delete_simulator(&mut self, simulator_id: i64) -> Result<bool, PaperTraderError>;

    fn add_tracked_stock(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        target_allocation: Decimal,
        enabled: bool,
    ) -> Result<i64, PaperTraderError>;

    fn set_tracked_stock_enabled(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        enabled: bool,
    ) -> Result<bool, PaperTraderError>;

    fn list_tracked_stocks(&self, simulator_id: i64)
    -> Result<Vec<TrackedStock>, PaperTraderError>;

    /// Distinct, normalized, sorted tickers of the enabled tracked stocks.
    fn enabled_tickers(&self, simulator_id: i64) -> Result<Vec<String>, PaperTraderError>;

    fn list_positions(&self, simulator_id: i64) -> Result<Vec<Position>, PaperTraderError>;

    /// Replace the stored position set with `positions` exactly.
    fn replace_positions(
        &mut self,
        simulator_id: i64,
        positions: &[Position],
    ) -> Result<(), PaperTraderError>;

    fn update_cash_balance(
        &mut self,
        simulator_id: i64,
        cash_balance: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PaperTraderError>;

    fn append_cash_entries(
        &mut self,
        simulator_id: i64,
        entries: &[CashLedgerEntry],
    ) -> Result<(), PaperTraderError>;

    fn list_cash_entries(&self, simulator_id: i64)
    -> Result<Vec<CashLedgerEntry>, PaperTraderError>;
}
