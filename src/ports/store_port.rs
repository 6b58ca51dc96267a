//! Combined store seam and unit-of-work handle.

use crate::domain::error::PaperTraderError;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::price_port::PricePort;
use crate::ports::signal_port::SignalPort;
use crate::ports::trade_port::TradePort;

/// Every repository a job stage may touch, reachable through one handle.
pub trait TradingStore: PricePort + LedgerPort + SignalPort + TradePort {}

impl<T: PricePort + LedgerPort + SignalPort + TradePort + ?Sized> TradingStore for T {}

/// A transaction scoped to one job run. Reads and writes go through it and
/// become visible to others only on `commit`; dropping it uncommitted rolls
/// every write back.
pub trait UnitOfWork: TradingStore {
    fn commit(self) -> Result<(), PaperTraderError>;
}
