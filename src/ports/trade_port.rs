//! Trade ledger port trait. The ledger is append-only.

use crate::domain::error::PaperTraderError;
use crate::domain::trade::{NewTrade, Trade};

pub trait TradePort {
    fn insert_trade(&mut self, simulator_id: i64, trade: &NewTrade)
    -> Result<i64, PaperTraderError>;

    /// The full ledger for a simulator, ordered by executed_at then id.
    fn list_trades(&self, simulator_id: i64) -> Result<Vec<Trade>, PaperTraderError>;
}
