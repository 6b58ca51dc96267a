//! Immutable trade ledger entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::action::TradeSide;

/// A trade about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl NewTrade {
    /// price × quantity, before fees.
    pub fn gross_value(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Signed cash effect: buys spend gross + fee, sells receive gross − fee.
    pub fn cash_delta(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => -(self.gross_value() + self.fee),
            TradeSide::Sell => self.gross_value() - self.fee,
        }
    }
}

/// A persisted ledger row. The side is kept as stored text so replay can
/// report a corrupted value instead of failing to load the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub id: i64,
    pub simulator_id: i64,
    pub symbol: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub executed_at: DateTime<Utc>,
}
