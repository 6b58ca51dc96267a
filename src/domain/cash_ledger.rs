//! Append-only audit trail of cash movements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::trade::NewTrade;

pub const RECONCILIATION_ADJUSTMENT: &str = "reconciliation adjustment";

#[derive(Debug, Clone, PartialEq)]
pub struct CashLedgerEntry {
    pub delta: Decimal,
    pub reason: String,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CashLedgerEntry {
    pub fn for_trade(trade: &NewTrade, balance_after: Decimal) -> Self {
        CashLedgerEntry {
            delta: trade.cash_delta(),
            reason: format!(
                "{} {} {} @ {}",
                trade.side, trade.quantity, trade.symbol, trade.price
            ),
            balance_after,
            created_at: trade.executed_at,
        }
    }

    pub fn adjustment(delta: Decimal, balance_after: Decimal, at: DateTime<Utc>) -> Self {
        CashLedgerEntry {
            delta,
            reason: RECONCILIATION_ADJUSTMENT.to_string(),
            balance_after,
            created_at: at,
        }
    }
}
