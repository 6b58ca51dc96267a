//! Point-in-time portfolio state handed to strategies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::position::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub simulator_id: i64,
    pub user_id: i64,
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    pub as_of: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn new(simulator_id: i64, user_id: i64, cash: Decimal, as_of: DateTime<Utc>) -> Self {
        PortfolioSnapshot {
            simulator_id,
            user_id,
            cash,
            positions: BTreeMap::new(),
            as_of,
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    /// Held quantity for `symbol`, zero when there is no position.
    pub fn held_quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|pos| pos.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}
