//! Daily OHLCV price bar representation.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::simulator::PriceMode;

pub const DEFAULT_PRICE_SOURCE: &str = "yfinance";

/// One daily bar, unique on (symbol, day, source).
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub day: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub source: String,
}

impl PriceBar {
    /// The reference price execution fills against under `mode`.
    pub fn price(&self, mode: PriceMode) -> Decimal {
        match mode {
            PriceMode::Open => self.open,
            PriceMode::Close => self.close,
        }
    }
}

/// Canonical ticker form: trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
