//! Price store port trait.

use crate::domain::error::PaperTraderError;
use crate::domain::price_bar::PriceBar;
use crate::domain::simulator::PriceMode;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub trait PricePort {
    /// Most recent bar's price for `symbol` under `mode`, across all sources.
    fn latest_price(
        &self,
        symbol: &str,
        mode: PriceMode,
    ) -> Result<Option<Decimal>, PaperTraderError>;

    fn latest_close(&self, symbol: &str) -> Result<Option<Decimal>, PaperTraderError> {
        self.latest_price(symbol, PriceMode::Close)
    }

    /// Bars for `symbols` with `start <= day <= end` from `source`, ordered by
    /// symbol then day.
    fn list_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        source: &str,
    ) -> Result<Vec<PriceBar>, PaperTraderError>;

    /// Insert or replace bars keyed on (symbol, day, source). Returns the
    /// number of bars written.
    fn upsert_bars(&mut self, bars: &[PriceBar]) -> Result<usize, PaperTraderError>;
}
