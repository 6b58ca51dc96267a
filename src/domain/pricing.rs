//! Price bar ingestion.

use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::error::PaperTraderError;
use crate::domain::price_bar::{PriceBar, normalize_symbol};
use crate::ports::store_port::TradingStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub received: usize,
    pub stored: usize,
    pub rejected: usize,
}

/// Why a bar cannot be stored, if it cannot.
pub fn check_bar(bar: &PriceBar) -> Option<String> {
    if bar.symbol.is_empty() {
        return Some("blank symbol".to_string());
    }
    if bar.close <= Decimal::ZERO {
        return Some(format!("non-positive close {}", bar.close));
    }
    if bar.high < bar.low {
        return Some(format!("high {} below low {}", bar.high, bar.low));
    }
    None
}

/// Normalise, validate and upsert `bars`. Re-ingesting the same bars is a
/// no-op on stored state.
pub fn ingest_bars(
    store: &mut dyn TradingStore,
    bars: Vec<PriceBar>,
) -> Result<IngestSummary, PaperTraderError> {
    let mut summary = IngestSummary {
        received: bars.len(),
        ..Default::default()
    };

    let mut accepted = Vec::with_capacity(bars.len());
    for mut bar in bars {
        bar.symbol = normalize_symbol(&bar.symbol);
        match check_bar(&bar) {
            Some(reason) => {
                warn!("Rejecting bar {} {}: {}", bar.symbol, bar.day, reason);
                summary.rejected += 1;
            }
            None => accepted.push(bar),
        }
    }

    summary.stored = store.upsert_bars(&accepted)?;
    info!(
        "Ingested {} bar(s): {} stored, {} rejected",
        summary.received, summary.stored, summary.rejected
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(symbol: &str, high: Decimal, low: Decimal, close: Decimal) -> PriceBar {
        PriceBar {
            symbol: symbol.into(),
            day: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 100,
            source: "yfinance".into(),
        }
    }

    #[test]
    fn valid_bar_passes() {
        assert_eq!(check_bar(&bar("AAPL", dec!(11), dec!(9), dec!(10))), None);
    }

    #[test]
    fn rejects_blank_symbol() {
        assert_eq!(
            check_bar(&bar("", dec!(11), dec!(9), dec!(10))).as_deref(),
            Some("blank symbol")
        );
    }

    #[test]
    fn rejects_non_positive_close() {
        assert!(check_bar(&bar("AAPL", dec!(11), dec!(9), Decimal::ZERO)).is_some());
    }

    #[test]
    fn rejects_inverted_range() {
        let reason = check_bar(&bar("AAPL", dec!(9), dec!(11), dec!(10))).unwrap();
        assert!(reason.contains("below low"));
    }
}
