//! Simple moving average crossover strategy.
//!
//! Compares the short and long SMA of closes on the full series and on the
//! series without its newest bar, so a crossover is detected exactly at the
//! newest bar.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::{Strategy, StrategyParams};
use crate::domain::action::SignalAction;
use crate::domain::error::PaperTraderError;
use crate::domain::indicator::{sma, spread_confidence};
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::price_bar::{PriceBar, normalize_symbol};
use crate::domain::signal::Signal;

pub const SMA_CROSSOVER: &str = "sma_crossover";

#[derive(Debug, Clone, Copy, Default)]
pub struct SmaCrossover;

/// Crossover state at the newest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crossover {
    Up,
    Down,
    None,
}

fn detect_crossover(
    prev_short: Decimal,
    prev_long: Decimal,
    curr_short: Decimal,
    curr_long: Decimal,
) -> Crossover {
    if prev_short <= prev_long && curr_short > curr_long {
        Crossover::Up
    } else if prev_short >= prev_long && curr_short < curr_long {
        Crossover::Down
    } else {
        Crossover::None
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        SMA_CROSSOVER
    }

    fn generate_signals(
        &self,
        prices: &[PriceBar],
        portfolio: &PortfolioSnapshot,
        params: &StrategyParams,
    ) -> Result<Vec<Signal>, PaperTraderError> {
        params.validate()?;

        let mut bars_by_symbol: BTreeMap<String, Vec<&PriceBar>> = BTreeMap::new();
        for bar in prices {
            bars_by_symbol
                .entry(normalize_symbol(&bar.symbol))
                .or_default()
                .push(bar);
        }

        let created_at = Utc::now();
        let mut signals = Vec::with_capacity(bars_by_symbol.len());

        for (symbol, mut bars) in bars_by_symbol {
            bars.sort_by_key(|bar| bar.day);
            let closes: Vec<Decimal> = bars.iter().map(|bar| bar.close).collect();

            let hold = |reason: String, confidence: Decimal| Signal {
                symbol: symbol.clone(),
                action: SignalAction::Hold,
                quantity: Decimal::ZERO,
                reason,
                confidence,
                strategy_name: SMA_CROSSOVER.to_string(),
                created_at,
            };

            let (Some(curr_short), Some(curr_long)) = (
                sma(&closes, params.short_window),
                sma(&closes, params.long_window),
            ) else {
                signals.push(hold(
                    format!(
                        "not enough history for SMA crossover ({}/{} bars)",
                        closes.len(),
                        params.long_window
                    ),
                    Decimal::ZERO,
                ));
                continue;
            };

            let confidence = spread_confidence(curr_short, curr_long);
            let previous = &closes[..closes.len() - 1];

            // With exactly `long_window` bars there is no previous long SMA to
            // cross from.
            let (Some(prev_short), Some(prev_long)) = (
                sma(previous, params.short_window),
                sma(previous, params.long_window),
            ) else {
                signals.push(hold("no crossover signal".into(), confidence));
                continue;
            };

            let held = portfolio.held_quantity(&symbol);

            let signal = match detect_crossover(prev_short, prev_long, curr_short, curr_long) {
                Crossover::Up => Signal {
                    action: SignalAction::Buy,
                    quantity: params.trade_quantity,
                    reason: "short SMA crossed above long SMA".into(),
                    ..hold(String::new(), confidence)
                },
                Crossover::Down if held > Decimal::ZERO => Signal {
                    action: SignalAction::Sell,
                    quantity: params.trade_quantity.min(held),
                    reason: "short SMA crossed below long SMA".into(),
                    ..hold(String::new(), confidence)
                },
                Crossover::Down => hold("bearish crossover but no position to sell".into(), confidence),
                Crossover::None => hold("no crossover signal".into(), confidence),
            };
            signals.push(signal);
        }

        signals.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(signals)
    }
}
