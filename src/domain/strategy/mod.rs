//! Strategy contract and the name-keyed registry.
//!
//! A strategy is a pure function from price history and a portfolio snapshot
//! to candidate signals. `hold` is always a valid, non-executable output.

pub mod sma_crossover;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::domain::error::PaperTraderError;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::price_bar::PriceBar;
use crate::domain::signal::Signal;

pub use sma_crossover::SmaCrossover;

/// Tunable strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    pub short_window: usize,
    pub long_window: usize,
    pub trade_quantity: Decimal,
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams {
            short_window: 5,
            long_window: 20,
            trade_quantity: dec!(1),
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<(), PaperTraderError> {
        if self.short_window == 0 || self.long_window == 0 {
            return Err(PaperTraderError::InvalidStrategyParams {
                reason: "short_window and long_window must be positive".into(),
            });
        }
        if self.short_window >= self.long_window {
            return Err(PaperTraderError::InvalidStrategyParams {
                reason: "short_window must be smaller than long_window".into(),
            });
        }
        if self.trade_quantity <= Decimal::ZERO {
            return Err(PaperTraderError::InvalidStrategyParams {
                reason: "trade_quantity must be positive".into(),
            });
        }
        Ok(())
    }
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Produce one signal per symbol present in `prices`, sorted by symbol.
    /// Invalid `params` fail the whole call.
    fn generate_signals(
        &self,
        prices: &[PriceBar],
        portfolio: &PortfolioSnapshot,
        params: &StrategyParams,
    ) -> Result<Vec<Signal>, PaperTraderError>;
}

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Box<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SmaCrossover));
        registry
    }

    /// Register a strategy under its own name, replacing any previous one.
    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<&dyn Strategy, PaperTraderError> {
        self.strategies
            .get(name)
            .map(|s| s.as_ref())
            .ok_or_else(|| PaperTraderError::UnknownStrategy {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}
