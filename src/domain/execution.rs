//! Paper trade execution of pending signals.
//!
//! Pending signals are processed oldest first. Each simulator touched by the
//! batch gets a [`SimulatorBook`] seeded from storage once; every later signal
//! in the batch sees the cash and holdings left by earlier ones. Business
//! outcomes (failed, skipped) are recorded on the signal; only storage faults
//! are returned as errors. All writes happen in [`ExecutionContext::persist`]
//! at the end of the batch.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::action::{SignalAction, TradeSide};
use crate::domain::cash_ledger::CashLedgerEntry;
use crate::domain::error::PaperTraderError;
use crate::domain::position::Position;
use crate::domain::price_bar::normalize_symbol;
use crate::domain::signal::{SignalOutcome, SignalRecord, SignalStatus};
use crate::domain::simulator::{Simulator, SimulatorSettings};
use crate::domain::trade::NewTrade;
use crate::ports::store_port::TradingStore;

pub const HOLD_NOT_EXECUTABLE: &str = "hold signal is not executable";

const BPS_DIVISOR: Decimal = dec!(10000);
const HUNDRED: Decimal = dec!(100);

/// Cost and batch parameters for one execution run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub batch_limit: usize,
    pub slippage_bps: Decimal,
    pub fee_per_trade: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            batch_limit: 500,
            slippage_bps: Decimal::ZERO,
            fee_per_trade: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub processed: usize,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub trades_created: usize,
}

/// Fill price after slippage: buys pay up, sells receive less.
pub fn apply_slippage(price: Decimal, side: TradeSide, slippage_bps: Decimal) -> Decimal {
    if slippage_bps.is_zero() {
        return price;
    }
    let rate = slippage_bps / BPS_DIVISOR;
    match side {
        TradeSide::Buy => price * (Decimal::ONE + rate),
        TradeSide::Sell => price * (Decimal::ONE - rate),
    }
}

/// Largest quantity `cash` can pay for at `price` after a fixed `fee`.
pub fn affordable_quantity(cash: Decimal, fee: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((cash - fee) / price).max(Decimal::ZERO)
}

/// Batch-local cash and holdings for one simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorBook {
    pub simulator_id: i64,
    pub starting_cash: Decimal,
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    pub settings: SimulatorSettings,
    trades: Vec<NewTrade>,
    cash_entries: Vec<CashLedgerEntry>,
}

impl SimulatorBook {
    pub fn seed(simulator: &Simulator, positions: Vec<Position>) -> Self {
        let positions = positions
            .into_iter()
            .map(|mut pos| {
                pos.symbol = normalize_symbol(&pos.symbol);
                (pos.symbol.clone(), pos)
            })
            .collect();
        SimulatorBook {
            simulator_id: simulator.id,
            starting_cash: simulator.starting_cash,
            cash: simulator.cash_balance,
            positions,
            settings: simulator.settings.clone(),
            trades: Vec::new(),
            cash_entries: Vec::new(),
        }
    }

    pub fn held(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|pos| pos.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn trades(&self) -> &[NewTrade] {
        &self.trades
    }

    /// First gate: the requested quantity must be affordable (buy) or held
    /// (sell) at the reference price.
    pub fn check_sizing(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        price: Decimal,
        fee: Decimal,
    ) -> Result<(), String> {
        match side {
            TradeSide::Buy => {
                let affordable = affordable_quantity(self.cash, fee, price);
                if quantity > affordable {
                    return Err(format!(
                        "requested quantity exceeds affordable quantity (requested {}, affordable {})",
                        quantity,
                        affordable.normalize()
                    ));
                }
            }
            TradeSide::Sell => {
                let held = self.held(symbol);
                if quantity > held {
                    return Err(format!(
                        "requested quantity exceeds held shares (requested {}, held {})",
                        quantity, held
                    ));
                }
            }
        }
        Ok(())
    }

    /// Second, independent gate evaluated at the fill price: cash must stay
    /// non-negative, shares must be held, and the simulator's risk caps hold.
    pub fn check_risk(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: Decimal,
        fill_price: Decimal,
        fee: Decimal,
    ) -> Result<(), String> {
        let overflow = || "risk check failed: order value out of range".to_string();
        let gross = fill_price.checked_mul(quantity).ok_or_else(overflow)?;
        match side {
            TradeSide::Buy => {
                let cost = gross.checked_add(fee).ok_or_else(overflow)?;
                if cost > self.cash {
                    return Err(format!(
                        "risk check failed: insufficient cash (cost {}, cash {})",
                        cost, self.cash
                    ));
                }
                if let Some(cap) = self.settings.max_order_value {
                    if gross > cap {
                        return Err(format!(
                            "order value exceeds max_order_value (order {}, cap {})",
                            gross, cap
                        ));
                    }
                }
                if let Some(pct) = self.settings.max_position_pct {
                    let limit = self.starting_cash * pct / HUNDRED;
                    let exposure = self
                        .held(symbol)
                        .checked_add(quantity)
                        .and_then(|shares| shares.checked_mul(fill_price))
                        .ok_or_else(overflow)?;
                    if exposure > limit {
                        return Err(format!(
                            "position exceeds max_position_pct (exposure {}, limit {})",
                            exposure, limit
                        ));
                    }
                }
                let mut after = self
                    .positions
                    .get(symbol)
                    .cloned()
                    .unwrap_or_else(|| Position::empty(symbol));
                if !after.add_purchase(quantity, fill_price, fee) {
                    return Err("risk check failed: position cost basis out of range".to_string());
                }
            }
            TradeSide::Sell => {
                if quantity > self.held(symbol) {
                    return Err("risk check failed: insufficient shares".to_string());
                }
                if self.cash + (gross - fee) < Decimal::ZERO {
                    return Err("risk check failed: insufficient cash to cover fee".to_string());
                }
            }
        }
        Ok(())
    }

    /// Book a fill that passed `check_risk`: move cash, update the holding
    /// and record the ledger entry.
    fn apply(&mut self, trade: NewTrade) {
        self.cash += trade.cash_delta();
        match trade.side {
            TradeSide::Buy => {
                let booked = self
                    .positions
                    .entry(trade.symbol.clone())
                    .or_insert_with(|| Position::empty(&trade.symbol))
                    .add_purchase(trade.quantity, trade.price, trade.fee);
                debug_assert!(booked, "risk gate admitted an overflowing purchase");
            }
            TradeSide::Sell => {
                let closed = match self.positions.get_mut(&trade.symbol) {
                    Some(pos) => pos.remove_shares(trade.quantity) && pos.is_closed(),
                    None => false,
                };
                if closed {
                    self.positions.remove(&trade.symbol);
                }
            }
        }
        self.cash_entries
            .push(CashLedgerEntry::for_trade(&trade, self.cash));
        self.trades.push(trade);
    }
}

/// Per-signal decision before any write.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Trade(NewTrade),
    Skip(String),
    Fail(String),
}

/// Structural checks: non-blank ticker, recognised action, positive
/// quantity for anything but hold.
pub fn validate_structure(signal: &SignalRecord) -> Result<(String, SignalAction), String> {
    let ticker = normalize_symbol(&signal.ticker);
    if ticker.is_empty() {
        return Err("signal ticker is blank".to_string());
    }
    let action: SignalAction = signal.action.parse().map_err(|e| format!("{e}"))?;
    if action != SignalAction::Hold && signal.quantity <= Decimal::ZERO {
        return Err(format!(
            "signal quantity must be positive for {} (got {})",
            action, signal.quantity
        ));
    }
    Ok((ticker, action))
}

/// Seed the simulator's book on first use. `None` if the simulator does not
/// exist.
fn load_book<'b>(
    books: &'b mut BTreeMap<i64, SimulatorBook>,
    store: &dyn TradingStore,
    simulator_id: i64,
) -> Result<Option<&'b mut SimulatorBook>, PaperTraderError> {
    if !books.contains_key(&simulator_id) {
        let Some(simulator) = store.get_simulator(simulator_id)? else {
            return Ok(None);
        };
        let positions = store.list_positions(simulator_id)?;
        books.insert(simulator_id, SimulatorBook::seed(&simulator, positions));
    }
    Ok(books.get_mut(&simulator_id))
}

/// Named working state for one execution batch.
pub struct ExecutionContext {
    config: ExecutionConfig,
    now: DateTime<Utc>,
    books: BTreeMap<i64, SimulatorBook>,
    outcomes: Vec<(i64, SignalOutcome)>,
    summary: ExecutionSummary,
}

impl ExecutionContext {
    pub fn new(config: ExecutionConfig, now: DateTime<Utc>) -> Self {
        ExecutionContext {
            config,
            now,
            books: BTreeMap::new(),
            outcomes: Vec::new(),
            summary: ExecutionSummary::default(),
        }
    }

    pub fn book(&self, simulator_id: i64) -> Option<&SimulatorBook> {
        self.books.get(&simulator_id)
    }

    pub fn summary(&self) -> &ExecutionSummary {
        &self.summary
    }

    /// Run the gates for one signal. A fill that passes them is booked into
    /// the simulator's batch-local state before it is returned.
    fn decide(
        &mut self,
        store: &dyn TradingStore,
        signal: &SignalRecord,
    ) -> Result<Decision, PaperTraderError> {
        let (ticker, action) = match validate_structure(signal) {
            Ok(valid) => valid,
            Err(reason) => return Ok(Decision::Fail(reason)),
        };

        let side = match action.side() {
            Some(side) => side,
            None => return Ok(Decision::Skip(HOLD_NOT_EXECUTABLE.to_string())),
        };

        let Some(book) = load_book(&mut self.books, store, signal.simulator_id)? else {
            return Ok(Decision::Fail(format!(
                "simulator {} not found",
                signal.simulator_id
            )));
        };

        let price = match store.latest_price(&ticker, book.settings.price_mode)? {
            Some(price) if price > Decimal::ZERO => price,
            Some(price) => {
                return Ok(Decision::Fail(format!(
                    "invalid latest price {} for {}",
                    price, ticker
                )));
            }
            None => return Ok(Decision::Fail(format!("no latest price for {}", ticker))),
        };

        let fee = self.config.fee_per_trade;
        let quantity = signal.quantity;

        if let Err(reason) = book.check_sizing(&ticker, side, quantity, price, fee) {
            return Ok(Decision::Fail(reason));
        }

        let fill_price = apply_slippage(price, side, self.config.slippage_bps);
        if let Err(reason) = book.check_risk(&ticker, side, quantity, fill_price, fee) {
            return Ok(Decision::Fail(reason));
        }

        let trade = NewTrade {
            symbol: ticker,
            side,
            quantity,
            price: fill_price,
            fee,
            executed_at: self.now,
        };
        book.apply(trade.clone());
        Ok(Decision::Trade(trade))
    }

    /// Run one pending signal through the pipeline and record its terminal
    /// state. Already-terminal signals are ignored.
    pub fn process(
        &mut self,
        store: &dyn TradingStore,
        signal: &SignalRecord,
    ) -> Result<SignalStatus, PaperTraderError> {
        if signal.status.is_terminal() {
            return Ok(signal.status);
        }
        self.summary.processed += 1;

        let outcome = match self.decide(store, signal)? {
            Decision::Trade(trade) => {
                debug!(
                    "Signal {}: {} {} {} @ {}",
                    signal.id, trade.side, trade.quantity, trade.symbol, trade.price
                );
                self.summary.executed += 1;
                self.summary.trades_created += 1;
                SignalOutcome::executed(self.now)
            }
            Decision::Skip(reason) => {
                self.summary.skipped += 1;
                SignalOutcome::skipped(reason)
            }
            Decision::Fail(reason) => {
                warn!("Signal {} failed: {}", signal.id, reason);
                self.summary.failed += 1;
                SignalOutcome::failed(reason)
            }
        };

        let status = outcome.status;
        self.outcomes.push((signal.id, outcome));
        Ok(status)
    }

    /// Write every trade, signal outcome, cash balance, position set and cash
    /// ledger entry accumulated by this batch.
    pub fn persist(self, store: &mut dyn TradingStore) -> Result<ExecutionSummary, PaperTraderError> {
        for book in self.books.values() {
            if book.trades.is_empty() {
                continue;
            }
            for trade in &book.trades {
                store.insert_trade(book.simulator_id, trade)?;
            }
            let positions: Vec<Position> = book.positions.values().cloned().collect();
            store.replace_positions(book.simulator_id, &positions)?;
            store.update_cash_balance(book.simulator_id, book.cash, self.now)?;
            store.append_cash_entries(book.simulator_id, &book.cash_entries)?;
        }
        for (signal_id, outcome) in &self.outcomes {
            store.record_signal_outcome(*signal_id, outcome)?;
        }
        Ok(self.summary)
    }
}

/// Execute up to `config.batch_limit` pending signals, optionally scoped to
/// one simulator.
pub fn execute_pending_signals(
    store: &mut dyn TradingStore,
    config: &ExecutionConfig,
    simulator_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<ExecutionSummary, PaperTraderError> {
    let pending = store.list_pending_signals(simulator_id, config.batch_limit)?;
    info!("Executing {} pending signal(s)", pending.len());

    let mut context = ExecutionContext::new(config.clone(), now);
    for signal in &pending {
        context.process(store, signal)?;
    }
    let summary = context.persist(store)?;

    info!(
        "Execution complete: {} processed, {} executed, {} skipped, {} failed",
        summary.processed, summary.executed, summary.skipped, summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(cash: Decimal) -> SimulatorBook {
        SimulatorBook {
            simulator_id: 1,
            starting_cash: dec!(1000),
            cash,
            positions: BTreeMap::new(),
            settings: SimulatorSettings::default(),
            trades: Vec::new(),
            cash_entries: Vec::new(),
        }
    }

    fn record(ticker: &str, action: &str, quantity: Decimal) -> SignalRecord {
        SignalRecord {
            id: 1,
            simulator_id: 1,
            ticker: ticker.into(),
            action: action.into(),
            quantity,
            reason: "test".into(),
            confidence: dec!(0.5),
            strategy_name: "test".into(),
            status: SignalStatus::Pending,
            created_at: Utc::now(),
            executed_at: None,
            execution_error: None,
        }
    }

    fn buy(symbol: &str, quantity: Decimal, price: Decimal, fee: Decimal) -> NewTrade {
        NewTrade {
            symbol: symbol.into(),
            side: TradeSide::Buy,
            quantity,
            price,
            fee,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn zero_slippage_returns_price() {
        assert_eq!(apply_slippage(dec!(100), TradeSide::Buy, Decimal::ZERO), dec!(100));
        assert_eq!(apply_slippage(dec!(100), TradeSide::Sell, Decimal::ZERO), dec!(100));
    }

    #[test]
    fn slippage_moves_price_against_trader() {
        assert_eq!(apply_slippage(dec!(100), TradeSide::Buy, dec!(25)), dec!(100.25));
        assert_eq!(apply_slippage(dec!(100), TradeSide::Sell, dec!(25)), dec!(99.75));
    }

    #[test]
    fn affordable_quantity_nets_fee() {
        assert_eq!(affordable_quantity(dec!(101), dec!(1), dec!(50)), dec!(2));
        assert_eq!(affordable_quantity(dec!(0.5), dec!(1), dec!(50)), Decimal::ZERO);
        assert_eq!(affordable_quantity(dec!(100), dec!(0), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn sizing_rejects_unaffordable_buy() {
        let b = book(dec!(100));
        let err = b
            .check_sizing("AAPL", TradeSide::Buy, dec!(2), dec!(60), Decimal::ZERO)
            .unwrap_err();
        assert!(err.starts_with("requested quantity exceeds affordable quantity"));
        assert!(b.check_sizing("AAPL", TradeSide::Buy, dec!(1), dec!(60), Decimal::ZERO).is_ok());
    }

    #[test]
    fn sizing_rejects_sell_beyond_holding() {
        let mut b = book(dec!(100));
        b.apply(buy("AAPL", dec!(1), dec!(10), Decimal::ZERO));
        let err = b
            .check_sizing("AAPL", TradeSide::Sell, dec!(2), dec!(10), Decimal::ZERO)
            .unwrap_err();
        assert!(err.starts_with("requested quantity exceeds held shares"));
    }

    #[test]
    fn risk_check_uses_fill_price() {
        let b = book(dec!(100));
        // Affordable at the reference price, not after 1% slippage.
        assert!(b.check_sizing("AAPL", TradeSide::Buy, dec!(1), dec!(100), Decimal::ZERO).is_ok());
        let err = b
            .check_risk("AAPL", TradeSide::Buy, dec!(1), dec!(101), Decimal::ZERO)
            .unwrap_err();
        assert!(err.contains("insufficient cash"));
    }

    #[test]
    fn risk_caps_limit_buys() {
        let mut b = book(dec!(1000));
        b.settings.max_order_value = Some(dec!(150));
        let err = b
            .check_risk("AAPL", TradeSide::Buy, dec!(2), dec!(100), Decimal::ZERO)
            .unwrap_err();
        assert!(err.starts_with("order value exceeds max_order_value"));

        let mut b = book(dec!(1000));
        b.settings.max_position_pct = Some(dec!(10));
        b.apply(buy("AAPL", dec!(1), dec!(50), Decimal::ZERO));
        // Holding 1 + 1 more at 60 = 120 > 10% of 1000.
        let err = b
            .check_risk("AAPL", TradeSide::Buy, dec!(1), dec!(60), Decimal::ZERO)
            .unwrap_err();
        assert!(err.starts_with("position exceeds max_position_pct"));
        assert!(b.check_risk("MSFT", TradeSide::Buy, dec!(1), dec!(60), Decimal::ZERO).is_ok());
    }

    #[test]
    fn risk_check_rejects_out_of_range_orders() {
        let b = book(Decimal::MAX);
        let err = b
            .check_risk("AAPL", TradeSide::Buy, Decimal::MAX, dec!(2), Decimal::ZERO)
            .unwrap_err();
        assert_eq!(err, "risk check failed: order value out of range");

        let mut b = book(Decimal::MAX);
        b.positions.insert(
            "AAPL".into(),
            Position {
                symbol: "AAPL".into(),
                quantity: dec!(2),
                average_cost: Decimal::MAX / dec!(2),
            },
        );
        let err = b
            .check_risk("AAPL", TradeSide::Buy, dec!(1), dec!(10), Decimal::ZERO)
            .unwrap_err();
        assert!(err.contains("cost basis out of range"));
        assert_eq!(b.held("AAPL"), dec!(2));
    }

    #[test]
    fn apply_moves_cash_and_holdings() {
        let mut b = book(dec!(1000));
        b.apply(buy("AAPL", dec!(2), dec!(100), dec!(1)));
        assert_eq!(b.cash, dec!(799));
        assert_eq!(b.held("AAPL"), dec!(2));

        b.apply(NewTrade {
            side: TradeSide::Sell,
            ..buy("AAPL", dec!(2), dec!(110), dec!(1))
        });
        assert_eq!(b.cash, dec!(1018));
        assert!(b.positions.is_empty());
        assert_eq!(b.trades().len(), 2);
        assert_eq!(b.cash_entries.len(), 2);
        assert_eq!(b.cash_entries[1].balance_after, dec!(1018));
    }

    #[test]
    fn structure_rejects_blank_ticker() {
        let err = validate_structure(&record("  ", "buy", dec!(1))).unwrap_err();
        assert_eq!(err, "signal ticker is blank");
    }

    #[test]
    fn structure_rejects_unknown_action() {
        let err = validate_structure(&record("AAPL", "short", dec!(1))).unwrap_err();
        assert!(err.contains("unsupported action"));
    }

    #[test]
    fn structure_requires_positive_quantity_except_hold() {
        assert!(validate_structure(&record("AAPL", "buy", Decimal::ZERO)).is_err());
        assert!(validate_structure(&record("AAPL", "sell", dec!(-1))).is_err());
        let (ticker, action) = validate_structure(&record(" aapl", "hold", Decimal::ZERO)).unwrap();
        assert_eq!(ticker, "AAPL");
        assert_eq!(action, SignalAction::Hold);
    }
}
