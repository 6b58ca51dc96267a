#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use papertrader::domain::action::SignalAction;
use papertrader::domain::cash_ledger::CashLedgerEntry;
use papertrader::domain::error::PaperTraderError;
use papertrader::domain::position::Position;
use papertrader::domain::price_bar::{PriceBar, normalize_symbol};
use papertrader::domain::signal::{Signal, SignalOutcome, SignalRecord, SignalStatus};
use papertrader::domain::simulator::{
    NewSimulator, PriceMode, Simulator, SimulatorSettings, TrackedStock,
};
use papertrader::domain::trade::{NewTrade, Trade};
use papertrader::ports::ledger_port::LedgerPort;
use papertrader::ports::price_port::PricePort;
use papertrader::ports::signal_port::SignalPort;
use papertrader::ports::store_port::UnitOfWork;
use papertrader::ports::trade_port::TradePort;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Everything a store holds, cloneable so a unit of work can stage changes.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub simulators: BTreeMap<i64, Simulator>,
    pub tracked: Vec<TrackedStock>,
    pub positions: BTreeMap<i64, Vec<Position>>,
    pub signals: Vec<SignalRecord>,
    pub trades: Vec<Trade>,
    pub cash_entries: BTreeMap<i64, Vec<CashLedgerEntry>>,
    pub bars: BTreeMap<(String, NaiveDate, String), PriceBar>,
    pub next_id: i64,
    /// Make `insert_trade` fail with a database error.
    pub fail_trade_inserts: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of every storage port. Created standalone it
/// behaves like an autocommit store; created by [`MemoryDb::begin`] it stages
/// writes until `commit`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub state: MemoryState,
    target: Option<Rc<RefCell<MemoryState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simulator(mut self, user_id: Option<i64>, starting_cash: Decimal) -> Self {
        self.create_simulator(&new_simulator(user_id, starting_cash))
            .unwrap();
        self
    }

    pub fn with_tracked(mut self, simulator_id: i64, ticker: &str) -> Self {
        self.add_tracked_stock(simulator_id, ticker, dec!(10), true)
            .unwrap();
        self
    }

    pub fn with_bars(mut self, bars: Vec<PriceBar>) -> Self {
        self.upsert_bars(&bars).unwrap();
        self
    }

    /// Insert a pending signal row as stored text, bypassing validation.
    pub fn push_raw_signal(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        action: &str,
        quantity: Decimal,
    ) -> i64 {
        let id = self.state.next_id();
        self.state.signals.push(SignalRecord {
            id,
            simulator_id,
            ticker: ticker.to_string(),
            action: action.to_string(),
            quantity,
            reason: "test".into(),
            confidence: dec!(0.5),
            strategy_name: "test".into(),
            status: SignalStatus::Pending,
            created_at: ts(2024, 1, 1) + Duration::seconds(id),
            executed_at: None,
            execution_error: None,
        });
        id
    }

    pub fn signal(&self, id: i64) -> SignalRecord {
        self.state
            .signals
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap()
    }

    pub fn simulator(&self, id: i64) -> Simulator {
        self.state.simulators[&id].clone()
    }
}

impl UnitOfWork for MemoryStore {
    fn commit(self) -> Result<(), PaperTraderError> {
        if let Some(target) = self.target {
            *target.borrow_mut() = self.state;
        }
        Ok(())
    }
}

/// Shared committed state; each `begin` hands out a staging copy.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    shared: Rc<RefCell<MemoryState>>,
}

impl MemoryDb {
    pub fn from_store(store: MemoryStore) -> Self {
        Self {
            shared: Rc::new(RefCell::new(store.state)),
        }
    }

    pub fn begin(&self) -> Result<MemoryStore, PaperTraderError> {
        Ok(MemoryStore {
            state: self.shared.borrow().clone(),
            target: Some(Rc::clone(&self.shared)),
        })
    }

    pub fn snapshot(&self) -> MemoryState {
        self.shared.borrow().clone()
    }
}

impl PricePort for MemoryStore {
    fn latest_price(
        &self,
        symbol: &str,
        mode: PriceMode,
    ) -> Result<Option<Decimal>, PaperTraderError> {
        let symbol = normalize_symbol(symbol);
        Ok(self
            .state
            .bars
            .values()
            .filter(|b| b.symbol == symbol)
            .max_by(|a, b| a.day.cmp(&b.day).then_with(|| b.source.cmp(&a.source)))
            .map(|b| b.price(mode)))
    }

    fn list_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        source: &str,
    ) -> Result<Vec<PriceBar>, PaperTraderError> {
        let wanted: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        Ok(self
            .state
            .bars
            .values()
            .filter(|b| {
                wanted.contains(&b.symbol) && b.source == source && b.day >= start && b.day <= end
            })
            .cloned()
            .collect())
    }

    fn upsert_bars(&mut self, bars: &[PriceBar]) -> Result<usize, PaperTraderError> {
        for bar in bars {
            self.state.bars.insert(
                (bar.symbol.clone(), bar.day, bar.source.clone()),
                bar.clone(),
            );
        }
        Ok(bars.len())
    }
}

impl LedgerPort for MemoryStore {
    fn create_simulator(&mut self, simulator: &NewSimulator) -> Result<i64, PaperTraderError> {
        let id = self.state.next_id();
        let now = ts(2024, 1, 1);
        self.state.simulators.insert(
            id,
            Simulator {
                id,
                user_id: simulator.user_id,
                name: simulator.name.clone(),
                starting_cash: simulator.starting_cash,
                cash_balance: simulator.starting_cash,
                settings: simulator.settings.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    fn get_simulator(&self, simulator_id: i64) -> Result<Option<Simulator>, PaperTraderError> {
        Ok(self.state.simulators.get(&simulator_id).cloned())
    }

    fn list_simulators(&self, limit: usize) -> Result<Vec<Simulator>, PaperTraderError> {
        Ok(self.state.simulators.values().take(limit).cloned().collect())
    }

    fn list_evaluable_simulators(
        &self,
        user_id: Option<i64>,
    ) -> Result<Vec<Simulator>, PaperTraderError> {
        Ok(self
            .state
            .simulators
            .values()
            .filter(|s| user_id.is_none() || s.user_id == user_id)
            .filter(|s| {
                self.state
                    .tracked
                    .iter()
                    .any(|t| t.simulator_id == s.id && t.enabled)
            })
            .cloned()
            .collect())
    }

    fn delete_simulator(&mut self, simulator_id: i64) -> Result<bool, PaperTraderError> {
        let state = &mut self.state;
        state.tracked.retain(|t| t.simulator_id != simulator_id);
        state.positions.remove(&simulator_id);
        state.signals.retain(|s| s.simulator_id != simulator_id);
        state.trades.retain(|t| t.simulator_id != simulator_id);
        state.cash_entries.remove(&simulator_id);
        Ok(state.simulators.remove(&simulator_id).is_some())
    }

    fn add_tracked_stock(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        target_allocation: Decimal,
        enabled: bool,
    ) -> Result<i64, PaperTraderError> {
        let ticker = normalize_symbol(ticker);
        if let Some(existing) = self
            .state
            .tracked
            .iter_mut()
            .find(|t| t.simulator_id == simulator_id && t.ticker == ticker)
        {
            existing.target_allocation = target_allocation;
            existing.enabled = enabled;
            return Ok(existing.id);
        }
        let id = self.state.next_id();
        self.state.tracked.push(TrackedStock {
            id,
            simulator_id,
            ticker,
            target_allocation,
            enabled,
        });
        Ok(id)
    }

    fn set_tracked_stock_enabled(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        enabled: bool,
    ) -> Result<bool, PaperTraderError> {
        let ticker = normalize_symbol(ticker);
        match self
            .state
            .tracked
            .iter_mut()
            .find(|t| t.simulator_id == simulator_id && t.ticker == ticker)
        {
            Some(t) => {
                t.enabled = enabled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_tracked_stocks(
        &self,
        simulator_id: i64,
    ) -> Result<Vec<TrackedStock>, PaperTraderError> {
        Ok(self
            .state
            .tracked
            .iter()
            .filter(|t| t.simulator_id == simulator_id)
            .cloned()
            .collect())
    }

    fn enabled_tickers(&self, simulator_id: i64) -> Result<Vec<String>, PaperTraderError> {
        let mut tickers: Vec<String> = self
            .state
            .tracked
            .iter()
            .filter(|t| t.simulator_id == simulator_id && t.enabled)
            .map(|t| t.ticker.clone())
            .collect();
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }

    fn list_positions(&self, simulator_id: i64) -> Result<Vec<Position>, PaperTraderError> {
        Ok(self
            .state
            .positions
            .get(&simulator_id)
            .cloned()
            .unwrap_or_default())
    }

    fn replace_positions(
        &mut self,
        simulator_id: i64,
        positions: &[Position],
    ) -> Result<(), PaperTraderError> {
        self.state
            .positions
            .insert(simulator_id, positions.to_vec());
        Ok(())
    }

    fn update_cash_balance(
        &mut self,
        simulator_id: i64,
        cash_balance: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PaperTraderError> {
        let sim = self
            .state
            .simulators
            .get_mut(&simulator_id)
            .ok_or(PaperTraderError::SimulatorNotFound { simulator_id })?;
        sim.cash_balance = cash_balance;
        sim.updated_at = updated_at;
        Ok(())
    }

    fn append_cash_entries(
        &mut self,
        simulator_id: i64,
        entries: &[CashLedgerEntry],
    ) -> Result<(), PaperTraderError> {
        self.state
            .cash_entries
            .entry(simulator_id)
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    fn list_cash_entries(
        &self,
        simulator_id: i64,
    ) -> Result<Vec<CashLedgerEntry>, PaperTraderError> {
        Ok(self
            .state
            .cash_entries
            .get(&simulator_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl SignalPort for MemoryStore {
    fn insert_signals(
        &mut self,
        simulator_id: i64,
        signals: &[Signal],
    ) -> Result<usize, PaperTraderError> {
        for signal in signals {
            let id = self.state.next_id();
            self.state.signals.push(SignalRecord {
                id,
                simulator_id,
                ticker: signal.symbol.clone(),
                action: signal.action.as_str().to_string(),
                quantity: signal.quantity,
                reason: signal.reason.clone(),
                confidence: signal.confidence,
                strategy_name: signal.strategy_name.clone(),
                status: SignalStatus::Pending,
                created_at: signal.created_at,
                executed_at: None,
                execution_error: None,
            });
        }
        Ok(signals.len())
    }

    fn list_pending_signals(
        &self,
        simulator_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SignalRecord>, PaperTraderError> {
        let mut pending: Vec<SignalRecord> = self
            .state
            .signals
            .iter()
            .filter(|s| s.status == SignalStatus::Pending)
            .filter(|s| simulator_id.is_none_or(|id| s.simulator_id == id))
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    fn record_signal_outcome(
        &mut self,
        signal_id: i64,
        outcome: &SignalOutcome,
    ) -> Result<(), PaperTraderError> {
        if let Some(signal) = self.state.signals.iter_mut().find(|s| s.id == signal_id) {
            signal.status = outcome.status;
            signal.executed_at = outcome.executed_at;
            signal.execution_error = outcome.error.clone();
        }
        Ok(())
    }

    fn list_signals(&self, simulator_id: i64) -> Result<Vec<SignalRecord>, PaperTraderError> {
        Ok(self
            .state
            .signals
            .iter()
            .filter(|s| s.simulator_id == simulator_id)
            .cloned()
            .collect())
    }
}

impl TradePort for MemoryStore {
    fn insert_trade(&mut self, simulator_id: i64, trade: &NewTrade) -> Result<i64, PaperTraderError> {
        if self.state.fail_trade_inserts {
            return Err(PaperTraderError::Database {
                reason: "trade table unavailable".into(),
            });
        }
        let id = self.state.next_id();
        self.state.trades.push(Trade {
            id,
            simulator_id,
            symbol: trade.symbol.clone(),
            side: trade.side.as_str().to_string(),
            quantity: trade.quantity,
            price: trade.price,
            fee: trade.fee,
            executed_at: trade.executed_at,
        });
        Ok(id)
    }

    fn list_trades(&self, simulator_id: i64) -> Result<Vec<Trade>, PaperTraderError> {
        let mut trades: Vec<Trade> = self
            .state
            .trades
            .iter()
            .filter(|t| t.simulator_id == simulator_id)
            .cloned()
            .collect();
        trades.sort_by(|a, b| a.executed_at.cmp(&b.executed_at).then(a.id.cmp(&b.id)));
        Ok(trades)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 16, 0, 0).unwrap()
}

pub fn new_simulator(user_id: Option<i64>, starting_cash: Decimal) -> NewSimulator {
    NewSimulator {
        user_id,
        name: "test simulator".into(),
        starting_cash,
        settings: SimulatorSettings::default(),
    }
}

pub fn make_bar(symbol: &str, day: NaiveDate, close: Decimal) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        day,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000,
        source: "yfinance".into(),
    }
}

/// One bar per consecutive day ending on `last_day`.
pub fn close_series(symbol: &str, last_day: NaiveDate, closes: &[Decimal]) -> Vec<PriceBar> {
    let first = last_day - Duration::days(closes.len() as i64 - 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(symbol, first + Duration::days(i as i64), close))
        .collect()
}

pub fn buy_signal(symbol: &str, quantity: Decimal) -> Signal {
    Signal {
        symbol: symbol.to_string(),
        action: SignalAction::Buy,
        quantity,
        reason: "test".into(),
        confidence: dec!(0.5),
        strategy_name: "test".into(),
        created_at: ts(2024, 1, 1),
    }
}
