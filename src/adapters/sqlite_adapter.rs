//! SQLite storage adapter.
//!
//! Decimals are stored as TEXT in their canonical string form, timestamps as
//! RFC 3339 TEXT with microsecond precision (so they sort lexicographically)
//! and days as `YYYY-MM-DD`. All port access goes through a
//! [`SqliteUnitOfWork`], which holds the database write lock from `begin`
//! until it is committed or dropped.

use crate::domain::cash_ledger::CashLedgerEntry;
use crate::domain::error::PaperTraderError;
use crate::domain::position::Position;
use crate::domain::price_bar::{PriceBar, normalize_symbol};
use crate::domain::signal::{Signal, SignalOutcome, SignalRecord, SignalStatus};
use crate::domain::simulator::{
    NewSimulator, PriceMode, Simulator, SimulatorSettings, TrackedStock,
};
use crate::domain::trade::{NewTrade, Trade};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::price_port::PricePort;
use crate::ports::signal_port::SignalPort;
use crate::ports::store_port::UnitOfWork;
use crate::ports::trade_port::TradePort;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::{debug, warn};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS simulators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    name TEXT NOT NULL,
    starting_cash TEXT NOT NULL,
    cash_balance TEXT NOT NULL,
    frequency TEXT NOT NULL DEFAULT 'daily',
    price_mode TEXT NOT NULL DEFAULT 'close',
    max_position_pct TEXT,
    max_order_value TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_simulators_user ON simulators(user_id);

CREATE TABLE IF NOT EXISTS tracked_stocks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    simulator_id INTEGER NOT NULL REFERENCES simulators(id) ON DELETE CASCADE,
    ticker TEXT NOT NULL,
    target_allocation TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    UNIQUE (simulator_id, ticker)
);

CREATE TABLE IF NOT EXISTS positions (
    simulator_id INTEGER NOT NULL REFERENCES simulators(id) ON DELETE CASCADE,
    symbol TEXT NOT NULL,
    quantity TEXT NOT NULL,
    average_cost TEXT NOT NULL,
    PRIMARY KEY (simulator_id, symbol)
);

CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    simulator_id INTEGER NOT NULL REFERENCES simulators(id) ON DELETE CASCADE,
    ticker TEXT NOT NULL,
    action TEXT NOT NULL,
    quantity TEXT NOT NULL,
    reason TEXT NOT NULL,
    confidence TEXT NOT NULL,
    strategy_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    executed_at TEXT,
    execution_error TEXT
);
CREATE INDEX IF NOT EXISTS idx_signals_status_created ON signals(status, created_at, id);
CREATE INDEX IF NOT EXISTS idx_signals_simulator ON signals(simulator_id);

CREATE TABLE IF NOT EXISTS trades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    simulator_id INTEGER NOT NULL REFERENCES simulators(id) ON DELETE CASCADE,
    symbol TEXT NOT NULL,
    side TEXT NOT NULL,
    quantity TEXT NOT NULL,
    price TEXT NOT NULL,
    fee TEXT NOT NULL,
    executed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trades_simulator ON trades(simulator_id, executed_at, id);

CREATE TABLE IF NOT EXISTS cash_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    simulator_id INTEGER NOT NULL REFERENCES simulators(id) ON DELETE CASCADE,
    delta TEXT NOT NULL,
    reason TEXT NOT NULL,
    balance_after TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cash_ledger_simulator ON cash_ledger(simulator_id, id);

CREATE TABLE IF NOT EXISTS price_bars (
    symbol TEXT NOT NULL,
    day TEXT NOT NULL,
    source TEXT NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume INTEGER NOT NULL,
    PRIMARY KEY (symbol, day, source)
);
CREATE INDEX IF NOT EXISTS idx_price_bars_symbol_day ON price_bars(symbol, day);
";

const SIMULATOR_COLUMNS: &str = "id, user_id, name, starting_cash, cash_balance, frequency, \
     price_mode, max_position_pct, max_order_value, created_at, updated_at";

const SIGNAL_COLUMNS: &str = "id, simulator_id, ticker, action, quantity, reason, confidence, \
     strategy_name, status, created_at, executed_at, execution_error";

fn query_error(e: rusqlite::Error) -> PaperTraderError {
    PaperTraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn optional_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

fn simulator_from_row(row: &Row<'_>) -> rusqlite::Result<Simulator> {
    Ok(Simulator {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        starting_cash: decimal_column(row, 3)?,
        cash_balance: decimal_column(row, 4)?,
        settings: SimulatorSettings {
            frequency: parsed_column(row, 5)?,
            price_mode: parsed_column(row, 6)?,
            max_position_pct: optional_decimal_column(row, 7)?,
            max_order_value: optional_decimal_column(row, 8)?,
        },
        created_at: timestamp_column(row, 9)?,
        updated_at: timestamp_column(row, 10)?,
    })
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<SignalRecord> {
    Ok(SignalRecord {
        id: row.get(0)?,
        simulator_id: row.get(1)?,
        ticker: row.get(2)?,
        action: row.get(3)?,
        quantity: decimal_column(row, 4)?,
        reason: row.get(5)?,
        confidence: decimal_column(row, 6)?,
        strategy_name: row.get(7)?,
        status: parsed_column::<SignalStatus>(row, 8)?,
        created_at: timestamp_column(row, 9)?,
        executed_at: optional_timestamp_column(row, 10)?,
        execution_error: row.get(11)?,
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PaperTraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PaperTraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = u32::try_from(config.get_int("sqlite", "pool_size", 4))
            .ok()
            .filter(|size| *size >= 1)
            .ok_or_else(|| PaperTraderError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("pool_size must be between 1 and {}", u32::MAX),
            })?;

        let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| PaperTraderError::Database {
                    reason: e.to_string(),
                })?;

        debug!("Opened SQLite store at {} (pool size {})", db_path, pool_size);
        Ok(Self { pool })
    }

    /// Single-connection in-memory store. Only one unit of work can be open
    /// at a time.
    pub fn in_memory() -> Result<Self, PaperTraderError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PaperTraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn connection(
        &self,
    ) -> Result<PooledConnection<SqliteConnectionManager>, PaperTraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PaperTraderError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), PaperTraderError> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA).map_err(query_error)?;
        Ok(())
    }

    /// Open a unit of work. `BEGIN IMMEDIATE` takes the write lock up front,
    /// so concurrent job runs against the same database are serialized.
    pub fn begin(&self) -> Result<SqliteUnitOfWork, PaperTraderError> {
        let conn = self.connection()?;
        conn.execute_batch("BEGIN IMMEDIATE").map_err(query_error)?;
        Ok(SqliteUnitOfWork {
            conn,
            committed: false,
        })
    }
}

pub struct SqliteUnitOfWork {
    conn: PooledConnection<SqliteConnectionManager>,
    committed: bool,
}

impl UnitOfWork for SqliteUnitOfWork {
    fn commit(mut self) -> Result<(), PaperTraderError> {
        self.conn.execute_batch("COMMIT").map_err(query_error)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!("Rollback failed: {}", e);
        } else {
            debug!("Rolled back uncommitted unit of work");
        }
    }
}

impl PricePort for SqliteUnitOfWork {
    fn latest_price(
        &self,
        symbol: &str,
        mode: PriceMode,
    ) -> Result<Option<Decimal>, PaperTraderError> {
        let column = match mode {
            PriceMode::Open => "open",
            PriceMode::Close => "close",
        };
        let query = format!(
            "SELECT {column} FROM price_bars WHERE symbol = ?1
             ORDER BY day DESC, source ASC LIMIT 1"
        );
        self.conn
            .query_row(&query, params![normalize_symbol(symbol)], |row| {
                decimal_column(row, 0)
            })
            .optional()
            .map_err(query_error)
    }

    fn list_bars(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        source: &str,
    ) -> Result<Vec<PriceBar>, PaperTraderError> {
        let start_str = start.format(DATE_FORMAT).to_string();
        let end_str = end.format(DATE_FORMAT).to_string();

        let mut stmt = self
            .conn
            .prepare(
                "SELECT symbol, day, open, high, low, close, volume, source
                 FROM price_bars
                 WHERE symbol = ?1 AND source = ?2 AND day >= ?3 AND day <= ?4
                 ORDER BY day ASC",
            )
            .map_err(query_error)?;

        let mut sorted: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        sorted.sort();
        sorted.dedup();

        let mut bars = Vec::new();
        for symbol in &sorted {
            let rows = stmt
                .query_map(params![symbol, source, start_str, end_str], |row| {
                    Ok(PriceBar {
                        symbol: row.get(0)?,
                        day: date_column(row, 1)?,
                        open: decimal_column(row, 2)?,
                        high: decimal_column(row, 3)?,
                        low: decimal_column(row, 4)?,
                        close: decimal_column(row, 5)?,
                        volume: row.get(6)?,
                        source: row.get(7)?,
                    })
                })
                .map_err(query_error)?;
            for row in rows {
                bars.push(row.map_err(query_error)?);
            }
        }
        Ok(bars)
    }

    fn upsert_bars(&mut self, bars: &[PriceBar]) -> Result<usize, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "INSERT INTO price_bars (symbol, day, source, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (symbol, day, source) DO UPDATE SET
                     open = excluded.open, high = excluded.high, low = excluded.low,
                     close = excluded.close, volume = excluded.volume",
            )
            .map_err(query_error)?;

        for bar in bars {
            stmt.execute(params![
                bar.symbol,
                bar.day.format(DATE_FORMAT).to_string(),
                bar.source,
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume
            ])
            .map_err(query_error)?;
        }
        Ok(bars.len())
    }
}

impl LedgerPort for SqliteUnitOfWork {
    fn create_simulator(&mut self, simulator: &NewSimulator) -> Result<i64, PaperTraderError> {
        let now = format_timestamp(Utc::now());
        let settings = &simulator.settings;
        self.conn
            .execute(
                "INSERT INTO simulators (user_id, name, starting_cash, cash_balance, frequency,
                     price_mode, max_position_pct, max_order_value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    simulator.user_id,
                    simulator.name,
                    simulator.starting_cash.to_string(),
                    settings.frequency.as_str(),
                    settings.price_mode.as_str(),
                    optional_text(settings.max_position_pct),
                    optional_text(settings.max_order_value),
                    now
                ],
            )
            .map_err(query_error)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_simulator(&self, simulator_id: i64) -> Result<Option<Simulator>, PaperTraderError> {
        let query = format!("SELECT {SIMULATOR_COLUMNS} FROM simulators WHERE id = ?1");
        self.conn
            .query_row(&query, params![simulator_id], simulator_from_row)
            .optional()
            .map_err(query_error)
    }

    fn list_simulators(&self, limit: usize) -> Result<Vec<Simulator>, PaperTraderError> {
        let query = format!("SELECT {SIMULATOR_COLUMNS} FROM simulators ORDER BY id LIMIT ?1");
        let mut stmt = self.conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![limit as i64], simulator_from_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn list_evaluable_simulators(
        &self,
        user_id: Option<i64>,
    ) -> Result<Vec<Simulator>, PaperTraderError> {
        let query = format!(
            "SELECT {SIMULATOR_COLUMNS} FROM simulators s
             WHERE EXISTS (
                 SELECT 1 FROM tracked_stocks t WHERE t.simulator_id = s.id AND t.enabled = 1
             )
             AND (?1 IS NULL OR s.user_id = ?1)
             ORDER BY s.id"
        );
        let mut stmt = self.conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![user_id], simulator_from_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn delete_simulator(&mut self, simulator_id: i64) -> Result<bool, PaperTraderError> {
        let deleted = self
            .conn
            .execute("DELETE FROM simulators WHERE id = ?1", params![simulator_id])
            .map_err(query_error)?;
        Ok(deleted > 0)
    }

    fn add_tracked_stock(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        target_allocation: Decimal,
        enabled: bool,
    ) -> Result<i64, PaperTraderError> {
        self.conn
            .query_row(
                "INSERT INTO tracked_stocks (simulator_id, ticker, target_allocation, enabled)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (simulator_id, ticker) DO UPDATE SET
                     target_allocation = excluded.target_allocation, enabled = excluded.enabled
                 RETURNING id",
                params![
                    simulator_id,
                    normalize_symbol(ticker),
                    target_allocation.to_string(),
                    enabled
                ],
                |row| row.get(0),
            )
            .map_err(query_error)
    }

    fn set_tracked_stock_enabled(
        &mut self,
        simulator_id: i64,
        ticker: &str,
        enabled: bool,
    ) -> Result<bool, PaperTraderError> {
        let updated = self
            .conn
            .execute(
                "UPDATE tracked_stocks SET enabled = ?3 WHERE simulator_id = ?1 AND ticker = ?2",
                params![simulator_id, normalize_symbol(ticker), enabled],
            )
            .map_err(query_error)?;
        Ok(updated > 0)
    }

    fn list_tracked_stocks(
        &self,
        simulator_id: i64,
    ) -> Result<Vec<TrackedStock>, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, simulator_id, ticker, target_allocation, enabled
                 FROM tracked_stocks WHERE simulator_id = ?1 ORDER BY ticker",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id], |row| {
                Ok(TrackedStock {
                    id: row.get(0)?,
                    simulator_id: row.get(1)?,
                    ticker: row.get(2)?,
                    target_allocation: decimal_column(row, 3)?,
                    enabled: row.get(4)?,
                })
            })
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn enabled_tickers(&self, simulator_id: i64) -> Result<Vec<String>, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT DISTINCT ticker FROM tracked_stocks
                 WHERE simulator_id = ?1 AND enabled = 1 ORDER BY ticker",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id], |row| row.get::<_, String>(0))
            .map_err(query_error)?;
        let mut tickers = Vec::new();
        for row in rows {
            let ticker = normalize_symbol(&row.map_err(query_error)?);
            if !ticker.is_empty() && !tickers.contains(&ticker) {
                tickers.push(ticker);
            }
        }
        tickers.sort();
        Ok(tickers)
    }

    fn list_positions(&self, simulator_id: i64) -> Result<Vec<Position>, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT symbol, quantity, average_cost FROM positions
                 WHERE simulator_id = ?1 ORDER BY symbol",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id], |row| {
                Ok(Position {
                    symbol: row.get(0)?,
                    quantity: decimal_column(row, 1)?,
                    average_cost: decimal_column(row, 2)?,
                })
            })
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn replace_positions(
        &mut self,
        simulator_id: i64,
        positions: &[Position],
    ) -> Result<(), PaperTraderError> {
        self.conn
            .execute(
                "DELETE FROM positions WHERE simulator_id = ?1",
                params![simulator_id],
            )
            .map_err(query_error)?;
        let mut stmt = self
            .conn
            .prepare(
                "INSERT INTO positions (simulator_id, symbol, quantity, average_cost)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(query_error)?;
        for position in positions {
            stmt.execute(params![
                simulator_id,
                position.symbol,
                position.quantity.to_string(),
                position.average_cost.to_string()
            ])
            .map_err(query_error)?;
        }
        Ok(())
    }

    fn update_cash_balance(
        &mut self,
        simulator_id: i64,
        cash_balance: Decimal,
        updated_at: DateTime<Utc>,
    ) -> Result<(), PaperTraderError> {
        let updated = self
            .conn
            .execute(
                "UPDATE simulators SET cash_balance = ?2, updated_at = ?3 WHERE id = ?1",
                params![
                    simulator_id,
                    cash_balance.to_string(),
                    format_timestamp(updated_at)
                ],
            )
            .map_err(query_error)?;
        if updated == 0 {
            return Err(PaperTraderError::SimulatorNotFound { simulator_id });
        }
        Ok(())
    }

    fn append_cash_entries(
        &mut self,
        simulator_id: i64,
        entries: &[CashLedgerEntry],
    ) -> Result<(), PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "INSERT INTO cash_ledger (simulator_id, delta, reason, balance_after, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(query_error)?;
        for entry in entries {
            stmt.execute(params![
                simulator_id,
                entry.delta.to_string(),
                entry.reason,
                entry.balance_after.to_string(),
                format_timestamp(entry.created_at)
            ])
            .map_err(query_error)?;
        }
        Ok(())
    }

    fn list_cash_entries(
        &self,
        simulator_id: i64,
    ) -> Result<Vec<CashLedgerEntry>, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT delta, reason, balance_after, created_at FROM cash_ledger
                 WHERE simulator_id = ?1 ORDER BY id",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id], |row| {
                Ok(CashLedgerEntry {
                    delta: decimal_column(row, 0)?,
                    reason: row.get(1)?,
                    balance_after: decimal_column(row, 2)?,
                    created_at: timestamp_column(row, 3)?,
                })
            })
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }
}

impl SignalPort for SqliteUnitOfWork {
    fn insert_signals(
        &mut self,
        simulator_id: i64,
        signals: &[Signal],
    ) -> Result<usize, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "INSERT INTO signals (simulator_id, ticker, action, quantity, reason, confidence,
                     strategy_name, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
            )
            .map_err(query_error)?;
        for signal in signals {
            stmt.execute(params![
                simulator_id,
                signal.symbol,
                signal.action.as_str(),
                signal.quantity.to_string(),
                signal.reason,
                signal.confidence.to_string(),
                signal.strategy_name,
                format_timestamp(signal.created_at)
            ])
            .map_err(query_error)?;
        }
        Ok(signals.len())
    }

    fn list_pending_signals(
        &self,
        simulator_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SignalRecord>, PaperTraderError> {
        let query = format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals
             WHERE status = 'pending' AND (?1 IS NULL OR simulator_id = ?1)
             ORDER BY created_at ASC, id ASC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id, limit as i64], signal_from_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn record_signal_outcome(
        &mut self,
        signal_id: i64,
        outcome: &SignalOutcome,
    ) -> Result<(), PaperTraderError> {
        self.conn
            .execute(
                "UPDATE signals SET status = ?2, executed_at = ?3, execution_error = ?4
                 WHERE id = ?1",
                params![
                    signal_id,
                    outcome.status.as_str(),
                    outcome.executed_at.map(format_timestamp),
                    outcome.error
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn list_signals(&self, simulator_id: i64) -> Result<Vec<SignalRecord>, PaperTraderError> {
        let query = format!(
            "SELECT {SIGNAL_COLUMNS} FROM signals WHERE simulator_id = ?1
             ORDER BY created_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id], signal_from_row)
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }
}

impl TradePort for SqliteUnitOfWork {
    fn insert_trade(&mut self, simulator_id: i64, trade: &NewTrade) -> Result<i64, PaperTraderError> {
        self.conn
            .execute(
                "INSERT INTO trades (simulator_id, symbol, side, quantity, price, fee, executed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    simulator_id,
                    trade.symbol,
                    trade.side.as_str(),
                    trade.quantity.to_string(),
                    trade.price.to_string(),
                    trade.fee.to_string(),
                    format_timestamp(trade.executed_at)
                ],
            )
            .map_err(query_error)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_trades(&self, simulator_id: i64) -> Result<Vec<Trade>, PaperTraderError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, simulator_id, symbol, side, quantity, price, fee, executed_at
                 FROM trades WHERE simulator_id = ?1 ORDER BY executed_at ASC, id ASC",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![simulator_id], |row| {
                Ok(Trade {
                    id: row.get(0)?,
                    simulator_id: row.get(1)?,
                    symbol: row.get(2)?,
                    side: row.get(3)?,
                    quantity: decimal_column(row, 4)?,
                    price: decimal_column(row, 5)?,
                    fee: decimal_column(row, 6)?,
                    executed_at: timestamp_column(row, 7)?,
                })
            })
            .map_err(query_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }
}
