//! Strategy signals and their execution lifecycle.
//!
//! A [`Signal`] is what a strategy emits; a [`SignalRecord`] is the persisted
//! row that execution later moves from `pending` to exactly one terminal state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::action::{ParseActionError, SignalAction};

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    pub quantity: Decimal,
    pub reason: String,
    pub confidence: Decimal,
    pub strategy_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Pending,
    Executed,
    Skipped,
    Failed,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "pending",
            SignalStatus::Executed => "executed",
            SignalStatus::Skipped => "skipped",
            SignalStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Pending)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SignalStatus::Pending),
            "executed" => Ok(SignalStatus::Executed),
            "skipped" => Ok(SignalStatus::Skipped),
            "failed" => Ok(SignalStatus::Failed),
            _ => Err(ParseActionError {
                kind: "status",
                value: s.to_string(),
            }),
        }
    }
}

/// A persisted signal row.
///
/// `action` is kept as stored text: rows written by other tools may carry
/// values outside the [`SignalAction`] vocabulary, and execution must be able
/// to fail such a row without aborting the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub id: i64,
    pub simulator_id: i64,
    pub ticker: String,
    pub action: String,
    pub quantity: Decimal,
    pub reason: String,
    pub confidence: Decimal,
    pub strategy_name: String,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub execution_error: Option<String>,
}

/// Terminal state assigned to a pending signal by one execution run.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    pub status: SignalStatus,
    pub executed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SignalOutcome {
    pub fn executed(at: DateTime<Utc>) -> Self {
        SignalOutcome {
            status: SignalStatus::Executed,
            executed_at: Some(at),
            error: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        SignalOutcome {
            status: SignalStatus::Skipped,
            executed_at: None,
            error: Some(reason.into()),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SignalOutcome {
            status: SignalStatus::Failed,
            executed_at: None,
            error: Some(reason.into()),
        }
    }
}
