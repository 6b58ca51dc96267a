//! Simulator accounts, their operating settings and tracked stocks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::action::ParseActionError;

/// How often the external scheduler runs this simulator per trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    TwiceDaily,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::TwiceDaily => "twice_daily",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "twice_daily" => Ok(Frequency::TwiceDaily),
            _ => Err(ParseActionError {
                kind: "frequency",
                value: s.to_string(),
            }),
        }
    }
}

/// Which bar field execution prices against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    Open,
    #[default]
    Close,
}

impl PriceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceMode::Open => "open",
            PriceMode::Close => "close",
        }
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceMode {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PriceMode::Open),
            "close" => Ok(PriceMode::Close),
            _ => Err(ParseActionError {
                kind: "price mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-simulator operating settings. Absent risk caps mean uncapped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulatorSettings {
    pub frequency: Frequency,
    pub price_mode: PriceMode,
    pub max_position_pct: Option<Decimal>,
    pub max_order_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulator {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub starting_cash: Decimal,
    pub cash_balance: Decimal,
    pub settings: SimulatorSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a simulator; cash balance starts at `starting_cash`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSimulator {
    pub user_id: Option<i64>,
    pub name: String,
    pub starting_cash: Decimal,
    pub settings: SimulatorSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedStock {
    pub id: i64,
    pub simulator_id: i64,
    pub ticker: String,
    /// Percent of starting cash.
    pub target_allocation: Decimal,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_daily_close_uncapped() {
        let settings = SimulatorSettings::default();
        assert_eq!(settings.frequency, Frequency::Daily);
        assert_eq!(settings.price_mode, PriceMode::Close);
        assert!(settings.max_position_pct.is_none());
        assert!(settings.max_order_value.is_none());
    }

    #[test]
    fn frequency_parses() {
        let f: Frequency = "twice_daily".parse().unwrap();
        assert_eq!(f, Frequency::TwiceDaily);
        assert_eq!(f.to_string(), "twice_daily");
        assert!("hourly".parse::<Frequency>().is_err());
    }

    #[test]
    fn price_mode_round_trips() {
        for mode in [PriceMode::Open, PriceMode::Close] {
            assert_eq!(mode.as_str().parse::<PriceMode>().unwrap(), mode);
        }
    }
}
