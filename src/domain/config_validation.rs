//! Configuration validation and typed stage settings.
//!
//! Every section is checked before any job touches storage. Monetary values
//! are parsed from their text form straight into `Decimal`.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::error::PaperTraderError;
use crate::domain::evaluation::{EvaluationConfig, MAX_LOOKBACK_DAYS};
use crate::domain::execution::ExecutionConfig;
use crate::domain::jobs::JobsConfig;
use crate::domain::reconciliation::ReconciliationConfig;
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PaperTraderError {
    PaperTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Batch and scan limits must be at least 1, whether they come from the file
/// or a command-line override.
pub fn check_limit(section: &str, key: &str, limit: usize) -> Result<usize, PaperTraderError> {
    if limit == 0 {
        return Err(invalid(section, key, format!("{key} must be at least 1")));
    }
    Ok(limit)
}

/// Trimmed, non-empty value of `[section] key`.
fn get_value(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PaperTraderError> {
    match get_value(config, section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| invalid(section, key, format!("{key} must be a non-negative integer"))),
    }
}

fn parse_decimal(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Decimal,
) -> Result<Decimal, PaperTraderError> {
    match get_value(config, section, key) {
        None => Ok(default),
        Some(raw) => Decimal::from_str(&raw)
            .map_err(|_| invalid(section, key, format!("{key} must be a decimal number"))),
    }
}

pub fn build_evaluation_config(config: &dyn ConfigPort) -> Result<EvaluationConfig, PaperTraderError> {
    let defaults = EvaluationConfig::default();
    let params = StrategyParams {
        short_window: parse_usize(config, "evaluation", "short_window", defaults.params.short_window)?,
        long_window: parse_usize(config, "evaluation", "long_window", defaults.params.long_window)?,
        trade_quantity: parse_decimal(
            config,
            "evaluation",
            "trade_quantity",
            defaults.params.trade_quantity,
        )?,
    };
    params
        .validate()
        .map_err(|e| invalid("evaluation", "short_window", e.to_string()))?;

    let buffer_days = parse_usize(
        config,
        "evaluation",
        "buffer_days",
        defaults.buffer_days as usize,
    )?;
    let buffer_days = u32::try_from(buffer_days)
        .map_err(|_| invalid("evaluation", "buffer_days", "buffer_days is too large"))?;
    let lookback = params.long_window.saturating_add(buffer_days as usize);
    if lookback as u64 > MAX_LOOKBACK_DAYS as u64 {
        return Err(invalid(
            "evaluation",
            "long_window",
            format!("long_window + buffer_days must not exceed {MAX_LOOKBACK_DAYS} days"),
        ));
    }

    Ok(EvaluationConfig {
        strategy_name: get_value(config, "evaluation", "strategy").unwrap_or(defaults.strategy_name),
        params,
        buffer_days,
        price_source: get_value(config, "evaluation", "price_source")
            .unwrap_or(defaults.price_source),
    })
}

pub fn build_execution_config(config: &dyn ConfigPort) -> Result<ExecutionConfig, PaperTraderError> {
    let defaults = ExecutionConfig::default();
    let batch_limit = check_limit(
        "execution",
        "batch_limit",
        parse_usize(config, "execution", "batch_limit", defaults.batch_limit)?,
    )?;
    let slippage_bps = parse_decimal(config, "execution", "slippage_bps", defaults.slippage_bps)?;
    if slippage_bps < Decimal::ZERO || slippage_bps >= Decimal::from(10_000) {
        return Err(invalid(
            "execution",
            "slippage_bps",
            "slippage_bps must be between 0 and 10000",
        ));
    }
    let fee_per_trade = parse_decimal(config, "execution", "fee_per_trade", defaults.fee_per_trade)?;
    if fee_per_trade < Decimal::ZERO {
        return Err(invalid(
            "execution",
            "fee_per_trade",
            "fee_per_trade must be non-negative",
        ));
    }
    Ok(ExecutionConfig {
        batch_limit,
        slippage_bps,
        fee_per_trade,
    })
}

pub fn build_reconciliation_config(
    config: &dyn ConfigPort,
) -> Result<ReconciliationConfig, PaperTraderError> {
    let limit = parse_usize(
        config,
        "reconciliation",
        "limit",
        ReconciliationConfig::default().limit,
    )?;
    Ok(ReconciliationConfig {
        limit: check_limit("reconciliation", "limit", limit)?,
    })
}

/// Validate and build every stage's settings.
pub fn build_jobs_config(config: &dyn ConfigPort) -> Result<JobsConfig, PaperTraderError> {
    Ok(JobsConfig {
        evaluation: build_evaluation_config(config)?,
        execution: build_execution_config(config)?,
        reconciliation: build_reconciliation_config(config)?,
    })
}
