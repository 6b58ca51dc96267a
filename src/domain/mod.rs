//! Core domain types and services.

pub mod action;
pub mod cash_ledger;
pub mod config_validation;
pub mod error;
pub mod evaluation;
pub mod execution;
pub mod indicator;
pub mod jobs;
pub mod portfolio;
pub mod position;
pub mod price_bar;
pub mod pricing;
pub mod reconciliation;
pub mod signal;
pub mod simulator;
pub mod strategy;
pub mod trade;
