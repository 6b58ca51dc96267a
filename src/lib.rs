//! papertrader: paper trading simulation core.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
#[cfg(feature = "sqlite")]
pub mod cli;
pub mod domain;
pub mod ports;
