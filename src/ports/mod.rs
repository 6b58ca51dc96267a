//! Port traits: the storage and configuration seams the domain depends on.

pub mod config_port;
pub mod ledger_port;
pub mod price_port;
pub mod signal_port;
pub mod store_port;
pub mod trade_port;
