//! Signal storage port trait.

use crate::domain::error::PaperTraderError;
use crate::domain::signal::{Signal, SignalOutcome, SignalRecord};

pub trait SignalPort {
    /// Persist strategy output as `pending` rows. Returns the number stored.
    fn insert_signals(
        &mut self,
        simulator_id: i64,
        signals: &[Signal],
    ) -> Result<usize, PaperTraderError>;

    /// Pending signals, oldest first (created_at, then id), optionally scoped
    /// to one simulator.
    fn list_pending_signals(
        &self,
        simulator_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<SignalRecord>, PaperTraderError>;

    fn record_signal_outcome(
        &mut self,
        signal_id: i64,
        outcome: &SignalOutcome,
    ) -> Result<(), PaperTraderError>;

    fn list_signals(&self, simulator_id: i64) -> Result<Vec<SignalRecord>, PaperTraderError>;
}
