//! Domain error types.

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PaperTraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid strategy parameters: {reason}")]
    InvalidStrategyParams { reason: String },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("simulator not found for simulator_id={simulator_id}")]
    SimulatorNotFound { simulator_id: i64 },

    #[error("simulator {simulator_id} is not associated with a user_id")]
    SimulatorWithoutUser { simulator_id: i64 },

    #[error("ledger corruption for simulator {simulator_id}: {reason}")]
    LedgerCorruption { simulator_id: i64, reason: String },

    #[error("price import error at line {line}: {reason}")]
    PriceImport { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PaperTraderError {
    /// Storage and I/O faults abort the whole unit of work; everything else is
    /// scoped to the item that raised it.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            PaperTraderError::Database { .. }
                | PaperTraderError::DatabaseQuery { .. }
                | PaperTraderError::Io(_)
        )
    }
}

impl From<&PaperTraderError> for std::process::ExitCode {
    fn from(err: &PaperTraderError) -> Self {
        let code: u8 = match err {
            PaperTraderError::Io(_) => 1,
            PaperTraderError::ConfigParse { .. }
            | PaperTraderError::ConfigMissing { .. }
            | PaperTraderError::ConfigInvalid { .. } => 2,
            PaperTraderError::Database { .. } | PaperTraderError::DatabaseQuery { .. } => 3,
            PaperTraderError::InvalidStrategyParams { .. }
            | PaperTraderError::UnknownStrategy { .. } => 4,
            PaperTraderError::LedgerCorruption { .. } => 5,
            PaperTraderError::SimulatorNotFound { .. }
            | PaperTraderError::SimulatorWithoutUser { .. } => 6,
            PaperTraderError::PriceImport { .. } => 7,
        };
        std::process::ExitCode::from(code)
    }
}
