//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for corrnet.
#[derive(Debug, thiserror::Error)]
pub enum CorrnetError {
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

    #[error("invalid observation at row {row}: {reason}")]
    InvalidObservation { row: usize, reason: String },

    #[error("duplicate observation for asset {asset_id} on {day}")]
    DuplicateObservation { asset_id: String, day: NaiveDate },

    #[error("invalid correlation edge at row {row}: {reason}")]
    InvalidEdge { row: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CorrnetError> for std::process::ExitCode {
    fn from(err: &CorrnetError) -> Self {
        let code: u8 = match err {
            CorrnetError::Io(_) => 1,
            CorrnetError::ConfigParse { .. }
            | CorrnetError::ConfigMissing { .. }
            | CorrnetError::ConfigInvalid { .. } => 2,
            CorrnetError::Database { .. } | CorrnetError::DatabaseQuery { .. } => 3,
            CorrnetError::InvalidObservation { .. }
            | CorrnetError::DuplicateObservation { .. }
            | CorrnetError::InvalidEdge { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
