//! Domain error types.

/// Top-level error type for tradejournal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
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

    #[error("import error: {reason}")]
    Import { reason: String },

    #[error("{what} #{id} not found")]
    NotFound { what: &'static str, id: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&JournalError> for std::process::ExitCode {
    fn from(err: &JournalError) -> Self {
        let code: u8 = match err {
            JournalError::Io(_) => 1,
            JournalError::ConfigParse { .. }
            | JournalError::ConfigMissing { .. }
            | JournalError::ConfigInvalid { .. } => 2,
            JournalError::Database { .. } | JournalError::DatabaseQuery { .. } => 3,
            JournalError::Import { .. } => 4,
            JournalError::NotFound { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
