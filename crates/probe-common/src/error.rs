//! Error types for the dive-probe pipeline.

use thiserror::Error;

/// Result type alias using ProbeError.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Primary error type for store and model operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    // === Model Errors ===
    #[error("Invalid depth set: {0}")]
    InvalidDepthSet(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Unknown resampling interval: {0}")]
    UnknownInterval(String),

    // === Storage Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ProbeError {
    /// Build a CorruptRow error for the given table.
    pub fn corrupt_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRow {
            table: table.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        ProbeError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::InternalError(format!("JSON error: {}", err))
    }
}
