//! Error types for the ingestion crate.

use depth_grid::ResampleError;
use probe_common::ProbeError;
use thiserror::Error;

/// Errors that can occur while syncing, loading or interpolating dives.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Malformed dive file {file}: {message}")]
    Decode { file: String, message: String },

    #[error("Invalid dive record: {0}")]
    InvalidRecord(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("Invalid remote URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Store error: {0}")]
    Store(#[from] ProbeError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] ResampleError),
}

impl IngestionError {
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn decode(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
