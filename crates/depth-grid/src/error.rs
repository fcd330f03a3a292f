//! Error types for depth-grid resampling.

use thiserror::Error;

/// Errors that make a profile impossible to resample.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResampleError {
    /// The profile has no samples at all.
    #[error("profile has no samples")]
    NoSamples,

    /// A sample depth is NaN or infinite.
    #[error("sample {index} has non-finite depth {depth}")]
    NonFiniteDepth { index: usize, depth: f64 },

    /// Samples disagree on the number of value columns.
    #[error("sample {index} has {found} columns, expected {expected}")]
    RaggedSample {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Result type for resampling operations.
pub type Result<T> = std::result::Result<T, ResampleError>;
