//! Error types for the mirador layout reconstruction library.

use thiserror::Error;

/// Primary error type for layout reconstruction operations.
#[derive(Error, Debug)]
pub enum LayoutError {
    /// Malformed or missing geometry on an input element. Raised during
    /// ingestion, before any pipeline stage runs.
    #[error("invalid element {id}: {msg}")]
    Data { id: usize, msg: String },

    /// A pipeline stage reached a state its caller must never produce,
    /// e.g. pairing groups with different alignment axes. Signals a
    /// defect in stage logic, not a recoverable data condition.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
