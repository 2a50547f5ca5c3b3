//! Error types for trace decoding and reading
//!
//! Only failures that stop a read surface here. Missing optional fields and
//! unmatched linkage are absorbed by the classifier and never become errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by a raw record decoder
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A single record could not be parsed; the stream may continue
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// The underlying stream failed; no further records can be read
    #[error("I/O error while decoding: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Whether the reader may skip this record and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::Malformed { .. })
    }
}

/// Errors that abort a trace read
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to open trace file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt trace at line {line}: {reason}")]
    Corrupt { line: u64, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event id space exhausted after {0} events")]
    IdSpaceExhausted(u64),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<DecodeError> for TraceError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Malformed { line, reason } => TraceError::Corrupt { line, reason },
            DecodeError::Io(e) => TraceError::Io(e),
        }
    }
}

/// Result type for trace reading operations
pub type Result<T> = std::result::Result<T, TraceError>;
