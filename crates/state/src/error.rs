//! Error types for state operations

use sc_common::CodecError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Batch index mismatch: expected {expected}, got {got}")]
    IndexMismatch { expected: u32, got: u32 },

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for state operations
pub type StateResult<T> = std::result::Result<T, StateError>;
