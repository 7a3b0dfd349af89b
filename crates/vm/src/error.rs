//! Error types for VM operations

use std::time::Duration;

use thiserror::Error;

use sc_common::{CodecError, HashValue};
use sc_state::StateError;
use sc_transaction::{RequestId, TxError};

use crate::processor::ProcessorError;
use crate::task::TaskKey;

/// Errors resolving a program identifier into a processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Unknown built-in processor: {0}")]
    UnknownBuiltin(HashValue),

    #[error("Unknown example processor: {0}")]
    UnknownExample(String),

    #[error("Can't load processor for VM type '{vm_type}': {reason}")]
    LoadError { vm_type: String, reason: String },

    #[error("Binary unavailable for program {0}")]
    BinaryUnavailable(HashValue),

    /// Broken cache invariant. Never expected in correct operation.
    #[error("Inconsistent processor cache: {0}")]
    Inconsistent(String),

    #[error("No processor deployed for program {0}")]
    NotDeployed(HashValue),

    #[error(transparent)]
    CorruptData(#[from] CodecError),
}

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors of a VM task run
#[derive(Error, Debug)]
pub enum VMError {
    #[error("Processor resolution failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Transaction builder error: {0}")]
    TxBuilder(#[from] TxError),

    #[error("Processor failed at request #{index} ({request_id}): {source}")]
    Processor {
        index: usize,
        request_id: RequestId,
        source: ProcessorError,
    },

    #[error("Batch construction error: {0}")]
    BatchConstruction(String),

    #[error("Can't apply batch: {0}")]
    Apply(#[source] StateError),

    #[error("Execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    #[error("Execution aborted: {0}")]
    Aborted(String),
}

impl VMError {
    /// Whether the error reflects a broken invariant rather than a failed
    /// task. The caller should stop the node on fatal errors.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VMError::Cache(CacheError::Inconsistent(_)))
    }
}

/// Result type for VM task runs
pub type VMResult<T> = std::result::Result<T, VMError>;

/// Errors submitting a task to the scheduler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task {0} is already running")]
    DuplicateTask(TaskKey),

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}
