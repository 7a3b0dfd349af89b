//! Error types shared across the node

use std::result;
use thiserror::Error;

/// Common result type used throughout the node
pub type Result<T> = result::Result<T, Error>;

/// Common error type for the node
#[derive(Error, Debug)]
pub enum Error {
    /// Logging setup error
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new logging error
    pub fn logging<S: Into<String>>(msg: S) -> Self {
        Error::Logging(msg.into())
    }
}
