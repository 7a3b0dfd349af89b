//! Error types for transaction operations

use sc_common::CodecError;
use thiserror::Error;

use crate::ids::{Color, RequestId};

/// Error types for transaction operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("Request {0} has no balances in the input set")]
    RequestNotInBalances(RequestId),

    #[error("No chain token of color {0} in the input balances")]
    NoChainToken(Color),

    #[error("Insufficient funds of color {color}: requested {requested}, available {available}")]
    InsufficientFunds {
        color: Color,
        requested: i64,
        available: i64,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Request index {index} out of range: transaction has {count} requests")]
    RequestIndexOutOfRange { index: u16, count: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for transaction operations
pub type TxResult<T> = std::result::Result<T, TxError>;
