//! Deterministic binary encoding
//!
//! All hashed essences and committee payloads go through these two functions
//! so that independent nodes produce identical bytes for identical values.
//! Decoding never panics: malformed input yields [`CodecError::CorruptData`].

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Upper bound for a single encoded value
pub const MAX_ENCODED_SIZE: u64 = 16 * 1024 * 1024;

/// Errors produced while encoding or decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_ENCODED_SIZE)
        .reject_trailing_bytes()
}

/// Encode a value into its canonical byte form
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode a value from its canonical byte form
pub fn from_bytes<T: DeserializeOwned>(data: &[u8]) -> CodecResult<T> {
    options()
        .deserialize(data)
        .map_err(|e| CodecError::CorruptData(e.to_string()))
}
