//! Common utilities and types for the smart-contract node

pub mod codec;
pub mod error;
pub mod hashing;
pub mod logging;

pub use codec::{CodecError, CodecResult};
pub use error::{Error, Result};
pub use hashing::{hash_data, HashValue, HASH_SIZE, NIL_HASH};
