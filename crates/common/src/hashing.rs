//! Hashing utilities
//!
//! Every content-addressed value in the node (program identifiers, state
//! hashes, batch essences, transaction ids) is a [`HashValue`]: a SHA-256
//! digest rendered in base58 for display.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::{CodecError, CodecResult};

/// Size of a hash value in bytes
pub const HASH_SIZE: usize = 32;

/// The all-zero hash. Reserved for the default built-in processor and the
/// origin state.
pub const NIL_HASH: HashValue = HashValue([0u8; HASH_SIZE]);

/// A SHA-256 hash value
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct HashValue(pub [u8; HASH_SIZE]);

impl HashValue {
    /// Interpret exactly [`HASH_SIZE`] bytes as a hash value
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            CodecError::CorruptData(format!(
                "hash value must be {} bytes, got {}",
                HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parse the base58 string form
    pub fn from_base58(s: &str) -> CodecResult<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CodecError::CorruptData(format!("invalid base58: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Get the bytes of the hash
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex representation, used for debug output
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_nil(&self) -> bool {
        *self == NIL_HASH
    }
}

impl AsRef<[u8]> for HashValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({})", self.to_hex())
    }
}

impl FromStr for HashValue {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

/// Hash the concatenation of all given byte slices
pub fn hash_data(parts: &[&[u8]]) -> HashValue {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    HashValue(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_data_known_vector() {
        let hash = hash_data(&[b"hello world"]);
        assert_eq!(
            hash.to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash_data_is_concatenation() {
        assert_eq!(hash_data(&[b"hello ", b"world"]), hash_data(&[b"hello world"]));
    }

    #[test]
    fn test_base58_string_form() {
        let hash = hash_data(&[b"program"]);
        let parsed: HashValue = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);

        // all-zero bytes encode as a run of '1's in base58
        assert_eq!(NIL_HASH.to_string(), "1".repeat(HASH_SIZE));
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let err = HashValue::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CodecError::CorruptData(_)));
        assert!(HashValue::from_bytes(&[0u8; HASH_SIZE]).unwrap().is_nil());
    }
}
