//! Fixed-size identifiers used by transactions

use std::fmt;

use serde::{Deserialize, Serialize};

use sc_common::{CodecResult, HashValue, HASH_SIZE};

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; HASH_SIZE]);

        impl $name {
            pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
                HashValue::from_bytes(bytes).map(Self::from)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<HashValue> for $name {
            fn from(h: HashValue) -> Self {
                Self(h.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&HashValue(self.0), f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

hash_id!(
    /// Address of a chain or of any ledger account
    Address
);

hash_id!(
    /// Color (asset tag) of a balance
    Color
);

hash_id!(
    /// Identifier of a transaction: the hash of its essence
    TransactionId
);

impl Color {
    /// The uncolored base token
    pub const BASE: Color = Color([0u8; HASH_SIZE]);
}

/// Identifies one request block: the transaction carrying it plus the
/// block's index inside that transaction
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId {
    tx_id: TransactionId,
    index: u16,
}

impl RequestId {
    pub fn new(tx_id: TransactionId, index: u16) -> Self {
        Self { tx_id, index }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.tx_id
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    /// Fixed 34-byte form: transaction id followed by the little-endian index
    pub fn to_bytes(&self) -> [u8; HASH_SIZE + 2] {
        let mut out = [0u8; HASH_SIZE + 2];
        out[..HASH_SIZE].copy_from_slice(&self.tx_id.0);
        out[HASH_SIZE..].copy_from_slice(&self.index.to_le_bytes());
        out
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.tx_id, self.index)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_common::hash_data;

    #[test]
    fn test_request_id_bytes() {
        let tx_id = TransactionId::from(hash_data(&[b"tx"]));
        let rid = RequestId::new(tx_id, 258);
        let bytes = rid.to_bytes();
        assert_eq!(&bytes[..HASH_SIZE], tx_id.as_bytes());
        assert_eq!(&bytes[HASH_SIZE..], &[2, 1]);
    }

    #[test]
    fn test_display_matches_hash_value() {
        let h = hash_data(&[b"chain"]);
        assert_eq!(Address::from(h).to_string(), h.to_string());
        assert_eq!(Color::BASE.to_string(), sc_common::NIL_HASH.to_string());
    }
}
