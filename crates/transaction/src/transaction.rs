//! Transactions and request references

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sc_common::{codec, hash_data, CodecError, HashValue};

use crate::error::{TxError, TxResult};
use crate::ids::{Address, Color, RequestId, TransactionId};

/// Amount of tokens of one color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub color: Color,
    pub value: i64,
}

impl Balance {
    pub fn new(color: Color, value: i64) -> Self {
        Self { color, value }
    }
}

/// Balances available to a chain, keyed by the transaction holding them
pub type Balances = BTreeMap<TransactionId, Vec<Balance>>;

/// A request to a smart contract carried by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBlock {
    /// Target chain address
    pub address: Address,
    /// Request code interpreted by the target program
    pub code: u16,
    /// Program call data
    pub args: Vec<u8>,
    /// Unix time before which the request must not be processed; 0 means none
    pub timelock: u32,
}

impl RequestBlock {
    pub fn new(address: Address, code: u16) -> Self {
        Self {
            address,
            code,
            args: Vec::new(),
            timelock: 0,
        }
    }

    pub fn with_args(mut self, args: Vec<u8>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timelock(mut self, timelock: u32) -> Self {
        self.timelock = timelock;
        self
    }
}

/// Binds a chain's new state to a settlement transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlock {
    pub color: Color,
    pub state_index: u32,
    pub state_hash: HashValue,
}

/// The hashed content of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionEssence {
    pub inputs: Vec<TransactionId>,
    pub outputs: BTreeMap<Address, Vec<Balance>>,
    pub requests: Vec<RequestBlock>,
    pub state_block: Option<StateBlock>,
}

/// A transaction with its id computed from the essence.
///
/// Only the essence goes over the wire; the id is recomputed on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransactionEssence", into = "TransactionEssence")]
pub struct Transaction {
    id: TransactionId,
    essence: TransactionEssence,
}

impl Transaction {
    pub fn from_essence(essence: TransactionEssence) -> TxResult<Self> {
        let bytes = codec::to_bytes(&essence)?;
        Ok(Self {
            id: TransactionId::from(hash_data(&[&bytes])),
            essence,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn inputs(&self) -> &[TransactionId] {
        &self.essence.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<Address, Vec<Balance>> {
        &self.essence.outputs
    }

    pub fn requests(&self) -> &[RequestBlock] {
        &self.essence.requests
    }

    pub fn state_block(&self) -> Option<&StateBlock> {
        self.essence.state_block.as_ref()
    }

    pub fn essence(&self) -> &TransactionEssence {
        &self.essence
    }

    pub fn to_bytes(&self) -> TxResult<Vec<u8>> {
        Ok(codec::to_bytes(&self.essence)?)
    }

    pub fn from_bytes(data: &[u8]) -> TxResult<Self> {
        Self::from_essence(codec::from_bytes(data)?)
    }
}

impl TryFrom<TransactionEssence> for Transaction {
    type Error = CodecError;

    fn try_from(essence: TransactionEssence) -> Result<Self, Self::Error> {
        Transaction::from_essence(essence).map_err(|e| match e {
            TxError::Codec(err) => err,
            other => CodecError::CorruptData(other.to_string()),
        })
    }
}

impl From<Transaction> for TransactionEssence {
    fn from(tx: Transaction) -> Self {
        tx.essence
    }
}

/// One request of a batch: a request block addressed by its position inside
/// the transaction that carries it
#[derive(Debug, Clone)]
pub struct RequestRef {
    tx: Arc<Transaction>,
    index: u16,
}

impl RequestRef {
    pub fn new(tx: Arc<Transaction>, index: u16) -> TxResult<Self> {
        let count = tx.requests().len();
        if usize::from(index) >= count {
            return Err(TxError::RequestIndexOutOfRange { index, count });
        }
        Ok(Self { tx, index })
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.tx
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn request_id(&self) -> RequestId {
        RequestId::new(self.tx.id(), self.index)
    }

    pub fn request_block(&self) -> &RequestBlock {
        // index validated in `new`
        &self.tx.requests()[usize::from(self.index)]
    }

    pub fn args(&self) -> &[u8] {
        &self.request_block().args
    }

    pub fn timelock(&self) -> u32 {
        self.request_block().timelock
    }
}

/// Request ids of a batch, in batch order
pub fn take_request_ids(requests: &[RequestRef]) -> Vec<RequestId> {
    requests.iter().map(RequestRef::request_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request_tx() -> Arc<Transaction> {
        let chain = Address::from(hash_data(&[b"chain"]));
        Arc::new(
            Transaction::from_essence(TransactionEssence {
                requests: vec![
                    RequestBlock::new(chain, 1).with_args(vec![1]),
                    RequestBlock::new(chain, 2).with_timelock(1_600_000_000),
                ],
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_id_depends_on_essence() {
        let tx = request_tx();
        let other = Transaction::from_essence(TransactionEssence::default()).unwrap();
        assert_ne!(tx.id(), other.id());
        assert_eq!(Transaction::from_essence(tx.essence().clone()).unwrap().id(), tx.id());
    }

    #[test]
    fn test_decode_recomputes_id() {
        let tx = request_tx();
        let decoded = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.id(), tx.id());
        assert_eq!(decoded, *tx);
    }

    #[test]
    fn test_request_ref() {
        let tx = request_tx();
        let r = RequestRef::new(tx.clone(), 1).unwrap();
        assert_eq!(r.request_id(), RequestId::new(tx.id(), 1));
        assert_eq!(r.timelock(), 1_600_000_000);
        assert_eq!(r.request_block().code, 2);

        let err = RequestRef::new(tx, 2).unwrap_err();
        assert_eq!(err, TxError::RequestIndexOutOfRange { index: 2, count: 2 });
    }

    #[test]
    fn test_take_request_ids_keeps_order() {
        let tx = request_tx();
        let refs = vec![
            RequestRef::new(tx.clone(), 1).unwrap(),
            RequestRef::new(tx.clone(), 0).unwrap(),
        ];
        assert_eq!(
            take_request_ids(&refs),
            vec![RequestId::new(tx.id(), 1), RequestId::new(tx.id(), 0)]
        );
    }
}
