use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sc_common::{codec, CodecResult};
use sc_transaction::{Balances, RequestBlock, RequestId, RequestRef, Transaction, TxResult};

/// Announces a state transition of the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransactionMsg {
    pub transaction: Arc<Transaction>,
    pub confirmed: bool,
}

/// Snapshot of the balances owned by the chain address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesMsg {
    pub balances: Balances,
}

/// Announces one request block addressed to the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMsg {
    pub transaction: Arc<Transaction>,
    pub index: u16,
}

impl RequestMsg {
    pub fn request_id(&self) -> RequestId {
        RequestId::new(self.transaction.id(), self.index)
    }

    /// The announced block, or `None` if the index is out of range
    pub fn request_block(&self) -> Option<&RequestBlock> {
        self.transaction.requests().get(usize::from(self.index))
    }

    pub fn timelock(&self) -> Option<u32> {
        self.request_block().map(|block| block.timelock)
    }

    pub fn to_request_ref(&self) -> TxResult<RequestRef> {
        RequestRef::new(self.transaction.clone(), self.index)
    }
}

/// Envelope for all committee payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitteeMessage {
    StateTransaction(StateTransactionMsg),
    Balances(BalancesMsg),
    Request(RequestMsg),
}

impl CommitteeMessage {
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        codec::to_bytes(self)
    }

    /// Decode a message; malformed input yields `CorruptData`
    pub fn from_bytes(data: &[u8]) -> CodecResult<Self> {
        codec::from_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sc_common::{hash_data, CodecError};
    use sc_transaction::{Address, Balance, Color, TransactionEssence, TxError};

    fn request_tx() -> Arc<Transaction> {
        let chain = Address::from(hash_data(&[b"chain"]));
        Arc::new(
            Transaction::from_essence(TransactionEssence {
                requests: vec![RequestBlock::new(chain, 7).with_timelock(99)],
                ..Default::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_request_msg_accessors() {
        let tx = request_tx();
        let msg = RequestMsg {
            transaction: tx.clone(),
            index: 0,
        };
        assert_eq!(msg.request_id(), RequestId::new(tx.id(), 0));
        assert_eq!(msg.timelock(), Some(99));
        assert_eq!(msg.to_request_ref().unwrap().request_id(), msg.request_id());

        let bad = RequestMsg { transaction: tx, index: 3 };
        assert_eq!(bad.request_block(), None);
        assert!(matches!(
            bad.to_request_ref(),
            Err(TxError::RequestIndexOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_message_decoding() {
        let tx = request_tx();
        let mut balances = Balances::new();
        balances.insert(tx.id(), vec![Balance::new(Color::BASE, 10)]);

        let msgs = vec![
            CommitteeMessage::StateTransaction(StateTransactionMsg {
                transaction: tx.clone(),
                confirmed: true,
            }),
            CommitteeMessage::Balances(BalancesMsg { balances }),
            CommitteeMessage::Request(RequestMsg { transaction: tx, index: 0 }),
        ];
        for msg in msgs {
            let decoded = CommitteeMessage::from_bytes(&msg.to_bytes().unwrap()).unwrap();
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_corrupt_message() {
        let msg = CommitteeMessage::Request(RequestMsg {
            transaction: request_tx(),
            index: 0,
        });
        let bytes = msg.to_bytes().unwrap();

        assert!(matches!(
            CommitteeMessage::from_bytes(&bytes[..bytes.len() / 2]),
            Err(CodecError::CorruptData(_))
        ));
        // unknown variant tag
        assert!(matches!(
            CommitteeMessage::from_bytes(&[9, 0, 0, 0]),
            Err(CodecError::CorruptData(_))
        ));
    }
}
