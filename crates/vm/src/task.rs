//! VM task description and output

use std::fmt;

use sc_common::{hash_data, HashValue};
use sc_committee::RequestMsg;
use sc_state::{Batch, SharedState};
use sc_transaction::{
    take_request_ids, Address, Balances, Color, RequestId, RequestRef, Transaction, TxResult,
};

/// Unit of work: run an ordered batch of requests of one chain against the
/// chain's current state
#[derive(Debug, Clone)]
pub struct VMTask {
    /// Address of the chain
    pub address: Address,
    /// Color of the chain token
    pub color: Color,
    /// Inputs available to the settlement transaction
    pub balances: Balances,
    /// Requests in execution order
    pub requests: Vec<RequestRef>,
    pub timestamp: i64,
    /// Canonical state, advanced when the run succeeds
    pub variable_state: SharedState,
    /// Program handling every request of the batch
    pub program_hash: HashValue,
}

impl VMTask {
    pub fn request_ids(&self) -> Vec<RequestId> {
        take_request_ids(&self.requests)
    }

    /// Key under which the task is deduplicated
    pub fn key(&self) -> TaskKey {
        TaskKey {
            address: self.address,
            batch_hash: batch_hash(&self.request_ids(), self.timestamp),
        }
    }
}

/// Identity of a task: chain address plus the hash of its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub address: Address,
    pub batch_hash: HashValue,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.batch_hash)
    }
}

/// Hash of an ordered list of request ids and a timestamp. Order matters.
pub fn batch_hash(request_ids: &[RequestId], timestamp: i64) -> HashValue {
    let encoded: Vec<[u8; 34]> = request_ids.iter().map(RequestId::to_bytes).collect();
    let ts = timestamp.to_le_bytes();

    let mut parts: Vec<&[u8]> = encoded.iter().map(|b| b.as_slice()).collect();
    parts.push(&ts);
    hash_data(&parts)
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct TaskOutput {
    /// Batch of state updates, one per request, in request order
    pub batch: Batch,
    /// Settlement transaction carrying the resulting state index and hash
    pub transaction: Transaction,
}

/// Build the request list of a task from announced request messages,
/// keeping their order
pub fn requests_from_messages(messages: &[RequestMsg]) -> TxResult<Vec<RequestRef>> {
    messages.iter().map(RequestMsg::to_request_ref).collect()
}
