use serde::{Deserialize, Serialize};

use sc_common::{codec, hash_data, HashValue};
use sc_transaction::RequestId;

use crate::error::{StateError, StateResult};

/// A single change to a state variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    Set { key: String, value: Vec<u8> },
    Del { key: String },
}

/// Mutations produced by executing exactly one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    request_id: RequestId,
    timestamp: i64,
    mutations: Vec<Mutation>,
}

impl StateUpdate {
    pub fn new(request_id: RequestId, timestamp: i64) -> Self {
        Self {
            request_id,
            timestamp,
            mutations: Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.mutations.push(Mutation::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn del(&mut self, key: impl Into<String>) {
        self.mutations.push(Mutation::Del { key: key.into() });
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

#[derive(Serialize)]
struct BatchEssence<'a> {
    state_index: u32,
    updates: &'a [StateUpdate],
}

/// Ordered state updates that move a chain to `state_index`.
///
/// A batch is never empty and is applied as a whole or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    state_index: u32,
    updates: Vec<StateUpdate>,
    essence_hash: HashValue,
}

impl Batch {
    pub fn new(updates: Vec<StateUpdate>, state_index: u32) -> StateResult<Self> {
        if updates.is_empty() {
            return Err(StateError::InvalidBatch("batch can't be empty".to_string()));
        }

        let bytes = codec::to_bytes(&BatchEssence {
            state_index,
            updates: &updates,
        })?;

        Ok(Self {
            state_index,
            updates,
            essence_hash: hash_data(&[&bytes]),
        })
    }

    pub fn state_index(&self) -> u32 {
        self.state_index
    }

    pub fn updates(&self) -> &[StateUpdate] {
        &self.updates
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Hash of the state index and all updates in order
    pub fn essence_hash(&self) -> &HashValue {
        &self.essence_hash
    }
}
