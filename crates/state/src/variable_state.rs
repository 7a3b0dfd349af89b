//! Variable state: the versioned snapshot a chain executes against

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use sc_common::{hash_data, HashValue, NIL_HASH};

use crate::batch::{Batch, Mutation, StateUpdate};
use crate::error::{StateError, StateResult};

/// Trait for accessing and advancing chain state
pub trait VariableState: Send + Sync + fmt::Debug {
    /// Index of the last applied batch
    fn state_index(&self) -> u32;

    /// Hash chaining all applied batches
    fn hash(&self) -> HashValue;

    /// Read a variable
    fn get(&self, key: &str) -> Option<&[u8]>;

    /// Apply the mutations of one update. Index and hash are not changed;
    /// this is how a working copy follows execution within a batch.
    fn apply_state_update(&mut self, update: &StateUpdate);

    /// Apply a whole batch and advance index and hash. Nothing is applied
    /// unless the batch index immediately follows the current one.
    fn apply_batch(&mut self, batch: &Batch) -> StateResult<()>;

    /// An independent copy that can be mutated without affecting `self`
    fn fork(&self) -> Box<dyn VariableState>;
}

/// Canonical state of a chain shared between the committee layer and
/// running tasks
pub type SharedState = Arc<Mutex<Box<dyn VariableState>>>;

/// Wrap a state for sharing
pub fn shared(state: impl VariableState + 'static) -> SharedState {
    Arc::new(Mutex::new(Box::new(state)))
}

/// In-memory variable state
#[derive(Clone, PartialEq, Eq)]
pub struct VirtualState {
    state_index: u32,
    state_hash: HashValue,
    vars: BTreeMap<String, Vec<u8>>,
}

impl VirtualState {
    /// Origin state: index 0, nil hash, no variables
    pub fn new() -> Self {
        Self {
            state_index: 0,
            state_hash: NIL_HASH,
            vars: BTreeMap::new(),
        }
    }

    /// Restore a state from a stored snapshot
    pub fn from_snapshot(
        state_index: u32,
        state_hash: HashValue,
        vars: BTreeMap<String, Vec<u8>>,
    ) -> Self {
        Self {
            state_index,
            state_hash,
            vars,
        }
    }

    pub fn vars(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.vars
    }

    fn apply_mutations(&mut self, update: &StateUpdate) {
        for mutation in update.mutations() {
            match mutation {
                Mutation::Set { key, value } => {
                    self.vars.insert(key.clone(), value.clone());
                }
                Mutation::Del { key } => {
                    self.vars.remove(key);
                }
            }
        }
    }
}

impl Default for VirtualState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VirtualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualState")
            .field("state_index", &self.state_index)
            .field("state_hash", &self.state_hash.to_string())
            .field("vars", &self.vars.len())
            .finish()
    }
}

impl VariableState for VirtualState {
    fn state_index(&self) -> u32 {
        self.state_index
    }

    fn hash(&self) -> HashValue {
        self.state_hash
    }

    fn get(&self, key: &str) -> Option<&[u8]> {
        self.vars.get(key).map(Vec::as_slice)
    }

    fn apply_state_update(&mut self, update: &StateUpdate) {
        self.apply_mutations(update);
    }

    fn apply_batch(&mut self, batch: &Batch) -> StateResult<()> {
        let expected = self
            .state_index
            .checked_add(1)
            .ok_or_else(|| StateError::InvalidBatch("state index overflow".to_string()))?;
        if batch.state_index() != expected {
            return Err(StateError::IndexMismatch {
                expected,
                got: batch.state_index(),
            });
        }

        for update in batch.updates() {
            self.apply_mutations(update);
        }
        self.state_index = batch.state_index();
        self.state_hash = hash_data(&[self.state_hash.as_bytes(), batch.essence_hash().as_bytes()]);

        debug!(
            "state advanced to index {} hash {}",
            self.state_index, self.state_hash
        );
        Ok(())
    }

    fn fork(&self) -> Box<dyn VariableState> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sc_transaction::{RequestId, TransactionId};

    fn update(index: u16, key: &str, value: &[u8]) -> StateUpdate {
        let tx_id = TransactionId::from(hash_data(&[b"tx"]));
        let mut upd = StateUpdate::new(RequestId::new(tx_id, index), 0);
        upd.set(key, value.to_vec());
        upd
    }

    #[test]
    fn test_apply_state_update_keeps_index() {
        let mut state = VirtualState::new();
        state.apply_state_update(&update(0, "a", b"1"));
        assert_eq!(state.get("a"), Some(&b"1"[..]));
        assert_eq!(state.state_index(), 0);
        assert_eq!(state.hash(), NIL_HASH);
    }

    #[test]
    fn test_apply_batch_chains_hash() {
        let mut state = VirtualState::new();
        let batch = Batch::new(vec![update(0, "a", b"1")], 1).unwrap();
        state.apply_batch(&batch).unwrap();

        assert_eq!(state.state_index(), 1);
        assert_eq!(
            state.hash(),
            hash_data(&[NIL_HASH.as_bytes(), batch.essence_hash().as_bytes()])
        );

        let mut del = StateUpdate::new(RequestId::new(TransactionId::default(), 0), 0);
        del.del("a");
        state.apply_batch(&Batch::new(vec![del], 2).unwrap()).unwrap();
        assert_eq!(state.get("a"), None);
        assert_eq!(state.state_index(), 2);
    }

    #[test]
    fn test_stale_batch_leaves_state_untouched() {
        let mut state = VirtualState::from_snapshot(5, hash_data(&[b"s5"]), BTreeMap::new());
        let before = state.clone();

        let err = state
            .apply_batch(&Batch::new(vec![update(0, "a", b"1")], 5).unwrap())
            .unwrap_err();
        assert_eq!(err, StateError::IndexMismatch { expected: 6, got: 5 });
        assert_eq!(state, before);
    }

    #[test]
    fn test_fork_is_independent() {
        let state = VirtualState::new();
        let mut fork = state.fork();
        fork.apply_state_update(&update(0, "k", b"v"));
        assert_eq!(fork.get("k"), Some(&b"v"[..]));
        assert_eq!(state.get("k"), None);
    }
}
