//! Chain state for the smart-contract node
//!
//! A chain's state is a key/value store identified by a monotonically
//! increasing index and a hash that chains every applied [`Batch`].

pub mod batch;
pub mod error;
pub mod variable_state;

pub use batch::{Batch, Mutation, StateUpdate};
pub use error::{StateError, StateResult};
pub use variable_state::{shared, SharedState, VariableState, VirtualState};
