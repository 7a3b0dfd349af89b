//! Committee message payloads
//!
//! Produced by the committee layer and consumed here only as typed values.

pub mod messages;

pub use messages::{BalancesMsg, CommitteeMessage, RequestMsg, StateTransactionMsg};
