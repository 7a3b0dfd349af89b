//! Transactions, request references and the settlement transaction builder

pub mod builder;
pub mod error;
pub mod ids;
pub mod transaction;

pub use builder::{TransactionBuilder, TransactionBuilderParams};
pub use error::{TxError, TxResult};
pub use ids::{Address, Color, RequestId, TransactionId};
pub use transaction::{
    take_request_ids, Balance, Balances, RequestBlock, RequestRef, StateBlock, Transaction,
    TransactionEssence,
};
