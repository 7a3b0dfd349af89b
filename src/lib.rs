//! Smart-contract committee node
//!
//! Executes ordered batches of smart-contract requests against chain state
//! and produces the resulting state batch and settlement transaction.

/// Module version information
pub mod version {
    /// The current version of the node
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Re-export core components for easy access
pub mod core {
    pub use sc_common as common;
    pub use sc_config as config;
}

/// Ledger-side data: transactions, state and committee payloads
pub mod ledger {
    pub use sc_committee as committee;
    pub use sc_state as state;
    pub use sc_transaction as transaction;
}

pub use sc_vm as vm;
