//! Processor interface and execution context

use thiserror::Error;

use sc_common::HashValue;
use sc_state::{StateUpdate, VariableState};
use sc_transaction::{Address, Color, RequestRef, TransactionBuilder, TxError};

/// Error types for processor runs
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Tx(#[from] TxError),

    #[error("{0}")]
    Failed(String),
}

/// Runnable handler for one deployed program.
///
/// `run` is called once per request, synchronously, and must neither block
/// on I/O nor depend on anything outside the context: committee members
/// executing the same batch must obtain identical updates.
pub trait Processor: Send + Sync {
    fn run(&self, ctx: &mut VMContext<'_>) -> Result<StateUpdate, ProcessorError>;
}

/// Everything a processor sees while handling one request
pub struct VMContext<'a> {
    address: Address,
    color: Color,
    timestamp: i64,
    request: &'a RequestRef,
    state: &'a dyn VariableState,
    tx_builder: &'a mut TransactionBuilder,
}

impl<'a> VMContext<'a> {
    pub fn new(
        address: Address,
        color: Color,
        timestamp: i64,
        request: &'a RequestRef,
        state: &'a dyn VariableState,
        tx_builder: &'a mut TransactionBuilder,
    ) -> Self {
        Self {
            address,
            color,
            timestamp,
            request,
            state,
            tx_builder,
        }
    }

    /// Address of the chain
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Color of the chain token
    pub fn color(&self) -> &Color {
        &self.color
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The request being processed
    pub fn request(&self) -> &RequestRef {
        self.request
    }

    /// Working state, including the updates of earlier requests in the batch
    pub fn state(&self) -> &dyn VariableState {
        self.state
    }

    pub fn tx_builder(&mut self) -> &mut TransactionBuilder {
        &mut *self.tx_builder
    }

    /// Empty state update bound to the current request and timestamp
    pub fn new_state_update(&self) -> StateUpdate {
        StateUpdate::new(self.request.request_id(), self.timestamp)
    }
}

/// Default built-in processor, registered under the nil hash. Accepts every
/// request and changes nothing.
#[derive(Debug, Default)]
pub struct NilProcessor;

impl NilProcessor {
    pub const PROGRAM_HASH: HashValue = sc_common::NIL_HASH;
}

impl Processor for NilProcessor {
    fn run(&self, ctx: &mut VMContext<'_>) -> Result<StateUpdate, ProcessorError> {
        Ok(ctx.new_state_update())
    }
}
