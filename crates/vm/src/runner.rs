//! Execution of a single VM task
//!
//! A run works on a private fork of the chain state. The canonical state is
//! touched exactly once, at the end, and only when every request succeeded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn, Span};

use sc_state::{Batch, StateUpdate, VariableState};
use sc_transaction::{
    Address, Color, RequestRef, TransactionBuilder, TransactionBuilderParams,
};

use crate::cache::ProcessorCache;
use crate::error::{CacheError, VMError, VMResult};
use crate::processor::{Processor, VMContext};
use crate::task::{TaskOutput, VMTask};

/// Runs VM tasks against the processors of a cache
pub struct TaskRunner {
    cache: Arc<ProcessorCache>,
    execution_timeout: Option<Duration>,
}

impl TaskRunner {
    /// `execution_timeout` bounds the request loop; `None` disables it
    pub fn new(cache: Arc<ProcessorCache>, execution_timeout: Option<Duration>) -> Self {
        Self {
            cache,
            execution_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<ProcessorCache> {
        &self.cache
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout
    }

    /// Run a task to completion.
    ///
    /// On success the canonical state of the task has advanced by one batch
    /// and the settlement transaction reflects the new state. On any error
    /// the canonical state is unchanged.
    pub async fn run(&self, task: &VMTask) -> VMResult<TaskOutput> {
        self.run_with_permit(task, None).await
    }

    /// Like [`run`](Self::run), holding `permit` until the request loop has
    /// actually returned. A timed-out loop keeps its permit while it runs on.
    pub async fn run_with_permit(
        &self,
        task: &VMTask,
        permit: Option<OwnedSemaphorePermit>,
    ) -> VMResult<TaskOutput> {
        let processor = self
            .cache
            .get_processor(&task.program_hash)
            .ok_or(CacheError::NotDeployed(task.program_hash))?;

        let tx_builder = TransactionBuilder::new(TransactionBuilderParams {
            balances: task.balances.clone(),
            own_color: task.color,
            own_address: task.address,
            request_ids: task.request_ids(),
        })?;

        let working = task.variable_state.lock().await.fork();
        let start_index = working.state_index();

        info!(
            "running {} requests of {} on state #{}",
            task.requests.len(),
            task.address,
            start_index
        );

        let address = task.address;
        let color = task.color;
        let timestamp = task.timestamp;
        let requests = task.requests.clone();
        let span = Span::current();
        let execution = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            span.in_scope(|| {
                execute_requests(
                    processor.as_ref(),
                    address,
                    color,
                    timestamp,
                    &requests,
                    working,
                    tx_builder,
                )
            })
        });

        let joined = match self.execution_timeout {
            Some(limit) => tokio::time::timeout(limit, execution)
                .await
                .map_err(|_| VMError::ExecutionTimeout(limit))?,
            None => execution.await,
        };
        let (updates, tx_builder) = joined.map_err(|e| VMError::Aborted(e.to_string()))??;

        if updates.len() != task.requests.len() {
            return Err(VMError::BatchConstruction(format!(
                "{} state updates for {} requests",
                updates.len(),
                task.requests.len()
            )));
        }
        let next_index = start_index
            .checked_add(1)
            .ok_or_else(|| VMError::BatchConstruction("state index overflow".to_string()))?;
        let batch = Batch::new(updates, next_index)
            .map_err(|e| VMError::BatchConstruction(e.to_string()))?;

        let mut canonical = task.variable_state.lock().await;
        let mut next = canonical.fork();
        if let Err(e) = next.apply_batch(&batch) {
            warn!(
                "discarding batch #{} of {}: {}",
                batch.state_index(),
                task.address,
                e
            );
            return Err(VMError::Apply(e));
        }
        let transaction = tx_builder.finalize(next.state_index(), next.hash())?;
        *canonical = next;

        info!(
            "applied batch #{} of {}, state hash {}",
            batch.state_index(),
            task.address,
            canonical.hash()
        );
        Ok(TaskOutput { batch, transaction })
    }
}

/// Run the requests of a batch in order on a working state.
///
/// Each update is applied to `state` before the next request runs, so later
/// requests observe the effects of earlier ones. Returns the updates in
/// request order together with the builder.
pub fn execute_requests(
    processor: &dyn Processor,
    address: Address,
    color: Color,
    timestamp: i64,
    requests: &[RequestRef],
    mut state: Box<dyn VariableState>,
    mut tx_builder: TransactionBuilder,
) -> VMResult<(Vec<StateUpdate>, TransactionBuilder)> {
    let mut updates = Vec::with_capacity(requests.len());

    for (index, request) in requests.iter().enumerate() {
        let request_id = request.request_id();
        let mut ctx = VMContext::new(
            address,
            color,
            timestamp,
            request,
            state.as_ref(),
            &mut tx_builder,
        );
        let update = processor
            .run(&mut ctx)
            .map_err(|source| VMError::Processor {
                index,
                request_id,
                source,
            })?;

        if *update.request_id() != request_id {
            return Err(VMError::BatchConstruction(format!(
                "update for {} returned while processing {}",
                update.request_id(),
                request_id
            )));
        }

        debug!(
            "request #{} {}: {} mutations",
            index,
            request_id,
            update.mutations().len()
        );
        state.apply_state_update(&update);
        updates.push(update);
    }

    Ok((updates, tx_builder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{NilProcessor, ProcessorError};
    use sc_common::{hash_data, NIL_HASH};
    use sc_state::{shared, VirtualState};
    use sc_transaction::{
        Balance, Balances, RequestBlock, Transaction, TransactionEssence,
    };
    use std::collections::BTreeMap;

    fn chain() -> (Address, Color) {
        (
            Address::from(hash_data(&[b"chain"])),
            Color::from(hash_data(&[b"chain-color"])),
        )
    }

    fn request_tx(address: Address, count: u16) -> Arc<Transaction> {
        let essence = TransactionEssence {
            inputs: Vec::new(),
            outputs: BTreeMap::new(),
            requests: (0..count)
                .map(|code| RequestBlock::new(address, code))
                .collect(),
            state_block: None,
        };
        Arc::new(Transaction::from_essence(essence).unwrap())
    }

    fn task(count: u16, program_hash: sc_common::HashValue) -> VMTask {
        let (address, color) = chain();
        let tx = request_tx(address, count);
        let mut balances = Balances::new();
        balances.insert(tx.id(), vec![Balance::new(color, 1)]);
        VMTask {
            address,
            color,
            balances,
            requests: (0..count)
                .map(|i| RequestRef::new(tx.clone(), i).unwrap())
                .collect(),
            timestamp: 1_000,
            variable_state: shared(VirtualState::new()),
            program_hash,
        }
    }

    struct Writer;

    impl Processor for Writer {
        fn run(&self, ctx: &mut VMContext<'_>) -> Result<StateUpdate, ProcessorError> {
            let seen = ctx.state().get("last").map(<[u8]>::to_vec);
            let mut update = ctx.new_state_update();
            update.set("last", ctx.request().index().to_le_bytes().to_vec());
            if let Some(previous) = seen {
                update.set("previous", previous);
            }
            Ok(update)
        }
    }

    #[test]
    fn test_execute_requests_sees_earlier_updates() {
        let t = task(2, NIL_HASH);
        let builder = TransactionBuilder::new(TransactionBuilderParams {
            balances: t.balances.clone(),
            own_color: t.color,
            own_address: t.address,
            request_ids: t.request_ids(),
        })
        .unwrap();

        let (updates, _) = execute_requests(
            &Writer,
            t.address,
            t.color,
            t.timestamp,
            &t.requests,
            Box::new(VirtualState::new()),
            builder,
        )
        .unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].mutations().len(), 1);
        // second request observed the first one's write
        assert_eq!(updates[1].mutations().len(), 2);
        assert_eq!(*updates[1].request_id(), t.requests[1].request_id());
    }

    #[tokio::test]
    async fn test_nil_processor_advances_state() {
        let runner = TaskRunner::new(Arc::new(ProcessorCache::with_defaults().unwrap()), None);
        let t = task(1, NilProcessor::PROGRAM_HASH);

        let output = runner.run(&t).await.unwrap();

        assert_eq!(output.batch.state_index(), 1);
        let state = t.variable_state.lock().await;
        assert_eq!(state.state_index(), 1);
        let block = output.transaction.state_block().unwrap();
        assert_eq!(block.state_index, 1);
        assert_eq!(block.state_hash, state.hash());
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let runner = TaskRunner::new(Arc::new(ProcessorCache::with_defaults().unwrap()), None);
        let t = task(0, NilProcessor::PROGRAM_HASH);

        let err = runner.run(&t).await.unwrap_err();
        assert!(matches!(err, VMError::BatchConstruction(_)));
        assert_eq!(t.variable_state.lock().await.state_index(), 0);
    }

    #[tokio::test]
    async fn test_missing_chain_token() {
        let runner = TaskRunner::new(Arc::new(ProcessorCache::with_defaults().unwrap()), None);
        let mut t = task(1, NilProcessor::PROGRAM_HASH);
        for balances in t.balances.values_mut() {
            balances.clear();
        }

        let err = runner.run(&t).await.unwrap_err();
        assert!(matches!(err, VMError::TxBuilder(_)));
    }
}
