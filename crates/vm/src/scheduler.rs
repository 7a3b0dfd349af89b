//! Background dispatch of VM tasks
//!
//! Every submitted task gets its own worker on the tokio runtime. Tasks are
//! deduplicated by [`TaskKey`]: while a key is in flight, a second submission
//! with the same key is rejected. Completion is reported through a
//! [`TaskHandle`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{oneshot, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::error::{SchedulerError, VMError, VMResult};
use crate::runner::TaskRunner;
use crate::task::{TaskKey, TaskOutput, VMTask};

/// Completion side of a submitted task
#[derive(Debug)]
pub struct TaskHandle {
    key: TaskKey,
    rx: oneshot::Receiver<VMResult<TaskOutput>>,
}

impl TaskHandle {
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Wait for the task to finish
    pub async fn wait(self) -> VMResult<TaskOutput> {
        let key = self.key;
        self.rx
            .await
            .map_err(|_| VMError::Aborted(format!("worker for {} ended without a result", key)))?
    }
}

/// Removes a key from the in-flight set when the worker ends, including
/// by panic, and wakes anyone waiting for the set to drain
struct InFlightGuard {
    key: TaskKey,
    in_flight: Arc<DashMap<TaskKey, ()>>,
    drained: Arc<Notify>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
        self.drained.notify_waiters();
    }
}

/// Deduplicating VM task scheduler
pub struct TaskScheduler {
    runner: Arc<TaskRunner>,
    in_flight: Arc<DashMap<TaskKey, ()>>,
    drained: Arc<Notify>,
    permits: Arc<Semaphore>,
    accepting: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// At most `max_concurrent_tasks` tasks execute at the same time; the
    /// others wait for a permit inside their worker.
    pub fn new(runner: TaskRunner, max_concurrent_tasks: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            in_flight: Arc::new(DashMap::new()),
            drained: Arc::new(Notify::new()),
            permits: Arc::new(Semaphore::new(max_concurrent_tasks.max(1))),
            accepting: AtomicBool::new(true),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a task in the background. Must be called from within a tokio
    /// runtime.
    pub fn submit(&self, task: VMTask) -> Result<TaskHandle, SchedulerError> {
        let key = task.key();

        // held until the worker is registered so shutdown sees every worker
        let mut workers = self.lock_workers();
        if !self.accepting.load(Ordering::SeqCst) {
            warn!("rejecting task {}: scheduler is shutting down", key);
            return Err(SchedulerError::ShuttingDown);
        }

        match self.in_flight.entry(key) {
            Entry::Occupied(_) => {
                warn!("rejecting task {}: already running", key);
                return Err(SchedulerError::DuplicateTask(key));
            }
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }
        let guard = InFlightGuard {
            key,
            in_flight: self.in_flight.clone(),
            drained: self.drained.clone(),
        };

        let (tx, rx) = oneshot::channel();
        let runner = self.runner.clone();
        let permits = self.permits.clone();
        let span = info_span!("vm_task", key = %key);

        let worker = tokio::spawn(
            async move {
                let result = match permits.acquire_owned().await {
                    Ok(permit) => runner.run_with_permit(&task, Some(permit)).await,
                    Err(_) => Err(VMError::Aborted("task permits closed".to_string())),
                };

                match &result {
                    Ok(output) => info!(
                        "task finished: batch #{} with {} updates",
                        output.batch.state_index(),
                        output.batch.len()
                    ),
                    Err(e) if e.is_fatal() => error!("FATAL: task failed: {}", e),
                    Err(e) => error!("task failed: {}", e),
                };

                // release the key first: a waiter may resubmit right away
                drop(guard);
                if tx.send(result).is_err() {
                    info!("task handle dropped before completion");
                }
            }
            .instrument(span),
        );

        workers.retain(|worker| !worker.is_finished());
        workers.push(worker);
        info!("task {} submitted", key);
        Ok(TaskHandle { key, rx })
    }

    /// Number of tasks in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &TaskKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Stop accepting tasks and wait for the running ones. Running tasks
    /// are never aborted. Safe to call more than once or concurrently: every
    /// call returns only once no task is in flight.
    pub async fn shutdown(&self) {
        let workers = {
            let mut workers = self.lock_workers();
            self.accepting.store(false, Ordering::SeqCst);
            std::mem::take(&mut *workers)
        };

        info!("waiting for {} VM workers", workers.len());
        for result in join_all(workers).await {
            if let Err(e) = result {
                error!("VM worker ended abnormally: {}", e);
            }
        }

        // workers joined by a concurrent call
        loop {
            let drained = self.drained.notified();
            if self.in_flight.is_empty() {
                break;
            }
            drained.await;
        }
    }

    /// Serve until `signal` completes, then shut down
    pub async fn run_until<F: Future>(&self, signal: F) {
        signal.await;
        info!("shutdown VM...");
        self.shutdown().await;
        info!("shutdown VM... done");
    }
}
