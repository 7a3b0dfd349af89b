//! VM task execution engine
//!
//! Resolves program identifiers to runnable [`Processor`]s through the
//! [`ProcessorCache`], executes ordered request batches against chain state
//! with the [`TaskRunner`], and dispatches runs in the background through the
//! deduplicating [`TaskScheduler`].

pub mod cache;
pub mod error;
pub mod processor;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod task;

pub use cache::{deployment_hash, ProcessorCache};
pub use error::{CacheError, CacheResult, SchedulerError, VMError, VMResult};
pub use processor::{NilProcessor, Processor, ProcessorError, VMContext};
pub use registry::{
    BinaryFetcher, BinaryLoader, BuiltinRegistry, ContractRecord, ExampleRegistry, LoaderError,
    UnsupportedLoader, BUILTIN_VM_TYPE, EXAMPLE_VM_TYPE,
};
pub use runner::{execute_requests, TaskRunner};
pub use scheduler::{TaskHandle, TaskScheduler};
pub use task::{batch_hash, requests_from_messages, TaskKey, TaskOutput, VMTask};
