//! Processor sources injected into the cache
//!
//! Built-in processors are addressed by hash, example processors by the
//! base58 form of their hash, and everything else is instantiated from a
//! program binary by a [`BinaryLoader`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sc_common::{HashValue, NIL_HASH};

use crate::processor::{NilProcessor, Processor};

/// VM type of built-in processors
pub const BUILTIN_VM_TYPE: &str = "builtinvm";

/// VM type of precompiled example processors
pub const EXAMPLE_VM_TYPE: &str = "examplevm";

/// Deployment record of a program on a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub deployment_hash: HashValue,
    pub vm_type: String,
    pub name: String,
    pub description: String,
}

/// Statically known built-in processors
#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    processors: HashMap<HashValue, Arc<dyn Processor>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the nil processor under [`NIL_HASH`]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NIL_HASH, Arc::new(NilProcessor));
        registry
    }

    pub fn register(&mut self, hash: HashValue, processor: Arc<dyn Processor>) {
        self.processors.insert(hash, processor);
    }

    pub fn get(&self, hash: &HashValue) -> Option<Arc<dyn Processor>> {
        self.processors.get(hash).cloned()
    }
}

/// Precompiled example processors, keyed by the string form of their hash
#[derive(Clone, Default)]
pub struct ExampleRegistry {
    processors: HashMap<String, Arc<dyn Processor>>,
}

impl ExampleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hash: &HashValue, processor: Arc<dyn Processor>) {
        self.processors.insert(hash.to_string(), processor);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(key).cloned()
    }
}

/// Errors instantiating a processor from a binary
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Unsupported VM type: {0}")]
    UnsupportedVmType(String),

    #[error("Malformed binary: {0}")]
    Malformed(String),
}

/// Instantiates processors from program binaries.
///
/// Called with the cache lock held, so implementations must be local and
/// bounded: no network access.
pub trait BinaryLoader: Send + Sync {
    fn load(&self, vm_type: &str, binary: &[u8]) -> Result<Arc<dyn Processor>, LoaderError>;
}

/// Loader for nodes without any program interpreter
#[derive(Debug, Default)]
pub struct UnsupportedLoader;

impl BinaryLoader for UnsupportedLoader {
    fn load(&self, vm_type: &str, _binary: &[u8]) -> Result<Arc<dyn Processor>, LoaderError> {
        Err(LoaderError::UnsupportedVmType(vm_type.to_string()))
    }
}

/// Supplies program binaries on cache misses
pub trait BinaryFetcher {
    fn fetch(&self, hash: &HashValue) -> Option<Vec<u8>>;
}

impl<F> BinaryFetcher for F
where
    F: Fn(&HashValue) -> Option<Vec<u8>>,
{
    fn fetch(&self, hash: &HashValue) -> Option<Vec<u8>> {
        self(hash)
    }
}
