//! Content-addressed processor cache
//!
//! Maps program identifiers to processor instances. Instantiation is
//! expensive, so it happens at most once per identifier; later lookups hand
//! out the same `Arc`. One mutex guards the whole map: resolution is rare
//! compared to execution.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use sc_common::{hash_data, HashValue, NIL_HASH};

use crate::error::{CacheError, CacheResult};
use crate::processor::Processor;
use crate::registry::{
    BinaryFetcher, BinaryLoader, BuiltinRegistry, ContractRecord, ExampleRegistry,
    UnsupportedLoader, BUILTIN_VM_TYPE, EXAMPLE_VM_TYPE,
};

type ProcessorMap = HashMap<HashValue, Arc<dyn Processor>>;

/// Identifier of a program deployed from a binary. The VM type is part of
/// the hash so identical bytecode under different VM semantics does not
/// collide.
pub fn deployment_hash(program_code: &[u8], vm_type: &str) -> HashValue {
    hash_data(&[program_code, vm_type.as_bytes()])
}

/// Processor cache maintained by each chain
pub struct ProcessorCache {
    processors: Mutex<ProcessorMap>,
    builtins: BuiltinRegistry,
    examples: ExampleRegistry,
    loader: Arc<dyn BinaryLoader>,
}

impl ProcessorCache {
    /// Create a cache over the given processor sources. The default built-in
    /// processor is deployed under the nil hash right away.
    pub fn new(
        builtins: BuiltinRegistry,
        examples: ExampleRegistry,
        loader: Arc<dyn BinaryLoader>,
    ) -> CacheResult<Self> {
        let cache = Self {
            processors: Mutex::new(HashMap::new()),
            builtins,
            examples,
            loader,
        };
        cache.new_processor(NIL_HASH.as_bytes(), BUILTIN_VM_TYPE)?;
        Ok(cache)
    }

    /// Cache with the default built-ins, no examples and no binary loader
    pub fn with_defaults() -> CacheResult<Self> {
        Self::new(
            BuiltinRegistry::with_defaults(),
            ExampleRegistry::new(),
            Arc::new(UnsupportedLoader),
        )
    }

    fn lock(&self) -> MutexGuard<'_, ProcessorMap> {
        // the map is never left half-updated, so a poisoned lock is still usable
        self.processors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deploy a processor for `program_code`, or return the existing one's
    /// identifier.
    ///
    /// For built-in and example VM types the code is the 32-byte program
    /// hash itself; for any other VM type it is the program binary.
    pub fn new_processor(&self, program_code: &[u8], vm_type: &str) -> CacheResult<HashValue> {
        let mut processors = self.lock();
        self.resolve_locked(&mut processors, program_code, vm_type)
    }

    fn resolve_locked(
        &self,
        processors: &mut ProcessorMap,
        program_code: &[u8],
        vm_type: &str,
    ) -> CacheResult<HashValue> {
        let (program_hash, processor) = match vm_type {
            BUILTIN_VM_TYPE => {
                let program_hash = HashValue::from_bytes(program_code)?;
                if processors.contains_key(&program_hash) {
                    return Ok(program_hash);
                }
                let processor = self
                    .builtins
                    .get(&program_hash)
                    .ok_or(CacheError::UnknownBuiltin(program_hash))?;
                (program_hash, processor)
            }
            EXAMPLE_VM_TYPE => {
                let program_hash = HashValue::from_bytes(program_code)?;
                if processors.contains_key(&program_hash) {
                    return Ok(program_hash);
                }
                let processor = self
                    .examples
                    .get(&program_hash.to_string())
                    .ok_or_else(|| CacheError::UnknownExample(program_hash.to_string()))?;
                (program_hash, processor)
            }
            _ => {
                let program_hash = deployment_hash(program_code, vm_type);
                if processors.contains_key(&program_hash) {
                    return Ok(program_hash);
                }
                debug!(
                    "loading {} byte binary for VM type '{}'",
                    program_code.len(),
                    vm_type
                );
                let processor =
                    self.loader
                        .load(vm_type, program_code)
                        .map_err(|e| CacheError::LoadError {
                            vm_type: vm_type.to_string(),
                            reason: e.to_string(),
                        })?;
                (program_hash, processor)
            }
        };

        processors.insert(program_hash, processor);
        info!("deployed {} processor {}", vm_type, program_hash);
        Ok(program_hash)
    }

    pub fn exists(&self, program_hash: &HashValue) -> bool {
        self.lock().contains_key(program_hash)
    }

    pub fn get_processor(&self, program_hash: &HashValue) -> Option<Arc<dyn Processor>> {
        self.lock().get(program_hash).cloned()
    }

    /// Processor for a deployment record, fetching and deploying the
    /// program binary on a cache miss.
    ///
    /// The fetcher runs without the cache lock held.
    pub fn get_or_create_processor(
        &self,
        record: &ContractRecord,
        fetcher: &dyn BinaryFetcher,
    ) -> CacheResult<Arc<dyn Processor>> {
        if let Some(processor) = self.get_processor(&record.deployment_hash) {
            return Ok(processor);
        }

        let binary = fetcher
            .fetch(&record.deployment_hash)
            .ok_or(CacheError::BinaryUnavailable(record.deployment_hash))?;

        let mut processors = self.lock();
        let program_hash = self.resolve_locked(&mut processors, &binary, &record.vm_type)?;
        if program_hash != record.deployment_hash {
            error!(
                "binary for {} resolved to {}",
                record.deployment_hash, program_hash
            );
            return Err(CacheError::Inconsistent(format!(
                "deployment hash mismatch: expected {}, got {}",
                record.deployment_hash, program_hash
            )));
        }

        processors.get(&program_hash).cloned().ok_or_else(|| {
            CacheError::Inconsistent(format!(
                "processor {} missing right after deployment",
                program_hash
            ))
        })
    }

    /// Evict a processor; no-op when absent. The default built-in under
    /// [`NIL_HASH`] is reserved and never evicted.
    pub fn remove_processor(&self, program_hash: &HashValue) {
        if program_hash.is_nil() {
            warn!("refusing to remove the default built-in processor");
            return;
        }
        if self.lock().remove(program_hash).is_some() {
            info!("removed processor {}", program_hash);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
