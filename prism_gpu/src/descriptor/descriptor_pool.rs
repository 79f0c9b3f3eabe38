/// Descriptor pool - growable set allocator
///
/// Sets are always allocated from the current backend pool. When the backend
/// reports exhaustion a new pool with identical sizing is created, made
/// current, and the allocation is retried once. Sets from older pools stay
/// valid until the whole `DescriptorPool` is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::graphics_device::{DescriptorAllocError, DescriptorPoolDesc, GraphicsDevice, RawHandle};
use crate::{prism_debug, prism_error, prism_info};

const SOURCE: &str = "prism::descriptor_pool";

struct PoolState {
    pools: Vec<RawHandle>,
    current: usize,
    used_sets: u64,
}

/// Thread-safe descriptor set allocator
pub struct DescriptorPool {
    desc: DescriptorPoolDesc,
    state: Mutex<PoolState>,
    device: Arc<dyn GraphicsDevice>,
}

impl DescriptorPool {
    /// Create the allocator and its first backend pool
    pub fn new(device: Arc<dyn GraphicsDevice>, desc: DescriptorPoolDesc) -> Result<Self> {
        let first = device.create_descriptor_pool(&desc).map_err(|e| {
            prism_error!(SOURCE, "Failed to create descriptor pool: {}", e);
            e
        })?;
        prism_debug!(SOURCE, "Created descriptor pool ({} sets per pool)", desc.max_sets);
        Ok(Self {
            desc,
            state: Mutex::new(PoolState {
                pools: vec![first],
                current: 0,
                used_sets: 0,
            }),
            device,
        })
    }

    /// Allocate one set per layout
    ///
    /// Grows by exactly one pool on exhaustion; a failure after growing is
    /// returned as `Error::DescriptorPoolExhausted`.
    pub fn consume(&self, layouts: &[RawHandle]) -> Result<Vec<RawHandle>> {
        if layouts.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::BackendError("descriptor pool mutex poisoned".to_string()))?;

        let current = state.pools[state.current];
        let sets = match self.device.allocate_descriptor_sets(current, layouts) {
            Ok(sets) => sets,
            Err(DescriptorAllocError::OutOfPoolMemory) => {
                let new_pool = self.device.create_descriptor_pool(&self.desc).map_err(|e| {
                    prism_error!(SOURCE, "Failed to grow descriptor pool: {}", e);
                    e
                })?;
                state.pools.push(new_pool);
                state.current = state.pools.len() - 1;
                prism_info!(
                    SOURCE,
                    "Descriptor pool exhausted, created new pool (total: {})",
                    state.pools.len()
                );

                match self.device.allocate_descriptor_sets(new_pool, layouts) {
                    Ok(sets) => sets,
                    Err(e) => {
                        let message = format!(
                            "allocation of {} sets failed after pool growth: {:?}",
                            layouts.len(),
                            e
                        );
                        prism_error!(SOURCE, "{}", message);
                        return Err(Error::DescriptorPoolExhausted(message));
                    }
                }
            }
            Err(DescriptorAllocError::Backend(e)) => {
                prism_error!(SOURCE, "Failed to allocate descriptor sets: {}", e);
                return Err(e);
            }
        };

        state.used_sets += sets.len() as u64;
        Ok(sets)
    }

    /// Number of backend pools created so far
    pub fn pool_count(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).pools.len()
    }

    /// Total sets handed out
    pub fn used_sets(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).used_sets
    }

    pub fn desc(&self) -> &DescriptorPoolDesc {
        &self.desc
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for pool in state.pools.drain(..) {
            self.device.destroy_descriptor_pool(pool);
        }
    }
}

#[cfg(test)]
#[path = "descriptor_pool_tests.rs"]
mod tests;
