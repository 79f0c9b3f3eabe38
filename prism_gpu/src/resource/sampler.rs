/// Sampler - core sampler object

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, RawHandle, SamplerDesc};

pub struct Sampler {
    id: u64,
    handle: RawHandle,
    device: Arc<dyn GraphicsDevice>,
}

impl Sampler {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, desc: &SamplerDesc, id: u64) -> Result<Self> {
        let handle = device.create_sampler(desc)?;
        Ok(Self { id, handle, device })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.device.destroy_sampler(self.handle);
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler").field("id", &self.id).field("handle", &self.handle).finish()
    }
}
