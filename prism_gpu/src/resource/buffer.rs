/// Buffer - core buffer object

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{BufferDesc, BufferHandles, BufferUsage, GraphicsDevice, RawHandle};
use crate::resource::{ResourceState, ResourceStateTracker};

/// GPU buffer with tracked state
///
/// Dropping the buffer destroys its backend objects.
pub struct Buffer {
    id: u64,
    size: u64,
    usage: BufferUsage,
    node_index: u32,
    handles: BufferHandles,
    state: ResourceStateTracker,
    device: Arc<dyn GraphicsDevice>,
}

impl Buffer {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, desc: &BufferDesc, id: u64) -> Result<Self> {
        let handles = device.create_buffer(desc)?;
        Ok(Self {
            id,
            size: desc.size,
            usage: desc.usage,
            node_index: desc.node_index,
            handles,
            state: ResourceStateTracker::new(desc.start_state),
            device,
        })
    }

    /// Creation-order identity (unique per renderer)
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn node_index(&self) -> u32 {
        self.node_index
    }

    pub fn handle(&self) -> RawHandle {
        self.handles.buffer
    }

    pub fn handles(&self) -> &BufferHandles {
        &self.handles
    }

    pub fn current_state(&self) -> ResourceState {
        self.state.get()
    }

    pub(crate) fn state(&self) -> &ResourceStateTracker {
        &self.state
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.destroy_buffer(&self.handles);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("handles", &self.handles)
            .field("state", &self.state.get())
            .finish()
    }
}
