/// Buffer types

use bitflags::bitflags;

use crate::graphics_device::{RawHandle, TextureFormat};
use crate::resource::ResourceState;

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 0x001;
        const INDEX = 0x002;
        const UNIFORM = 0x004;
        const STORAGE = 0x008;
        const INDIRECT = 0x010;
        /// Typed read-only view (needs `texel_format`)
        const UNIFORM_TEXEL = 0x020;
        /// Typed read/write view (needs `texel_format`)
        const STORAGE_TEXEL = 0x040;
        const TRANSFER_SRC = 0x080;
        const TRANSFER_DST = 0x100;
    }
}

/// Memory placement of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryUsage {
    #[default]
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

/// Buffer creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    pub name: String,
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryUsage,
    pub texel_format: Option<TextureFormat>,
    pub start_state: ResourceState,
    pub node_index: u32,
}

impl Default for BufferDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            size: 0,
            usage: BufferUsage::UNIFORM,
            memory: MemoryUsage::GpuOnly,
            texel_format: None,
            start_state: ResourceState::UNDEFINED,
            node_index: 0,
        }
    }
}

/// Backend handles of a buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferHandles {
    pub buffer: RawHandle,
    pub uniform_texel_view: Option<RawHandle>,
    pub storage_texel_view: Option<RawHandle>,
}
