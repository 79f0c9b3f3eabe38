/// Render target types

use crate::graphics_device::{ClearValue, RawHandle, TextureFormat, TextureHandles};
use crate::resource::ResourceState;

/// Render target creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
    /// Used when a bind does not supply its own clear value
    pub clear_value: ClearValue,
    /// Also usable as a sampled texture
    pub sampled: bool,
    pub start_state: ResourceState,
    pub node_index: u32,
}

impl Default for RenderTargetDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            width: 1,
            height: 1,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            sample_count: 1,
            clear_value: ClearValue::default(),
            sampled: true,
            start_state: ResourceState::UNDEFINED,
            node_index: 0,
        }
    }
}

/// Attachment views of a render target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTargetViews {
    /// Mip 0, every layer
    pub attachment: RawHandle,
    /// One view per mip, every layer
    pub mip_views: Vec<RawHandle>,
    /// One view per (mip, layer), indexed `mip * array_layers + layer`
    pub slice_views: Vec<RawHandle>,
}

/// Backend handles of a render target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTargetHandles {
    pub texture: TextureHandles,
    pub views: RenderTargetViews,
}
