/// Texture - core texture object

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    GraphicsDevice, RawHandle, TextureDesc, TextureDimension, TextureFormat, TextureHandles,
};
use crate::resource::{ResourceState, ResourceStateTracker};

/// GPU texture with tracked state
///
/// Dropping the texture destroys its image and views.
pub struct Texture {
    id: u64,
    width: u32,
    height: u32,
    depth: u32,
    array_layers: u32,
    mip_levels: u32,
    format: TextureFormat,
    sample_count: u32,
    dimension: TextureDimension,
    node_index: u32,
    handles: TextureHandles,
    state: ResourceStateTracker,
    device: Arc<dyn GraphicsDevice>,
}

impl Texture {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, desc: &TextureDesc, id: u64) -> Result<Self> {
        let handles = device.create_texture(desc)?;
        Ok(Self::from_handles(device, desc, handles, id))
    }

    pub(crate) fn from_handles(
        device: Arc<dyn GraphicsDevice>,
        desc: &TextureDesc,
        handles: TextureHandles,
        id: u64,
    ) -> Self {
        Self {
            id,
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
            array_layers: desc.array_layers,
            mip_levels: desc.mip_levels,
            format: desc.format,
            sample_count: desc.sample_count,
            dimension: desc.dimension,
            node_index: desc.node_index,
            handles,
            state: ResourceStateTracker::new(desc.start_state),
            device,
        }
    }

    /// Creation-order identity (unique per renderer)
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    pub fn node_index(&self) -> u32 {
        self.node_index
    }

    pub fn handles(&self) -> &TextureHandles {
        &self.handles
    }

    pub fn srv(&self) -> RawHandle {
        self.handles.srv
    }

    /// Storage view of one mip, if the texture has storage usage
    pub fn uav(&self, mip: u32) -> Option<RawHandle> {
        self.handles.uav_mips.get(mip as usize).copied()
    }

    pub fn current_state(&self) -> ResourceState {
        self.state.get()
    }

    pub(crate) fn state(&self) -> &ResourceStateTracker {
        &self.state
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.device.destroy_texture(&self.handles);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &(self.width, self.height, self.depth))
            .field("format", &self.format)
            .field("dimension", &self.dimension)
            .field("state", &self.state.get())
            .finish()
    }
}
