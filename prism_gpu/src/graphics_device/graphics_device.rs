/// GraphicsDevice trait - backend object factory
///
/// Everything the core needs from a backend goes through this trait. Objects
/// are identified by `RawHandle`, the backend's native 64-bit handle value.

use crate::error::Result;
use crate::graphics_device::{
    BufferDesc, BufferHandles, CommandList, DescriptorAllocError, DescriptorPoolDesc,
    DescriptorSetLayoutDesc, DescriptorUpdateData, FramebufferDesc, PipelineLayoutDesc,
    RenderPassDesc, RenderTargetDesc, RenderTargetHandles, RenderTargetViews, SamplerDesc,
    TextureDesc, TextureHandles, UpdateTemplateDesc,
};

/// Opaque backend handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RawHandle(pub u64);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Queue family a command stream records for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    #[default]
    Graphics,
    Compute,
    Transfer,
}

/// Immutable device limits and features, captured once at device creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Number of linked GPU nodes (1 on single-GPU systems)
    pub linked_node_count: u32,
    pub max_uniform_buffer_range: u64,
    pub max_bound_descriptor_sets: u32,
    pub max_push_constant_size: u32,
    pub descriptor_indexing: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            linked_node_count: 1,
            max_uniform_buffer_range: 65536,
            max_bound_descriptor_sets: 4,
            max_push_constant_size: 128,
            descriptor_indexing: false,
        }
    }
}

/// Backend device
///
/// Destroy calls on handles the backend does not know are ignored.
pub trait GraphicsDevice: Send + Sync {
    /// Backend name ("vulkan", "mock", ...)
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> DeviceCapabilities;

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandles>;

    fn destroy_buffer(&self, handles: &BufferHandles);

    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandles>;

    fn destroy_texture(&self, handles: &TextureHandles);

    fn create_render_target(&self, desc: &RenderTargetDesc) -> Result<RenderTargetHandles>;

    /// Destroy attachment views only; the underlying texture is destroyed with `destroy_texture`
    fn destroy_render_target_views(&self, views: &RenderTargetViews);

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<RawHandle>;

    fn destroy_sampler(&self, sampler: RawHandle);

    // ===== BINDING MODEL =====

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<RawHandle>;

    fn destroy_descriptor_set_layout(&self, layout: RawHandle);

    fn create_update_template(&self, desc: &UpdateTemplateDesc) -> Result<RawHandle>;

    fn destroy_update_template(&self, template: RawHandle);

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<RawHandle>;

    fn destroy_pipeline_layout(&self, layout: RawHandle);

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<RawHandle>;

    /// Frees every set allocated from the pool
    fn destroy_descriptor_pool(&self, pool: RawHandle);

    /// Allocate one set per entry of `layouts`
    fn allocate_descriptor_sets(
        &self,
        pool: RawHandle,
        layouts: &[RawHandle],
    ) -> std::result::Result<Vec<RawHandle>, DescriptorAllocError>;

    /// Write `data` into `set` using an update template created for the set's layout
    fn apply_update_template(&self, set: RawHandle, template: RawHandle, data: &[DescriptorUpdateData]);

    // ===== RENDER PASSES =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RawHandle>;

    fn destroy_render_pass(&self, render_pass: RawHandle);

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<RawHandle>;

    fn destroy_framebuffer(&self, framebuffer: RawHandle);

    // ===== COMMANDS =====

    fn create_command_list(&self, queue_type: QueueType, node_index: u32) -> Result<Box<dyn CommandList>>;
}
