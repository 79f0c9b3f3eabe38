/// Mock graphics device for unit tests (no GPU required)
///
/// Every backend call is recorded in `MockState` so tests can assert on the
/// exact objects created, destroyed, allocated and written.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::barrier::BarrierBatch;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferDesc, BufferHandles, BufferUsage, CommandList, DescriptorAllocError, DescriptorPoolDesc,
    DescriptorSetLayoutDesc, DescriptorUpdateData, DeviceCapabilities, FramebufferDesc,
    GraphicsDevice, PipelineLayoutDesc, PipelineType, QueueType, RawHandle, RenderPassBegin,
    RenderPassDesc, RenderTargetDesc, RenderTargetHandles, RenderTargetViews, SamplerDesc,
    ShaderStageFlags, TextureDesc, TextureHandles, TextureUsage, UpdateTemplateDesc,
};

// ============================================================================
// Mock State
// ============================================================================

/// Backend descriptor pool as the mock sees it
#[derive(Debug, Clone)]
pub struct MockPool {
    pub handle: RawHandle,
    pub max_sets: u32,
    pub used_sets: u32,
}

/// Everything the mock device has been asked to do
#[derive(Debug, Default)]
pub struct MockState {
    pub buffers: Vec<(RawHandle, BufferDesc)>,
    pub textures: Vec<(RawHandle, TextureDesc)>,
    pub render_targets: Vec<(RawHandle, RenderTargetDesc)>,
    pub samplers: Vec<RawHandle>,
    pub layouts: Vec<(RawHandle, DescriptorSetLayoutDesc)>,
    pub templates: Vec<(RawHandle, UpdateTemplateDesc)>,
    pub pipeline_layouts: Vec<(RawHandle, PipelineLayoutDesc)>,
    pub pools: Vec<MockPool>,
    pub allocated_sets: Vec<RawHandle>,
    pub template_applies: Vec<(RawHandle, RawHandle, Vec<DescriptorUpdateData>)>,
    pub render_passes: Vec<(RawHandle, RenderPassDesc)>,
    pub framebuffers: Vec<(RawHandle, FramebufferDesc)>,
    /// (object kind, handle) in destruction order
    pub destroyed: Vec<(&'static str, RawHandle)>,
    /// Command logs of every created command list
    pub command_logs: Vec<Arc<Mutex<Vec<MockCommand>>>>,
    /// Fail the next `create_descriptor_pool` call
    pub fail_next_pool: bool,
    /// Fail the next `create_descriptor_set_layout` call
    pub fail_next_layout: bool,
}

impl MockState {
    pub fn destroyed_count(&self, kind: &str) -> usize {
        self.destroyed.iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn layout_desc(&self, handle: RawHandle) -> Option<&DescriptorSetLayoutDesc> {
        self.layouts.iter().find(|(h, _)| *h == handle).map(|(_, d)| d)
    }
}

// ============================================================================
// Mock Graphics Device
// ============================================================================

pub struct MockGraphicsDevice {
    capabilities: DeviceCapabilities,
    next_handle: AtomicU64,
    state: Mutex<MockState>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            next_handle: AtomicU64::new(1),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Command log of the most recently created command list
    pub fn last_command_log(&self) -> Arc<Mutex<Vec<MockCommand>>> {
        Arc::clone(self.state().command_logs.last().unwrap())
    }

    fn next(&self) -> RawHandle {
        RawHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn texture_handles(&self, usage: TextureUsage, mip_levels: u32, multisampled: bool) -> TextureHandles {
        let image = self.next();
        let srv = self.next();
        let uav_mips = if usage.contains(TextureUsage::STORAGE) && !multisampled {
            (0..mip_levels.max(1)).map(|_| self.next()).collect()
        } else {
            Vec::new()
        };
        TextureHandles { image, srv, uav_mips }
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandles> {
        if desc.size == 0 {
            crate::prism_bail!("prism::mock", "Cannot create zero-sized buffer '{}'", desc.name);
        }
        let buffer = self.next();
        let uniform_texel_view = (desc.usage.contains(BufferUsage::UNIFORM_TEXEL)
            && desc.texel_format.is_some())
        .then(|| self.next());
        let storage_texel_view = (desc.usage.contains(BufferUsage::STORAGE_TEXEL)
            && desc.texel_format.is_some())
        .then(|| self.next());
        self.state().buffers.push((buffer, desc.clone()));
        Ok(BufferHandles {
            buffer,
            uniform_texel_view,
            storage_texel_view,
        })
    }

    fn destroy_buffer(&self, handles: &BufferHandles) {
        self.state().destroyed.push(("buffer", handles.buffer));
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandles> {
        let handles = self.texture_handles(desc.usage, desc.mip_levels, desc.sample_count > 1);
        self.state().textures.push((handles.image, desc.clone()));
        Ok(handles)
    }

    fn destroy_texture(&self, handles: &TextureHandles) {
        self.state().destroyed.push(("texture", handles.image));
    }

    fn create_render_target(&self, desc: &RenderTargetDesc) -> Result<RenderTargetHandles> {
        let texture = self.texture_handles(TextureUsage::SAMPLED, desc.mip_levels, desc.sample_count > 1);
        let mips = desc.mip_levels.max(1);
        let layers = desc.array_layers.max(1);
        let views = RenderTargetViews {
            attachment: self.next(),
            mip_views: (0..mips).map(|_| self.next()).collect(),
            slice_views: (0..mips * layers).map(|_| self.next()).collect(),
        };
        self.state().render_targets.push((texture.image, desc.clone()));
        Ok(RenderTargetHandles { texture, views })
    }

    fn destroy_render_target_views(&self, views: &RenderTargetViews) {
        self.state().destroyed.push(("render_target_views", views.attachment));
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<RawHandle> {
        let handle = self.next();
        self.state().samplers.push(handle);
        Ok(handle)
    }

    fn destroy_sampler(&self, sampler: RawHandle) {
        self.state().destroyed.push(("sampler", sampler));
    }

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<RawHandle> {
        let mut state = self.state();
        if state.fail_next_layout {
            state.fail_next_layout = false;
            return Err(Error::BackendError("mock layout failure".to_string()));
        }
        let handle = self.next();
        state.layouts.push((handle, desc.clone()));
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: RawHandle) {
        self.state().destroyed.push(("descriptor_set_layout", layout));
    }

    fn create_update_template(&self, desc: &UpdateTemplateDesc) -> Result<RawHandle> {
        let handle = self.next();
        self.state().templates.push((handle, desc.clone()));
        Ok(handle)
    }

    fn destroy_update_template(&self, template: RawHandle) {
        self.state().destroyed.push(("update_template", template));
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<RawHandle> {
        let handle = self.next();
        self.state().pipeline_layouts.push((handle, desc.clone()));
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: RawHandle) {
        self.state().destroyed.push(("pipeline_layout", layout));
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<RawHandle> {
        let mut state = self.state();
        if state.fail_next_pool {
            state.fail_next_pool = false;
            return Err(Error::BackendError("mock pool failure".to_string()));
        }
        let handle = self.next();
        state.pools.push(MockPool {
            handle,
            max_sets: desc.max_sets,
            used_sets: 0,
        });
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: RawHandle) {
        self.state().destroyed.push(("descriptor_pool", pool));
    }

    fn allocate_descriptor_sets(
        &self,
        pool: RawHandle,
        layouts: &[RawHandle],
    ) -> std::result::Result<Vec<RawHandle>, DescriptorAllocError> {
        let mut state = self.state();
        let count = layouts.len() as u32;
        let entry = state
            .pools
            .iter_mut()
            .find(|p| p.handle == pool)
            .ok_or_else(|| DescriptorAllocError::Backend(Error::InvalidResource("unknown pool".to_string())))?;
        if entry.used_sets + count > entry.max_sets {
            return Err(DescriptorAllocError::OutOfPoolMemory);
        }
        entry.used_sets += count;
        let sets: Vec<RawHandle> = (0..count).map(|_| self.next()).collect();
        state.allocated_sets.extend_from_slice(&sets);
        Ok(sets)
    }

    fn apply_update_template(&self, set: RawHandle, template: RawHandle, data: &[DescriptorUpdateData]) {
        self.state().template_applies.push((set, template, data.to_vec()));
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RawHandle> {
        let handle = self.next();
        self.state().render_passes.push((handle, desc.clone()));
        Ok(handle)
    }

    fn destroy_render_pass(&self, render_pass: RawHandle) {
        self.state().destroyed.push(("render_pass", render_pass));
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<RawHandle> {
        let handle = self.next();
        self.state().framebuffers.push((handle, desc.clone()));
        Ok(handle)
    }

    fn destroy_framebuffer(&self, framebuffer: RawHandle) {
        self.state().destroyed.push(("framebuffer", framebuffer));
    }

    fn create_command_list(&self, queue_type: QueueType, _node_index: u32) -> Result<Box<dyn CommandList>> {
        let list = MockCommandList::new(queue_type);
        self.state().command_logs.push(Arc::clone(&list.commands));
        Ok(Box::new(list))
    }
}

// ============================================================================
// Mock Command List
// ============================================================================

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    Begin,
    End,
    BindDescriptorSet {
        pipeline_type: PipelineType,
        pipeline_layout: RawHandle,
        set_index: u32,
        set: RawHandle,
        dynamic_offsets: Vec<u32>,
    },
    PushConstants {
        pipeline_layout: RawHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    PipelineBarrier(BarrierBatch),
    BeginRenderPass(RenderPassBegin),
    EndRenderPass,
}

pub struct MockCommandList {
    queue_type: QueueType,
    pub commands: Arc<Mutex<Vec<MockCommand>>>,
}

impl MockCommandList {
    pub fn new(queue_type: QueueType) -> Self {
        Self {
            queue_type,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, command: MockCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

impl CommandList for MockCommandList {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn begin(&mut self) -> Result<()> {
        self.record(MockCommand::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.record(MockCommand::End);
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline_type: PipelineType,
        pipeline_layout: RawHandle,
        set_index: u32,
        set: RawHandle,
        dynamic_offsets: &[u32],
    ) {
        self.record(MockCommand::BindDescriptorSet {
            pipeline_type,
            pipeline_layout,
            set_index,
            set,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn push_constants(&mut self, pipeline_layout: RawHandle, stages: ShaderStageFlags, offset: u32, data: &[u8]) {
        self.record(MockCommand::PushConstants {
            pipeline_layout,
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn pipeline_barrier(&mut self, batch: &BarrierBatch) {
        self.record(MockCommand::PipelineBarrier(batch.clone()));
    }

    fn begin_render_pass(&mut self, begin: &RenderPassBegin) {
        self.record(MockCommand::BeginRenderPass(begin.clone()));
    }

    fn end_render_pass(&mut self) {
        self.record(MockCommand::EndRenderPass);
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
