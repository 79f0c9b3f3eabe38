/// Barrier synthesizer
///
/// Compares requested states against each resource's tracked state and
/// produces the minimal set of backend barriers, batched into one
/// `BarrierBatch` per call:
///
/// - `new ⊄ current`: transition barrier, tracked state becomes `new`
/// - `new == UNORDERED_ACCESS` and already there: UAV hazard barrier
/// - otherwise: nothing
///
/// Access flags, pipeline stages and image layouts use backend-neutral
/// types whose bit values follow the Vulkan enumerations.

use bitflags::bitflags;

use crate::graphics_device::{QueueType, RawHandle, TextureFormat};
use crate::resource::{Buffer, RenderTarget, ResourceState, Texture};

bitflags! {
    /// Memory access kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 0x0000_0001;
        const INDEX_READ = 0x0000_0002;
        const VERTEX_ATTRIBUTE_READ = 0x0000_0004;
        const UNIFORM_READ = 0x0000_0008;
        const INPUT_ATTACHMENT_READ = 0x0000_0010;
        const SHADER_READ = 0x0000_0020;
        const SHADER_WRITE = 0x0000_0040;
        const COLOR_ATTACHMENT_READ = 0x0000_0080;
        const COLOR_ATTACHMENT_WRITE = 0x0000_0100;
        const DEPTH_STENCIL_ATTACHMENT_READ = 0x0000_0200;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 0x0000_0400;
        const TRANSFER_READ = 0x0000_0800;
        const TRANSFER_WRITE = 0x0000_1000;
        const HOST_READ = 0x0000_2000;
        const HOST_WRITE = 0x0000_4000;
        const MEMORY_READ = 0x0000_8000;
        const MEMORY_WRITE = 0x0001_0000;
    }
}

bitflags! {
    /// Pipeline stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStageFlags: u32 {
        const TOP_OF_PIPE = 0x0000_0001;
        const DRAW_INDIRECT = 0x0000_0002;
        const VERTEX_INPUT = 0x0000_0004;
        const VERTEX_SHADER = 0x0000_0008;
        const TESSELLATION_CONTROL_SHADER = 0x0000_0010;
        const TESSELLATION_EVALUATION_SHADER = 0x0000_0020;
        const GEOMETRY_SHADER = 0x0000_0040;
        const FRAGMENT_SHADER = 0x0000_0080;
        const EARLY_FRAGMENT_TESTS = 0x0000_0100;
        const LATE_FRAGMENT_TESTS = 0x0000_0200;
        const COLOR_ATTACHMENT_OUTPUT = 0x0000_0400;
        const COMPUTE_SHADER = 0x0000_0800;
        const TRANSFER = 0x0000_1000;
        const BOTTOM_OF_PIPE = 0x0000_2000;
        const HOST = 0x0000_4000;
        const ALL_GRAPHICS = 0x0000_8000;
        const ALL_COMMANDS = 0x0001_0000;
    }
}

bitflags! {
    /// Image aspects covered by a texture barrier
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureAspect: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    Present,
}

/// One buffer barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: RawHandle,
    pub old_state: ResourceState,
    pub new_state: ResourceState,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// One texture barrier covering every mip and layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBarrier {
    pub image: RawHandle,
    pub old_state: ResourceState,
    pub new_state: ResourceState,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub aspect: TextureAspect,
    pub mip_levels: u32,
    pub array_layers: u32,
}

/// Barriers recorded by one `CommandList::pipeline_barrier` call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BarrierBatch {
    pub buffer_barriers: Vec<BufferBarrier>,
    pub texture_barriers: Vec<TextureBarrier>,
    pub src_stages: PipelineStageFlags,
    pub dst_stages: PipelineStageFlags,
}

impl BarrierBatch {
    pub fn is_empty(&self) -> bool {
        self.buffer_barriers.is_empty() && self.texture_barriers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer_barriers.len() + self.texture_barriers.len()
    }
}

/// Requested state of a buffer
#[derive(Debug, Clone, Copy)]
pub struct BufferTransition<'a> {
    pub buffer: &'a Buffer,
    pub new_state: ResourceState,
}

impl<'a> BufferTransition<'a> {
    pub fn new(buffer: &'a Buffer, new_state: ResourceState) -> Self {
        Self { buffer, new_state }
    }
}

/// Requested state of a texture
#[derive(Debug, Clone, Copy)]
pub struct TextureTransition<'a> {
    pub texture: &'a Texture,
    pub new_state: ResourceState,
}

impl<'a> TextureTransition<'a> {
    pub fn new(texture: &'a Texture, new_state: ResourceState) -> Self {
        Self { texture, new_state }
    }

    /// Transition the texture behind a render target
    pub fn render_target(target: &'a RenderTarget, new_state: ResourceState) -> Self {
        Self {
            texture: target.texture(),
            new_state,
        }
    }
}

// ============================================================================
// State mappings
// ============================================================================

/// Access flags implied by a resource state
pub fn resource_state_to_access(state: ResourceState) -> AccessFlags {
    let mut access = AccessFlags::empty();
    if state.contains(ResourceState::COPY_SOURCE) {
        access |= AccessFlags::TRANSFER_READ;
    }
    if state.contains(ResourceState::COPY_DEST) {
        access |= AccessFlags::TRANSFER_WRITE;
    }
    if state.intersects(ResourceState::VERTEX_BUFFER | ResourceState::UNIFORM_READ) {
        access |= AccessFlags::UNIFORM_READ | AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if state.contains(ResourceState::INDEX_BUFFER) {
        access |= AccessFlags::INDEX_READ;
    }
    if state.contains(ResourceState::UNORDERED_ACCESS) {
        access |= AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE;
    }
    if state.contains(ResourceState::INDIRECT_ARGUMENT) {
        access |= AccessFlags::INDIRECT_COMMAND_READ;
    }
    if state.contains(ResourceState::RENDER_TARGET) {
        access |= AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::DEPTH_WRITE) {
        access |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    if state.contains(ResourceState::DEPTH_READ) {
        access |= AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ;
    }
    if state.intersects(ResourceState::SHADER_RESOURCE) {
        access |= AccessFlags::SHADER_READ;
    }
    if state.contains(ResourceState::PRESENT) {
        access |= AccessFlags::MEMORY_READ;
    }
    access
}

/// Image layout implied by a resource state (first match wins)
pub fn resource_state_to_image_layout(state: ResourceState) -> ImageLayout {
    if state.contains(ResourceState::COPY_SOURCE) {
        ImageLayout::TransferSrc
    } else if state.contains(ResourceState::COPY_DEST) {
        ImageLayout::TransferDst
    } else if state.contains(ResourceState::RENDER_TARGET) {
        ImageLayout::ColorAttachment
    } else if state.contains(ResourceState::DEPTH_WRITE) {
        ImageLayout::DepthStencilAttachment
    } else if state.contains(ResourceState::DEPTH_READ) {
        ImageLayout::DepthStencilReadOnly
    } else if state.contains(ResourceState::UNORDERED_ACCESS) {
        ImageLayout::General
    } else if state.intersects(ResourceState::SHADER_RESOURCE) {
        ImageLayout::ShaderReadOnly
    } else if state.contains(ResourceState::PRESENT) {
        ImageLayout::Present
    } else if state.contains(ResourceState::COMMON) {
        ImageLayout::General
    } else {
        ImageLayout::Undefined
    }
}

/// Narrowest pipeline stages covering `access` on a queue of `queue_type`
pub fn determine_pipeline_stages(access: AccessFlags, queue_type: QueueType) -> PipelineStageFlags {
    let mut stages = PipelineStageFlags::empty();

    match queue_type {
        QueueType::Graphics => {
            if access.intersects(AccessFlags::INDEX_READ | AccessFlags::VERTEX_ATTRIBUTE_READ) {
                stages |= PipelineStageFlags::VERTEX_INPUT;
            }
            if access.intersects(AccessFlags::UNIFORM_READ | AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE) {
                stages |= PipelineStageFlags::VERTEX_SHADER
                    | PipelineStageFlags::FRAGMENT_SHADER
                    | PipelineStageFlags::COMPUTE_SHADER;
            }
            if access.contains(AccessFlags::INPUT_ATTACHMENT_READ) {
                stages |= PipelineStageFlags::FRAGMENT_SHADER;
            }
            if access.intersects(AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE) {
                stages |= PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
            }
            if access.intersects(
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ) {
                stages |= PipelineStageFlags::EARLY_FRAGMENT_TESTS | PipelineStageFlags::LATE_FRAGMENT_TESTS;
            }
        }
        QueueType::Compute => {
            let graphics_only = AccessFlags::INDEX_READ
                | AccessFlags::VERTEX_ATTRIBUTE_READ
                | AccessFlags::INPUT_ATTACHMENT_READ
                | AccessFlags::COLOR_ATTACHMENT_READ
                | AccessFlags::COLOR_ATTACHMENT_WRITE
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
            if access.intersects(graphics_only) {
                return PipelineStageFlags::ALL_COMMANDS;
            }
            if access.intersects(AccessFlags::UNIFORM_READ | AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE) {
                stages |= PipelineStageFlags::COMPUTE_SHADER;
            }
        }
        QueueType::Transfer => return PipelineStageFlags::ALL_COMMANDS,
    }

    if access.contains(AccessFlags::INDIRECT_COMMAND_READ) {
        stages |= PipelineStageFlags::DRAW_INDIRECT;
    }
    if access.intersects(AccessFlags::TRANSFER_READ | AccessFlags::TRANSFER_WRITE) {
        stages |= PipelineStageFlags::TRANSFER;
    }
    if access.intersects(AccessFlags::HOST_READ | AccessFlags::HOST_WRITE) {
        stages |= PipelineStageFlags::HOST;
    }
    if stages.is_empty() {
        stages = PipelineStageFlags::TOP_OF_PIPE;
    }
    stages
}

fn aspect_for_format(format: TextureFormat) -> TextureAspect {
    if format.is_depth() {
        if format.has_stencil() {
            TextureAspect::DEPTH | TextureAspect::STENCIL
        } else {
            TextureAspect::DEPTH
        }
    } else {
        TextureAspect::COLOR
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Decide what a transition needs: `Some((old, new))` to emit, `None` to skip
fn classify(current: ResourceState, requested: ResourceState) -> Option<(ResourceState, ResourceState)> {
    if !current.contains(requested) {
        Some((current, requested))
    } else if requested == ResourceState::UNORDERED_ACCESS {
        Some((ResourceState::UNORDERED_ACCESS, ResourceState::UNORDERED_ACCESS))
    } else {
        None
    }
}

/// Build the barriers for a set of transitions and update every tracked state
///
/// Returns `None` when no barrier is needed. Not synchronized: a resource must
/// not be transitioned from two threads at once.
pub fn synthesize_barriers(
    queue_type: QueueType,
    buffers: &[BufferTransition<'_>],
    textures: &[TextureTransition<'_>],
) -> Option<BarrierBatch> {
    let mut batch = BarrierBatch::default();
    let mut src_access = AccessFlags::empty();
    let mut dst_access = AccessFlags::empty();

    for transition in buffers {
        let tracker = transition.buffer.state();
        let Some((old_state, new_state)) = classify(tracker.get(), transition.new_state) else {
            continue;
        };
        let barrier = BufferBarrier {
            buffer: transition.buffer.handle(),
            old_state,
            new_state,
            src_access: resource_state_to_access(old_state),
            dst_access: resource_state_to_access(new_state),
        };
        src_access |= barrier.src_access;
        dst_access |= barrier.dst_access;
        batch.buffer_barriers.push(barrier);
        tracker.set(new_state);
    }

    for transition in textures {
        let texture = transition.texture;
        let tracker = texture.state();
        let Some((old_state, new_state)) = classify(tracker.get(), transition.new_state) else {
            continue;
        };
        let barrier = TextureBarrier {
            image: texture.handles().image,
            old_state,
            new_state,
            src_access: resource_state_to_access(old_state),
            dst_access: resource_state_to_access(new_state),
            old_layout: resource_state_to_image_layout(old_state),
            new_layout: resource_state_to_image_layout(new_state),
            aspect: aspect_for_format(texture.format()),
            mip_levels: texture.mip_levels(),
            array_layers: texture.array_layers(),
        };
        src_access |= barrier.src_access;
        dst_access |= barrier.dst_access;
        batch.texture_barriers.push(barrier);
        tracker.set(new_state);
    }

    if batch.is_empty() {
        return None;
    }

    batch.src_stages = determine_pipeline_stages(src_access, queue_type);
    batch.dst_stages = determine_pipeline_stages(dst_access, queue_type);
    Some(batch)
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;
