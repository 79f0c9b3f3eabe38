//! Unit tests for barrier.rs
//!
//! Exercises the subset rule, the UAV hazard exception, batching and the
//! stage selection per queue type against the mock device.

use std::sync::Arc;

use crate::barrier::*;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{
    BufferDesc, BufferUsage, GraphicsDevice, QueueType, TextureDesc, TextureFormat, TextureUsage,
};
use crate::resource::{Buffer, ResourceState, Texture};

fn device() -> Arc<dyn GraphicsDevice> {
    Arc::new(MockGraphicsDevice::new())
}

fn buffer(device: &Arc<dyn GraphicsDevice>, start: ResourceState) -> Buffer {
    let desc = BufferDesc {
        size: 256,
        usage: BufferUsage::UNIFORM | BufferUsage::STORAGE,
        start_state: start,
        ..Default::default()
    };
    Buffer::new(Arc::clone(device), &desc, 1).unwrap()
}

fn texture(device: &Arc<dyn GraphicsDevice>, format: TextureFormat) -> Texture {
    let desc = TextureDesc {
        width: 64,
        height: 64,
        mip_levels: 4,
        format,
        usage: TextureUsage::SAMPLED | TextureUsage::STORAGE,
        ..Default::default()
    };
    Texture::new(Arc::clone(device), &desc, 2).unwrap()
}

// ============================================================================
// SUBSET RULE
// ============================================================================

#[test]
fn test_first_transition_emits_and_updates_state() {
    let device = device();
    let buf = buffer(&device, ResourceState::COPY_DEST);

    let batch = synthesize_barriers(
        QueueType::Graphics,
        &[BufferTransition::new(&buf, ResourceState::UNIFORM_READ)],
        &[],
    )
    .unwrap();

    assert_eq!(batch.buffer_barriers.len(), 1);
    let barrier = batch.buffer_barriers[0];
    assert_eq!(barrier.old_state, ResourceState::COPY_DEST);
    assert_eq!(barrier.new_state, ResourceState::UNIFORM_READ);
    assert_eq!(barrier.src_access, AccessFlags::TRANSFER_WRITE);
    assert_eq!(
        barrier.dst_access,
        AccessFlags::UNIFORM_READ | AccessFlags::VERTEX_ATTRIBUTE_READ
    );
    assert_eq!(buf.current_state(), ResourceState::UNIFORM_READ);
}

#[test]
fn test_repeated_transition_is_elided() {
    let device = device();
    let tex = texture(&device, TextureFormat::R8G8B8A8_UNORM);

    let first = synthesize_barriers(
        QueueType::Graphics,
        &[],
        &[TextureTransition::new(&tex, ResourceState::SHADER_RESOURCE)],
    );
    let second = synthesize_barriers(
        QueueType::Graphics,
        &[],
        &[TextureTransition::new(&tex, ResourceState::SHADER_RESOURCE)],
    );

    assert_eq!(first.map(|b| b.len()), Some(1));
    assert!(second.is_none());
    assert_eq!(tex.current_state(), ResourceState::SHADER_RESOURCE);
}

#[test]
fn test_subset_of_combined_state_is_elided() {
    let device = device();
    let buf = buffer(&device, ResourceState::GENERIC_READ);

    let batch = synthesize_barriers(
        QueueType::Graphics,
        &[BufferTransition::new(&buf, ResourceState::INDEX_BUFFER)],
        &[],
    );

    assert!(batch.is_none());
    assert_eq!(buf.current_state(), ResourceState::GENERIC_READ);
}

#[test]
fn test_uav_to_uav_always_emits_hazard_barrier() {
    let device = device();
    let buf = buffer(&device, ResourceState::UNORDERED_ACCESS);

    for _ in 0..3 {
        let batch = synthesize_barriers(
            QueueType::Compute,
            &[BufferTransition::new(&buf, ResourceState::UNORDERED_ACCESS)],
            &[],
        )
        .unwrap();
        let barrier = batch.buffer_barriers[0];
        let rw = AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE;
        assert_eq!(barrier.src_access, rw);
        assert_eq!(barrier.dst_access, rw);
        assert_eq!(batch.src_stages, PipelineStageFlags::COMPUTE_SHADER);
    }
}

#[test]
fn test_uav_hazard_on_texture_keeps_general_layout() {
    let device = device();
    let tex = texture(&device, TextureFormat::R32_SFLOAT);
    synthesize_barriers(
        QueueType::Graphics,
        &[],
        &[TextureTransition::new(&tex, ResourceState::UNORDERED_ACCESS)],
    );

    let batch = synthesize_barriers(
        QueueType::Graphics,
        &[],
        &[TextureTransition::new(&tex, ResourceState::UNORDERED_ACCESS)],
    )
    .unwrap();
    let barrier = batch.texture_barriers[0];
    assert_eq!(barrier.old_layout, ImageLayout::General);
    assert_eq!(barrier.new_layout, ImageLayout::General);
}

#[test]
fn test_texture_lifecycle_emits_three_barriers() {
    let device = device();
    let tex = texture(&device, TextureFormat::B8G8R8A8_UNORM);
    let hops = [
        (ResourceState::RENDER_TARGET, ImageLayout::Undefined, ImageLayout::ColorAttachment),
        (ResourceState::SHADER_RESOURCE, ImageLayout::ColorAttachment, ImageLayout::ShaderReadOnly),
        (ResourceState::PRESENT, ImageLayout::ShaderReadOnly, ImageLayout::Present),
    ];

    let mut emitted = Vec::new();
    let mut previous = ResourceState::UNDEFINED;
    for (state, old_layout, new_layout) in hops {
        let batch = synthesize_barriers(QueueType::Graphics, &[], &[TextureTransition::new(&tex, state)]).unwrap();
        assert_eq!(batch.texture_barriers.len(), 1);
        let barrier = batch.texture_barriers[0];
        assert_eq!((barrier.old_state, barrier.new_state), (previous, state));
        assert_eq!((barrier.old_layout, barrier.new_layout), (old_layout, new_layout));
        assert_eq!(barrier.mip_levels, 4);
        emitted.push(barrier);
        previous = state;
    }
    assert_eq!(emitted.len(), 3);
}

// ============================================================================
// BATCHING
// ============================================================================

#[test]
fn test_mixed_batch_unions_stage_masks() {
    let device = device();
    let buf = buffer(&device, ResourceState::UNDEFINED);
    let depth = texture(&device, TextureFormat::D24_UNORM_S8_UINT);

    let batch = synthesize_barriers(
        QueueType::Graphics,
        &[BufferTransition::new(&buf, ResourceState::INDEX_BUFFER)],
        &[TextureTransition::new(&depth, ResourceState::DEPTH_WRITE)],
    )
    .unwrap();

    assert_eq!(batch.buffer_barriers.len(), 1);
    assert_eq!(batch.texture_barriers.len(), 1);
    assert_eq!(batch.src_stages, PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(
        batch.dst_stages,
        PipelineStageFlags::VERTEX_INPUT
            | PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | PipelineStageFlags::LATE_FRAGMENT_TESTS
    );
    assert_eq!(
        batch.texture_barriers[0].aspect,
        TextureAspect::DEPTH | TextureAspect::STENCIL
    );
}

#[test]
fn test_only_needed_entries_are_batched() {
    let device = device();
    let stays = buffer(&device, ResourceState::UNIFORM_READ);
    let moves = buffer(&device, ResourceState::COPY_DEST);

    let batch = synthesize_barriers(
        QueueType::Graphics,
        &[
            BufferTransition::new(&stays, ResourceState::UNIFORM_READ),
            BufferTransition::new(&moves, ResourceState::UNIFORM_READ),
        ],
        &[],
    )
    .unwrap();
    assert_eq!(batch.buffer_barriers.len(), 1);
    assert_eq!(batch.buffer_barriers[0].buffer, moves.handle());
}

// ============================================================================
// STAGE SELECTION
// ============================================================================

#[test]
fn test_transfer_queue_uses_all_commands() {
    let stages = determine_pipeline_stages(AccessFlags::TRANSFER_WRITE, QueueType::Transfer);
    assert_eq!(stages, PipelineStageFlags::ALL_COMMANDS);
}

#[test]
fn test_compute_queue_escalates_graphics_access() {
    let stages = determine_pipeline_stages(
        AccessFlags::SHADER_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        QueueType::Compute,
    );
    assert_eq!(stages, PipelineStageFlags::ALL_COMMANDS);
}

#[test]
fn test_compute_queue_narrows_shader_access() {
    let stages = determine_pipeline_stages(
        AccessFlags::SHADER_READ | AccessFlags::TRANSFER_READ,
        QueueType::Compute,
    );
    assert_eq!(stages, PipelineStageFlags::COMPUTE_SHADER | PipelineStageFlags::TRANSFER);
}

#[test]
fn test_graphics_queue_shader_access() {
    let stages = determine_pipeline_stages(AccessFlags::SHADER_READ, QueueType::Graphics);
    assert_eq!(
        stages,
        PipelineStageFlags::VERTEX_SHADER
            | PipelineStageFlags::FRAGMENT_SHADER
            | PipelineStageFlags::COMPUTE_SHADER
    );
}

#[test]
fn test_indirect_and_host_bits() {
    let stages = determine_pipeline_stages(
        AccessFlags::INDIRECT_COMMAND_READ | AccessFlags::HOST_READ,
        QueueType::Graphics,
    );
    assert_eq!(stages, PipelineStageFlags::DRAW_INDIRECT | PipelineStageFlags::HOST);
}

#[test]
fn test_empty_access_is_top_of_pipe() {
    let stages = determine_pipeline_stages(AccessFlags::empty(), QueueType::Graphics);
    assert_eq!(stages, PipelineStageFlags::TOP_OF_PIPE);
}

// ============================================================================
// STATE MAPPINGS
// ============================================================================

#[test]
fn test_state_to_layout_mapping() {
    assert_eq!(resource_state_to_image_layout(ResourceState::COPY_SOURCE), ImageLayout::TransferSrc);
    assert_eq!(resource_state_to_image_layout(ResourceState::COPY_DEST), ImageLayout::TransferDst);
    assert_eq!(resource_state_to_image_layout(ResourceState::DEPTH_WRITE), ImageLayout::DepthStencilAttachment);
    assert_eq!(resource_state_to_image_layout(ResourceState::DEPTH_READ), ImageLayout::DepthStencilReadOnly);
    assert_eq!(
        resource_state_to_image_layout(ResourceState::PIXEL_SHADER_RESOURCE),
        ImageLayout::ShaderReadOnly
    );
    assert_eq!(resource_state_to_image_layout(ResourceState::COMMON), ImageLayout::General);
    assert_eq!(resource_state_to_image_layout(ResourceState::INDEX_BUFFER), ImageLayout::Undefined);
}

#[test]
fn test_state_to_access_mapping() {
    assert_eq!(resource_state_to_access(ResourceState::UNDEFINED), AccessFlags::empty());
    assert_eq!(resource_state_to_access(ResourceState::PRESENT), AccessFlags::MEMORY_READ);
    assert_eq!(
        resource_state_to_access(ResourceState::INDIRECT_ARGUMENT),
        AccessFlags::INDIRECT_COMMAND_READ
    );
    assert_eq!(
        resource_state_to_access(ResourceState::RENDER_TARGET),
        AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE
    );
}
