/// Unit tests for MockGraphicsDevice and MockCommandList.

use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    BindingKind, BufferDesc, BufferUsage, CommandList, DescriptorAllocError, DescriptorPoolDesc,
    DescriptorSetLayoutDesc, GraphicsDevice, LayoutBinding, QueueType, RawHandle,
    RenderTargetDesc, ShaderStageFlags, TextureDesc, TextureFormat, TextureUsage,
};

// ============================================================================
// MockGraphicsDevice Tests
// ============================================================================

#[test]
fn test_mock_handles_are_unique_and_non_null() {
    let device = MockGraphicsDevice::new();
    let a = device.create_sampler(&Default::default()).unwrap();
    let b = device.create_sampler(&Default::default()).unwrap();
    assert_ne!(a, b);
    assert!(!a.is_null());
    assert!(!b.is_null());
}

#[test]
fn test_mock_buffer_texel_views() {
    let device = MockGraphicsDevice::new();
    let handles = device
        .create_buffer(&BufferDesc {
            size: 64,
            usage: BufferUsage::UNIFORM_TEXEL | BufferUsage::STORAGE_TEXEL,
            texel_format: Some(TextureFormat::R32_UINT),
            ..Default::default()
        })
        .unwrap();
    assert!(handles.uniform_texel_view.is_some());
    assert!(handles.storage_texel_view.is_some());

    let plain = device
        .create_buffer(&BufferDesc { size: 64, ..Default::default() })
        .unwrap();
    assert!(plain.uniform_texel_view.is_none());
}

#[test]
fn test_mock_zero_sized_buffer_fails() {
    let device = MockGraphicsDevice::new();
    assert!(device.create_buffer(&BufferDesc::default()).is_err());
}

#[test]
fn test_mock_texture_uav_per_mip() {
    let device = MockGraphicsDevice::new();
    let handles = device
        .create_texture(&TextureDesc {
            mip_levels: 3,
            usage: TextureUsage::SAMPLED | TextureUsage::STORAGE,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(handles.uav_mips.len(), 3);
}

#[test]
fn test_mock_render_target_views() {
    let device = MockGraphicsDevice::new();
    let handles = device
        .create_render_target(&RenderTargetDesc {
            mip_levels: 2,
            array_layers: 3,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(handles.views.mip_views.len(), 2);
    assert_eq!(handles.views.slice_views.len(), 6);
}

#[test]
fn test_mock_pool_capacity() {
    let device = MockGraphicsDevice::new();
    let pool = device
        .create_descriptor_pool(&DescriptorPoolDesc { max_sets: 4, pool_sizes: Vec::new() })
        .unwrap();
    let layout = device
        .create_descriptor_set_layout(&DescriptorSetLayoutDesc {
            bindings: vec![LayoutBinding {
                binding: 0,
                kind: BindingKind::UniformBuffer,
                count: 1,
                stages: ShaderStageFlags::VERTEX,
                immutable_samplers: Vec::new(),
            }],
        })
        .unwrap();

    let sets = device.allocate_descriptor_sets(pool, &[layout; 3]).unwrap();
    assert_eq!(sets.len(), 3);
    assert_eq!(
        device.allocate_descriptor_sets(pool, &[layout; 2]),
        Err(DescriptorAllocError::OutOfPoolMemory)
    );
    assert_eq!(device.allocate_descriptor_sets(pool, &[layout]).unwrap().len(), 1);
}

#[test]
fn test_mock_unknown_pool_is_backend_error() {
    let device = MockGraphicsDevice::new();
    let result = device.allocate_descriptor_sets(RawHandle(9999), &[RawHandle(1)]);
    assert!(matches!(result, Err(DescriptorAllocError::Backend(_))));
}

#[test]
fn test_mock_injected_layout_failure() {
    let device = MockGraphicsDevice::new();
    device.state().fail_next_layout = true;
    assert!(device.create_descriptor_set_layout(&Default::default()).is_err());
    assert!(device.create_descriptor_set_layout(&Default::default()).is_ok());
}

#[test]
fn test_mock_records_destruction() {
    let device = MockGraphicsDevice::new();
    device.destroy_render_pass(RawHandle(5));
    device.destroy_framebuffer(RawHandle(6));
    let state = device.state();
    assert_eq!(state.destroyed_count("render_pass"), 1);
    assert_eq!(state.destroyed_count("framebuffer"), 1);
}

// ============================================================================
// MockCommandList Tests
// ============================================================================

#[test]
fn test_mock_command_list_begin_end() {
    let mut cmd_list = MockCommandList::new(QueueType::Graphics);
    cmd_list.begin().unwrap();
    cmd_list.end().unwrap();

    let commands = cmd_list.commands.lock().unwrap();
    assert_eq!(*commands, vec![MockCommand::Begin, MockCommand::End]);
}

#[test]
fn test_mock_command_list_shared_log() {
    let device = MockGraphicsDevice::new();
    let mut list = device.create_command_list(QueueType::Compute, 0).unwrap();
    assert_eq!(list.queue_type(), QueueType::Compute);
    list.end_render_pass();

    let log = device.last_command_log();
    assert_eq!(*log.lock().unwrap(), vec![MockCommand::EndRenderPass]);
}
