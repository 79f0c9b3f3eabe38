//! Unit tests for root_signature.rs

use std::sync::Arc;

use serial_test::serial;

use crate::descriptor::DescriptorPool;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{
    BindingKind, DescriptorPoolDesc, DescriptorType, DeviceCapabilities, GraphicsDevice,
    PipelineType, SamplerDesc, ShaderReflection, ShaderResource, ShaderStageFlags,
    TextureDimension, TextureFormat,
};
use crate::log::{self, CaptureLogger, LogSeverity};
use crate::resource::{DefaultResources, Sampler};
use crate::root_signature::*;

const VS: ShaderStageFlags = ShaderStageFlags::VERTEX;
const FS: ShaderStageFlags = ShaderStageFlags::FRAGMENT;

struct Fixture {
    mock: Arc<MockGraphicsDevice>,
    device: Arc<dyn GraphicsDevice>,
    pool: Arc<DescriptorPool>,
    defaults: Arc<DefaultResources>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_pool(DescriptorPoolDesc::default())
    }

    fn with_pool(pool_desc: DescriptorPoolDesc) -> Self {
        let mock = Arc::new(MockGraphicsDevice::new());
        let device: Arc<dyn GraphicsDevice> = mock.clone();
        let pool = Arc::new(DescriptorPool::new(Arc::clone(&device), pool_desc).unwrap());
        let defaults = Arc::new(DefaultResources::new(&device, 1, 256, TextureFormat::R8G8B8A8_UNORM).unwrap());
        Self { mock, device, pool, defaults }
    }

    fn build(&self, shaders: &[&ShaderReflection]) -> crate::error::Result<Arc<RootSignature>> {
        self.build_with_samplers(shaders, &[])
    }

    fn build_with_samplers(
        &self,
        shaders: &[&ShaderReflection],
        static_samplers: &[StaticSampler],
    ) -> crate::error::Result<Arc<RootSignature>> {
        RootSignature::new(
            Arc::clone(&self.device),
            &DeviceCapabilities::default(),
            Arc::clone(&self.pool),
            Arc::clone(&self.defaults),
            &RootSignatureDesc { shaders, static_samplers },
        )
    }
}

fn res(name: &str, kind: DescriptorType, register: u32, set: u32, stages: ShaderStageFlags) -> ShaderResource {
    ShaderResource::new(name, kind, register, set, stages)
}

// ============================================================================
// MERGE
// ============================================================================

#[test]
fn test_shared_texture_unions_stages() {
    let fx = Fixture::new();
    let vs = ShaderReflection::new(VS, vec![res("uTex0", DescriptorType::Texture, 0, 1, VS)]);
    let fs = ShaderReflection::new(FS, vec![res("uTex0", DescriptorType::Texture, 0, 1, FS)]);

    let signature = fx.build(&[&vs, &fs]).unwrap();

    assert_eq!(signature.descriptors().len(), 1);
    let info = signature.descriptor_by_name("uTex0").unwrap();
    assert_eq!(info.stages, VS | FS);
    assert_eq!(info.update_frequency, UpdateFrequency::PerFrame);
    assert_eq!(info.binding_kind, Some(BindingKind::SampledImage));
    assert_eq!(signature.pipeline_type(), PipelineType::Graphics);

    let bucket = signature.bucket(UpdateFrequency::PerFrame);
    assert_eq!(bucket.bindings().len(), 1);
    assert_eq!(bucket.bindings()[0].stages, VS | FS);
}

#[test]
fn test_resource_without_stages_inherits_shader_stages() {
    let merged = merge_resources(&[&ShaderReflection::new(
        FS,
        vec![res("uColor", DescriptorType::UniformBuffer, 0, 0, ShaderStageFlags::empty())],
    )])
    .unwrap();
    assert_eq!(merged[0].used_stages, FS);
}

#[test]
fn test_root_constants_forced_to_set_zero() {
    let merged = merge_resources(&[&ShaderReflection::new(
        VS,
        vec![res("pc", DescriptorType::RootConstant, 0, 3, VS).with_size(16)],
    )])
    .unwrap();
    assert_eq!(merged[0].set, 0);
}

#[test]
#[serial]
fn test_conflicting_register_fails_before_backend_work() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());

    let fx = Fixture::new();
    let layouts_before = fx.mock.state().layouts.len();
    let vs = ShaderReflection::new(VS, vec![res("uTex0", DescriptorType::Texture, 0, 1, VS)]);
    let fs = ShaderReflection::new(FS, vec![res("uTex0", DescriptorType::Texture, 2, 1, FS)]);

    let result = fx.build(&[&vs, &fs]);

    log::reset_logger();

    assert_eq!(
        result.unwrap_err(),
        Error::ConflictingBinding {
            name: "uTex0".to_string(),
            first: (0, 1),
            second: (2, 1),
        }
    );
    let state = fx.mock.state();
    assert_eq!(state.layouts.len(), layouts_before);
    assert!(state.pipeline_layouts.is_empty());
    assert!(capture
        .messages(LogSeverity::Error)
        .iter()
        .any(|m| m.contains("'uTex0' reflected at register 0 set 1 and register 2 set 1")));
}

#[test]
fn test_conflicting_set_fails() {
    let fx = Fixture::new();
    let vs = ShaderReflection::new(VS, vec![res("uData", DescriptorType::Buffer, 1, 0, VS)]);
    let fs = ShaderReflection::new(FS, vec![res("uData", DescriptorType::Buffer, 1, 2, FS)]);
    assert!(matches!(fx.build(&[&vs, &fs]), Err(Error::ConflictingBinding { .. })));
}

// ============================================================================
// BUCKETS
// ============================================================================

#[test]
fn test_bucket_order_descending_kind_then_register() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        VS | FS,
        vec![
            res("uSampler", DescriptorType::Sampler, 0, 0, FS),
            res("uTexA", DescriptorType::Texture, 1, 0, FS),
            res("uTexB", DescriptorType::Texture, 4, 0, FS),
            res("uCamera", DescriptorType::UniformBuffer, 2, 0, VS),
            res("uInstances", DescriptorType::Buffer, 3, 0, VS),
        ],
    );
    let signature = fx.build(&[&shader]).unwrap();
    let bucket = signature.bucket(UpdateFrequency::None);

    let order: Vec<(BindingKind, u32)> = bucket.bindings().iter().map(|b| (b.kind, b.binding)).collect();
    assert_eq!(
        order,
        vec![
            (BindingKind::StorageBuffer, 3),
            (BindingKind::UniformBuffer, 2),
            (BindingKind::SampledImage, 4),
            (BindingKind::SampledImage, 1),
            (BindingKind::Sampler, 0),
        ]
    );
    for pair in bucket.bindings().windows(2) {
        assert!((pair[0].kind, pair[0].binding) >= (pair[1].kind, pair[1].binding));
    }

    let handle = |name: &str| signature.descriptor_by_name(name).unwrap().handle_index;
    assert_eq!(handle("uInstances"), Some(0));
    assert_eq!(handle("uCamera"), Some(1));
    assert_eq!(handle("uTexB"), Some(2));
    assert_eq!(handle("uTexA"), Some(3));
    assert_eq!(handle("uSampler"), Some(4));
    assert_eq!(bucket.element_count(), 5);
}

#[test]
fn test_array_sizes_accumulate_handle_indices() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        FS,
        vec![
            res("uTextures", DescriptorType::Texture, 0, 2, FS).with_size(8),
            res("uLights", DescriptorType::Buffer, 1, 2, FS),
        ],
    );
    let signature = fx.build(&[&shader]).unwrap();
    let bucket = signature.bucket(UpdateFrequency::PerBatch);
    assert_eq!(signature.descriptor_by_name("uLights").unwrap().handle_index, Some(0));
    assert_eq!(signature.descriptor_by_name("uTextures").unwrap().handle_index, Some(1));
    assert_eq!(bucket.element_count(), 9);
    assert_eq!(bucket.default_data(0).len(), 9);
}

#[test]
fn test_placeholder_layouts_fill_gaps() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        VS,
        vec![
            res("uGlobals", DescriptorType::UniformBuffer, 0, 0, VS),
            res("uObject", DescriptorType::UniformBuffer, 0, 3, VS),
        ],
    );
    let signature = fx.build(&[&shader]).unwrap();

    for frequency in [UpdateFrequency::PerFrame, UpdateFrequency::PerBatch] {
        let bucket = signature.bucket(frequency);
        assert!(bucket.is_placeholder());
        assert!(bucket.layout().is_some());
        assert!(bucket.update_template().is_none());
        assert!(bucket.empty_set().is_some());
    }
    assert!(!signature.bucket(UpdateFrequency::PerDraw).is_placeholder());

    let state = fx.mock.state();
    let (_, layout_desc) = state
        .pipeline_layouts
        .iter()
        .find(|(handle, _)| *handle == signature.pipeline_layout())
        .unwrap();
    assert_eq!(layout_desc.set_layouts.len(), 4);
}

#[test]
fn test_no_placeholders_above_highest_bucket() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(VS, vec![res("uObject", DescriptorType::UniformBuffer, 0, 1, VS)]);
    let signature = fx.build(&[&shader]).unwrap();

    assert!(signature.bucket(UpdateFrequency::None).is_placeholder());
    assert!(signature.bucket(UpdateFrequency::PerBatch).layout().is_none());
    assert!(signature.bucket(UpdateFrequency::PerDraw).layout().is_none());
}

#[test]
fn test_set_index_out_of_range_fails() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(VS, vec![res("uFar", DescriptorType::UniformBuffer, 0, 4, VS)]);
    assert!(matches!(fx.build(&[&shader]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_unbounded_array_rejected() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(FS, vec![res("uBindless", DescriptorType::Texture, 0, 0, FS).with_size(0)]);
    assert!(matches!(fx.build(&[&shader]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_failed_build_releases_created_objects() {
    // Empty-set allocation runs last; a zero-capacity pool that cannot grow fails it
    let fx = Fixture::with_pool(DescriptorPoolDesc { max_sets: 0, ..Default::default() });
    fx.mock.state().fail_next_pool = true;
    let shader = ShaderReflection::new(
        VS,
        vec![
            res("uGlobals", DescriptorType::UniformBuffer, 0, 0, VS),
            res("uObject", DescriptorType::UniformBuffer, 0, 2, VS),
        ],
    );

    assert!(fx.build(&[&shader]).is_err());

    let state = fx.mock.state();
    assert_eq!(state.layouts.len(), 3);
    assert_eq!(state.destroyed_count("descriptor_set_layout"), 3);
    assert_eq!(state.destroyed_count("update_template"), state.templates.len());
    assert_eq!(state.destroyed_count("pipeline_layout"), 1);
}

// ============================================================================
// SPECIAL DESCRIPTORS
// ============================================================================

#[test]
#[serial]
fn test_root_cbv_promoted_to_dynamic() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());

    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        VS,
        vec![
            res("uRootCbvObject", DescriptorType::UniformBuffer, 1, 3, VS),
            res("rootcbvBones", DescriptorType::UniformBuffer, 0, 3, VS).with_size(4),
            res("ROOTCBV_Camera", DescriptorType::UniformBuffer, 2, 3, VS),
        ],
    );
    let signature = fx.build(&[&shader]).unwrap();

    log::reset_logger();

    let object = signature.descriptor_by_name("uRootCbvObject").unwrap();
    let camera = signature.descriptor_by_name("ROOTCBV_Camera").unwrap();
    let bones = signature.descriptor_by_name("rootcbvBones").unwrap();
    assert_eq!(object.binding_kind, Some(BindingKind::UniformBufferDynamic));
    assert_eq!(camera.binding_kind, Some(BindingKind::UniformBufferDynamic));
    assert_eq!(bones.binding_kind, Some(BindingKind::UniformBuffer));
    assert_eq!(bones.dynamic_index, None);

    // Descending register order
    assert_eq!(camera.dynamic_index, Some(0));
    assert_eq!(object.dynamic_index, Some(1));
    assert_eq!(signature.bucket(UpdateFrequency::PerDraw).dynamic_count(), 2);

    let infos = capture.messages(LogSeverity::Info);
    assert!(infos.contains(&"Descriptor 'uRootCbvObject': using dynamic uniform buffer".to_string()));
    assert!(infos.contains(&"Descriptor 'ROOTCBV_Camera': using dynamic uniform buffer".to_string()));
    assert!(capture
        .messages(LogSeverity::Error)
        .iter()
        .any(|m| m.starts_with("Descriptor 'rootcbvBones': dynamic uniform buffers cannot be arrays")));
}

#[test]
fn test_static_sampler_is_immutable_and_not_updatable() {
    let fx = Fixture::new();
    let sampler = Sampler::new(Arc::clone(&fx.device), &SamplerDesc::default(), 99).unwrap();
    let shader = ShaderReflection::new(
        FS,
        vec![
            res("uLinear", DescriptorType::Sampler, 0, 0, FS),
            res("uAlbedo", DescriptorType::Texture, 1, 0, FS),
        ],
    );

    let signature = fx
        .build_with_samplers(&[&shader], &[StaticSampler { name: "uLinear", sampler: &sampler }])
        .unwrap();

    let info = signature.descriptor_by_name("uLinear").unwrap();
    assert!(info.is_static_sampler);
    assert!(!info.is_updatable());

    let bucket = signature.bucket(UpdateFrequency::None);
    let binding = bucket.bindings().iter().find(|b| b.kind == BindingKind::Sampler).unwrap();
    assert_eq!(binding.immutable_samplers, vec![sampler.handle()]);
    assert_eq!(bucket.element_count(), 1);

    let state = fx.mock.state();
    let (_, template) = state.templates.last().unwrap();
    assert_eq!(template.entries.len(), 1);
    assert_eq!(template.entries[0].kind, BindingKind::SampledImage);
}

#[test]
fn test_root_constants_become_push_constant_ranges() {
    let fx = Fixture::new();
    let vs = ShaderReflection::new(VS, vec![res("pcDraw", DescriptorType::RootConstant, 0, 0, VS).with_size(64)]);
    let fs = ShaderReflection::new(FS, vec![res("pcDraw", DescriptorType::RootConstant, 0, 0, FS).with_size(64)]);
    let signature = fx.build(&[&vs, &fs]).unwrap();

    let info = signature.descriptor_by_name("pcDraw").unwrap();
    assert!(info.is_root_constant());
    let range = signature.push_constant_ranges()[info.push_constant_index.unwrap() as usize];
    assert_eq!(range.stages, VS | FS);
    assert_eq!((range.offset, range.size), (0, 64));
    assert!(signature.buckets().iter().all(|bucket| bucket.layout().is_none()));
}

#[test]
fn test_root_constants_per_stage_get_own_ranges() {
    let fx = Fixture::new();
    let vs = ShaderReflection::new(VS, vec![res("pcVertex", DescriptorType::RootConstant, 0, 0, VS).with_size(64)]);
    let fs = ShaderReflection::new(FS, vec![res("pcPixel", DescriptorType::RootConstant, 0, 0, FS).with_size(16)]);
    let signature = fx.build(&[&vs, &fs]).unwrap();

    let ranges = signature.push_constant_ranges();
    assert_eq!(ranges.len(), 2);
    let pixel = signature.descriptor_by_name("pcPixel").unwrap();
    let range = ranges[pixel.push_constant_index.unwrap() as usize];
    assert_eq!((range.stages, range.offset, range.size), (FS, 0, 16));
}

#[test]
fn test_root_constants_sharing_a_stage_rejected() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        VS,
        vec![
            res("pcA", DescriptorType::RootConstant, 0, 0, VS).with_size(16),
            res("pcB", DescriptorType::RootConstant, 1, 0, VS).with_size(16),
        ],
    );
    assert!(matches!(fx.build(&[&shader]), Err(Error::InvalidResource(_))));
    assert!(fx.mock.state().pipeline_layouts.is_empty());
}

#[test]
fn test_oversized_root_constant_rejected() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(VS, vec![res("pcHuge", DescriptorType::RootConstant, 0, 0, VS).with_size(512)]);
    assert!(matches!(fx.build(&[&shader]), Err(Error::InvalidResource(_))));
}

#[test]
fn test_compute_only_signature() {
    let fx = Fixture::new();
    let cs = ShaderReflection::new(
        ShaderStageFlags::COMPUTE,
        vec![res("uOutput", DescriptorType::RwTexture, 0, 0, ShaderStageFlags::COMPUTE)
            .with_dimension(TextureDimension::Dim2DArray)],
    );
    let signature = fx.build(&[&cs]).unwrap();
    assert_eq!(signature.pipeline_type(), PipelineType::Compute);

    let info = signature.descriptor_by_name("uOutput").unwrap();
    assert_eq!(info.binding_kind, Some(BindingKind::StorageImage));
    let expected = fx
        .defaults
        .node(0)
        .update_data(BindingKind::StorageImage, TextureDimension::Dim2DArray);
    assert_eq!(signature.bucket(UpdateFrequency::None).default_data(0), &[expected]);
}

#[test]
fn test_descriptor_index_lookup() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        VS,
        vec![
            res("uA", DescriptorType::UniformBuffer, 0, 0, VS),
            res("uB", DescriptorType::UniformBuffer, 1, 0, VS),
        ],
    );
    let signature = fx.build(&[&shader]).unwrap();
    let index = signature.descriptor_index("uB").unwrap();
    assert_eq!(index.value(), 1);
    assert_eq!(signature.descriptor(index).unwrap().name, "uB");
    assert!(signature.descriptor_index("uMissing").is_none());
}

#[test]
fn test_drop_releases_backend_objects() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(
        VS,
        vec![
            res("uGlobals", DescriptorType::UniformBuffer, 0, 0, VS),
            res("uObject", DescriptorType::UniformBuffer, 0, 2, VS),
        ],
    );
    let signature = fx.build(&[&shader]).unwrap();
    let pipeline_layout = signature.pipeline_layout();
    drop(signature);

    let state = fx.mock.state();
    assert!(state.destroyed.contains(&("pipeline_layout", pipeline_layout)));
    assert_eq!(state.destroyed_count("descriptor_set_layout"), 3);
    assert_eq!(state.destroyed_count("update_template"), 2);
}

#[test]
fn test_signature_ids_are_unique() {
    let fx = Fixture::new();
    let shader = ShaderReflection::new(VS, vec![res("uA", DescriptorType::UniformBuffer, 0, 0, VS)]);
    let a = fx.build(&[&shader]).unwrap();
    let b = fx.build(&[&shader]).unwrap();
    assert_ne!(a.id(), b.id());
}
