//! Root signature - the complete binding layout of a pipeline
//!
//! Built once from the reflection of every shader stage that shares it:
//!
//! 1. Resources are merged by name; a name seen twice must keep its register
//!    and set, its stage masks are unioned.
//! 2. Each non-constant resource lands in the bucket of its update
//!    frequency (set index). Root constants become push constant ranges.
//! 3. Bindings inside a bucket are sorted by descending binding kind, then by
//!    descending register, and receive cumulative handle indices.
//! 4. Empty buckets below the highest used one get a placeholder layout and
//!    a pre-allocated empty set, so the pipeline layout has no gaps.
//!
//! The signature is shared (`Arc`) by every descriptor set allocated against
//! it; backend objects are released when the last reference drops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::descriptor::DescriptorPool;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingKind, DescriptorSetLayoutDesc, DescriptorType, DescriptorUpdateData, DeviceCapabilities,
    GraphicsDevice, LayoutBinding, PipelineLayoutDesc, PipelineType, PushConstantRange, RawHandle,
    ShaderReflection, ShaderResource, ShaderStageFlags, TextureDimension, UpdateTemplateDesc,
    UpdateTemplateEntry,
};
use crate::resource::{DefaultResources, Sampler};
use crate::{prism_debug, prism_error, prism_info, prism_warn};

const SOURCE: &str = "prism::root_signature";

/// Names containing this marker (case-insensitive) are bound as dynamic uniform buffers
const ROOT_CBV_MARKER: &str = "rootcbv";

/// Number of update frequencies, and of descriptor sets per pipeline
pub const MAX_DESCRIPTOR_SETS: usize = 4;

static NEXT_ROOT_SIGNATURE_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// PUBLIC TYPES
// ============================================================================

/// How often a group of descriptors changes; equal to its set index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum UpdateFrequency {
    #[default]
    None = 0,
    PerFrame = 1,
    PerBatch = 2,
    PerDraw = 3,
}

impl UpdateFrequency {
    pub const ALL: [UpdateFrequency; MAX_DESCRIPTOR_SETS] = [
        UpdateFrequency::None,
        UpdateFrequency::PerFrame,
        UpdateFrequency::PerBatch,
        UpdateFrequency::PerDraw,
    ];

    pub fn from_set(set: u32) -> Option<Self> {
        Self::ALL.get(set as usize).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Sampler baked into the layout under a shader resource name
#[derive(Clone, Copy)]
pub struct StaticSampler<'a> {
    pub name: &'a str,
    pub sampler: &'a Sampler,
}

/// Root signature creation parameters
#[derive(Clone, Copy, Default)]
pub struct RootSignatureDesc<'a> {
    pub shaders: &'a [&'a ShaderReflection],
    pub static_samplers: &'a [StaticSampler<'a>],
}

/// Position of a descriptor in `RootSignature::descriptors`
///
/// Resolve names once with `RootSignature::descriptor_index` and reuse the
/// index on hot paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorIndex(pub(crate) u32);

impl DescriptorIndex {
    pub fn value(self) -> u32 {
        self.0
    }
}

/// One merged shader resource
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorInfo {
    pub name: String,
    pub register: u32,
    pub set: u32,
    /// Array size, or byte size for root constants
    pub size: u32,
    pub stages: ShaderStageFlags,
    pub descriptor_type: DescriptorType,
    pub dimension: TextureDimension,
    pub update_frequency: UpdateFrequency,
    /// Backend binding kind (`None` for root constants)
    pub binding_kind: Option<BindingKind>,
    /// First element in the bucket's update data (`None` for static samplers and root constants)
    pub handle_index: Option<u32>,
    /// Slot in the bucket's dynamic offset list
    pub dynamic_index: Option<u32>,
    /// Slot in `RootSignature::push_constant_ranges`
    pub push_constant_index: Option<u32>,
    pub is_static_sampler: bool,
}

impl DescriptorInfo {
    pub fn is_root_constant(&self) -> bool {
        self.push_constant_index.is_some()
    }

    /// Written through descriptor set updates
    pub fn is_updatable(&self) -> bool {
        self.handle_index.is_some()
    }
}

/// Everything one update frequency (set index) needs
#[derive(Debug, Default)]
pub struct DescriptorBucket {
    pub(crate) layout: Option<RawHandle>,
    pub(crate) is_placeholder: bool,
    pub(crate) update_template: Option<RawHandle>,
    /// Sorted binding order, static samplers included
    pub(crate) descriptors: Vec<DescriptorIndex>,
    pub(crate) bindings: Vec<LayoutBinding>,
    /// Total updatable elements (length of the update data)
    pub(crate) element_count: u32,
    /// Dynamic uniform buffers in dynamic index order
    pub(crate) dynamic_descriptors: Vec<DescriptorIndex>,
    /// Initial update data per GPU node
    pub(crate) default_data: Vec<Vec<DescriptorUpdateData>>,
    /// Pre-allocated set bound for placeholder buckets
    pub(crate) empty_set: Option<RawHandle>,
}

impl DescriptorBucket {
    pub fn layout(&self) -> Option<RawHandle> {
        self.layout
    }

    pub fn is_placeholder(&self) -> bool {
        self.is_placeholder
    }

    pub fn update_template(&self) -> Option<RawHandle> {
        self.update_template
    }

    pub fn descriptors(&self) -> &[DescriptorIndex] {
        &self.descriptors
    }

    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn dynamic_count(&self) -> u32 {
        self.dynamic_descriptors.len() as u32
    }

    pub fn empty_set(&self) -> Option<RawHandle> {
        self.empty_set
    }

    pub(crate) fn default_data(&self, node_index: u32) -> &[DescriptorUpdateData] {
        self.default_data
            .get(node_index as usize)
            .or_else(|| self.default_data.first())
            .map_or(&[], Vec::as_slice)
    }
}

// ============================================================================
// ROOT SIGNATURE
// ============================================================================

/// Binding layout shared by pipelines and descriptor sets
pub struct RootSignature {
    id: u64,
    pipeline_type: PipelineType,
    descriptors: Vec<DescriptorInfo>,
    name_to_index: FxHashMap<String, DescriptorIndex>,
    buckets: [DescriptorBucket; MAX_DESCRIPTOR_SETS],
    push_constants: Vec<PushConstantRange>,
    pipeline_layout: RawHandle,
    max_uniform_buffer_range: u64,
    pool: Arc<DescriptorPool>,
    defaults: Arc<DefaultResources>,
    device: Arc<dyn GraphicsDevice>,
}

impl RootSignature {
    /// Build the signature for `desc`
    ///
    /// Reflection conflicts are detected before any backend object is
    /// created. Backend objects created before a later failure are released.
    pub(crate) fn new(
        device: Arc<dyn GraphicsDevice>,
        capabilities: &DeviceCapabilities,
        pool: Arc<DescriptorPool>,
        defaults: Arc<DefaultResources>,
        desc: &RootSignatureDesc,
    ) -> Result<Arc<Self>> {
        let merged = merge_resources(desc.shaders)?;

        let all_stages = desc
            .shaders
            .iter()
            .fold(ShaderStageFlags::empty(), |acc, shader| acc | shader.stages);
        let pipeline_type = if all_stages == ShaderStageFlags::COMPUTE {
            PipelineType::Compute
        } else {
            PipelineType::Graphics
        };

        let mut signature = Self {
            id: NEXT_ROOT_SIGNATURE_ID.fetch_add(1, Ordering::Relaxed),
            pipeline_type,
            descriptors: Vec::with_capacity(merged.len()),
            name_to_index: FxHashMap::default(),
            buckets: Default::default(),
            push_constants: Vec::new(),
            pipeline_layout: RawHandle::NULL,
            max_uniform_buffer_range: capabilities.max_uniform_buffer_range,
            pool,
            defaults,
            device,
        };

        signature.classify(merged, desc.static_samplers, capabilities)?;
        signature.sort_buckets();
        signature.create_layouts(desc.static_samplers)?;
        signature.create_pipeline_layout()?;
        signature.fill_default_data();
        signature.allocate_empty_sets()?;

        prism_debug!(
            SOURCE,
            "Built root signature {} ({} descriptors, {} push constant ranges, {:?})",
            signature.id,
            signature.descriptors.len(),
            signature.push_constants.len(),
            signature.pipeline_type
        );

        Ok(Arc::new(signature))
    }

    /// Turn merged resources into descriptor infos and push constant ranges
    fn classify(
        &mut self,
        merged: Vec<ShaderResource>,
        static_samplers: &[StaticSampler],
        capabilities: &DeviceCapabilities,
    ) -> Result<()> {
        for resource in merged {
            let index = DescriptorIndex(self.descriptors.len() as u32);
            let mut info = DescriptorInfo {
                name: resource.name.clone(),
                register: resource.register,
                set: resource.set,
                size: resource.size,
                stages: resource.used_stages,
                descriptor_type: resource.kind,
                dimension: resource.dimension,
                update_frequency: UpdateFrequency::None,
                binding_kind: None,
                handle_index: None,
                dynamic_index: None,
                push_constant_index: None,
                is_static_sampler: false,
            };

            match binding_kind_for(resource.kind) {
                None => {
                    if resource.size > capabilities.max_push_constant_size {
                        let message = format!(
                            "root constant '{}' is {} bytes, device limit is {}",
                            resource.name, resource.size, capabilities.max_push_constant_size
                        );
                        prism_error!(SOURCE, "{}", message);
                        return Err(Error::InvalidResource(message));
                    }
                    // Every range starts at offset 0, so stages must not repeat
                    if let Some(other) = self
                        .push_constants
                        .iter()
                        .position(|range| range.stages.intersects(resource.used_stages))
                    {
                        let other_name = self
                            .descriptors
                            .iter()
                            .find(|d| d.push_constant_index == Some(other as u32))
                            .map_or("?", |d| d.name.as_str());
                        let message = format!(
                            "root constants '{}' and '{}' share shader stages {:?}",
                            other_name, resource.name, resource.used_stages
                        );
                        prism_error!(SOURCE, "{}", message);
                        return Err(Error::InvalidResource(message));
                    }
                    info.push_constant_index = Some(self.push_constants.len() as u32);
                    self.push_constants.push(PushConstantRange {
                        stages: resource.used_stages,
                        offset: 0,
                        size: resource.size,
                    });
                }
                Some(mut kind) => {
                    let frequency = UpdateFrequency::from_set(resource.set).ok_or_else(|| {
                        let message = format!(
                            "'{}' uses set {}, only sets 0..{} exist",
                            resource.name, resource.set, MAX_DESCRIPTOR_SETS
                        );
                        prism_error!(SOURCE, "{}", message);
                        Error::InvalidResource(message)
                    })?;

                    if resource.size == 0 {
                        let message = format!("'{}' is an unbounded array", resource.name);
                        prism_error!(SOURCE, "{}", message);
                        return Err(Error::InvalidResource(message));
                    }

                    if kind == BindingKind::UniformBuffer
                        && resource.name.to_ascii_lowercase().contains(ROOT_CBV_MARKER)
                    {
                        if resource.size == 1 {
                            prism_info!(SOURCE, "Descriptor '{}': using dynamic uniform buffer", resource.name);
                            kind = BindingKind::UniformBufferDynamic;
                        } else {
                            prism_error!(
                                SOURCE,
                                "Descriptor '{}': dynamic uniform buffers cannot be arrays (size {})",
                                resource.name,
                                resource.size
                            );
                        }
                    }

                    if static_samplers.iter().any(|s| s.name == resource.name) {
                        if kind == BindingKind::Sampler {
                            info.is_static_sampler = true;
                        } else {
                            prism_warn!(
                                SOURCE,
                                "Static sampler '{}' names a {:?}, ignored",
                                resource.name,
                                resource.kind
                            );
                        }
                    }

                    info.update_frequency = frequency;
                    info.binding_kind = Some(kind);
                    self.buckets[frequency.index()].descriptors.push(index);
                }
            }

            self.name_to_index.insert(resource.name, index);
            self.descriptors.push(info);
        }
        Ok(())
    }

    /// Sort each bucket, assign handle and dynamic indices
    fn sort_buckets(&mut self) {
        let descriptors = &mut self.descriptors;
        for bucket in &mut self.buckets {
            bucket.descriptors.sort_by(|a, b| {
                let a = &descriptors[a.0 as usize];
                let b = &descriptors[b.0 as usize];
                (b.binding_kind, b.register).cmp(&(a.binding_kind, a.register))
            });

            let mut element_count = 0;
            for &index in &bucket.descriptors {
                let info = &mut descriptors[index.0 as usize];
                if info.is_static_sampler {
                    continue;
                }
                info.handle_index = Some(element_count);
                element_count += info.size;
                if info.binding_kind == Some(BindingKind::UniformBufferDynamic) {
                    info.dynamic_index = Some(bucket.dynamic_descriptors.len() as u32);
                    bucket.dynamic_descriptors.push(index);
                }
            }
            bucket.element_count = element_count;
        }
    }

    fn highest_used_bucket(&self) -> Option<usize> {
        self.buckets.iter().rposition(|bucket| !bucket.descriptors.is_empty())
    }

    fn create_layouts(&mut self, static_samplers: &[StaticSampler]) -> Result<()> {
        let Some(highest) = self.highest_used_bucket() else {
            return Ok(());
        };

        for set_index in 0..=highest {
            let bucket = &mut self.buckets[set_index];

            if bucket.descriptors.is_empty() {
                let layout = self
                    .device
                    .create_descriptor_set_layout(&DescriptorSetLayoutDesc::default())
                    .map_err(|e| {
                        prism_error!(SOURCE, "Failed to create placeholder layout for set {}: {}", set_index, e);
                        e
                    })?;
                bucket.layout = Some(layout);
                bucket.is_placeholder = true;
                continue;
            }

            let mut entries = Vec::new();
            for &index in &bucket.descriptors {
                let info = &self.descriptors[index.0 as usize];
                let kind = match info.binding_kind {
                    Some(kind) => kind,
                    None => continue,
                };
                let immutable_samplers = if info.is_static_sampler {
                    static_samplers
                        .iter()
                        .find(|s| s.name == info.name)
                        .map(|s| vec![s.sampler.handle(); info.size as usize])
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };
                bucket.bindings.push(LayoutBinding {
                    binding: info.register,
                    kind,
                    count: info.size,
                    stages: info.stages,
                    immutable_samplers,
                });
                if let Some(data_index) = info.handle_index {
                    entries.push(UpdateTemplateEntry {
                        binding: info.register,
                        kind,
                        count: info.size,
                        data_index,
                    });
                }
            }

            let layout = self
                .device
                .create_descriptor_set_layout(&DescriptorSetLayoutDesc {
                    bindings: bucket.bindings.clone(),
                })
                .map_err(|e| {
                    prism_error!(SOURCE, "Failed to create descriptor set layout for set {}: {}", set_index, e);
                    e
                })?;
            bucket.layout = Some(layout);

            if !entries.is_empty() {
                let template = self
                    .device
                    .create_update_template(&UpdateTemplateDesc { layout, entries })
                    .map_err(|e| {
                        prism_error!(SOURCE, "Failed to create update template for set {}: {}", set_index, e);
                        e
                    })?;
                bucket.update_template = Some(template);
            }
        }
        Ok(())
    }

    fn create_pipeline_layout(&mut self) -> Result<()> {
        let set_layouts: Vec<RawHandle> = self
            .buckets
            .iter()
            .map_while(|bucket| bucket.layout)
            .collect();
        self.pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDesc {
                set_layouts,
                push_constants: self.push_constants.clone(),
            })
            .map_err(|e| {
                prism_error!(SOURCE, "Failed to create pipeline layout: {}", e);
                e
            })?;
        Ok(())
    }

    fn fill_default_data(&mut self) {
        let uniform_limit = self.max_uniform_buffer_range;
        for bucket in &mut self.buckets {
            if bucket.element_count == 0 {
                continue;
            }
            bucket.default_data = (0..self.defaults.node_count())
                .map(|node_index| {
                    let node = self.defaults.node(node_index);
                    let mut data = Vec::with_capacity(bucket.element_count as usize);
                    for &index in &bucket.descriptors {
                        let info = &self.descriptors[index.0 as usize];
                        if let (Some(kind), Some(_)) = (info.binding_kind, info.handle_index) {
                            let mut element = node.update_data(kind, info.dimension);
                            if let (
                                BindingKind::UniformBuffer | BindingKind::UniformBufferDynamic,
                                DescriptorUpdateData::Buffer { range, .. },
                            ) = (kind, &mut element)
                            {
                                *range = (*range).min(uniform_limit);
                            }
                            data.extend(std::iter::repeat(element).take(info.size as usize));
                        }
                    }
                    data
                })
                .collect();
        }
    }

    fn allocate_empty_sets(&mut self) -> Result<()> {
        for bucket in &mut self.buckets {
            if let (true, Some(layout)) = (bucket.is_placeholder, bucket.layout) {
                bucket.empty_set = self.pool.consume(&[layout])?.first().copied();
            }
        }
        Ok(())
    }

    // ===== ACCESSORS =====

    /// Process-unique identity
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    pub fn pipeline_layout(&self) -> RawHandle {
        self.pipeline_layout
    }

    pub fn descriptors(&self) -> &[DescriptorInfo] {
        &self.descriptors
    }

    pub fn descriptor_index(&self, name: &str) -> Option<DescriptorIndex> {
        self.name_to_index.get(name).copied()
    }

    pub fn descriptor(&self, index: DescriptorIndex) -> Option<&DescriptorInfo> {
        self.descriptors.get(index.0 as usize)
    }

    pub fn descriptor_by_name(&self, name: &str) -> Option<&DescriptorInfo> {
        self.descriptor_index(name).and_then(|index| self.descriptor(index))
    }

    pub fn bucket(&self, frequency: UpdateFrequency) -> &DescriptorBucket {
        &self.buckets[frequency.index()]
    }

    pub fn buckets(&self) -> &[DescriptorBucket] {
        &self.buckets
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constants
    }

    pub fn max_uniform_buffer_range(&self) -> u64 {
        self.max_uniform_buffer_range
    }

    pub(crate) fn pool(&self) -> &Arc<DescriptorPool> {
        &self.pool
    }

    pub(crate) fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }
}

impl Drop for RootSignature {
    fn drop(&mut self) {
        for bucket in &self.buckets {
            if let Some(template) = bucket.update_template {
                self.device.destroy_update_template(template);
            }
        }
        if !self.pipeline_layout.is_null() {
            self.device.destroy_pipeline_layout(self.pipeline_layout);
        }
        for bucket in &self.buckets {
            if let Some(layout) = bucket.layout {
                self.device.destroy_descriptor_set_layout(layout);
            }
        }
    }
}

impl std::fmt::Debug for RootSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSignature")
            .field("id", &self.id)
            .field("pipeline_type", &self.pipeline_type)
            .field("descriptors", &self.descriptors.len())
            .field("pipeline_layout", &self.pipeline_layout)
            .finish()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Backend binding kind of a shader resource type (`None` for root constants)
pub fn binding_kind_for(descriptor_type: DescriptorType) -> Option<BindingKind> {
    match descriptor_type {
        DescriptorType::Sampler => Some(BindingKind::Sampler),
        DescriptorType::Texture => Some(BindingKind::SampledImage),
        DescriptorType::RwTexture => Some(BindingKind::StorageImage),
        DescriptorType::UniformBuffer => Some(BindingKind::UniformBuffer),
        DescriptorType::Buffer | DescriptorType::RwBuffer => Some(BindingKind::StorageBuffer),
        DescriptorType::TexelBuffer => Some(BindingKind::UniformTexelBuffer),
        DescriptorType::RwTexelBuffer => Some(BindingKind::StorageTexelBuffer),
        DescriptorType::RootConstant => None,
    }
}

/// Merge the resources of every shader by name
///
/// First-seen order is kept. Root constants always live in set 0. A resource
/// without its own stage mask inherits the stages of its shader.
pub fn merge_resources(shaders: &[&ShaderReflection]) -> Result<Vec<ShaderResource>> {
    let mut merged: Vec<ShaderResource> = Vec::new();
    let mut by_name: FxHashMap<&str, usize> = FxHashMap::default();

    for shader in shaders {
        for resource in &shader.resources {
            let stages = if resource.used_stages.is_empty() {
                shader.stages
            } else {
                resource.used_stages
            };
            let set = if resource.kind == DescriptorType::RootConstant { 0 } else { resource.set };

            match by_name.get(resource.name.as_str()) {
                Some(&slot) => {
                    let existing = &mut merged[slot];
                    if existing.register != resource.register || existing.set != set {
                        prism_error!(
                            SOURCE,
                            "Shader resource '{}' reflected at register {} set {} and register {} set {}",
                            resource.name,
                            existing.register,
                            existing.set,
                            resource.register,
                            set
                        );
                        return Err(Error::ConflictingBinding {
                            name: resource.name.clone(),
                            first: (existing.register, existing.set),
                            second: (resource.register, set),
                        });
                    }
                    existing.used_stages |= stages;
                }
                None => {
                    by_name.insert(resource.name.as_str(), merged.len());
                    let mut resource = resource.clone();
                    resource.used_stages = stages;
                    resource.set = set;
                    merged.push(resource);
                }
            }
        }
    }
    Ok(merged)
}

#[cfg(test)]
#[path = "root_signature_tests.rs"]
mod tests;
