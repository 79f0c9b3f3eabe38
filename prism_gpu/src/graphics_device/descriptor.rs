/// Backend binding-model types
///
/// Descriptor set layouts, update templates, pipeline layouts and descriptor
/// pools as the `GraphicsDevice` trait sees them. Handles are opaque `RawHandle`s.

use crate::error::Error;
use crate::graphics_device::{RawHandle, ShaderStageFlags};

/// Backend descriptor type
///
/// Declaration order is the backend's numeric type order; bindings inside a
/// layout are sorted by this order (descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingKind {
    Sampler,
    SampledImage,
    StorageImage,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
}

impl BindingKind {
    pub const ALL: [BindingKind; 8] = [
        BindingKind::Sampler,
        BindingKind::SampledImage,
        BindingKind::StorageImage,
        BindingKind::UniformTexelBuffer,
        BindingKind::StorageTexelBuffer,
        BindingKind::UniformBuffer,
        BindingKind::StorageBuffer,
        BindingKind::UniformBufferDynamic,
    ];

    pub fn is_image(self) -> bool {
        matches!(self, BindingKind::SampledImage | BindingKind::StorageImage)
    }

    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            BindingKind::UniformBuffer | BindingKind::StorageBuffer | BindingKind::UniformBufferDynamic
        )
    }

    pub fn is_texel_buffer(self) -> bool {
        matches!(self, BindingKind::UniformTexelBuffer | BindingKind::StorageTexelBuffer)
    }
}

/// One binding slot of a descriptor set layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub kind: BindingKind,
    pub count: u32,
    pub stages: ShaderStageFlags,
    /// Samplers baked into the layout (static samplers); empty otherwise
    pub immutable_samplers: Vec<RawHandle>,
}

/// Descriptor set layout creation parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    /// Bindings in creation order (already sorted by the caller)
    pub bindings: Vec<LayoutBinding>,
}

/// One entry of an update template
///
/// `data_index` is the element index into the flat `DescriptorUpdateData` slice
/// handed to `GraphicsDevice::apply_update_template`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateTemplateEntry {
    pub binding: u32,
    pub kind: BindingKind,
    pub count: u32,
    pub data_index: u32,
}

/// Update template creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTemplateDesc {
    pub layout: RawHandle,
    pub entries: Vec<UpdateTemplateEntry>,
}

/// One element of a shadow update-data buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorUpdateData {
    Image {
        sampler: RawHandle,
        view: RawHandle,
        layout: DescriptorImageLayout,
    },
    Buffer {
        buffer: RawHandle,
        offset: u64,
        range: u64,
    },
    TexelBuffer {
        view: RawHandle,
    },
}

/// Image layout expected by a sampled/storage image descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorImageLayout {
    /// Sampler-only descriptors
    Undefined,
    ShaderReadOnly,
    General,
}

/// Push constant range of a pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Pipeline layout creation parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayoutDesc {
    /// Set layouts ordered by set index, with no gaps
    pub set_layouts: Vec<RawHandle>,
    pub push_constants: Vec<PushConstantRange>,
}

/// Capacity of one descriptor type inside a descriptor pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub kind: BindingKind,
    pub count: u32,
}

/// Descriptor pool sizing (every grown pool uses the same sizing)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorPoolDesc {
    pub max_sets: u32,
    pub pool_sizes: Vec<DescriptorPoolSize>,
}

impl Default for DescriptorPoolDesc {
    fn default() -> Self {
        let size = |kind, count| DescriptorPoolSize { kind, count };
        Self {
            max_sets: 8192,
            pool_sizes: vec![
                size(BindingKind::Sampler, 8192),
                size(BindingKind::SampledImage, 16384),
                size(BindingKind::StorageImage, 8192),
                size(BindingKind::UniformTexelBuffer, 2048),
                size(BindingKind::StorageTexelBuffer, 2048),
                size(BindingKind::UniformBuffer, 16384),
                size(BindingKind::StorageBuffer, 8192),
                size(BindingKind::UniformBufferDynamic, 1024),
            ],
        }
    }
}

/// Failure of `GraphicsDevice::allocate_descriptor_sets`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorAllocError {
    /// The pool has no room left; a fresh pool may succeed
    OutOfPoolMemory,
    /// Any other backend failure
    Backend(Error),
}
