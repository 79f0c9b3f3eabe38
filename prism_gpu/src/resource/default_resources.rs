/// Default resources - placeholders written into every unbound descriptor slot
///
/// One set per GPU node: a sampler, a 1x1 texture for each dimension and a
/// zero-filled buffer usable as uniform, storage and texel buffer.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::graphics_device::{
    BindingKind, BufferDesc, BufferUsage, DescriptorImageLayout, DescriptorUpdateData,
    GraphicsDevice, RawHandle, SamplerDesc, TextureDesc, TextureDimension, TextureFormat,
    TextureUsage,
};
use crate::resource::{next_resource_id, Buffer, ResourceState, Sampler, Texture};

/// Placeholders of one GPU node
pub struct NodeDefaults {
    sampler: Sampler,
    textures: FxHashMap<TextureDimension, Texture>,
    buffer: Buffer,
}

impl NodeDefaults {
    fn new(
        device: &Arc<dyn GraphicsDevice>,
        node_index: u32,
        buffer_size: u64,
        format: TextureFormat,
    ) -> Result<Self> {
        let sampler = Sampler::new(Arc::clone(device), &SamplerDesc::default(), next_resource_id())?;

        let mut textures = FxHashMap::default();
        for dimension in TextureDimension::ALL {
            let multisampled = dimension.is_multisampled();
            let desc = TextureDesc {
                name: format!("default_{:?}", dimension),
                depth: if dimension == TextureDimension::Dim3D { 2 } else { 1 },
                array_layers: dimension.default_layers(),
                format,
                sample_count: if multisampled { 4 } else { 1 },
                dimension,
                usage: if multisampled {
                    TextureUsage::SAMPLED
                } else {
                    TextureUsage::SAMPLED | TextureUsage::STORAGE
                },
                start_state: ResourceState::SHADER_RESOURCE,
                node_index,
                ..Default::default()
            };
            textures.insert(dimension, Texture::new(Arc::clone(device), &desc, next_resource_id())?);
        }

        let buffer_desc = BufferDesc {
            name: "default_buffer".to_string(),
            size: buffer_size,
            usage: BufferUsage::UNIFORM
                | BufferUsage::STORAGE
                | BufferUsage::UNIFORM_TEXEL
                | BufferUsage::STORAGE_TEXEL,
            texel_format: Some(TextureFormat::R32_UINT),
            start_state: ResourceState::COMMON,
            node_index,
            ..Default::default()
        };
        let buffer = Buffer::new(Arc::clone(device), &buffer_desc, next_resource_id())?;

        Ok(Self { sampler, textures, buffer })
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Texture of `dimension`, the 2D one for `Undefined`
    pub fn texture(&self, dimension: TextureDimension) -> Option<&Texture> {
        self.textures
            .get(&dimension)
            .or_else(|| self.textures.get(&TextureDimension::Dim2D))
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Update data a descriptor slot holds until the user writes it
    pub fn update_data(&self, kind: BindingKind, dimension: TextureDimension) -> DescriptorUpdateData {
        match kind {
            BindingKind::Sampler => DescriptorUpdateData::Image {
                sampler: self.sampler.handle(),
                view: RawHandle::NULL,
                layout: DescriptorImageLayout::Undefined,
            },
            BindingKind::SampledImage => DescriptorUpdateData::Image {
                sampler: RawHandle::NULL,
                view: self.texture(dimension).map_or(RawHandle::NULL, Texture::srv),
                layout: DescriptorImageLayout::ShaderReadOnly,
            },
            BindingKind::StorageImage => {
                // Storage images cannot be multisampled
                let dimension = match dimension {
                    TextureDimension::Dim2DMS => TextureDimension::Dim2D,
                    TextureDimension::Dim2DMSArray => TextureDimension::Dim2DArray,
                    other => other,
                };
                DescriptorUpdateData::Image {
                    sampler: RawHandle::NULL,
                    view: self
                        .texture(dimension)
                        .and_then(|texture| texture.uav(0))
                        .unwrap_or(RawHandle::NULL),
                    layout: DescriptorImageLayout::General,
                }
            }
            BindingKind::UniformTexelBuffer => DescriptorUpdateData::TexelBuffer {
                view: self.buffer.handles().uniform_texel_view.unwrap_or(RawHandle::NULL),
            },
            BindingKind::StorageTexelBuffer => DescriptorUpdateData::TexelBuffer {
                view: self.buffer.handles().storage_texel_view.unwrap_or(RawHandle::NULL),
            },
            BindingKind::UniformBuffer
            | BindingKind::StorageBuffer
            | BindingKind::UniformBufferDynamic => DescriptorUpdateData::Buffer {
                buffer: self.buffer.handle(),
                offset: 0,
                range: self.buffer.size(),
            },
        }
    }
}

/// Default resources for every GPU node
pub struct DefaultResources {
    nodes: Vec<NodeDefaults>,
}

impl DefaultResources {
    pub(crate) fn new(
        device: &Arc<dyn GraphicsDevice>,
        node_count: u32,
        buffer_size: u64,
        format: TextureFormat,
    ) -> Result<Self> {
        let nodes = (0..node_count.max(1))
            .map(|node| NodeDefaults::new(device, node, buffer_size, format))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { nodes })
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Placeholders of `node_index` (node 0 when out of range)
    pub fn node(&self, node_index: u32) -> &NodeDefaults {
        self.nodes.get(node_index as usize).unwrap_or(&self.nodes[0])
    }
}
