/// Renderer configuration

use crate::graphics_device::{DescriptorPoolDesc, TextureFormat};

/// Settings fixed at renderer creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Sizing of every backend descriptor pool (grown pools reuse it)
    pub descriptor_pool: DescriptorPoolDesc,

    /// Byte size of the zero buffer bound to unwritten buffer descriptors
    pub default_buffer_size: u64,

    /// Format of the 1x1 textures bound to unwritten image descriptors
    pub default_texture_format: TextureFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            descriptor_pool: DescriptorPoolDesc::default(),
            default_buffer_size: 65536,
            default_texture_format: TextureFormat::R8G8B8A8_UNORM,
        }
    }
}
