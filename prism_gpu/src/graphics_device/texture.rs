/// Texture types

use bitflags::bitflags;

use crate::graphics_device::{RawHandle, TextureDimension};
use crate::resource::ResourceState;

/// Texture pixel format
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R10G10B10A2_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_SFLOAT,
    R32_UINT,
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
    D32_FLOAT_S8_UINT,
}

impl TextureFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM
                | TextureFormat::D32_FLOAT
                | TextureFormat::D24_UNORM_S8_UINT
                | TextureFormat::D32_FLOAT_S8_UINT
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::D24_UNORM_S8_UINT | TextureFormat::D32_FLOAT_S8_UINT)
    }
}

bitflags! {
    /// How a texture will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 0x01;
        /// Read/write access (one UAV view per mip)
        const STORAGE = 0x02;
        const COLOR_ATTACHMENT = 0x04;
        const DEPTH_STENCIL = 0x08;
        const TRANSFER_SRC = 0x10;
        const TRANSFER_DST = 0x20;
    }
}

/// Texture creation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
    pub dimension: TextureDimension,
    pub usage: TextureUsage,
    /// State the backend transitions the texture to right after creation
    pub start_state: ResourceState,
    pub node_index: u32,
}

impl Default for TextureDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            width: 1,
            height: 1,
            depth: 1,
            array_layers: 1,
            mip_levels: 1,
            format: TextureFormat::R8G8B8A8_UNORM,
            sample_count: 1,
            dimension: TextureDimension::Dim2D,
            usage: TextureUsage::SAMPLED,
            start_state: ResourceState::UNDEFINED,
            node_index: 0,
        }
    }
}

/// Backend handles of a texture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureHandles {
    pub image: RawHandle,
    /// Sampled view covering every mip and layer
    pub srv: RawHandle,
    /// One storage view per mip (empty without `TextureUsage::STORAGE`)
    pub uav_mips: Vec<RawHandle>,
}
