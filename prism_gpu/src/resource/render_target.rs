/// RenderTarget - attachment-capable texture

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{
    ClearValue, GraphicsDevice, RawHandle, RenderTargetDesc, RenderTargetViews, TextureDesc,
    TextureDimension, TextureFormat, TextureUsage,
};
use crate::resource::Texture;

/// Render target: a texture plus per-mip and per-slice attachment views
///
/// State tracking lives on the inner texture (`texture()`), so render
/// targets go through the same barrier path as textures.
pub struct RenderTarget {
    views: RenderTargetViews,
    clear_value: ClearValue,
    texture: Texture,
    device: Arc<dyn GraphicsDevice>,
}

impl RenderTarget {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, desc: &RenderTargetDesc, id: u64) -> Result<Self> {
        let handles = device.create_render_target(desc)?;
        let texture_desc = Self::texture_desc(desc);
        let texture = Texture::from_handles(Arc::clone(&device), &texture_desc, handles.texture, id);
        Ok(Self {
            views: handles.views,
            clear_value: desc.clear_value,
            texture,
            device,
        })
    }

    /// Texture description equivalent to a render target description
    pub fn texture_desc(desc: &RenderTargetDesc) -> TextureDesc {
        let mut usage = if desc.format.is_depth() {
            TextureUsage::DEPTH_STENCIL
        } else {
            TextureUsage::COLOR_ATTACHMENT
        };
        if desc.sampled {
            usage |= TextureUsage::SAMPLED;
        }
        let dimension = match (desc.array_layers > 1, desc.sample_count > 1) {
            (false, false) => TextureDimension::Dim2D,
            (true, false) => TextureDimension::Dim2DArray,
            (false, true) => TextureDimension::Dim2DMS,
            (true, true) => TextureDimension::Dim2DMSArray,
        };
        TextureDesc {
            name: desc.name.clone(),
            width: desc.width,
            height: desc.height,
            depth: 1,
            array_layers: desc.array_layers.max(1),
            mip_levels: desc.mip_levels.max(1),
            format: desc.format,
            sample_count: desc.sample_count.max(1),
            dimension,
            usage: usage | TextureUsage::TRANSFER_SRC | TextureUsage::TRANSFER_DST,
            start_state: desc.start_state,
            node_index: desc.node_index,
        }
    }

    /// Creation-order identity, shared with the inner texture
    pub fn id(&self) -> u64 {
        self.texture.id()
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    pub fn array_layers(&self) -> u32 {
        self.texture.array_layers()
    }

    pub fn mip_levels(&self) -> u32 {
        self.texture.mip_levels()
    }

    pub fn format(&self) -> TextureFormat {
        self.texture.format()
    }

    pub fn sample_count(&self) -> u32 {
        self.texture.sample_count()
    }

    pub fn clear_value(&self) -> ClearValue {
        self.clear_value
    }

    /// Attachment view for the given selectors
    ///
    /// No selector: mip 0, every layer. Mip only: that mip, every layer.
    /// Both (or slice only, mip 0): that single (mip, layer).
    pub fn view(&self, mip_slice: Option<u32>, array_slice: Option<u32>) -> Option<RawHandle> {
        match (mip_slice, array_slice) {
            (None, None) => Some(self.views.attachment),
            (Some(mip), None) => self.views.mip_views.get(mip as usize).copied(),
            (mip, Some(slice)) => {
                let mip = mip.unwrap_or(0);
                if slice >= self.array_layers() {
                    return None;
                }
                let index = mip.checked_mul(self.array_layers())?.checked_add(slice)?;
                self.views.slice_views.get(index as usize).copied()
            }
        }
    }

    /// Framebuffer size of the given mip (1x1 past the end of the chain)
    pub fn mip_extent(&self, mip: u32) -> (u32, u32) {
        let shrink = |size: u32| size.checked_shr(mip).unwrap_or(0).max(1);
        (shrink(self.width()), shrink(self.height()))
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        // Views first; the inner texture drops afterwards
        self.device.destroy_render_target_views(&self.views);
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("texture", &self.texture)
            .field("views", &self.views)
            .finish()
    }
}
