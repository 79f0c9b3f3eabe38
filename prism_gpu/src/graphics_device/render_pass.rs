/// Render pass and framebuffer descriptions

use crate::graphics_device::{RawHandle, TextureFormat};

/// What happens to an attachment's contents when a render pass begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadAction {
    #[default]
    DontCare,
    Load,
    Clear,
}

/// What happens to an attachment's contents when a render pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreAction {
    #[default]
    Store,
    DontCare,
}

/// Clear value for one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue::Color([0.0, 0.0, 0.0, 0.0])
    }
}

/// One attachment of a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    pub sample_count: u32,
    pub load: LoadAction,
    pub store: StoreAction,
    /// Only meaningful for depth/stencil formats
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
}

/// Render pass description
///
/// Attachments keep the attachment-optimal layout for the whole pass; layout
/// changes outside the pass go through `Cmd::resource_barrier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderPassDesc {
    pub color: Vec<AttachmentDesc>,
    pub depth: Option<AttachmentDesc>,
}

/// Framebuffer description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    pub render_pass: RawHandle,
    /// Image views (colors first, then depth)
    pub attachments: Vec<RawHandle>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}
