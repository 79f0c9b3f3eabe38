/*!
# Prism GPU

Cross-API binding model for explicit graphics backends.

This crate turns shader reflection into a complete resource binding layout and
keeps descriptor memory, resource states and render pass objects consistent
behind a small API. Backends (Vulkan today) implement the `GraphicsDevice` and
`CommandList` traits and never see the binding logic.

## Architecture

- **Renderer**: Owns the device, the descriptor pool, default resources and the render target cache
- **RootSignature**: Merged, classified and bucketed shader resources with backend layouts
- **DescriptorSet**: Shadow update data and dynamic offsets for a batch of backend sets
- **DescriptorPool**: Growable pool allocator
- **Barrier**: State tracking and barrier synthesis
- **RenderTargetCache**: Per-thread render pass and framebuffer cache
- **Cmd**: Command stream wrapping a backend command list
*/

// Internal modules
mod error;
pub mod log;
pub mod graphics_device;
pub mod resource;
pub mod barrier;
pub mod root_signature;
pub mod descriptor;
pub mod render_target_cache;
pub mod renderer;

// Main prism namespace module
pub mod prism {
    // Error types
    pub use crate::error::{Error, Result};

    // Renderer and command stream
    pub use crate::renderer::{Cmd, DescriptorPoolStats, Renderer, RendererConfig};

    // Logging (the prism_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, set_logger, reset_logger, set_min_severity};
    }

    // Backend-facing traits and plain data types
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Binding model sub-module
    pub mod binding {
        pub use crate::descriptor::*;
        pub use crate::root_signature::*;
    }

    // Barrier sub-module
    pub mod barrier {
        pub use crate::barrier::*;
    }

    // Render target cache sub-module
    pub mod target {
        pub use crate::render_target_cache::*;
    }
}
