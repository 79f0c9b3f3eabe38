/*!
# Prism GPU - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` and `CommandList` traits of
`prism_gpu`, built on Ash with gpu-allocator for memory and spirq for
SPIR-V reflection.

```no_run
use std::sync::Arc;
use prism_gpu::prism::{Renderer, RendererConfig};
use prism_gpu_vulkan::{Config, VulkanGraphicsDevice};

let device = Arc::new(VulkanGraphicsDevice::new(Config::default())?);
let renderer = Renderer::new(device, RendererConfig::default())?;
# Ok::<(), prism_gpu::prism::Error>(())
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_resource;
mod vulkan_descriptor;
mod vulkan_render_pass;
mod vulkan_command_list;
mod vulkan_reflection;
mod debug;

pub use vulkan::{Config, VulkanGraphicsDevice};
pub use vulkan_command_list::VulkanCommandList;
pub use vulkan_reflection::reflect_spirv;

// Re-export debug utilities
pub use debug::{get_validation_stats, ValidationStats};
