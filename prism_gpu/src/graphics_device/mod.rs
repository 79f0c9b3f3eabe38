/// Graphics device module - backend-facing traits and plain data types

pub mod graphics_device;
pub mod command_list;
pub mod shader;
pub mod descriptor;
pub mod render_pass;
pub mod texture;
pub mod buffer;
pub mod sampler;
pub mod render_target;

pub use graphics_device::*;
pub use command_list::*;
pub use shader::*;
pub use descriptor::*;
pub use render_pass::*;
pub use texture::*;
pub use buffer::*;
pub use sampler::*;
pub use render_target::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
