/// Resource module - buffers, textures, render targets and samplers with tracked state

pub mod resource_state;
pub mod buffer;
pub mod texture;
pub mod render_target;
pub mod sampler;
pub mod default_resources;

pub use resource_state::*;
pub use buffer::*;
pub use texture::*;
pub use render_target::*;
pub use sampler::*;
pub use default_resources::*;

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique resource identity
pub(crate) fn next_resource_id() -> u64 {
    NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
