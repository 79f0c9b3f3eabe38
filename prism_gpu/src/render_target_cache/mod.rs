/// Render target cache module - render passes and framebuffers keyed by structure

pub mod render_target_cache;

pub use render_target_cache::*;
