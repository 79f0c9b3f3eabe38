/// Renderer module - renderer, command streams and configuration

pub mod config;
pub mod cmd;
pub mod renderer;

pub use config::*;
pub use cmd::*;
pub use renderer::*;
