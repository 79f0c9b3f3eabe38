/// Descriptor module - pool allocator and descriptor sets

pub mod descriptor_pool;
pub mod descriptor_set;

pub use descriptor_pool::*;
pub use descriptor_set::*;
