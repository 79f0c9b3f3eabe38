/// Resource state tracking
///
/// Every buffer and texture carries its current GPU usage state. Only the
/// barrier synthesizer changes it. The tracker uses relaxed atomics so that
/// resources can be shared by reference between command streams; ordering
/// between threads is the caller's responsibility (a resource must not be
/// transitioned from two threads at once).

use bitflags::bitflags;
use std::sync::atomic::{AtomicU32, Ordering};

bitflags! {
    /// GPU usage state of a resource
    ///
    /// `UNDEFINED` is the empty set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const UNDEFINED = 0;
        const VERTEX_BUFFER = 0x0001;
        const UNIFORM_READ = 0x0002;
        const INDEX_BUFFER = 0x0004;
        const RENDER_TARGET = 0x0008;
        const UNORDERED_ACCESS = 0x0010;
        const DEPTH_WRITE = 0x0020;
        const DEPTH_READ = 0x0040;
        const NON_PIXEL_SHADER_RESOURCE = 0x0080;
        const PIXEL_SHADER_RESOURCE = 0x0100;
        const SHADER_RESOURCE = Self::NON_PIXEL_SHADER_RESOURCE.bits() | Self::PIXEL_SHADER_RESOURCE.bits();
        const INDIRECT_ARGUMENT = 0x0200;
        const COPY_DEST = 0x0400;
        const COPY_SOURCE = 0x0800;
        const GENERIC_READ = Self::VERTEX_BUFFER.bits()
            | Self::UNIFORM_READ.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::SHADER_RESOURCE.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
        const PRESENT = 0x1000;
        const COMMON = 0x2000;
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        ResourceState::UNDEFINED
    }
}

/// Current state of one resource
#[derive(Debug)]
pub struct ResourceStateTracker {
    bits: AtomicU32,
}

impl ResourceStateTracker {
    pub fn new(initial: ResourceState) -> Self {
        Self {
            bits: AtomicU32::new(initial.bits()),
        }
    }

    pub fn get(&self) -> ResourceState {
        ResourceState::from_bits_retain(self.bits.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, state: ResourceState) {
        self.bits.store(state.bits(), Ordering::Relaxed);
    }
}

impl Default for ResourceStateTracker {
    fn default() -> Self {
        Self::new(ResourceState::UNDEFINED)
    }
}
