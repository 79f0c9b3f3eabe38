/// Barrier module - resource state transitions and the barrier synthesizer

pub mod barrier;

pub use barrier::*;
