//! Error types for the prism GPU layer
//!
//! This module defines the error types used throughout the crate,
//! including backend object creation, binding layout construction and
//! descriptor pool management.

use std::fmt;

/// Result type for prism operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prism errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader reflection, etc.)
    InvalidResource(String),

    /// Initialization failed (device, renderer, default resources)
    InitializationFailed(String),

    /// The same shader resource name was reflected with a different register or set
    ConflictingBinding {
        name: String,
        /// (register, set) of the first occurrence
        first: (u32, u32),
        /// (register, set) of the conflicting occurrence
        second: (u32, u32),
    },

    /// Descriptor name not declared by the root signature
    InvalidDescriptorName(String),

    /// Descriptor pool could not satisfy an allocation even after growing
    DescriptorPoolExhausted(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ConflictingBinding { name, first, second } => write!(
                f,
                "Conflicting binding for '{}': register {} set {} vs register {} set {}",
                name, first.0, first.1, second.0, second.1
            ),
            Error::InvalidDescriptorName(name) => write!(f, "Invalid descriptor name: {}", name),
            Error::DescriptorPoolExhausted(msg) => write!(f, "Descriptor pool exhausted: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
