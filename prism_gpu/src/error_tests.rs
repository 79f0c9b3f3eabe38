//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkCreateDescriptorPool failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkCreateDescriptorPool failed"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_invalid_resource_display() {
    let err = Error::InvalidResource("array size 0".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Invalid resource"));
    assert!(display.contains("array size 0"));
}

#[test]
fn test_initialization_failed_display() {
    let err = Error::InitializationFailed("no adapter".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Initialization failed"));
    assert!(display.contains("no adapter"));
}

#[test]
fn test_conflicting_binding_display() {
    let err = Error::ConflictingBinding {
        name: "uTex0".to_string(),
        first: (0, 1),
        second: (2, 1),
    };
    let display = format!("{}", err);
    assert!(display.contains("uTex0"));
    assert!(display.contains("register 0 set 1"));
    assert!(display.contains("register 2 set 1"));
}

#[test]
fn test_invalid_descriptor_name_display() {
    let err = Error::InvalidDescriptorName("uMissing".to_string());
    assert_eq!(format!("{}", err), "Invalid descriptor name: uMissing");
}

#[test]
fn test_pool_exhausted_display() {
    let err = Error::DescriptorPoolExhausted("second attempt failed".to_string());
    assert!(format!("{}", err).starts_with("Descriptor pool exhausted"));
}

// ============================================================================
// TRAIT TESTS
// ============================================================================

#[test]
fn test_error_clone_and_eq() {
    let err = Error::BackendError("x".to_string());
    assert_eq!(err.clone(), err);
    assert_ne!(err, Error::OutOfMemory);
}

#[test]
fn test_error_is_std_error() {
    fn takes_std_error(_: &dyn std::error::Error) {}
    takes_std_error(&Error::OutOfMemory);
}

#[test]
fn test_result_question_mark() {
    fn inner() -> Result<u32> {
        Err(Error::OutOfMemory)
    }
    fn outer() -> Result<u32> {
        let v = inner()?;
        Ok(v + 1)
    }
    assert_eq!(outer(), Err(Error::OutOfMemory));
}
