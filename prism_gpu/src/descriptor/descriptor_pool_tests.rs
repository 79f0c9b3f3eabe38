//! Unit tests for descriptor_pool.rs

use std::sync::Arc;

use serial_test::serial;

use crate::descriptor::DescriptorPool;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{DescriptorPoolDesc, GraphicsDevice, RawHandle};
use crate::log::{self, CaptureLogger, LogSeverity};

fn small_pool(mock: &Arc<MockGraphicsDevice>, max_sets: u32) -> DescriptorPool {
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    DescriptorPool::new(device, DescriptorPoolDesc { max_sets, ..Default::default() }).unwrap()
}

#[test]
fn test_new_creates_one_pool() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 16);
    assert_eq!(pool.pool_count(), 1);
    assert_eq!(pool.used_sets(), 0);
    assert_eq!(mock.state().pools.len(), 1);
}

#[test]
fn test_new_propagates_backend_failure() {
    let mock = Arc::new(MockGraphicsDevice::new());
    mock.state().fail_next_pool = true;
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    assert!(DescriptorPool::new(device, DescriptorPoolDesc::default()).is_err());
}

#[test]
fn test_consume_within_capacity_does_not_grow() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 8);
    let sets = pool.consume(&[RawHandle(100); 8]).unwrap();
    assert_eq!(sets.len(), 8);
    assert_eq!(pool.pool_count(), 1);
    assert_eq!(pool.used_sets(), 8);
}

#[test]
fn test_consume_empty_is_noop() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 8);
    assert!(pool.consume(&[]).unwrap().is_empty());
    assert!(mock.state().allocated_sets.is_empty());
}

#[test]
#[serial]
fn test_exhaustion_grows_once_and_logs() {
    let capture = CaptureLogger::default();
    log::set_logger(capture.clone());

    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 4);
    pool.consume(&[RawHandle(100); 3]).unwrap();
    let sets = pool.consume(&[RawHandle(100); 3]).unwrap();

    log::reset_logger();

    assert_eq!(sets.len(), 3);
    assert_eq!(pool.pool_count(), 2);
    assert_eq!(pool.used_sets(), 6);
    let infos = capture.messages(LogSeverity::Info);
    assert!(infos.contains(&"Descriptor pool exhausted, created new pool (total: 2)".to_string()));
}

#[test]
fn test_request_larger_than_any_pool_fails_after_one_growth() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 4);
    let result = pool.consume(&[RawHandle(100); 5]);
    assert!(matches!(result, Err(Error::DescriptorPoolExhausted(_))));
    assert_eq!(pool.pool_count(), 2);
    assert_eq!(pool.used_sets(), 0);
}

#[test]
fn test_growth_failure_is_returned() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 1);
    pool.consume(&[RawHandle(100)]).unwrap();
    mock.state().fail_next_pool = true;
    assert!(matches!(pool.consume(&[RawHandle(100)]), Err(Error::BackendError(_))));
    assert_eq!(pool.pool_count(), 1);
}

#[test]
fn test_drop_destroys_every_pool() {
    let mock = Arc::new(MockGraphicsDevice::new());
    let pool = small_pool(&mock, 1);
    pool.consume(&[RawHandle(100)]).unwrap();
    pool.consume(&[RawHandle(100)]).unwrap();
    drop(pool);
    assert_eq!(mock.state().destroyed_count("descriptor_pool"), 2);
}
