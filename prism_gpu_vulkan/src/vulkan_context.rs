/// GpuContext - shared Vulkan state for every backend object
///
/// Holds the logical device, the allocator and the queue chosen for each
/// queue type. Command lists keep an `Arc` to it; device and instance
/// destruction is handled by `VulkanGraphicsDevice::drop()`.

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use prism_gpu::prism::device::QueueType;
use prism_gpu::prism::{Error, Result};
use prism_gpu::prism_err;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, PoisonError};

/// A queue and the family it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueInfo {
    pub queue: vk::Queue,
    pub family: u32,
}

/// Queue selected for each `QueueType`
///
/// Compute and transfer fall back to the graphics queue when the adapter
/// has no dedicated family.
#[derive(Debug, Clone, Copy)]
pub struct QueueSet {
    pub graphics: QueueInfo,
    pub compute: QueueInfo,
    pub transfer: QueueInfo,
}

impl QueueSet {
    pub fn get(&self, queue_type: QueueType) -> QueueInfo {
        match queue_type {
            QueueType::Graphics => self.graphics,
            QueueType::Compute => self.compute,
            QueueType::Transfer => self.transfer,
        }
    }
}

pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    pub queues: QueueSet,

    /// Command pool for one-shot initial transitions (graphics family)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Whether `samplerAnisotropy` was enabled on the device
    pub anisotropy_enabled: bool,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    pub fn new(
        device: ash::Device,
        allocator: Allocator,
        queues: QueueSet,
        upload_command_pool: vk::CommandPool,
        anisotropy_enabled: bool,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Self {
        Self {
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queues,
            upload_command_pool: Mutex::new(upload_command_pool),
            anisotropy_enabled,
            debug_utils_loader,
            debug_messenger,
        }
    }

    /// Record `record` into a throwaway command buffer, submit it on the
    /// graphics queue and wait for completion
    pub fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| Error::BackendError("upload command pool lock poisoned".to_string()))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| prism_err!("prism::vulkan", "Failed to allocate one-shot command buffer: {:?}", e))?[0];

            let result = self.submit_one_shot(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| prism_err!("prism::vulkan", "Failed to begin one-shot command buffer: {:?}", e))?;

        record(&self.device, command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| prism_err!("prism::vulkan", "Failed to end one-shot command buffer: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.device
            .queue_submit(self.queues.graphics.queue, &[submit_info], vk::Fence::null())
            .map_err(|e| prism_err!("prism::vulkan", "Failed to submit one-shot command buffer: {:?}", e))?;
        self.device
            .queue_wait_idle(self.queues.graphics.queue)
            .map_err(|e| prism_err!("prism::vulkan", "Failed to wait for one-shot submission: {:?}", e))
    }

    /// Lock the allocator, recovering from a poisoned lock
    pub fn allocator(&self) -> std::sync::MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
