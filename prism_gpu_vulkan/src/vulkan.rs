/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Headless: no surface or swapchain is created. Presentation stays with the
/// application, which submits the command buffers recorded here.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use prism_gpu::prism::device::{
    BufferDesc, BufferHandles, CommandList, DescriptorAllocError, DescriptorPoolDesc,
    DescriptorSetLayoutDesc, DescriptorUpdateData, DeviceCapabilities, FramebufferDesc,
    GraphicsDevice, PipelineLayoutDesc, QueueType, RawHandle, RenderPassDesc, RenderTargetDesc,
    RenderTargetHandles, RenderTargetViews, SamplerDesc, TextureDesc, TextureHandles,
    UpdateTemplateDesc,
};
use prism_gpu::prism::{Error, Result};
use prism_gpu::{prism_error, prism_info, prism_warn};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, PoisonError};

use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{GpuContext, QueueInfo, QueueSet};
use crate::vulkan_resource::ResourceRegistry;
use crate::{vulkan_descriptor, vulkan_render_pass};

const SOURCE: &str = "prism::vulkan";
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan device configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub app_version: u32,
    /// Enable VK_LAYER_KHRONOS_validation and route its messages into the prism logger
    pub enable_validation: bool,
    /// Physical device to use; `None` prefers the first discrete GPU
    pub adapter_index: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Prism Application".to_string(),
            app_version: vk::make_api_version(0, 1, 0, 0),
            enable_validation: cfg!(debug_assertions) || cfg!(feature = "vulkan-validation"),
            adapter_index: None,
        }
    }
}

fn init_error(message: String) -> Error {
    prism_error!(SOURCE, "{}", message);
    Error::InitializationFailed(message)
}

/// Vulkan graphics device
pub struct VulkanGraphicsDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    adapter_name: String,
    capabilities: DeviceCapabilities,
    resources: ManuallyDrop<ResourceRegistry>,
    ctx: Arc<GpuContext>,
}

impl VulkanGraphicsDevice {
    pub fn new(config: Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_error(format!("Failed to load Vulkan library: {:?}", e)))?;

            let app_name = CString::new(config.app_name.clone())
                .map_err(|_| Error::InitializationFailed("Application name contains a NUL byte".to_string()))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(config.app_version)
                .engine_name(c"Prism")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let enable_validation = config.enable_validation && Self::validation_layer_available(&entry);
            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(VALIDATION_LAYER.as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error(format!("Failed to create instance: {:?}", e)))?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                crate::debug::reset_validation_stats();
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let messenger = debug_utils
                    .create_debug_utils_messenger(&crate::debug::messenger_create_info(), None)
                    .map_err(|e| init_error(format!("Failed to create debug messenger: {:?}", e)))?;
                (Some(debug_utils), Some(messenger))
            } else {
                (None, None)
            };

            let physical_device = Self::pick_physical_device(&instance, config.adapter_index)?;
            let properties = instance.get_physical_device_properties(physical_device);
            let adapter_name = CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .into_owned();

            let families = Self::select_queue_families(&instance, physical_device)?;
            let queue_priorities = [1.0];
            let mut unique_families = vec![families.0];
            for family in [families.1, families.2] {
                if !unique_families.contains(&family) {
                    unique_families.push(family);
                }
            }
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
                .iter()
                .map(|&family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let supported = instance.get_physical_device_features(physical_device);
            let anisotropy_enabled = supported.sampler_anisotropy == vk::TRUE;
            let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy_enabled);

            let descriptor_indexing = Self::supports_descriptor_indexing(&instance, physical_device);
            let mut indexing_features = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
                .runtime_descriptor_array(descriptor_indexing)
                .descriptor_binding_partially_bound(descriptor_indexing);

            let mut device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_features(&device_features);
            if descriptor_indexing {
                device_create_info = device_create_info.push_next(&mut indexing_features);
            }
            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_error(format!("Failed to create device: {:?}", e)))?;

            let queue = |family: u32| QueueInfo {
                queue: device.get_device_queue(family, 0),
                family,
            };
            let queues = QueueSet {
                graphics: queue(families.0),
                compute: queue(families.1),
                transfer: queue(families.2),
            };

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_error(format!("Failed to create allocator: {:?}", e)))?;

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(families.0)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let upload_command_pool = device
                .create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| init_error(format!("Failed to create upload command pool: {:?}", e)))?;

            let limits = properties.limits;
            let capabilities = DeviceCapabilities {
                linked_node_count: 1,
                max_uniform_buffer_range: limits.max_uniform_buffer_range as u64,
                max_bound_descriptor_sets: limits.max_bound_descriptor_sets,
                max_push_constant_size: limits.max_push_constants_size,
                descriptor_indexing,
            };

            let ctx = Arc::new(GpuContext::new(
                device,
                allocator,
                queues,
                upload_command_pool,
                anisotropy_enabled,
                debug_utils_loader,
                debug_messenger,
            ));

            prism_info!(
                SOURCE,
                "Created Vulkan device on '{}' (queue families: graphics {}, compute {}, transfer {})",
                adapter_name,
                families.0,
                families.1,
                families.2
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                adapter_name,
                capabilities,
                resources: ManuallyDrop::new(ResourceRegistry::new(Arc::clone(&ctx))),
                ctx,
            })
        }
    }

    /// Name of the selected physical device
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Logical device, for application-side submission and presentation
    pub fn device(&self) -> &ash::Device {
        &self.ctx.device
    }

    pub fn queue(&self, queue_type: QueueType) -> vk::Queue {
        self.ctx.queues.get(queue_type).queue
    }

    unsafe fn validation_layer_available(entry: &ash::Entry) -> bool {
        let available = entry
            .enumerate_instance_layer_properties()
            .unwrap_or_default()
            .iter()
            .any(|layer| CStr::from_ptr(layer.layer_name.as_ptr()) == VALIDATION_LAYER);
        if !available {
            prism_warn!(SOURCE, "{:?} not installed, validation disabled", VALIDATION_LAYER);
        }
        available
    }

    unsafe fn pick_physical_device(instance: &ash::Instance, index: Option<usize>) -> Result<vk::PhysicalDevice> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_error(format!("Failed to enumerate physical devices: {:?}", e)))?;

        if let Some(index) = index {
            return physical_devices
                .get(index)
                .copied()
                .ok_or_else(|| init_error(format!("Adapter index {} out of range ({} adapters)", index, physical_devices.len())));
        }

        let discrete = physical_devices.iter().copied().find(|&pd| {
            instance.get_physical_device_properties(pd).device_type == vk::PhysicalDeviceType::DISCRETE_GPU
        });
        discrete
            .or_else(|| physical_devices.first().copied())
            .ok_or_else(|| init_error("No Vulkan-capable GPU found".to_string()))
    }

    /// (graphics, compute, transfer) family indices
    ///
    /// Dedicated compute and transfer families are preferred; otherwise they
    /// share the graphics family.
    unsafe fn select_queue_families(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<(u32, u32, u32)> {
        let families = instance.get_physical_device_queue_family_properties(physical_device);
        let find = |required: vk::QueueFlags, excluded: vk::QueueFlags| {
            families
                .iter()
                .position(|f| f.queue_flags.contains(required) && !f.queue_flags.intersects(excluded))
                .map(|i| i as u32)
        };

        let graphics = find(vk::QueueFlags::GRAPHICS, vk::QueueFlags::empty())
            .ok_or_else(|| init_error("No graphics queue family found".to_string()))?;
        let compute = find(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS).unwrap_or(graphics);
        let transfer = find(vk::QueueFlags::TRANSFER, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            .unwrap_or(graphics);
        Ok((graphics, compute, transfer))
    }

    unsafe fn supports_descriptor_indexing(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        {
            let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
            instance.get_physical_device_features2(physical_device, &mut features2);
        }
        indexing.runtime_descriptor_array == vk::TRUE && indexing.descriptor_binding_partially_bound == vk::TRUE
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    // ===== RESOURCES =====

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandles> {
        if desc.node_index != 0 {
            prism_warn!(SOURCE, "Buffer '{}' requested on node {}; Vulkan exposes a single node", desc.name, desc.node_index);
        }
        self.resources.create_buffer(desc)
    }

    fn destroy_buffer(&self, handles: &BufferHandles) {
        self.resources.destroy_buffer(handles);
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandles> {
        self.resources.create_texture(desc)
    }

    fn destroy_texture(&self, handles: &TextureHandles) {
        self.resources.destroy_texture(handles);
    }

    fn create_render_target(&self, desc: &RenderTargetDesc) -> Result<RenderTargetHandles> {
        self.resources.create_render_target(desc)
    }

    fn destroy_render_target_views(&self, views: &RenderTargetViews) {
        self.resources.destroy_render_target_views(views);
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<RawHandle> {
        self.resources.create_sampler(desc)
    }

    fn destroy_sampler(&self, sampler: RawHandle) {
        self.resources.destroy_sampler(sampler);
    }

    // ===== BINDING MODEL =====

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<RawHandle> {
        vulkan_descriptor::create_descriptor_set_layout(&self.ctx.device, desc)
    }

    fn destroy_descriptor_set_layout(&self, layout: RawHandle) {
        vulkan_descriptor::destroy_descriptor_set_layout(&self.ctx.device, layout);
    }

    fn create_update_template(&self, desc: &UpdateTemplateDesc) -> Result<RawHandle> {
        vulkan_descriptor::create_update_template(&self.ctx.device, desc)
    }

    fn destroy_update_template(&self, template: RawHandle) {
        vulkan_descriptor::destroy_update_template(&self.ctx.device, template);
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<RawHandle> {
        vulkan_descriptor::create_pipeline_layout(&self.ctx.device, desc)
    }

    fn destroy_pipeline_layout(&self, layout: RawHandle) {
        vulkan_descriptor::destroy_pipeline_layout(&self.ctx.device, layout);
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<RawHandle> {
        vulkan_descriptor::create_descriptor_pool(&self.ctx.device, desc)
    }

    fn destroy_descriptor_pool(&self, pool: RawHandle) {
        vulkan_descriptor::destroy_descriptor_pool(&self.ctx.device, pool);
    }

    fn allocate_descriptor_sets(
        &self,
        pool: RawHandle,
        layouts: &[RawHandle],
    ) -> std::result::Result<Vec<RawHandle>, DescriptorAllocError> {
        vulkan_descriptor::allocate_descriptor_sets(&self.ctx.device, pool, layouts)
    }

    fn apply_update_template(&self, set: RawHandle, template: RawHandle, data: &[DescriptorUpdateData]) {
        vulkan_descriptor::apply_update_template(&self.ctx.device, set, template, data);
    }

    // ===== RENDER PASSES =====

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RawHandle> {
        vulkan_render_pass::create_render_pass(&self.ctx.device, desc)
    }

    fn destroy_render_pass(&self, render_pass: RawHandle) {
        vulkan_render_pass::destroy_render_pass(&self.ctx.device, render_pass);
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<RawHandle> {
        vulkan_render_pass::create_framebuffer(&self.ctx.device, desc)
    }

    fn destroy_framebuffer(&self, framebuffer: RawHandle) {
        vulkan_render_pass::destroy_framebuffer(&self.ctx.device, framebuffer);
    }

    // ===== COMMANDS =====

    fn create_command_list(&self, queue_type: QueueType, node_index: u32) -> Result<Box<dyn CommandList>> {
        if node_index != 0 {
            prism_warn!(SOURCE, "Command list requested on node {}; using node 0", node_index);
        }
        Ok(Box::new(VulkanCommandList::new(Arc::clone(&self.ctx), queue_type)?))
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            // 1. Free leftover allocations and release the registry's context reference
            self.resources.release_all();
            ManuallyDrop::drop(&mut self.resources);

            // 2. Destroy the upload command pool
            {
                let mut pool = self
                    .ctx
                    .upload_command_pool
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if *pool != vk::CommandPool::null() {
                    self.ctx.device.destroy_command_pool(*pool, None);
                    *pool = vk::CommandPool::null();
                }
            }

            // 3. Drop the allocator before the device
            match Arc::get_mut(&mut self.ctx) {
                Some(ctx) => ManuallyDrop::drop(&mut ctx.allocator),
                None => prism_error!(SOURCE, "Command lists outlive the device; GPU allocator leaked"),
            }

            // 4. Debug messenger before device and instance
            if let (Some(debug_utils), Some(messenger)) = (&self.ctx.debug_utils_loader, &self.ctx.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }

            // 5. Device and instance
            self.ctx.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
