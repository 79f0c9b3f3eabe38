/// Buffers, textures, render targets and samplers
///
/// Memory comes from gpu-allocator. Allocations are kept in a registry keyed
/// by the raw Vulkan handle so the handle-based destroy calls of the
/// `GraphicsDevice` trait can free them.

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use prism_gpu::prism::barrier::{
    determine_pipeline_stages, resource_state_to_access, resource_state_to_image_layout, ImageLayout,
};
use prism_gpu::prism::device::{
    BufferDesc, BufferHandles, BufferUsage, QueueType, RawHandle, RenderTargetDesc,
    RenderTargetHandles, RenderTargetViews, SamplerDesc, TextureDesc, TextureHandles,
    TextureDimension, TextureUsage,
};
use prism_gpu::prism::resource::RenderTarget;
use prism_gpu::prism::{Error, Result};
use prism_gpu::{prism_err, prism_error, prism_trace};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::*;

const SOURCE: &str = "prism::vulkan";

pub(crate) fn raw<H: Handle>(handle: H) -> RawHandle {
    RawHandle(handle.as_raw())
}

pub(crate) fn vk_handle<H: Handle>(handle: RawHandle) -> H {
    H::from_raw(handle.0)
}

/// Allocations owned by live buffers and images
pub(crate) struct ResourceRegistry {
    ctx: Arc<GpuContext>,
    buffers: Mutex<FxHashMap<u64, Allocation>>,
    images: Mutex<FxHashMap<u64, Allocation>>,
}

impl ResourceRegistry {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            buffers: Mutex::new(FxHashMap::default()),
            images: Mutex::new(FxHashMap::default()),
        }
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.ctx
            .allocator()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                prism_error!(SOURCE, "Out of GPU memory for '{}' ({:.2} MB): {:?}", name, size_mb, e);
                Error::OutOfMemory
            })
    }

    fn free(&self, allocation: Allocation) {
        if let Err(e) = self.ctx.allocator().free(allocation) {
            prism_error!(SOURCE, "Failed to free GPU allocation: {:?}", e);
        }
    }

    // ===== BUFFERS =====

    pub(crate) fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferHandles> {
        let device = &self.ctx.device;
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let buffer = device.create_buffer(&create_info, None).map_err(|e| {
                prism_err!(SOURCE, "Failed to create buffer '{}' of size {} bytes: {:?}", desc.name, desc.size, e)
            })?;

            let requirements = device.get_buffer_memory_requirements(buffer);
            let allocation = match self.allocate(&desc.name, requirements, memory_usage_to_location(desc.memory), true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };
            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                device.destroy_buffer(buffer, None);
                self.free(allocation);
                return Err(prism_err!(SOURCE, "Failed to bind buffer memory: {:?}", e));
            }
            self.buffers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(buffer.as_raw(), allocation);

            let mut handles = BufferHandles {
                buffer: raw(buffer),
                uniform_texel_view: None,
                storage_texel_view: None,
            };
            if let Some(format) = desc.texel_format {
                let view_info = vk::BufferViewCreateInfo::default()
                    .buffer(buffer)
                    .format(texture_format_to_vk(format))
                    .offset(0)
                    .range(vk::WHOLE_SIZE);
                // Both texel views share the same description
                for (index, usage) in [BufferUsage::UNIFORM_TEXEL, BufferUsage::STORAGE_TEXEL].into_iter().enumerate() {
                    if desc.usage.contains(usage) {
                        let view = device.create_buffer_view(&view_info, None).map_err(|e| {
                            prism_err!(SOURCE, "Failed to create texel view for buffer '{}': {:?}", desc.name, e)
                        });
                        match view {
                            Ok(view) => {
                                let slot = if index == 0 {
                                    &mut handles.uniform_texel_view
                                } else {
                                    &mut handles.storage_texel_view
                                };
                                *slot = Some(raw(view));
                            }
                            Err(e) => {
                                self.destroy_buffer(&handles);
                                return Err(e);
                            }
                        }
                    }
                }
            }
            Ok(handles)
        }
    }

    pub(crate) fn destroy_buffer(&self, handles: &BufferHandles) {
        let device = &self.ctx.device;
        unsafe {
            for view in [handles.uniform_texel_view, handles.storage_texel_view].into_iter().flatten() {
                device.destroy_buffer_view(vk_handle(view), None);
            }
            device.destroy_buffer(vk_handle(handles.buffer), None);
        }
        let allocation = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handles.buffer.0);
        if let Some(allocation) = allocation {
            self.free(allocation);
        }
    }

    // ===== TEXTURES =====

    pub(crate) fn create_texture(&self, desc: &TextureDesc) -> Result<TextureHandles> {
        let device = &self.ctx.device;
        let layers = desc.array_layers.max(1);
        let mips = desc.mip_levels.max(1);
        let format = texture_format_to_vk(desc.format);

        let mut flags = vk::ImageCreateFlags::empty();
        if desc.dimension.is_cube() {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(image_type_for(desc.dimension))
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.width.max(1),
                    height: desc.height.max(1),
                    depth: if desc.dimension == TextureDimension::Dim3D { desc.depth.max(1) } else { 1 },
                })
                .mip_levels(mips)
                .array_layers(layers)
                .samples(sample_count_to_vk(desc.sample_count))
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(texture_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = device.create_image(&image_info, None).map_err(|e| {
                prism_err!(SOURCE, "Failed to create image '{}' ({}x{}): {:?}", desc.name, desc.width, desc.height, e)
            })?;

            let requirements = device.get_image_memory_requirements(image);
            let allocation = match self.allocate(&desc.name, requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(e);
                }
            };
            if let Err(e) = device.bind_image_memory(image, allocation.memory(), allocation.offset()) {
                device.destroy_image(image, None);
                self.free(allocation);
                return Err(prism_err!(SOURCE, "Failed to bind image memory: {:?}", e));
            }
            self.images
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(image.as_raw(), allocation);

            let mut handles = TextureHandles {
                image: raw(image),
                srv: RawHandle::NULL,
                uav_mips: Vec::new(),
            };
            if let Err(e) = self.create_texture_views(image, format, desc, &mut handles) {
                self.destroy_texture(&handles);
                return Err(e);
            }
            if let Err(e) = self.transition_to_start_state(image, desc) {
                self.destroy_texture(&handles);
                return Err(e);
            }
            prism_trace!(SOURCE, "Created image '{}' ({} mips, {} layers)", desc.name, mips, layers);
            Ok(handles)
        }
    }

    unsafe fn create_texture_views(
        &self,
        image: vk::Image,
        format: vk::Format,
        desc: &TextureDesc,
        handles: &mut TextureHandles,
    ) -> Result<()> {
        let layers = desc.array_layers.max(1);
        let mips = desc.mip_levels.max(1);

        handles.srv = raw(self.create_view(
            image,
            view_type_for(desc.dimension),
            format,
            sampled_aspect(desc.format),
            (0, mips),
            (0, layers),
        )?);

        if desc.usage.contains(TextureUsage::STORAGE) && desc.sample_count <= 1 {
            for mip in 0..mips {
                let view = self.create_view(
                    image,
                    storage_view_type_for(desc.dimension),
                    format,
                    vk::ImageAspectFlags::COLOR,
                    (mip, 1),
                    (0, layers),
                )?;
                handles.uav_mips.push(raw(view));
            }
        }
        Ok(())
    }

    unsafe fn create_view(
        &self,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
        (base_mip_level, level_count): (u32, u32),
        (base_array_layer, layer_count): (u32, u32),
    ) -> Result<vk::ImageView> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level,
                level_count,
                base_array_layer,
                layer_count,
            });
        self.ctx
            .device
            .create_image_view(&view_info, None)
            .map_err(|e| prism_err!(SOURCE, "Failed to create image view: {:?}", e))
    }

    /// Move a fresh image from UNDEFINED to the layout of its start state
    fn transition_to_start_state(&self, image: vk::Image, desc: &TextureDesc) -> Result<()> {
        let new_layout = resource_state_to_image_layout(desc.start_state);
        if new_layout == ImageLayout::Undefined {
            return Ok(());
        }
        let dst_access = resource_state_to_access(desc.start_state);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(image_layout_to_vk(new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: format_aspect(desc.format),
                base_mip_level: 0,
                level_count: desc.mip_levels.max(1),
                base_array_layer: 0,
                layer_count: desc.array_layers.max(1),
            })
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(access_to_vk(dst_access));
        let dst_stages = stages_to_vk(determine_pipeline_stages(dst_access, QueueType::Graphics));

        self.ctx.one_shot(|device, command_buffer| unsafe {
            device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        })
    }

    pub(crate) fn destroy_texture(&self, handles: &TextureHandles) {
        let device = &self.ctx.device;
        unsafe {
            for &view in handles.uav_mips.iter().chain(std::iter::once(&handles.srv)) {
                if !view.is_null() {
                    device.destroy_image_view(vk_handle(view), None);
                }
            }
            device.destroy_image(vk_handle(handles.image), None);
        }
        let allocation = self
            .images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handles.image.0);
        if let Some(allocation) = allocation {
            self.free(allocation);
        }
    }

    // ===== RENDER TARGETS =====

    pub(crate) fn create_render_target(&self, desc: &RenderTargetDesc) -> Result<RenderTargetHandles> {
        let texture_desc = RenderTarget::texture_desc(desc);
        let texture = self.create_texture(&texture_desc)?;
        let mut views = RenderTargetViews::default();
        match unsafe { self.create_attachment_views(&texture, &texture_desc, &mut views) } {
            Ok(()) => Ok(RenderTargetHandles { texture, views }),
            Err(e) => {
                self.destroy_render_target_views(&views);
                self.destroy_texture(&texture);
                Err(e)
            }
        }
    }

    unsafe fn create_attachment_views(
        &self,
        texture: &TextureHandles,
        desc: &TextureDesc,
        views: &mut RenderTargetViews,
    ) -> Result<()> {
        let image: vk::Image = vk_handle(texture.image);
        let format = texture_format_to_vk(desc.format);
        let aspect = format_aspect(desc.format);
        let layers = desc.array_layers;
        let layered_type = if layers > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };

        views.attachment = raw(self.create_view(image, layered_type, format, aspect, (0, 1), (0, layers))?);
        for mip in 0..desc.mip_levels {
            let view = self.create_view(image, layered_type, format, aspect, (mip, 1), (0, layers))?;
            views.mip_views.push(raw(view));
        }
        for mip in 0..desc.mip_levels {
            for layer in 0..layers {
                let view = self.create_view(image, vk::ImageViewType::TYPE_2D, format, aspect, (mip, 1), (layer, 1))?;
                views.slice_views.push(raw(view));
            }
        }
        Ok(())
    }

    pub(crate) fn destroy_render_target_views(&self, views: &RenderTargetViews) {
        let device = &self.ctx.device;
        let all = std::iter::once(&views.attachment)
            .chain(views.mip_views.iter())
            .chain(views.slice_views.iter());
        unsafe {
            for &view in all {
                if !view.is_null() {
                    device.destroy_image_view(vk_handle(view), None);
                }
            }
        }
    }

    // ===== SAMPLERS =====

    pub(crate) fn create_sampler(&self, desc: &SamplerDesc) -> Result<RawHandle> {
        let anisotropy = desc.max_anisotropy.filter(|_| self.ctx.anisotropy_enabled);
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mip_filter_to_vk(desc.mip_filter))
            .address_mode_u(address_mode_to_vk(desc.address_u))
            .address_mode_v(address_mode_to_vk(desc.address_v))
            .address_mode_w(address_mode_to_vk(desc.address_w))
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE);
        unsafe {
            self.ctx
                .device
                .create_sampler(&sampler_info, None)
                .map(raw)
                .map_err(|e| prism_err!(SOURCE, "Failed to create sampler: {:?}", e))
        }
    }

    pub(crate) fn destroy_sampler(&self, sampler: RawHandle) {
        unsafe {
            self.ctx.device.destroy_sampler(vk_handle(sampler), None);
        }
    }

    /// Free every allocation still registered (device teardown)
    pub(crate) fn release_all(&self) {
        let buffers: Vec<Allocation> = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, allocation)| allocation)
            .collect();
        let images: Vec<Allocation> = self
            .images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, allocation)| allocation)
            .collect();
        if !buffers.is_empty() || !images.is_empty() {
            prism_error!(
                SOURCE,
                "{} buffer(s) and {} image(s) still alive at device teardown",
                buffers.len(),
                images.len()
            );
        }
        for allocation in buffers.into_iter().chain(images) {
            self.free(allocation);
        }
    }
}
