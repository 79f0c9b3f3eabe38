/// VulkanCommandList - Vulkan implementation of the CommandList trait

use ash::vk;
use prism_gpu::prism::barrier::BarrierBatch;
use prism_gpu::prism::device::{
    CommandList, PipelineType, QueueType, RawHandle, RenderPassBegin, ShaderStageFlags,
};
use prism_gpu::prism::{Error, Result};
use prism_gpu::{prism_err, prism_warn};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::*;
use crate::vulkan_resource::vk_handle;

const SOURCE: &str = "prism::vulkan";

/// Vulkan command list
///
/// Owns its command pool, created on the family of its queue type.
pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    queue_type: QueueType,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    is_recording: bool,
    in_render_pass: bool,
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue_type: QueueType) -> Result<Self> {
        let family = ctx.queues.get(queue_type).family;
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| prism_err!(SOURCE, "Failed to create command pool: {:?}", e))?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(prism_err!(SOURCE, "Failed to allocate command buffer: {:?}", e));
                }
            };

            Ok(Self {
                ctx,
                queue_type,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    /// Underlying Vulkan command buffer, for submission by the application
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn check_recording(&self, command: &str) -> bool {
        if !self.is_recording {
            prism_warn!(SOURCE, "{} ignored: command list not recording", command);
        }
        self.is_recording
    }
}

impl CommandList for VulkanCommandList {
    fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(Error::BackendError("Command list already recording".to_string()));
        }
        let device = &self.ctx.device;
        unsafe {
            device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| Error::BackendError(format!("Failed to reset command buffer: {:?}", e)))?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("Failed to begin command buffer: {:?}", e)))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if !self.is_recording {
            return Err(Error::BackendError("Command list not recording".to_string()));
        }
        if self.in_render_pass {
            return Err(Error::BackendError("Cannot end command list inside a render pass".to_string()));
        }
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| Error::BackendError(format!("Failed to end command buffer: {:?}", e)))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline_type: PipelineType,
        pipeline_layout: RawHandle,
        set_index: u32,
        set: RawHandle,
        dynamic_offsets: &[u32],
    ) {
        if !self.check_recording("bind_descriptor_set") {
            return;
        }
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                pipeline_bind_point(pipeline_type),
                vk_handle(pipeline_layout),
                set_index,
                &[vk_handle(set)],
                dynamic_offsets,
            );
        }
    }

    fn push_constants(&mut self, pipeline_layout: RawHandle, stages: ShaderStageFlags, offset: u32, data: &[u8]) {
        if !self.check_recording("push_constants") {
            return;
        }
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk_handle(pipeline_layout),
                shader_stages_to_vk(stages),
                offset,
                data,
            );
        }
    }

    fn pipeline_barrier(&mut self, batch: &BarrierBatch) {
        if batch.is_empty() || !self.check_recording("pipeline_barrier") {
            return;
        }

        let buffer_barriers: Vec<vk::BufferMemoryBarrier> = batch
            .buffer_barriers
            .iter()
            .map(|barrier| {
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(access_to_vk(barrier.src_access))
                    .dst_access_mask(access_to_vk(barrier.dst_access))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(vk_handle(barrier.buffer))
                    .offset(0)
                    .size(vk::WHOLE_SIZE)
            })
            .collect();

        let image_barriers: Vec<vk::ImageMemoryBarrier> = batch
            .texture_barriers
            .iter()
            .map(|barrier| {
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(access_to_vk(barrier.src_access))
                    .dst_access_mask(access_to_vk(barrier.dst_access))
                    .old_layout(image_layout_to_vk(barrier.old_layout))
                    .new_layout(image_layout_to_vk(barrier.new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(vk_handle(barrier.image))
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: aspect_to_vk(barrier.aspect),
                        base_mip_level: 0,
                        level_count: barrier.mip_levels.max(1),
                        base_array_layer: 0,
                        layer_count: barrier.array_layers.max(1),
                    })
            })
            .collect();

        let mut src_stages = stages_to_vk(batch.src_stages);
        if src_stages.is_empty() {
            src_stages = vk::PipelineStageFlags::TOP_OF_PIPE;
        }
        let mut dst_stages = stages_to_vk(batch.dst_stages);
        if dst_stages.is_empty() {
            dst_stages = vk::PipelineStageFlags::BOTTOM_OF_PIPE;
        }

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &buffer_barriers,
                &image_barriers,
            );
        }
    }

    fn begin_render_pass(&mut self, begin: &RenderPassBegin) {
        if !self.check_recording("begin_render_pass") {
            return;
        }
        if self.in_render_pass {
            prism_warn!(SOURCE, "begin_render_pass ignored: already inside a render pass");
            return;
        }

        let clear_values: Vec<vk::ClearValue> =
            begin.clear_values.iter().copied().map(clear_value_to_vk).collect();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_handle(begin.render_pass))
            .framebuffer(vk_handle(begin.framebuffer))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: begin.width, height: begin.height },
            })
            .clear_values(&clear_values);

        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
    }

    fn end_render_pass(&mut self) {
        if !self.check_recording("end_render_pass") {
            return;
        }
        if !self.in_render_pass {
            prism_warn!(SOURCE, "end_render_pass ignored: no render pass active");
            return;
        }
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            // Freeing the pool frees its command buffer
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

