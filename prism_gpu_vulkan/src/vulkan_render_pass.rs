/// Render pass and framebuffer creation
///
/// Attachments enter and leave the pass in their attachment-optimal layout;
/// the barrier tracker moves render targets into that layout beforehand.

use ash::vk;
use prism_gpu::prism::device::{AttachmentDesc, FramebufferDesc, RawHandle, RenderPassDesc};
use prism_gpu::prism::Result;
use prism_gpu::prism_err;

use crate::vulkan_format::*;
use crate::vulkan_resource::{raw, vk_handle};

const SOURCE: &str = "prism::vulkan";

fn attachment_description(attachment: &AttachmentDesc, layout: vk::ImageLayout) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(texture_format_to_vk(attachment.format))
        .samples(sample_count_to_vk(attachment.sample_count))
        .load_op(load_action_to_vk(attachment.load))
        .store_op(store_action_to_vk(attachment.store))
        .stencil_load_op(load_action_to_vk(attachment.stencil_load))
        .stencil_store_op(store_action_to_vk(attachment.stencil_store))
        .initial_layout(layout)
        .final_layout(layout)
}

pub(crate) fn create_render_pass(device: &ash::Device, desc: &RenderPassDesc) -> Result<RawHandle> {
    let mut attachments = Vec::with_capacity(desc.color.len() + 1);
    let mut color_refs = Vec::with_capacity(desc.color.len());

    for (i, color) in desc.color.iter().enumerate() {
        attachments.push(attachment_description(color, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL));
        color_refs.push(
            vk::AttachmentReference::default()
                .attachment(i as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
        );
    }

    let depth_ref = desc.depth.as_ref().map(|depth| {
        let index = attachments.len() as u32;
        attachments.push(attachment_description(depth, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL));
        vk::AttachmentReference::default()
            .attachment(index)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(ref depth_ref) = depth_ref {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }

    let (stage_mask, access_mask) = if depth_ref.is_some() {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )
    } else {
        (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        )
    };
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stage_mask)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stage_mask)
        .dst_access_mask(access_mask);

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));

    unsafe {
        device
            .create_render_pass(&render_pass_info, None)
            .map(raw)
            .map_err(|e| prism_err!(SOURCE, "Failed to create render pass: {:?}", e))
    }
}

pub(crate) fn destroy_render_pass(device: &ash::Device, render_pass: RawHandle) {
    unsafe { device.destroy_render_pass(vk_handle(render_pass), None) }
}

pub(crate) fn create_framebuffer(device: &ash::Device, desc: &FramebufferDesc) -> Result<RawHandle> {
    let attachments: Vec<vk::ImageView> = desc.attachments.iter().map(|&view| vk_handle(view)).collect();
    let framebuffer_info = vk::FramebufferCreateInfo::default()
        .render_pass(vk_handle(desc.render_pass))
        .attachments(&attachments)
        .width(desc.width)
        .height(desc.height)
        .layers(desc.layers.max(1));
    unsafe {
        device
            .create_framebuffer(&framebuffer_info, None)
            .map(raw)
            .map_err(|e| {
                prism_err!(SOURCE, "Failed to create framebuffer {}x{}x{}: {:?}", desc.width, desc.height, desc.layers, e)
            })
    }
}

pub(crate) fn destroy_framebuffer(device: &ash::Device, framebuffer: RawHandle) {
    unsafe { device.destroy_framebuffer(vk_handle(framebuffer), None) }
}
