/// Descriptor set layouts, update templates, pipeline layouts and pools
///
/// Update templates read a flat array of `DescriptorRecord`s, one per
/// `DescriptorUpdateData` element, so every template entry uses the same
/// stride and an offset of `data_index * stride`.

use ash::vk;
use prism_gpu::prism::device::{
    DescriptorAllocError, DescriptorPoolDesc, DescriptorSetLayoutDesc, DescriptorUpdateData,
    PipelineLayoutDesc, RawHandle, UpdateTemplateDesc, UpdateTemplateEntry,
};
use prism_gpu::prism::Result;
use prism_gpu::prism_err;
use std::mem::size_of;

use crate::vulkan_format::*;
use crate::vulkan_resource::{raw, vk_handle};

const SOURCE: &str = "prism::vulkan";

/// One element of the data handed to `vkUpdateDescriptorSetWithTemplate`
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) union DescriptorRecord {
    pub image: vk::DescriptorImageInfo,
    pub buffer: vk::DescriptorBufferInfo,
    pub texel_view: vk::BufferView,
}

pub(crate) const RECORD_STRIDE: usize = size_of::<DescriptorRecord>();

pub(crate) fn descriptor_record(data: &DescriptorUpdateData) -> DescriptorRecord {
    match *data {
        DescriptorUpdateData::Image { sampler, view, layout } => DescriptorRecord {
            image: vk::DescriptorImageInfo {
                sampler: vk_handle(sampler),
                image_view: vk_handle(view),
                image_layout: descriptor_image_layout_to_vk(layout),
            },
        },
        DescriptorUpdateData::Buffer { buffer, offset, range } => DescriptorRecord {
            buffer: vk::DescriptorBufferInfo {
                buffer: vk_handle(buffer),
                offset,
                range,
            },
        },
        DescriptorUpdateData::TexelBuffer { view } => DescriptorRecord {
            texel_view: vk_handle(view),
        },
    }
}

pub(crate) fn template_entry(entry: &UpdateTemplateEntry) -> vk::DescriptorUpdateTemplateEntry {
    vk::DescriptorUpdateTemplateEntry {
        dst_binding: entry.binding,
        dst_array_element: 0,
        descriptor_count: entry.count,
        descriptor_type: binding_kind_to_vk(entry.kind),
        offset: entry.data_index as usize * RECORD_STRIDE,
        stride: RECORD_STRIDE,
    }
}

// ===== LAYOUTS =====

pub(crate) fn create_descriptor_set_layout(device: &ash::Device, desc: &DescriptorSetLayoutDesc) -> Result<RawHandle> {
    let immutable: Vec<Vec<vk::Sampler>> = desc
        .bindings
        .iter()
        .map(|binding| binding.immutable_samplers.iter().map(|&s| vk_handle(s)).collect())
        .collect();

    let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
        .bindings
        .iter()
        .zip(&immutable)
        .map(|(binding, samplers)| {
            let mut vk_binding = vk::DescriptorSetLayoutBinding::default()
                .binding(binding.binding)
                .descriptor_type(binding_kind_to_vk(binding.kind))
                .stage_flags(shader_stages_to_vk(binding.stages));
            if !samplers.is_empty() {
                vk_binding = vk_binding.immutable_samplers(samplers);
            }
            // immutable_samplers() overwrites the count
            vk_binding.descriptor_count(binding.count)
        })
        .collect();

    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    unsafe {
        device
            .create_descriptor_set_layout(&create_info, None)
            .map(raw)
            .map_err(|e| prism_err!(SOURCE, "Failed to create descriptor set layout: {:?}", e))
    }
}

pub(crate) fn destroy_descriptor_set_layout(device: &ash::Device, layout: RawHandle) {
    unsafe { device.destroy_descriptor_set_layout(vk_handle(layout), None) }
}

// ===== UPDATE TEMPLATES =====

pub(crate) fn create_update_template(device: &ash::Device, desc: &UpdateTemplateDesc) -> Result<RawHandle> {
    let entries: Vec<vk::DescriptorUpdateTemplateEntry> = desc.entries.iter().map(template_entry).collect();
    let create_info = vk::DescriptorUpdateTemplateCreateInfo::default()
        .descriptor_update_entries(&entries)
        .template_type(vk::DescriptorUpdateTemplateType::DESCRIPTOR_SET)
        .descriptor_set_layout(vk_handle(desc.layout));
    unsafe {
        device
            .create_descriptor_update_template(&create_info, None)
            .map(raw)
            .map_err(|e| prism_err!(SOURCE, "Failed to create descriptor update template: {:?}", e))
    }
}

pub(crate) fn destroy_update_template(device: &ash::Device, template: RawHandle) {
    unsafe { device.destroy_descriptor_update_template(vk_handle(template), None) }
}

pub(crate) fn apply_update_template(
    device: &ash::Device,
    set: RawHandle,
    template: RawHandle,
    data: &[DescriptorUpdateData],
) {
    let records: Vec<DescriptorRecord> = data.iter().map(descriptor_record).collect();
    unsafe {
        device.update_descriptor_set_with_template(
            vk_handle(set),
            vk_handle(template),
            records.as_ptr() as *const std::ffi::c_void,
        );
    }
}

// ===== PIPELINE LAYOUTS =====

pub(crate) fn create_pipeline_layout(device: &ash::Device, desc: &PipelineLayoutDesc) -> Result<RawHandle> {
    let set_layouts: Vec<vk::DescriptorSetLayout> = desc.set_layouts.iter().map(|&l| vk_handle(l)).collect();
    let ranges: Vec<vk::PushConstantRange> = desc
        .push_constants
        .iter()
        .map(|range| vk::PushConstantRange {
            stage_flags: shader_stages_to_vk(range.stages),
            offset: range.offset,
            size: range.size,
        })
        .collect();
    let create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&set_layouts)
        .push_constant_ranges(&ranges);
    unsafe {
        device
            .create_pipeline_layout(&create_info, None)
            .map(raw)
            .map_err(|e| prism_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))
    }
}

pub(crate) fn destroy_pipeline_layout(device: &ash::Device, layout: RawHandle) {
    unsafe { device.destroy_pipeline_layout(vk_handle(layout), None) }
}

// ===== POOLS =====

pub(crate) fn create_descriptor_pool(device: &ash::Device, desc: &DescriptorPoolDesc) -> Result<RawHandle> {
    let pool_sizes: Vec<vk::DescriptorPoolSize> = desc
        .pool_sizes
        .iter()
        .filter(|size| size.count > 0)
        .map(|size| vk::DescriptorPoolSize {
            ty: binding_kind_to_vk(size.kind),
            descriptor_count: size.count,
        })
        .collect();
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(desc.max_sets)
        .pool_sizes(&pool_sizes);
    unsafe {
        device
            .create_descriptor_pool(&create_info, None)
            .map(raw)
            .map_err(|e| prism_err!(SOURCE, "Failed to create descriptor pool ({} sets): {:?}", desc.max_sets, e))
    }
}

pub(crate) fn destroy_descriptor_pool(device: &ash::Device, pool: RawHandle) {
    unsafe { device.destroy_descriptor_pool(vk_handle(pool), None) }
}

pub(crate) fn allocate_descriptor_sets(
    device: &ash::Device,
    pool: RawHandle,
    layouts: &[RawHandle],
) -> std::result::Result<Vec<RawHandle>, DescriptorAllocError> {
    let set_layouts: Vec<vk::DescriptorSetLayout> = layouts.iter().map(|&l| vk_handle(l)).collect();
    let allocate_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(vk_handle(pool))
        .set_layouts(&set_layouts);
    match unsafe { device.allocate_descriptor_sets(&allocate_info) } {
        Ok(sets) => Ok(sets.into_iter().map(raw).collect()),
        Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
            Err(DescriptorAllocError::OutOfPoolMemory)
        }
        Err(e) => Err(DescriptorAllocError::Backend(prism_err!(
            SOURCE,
            "Failed to allocate {} descriptor set(s): {:?}",
            layouts.len(),
            e
        ))),
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_tests.rs"]
mod tests;
