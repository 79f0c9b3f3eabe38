/// Conversions between prism types and Vulkan enumerations
///
/// Pure functions, unit tested in `vulkan_format_tests.rs`. Access, stage,
/// aspect and shader-stage bitflags share their bit values with Vulkan and
/// convert with `from_raw`.

use ash::vk;
use gpu_allocator::MemoryLocation;
use prism_gpu::prism::barrier::{AccessFlags, ImageLayout, PipelineStageFlags, TextureAspect};
use prism_gpu::prism::device::{
    AddressMode, BindingKind, BufferUsage, ClearValue, DescriptorImageLayout, Filter, LoadAction,
    MemoryUsage, PipelineType, ShaderStageFlags, StoreAction, TextureDimension, TextureFormat,
    TextureUsage,
};

// ===== FORMATS =====

pub fn texture_format_to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::B8G8R8A8_UNORM => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::R10G10B10A2_UNORM => vk::Format::A2B10G10R10_UNORM_PACK32,
        TextureFormat::R16G16B16A16_SFLOAT => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::R32G32B32A32_SFLOAT => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::R32_SFLOAT => vk::Format::R32_SFLOAT,
        TextureFormat::R32_UINT => vk::Format::R32_UINT,
        TextureFormat::D16_UNORM => vk::Format::D16_UNORM,
        TextureFormat::D32_FLOAT => vk::Format::D32_SFLOAT,
        TextureFormat::D24_UNORM_S8_UINT => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32_FLOAT_S8_UINT => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

pub fn sample_count_to_vk(samples: u32) -> vk::SampleCountFlags {
    match samples {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

/// Aspects of an attachment or barrier covering the whole format
pub fn format_aspect(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Aspect of a sampled view (depth only for depth/stencil formats)
pub fn sampled_aspect(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

// ===== USAGE =====

pub fn texture_usage_to_vk(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::TRANSFER_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    flags
}

pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let pairs = [
        (BufferUsage::VERTEX, vk::BufferUsageFlags::VERTEX_BUFFER),
        (BufferUsage::INDEX, vk::BufferUsageFlags::INDEX_BUFFER),
        (BufferUsage::UNIFORM, vk::BufferUsageFlags::UNIFORM_BUFFER),
        (BufferUsage::STORAGE, vk::BufferUsageFlags::STORAGE_BUFFER),
        (BufferUsage::INDIRECT, vk::BufferUsageFlags::INDIRECT_BUFFER),
        (BufferUsage::UNIFORM_TEXEL, vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER),
        (BufferUsage::STORAGE_TEXEL, vk::BufferUsageFlags::STORAGE_TEXEL_BUFFER),
        (BufferUsage::TRANSFER_SRC, vk::BufferUsageFlags::TRANSFER_SRC),
        (BufferUsage::TRANSFER_DST, vk::BufferUsageFlags::TRANSFER_DST),
    ];
    pairs
        .iter()
        .filter(|(ours, _)| usage.contains(*ours))
        .fold(vk::BufferUsageFlags::empty(), |acc, (_, theirs)| acc | *theirs)
}

pub fn memory_usage_to_location(memory: MemoryUsage) -> MemoryLocation {
    match memory {
        MemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        MemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
    }
}

// ===== DIMENSIONS =====

pub fn image_type_for(dimension: TextureDimension) -> vk::ImageType {
    match dimension {
        TextureDimension::Dim1D | TextureDimension::Dim1DArray => vk::ImageType::TYPE_1D,
        TextureDimension::Dim3D => vk::ImageType::TYPE_3D,
        _ => vk::ImageType::TYPE_2D,
    }
}

pub fn view_type_for(dimension: TextureDimension) -> vk::ImageViewType {
    match dimension {
        TextureDimension::Dim1D => vk::ImageViewType::TYPE_1D,
        TextureDimension::Dim1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureDimension::Dim3D => vk::ImageViewType::TYPE_3D,
        TextureDimension::DimCube => vk::ImageViewType::CUBE,
        TextureDimension::DimCubeArray => vk::ImageViewType::CUBE_ARRAY,
        TextureDimension::Dim2DArray | TextureDimension::Dim2DMSArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureDimension::Undefined | TextureDimension::Dim2D | TextureDimension::Dim2DMS => {
            vk::ImageViewType::TYPE_2D
        }
    }
}

/// Storage views of cube textures address faces as array layers
pub fn storage_view_type_for(dimension: TextureDimension) -> vk::ImageViewType {
    if dimension.is_cube() {
        vk::ImageViewType::TYPE_2D_ARRAY
    } else {
        view_type_for(dimension)
    }
}

// ===== BINDING MODEL =====

pub fn binding_kind_to_vk(kind: BindingKind) -> vk::DescriptorType {
    match kind {
        BindingKind::Sampler => vk::DescriptorType::SAMPLER,
        BindingKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        BindingKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        BindingKind::UniformTexelBuffer => vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
        BindingKind::StorageTexelBuffer => vk::DescriptorType::STORAGE_TEXEL_BUFFER,
        BindingKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        BindingKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        BindingKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    }
}

pub fn shader_stages_to_vk(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    vk::ShaderStageFlags::from_raw(stages.bits())
}

pub fn descriptor_image_layout_to_vk(layout: DescriptorImageLayout) -> vk::ImageLayout {
    match layout {
        DescriptorImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        DescriptorImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        DescriptorImageLayout::General => vk::ImageLayout::GENERAL,
    }
}

pub fn pipeline_bind_point(pipeline_type: PipelineType) -> vk::PipelineBindPoint {
    match pipeline_type {
        PipelineType::Graphics => vk::PipelineBindPoint::GRAPHICS,
        PipelineType::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

// ===== SAMPLERS =====

pub fn filter_to_vk(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Nearest => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mip_filter_to_vk(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Nearest => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

// ===== RENDER PASSES =====

pub fn load_action_to_vk(action: LoadAction) -> vk::AttachmentLoadOp {
    match action {
        LoadAction::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        LoadAction::Load => vk::AttachmentLoadOp::LOAD,
        LoadAction::Clear => vk::AttachmentLoadOp::CLEAR,
    }
}

pub fn store_action_to_vk(action: StoreAction) -> vk::AttachmentStoreOp {
    match action {
        StoreAction::Store => vk::AttachmentStoreOp::STORE,
        StoreAction::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn clear_value_to_vk(value: ClearValue) -> vk::ClearValue {
    match value {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

// ===== BARRIERS =====

pub fn image_layout_to_vk(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn access_to_vk(access: AccessFlags) -> vk::AccessFlags {
    vk::AccessFlags::from_raw(access.bits())
}

pub fn stages_to_vk(stages: PipelineStageFlags) -> vk::PipelineStageFlags {
    vk::PipelineStageFlags::from_raw(stages.bits())
}

pub fn aspect_to_vk(aspect: TextureAspect) -> vk::ImageAspectFlags {
    vk::ImageAspectFlags::from_raw(aspect.bits())
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
