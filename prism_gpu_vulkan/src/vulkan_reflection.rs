/// SPIR-V reflection into `ShaderReflection`
///
/// Descriptor variables become shader resources at their (set, binding);
/// push constant blocks become a root constant sized by the block.

use prism_gpu::prism::device::{
    DescriptorType, ShaderReflection, ShaderResource, ShaderStageFlags, TextureDimension,
};
use prism_gpu::prism::Result;
use prism_gpu::{prism_bail, prism_err, prism_trace};
use spirq::spirv::Dim;
use spirq::ty::{AccessType, Type};
use spirq::var::Variable;

const SOURCE: &str = "prism::vulkan";

/// Reflect SPIR-V `code` compiled for `stages`
///
/// Resources with the same (set, binding) across entry points are reported once.
pub fn reflect_spirv(code: &[u32], stages: ShaderStageFlags) -> Result<ShaderReflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| prism_err!(SOURCE, "SPIR-V reflection failed: {:?}", e))?;

    if entry_points.is_empty() {
        prism_bail!(SOURCE, "SPIR-V module has no entry point");
    }

    let mut resources: Vec<ShaderResource> = Vec::new();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            let resource = match var {
                Variable::Descriptor { name, desc_bind, desc_ty, ty, nbind } => {
                    let kind = descriptor_kind(desc_ty)?;
                    let name = name.clone().unwrap_or_else(|| {
                        format!("set{}_binding{}", desc_bind.set(), desc_bind.bind())
                    });
                    let mut resource = ShaderResource::new(&name, kind, desc_bind.bind(), desc_bind.set(), stages)
                        .with_size(*nbind);
                    if let Some(dimension) = image_dimension(ty) {
                        resource = resource.with_dimension(dimension);
                    }
                    resource
                }
                Variable::PushConstant { name, ty } => {
                    let name = name.clone().unwrap_or_else(|| "push_constants".to_string());
                    let size = ty.nbyte().unwrap_or(0) as u32;
                    ShaderResource::new(&name, DescriptorType::RootConstant, 0, 0, stages).with_size(size)
                }
                _ => continue,
            };
            let duplicate = resources.iter().any(|r| {
                r.kind == resource.kind && r.set == resource.set && r.register == resource.register
            });
            if !duplicate {
                resources.push(resource);
            }
        }
    }

    prism_trace!(SOURCE, "Reflected {} resource(s) for {:?}", resources.len(), stages);
    Ok(ShaderReflection::new(stages, resources))
}

fn descriptor_kind(desc_ty: &spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as Spv;
    Ok(match desc_ty {
        Spv::UniformBuffer() => DescriptorType::UniformBuffer,
        Spv::StorageBuffer(AccessType::ReadOnly) => DescriptorType::Buffer,
        Spv::StorageBuffer(_) => DescriptorType::RwBuffer,
        Spv::SampledImage() => DescriptorType::Texture,
        Spv::StorageImage(_) => DescriptorType::RwTexture,
        Spv::Sampler() => DescriptorType::Sampler,
        Spv::UniformTexelBuffer() => DescriptorType::TexelBuffer,
        Spv::StorageTexelBuffer(_) => DescriptorType::RwTexelBuffer,
        other => {
            prism_bail!(SOURCE, "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    })
}

/// Dimension of an image variable, looking through descriptor arrays
fn image_dimension(ty: &Type) -> Option<TextureDimension> {
    match ty {
        Type::Array(array) => image_dimension(&array.element_ty),
        Type::SampledImage(image) => Some(texture_dimension(image.dim, image.is_array, image.is_multisampled)),
        Type::StorageImage(image) => Some(texture_dimension(image.dim, image.is_array, image.is_multisampled)),
        _ => None,
    }
}

pub(crate) fn texture_dimension(dim: Dim, is_array: bool, is_multisampled: bool) -> TextureDimension {
    match (dim, is_array, is_multisampled) {
        (Dim::Dim1D, false, _) => TextureDimension::Dim1D,
        (Dim::Dim1D, true, _) => TextureDimension::Dim1DArray,
        (Dim::Dim2D | Dim::DimRect, false, false) => TextureDimension::Dim2D,
        (Dim::Dim2D | Dim::DimRect, true, false) => TextureDimension::Dim2DArray,
        (Dim::Dim2D | Dim::DimRect, false, true) => TextureDimension::Dim2DMS,
        (Dim::Dim2D | Dim::DimRect, true, true) => TextureDimension::Dim2DMSArray,
        (Dim::Dim3D, _, _) => TextureDimension::Dim3D,
        (Dim::DimCube, false, _) => TextureDimension::DimCube,
        (Dim::DimCube, true, _) => TextureDimension::DimCubeArray,
        _ => TextureDimension::Undefined,
    }
}

#[cfg(test)]
#[path = "vulkan_reflection_tests.rs"]
mod tests;
