/// Shader reflection input types
///
/// These records are produced by an external SPIR-V/DXIL reflection step
/// (see `prism_gpu_vulkan::reflect_spirv`) and consumed by the root signature
/// builder. They are plain data and never mutated after reflection.

use bitflags::bitflags;

bitflags! {
    /// Shader stage visibility mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x01;
        const TESSELLATION_CONTROL = 0x02;
        const TESSELLATION_EVALUATION = 0x04;
        const GEOMETRY = 0x08;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits();
    }
}

/// Resource kind as declared in shader source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    /// Read-only sampled texture
    Texture,
    /// Read/write storage texture
    RwTexture,
    UniformBuffer,
    /// Read-only structured/raw buffer
    Buffer,
    /// Read/write structured/raw buffer
    RwBuffer,
    /// Read-only typed (texel) buffer
    TexelBuffer,
    /// Read/write typed (texel) buffer
    RwTexelBuffer,
    /// Push constant block (`size` is its byte size)
    RootConstant,
}

/// Texture view dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureDimension {
    Undefined,
    Dim1D,
    Dim2D,
    Dim2DMS,
    Dim3D,
    DimCube,
    Dim1DArray,
    Dim2DArray,
    Dim2DMSArray,
    DimCubeArray,
}

impl TextureDimension {
    /// All concrete dimensions (one default texture is created per entry)
    pub const ALL: [TextureDimension; 9] = [
        TextureDimension::Dim1D,
        TextureDimension::Dim2D,
        TextureDimension::Dim2DMS,
        TextureDimension::Dim3D,
        TextureDimension::DimCube,
        TextureDimension::Dim1DArray,
        TextureDimension::Dim2DArray,
        TextureDimension::Dim2DMSArray,
        TextureDimension::DimCubeArray,
    ];

    pub fn is_multisampled(self) -> bool {
        matches!(self, TextureDimension::Dim2DMS | TextureDimension::Dim2DMSArray)
    }

    pub fn is_cube(self) -> bool {
        matches!(self, TextureDimension::DimCube | TextureDimension::DimCubeArray)
    }

    /// Layer count of the 1x1 default texture of this dimension
    pub fn default_layers(self) -> u32 {
        match self {
            TextureDimension::DimCube => 6,
            TextureDimension::DimCubeArray => 12,
            TextureDimension::Dim1DArray
            | TextureDimension::Dim2DArray
            | TextureDimension::Dim2DMSArray => 2,
            _ => 1,
        }
    }
}

/// One reflected shader resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResource {
    pub name: String,
    /// Binding register within its set
    pub register: u32,
    /// Set index, equal to the update frequency (0 = None .. 3 = PerDraw)
    pub set: u32,
    /// Array size, or byte size for root constants
    pub size: u32,
    pub used_stages: ShaderStageFlags,
    pub kind: DescriptorType,
    pub dimension: TextureDimension,
}

impl ShaderResource {
    pub fn new(
        name: &str,
        kind: DescriptorType,
        register: u32,
        set: u32,
        used_stages: ShaderStageFlags,
    ) -> Self {
        Self {
            name: name.to_string(),
            register,
            set,
            size: 1,
            used_stages,
            kind,
            dimension: if matches!(kind, DescriptorType::Texture | DescriptorType::RwTexture) {
                TextureDimension::Dim2D
            } else {
                TextureDimension::Undefined
            },
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_dimension(mut self, dimension: TextureDimension) -> Self {
        self.dimension = dimension;
        self
    }
}

/// Reflection output for one shader stage (or one multi-stage shader program)
#[derive(Debug, Clone, Default)]
pub struct ShaderReflection {
    pub stages: ShaderStageFlags,
    pub resources: Vec<ShaderResource>,
}

impl ShaderReflection {
    pub fn new(stages: ShaderStageFlags, resources: Vec<ShaderResource>) -> Self {
        Self { stages, resources }
    }
}
