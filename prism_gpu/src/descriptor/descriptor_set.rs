/// Descriptor set - `max_sets` backend sets for one update frequency
///
/// Each slot keeps a shadow copy of its update data. Updates write the
/// shadow and push it to the backend with a single update-template apply.
/// Dynamic uniform buffers only re-apply when their size or buffer changes;
/// their offsets are handed to the command list at bind time.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingKind, DescriptorImageLayout, DescriptorUpdateData, RawHandle,
};
use crate::resource::{Buffer, RenderTarget, Sampler, Texture};
use crate::root_signature::{DescriptorIndex, DescriptorInfo, RootSignature, UpdateFrequency};
use crate::{prism_debug, prism_error};

const SOURCE: &str = "prism::descriptor_set";

// ============================================================================
// ALLOCATION
// ============================================================================

/// Descriptor set allocation parameters
#[derive(Clone, Copy)]
pub struct DescriptorSetDesc<'a> {
    pub root_signature: &'a Arc<RootSignature>,
    pub update_frequency: UpdateFrequency,
    pub max_sets: u32,
    pub node_index: u32,
}

/// Current binding of one dynamic uniform buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicUniformData {
    pub buffer: RawHandle,
    pub offset: u32,
    pub size: u64,
}

pub struct DescriptorSet {
    root_signature: Arc<RootSignature>,
    update_frequency: UpdateFrequency,
    node_index: u32,
    handles: Vec<RawHandle>,
    /// Update data per slot
    shadow: Vec<Vec<DescriptorUpdateData>>,
    /// Dynamic uniform state per slot, by dynamic index
    dynamic: Vec<Vec<DynamicUniformData>>,
}

impl DescriptorSet {
    /// Allocate `max_sets` sets initialised with the signature's default data
    ///
    /// # Panics
    ///
    /// Panics if the signature declares nothing at `update_frequency`, or if
    /// `max_sets` is zero.
    pub(crate) fn new(desc: &DescriptorSetDesc) -> Result<Self> {
        let signature = Arc::clone(desc.root_signature);
        let bucket = signature.bucket(desc.update_frequency);
        let layout = match bucket.layout() {
            Some(layout) if !bucket.is_placeholder() => layout,
            _ => panic!(
                "root signature {} declares no descriptors at {:?}",
                signature.id(),
                desc.update_frequency
            ),
        };
        assert!(desc.max_sets > 0, "descriptor set needs at least one slot");

        let handles = signature.pool().consume(&vec![layout; desc.max_sets as usize])?;

        let defaults = bucket.default_data(desc.node_index).to_vec();
        let dynamic_defaults: Vec<DynamicUniformData> = bucket
            .dynamic_descriptors
            .iter()
            .filter_map(|&index| signature.descriptor(index))
            .map(|info| match info.handle_index.and_then(|i| defaults.get(i as usize)) {
                Some(DescriptorUpdateData::Buffer { buffer, range, .. }) => DynamicUniformData {
                    buffer: *buffer,
                    offset: 0,
                    size: *range,
                },
                _ => DynamicUniformData {
                    buffer: RawHandle::NULL,
                    offset: 0,
                    size: 0,
                },
            })
            .collect();

        if let Some(template) = bucket.update_template() {
            let device = signature.device();
            for &set in &handles {
                device.apply_update_template(set, template, &defaults);
            }
        }

        prism_debug!(
            SOURCE,
            "Allocated {} descriptor sets at {:?} (signature {})",
            desc.max_sets,
            desc.update_frequency,
            signature.id()
        );

        Ok(Self {
            update_frequency: desc.update_frequency,
            node_index: desc.node_index,
            shadow: vec![defaults; handles.len()],
            dynamic: vec![dynamic_defaults; handles.len()],
            handles,
            root_signature: signature,
        })
    }

    pub fn root_signature(&self) -> &Arc<RootSignature> {
        &self.root_signature
    }

    pub fn update_frequency(&self) -> UpdateFrequency {
        self.update_frequency
    }

    pub fn node_index(&self) -> u32 {
        self.node_index
    }

    pub fn max_sets(&self) -> u32 {
        self.handles.len() as u32
    }

    /// Backend set of slot `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= max_sets()`.
    pub fn handle(&self, index: u32) -> RawHandle {
        self.handles[self.check_index(index)]
    }

    /// Shadow update data of slot `index`
    pub fn update_data(&self, index: u32) -> &[DescriptorUpdateData] {
        &self.shadow[self.check_index(index)]
    }

    /// Dynamic uniform state of slot `index`, by dynamic index
    pub fn dynamic_data(&self, index: u32) -> &[DynamicUniformData] {
        &self.dynamic[self.check_index(index)]
    }

    /// Offsets in the order the backend consumes them (ascending binding)
    pub fn dynamic_offsets(&self, index: u32) -> Vec<u32> {
        // Dynamic indices follow descending register order
        self.dynamic[self.check_index(index)]
            .iter()
            .rev()
            .map(|data| data.offset)
            .collect()
    }

    fn check_index(&self, index: u32) -> usize {
        assert!(
            (index as usize) < self.handles.len(),
            "descriptor set index {} out of range (max_sets {})",
            index,
            self.handles.len()
        );
        index as usize
    }

    // ========================================================================
    // UPDATE
    // ========================================================================

    /// Write `params` into slot `index`
    ///
    /// Entries are validated one by one: a rejected entry is logged, listed
    /// in the report and skipped while the others still apply. The backend
    /// set is written at most once per call.
    ///
    /// # Panics
    ///
    /// Panics if `index >= max_sets()`.
    pub fn update(&mut self, index: u32, params: &[DescriptorData]) -> UpdateReport {
        let slot = self.check_index(index);
        let signature = Arc::clone(&self.root_signature);

        let mut report = UpdateReport::default();
        let mut needs_apply = false;

        for (entry_index, param) in params.iter().enumerate() {
            match self.apply_entry(&signature, slot, param) {
                Ok(touched) => {
                    report.applied += 1;
                    needs_apply |= touched;
                }
                Err(reason) => {
                    prism_error!(SOURCE, "Descriptor update entry {} skipped: {}", entry_index, reason);
                    report.failures.push(UpdateFailure { entry_index, reason });
                }
            }
        }

        if needs_apply {
            if let Some(template) = signature.bucket(self.update_frequency).update_template() {
                signature
                    .device()
                    .apply_update_template(self.handles[slot], template, &self.shadow[slot]);
                report.template_applied = true;
            }
        }
        report
    }

    /// Returns whether the backend set must be rewritten
    fn apply_entry(
        &mut self,
        signature: &RootSignature,
        slot: usize,
        param: &DescriptorData,
    ) -> std::result::Result<bool, UpdateFailureReason> {
        let info = match param.target {
            DescriptorTarget::Name(name) => signature
                .descriptor_by_name(name)
                .ok_or_else(|| UpdateFailureReason::UnknownName(name.to_string()))?,
            DescriptorTarget::Index(index) => signature
                .descriptor(index)
                .ok_or(UpdateFailureReason::InvalidIndex(index.value()))?,
        };

        if info.is_static_sampler {
            return Err(UpdateFailureReason::StaticSampler(info.name.clone()));
        }
        let (kind, handle_index) = match (info.binding_kind, info.handle_index) {
            (Some(kind), Some(handle_index)) => (kind, handle_index),
            _ => return Err(UpdateFailureReason::NotUpdatable(info.name.clone())),
        };
        if info.update_frequency != self.update_frequency {
            return Err(UpdateFailureReason::WrongUpdateFrequency {
                name: info.name.clone(),
                declared: info.update_frequency,
                set: self.update_frequency,
            });
        }
        if param.resources.is_empty() {
            return Err(UpdateFailureReason::MissingResource(info.name.clone()));
        }

        if kind == BindingKind::UniformBufferDynamic {
            return self.apply_dynamic(signature, slot, info, handle_index, param);
        }

        let elements = resolve_elements(signature, info, kind, param)?;
        let end = param.array_offset as u64 + elements.len() as u64;
        if end > info.size as u64 {
            return Err(UpdateFailureReason::ArrayOverflow {
                name: info.name.clone(),
                end: u32::try_from(end).unwrap_or(u32::MAX),
                size: info.size,
            });
        }

        let start = (handle_index + param.array_offset) as usize;
        self.shadow[slot][start..start + elements.len()].copy_from_slice(&elements);
        Ok(true)
    }

    fn apply_dynamic(
        &mut self,
        signature: &RootSignature,
        slot: usize,
        info: &DescriptorInfo,
        handle_index: u32,
        param: &DescriptorData,
    ) -> std::result::Result<bool, UpdateFailureReason> {
        let buffer = match param.resources {
            DescriptorResources::Buffers([buffer]) => *buffer,
            DescriptorResources::Buffers(_) => {
                return Err(UpdateFailureReason::ArrayOverflow {
                    name: info.name.clone(),
                    end: param.array_offset.saturating_add(param.resources.len() as u32),
                    size: 1,
                })
            }
            _ => {
                return Err(UpdateFailureReason::KindMismatch {
                    name: info.name.clone(),
                    expected: BindingKind::UniformBufferDynamic,
                })
            }
        };
        if param.array_offset != 0 {
            return Err(UpdateFailureReason::ArrayOverflow {
                name: info.name.clone(),
                end: param.array_offset.saturating_add(1),
                size: 1,
            });
        }

        let (offset, size) = buffer_range(signature, info, BindingKind::UniformBufferDynamic, buffer, param, 0)?;
        let offset = u32::try_from(offset).map_err(|_| UpdateFailureReason::OffsetOverflow {
            name: info.name.clone(),
            offset,
        })?;

        let dynamic_index = info.dynamic_index.unwrap_or(0) as usize;
        let current = &mut self.dynamic[slot][dynamic_index];
        current.offset = offset;
        if current.size == size && current.buffer == buffer.handle() {
            return Ok(false);
        }

        current.size = size;
        current.buffer = buffer.handle();
        self.shadow[slot][handle_index as usize] = DescriptorUpdateData::Buffer {
            buffer: buffer.handle(),
            offset: 0,
            range: size,
        };
        Ok(true)
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        // Sets return to the backend with their pool
        prism_debug!(
            SOURCE,
            "Released {} descriptor sets at {:?}",
            self.handles.len(),
            self.update_frequency
        );
    }
}

impl fmt::Debug for DescriptorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("root_signature", &self.root_signature.id())
            .field("update_frequency", &self.update_frequency)
            .field("max_sets", &self.handles.len())
            .finish()
    }
}

/// Update data for every element of one entry
fn resolve_elements(
    signature: &RootSignature,
    info: &DescriptorInfo,
    kind: BindingKind,
    param: &DescriptorData,
) -> std::result::Result<Vec<DescriptorUpdateData>, UpdateFailureReason> {
    let mismatch = || UpdateFailureReason::KindMismatch {
        name: info.name.clone(),
        expected: kind,
    };
    let missing_view = || UpdateFailureReason::MissingView(info.name.clone());

    match (kind, param.resources) {
        (BindingKind::Sampler, DescriptorResources::Samplers(samplers)) => Ok(samplers
            .iter()
            .map(|sampler| DescriptorUpdateData::Image {
                sampler: sampler.handle(),
                view: RawHandle::NULL,
                layout: DescriptorImageLayout::Undefined,
            })
            .collect()),

        (BindingKind::SampledImage, DescriptorResources::Textures(textures)) => Ok(textures
            .iter()
            .map(|texture| sampled_image(texture.srv()))
            .collect()),
        (BindingKind::SampledImage, DescriptorResources::RenderTargets(targets)) => Ok(targets
            .iter()
            .map(|target| sampled_image(target.texture().srv()))
            .collect()),

        (BindingKind::StorageImage, DescriptorResources::Textures(textures)) => {
            if param.bind_mip_chain {
                let texture = textures[0];
                (0..texture.mip_levels())
                    .map(|mip| texture.uav(mip).map(storage_image).ok_or_else(missing_view))
                    .collect()
            } else {
                let mip = param.uav_mip_slice.unwrap_or(0);
                textures
                    .iter()
                    .map(|texture| texture.uav(mip).map(storage_image).ok_or_else(missing_view))
                    .collect()
            }
        }

        (BindingKind::UniformTexelBuffer, DescriptorResources::Buffers(buffers)) => buffers
            .iter()
            .map(|buffer| {
                buffer
                    .handles()
                    .uniform_texel_view
                    .map(|view| DescriptorUpdateData::TexelBuffer { view })
                    .ok_or_else(missing_view)
            })
            .collect(),
        (BindingKind::StorageTexelBuffer, DescriptorResources::Buffers(buffers)) => buffers
            .iter()
            .map(|buffer| {
                buffer
                    .handles()
                    .storage_texel_view
                    .map(|view| DescriptorUpdateData::TexelBuffer { view })
                    .ok_or_else(missing_view)
            })
            .collect(),

        (BindingKind::UniformBuffer | BindingKind::StorageBuffer, DescriptorResources::Buffers(buffers)) => buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| {
                let (offset, range) = buffer_range(signature, info, kind, buffer, param, i)?;
                Ok(DescriptorUpdateData::Buffer {
                    buffer: buffer.handle(),
                    offset,
                    range,
                })
            })
            .collect(),

        _ => Err(mismatch()),
    }
}

fn sampled_image(view: RawHandle) -> DescriptorUpdateData {
    DescriptorUpdateData::Image {
        sampler: RawHandle::NULL,
        view,
        layout: DescriptorImageLayout::ShaderReadOnly,
    }
}

fn storage_image(view: RawHandle) -> DescriptorUpdateData {
    DescriptorUpdateData::Image {
        sampler: RawHandle::NULL,
        view,
        layout: DescriptorImageLayout::General,
    }
}

/// Byte offset and range of element `i`, validated against the buffer and the device limit
fn buffer_range(
    signature: &RootSignature,
    info: &DescriptorInfo,
    kind: BindingKind,
    buffer: &Buffer,
    param: &DescriptorData,
    i: usize,
) -> std::result::Result<(u64, u64), UpdateFailureReason> {
    let offset = param.offsets.and_then(|offsets| offsets.get(i).copied()).unwrap_or(0);
    let range = param
        .sizes
        .and_then(|sizes| sizes.get(i).copied())
        .unwrap_or_else(|| buffer.size().saturating_sub(offset));

    if offset.checked_add(range).map_or(true, |end| end > buffer.size()) {
        return Err(UpdateFailureReason::RangeExceeded {
            name: info.name.clone(),
            range: offset.saturating_add(range),
            limit: buffer.size(),
        });
    }
    let uniform = matches!(kind, BindingKind::UniformBuffer | BindingKind::UniformBufferDynamic);
    if uniform && range > signature.max_uniform_buffer_range() {
        return Err(UpdateFailureReason::RangeExceeded {
            name: info.name.clone(),
            range,
            limit: signature.max_uniform_buffer_range(),
        });
    }
    Ok((offset, range))
}

// ============================================================================
// UPDATE PARAMETERS
// ============================================================================

/// Which descriptor an update entry writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorTarget<'a> {
    Name(&'a str),
    Index(DescriptorIndex),
}

impl<'a> From<&'a str> for DescriptorTarget<'a> {
    fn from(name: &'a str) -> Self {
        DescriptorTarget::Name(name)
    }
}

impl From<DescriptorIndex> for DescriptorTarget<'_> {
    fn from(index: DescriptorIndex) -> Self {
        DescriptorTarget::Index(index)
    }
}

/// Resources of one update entry, one per array element
#[derive(Clone, Copy)]
pub enum DescriptorResources<'a> {
    Textures(&'a [&'a Texture]),
    RenderTargets(&'a [&'a RenderTarget]),
    Buffers(&'a [&'a Buffer]),
    Samplers(&'a [&'a Sampler]),
}

impl DescriptorResources<'_> {
    pub fn len(&self) -> usize {
        match self {
            DescriptorResources::Textures(r) => r.len(),
            DescriptorResources::RenderTargets(r) => r.len(),
            DescriptorResources::Buffers(r) => r.len(),
            DescriptorResources::Samplers(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One entry of `DescriptorSet::update`
#[derive(Clone, Copy)]
pub struct DescriptorData<'a> {
    pub target: DescriptorTarget<'a>,
    pub resources: DescriptorResources<'a>,
    /// First array element written
    pub array_offset: u32,
    /// Byte offset per buffer (0 when absent)
    pub offsets: Option<&'a [u64]>,
    /// Byte range per buffer (rest of the buffer when absent)
    pub sizes: Option<&'a [u64]>,
    /// Mip of the storage view bound for storage textures
    pub uav_mip_slice: Option<u32>,
    /// Bind every mip of the first texture to consecutive array elements
    pub bind_mip_chain: bool,
}

impl<'a> DescriptorData<'a> {
    pub fn new(target: impl Into<DescriptorTarget<'a>>, resources: DescriptorResources<'a>) -> Self {
        Self {
            target: target.into(),
            resources,
            array_offset: 0,
            offsets: None,
            sizes: None,
            uav_mip_slice: None,
            bind_mip_chain: false,
        }
    }

    pub fn with_array_offset(mut self, array_offset: u32) -> Self {
        self.array_offset = array_offset;
        self
    }

    pub fn with_offsets(mut self, offsets: &'a [u64]) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn with_sizes(mut self, sizes: &'a [u64]) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub fn with_uav_mip_slice(mut self, mip: u32) -> Self {
        self.uav_mip_slice = Some(mip);
        self
    }

    pub fn with_mip_chain(mut self) -> Self {
        self.bind_mip_chain = true;
        self
    }
}

// ============================================================================
// UPDATE REPORT
// ============================================================================

/// Why an update entry was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateFailureReason {
    UnknownName(String),
    InvalidIndex(u32),
    StaticSampler(String),
    /// Root constants are set with push constants
    NotUpdatable(String),
    WrongUpdateFrequency {
        name: String,
        declared: UpdateFrequency,
        set: UpdateFrequency,
    },
    MissingResource(String),
    KindMismatch {
        name: String,
        expected: BindingKind,
    },
    /// Resource lacks the view the descriptor needs (storage mip, texel view)
    MissingView(String),
    ArrayOverflow {
        name: String,
        end: u32,
        size: u32,
    },
    RangeExceeded {
        name: String,
        range: u64,
        limit: u64,
    },
    OffsetOverflow {
        name: String,
        offset: u64,
    },
}

impl fmt::Display for UpdateFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateFailureReason::UnknownName(name) => write!(f, "unknown descriptor '{}'", name),
            UpdateFailureReason::InvalidIndex(index) => write!(f, "invalid descriptor index {}", index),
            UpdateFailureReason::StaticSampler(name) => write!(f, "'{}' is a static sampler", name),
            UpdateFailureReason::NotUpdatable(name) => write!(f, "'{}' is not a descriptor", name),
            UpdateFailureReason::WrongUpdateFrequency { name, declared, set } => write!(
                f,
                "'{}' is declared at {:?}, set is {:?}",
                name, declared, set
            ),
            UpdateFailureReason::MissingResource(name) => write!(f, "no resource given for '{}'", name),
            UpdateFailureReason::KindMismatch { name, expected } => {
                write!(f, "'{}' expects {:?} resources", name, expected)
            }
            UpdateFailureReason::MissingView(name) => write!(f, "resource bound to '{}' lacks the required view", name),
            UpdateFailureReason::ArrayOverflow { name, end, size } => {
                write!(f, "'{}' written up to element {} of {}", name, end, size)
            }
            UpdateFailureReason::RangeExceeded { name, range, limit } => {
                write!(f, "'{}' range {} exceeds {}", name, range, limit)
            }
            UpdateFailureReason::OffsetOverflow { name, offset } => {
                write!(f, "'{}' dynamic offset {} does not fit 32 bits", name, offset)
            }
        }
    }
}

/// A skipped entry of one update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFailure {
    /// Position in the `params` slice
    pub entry_index: usize,
    pub reason: UpdateFailureReason,
}

/// Outcome of `DescriptorSet::update`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub applied: usize,
    pub failures: Vec<UpdateFailure>,
    /// The backend set was rewritten
    pub template_applied: bool,
}

impl UpdateReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// First failure as an `Error`, for callers that treat partial updates as fatal
    pub fn into_result(self) -> Result<()> {
        match self.failures.into_iter().next() {
            None => Ok(()),
            Some(UpdateFailure { reason: UpdateFailureReason::UnknownName(name), .. }) => {
                Err(Error::InvalidDescriptorName(name))
            }
            Some(failure) => Err(Error::InvalidResource(failure.reason.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "descriptor_set_tests.rs"]
mod tests;
