/// CommandList trait - backend command recording
///
/// Recording calls cannot fail on the backends we target, so only `begin`
/// and `end` return a `Result`.

use crate::barrier::BarrierBatch;
use crate::error::Result;
use crate::graphics_device::{ClearValue, QueueType, RawHandle, ShaderStageFlags};

/// Pipeline bind point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineType {
    #[default]
    Graphics,
    Compute,
}

/// Parameters of `CommandList::begin_render_pass`
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassBegin {
    pub render_pass: RawHandle,
    pub framebuffer: RawHandle,
    pub width: u32,
    pub height: u32,
    /// One per attachment (colors first, then depth)
    pub clear_values: Vec<ClearValue>,
}

/// Backend command stream
pub trait CommandList: Send {
    /// Queue family this list records for
    fn queue_type(&self) -> QueueType;

    fn begin(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    fn bind_descriptor_set(
        &mut self,
        pipeline_type: PipelineType,
        pipeline_layout: RawHandle,
        set_index: u32,
        set: RawHandle,
        dynamic_offsets: &[u32],
    );

    fn push_constants(
        &mut self,
        pipeline_layout: RawHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    /// Record every barrier of the batch in one call
    fn pipeline_barrier(&mut self, batch: &BarrierBatch);

    fn begin_render_pass(&mut self, begin: &RenderPassBegin);

    fn end_render_pass(&mut self);
}
