/// Cmd - command stream with binding state
///
/// Wraps a backend `CommandList` and tracks what the core needs between
/// calls: the bound root signature and the open render pass. One thread
/// records a given `Cmd` at a time.

use std::sync::Arc;

use crate::barrier::{synthesize_barriers, BufferTransition, TextureTransition};
use crate::descriptor::DescriptorSet;
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, QueueType};
use crate::render_target_cache::{BindRenderTargetsDesc, CacheShard, RenderTargetCache};
use crate::root_signature::{DescriptorIndex, RootSignature};
use crate::{prism_error, prism_trace};

const SOURCE: &str = "prism::cmd";

pub struct Cmd {
    list: Box<dyn CommandList>,
    queue_type: QueueType,
    node_index: u32,
    bound_root_signature: Option<u64>,
    active_render_pass: bool,
    cache: Arc<RenderTargetCache>,
    /// Cache shard of the thread that first bound render targets
    shard: Option<Arc<CacheShard>>,
}

impl Cmd {
    pub(crate) fn new(list: Box<dyn CommandList>, node_index: u32, cache: Arc<RenderTargetCache>) -> Self {
        Self {
            queue_type: list.queue_type(),
            list,
            node_index,
            bound_root_signature: None,
            active_render_pass: false,
            cache,
            shard: None,
        }
    }

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    pub fn node_index(&self) -> u32 {
        self.node_index
    }

    pub fn has_active_render_pass(&self) -> bool {
        self.active_render_pass
    }

    /// Backend command list, for commands outside the binding model (draws, dispatches)
    pub fn command_list(&mut self) -> &mut dyn CommandList {
        self.list.as_mut()
    }

    pub fn begin(&mut self) -> Result<()> {
        self.bound_root_signature = None;
        self.active_render_pass = false;
        self.list.begin()
    }

    /// Close any open render pass and finish recording
    pub fn end(&mut self) -> Result<()> {
        self.end_render_pass();
        self.list.end()
    }

    // ===== DESCRIPTORS =====

    /// Bind slot `index` of `set` at its update frequency
    ///
    /// Switching root signatures first binds the signature's empty sets, so
    /// every set index up to the highest used one is bound.
    ///
    /// # Panics
    ///
    /// Panics if `index >= set.max_sets()`.
    pub fn bind_descriptor_set(&mut self, index: u32, set: &DescriptorSet) {
        let handle = set.handle(index);
        let signature = set.root_signature();

        if self.bound_root_signature != Some(signature.id()) {
            self.bound_root_signature = Some(signature.id());
            for (set_index, bucket) in signature.buckets().iter().enumerate() {
                if let Some(empty) = bucket.empty_set() {
                    self.list.bind_descriptor_set(
                        signature.pipeline_type(),
                        signature.pipeline_layout(),
                        set_index as u32,
                        empty,
                        &[],
                    );
                }
            }
        }

        self.list.bind_descriptor_set(
            signature.pipeline_type(),
            signature.pipeline_layout(),
            set.update_frequency().index() as u32,
            handle,
            &set.dynamic_offsets(index),
        );
    }

    /// Write root constant `index`
    pub fn bind_push_constants(&mut self, signature: &RootSignature, index: DescriptorIndex, data: &[u8]) -> Result<()> {
        let info = signature.descriptor(index).ok_or_else(|| {
            prism_error!(SOURCE, "Push constant index {} out of range", index.value());
            Error::InvalidResource(format!("descriptor index {}", index.value()))
        })?;
        let range = info
            .push_constant_index
            .and_then(|i| signature.push_constant_ranges().get(i as usize))
            .ok_or_else(|| {
                prism_error!(SOURCE, "'{}' is not a root constant", info.name);
                Error::InvalidResource(format!("'{}' is not a root constant", info.name))
            })?;

        if data.len() as u32 > range.size || data.len() % 4 != 0 {
            let message = format!(
                "root constant '{}' takes up to {} bytes in multiples of 4, got {}",
                info.name,
                range.size,
                data.len()
            );
            prism_error!(SOURCE, "{}", message);
            return Err(Error::InvalidResource(message));
        }

        self.list
            .push_constants(signature.pipeline_layout(), range.stages, range.offset, data);
        Ok(())
    }

    /// Name lookup over `bind_push_constants`
    pub fn bind_push_constants_by_name(&mut self, signature: &RootSignature, name: &str, data: &[u8]) -> Result<()> {
        let index = signature.descriptor_index(name).ok_or_else(|| {
            prism_error!(SOURCE, "Unknown root constant '{}'", name);
            Error::InvalidDescriptorName(name.to_string())
        })?;
        self.bind_push_constants(signature, index, data)
    }

    /// Write a plain-old-data value as root constant `name`
    pub fn bind_push_constants_pod<T: bytemuck::Pod>(
        &mut self,
        signature: &RootSignature,
        name: &str,
        value: &T,
    ) -> Result<()> {
        self.bind_push_constants_by_name(signature, name, bytemuck::bytes_of(value))
    }

    // ===== BARRIERS =====

    /// Transition resources; returns the number of barriers recorded
    pub fn resource_barrier(&mut self, buffers: &[BufferTransition], textures: &[TextureTransition]) -> usize {
        match synthesize_barriers(self.queue_type, buffers, textures) {
            Some(batch) => {
                prism_trace!(SOURCE, "Recording {} barriers", batch.len());
                self.list.pipeline_barrier(&batch);
                batch.len()
            }
            None => 0,
        }
    }

    // ===== RENDER TARGETS =====

    /// Begin a render pass on the given targets
    ///
    /// An open render pass is ended first. Binding no target only ends it.
    pub fn bind_render_targets(&mut self, desc: &BindRenderTargetsDesc) -> Result<()> {
        self.end_render_pass();
        if desc.is_empty() {
            return Ok(());
        }

        let cache = &self.cache;
        let shard = self.shard.get_or_insert_with(|| cache.shard_for_current_thread());
        let begin = cache.resolve(shard, desc)?;
        self.list.begin_render_pass(&begin);
        self.active_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) {
        if self.active_render_pass {
            self.list.end_render_pass();
            self.active_render_pass = false;
        }
    }
}

impl std::fmt::Debug for Cmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmd")
            .field("queue_type", &self.queue_type)
            .field("node_index", &self.node_index)
            .field("bound_root_signature", &self.bound_root_signature)
            .field("active_render_pass", &self.active_render_pass)
            .finish()
    }
}

#[cfg(test)]
#[path = "cmd_tests.rs"]
mod tests;
