//! Render pass / framebuffer cache
//!
//! Render passes are keyed by the ordered (format, sample count, load/store
//! actions) of their attachments, framebuffers by the ordered identities and
//! view selectors of their targets. Entries live until the cache shuts down.
//!
//! The cache is sharded by thread. A command stream grabs its thread's shard
//! once; the write lock on the shard map is only taken the first time a
//! thread shows up.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use rustc_hash::{FxHashMap, FxHasher};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AttachmentDesc, ClearValue, FramebufferDesc, GraphicsDevice, LoadAction, RawHandle,
    RenderPassBegin, RenderPassDesc, StoreAction,
};
use crate::resource::RenderTarget;
use crate::{prism_debug, prism_error};

const SOURCE: &str = "prism::render_target_cache";

// ============================================================================
// BIND PARAMETERS
// ============================================================================

/// One attachment of a `bind_render_targets` call
#[derive(Clone, Copy)]
pub struct RenderTargetBinding<'a> {
    pub target: &'a RenderTarget,
    pub mip_slice: Option<u32>,
    pub array_slice: Option<u32>,
}

impl<'a> RenderTargetBinding<'a> {
    pub fn new(target: &'a RenderTarget) -> Self {
        Self {
            target,
            mip_slice: None,
            array_slice: None,
        }
    }

    pub fn with_mip(mut self, mip: u32) -> Self {
        self.mip_slice = Some(mip);
        self
    }

    pub fn with_slice(mut self, slice: u32) -> Self {
        self.array_slice = Some(slice);
        self
    }
}

impl<'a> From<&'a RenderTarget> for RenderTargetBinding<'a> {
    fn from(target: &'a RenderTarget) -> Self {
        Self::new(target)
    }
}

/// Load/store actions and clear values; absent entries fall back to
/// `DontCare` / `Store` and the target's own clear value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadActionsDesc {
    pub color_load: Vec<LoadAction>,
    pub color_store: Vec<StoreAction>,
    pub color_clear: Vec<ClearValue>,
    pub depth_load: LoadAction,
    pub depth_store: StoreAction,
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
    pub depth_clear: Option<ClearValue>,
}

/// Parameters of `Cmd::bind_render_targets`
#[derive(Clone, Copy, Default)]
pub struct BindRenderTargetsDesc<'a> {
    pub color: &'a [RenderTargetBinding<'a>],
    pub depth: Option<RenderTargetBinding<'a>>,
    pub load_actions: Option<&'a LoadActionsDesc>,
}

impl BindRenderTargetsDesc<'_> {
    pub fn is_empty(&self) -> bool {
        self.color.is_empty() && self.depth.is_none()
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// One thread's render passes and framebuffers
#[derive(Default)]
pub struct CacheShard {
    render_passes: Mutex<FxHashMap<u64, RawHandle>>,
    framebuffers: Mutex<FxHashMap<u64, RawHandle>>,
}

/// Totals over every shard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub threads: usize,
    pub render_passes: usize,
    pub framebuffers: usize,
}

pub struct RenderTargetCache {
    shards: RwLock<FxHashMap<ThreadId, Arc<CacheShard>>>,
    device: Arc<dyn GraphicsDevice>,
}

impl RenderTargetCache {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            shards: RwLock::new(FxHashMap::default()),
            device,
        }
    }

    /// Shard of the calling thread, created on first use
    pub fn shard_for_current_thread(&self) -> Arc<CacheShard> {
        let id = thread::current().id();
        if let Some(shard) = self.shards.read().unwrap_or_else(PoisonError::into_inner).get(&id) {
            return Arc::clone(shard);
        }

        let mut shards = self.shards.write().unwrap_or_else(PoisonError::into_inner);
        let shard = shards.entry(id).or_insert_with(|| {
            prism_debug!(SOURCE, "Created render target cache shard for {:?}", id);
            Arc::new(CacheShard::default())
        });
        Arc::clone(shard)
    }

    /// Find or create the render pass and framebuffer for `desc`
    pub fn resolve(&self, shard: &CacheShard, desc: &BindRenderTargetsDesc) -> Result<RenderPassBegin> {
        bindings(desc).try_for_each(|binding| binding_view(binding).map(drop))?;

        let pass_desc = render_pass_desc(desc);
        let pass_hash = hash_of(&pass_desc);
        let framebuffer_hash = framebuffer_hash(desc);

        let render_pass = {
            let mut passes = shard.render_passes.lock().unwrap_or_else(PoisonError::into_inner);
            match passes.get(&pass_hash) {
                Some(&pass) => pass,
                None => {
                    let pass = self.device.create_render_pass(&pass_desc).map_err(|e| {
                        prism_error!(SOURCE, "Failed to create render pass: {}", e);
                        e
                    })?;
                    passes.insert(pass_hash, pass);
                    pass
                }
            }
        };

        let (width, height, layers) = framebuffer_extent(desc);
        let framebuffer = {
            let mut framebuffers = shard.framebuffers.lock().unwrap_or_else(PoisonError::into_inner);
            match framebuffers.get(&framebuffer_hash) {
                Some(&framebuffer) => framebuffer,
                None => {
                    let attachments = attachment_views(desc)?;
                    let framebuffer = self
                        .device
                        .create_framebuffer(&FramebufferDesc {
                            render_pass,
                            attachments,
                            width,
                            height,
                            layers,
                        })
                        .map_err(|e| {
                            prism_error!(SOURCE, "Failed to create framebuffer: {}", e);
                            e
                        })?;
                    framebuffers.insert(framebuffer_hash, framebuffer);
                    framebuffer
                }
            }
        };

        Ok(RenderPassBegin {
            render_pass,
            framebuffer,
            width,
            height,
            clear_values: clear_values(desc),
        })
    }

    pub fn stats(&self) -> CacheStats {
        let shards = self.shards.read().unwrap_or_else(PoisonError::into_inner);
        shards.values().fold(
            CacheStats {
                threads: shards.len(),
                ..Default::default()
            },
            |mut stats, shard| {
                stats.render_passes += shard.render_passes.lock().unwrap_or_else(PoisonError::into_inner).len();
                stats.framebuffers += shard.framebuffers.lock().unwrap_or_else(PoisonError::into_inner).len();
                stats
            },
        )
    }

    /// Destroy every cached object of every thread
    pub fn shutdown(&self) {
        let shards: Vec<Arc<CacheShard>> = self
            .shards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, shard)| shard)
            .collect();

        let mut destroyed = (0, 0);
        for shard in shards {
            for (_, framebuffer) in shard.framebuffers.lock().unwrap_or_else(PoisonError::into_inner).drain() {
                self.device.destroy_framebuffer(framebuffer);
                destroyed.1 += 1;
            }
            for (_, pass) in shard.render_passes.lock().unwrap_or_else(PoisonError::into_inner).drain() {
                self.device.destroy_render_pass(pass);
                destroyed.0 += 1;
            }
        }
        if destroyed != (0, 0) {
            prism_debug!(
                SOURCE,
                "Destroyed {} render passes and {} framebuffers",
                destroyed.0,
                destroyed.1
            );
        }
    }
}

impl Drop for RenderTargetCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// KEYS
// ============================================================================

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Render pass structure of a bind call
pub fn render_pass_desc(desc: &BindRenderTargetsDesc) -> RenderPassDesc {
    let actions = desc.load_actions;
    let color = desc
        .color
        .iter()
        .enumerate()
        .map(|(i, binding)| AttachmentDesc {
            format: binding.target.format(),
            sample_count: binding.target.sample_count(),
            load: actions.and_then(|a| a.color_load.get(i).copied()).unwrap_or_default(),
            store: actions.and_then(|a| a.color_store.get(i).copied()).unwrap_or_default(),
            stencil_load: LoadAction::DontCare,
            stencil_store: StoreAction::DontCare,
        })
        .collect();
    let depth = desc.depth.map(|binding| {
        let has_stencil = binding.target.format().has_stencil();
        AttachmentDesc {
            format: binding.target.format(),
            sample_count: binding.target.sample_count(),
            load: actions.map(|a| a.depth_load).unwrap_or_default(),
            store: actions.map(|a| a.depth_store).unwrap_or_default(),
            stencil_load: match actions {
                Some(a) if has_stencil => a.stencil_load,
                _ => LoadAction::DontCare,
            },
            stencil_store: match actions {
                Some(a) if has_stencil => a.stencil_store,
                _ => StoreAction::DontCare,
            },
        }
    });
    RenderPassDesc { color, depth }
}

/// Framebuffer key of a bind call
pub fn framebuffer_hash(desc: &BindRenderTargetsDesc) -> u64 {
    let mut hasher = FxHasher::default();
    for binding in desc.color.iter().chain(desc.depth.iter()) {
        binding.target.id().hash(&mut hasher);
        binding.mip_slice.hash(&mut hasher);
        binding.array_slice.hash(&mut hasher);
    }
    desc.depth.is_some().hash(&mut hasher);
    hasher.finish()
}

fn bindings<'a>(desc: &'a BindRenderTargetsDesc<'a>) -> impl Iterator<Item = &'a RenderTargetBinding<'a>> {
    desc.color.iter().chain(desc.depth.iter())
}

/// Smallest extent over every attachment at its selected mip
fn framebuffer_extent(desc: &BindRenderTargetsDesc) -> (u32, u32, u32) {
    bindings(desc).fold((u32::MAX, u32::MAX, u32::MAX), |(w, h, l), binding| {
        let (width, height) = binding.target.mip_extent(binding.mip_slice.unwrap_or(0));
        let layers = if binding.array_slice.is_some() {
            1
        } else {
            binding.target.array_layers()
        };
        (w.min(width), h.min(height), l.min(layers))
    })
}

fn binding_view(binding: &RenderTargetBinding) -> Result<RawHandle> {
    binding.target.view(binding.mip_slice, binding.array_slice).ok_or_else(|| {
        let message = format!(
            "render target {} has no view for mip {:?} slice {:?}",
            binding.target.id(),
            binding.mip_slice,
            binding.array_slice
        );
        prism_error!(SOURCE, "{}", message);
        Error::InvalidResource(message)
    })
}

fn attachment_views(desc: &BindRenderTargetsDesc) -> Result<Vec<RawHandle>> {
    bindings(desc).map(binding_view).collect()
}

fn clear_values(desc: &BindRenderTargetsDesc) -> Vec<ClearValue> {
    let actions = desc.load_actions;
    let mut values: Vec<ClearValue> = desc
        .color
        .iter()
        .enumerate()
        .map(|(i, binding)| {
            actions
                .and_then(|a| a.color_clear.get(i).copied())
                .unwrap_or_else(|| binding.target.clear_value())
        })
        .collect();
    if let Some(depth) = desc.depth {
        values.push(
            actions
                .and_then(|a| a.depth_clear)
                .unwrap_or_else(|| depth.target.clear_value()),
        );
    }
    values
}

#[cfg(test)]
#[path = "render_target_cache_tests.rs"]
mod tests;
