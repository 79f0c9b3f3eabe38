/// Renderer - owns the device-wide binding infrastructure
///
/// One renderer per device. It creates resources with tracked state, builds
/// root signatures, allocates descriptor sets from the shared pool and hands
/// out command streams wired to the render target cache.

use std::sync::Arc;

use crate::descriptor::{DescriptorData, DescriptorPool, DescriptorSet, DescriptorSetDesc, UpdateReport};
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferDesc, DeviceCapabilities, GraphicsDevice, QueueType, RenderTargetDesc, SamplerDesc,
    TextureDesc,
};
use crate::render_target_cache::{CacheStats, RenderTargetCache};
use crate::renderer::{Cmd, RendererConfig};
use crate::resource::{next_resource_id, Buffer, DefaultResources, RenderTarget, Sampler, Texture};
use crate::root_signature::{RootSignature, RootSignatureDesc};
use crate::{prism_error, prism_info};

const SOURCE: &str = "prism::renderer";

/// Descriptor pool usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolStats {
    pub pools: usize,
    pub used_sets: u64,
}

pub struct Renderer {
    config: RendererConfig,
    capabilities: DeviceCapabilities,
    render_target_cache: Arc<RenderTargetCache>,
    default_resources: Arc<DefaultResources>,
    descriptor_pool: Arc<DescriptorPool>,
    device: Arc<dyn GraphicsDevice>,
}

impl Renderer {
    /// Create the renderer on top of an initialised backend device
    ///
    /// Captures the device capabilities once, creates the first descriptor
    /// pool and the default resources of every GPU node.
    pub fn new(device: Arc<dyn GraphicsDevice>, config: RendererConfig) -> Result<Self> {
        let capabilities = device.capabilities();

        let descriptor_pool = DescriptorPool::new(Arc::clone(&device), config.descriptor_pool.clone())
            .map_err(|e| Error::InitializationFailed(format!("descriptor pool: {}", e)))?;

        let default_resources = DefaultResources::new(
            &device,
            capabilities.linked_node_count,
            config.default_buffer_size,
            config.default_texture_format,
        )
        .map_err(|e| {
            prism_error!(SOURCE, "Failed to create default resources: {}", e);
            Error::InitializationFailed(format!("default resources: {}", e))
        })?;

        prism_info!(
            SOURCE,
            "Renderer initialized on '{}' ({} node(s), {} sets per descriptor pool)",
            device.name(),
            capabilities.linked_node_count,
            config.descriptor_pool.max_sets
        );

        Ok(Self {
            render_target_cache: Arc::new(RenderTargetCache::new(Arc::clone(&device))),
            default_resources: Arc::new(default_resources),
            descriptor_pool: Arc::new(descriptor_pool),
            capabilities,
            config,
            device,
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn default_resources(&self) -> &DefaultResources {
        &self.default_resources
    }

    // ===== RESOURCES =====

    pub fn create_buffer(&self, desc: &BufferDesc) -> Result<Buffer> {
        Buffer::new(Arc::clone(&self.device), desc, next_resource_id())
    }

    pub fn create_texture(&self, desc: &TextureDesc) -> Result<Texture> {
        Texture::new(Arc::clone(&self.device), desc, next_resource_id())
    }

    pub fn create_render_target(&self, desc: &RenderTargetDesc) -> Result<RenderTarget> {
        RenderTarget::new(Arc::clone(&self.device), desc, next_resource_id())
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler> {
        Sampler::new(Arc::clone(&self.device), desc, next_resource_id())
    }

    // ===== BINDING MODEL =====

    /// Build a root signature from shader reflection
    ///
    /// The signature is released when the last `Arc` (including the ones held
    /// by descriptor sets) drops.
    pub fn build_root_signature(&self, desc: &RootSignatureDesc) -> Result<Arc<RootSignature>> {
        RootSignature::new(
            Arc::clone(&self.device),
            &self.capabilities,
            Arc::clone(&self.descriptor_pool),
            Arc::clone(&self.default_resources),
            desc,
        )
    }

    /// Allocate descriptor sets
    ///
    /// # Panics
    ///
    /// Panics if the signature declares nothing at the requested frequency.
    pub fn allocate_descriptor_set(&self, desc: &DescriptorSetDesc) -> Result<DescriptorSet> {
        DescriptorSet::new(desc)
    }

    pub fn update_descriptor_set(&self, set: &mut DescriptorSet, index: u32, params: &[DescriptorData]) -> UpdateReport {
        set.update(index, params)
    }

    pub fn descriptor_pool_stats(&self) -> DescriptorPoolStats {
        DescriptorPoolStats {
            pools: self.descriptor_pool.pool_count(),
            used_sets: self.descriptor_pool.used_sets(),
        }
    }

    // ===== COMMANDS =====

    pub fn create_cmd(&self, queue_type: QueueType) -> Result<Cmd> {
        self.create_cmd_on_node(queue_type, 0)
    }

    pub fn create_cmd_on_node(&self, queue_type: QueueType, node_index: u32) -> Result<Cmd> {
        if node_index >= self.capabilities.linked_node_count.max(1) {
            let message = format!(
                "node {} out of range ({} linked nodes)",
                node_index, self.capabilities.linked_node_count
            );
            prism_error!(SOURCE, "{}", message);
            return Err(Error::InvalidResource(message));
        }
        let list = self.device.create_command_list(queue_type, node_index)?;
        Ok(Cmd::new(list, node_index, Arc::clone(&self.render_target_cache)))
    }

    pub fn render_target_cache_stats(&self) -> CacheStats {
        self.render_target_cache.stats()
    }

    /// Destroy every cached render pass and framebuffer
    ///
    /// Called on drop; the backend device must be idle.
    pub fn shutdown(&self) {
        self.render_target_cache.shutdown();
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
