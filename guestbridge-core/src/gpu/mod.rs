//! Graphics/compute host seam.
//!
//! [`GpuBackend`] is the host-native API the boundary drives: adapter → device → queue →
//! resources → command encoding → submission. The bridge never holds host objects itself; it
//! keeps them in [`GpuObjects`] (one registry per resource kind) and hands the guest handles.
//!
//! - `decode`: reads descriptor records out of guest memory into [`types`] parameters.
//! - `ops`: one method per guest import on [`GpuState`].
//! - `trace`: [`TraceBackend`](trace::TraceBackend), a recording backend.

pub mod decode;
pub mod ops;
pub mod trace;
pub mod types;

use crate::abi::enums::IndexFormat;
use crate::bridge::Completer;
use crate::layout::records::RecordLayouts;
use crate::registry::{LayoutCache, Registry, ResourceKind};

use anyhow::Result;
use types::*;

/// The host's native graphics/compute implementation.
///
/// Synchronous methods never suspend. Asynchronous ones (`request_adapter`, `request_device`,
/// `queue_on_submitted_work_done`) return immediately and later resolve or reject the
/// [`Completer`] they were given, from any thread.
pub trait GpuBackend: Sized + 'static {
    type Adapter: Send + 'static;
    type Device: Send + 'static;
    type Queue: 'static;
    type Buffer: 'static;
    type ShaderModule: 'static;
    type Texture: 'static;
    type TextureView: 'static;
    type Sampler: 'static;
    type BindGroupLayout: 'static;
    type BindGroup: 'static;
    type PipelineLayout: 'static;
    type ComputePipeline: 'static;
    type RenderPipeline: 'static;
    type CommandEncoder: 'static;
    type CommandBuffer: 'static;
    type ComputePass: 'static;
    type RenderPass: 'static;
    type QuerySet: 'static;

    fn request_adapter(&mut self, options: &RequestAdapterOptions, done: Completer<Self::Adapter>);
    fn request_device(&mut self, adapter: &Self::Adapter, done: Completer<Self::Device>);
    fn device_queue(&mut self, device: &Self::Device) -> Result<Self::Queue>;

    fn create_buffer(&mut self, device: &Self::Device, desc: &BufferDescriptor)
    -> Result<Self::Buffer>;
    fn create_shader_module(
        &mut self,
        device: &Self::Device,
        desc: &ShaderModuleDescriptor,
    ) -> Result<Self::ShaderModule>;
    fn create_texture(
        &mut self,
        device: &Self::Device,
        desc: &TextureDescriptor,
    ) -> Result<Self::Texture>;
    fn create_texture_view(
        &mut self,
        texture: &Self::Texture,
        desc: &TextureViewDescriptor,
    ) -> Result<Self::TextureView>;
    fn create_sampler(
        &mut self,
        device: &Self::Device,
        desc: &SamplerDescriptor,
    ) -> Result<Self::Sampler>;
    fn create_bind_group_layout(
        &mut self,
        device: &Self::Device,
        desc: &BindGroupLayoutDescriptor,
    ) -> Result<Self::BindGroupLayout>;
    fn create_bind_group(
        &mut self,
        device: &Self::Device,
        desc: &BindGroupDescriptor<'_, Self>,
    ) -> Result<Self::BindGroup>;
    fn create_pipeline_layout(
        &mut self,
        device: &Self::Device,
        desc: &PipelineLayoutDescriptor<'_, Self>,
    ) -> Result<Self::PipelineLayout>;
    fn create_compute_pipeline(
        &mut self,
        device: &Self::Device,
        desc: &ComputePipelineDescriptor<'_, Self>,
    ) -> Result<Self::ComputePipeline>;
    fn create_render_pipeline(
        &mut self,
        device: &Self::Device,
        desc: &RenderPipelineDescriptor<'_, Self>,
    ) -> Result<Self::RenderPipeline>;
    fn create_query_set(
        &mut self,
        device: &Self::Device,
        desc: &QuerySetDescriptor,
    ) -> Result<Self::QuerySet>;

    fn create_command_encoder(
        &mut self,
        device: &Self::Device,
        label: Option<&str>,
    ) -> Result<Self::CommandEncoder>;
    fn copy_buffer_to_buffer(
        &mut self,
        encoder: &mut Self::CommandEncoder,
        source: &Self::Buffer,
        source_offset: u64,
        destination: &Self::Buffer,
        destination_offset: u64,
        size: u64,
    ) -> Result<()>;
    fn begin_compute_pass(
        &mut self,
        encoder: &mut Self::CommandEncoder,
        desc: &ComputePassDescriptor<'_, Self>,
    ) -> Result<Self::ComputePass>;
    fn begin_render_pass(
        &mut self,
        encoder: &mut Self::CommandEncoder,
        desc: &RenderPassDescriptor<'_, Self>,
    ) -> Result<Self::RenderPass>;
    fn finish_encoder(
        &mut self,
        encoder: Self::CommandEncoder,
        label: Option<&str>,
    ) -> Result<Self::CommandBuffer>;

    fn compute_set_pipeline(
        &mut self,
        pass: &mut Self::ComputePass,
        pipeline: &Self::ComputePipeline,
    ) -> Result<()>;
    fn compute_set_bind_group(
        &mut self,
        pass: &mut Self::ComputePass,
        index: u32,
        group: Option<&Self::BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()>;
    fn compute_dispatch(&mut self, pass: &mut Self::ComputePass, x: u32, y: u32, z: u32)
    -> Result<()>;
    fn compute_dispatch_indirect(
        &mut self,
        pass: &mut Self::ComputePass,
        buffer: &Self::Buffer,
        offset: u64,
    ) -> Result<()>;
    fn compute_write_timestamp(
        &mut self,
        pass: &mut Self::ComputePass,
        query_set: &Self::QuerySet,
        index: u32,
    ) -> Result<()>;
    fn compute_end(&mut self, pass: Self::ComputePass) -> Result<()>;

    fn render_set_pipeline(
        &mut self,
        pass: &mut Self::RenderPass,
        pipeline: &Self::RenderPipeline,
    ) -> Result<()>;
    fn render_set_bind_group(
        &mut self,
        pass: &mut Self::RenderPass,
        index: u32,
        group: Option<&Self::BindGroup>,
        dynamic_offsets: &[u32],
    ) -> Result<()>;
    fn render_set_vertex_buffer(
        &mut self,
        pass: &mut Self::RenderPass,
        slot: u32,
        buffer: Option<&Self::Buffer>,
        range: BufferSlice,
    ) -> Result<()>;
    fn render_set_index_buffer(
        &mut self,
        pass: &mut Self::RenderPass,
        buffer: &Self::Buffer,
        format: IndexFormat,
        range: BufferSlice,
    ) -> Result<()>;
    fn render_draw(
        &mut self,
        pass: &mut Self::RenderPass,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()>;
    fn render_draw_indexed(
        &mut self,
        pass: &mut Self::RenderPass,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()>;
    fn render_draw_indirect(
        &mut self,
        pass: &mut Self::RenderPass,
        buffer: &Self::Buffer,
        offset: u64,
    ) -> Result<()>;
    fn render_draw_indexed_indirect(
        &mut self,
        pass: &mut Self::RenderPass,
        buffer: &Self::Buffer,
        offset: u64,
    ) -> Result<()>;
    fn render_write_timestamp(
        &mut self,
        pass: &mut Self::RenderPass,
        query_set: &Self::QuerySet,
        index: u32,
    ) -> Result<()>;
    fn render_end(&mut self, pass: Self::RenderPass) -> Result<()>;

    fn queue_write_buffer(
        &mut self,
        queue: &Self::Queue,
        buffer: &Self::Buffer,
        offset: u64,
        data: &[u8],
    ) -> Result<()>;
    fn queue_submit(
        &mut self,
        queue: &Self::Queue,
        command_buffers: Vec<Self::CommandBuffer>,
    ) -> Result<()>;
    fn queue_on_submitted_work_done(&mut self, queue: &Self::Queue, done: Completer<()>);

    fn configure_surface(
        &mut self,
        device: &Self::Device,
        config: &SurfaceConfiguration,
    ) -> Result<()>;
    fn surface_texture_view(&mut self) -> Result<Self::TextureView>;
}

/// One registry per GPU resource kind.
pub struct GpuObjects<G: GpuBackend> {
    pub adapters: Registry<G::Adapter>,
    pub devices: Registry<G::Device>,
    pub queues: Registry<G::Queue>,
    pub buffers: Registry<G::Buffer>,
    pub shader_modules: Registry<G::ShaderModule>,
    pub textures: Registry<G::Texture>,
    pub texture_views: Registry<G::TextureView>,
    pub samplers: Registry<G::Sampler>,
    pub bind_group_layouts: Registry<G::BindGroupLayout>,
    pub bind_groups: Registry<G::BindGroup>,
    pub pipeline_layouts: Registry<G::PipelineLayout>,
    pub compute_pipelines: Registry<G::ComputePipeline>,
    pub render_pipelines: Registry<G::RenderPipeline>,
    pub command_encoders: Registry<G::CommandEncoder>,
    pub command_buffers: Registry<G::CommandBuffer>,
    pub compute_passes: Registry<G::ComputePass>,
    pub render_passes: Registry<G::RenderPass>,
    pub query_sets: Registry<G::QuerySet>,
}

impl<G: GpuBackend> Default for GpuObjects<G> {
    fn default() -> Self {
        Self {
            adapters: Registry::new(ResourceKind::Adapter),
            devices: Registry::new(ResourceKind::Device),
            queues: Registry::new(ResourceKind::Queue),
            buffers: Registry::new(ResourceKind::Buffer),
            shader_modules: Registry::new(ResourceKind::ShaderModule),
            textures: Registry::new(ResourceKind::Texture),
            texture_views: Registry::new(ResourceKind::TextureView),
            samplers: Registry::new(ResourceKind::Sampler),
            bind_group_layouts: Registry::new(ResourceKind::BindGroupLayout),
            bind_groups: Registry::new(ResourceKind::BindGroup),
            pipeline_layouts: Registry::new(ResourceKind::PipelineLayout),
            compute_pipelines: Registry::new(ResourceKind::ComputePipeline),
            render_pipelines: Registry::new(ResourceKind::RenderPipeline),
            command_encoders: Registry::new(ResourceKind::CommandEncoder),
            command_buffers: Registry::new(ResourceKind::CommandBuffer),
            compute_passes: Registry::new(ResourceKind::ComputePass),
            render_passes: Registry::new(ResourceKind::RenderPass),
            query_sets: Registry::new(ResourceKind::QuerySet),
        }
    }
}

impl<G: GpuBackend> GpuObjects<G> {
    /// Drop the object behind `raw`. Returns whether anything was live; audio kinds are not
    /// handled here and report `false`.
    pub fn release(&mut self, kind: ResourceKind, raw: u32) -> bool {
        match kind {
            ResourceKind::Adapter => self.adapters.release(raw).is_some(),
            ResourceKind::Device => self.devices.release(raw).is_some(),
            ResourceKind::Queue => self.queues.release(raw).is_some(),
            ResourceKind::Buffer => self.buffers.release(raw).is_some(),
            ResourceKind::ShaderModule => self.shader_modules.release(raw).is_some(),
            ResourceKind::Texture => self.textures.release(raw).is_some(),
            ResourceKind::TextureView => self.texture_views.release(raw).is_some(),
            ResourceKind::Sampler => self.samplers.release(raw).is_some(),
            ResourceKind::BindGroupLayout => self.bind_group_layouts.release(raw).is_some(),
            ResourceKind::BindGroup => self.bind_groups.release(raw).is_some(),
            ResourceKind::PipelineLayout => self.pipeline_layouts.release(raw).is_some(),
            ResourceKind::ComputePipeline => self.compute_pipelines.release(raw).is_some(),
            ResourceKind::RenderPipeline => self.render_pipelines.release(raw).is_some(),
            ResourceKind::CommandEncoder => self.command_encoders.release(raw).is_some(),
            ResourceKind::CommandBuffer => self.command_buffers.release(raw).is_some(),
            ResourceKind::ComputePass => self.compute_passes.release(raw).is_some(),
            ResourceKind::RenderPass => self.render_passes.release(raw).is_some(),
            ResourceKind::QuerySet => self.query_sets.release(raw).is_some(),
            ResourceKind::AudioContext | ResourceKind::AudioBuffer => false,
        }
    }
}

/// GPU half of the boundary context: the backend, its objects, and what decoding needs.
pub struct GpuState<G: GpuBackend> {
    pub backend: G,
    pub objects: GpuObjects<G>,
    pub layout_cache: LayoutCache,
    pub layouts: RecordLayouts,
}

impl<G: GpuBackend> GpuState<G> {
    pub fn new(backend: G, layouts: RecordLayouts) -> Self {
        Self {
            backend,
            objects: GpuObjects::default(),
            layout_cache: LayoutCache::new(),
            layouts,
        }
    }
}
