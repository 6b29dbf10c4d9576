//! A GPU backend that performs no work and records every call.
//!
//! Used by the integration tests and by the `guestbridge` binary when no real device is
//! available. Objects are plain named tokens; each call is appended to [`TraceBackend::calls`]
//! as one line of text.

use super::GpuBackend;
use super::types::*;
use crate::abi::enums::IndexFormat;
use crate::bridge::Completer;

use anyhow::{Result, bail};

/// Stand-in for every host object kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceObject {
    pub name: String,
}

impl TraceObject {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Default)]
pub struct TraceBackend {
    pub calls: Vec<String>,
    /// When set, asynchronous requests are parked in the `pending_*` lists instead of being
    /// resolved on the spot.
    pub deferred: bool,
    pub pending_adapters: Vec<Completer<TraceObject>>,
    pub pending_devices: Vec<Completer<TraceObject>>,
    pub pending_work_done: Vec<Completer<()>>,
    fail_next: Option<String>,
    next_id: u32,
    surface: Option<SurfaceConfiguration>,
}

impl TraceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    /// Make the next synchronous call fail with `message`.
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    fn record(&mut self, call: String) -> Result<()> {
        log::debug!(target: "trace", "{call}");
        self.calls.push(call);
        match self.fail_next.take() {
            Some(message) => bail!(message),
            None => Ok(()),
        }
    }

    fn object(&mut self, kind: &str, label: Option<&str>) -> TraceObject {
        self.next_id += 1;
        match label {
            Some(label) => TraceObject::named(label),
            None => TraceObject::named(format!("{kind}#{}", self.next_id)),
        }
    }

    fn create(&mut self, kind: &str, label: Option<&str>, call: String) -> Result<TraceObject> {
        self.record(call)?;
        Ok(self.object(kind, label))
    }
}

fn slice(range: BufferSlice) -> String {
    match range.size {
        Some(size) => format!("{}..+{size}", range.offset),
        None => format!("{}..", range.offset),
    }
}

impl GpuBackend for TraceBackend {
    type Adapter = TraceObject;
    type Device = TraceObject;
    type Queue = TraceObject;
    type Buffer = TraceObject;
    type ShaderModule = TraceObject;
    type Texture = TraceObject;
    type TextureView = TraceObject;
    type Sampler = TraceObject;
    type BindGroupLayout = TraceObject;
    type BindGroup = TraceObject;
    type PipelineLayout = TraceObject;
    type ComputePipeline = TraceObject;
    type RenderPipeline = TraceObject;
    type CommandEncoder = TraceObject;
    type CommandBuffer = TraceObject;
    type ComputePass = TraceObject;
    type RenderPass = TraceObject;
    type QuerySet = TraceObject;

    fn request_adapter(&mut self, options: &RequestAdapterOptions, done: Completer<TraceObject>) {
        self.calls.push(format!(
            "request_adapter power={} fallback={}",
            options.power_preference, options.force_fallback_adapter
        ));
        if self.deferred {
            self.pending_adapters.push(done);
        } else {
            let adapter = self.object("adapter", None);
            done.resolve(adapter);
        }
    }

    fn request_device(&mut self, adapter: &TraceObject, done: Completer<TraceObject>) {
        self.calls.push(format!("request_device adapter={}", adapter.name));
        if self.deferred {
            self.pending_devices.push(done);
        } else {
            let device = self.object("device", None);
            done.resolve(device);
        }
    }

    fn device_queue(&mut self, device: &TraceObject) -> Result<TraceObject> {
        self.create("queue", None, format!("device_queue device={}", device.name))
    }

    fn create_buffer(&mut self, device: &TraceObject, desc: &BufferDescriptor) -> Result<TraceObject> {
        self.create(
            "buffer",
            desc.label.as_deref(),
            format!(
                "create_buffer device={} size={} usage={:#x} mapped={}",
                device.name, desc.size, desc.usage, desc.mapped_at_creation
            ),
        )
    }

    fn create_shader_module(
        &mut self,
        _device: &TraceObject,
        desc: &ShaderModuleDescriptor,
    ) -> Result<TraceObject> {
        self.create(
            "shader",
            desc.label.as_deref(),
            format!("create_shader_module bytes={}", desc.code.len()),
        )
    }

    fn create_texture(&mut self, _device: &TraceObject, desc: &TextureDescriptor) -> Result<TraceObject> {
        self.create(
            "texture",
            desc.label.as_deref(),
            format!(
                "create_texture {}x{}x{} format={} samples={}",
                desc.size.width,
                desc.size.height,
                desc.size.depth_or_array_layers,
                desc.format,
                desc.sample_count
            ),
        )
    }

    fn create_texture_view(
        &mut self,
        texture: &TraceObject,
        desc: &TextureViewDescriptor,
    ) -> Result<TraceObject> {
        let format = desc.format.map(|f| f.token()).unwrap_or("inherit");
        self.create(
            "view",
            desc.label.as_deref(),
            format!("create_texture_view texture={} format={format}", texture.name),
        )
    }

    fn create_sampler(&mut self, _device: &TraceObject, desc: &SamplerDescriptor) -> Result<TraceObject> {
        self.create(
            "sampler",
            desc.label.as_deref(),
            format!(
                "create_sampler mag={} min={} compare={}",
                desc.mag_filter,
                desc.min_filter,
                desc.compare.map(|c| c.token()).unwrap_or("none")
            ),
        )
    }

    fn create_bind_group_layout(
        &mut self,
        _device: &TraceObject,
        desc: &BindGroupLayoutDescriptor,
    ) -> Result<TraceObject> {
        let kinds: Vec<String> = desc
            .entries
            .iter()
            .map(|e| format!("{}:{}", e.binding, e.ty.kind()))
            .collect();
        self.create(
            "bgl",
            desc.label.as_deref(),
            format!("create_bind_group_layout [{}]", kinds.join(",")),
        )
    }

    fn create_bind_group(
        &mut self,
        _device: &TraceObject,
        desc: &BindGroupDescriptor<'_, Self>,
    ) -> Result<TraceObject> {
        let entries: Vec<String> = desc
            .entries
            .iter()
            .map(|e| match &e.resource {
                BindingResource::Buffer(b) => format!("{}:{}", e.binding, b.buffer.name),
                BindingResource::Sampler(s) => format!("{}:{}", e.binding, s.name),
                BindingResource::TextureView(v) => format!("{}:{}", e.binding, v.name),
            })
            .collect();
        self.create(
            "bind_group",
            desc.label.as_deref(),
            format!(
                "create_bind_group layout={} [{}]",
                desc.layout.name,
                entries.join(",")
            ),
        )
    }

    fn create_pipeline_layout(
        &mut self,
        _device: &TraceObject,
        desc: &PipelineLayoutDescriptor<'_, Self>,
    ) -> Result<TraceObject> {
        let names: Vec<&str> = desc.bind_group_layouts.iter().map(|l| l.name.as_str()).collect();
        self.create(
            "pipeline_layout",
            desc.label.as_deref(),
            format!("create_pipeline_layout [{}]", names.join(",")),
        )
    }

    fn create_compute_pipeline(
        &mut self,
        _device: &TraceObject,
        desc: &ComputePipelineDescriptor<'_, Self>,
    ) -> Result<TraceObject> {
        self.create(
            "compute_pipeline",
            desc.label.as_deref(),
            format!(
                "create_compute_pipeline module={} entry={} layout={}",
                desc.compute.module.name,
                desc.compute.entry_point.as_deref().unwrap_or("<default>"),
                desc.layout.map(|l| l.name.as_str()).unwrap_or("auto")
            ),
        )
    }

    fn create_render_pipeline(
        &mut self,
        _device: &TraceObject,
        desc: &RenderPipelineDescriptor<'_, Self>,
    ) -> Result<TraceObject> {
        self.create(
            "render_pipeline",
            desc.label.as_deref(),
            format!(
                "create_render_pipeline vertex={} buffers={} topology={} targets={}",
                desc.vertex.stage.entry_point.as_deref().unwrap_or("<default>"),
                desc.vertex.buffers.len(),
                desc.primitive.topology,
                desc.fragment.as_ref().map_or(0, |f| f.targets.len())
            ),
        )
    }

    fn create_query_set(&mut self, _device: &TraceObject, desc: &QuerySetDescriptor) -> Result<TraceObject> {
        self.create(
            "query_set",
            desc.label.as_deref(),
            format!("create_query_set type={} count={}", desc.ty, desc.count),
        )
    }

    fn create_command_encoder(
        &mut self,
        _device: &TraceObject,
        label: Option<&str>,
    ) -> Result<TraceObject> {
        self.create("encoder", label, "create_command_encoder".to_owned())
    }

    fn copy_buffer_to_buffer(
        &mut self,
        encoder: &mut TraceObject,
        source: &TraceObject,
        source_offset: u64,
        destination: &TraceObject,
        destination_offset: u64,
        size: u64,
    ) -> Result<()> {
        self.record(format!(
            "copy_buffer_to_buffer encoder={} {}@{source_offset} -> {}@{destination_offset} size={size}",
            encoder.name, source.name, destination.name
        ))
    }

    fn begin_compute_pass(
        &mut self,
        encoder: &mut TraceObject,
        desc: &ComputePassDescriptor<'_, Self>,
    ) -> Result<TraceObject> {
        self.create(
            "compute_pass",
            desc.label.as_deref(),
            format!(
                "begin_compute_pass encoder={} timestamps={}",
                encoder.name,
                desc.timestamp_writes.is_some()
            ),
        )
    }

    fn begin_render_pass(
        &mut self,
        encoder: &mut TraceObject,
        desc: &RenderPassDescriptor<'_, Self>,
    ) -> Result<TraceObject> {
        let colors: Vec<String> = desc
            .color_attachments
            .iter()
            .map(|c| format!("{}:{}/{}", c.view.name, c.load_op, c.store_op))
            .collect();
        self.create(
            "render_pass",
            desc.label.as_deref(),
            format!(
                "begin_render_pass encoder={} colors=[{}] depth={}",
                encoder.name,
                colors.join(","),
                desc.depth_stencil_attachment.is_some()
            ),
        )
    }

    fn finish_encoder(&mut self, encoder: TraceObject, label: Option<&str>) -> Result<TraceObject> {
        self.create(
            "command_buffer",
            label,
            format!("finish encoder={}", encoder.name),
        )
    }

    fn compute_set_pipeline(&mut self, pass: &mut TraceObject, pipeline: &TraceObject) -> Result<()> {
        self.record(format!("{}.set_pipeline {}", pass.name, pipeline.name))
    }

    fn compute_set_bind_group(
        &mut self,
        pass: &mut TraceObject,
        index: u32,
        group: Option<&TraceObject>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.record(format!(
            "{}.set_bind_group {index} {} {dynamic_offsets:?}",
            pass.name,
            group.map_or("none", |g| g.name.as_str())
        ))
    }

    fn compute_dispatch(&mut self, pass: &mut TraceObject, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(format!("{}.dispatch {x} {y} {z}", pass.name))
    }

    fn compute_dispatch_indirect(
        &mut self,
        pass: &mut TraceObject,
        buffer: &TraceObject,
        offset: u64,
    ) -> Result<()> {
        self.record(format!("{}.dispatch_indirect {}@{offset}", pass.name, buffer.name))
    }

    fn compute_write_timestamp(
        &mut self,
        pass: &mut TraceObject,
        query_set: &TraceObject,
        index: u32,
    ) -> Result<()> {
        self.record(format!("{}.write_timestamp {}[{index}]", pass.name, query_set.name))
    }

    fn compute_end(&mut self, pass: TraceObject) -> Result<()> {
        self.record(format!("{}.end", pass.name))
    }

    fn render_set_pipeline(&mut self, pass: &mut TraceObject, pipeline: &TraceObject) -> Result<()> {
        self.record(format!("{}.set_pipeline {}", pass.name, pipeline.name))
    }

    fn render_set_bind_group(
        &mut self,
        pass: &mut TraceObject,
        index: u32,
        group: Option<&TraceObject>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.record(format!(
            "{}.set_bind_group {index} {} {dynamic_offsets:?}",
            pass.name,
            group.map_or("none", |g| g.name.as_str())
        ))
    }

    fn render_set_vertex_buffer(
        &mut self,
        pass: &mut TraceObject,
        slot: u32,
        buffer: Option<&TraceObject>,
        range: BufferSlice,
    ) -> Result<()> {
        self.record(format!(
            "{}.set_vertex_buffer {slot} {} {}",
            pass.name,
            buffer.map_or("none", |b| b.name.as_str()),
            slice(range)
        ))
    }

    fn render_set_index_buffer(
        &mut self,
        pass: &mut TraceObject,
        buffer: &TraceObject,
        format: IndexFormat,
        range: BufferSlice,
    ) -> Result<()> {
        self.record(format!(
            "{}.set_index_buffer {} {format} {}",
            pass.name,
            buffer.name,
            slice(range)
        ))
    }

    fn render_draw(
        &mut self,
        pass: &mut TraceObject,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(format!(
            "{}.draw {vertex_count} {instance_count} {first_vertex} {first_instance}",
            pass.name
        ))
    }

    fn render_draw_indexed(
        &mut self,
        pass: &mut TraceObject,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(format!(
            "{}.draw_indexed {index_count} {instance_count} {first_index} {base_vertex} {first_instance}",
            pass.name
        ))
    }

    fn render_draw_indirect(
        &mut self,
        pass: &mut TraceObject,
        buffer: &TraceObject,
        offset: u64,
    ) -> Result<()> {
        self.record(format!("{}.draw_indirect {}@{offset}", pass.name, buffer.name))
    }

    fn render_draw_indexed_indirect(
        &mut self,
        pass: &mut TraceObject,
        buffer: &TraceObject,
        offset: u64,
    ) -> Result<()> {
        self.record(format!(
            "{}.draw_indexed_indirect {}@{offset}",
            pass.name, buffer.name
        ))
    }

    fn render_write_timestamp(
        &mut self,
        pass: &mut TraceObject,
        query_set: &TraceObject,
        index: u32,
    ) -> Result<()> {
        self.record(format!("{}.write_timestamp {}[{index}]", pass.name, query_set.name))
    }

    fn render_end(&mut self, pass: TraceObject) -> Result<()> {
        self.record(format!("{}.end", pass.name))
    }

    fn queue_write_buffer(
        &mut self,
        queue: &TraceObject,
        buffer: &TraceObject,
        offset: u64,
        data: &[u8],
    ) -> Result<()> {
        self.record(format!(
            "queue_write_buffer queue={} {}@{offset} bytes={}",
            queue.name,
            buffer.name,
            data.len()
        ))
    }

    fn queue_submit(&mut self, queue: &TraceObject, command_buffers: Vec<TraceObject>) -> Result<()> {
        let names: Vec<String> = command_buffers.into_iter().map(|c| c.name).collect();
        self.record(format!("queue_submit queue={} [{}]", queue.name, names.join(",")))
    }

    fn queue_on_submitted_work_done(&mut self, queue: &TraceObject, done: Completer<()>) {
        self.calls
            .push(format!("queue_on_submitted_work_done queue={}", queue.name));
        if self.deferred {
            self.pending_work_done.push(done);
        } else {
            done.resolve(());
        }
    }

    fn configure_surface(&mut self, _device: &TraceObject, config: &SurfaceConfiguration) -> Result<()> {
        self.record(format!(
            "configure_surface {}x{} format={}",
            config.width, config.height, config.format
        ))?;
        self.surface = Some(*config);
        Ok(())
    }

    fn surface_texture_view(&mut self) -> Result<TraceObject> {
        let Some(surface) = self.surface else {
            bail!("surface is not configured");
        };
        self.create(
            "surface_view",
            None,
            format!("surface_texture_view {}x{}", surface.width, surface.height),
        )
    }
}
