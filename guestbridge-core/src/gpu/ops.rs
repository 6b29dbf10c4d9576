//! One method per GPU import.
//!
//! Each method resolves its handle arguments, decodes its descriptor (if any) from a fresh view
//! of guest memory, calls the backend, and mints a handle for whatever the backend produced.
//! Failures come back as [`BridgeError`]s; the import layer decides whether they become a `0`
//! return or just a log line.

use std::collections::HashSet;

use super::decode::{DescriptorReader, size_or_whole};
use super::types::{BufferSlice, SurfaceConfiguration};
use super::{GpuBackend, GpuState};
use crate::abi::enums::{IndexFormat, TextureFormat};
use crate::bridge::{Completion, CompletionQueue};
use crate::error::{BridgeError, BridgeResult};
use crate::layout::GuestMemory;
use crate::registry::{Handle, ResourceKind};

fn host<T>(op: &'static str, result: anyhow::Result<T>) -> BridgeResult<T> {
    result.map_err(|e| BridgeError::host(op, format!("{e:#}")))
}

impl<G: GpuBackend> GpuState<G> {
    // --- Adapter / device ---

    /// Issue an adapter request. A bad options record still produces a (failed) callback.
    pub fn request_adapter(
        &mut self,
        mem: GuestMemory<'_>,
        options: u64,
        completions: &mut CompletionQueue<G>,
    ) -> BridgeResult<()> {
        let done = completions.completer(|op, result| Completion::Adapter { op, result });
        match DescriptorReader::new(mem, &self.layouts).adapter_options(options) {
            Ok(options) => {
                self.backend.request_adapter(&options, done);
                Ok(())
            }
            Err(err) => {
                done.reject(err.to_string());
                Err(err)
            }
        }
    }

    pub fn request_device(
        &mut self,
        adapter: u32,
        completions: &mut CompletionQueue<G>,
    ) -> BridgeResult<()> {
        let done = completions.completer(|op, result| Completion::Device { op, result });
        match self.objects.adapters.resolve(adapter, "adapter") {
            Ok(adapter) => {
                self.backend.request_device(adapter, done);
                Ok(())
            }
            Err(err) => {
                done.reject(err.to_string());
                Err(err)
            }
        }
    }

    pub fn device_get_queue(&mut self, device: u32) -> BridgeResult<Handle> {
        let device = self.objects.devices.resolve(device, "device")?;
        let queue = host("get queue", self.backend.device_queue(device))?;
        self.objects.queues.insert(queue)
    }

    // --- Resource creation ---

    pub fn create_buffer(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).buffer(desc)?;
            host("create buffer", self.backend.create_buffer(device, &desc))?
        };
        self.objects.buffers.insert(created)
    }

    pub fn create_shader_module(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).shader_module(desc)?;
            host(
                "create shader module",
                self.backend.create_shader_module(device, &desc),
            )?
        };
        self.objects.shader_modules.insert(created)
    }

    pub fn create_texture(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).texture(desc)?;
            host("create texture", self.backend.create_texture(device, &desc))?
        };
        self.objects.textures.insert(created)
    }

    pub fn create_texture_view(
        &mut self,
        mem: GuestMemory<'_>,
        texture: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let texture = self.objects.textures.resolve(texture, "texture")?;
            let desc = DescriptorReader::new(mem, &self.layouts).texture_view(desc)?;
            host(
                "create texture view",
                self.backend.create_texture_view(texture, &desc),
            )?
        };
        self.objects.texture_views.insert(created)
    }

    pub fn create_sampler(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).sampler(desc)?;
            host("create sampler", self.backend.create_sampler(device, &desc))?
        };
        self.objects.samplers.insert(created)
    }

    /// Creates the layout and remembers each binding's declared kind for later bind groups.
    pub fn create_bind_group_layout(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let (created, kinds) = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).bind_group_layout(desc)?;
            let kinds: Vec<_> = desc
                .entries
                .iter()
                .map(|entry| (entry.binding, entry.ty.kind()))
                .collect();
            let created = host(
                "create bind group layout",
                self.backend.create_bind_group_layout(device, &desc),
            )?;
            (created, kinds)
        };
        let handle = self.objects.bind_group_layouts.insert(created)?;
        self.layout_cache.record_layout(handle, kinds);
        Ok(handle)
    }

    pub fn create_bind_group(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).bind_group(
                desc,
                &self.objects,
                &self.layout_cache,
            )?;
            host(
                "create bind group",
                self.backend.create_bind_group(device, &desc),
            )?
        };
        self.objects.bind_groups.insert(created)
    }

    pub fn create_pipeline_layout(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc =
                DescriptorReader::new(mem, &self.layouts).pipeline_layout(desc, &self.objects)?;
            host(
                "create pipeline layout",
                self.backend.create_pipeline_layout(device, &desc),
            )?
        };
        self.objects.pipeline_layouts.insert(created)
    }

    pub fn create_compute_pipeline(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc =
                DescriptorReader::new(mem, &self.layouts).compute_pipeline(desc, &self.objects)?;
            host(
                "create compute pipeline",
                self.backend.create_compute_pipeline(device, &desc),
            )?
        };
        self.objects.compute_pipelines.insert(created)
    }

    pub fn create_render_pipeline(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc =
                DescriptorReader::new(mem, &self.layouts).render_pipeline(desc, &self.objects)?;
            host(
                "create render pipeline",
                self.backend.create_render_pipeline(device, &desc),
            )?
        };
        self.objects.render_pipelines.insert(created)
    }

    pub fn create_query_set(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let desc = DescriptorReader::new(mem, &self.layouts).query_set(desc)?;
            host("create query set", self.backend.create_query_set(device, &desc))?
        };
        self.objects.query_sets.insert(created)
    }

    // --- Command encoding ---

    pub fn create_command_encoder(
        &mut self,
        mem: GuestMemory<'_>,
        device: u32,
        label: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let device = self.objects.devices.resolve(device, "device")?;
            let label = DescriptorReader::new(mem, &self.layouts).label(label)?;
            host(
                "create command encoder",
                self.backend.create_command_encoder(device, label.as_deref()),
            )?
        };
        self.objects.command_encoders.insert(created)
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        encoder: u32,
        source: u32,
        source_offset: u64,
        destination: u32,
        destination_offset: u64,
        size: u64,
    ) -> BridgeResult<()> {
        let encoder = self.objects.command_encoders.resolve_mut(encoder, "encoder")?;
        let source = self.objects.buffers.resolve(source, "source")?;
        let destination = self.objects.buffers.resolve(destination, "destination")?;
        host(
            "copy buffer to buffer",
            self.backend.copy_buffer_to_buffer(
                encoder,
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            ),
        )
    }

    pub fn begin_compute_pass(
        &mut self,
        mem: GuestMemory<'_>,
        encoder: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let encoder = self.objects.command_encoders.resolve_mut(encoder, "encoder")?;
            let desc = DescriptorReader::new(mem, &self.layouts)
                .compute_pass::<G>(desc, &self.objects.query_sets)?;
            host(
                "begin compute pass",
                self.backend.begin_compute_pass(encoder, &desc),
            )?
        };
        self.objects.compute_passes.insert(created)
    }

    pub fn begin_render_pass(
        &mut self,
        mem: GuestMemory<'_>,
        encoder: u32,
        desc: u64,
    ) -> BridgeResult<Handle> {
        let created = {
            let encoder = self.objects.command_encoders.resolve_mut(encoder, "encoder")?;
            let desc = DescriptorReader::new(mem, &self.layouts).render_pass::<G>(
                desc,
                &self.objects.texture_views,
                &self.objects.query_sets,
            )?;
            host(
                "begin render pass",
                self.backend.begin_render_pass(encoder, &desc),
            )?
        };
        self.objects.render_passes.insert(created)
    }

    /// Consumes the encoder; its handle is dead whether or not the backend succeeds.
    pub fn finish_encoder(
        &mut self,
        mem: GuestMemory<'_>,
        encoder: u32,
        label: u64,
    ) -> BridgeResult<Handle> {
        let label = DescriptorReader::new(mem, &self.layouts).label(label)?;
        let encoder = self.objects.command_encoders.take(encoder, "encoder")?;
        let buffer = host(
            "finish command encoder",
            self.backend.finish_encoder(encoder, label.as_deref()),
        )?;
        self.objects.command_buffers.insert(buffer)
    }

    // --- Compute pass ---

    pub fn compute_set_pipeline(&mut self, pass: u32, pipeline: u32) -> BridgeResult<()> {
        let pass = self.objects.compute_passes.resolve_mut(pass, "pass")?;
        let pipeline = self.objects.compute_pipelines.resolve(pipeline, "pipeline")?;
        host(
            "set compute pipeline",
            self.backend.compute_set_pipeline(pass, pipeline),
        )
    }

    /// `group == 0` unbinds the slot.
    pub fn compute_set_bind_group(
        &mut self,
        mem: GuestMemory<'_>,
        pass: u32,
        index: u32,
        group: u32,
        offsets: u64,
        offsets_len: u64,
    ) -> BridgeResult<()> {
        let dynamic_offsets = mem.read_u32_array(offsets, offsets_len)?;
        let pass = self.objects.compute_passes.resolve_mut(pass, "pass")?;
        let group = match group {
            0 => None,
            raw => Some(self.objects.bind_groups.resolve(raw, "bind_group")?),
        };
        host(
            "set compute bind group",
            self.backend
                .compute_set_bind_group(pass, index, group, &dynamic_offsets),
        )
    }

    pub fn compute_dispatch(&mut self, pass: u32, x: u32, y: u32, z: u32) -> BridgeResult<()> {
        let pass = self.objects.compute_passes.resolve_mut(pass, "pass")?;
        host("dispatch workgroups", self.backend.compute_dispatch(pass, x, y, z))
    }

    pub fn compute_dispatch_indirect(
        &mut self,
        pass: u32,
        buffer: u32,
        offset: u64,
    ) -> BridgeResult<()> {
        let pass = self.objects.compute_passes.resolve_mut(pass, "pass")?;
        let buffer = self.objects.buffers.resolve(buffer, "indirect_buffer")?;
        host(
            "dispatch workgroups indirect",
            self.backend.compute_dispatch_indirect(pass, buffer, offset),
        )
    }

    pub fn compute_write_timestamp(
        &mut self,
        pass: u32,
        query_set: u32,
        index: u32,
    ) -> BridgeResult<()> {
        let pass = self.objects.compute_passes.resolve_mut(pass, "pass")?;
        let query_set = self.objects.query_sets.resolve(query_set, "query_set")?;
        host(
            "write timestamp",
            self.backend.compute_write_timestamp(pass, query_set, index),
        )
    }

    /// Ends and consumes the pass.
    pub fn compute_end(&mut self, pass: u32) -> BridgeResult<()> {
        let pass = self.objects.compute_passes.take(pass, "pass")?;
        host("end compute pass", self.backend.compute_end(pass))
    }

    // --- Render pass ---

    pub fn render_set_pipeline(&mut self, pass: u32, pipeline: u32) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let pipeline = self.objects.render_pipelines.resolve(pipeline, "pipeline")?;
        host(
            "set render pipeline",
            self.backend.render_set_pipeline(pass, pipeline),
        )
    }

    pub fn render_set_bind_group(
        &mut self,
        mem: GuestMemory<'_>,
        pass: u32,
        index: u32,
        group: u32,
        offsets: u64,
        offsets_len: u64,
    ) -> BridgeResult<()> {
        let dynamic_offsets = mem.read_u32_array(offsets, offsets_len)?;
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let group = match group {
            0 => None,
            raw => Some(self.objects.bind_groups.resolve(raw, "bind_group")?),
        };
        host(
            "set render bind group",
            self.backend
                .render_set_bind_group(pass, index, group, &dynamic_offsets),
        )
    }

    /// `buffer == 0` unbinds the slot; an all-ones `size` binds to the end of the buffer.
    pub fn render_set_vertex_buffer(
        &mut self,
        pass: u32,
        slot: u32,
        buffer: u32,
        offset: u64,
        size: u64,
    ) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let buffer = match buffer {
            0 => None,
            raw => Some(self.objects.buffers.resolve(raw, "buffer")?),
        };
        let range = BufferSlice {
            offset,
            size: size_or_whole(size),
        };
        host(
            "set vertex buffer",
            self.backend.render_set_vertex_buffer(pass, slot, buffer, range),
        )
    }

    pub fn render_set_index_buffer(
        &mut self,
        pass: u32,
        buffer: u32,
        format: u32,
        offset: u64,
        size: u64,
    ) -> BridgeResult<()> {
        let format = IndexFormat::try_from_ordinal(format)?;
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let buffer = self.objects.buffers.resolve(buffer, "buffer")?;
        let range = BufferSlice {
            offset,
            size: size_or_whole(size),
        };
        host(
            "set index buffer",
            self.backend
                .render_set_index_buffer(pass, buffer, format, range),
        )
    }

    pub fn render_draw(
        &mut self,
        pass: u32,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        host(
            "draw",
            self.backend
                .render_draw(pass, vertex_count, instance_count, first_vertex, first_instance),
        )
    }

    pub fn render_draw_indexed(
        &mut self,
        pass: u32,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        host(
            "draw indexed",
            self.backend.render_draw_indexed(
                pass,
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            ),
        )
    }

    pub fn render_draw_indirect(&mut self, pass: u32, buffer: u32, offset: u64) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let buffer = self.objects.buffers.resolve(buffer, "indirect_buffer")?;
        host(
            "draw indirect",
            self.backend.render_draw_indirect(pass, buffer, offset),
        )
    }

    pub fn render_draw_indexed_indirect(
        &mut self,
        pass: u32,
        buffer: u32,
        offset: u64,
    ) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let buffer = self.objects.buffers.resolve(buffer, "indirect_buffer")?;
        host(
            "draw indexed indirect",
            self.backend.render_draw_indexed_indirect(pass, buffer, offset),
        )
    }

    pub fn render_write_timestamp(
        &mut self,
        pass: u32,
        query_set: u32,
        index: u32,
    ) -> BridgeResult<()> {
        let pass = self.objects.render_passes.resolve_mut(pass, "pass")?;
        let query_set = self.objects.query_sets.resolve(query_set, "query_set")?;
        host(
            "write timestamp",
            self.backend.render_write_timestamp(pass, query_set, index),
        )
    }

    /// Ends and consumes the pass.
    pub fn render_end(&mut self, pass: u32) -> BridgeResult<()> {
        let pass = self.objects.render_passes.take(pass, "pass")?;
        host("end render pass", self.backend.render_end(pass))
    }

    // --- Queue ---

    pub fn queue_write_buffer(
        &mut self,
        mem: GuestMemory<'_>,
        queue: u32,
        buffer: u32,
        offset: u64,
        data: u64,
        data_len: u64,
    ) -> BridgeResult<()> {
        let queue = self.objects.queues.resolve(queue, "queue")?;
        let buffer = self.objects.buffers.resolve(buffer, "buffer")?;
        let bytes = mem.bytes(data, data_len)?;
        host(
            "write buffer",
            self.backend.queue_write_buffer(queue, buffer, offset, bytes),
        )
    }

    /// Submit `count` command buffers listed at `list`.
    ///
    /// Every handle is checked before any buffer is consumed: one bad or repeated handle
    /// rejects the submission and leaves all of the buffers alive.
    pub fn queue_submit(
        &mut self,
        mem: GuestMemory<'_>,
        queue: u32,
        list: u64,
        count: u64,
    ) -> BridgeResult<()> {
        let raws = mem.read_u32_array(list, count)?;
        let queue = self.objects.queues.resolve(queue, "queue")?;
        let mut seen = HashSet::with_capacity(raws.len());
        for raw in &raws {
            self.objects
                .command_buffers
                .resolve(*raw, "command_buffers")?;
            if !seen.insert(*raw) {
                return Err(BridgeError::malformed(
                    "queue submission",
                    format!("command buffer {raw} is listed more than once"),
                ));
            }
        }
        let buffers = raws
            .iter()
            .map(|raw| self.objects.command_buffers.take(*raw, "command_buffers"))
            .collect::<BridgeResult<Vec<_>>>()?;
        host("submit", self.backend.queue_submit(queue, buffers))
    }

    pub fn queue_on_submitted_work_done(
        &mut self,
        queue: u32,
        completions: &mut CompletionQueue<G>,
    ) -> BridgeResult<()> {
        let done = completions.completer(move |op, result| Completion::QueueWorkDone {
            op,
            queue,
            result,
        });
        match self.objects.queues.resolve(queue, "queue") {
            Ok(q) => {
                self.backend.queue_on_submitted_work_done(q, done);
                Ok(())
            }
            Err(err) => {
                done.reject(err.to_string());
                Err(err)
            }
        }
    }

    // --- Surface ---

    pub fn configure_surface(
        &mut self,
        device: u32,
        format: u32,
        width: u32,
        height: u32,
    ) -> BridgeResult<()> {
        let device = self.objects.devices.resolve(device, "device")?;
        let config = SurfaceConfiguration {
            format: TextureFormat::from_ordinal_or_default(format),
            width,
            height,
        };
        host(
            "configure surface",
            self.backend.configure_surface(device, &config),
        )
    }

    pub fn surface_current_texture_view(&mut self) -> BridgeResult<Handle> {
        let view = host(
            "get current texture view",
            self.backend.surface_texture_view(),
        )?;
        self.objects.texture_views.insert(view)
    }

    // --- Lifetime ---

    /// Drop a GPU object. Releasing a bind-group layout also forgets its binding kinds.
    pub fn release(&mut self, kind: ResourceKind, raw: u32) -> bool {
        if kind == ResourceKind::BindGroupLayout {
            self.layout_cache.forget(raw);
        }
        self.objects.release(kind, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::enums::{BindingLayoutKind, BindingResourceKind};
    use crate::bridge::{Arg, STATUS_FAILURE, STATUS_SUCCESS};
    use crate::gpu::decode::WHOLE_SIZE;
    use crate::gpu::trace::TraceBackend;
    use crate::layout::PointerWidth;
    use crate::layout::records::RecordLayouts;
    use crate::layout::testing::Scratch;
    use crate::registry::Registry;

    struct Fixture {
        gpu: GpuState<TraceBackend>,
        completions: CompletionQueue<TraceBackend>,
        scratch: Scratch,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_backend(TraceBackend::new())
        }

        fn with_backend(backend: TraceBackend) -> Self {
            Self {
                gpu: GpuState::new(backend, RecordLayouts::new(PointerWidth::W32)),
                completions: CompletionQueue::new(),
                scratch: Scratch::new(PointerWidth::W32),
            }
        }

        /// Run queued completions and return the export calls they produced.
        fn pump(&mut self) -> Vec<(&'static str, Vec<Arg>)> {
            let mut audio = Registry::new(ResourceKind::AudioBuffer);
            self.completions
                .drain()
                .into_iter()
                .map(|c| {
                    let call = c.settle(&mut self.gpu.objects, &mut audio);
                    (call.export, call.args)
                })
                .collect()
        }

        fn device(&mut self) -> u32 {
            self.gpu
                .request_adapter(self.scratch.memory(), 0, &mut self.completions)
                .unwrap();
            self.pump();
            self.gpu.request_device(1, &mut self.completions).unwrap();
            self.pump();
            1
        }

        fn buffer(&mut self, device: u32, size: u64) -> u32 {
            let l = self.gpu.layouts.buffer;
            let d = self.scratch.alloc(l.record.size, l.record.align);
            self.scratch.put_u64(d + l.size, size);
            self.gpu
                .create_buffer(self.scratch.memory(), device, d)
                .unwrap()
                .get()
        }

        fn bind_group_layout(&mut self, device: u32, kinds: &[(u32, BindingLayoutKind)]) -> u32 {
            let e = self.gpu.layouts.bind_group_layout_entry;
            let list = self.gpu.layouts.labeled_list;
            let s = &mut self.scratch;
            let arr = s.alloc(e.record.size * kinds.len() as u64, e.record.align);
            for (i, (binding, kind)) in kinds.iter().enumerate() {
                let at = arr + i as u64 * e.record.size;
                s.put_u32(at + e.binding, *binding);
                s.put_u32(at + e.kind, kind.ordinal());
            }
            let d = s.alloc(list.record.size, list.record.align);
            s.put_slice(list.entries.shifted(d), arr, kinds.len() as u64);
            self.gpu
                .create_bind_group_layout(self.scratch.memory(), device, d)
                .unwrap()
                .get()
        }

        fn buffer_bind_group(&mut self, device: u32, layout: u32, buffer: u32) -> BridgeResult<Handle> {
            let e = self.gpu.layouts.bind_group_entry;
            let d = self.gpu.layouts.bind_group;
            let s = &mut self.scratch;
            let entry = s.alloc(e.record.size, e.record.align);
            s.put_u32(entry + e.kind, BindingResourceKind::Buffer.ordinal());
            s.put_u32(entry + e.resource + e.arms.buffer, buffer);
            s.put_u64(entry + e.resource + e.arms.buffer_size, WHOLE_SIZE);
            let desc = s.alloc(d.record.size, d.record.align);
            s.put_u32(desc + d.layout, layout);
            s.put_slice(d.entries.shifted(desc), entry, 1);
            self.gpu.create_bind_group(self.scratch.memory(), device, desc)
        }

        fn encoder(&mut self, device: u32) -> u32 {
            self.gpu
                .create_command_encoder(self.scratch.memory(), device, 0)
                .unwrap()
                .get()
        }
    }

    #[test]
    fn adapter_and_device_arrive_through_completions() {
        let mut f = Fixture::new();
        f.gpu
            .request_adapter(f.scratch.memory(), 0, &mut f.completions)
            .unwrap();
        assert_eq!(
            f.pump(),
            vec![("bridge_on_adapter_received", vec![Arg::U32(1), Arg::U32(STATUS_SUCCESS)])]
        );
        f.gpu.request_device(1, &mut f.completions).unwrap();
        assert_eq!(
            f.pump(),
            vec![("bridge_on_device_received", vec![Arg::U32(1), Arg::U32(STATUS_SUCCESS)])]
        );
        assert_eq!(f.gpu.device_get_queue(1).unwrap().get(), 1);
    }

    #[test]
    fn device_request_on_dead_adapter_still_calls_back() {
        let mut f = Fixture::new();
        assert!(f.gpu.request_device(7, &mut f.completions).is_err());
        assert_eq!(
            f.pump(),
            vec![("bridge_on_device_received", vec![Arg::U32(0), Arg::U32(STATUS_FAILURE)])]
        );
    }

    #[test]
    fn deferred_requests_resolve_out_of_order() {
        let mut f = Fixture::with_backend(TraceBackend::deferred());
        f.gpu
            .request_adapter(f.scratch.memory(), 0, &mut f.completions)
            .unwrap();
        f.gpu
            .request_adapter(f.scratch.memory(), 0, &mut f.completions)
            .unwrap();
        assert!(f.pump().is_empty());

        let second = f.gpu.backend.pending_adapters.pop().unwrap();
        let first = f.gpu.backend.pending_adapters.pop().unwrap();
        assert_eq!((first.op(), second.op()), (1, 2));
        second.resolve(crate::gpu::trace::TraceObject::named("late-issued"));
        first.reject("adapter lost");

        assert_eq!(
            f.pump(),
            vec![
                ("bridge_on_adapter_received", vec![Arg::U32(1), Arg::U32(STATUS_SUCCESS)]),
                ("bridge_on_adapter_received", vec![Arg::U32(0), Arg::U32(STATUS_FAILURE)]),
            ]
        );
        assert_eq!(f.gpu.objects.adapters.get(1).unwrap().name, "late-issued");
    }

    #[test]
    fn bind_group_uses_layout_cache() {
        let mut f = Fixture::new();
        let device = f.device();
        let buffer = f.buffer(device, 256);
        let layout = f.bind_group_layout(device, &[(0, BindingLayoutKind::Buffer)]);
        assert_eq!(
            f.gpu.layout_cache.kind_for(layout, 0),
            Some(BindingLayoutKind::Buffer)
        );

        let group = f.buffer_bind_group(device, layout, buffer).unwrap();
        assert_eq!(group.get(), 1);
        assert!(
            f.gpu
                .backend
                .calls
                .last()
                .unwrap()
                .starts_with("create_bind_group layout=")
        );

        assert!(f.gpu.release(ResourceKind::BindGroupLayout, layout));
        assert!(f.gpu.layout_cache.is_empty());
        assert!(matches!(
            f.buffer_bind_group(device, layout, buffer),
            Err(BridgeError::InvalidHandle {
                kind: ResourceKind::BindGroupLayout,
                ..
            })
        ));
    }

    #[test]
    fn bind_group_layout_entry_defaults_decode() {
        let mut f = Fixture::new();
        let device = f.device();
        f.bind_group_layout(device, &[(0, BindingLayoutKind::Buffer)]);
        assert_eq!(
            f.gpu.backend.calls.last().map(String::as_str),
            Some("create_bind_group_layout [0:buffer]")
        );
    }

    #[test]
    fn finishing_consumes_the_encoder() {
        let mut f = Fixture::new();
        let device = f.device();
        let encoder = f.encoder(device);
        let cb = f
            .gpu
            .finish_encoder(f.scratch.memory(), encoder, 0)
            .unwrap();
        assert_eq!(cb.get(), 1);
        assert!(matches!(
            f.gpu.finish_encoder(f.scratch.memory(), encoder, 0),
            Err(BridgeError::InvalidHandle {
                kind: ResourceKind::CommandEncoder,
                ..
            })
        ));
    }

    #[test]
    fn ended_pass_handles_are_dead() {
        let mut f = Fixture::new();
        let device = f.device();
        let encoder = f.encoder(device);
        let pass = f
            .gpu
            .begin_compute_pass(f.scratch.memory(), encoder, 0)
            .unwrap()
            .get();
        f.gpu.compute_dispatch(pass, 8, 8, 1).unwrap();
        f.gpu.compute_end(pass).unwrap();
        assert!(f.gpu.compute_dispatch(pass, 1, 1, 1).is_err());
        assert!(f.gpu.compute_end(pass).is_err());
        assert_eq!(
            f.gpu.backend.calls.iter().filter(|c| c.ends_with(".end")).count(),
            1
        );
    }

    #[test]
    fn bad_submission_consumes_nothing() {
        let mut f = Fixture::new();
        let device = f.device();
        let queue = f.gpu.device_get_queue(device).unwrap().get();
        let enc_a = f.encoder(device);
        let enc_b = f.encoder(device);
        let a = f.gpu.finish_encoder(f.scratch.memory(), enc_a, 0).unwrap().get();
        let b = f.gpu.finish_encoder(f.scratch.memory(), enc_b, 0).unwrap().get();

        let list = f.scratch.u32_array(&[a, 99]);
        assert!(f.gpu.queue_submit(f.scratch.memory(), queue, list, 2).is_err());
        let dup = f.scratch.u32_array(&[a, a]);
        assert!(matches!(
            f.gpu.queue_submit(f.scratch.memory(), queue, dup, 2),
            Err(BridgeError::MalformedRecord { .. })
        ));
        assert_eq!(f.gpu.objects.command_buffers.live(), 2);

        let list = f.scratch.u32_array(&[a, b]);
        f.gpu.queue_submit(f.scratch.memory(), queue, list, 2).unwrap();
        assert_eq!(f.gpu.objects.command_buffers.live(), 0);
        assert!(
            f.gpu
                .backend
                .calls
                .last()
                .unwrap()
                .starts_with("queue_submit")
        );
    }

    #[test]
    fn work_done_reports_the_queue() {
        let mut f = Fixture::new();
        let device = f.device();
        let queue = f.gpu.device_get_queue(device).unwrap().get();
        f.gpu
            .queue_on_submitted_work_done(queue, &mut f.completions)
            .unwrap();
        assert_eq!(
            f.pump(),
            vec![("bridge_on_queue_work_done", vec![Arg::U32(queue), Arg::U32(STATUS_SUCCESS)])]
        );
    }

    #[test]
    fn host_failures_carry_the_backend_message() {
        let mut f = Fixture::new();
        let device = f.device();
        f.gpu.backend.fail_next("out of memory");
        let l = f.gpu.layouts.buffer;
        let d = f.scratch.alloc(l.record.size, l.record.align);
        let err = f
            .gpu
            .create_buffer(f.scratch.memory(), device, d)
            .unwrap_err();
        assert_eq!(err.to_string(), "create buffer failed: out of memory");
        assert_eq!(f.gpu.objects.buffers.live(), 0);
    }

    #[test]
    fn surface_view_needs_configuration() {
        let mut f = Fixture::new();
        let device = f.device();
        assert!(matches!(
            f.gpu.surface_current_texture_view(),
            Err(BridgeError::HostOperationFailure { .. })
        ));
        f.gpu
            .configure_surface(device, TextureFormat::Bgra8Unorm.ordinal(), 800, 600)
            .unwrap();
        assert_eq!(f.gpu.surface_current_texture_view().unwrap().get(), 1);
    }

    #[test]
    fn vertex_buffer_whole_size_sentinel() {
        let mut f = Fixture::new();
        let device = f.device();
        let buffer = f.buffer(device, 64);
        let encoder = f.encoder(device);
        let rp = f.gpu.layouts.render_pass;
        let d = f.scratch.alloc(rp.record.size, rp.record.align);
        let pass = f
            .gpu
            .begin_render_pass(f.scratch.memory(), encoder, d)
            .unwrap()
            .get();
        f.gpu
            .render_set_vertex_buffer(pass, 0, buffer, 16, WHOLE_SIZE)
            .unwrap();
        assert!(f.gpu.backend.calls.last().unwrap().ends_with(" 16.."));
        assert!(matches!(
            f.gpu.render_set_index_buffer(pass, buffer, 5, 0, WHOLE_SIZE),
            Err(BridgeError::UnsupportedValue { .. })
        ));
    }
}
