//! Descriptor decoders.
//!
//! Every decoder reads a complete record (including nested arrays and nullable sub-records)
//! before anything is handed to the backend. The first bad element aborts the whole decode, so
//! the backend never sees a partially built descriptor.

use super::types::*;
use super::{GpuBackend, GpuObjects};
use crate::abi::enums::*;
use crate::error::{BridgeError, BridgeResult};
use crate::layout::{GuestMemory, OptionalOffsets};
use crate::layout::records::RecordLayouts;
use crate::registry::{LayoutCache, Registry};

/// All-ones `size` means "to the end of the buffer".
pub const WHOLE_SIZE: u64 = u64::MAX;

pub fn size_or_whole(size: u64) -> Option<u64> {
    (size != WHOLE_SIZE).then_some(size)
}

fn require(ptr: u64, record: &'static str) -> BridgeResult<u64> {
    if ptr == 0 {
        return Err(BridgeError::malformed(record, "null descriptor pointer"));
    }
    Ok(ptr)
}

/// Reads descriptor records out of one call's view of guest memory.
#[derive(Copy, Clone)]
pub struct DescriptorReader<'m, 'l> {
    mem: GuestMemory<'m>,
    layouts: &'l RecordLayouts,
}

impl<'m, 'l> DescriptorReader<'m, 'l> {
    pub fn new(mem: GuestMemory<'m>, layouts: &'l RecordLayouts) -> Self {
        Self { mem, layouts }
    }

    pub fn memory(&self) -> GuestMemory<'m> {
        self.mem
    }

    /// Nullable zero-terminated string whose pointer is stored at `at`.
    fn string_at(&self, at: u64) -> BridgeResult<Option<String>> {
        let ptr = self.mem.read_ptr(at)?;
        Ok(self.mem.read_c_str(ptr)?.map(str::to_owned))
    }

    pub fn label(&self, ptr: u64) -> BridgeResult<Option<String>> {
        Ok(self.mem.read_c_str(ptr)?.map(str::to_owned))
    }

    pub fn adapter_options(&self, ptr: u64) -> BridgeResult<RequestAdapterOptions> {
        if ptr == 0 {
            return Ok(RequestAdapterOptions::default());
        }
        let l = &self.layouts.adapter_options;
        Ok(RequestAdapterOptions {
            power_preference: PowerPreference::from_ordinal_or_default(
                self.mem.read_u32(ptr + l.power_preference)?,
            ),
            force_fallback_adapter: self.mem.read_bool(ptr + l.force_fallback_adapter)?,
        })
    }

    pub fn buffer(&self, ptr: u64) -> BridgeResult<BufferDescriptor> {
        let base = require(ptr, "buffer descriptor")?;
        let l = &self.layouts.buffer;
        Ok(BufferDescriptor {
            label: self.string_at(base + l.label)?,
            size: self.mem.read_u64(base + l.size)?,
            usage: self.mem.read_u32(base + l.usage)?,
            mapped_at_creation: self.mem.read_bool(base + l.mapped_at_creation)?,
        })
    }

    pub fn shader_module(&self, ptr: u64) -> BridgeResult<ShaderModuleDescriptor> {
        let base = require(ptr, "shader module descriptor")?;
        let l = &self.layouts.shader_module;
        let code_ptr = self.mem.read_ptr(base + l.code.ptr)?;
        let code_len = self.mem.read_usize(base + l.code.len)?;
        Ok(ShaderModuleDescriptor {
            label: self.string_at(base + l.label)?,
            code: self.mem.read_str(code_ptr, code_len)?.to_owned(),
        })
    }

    fn extent(&self, at: u64) -> BridgeResult<Extent3d> {
        let l = &self.layouts.extent;
        Ok(Extent3d {
            width: self.mem.read_u32(at + l.width)?,
            height: self.mem.read_u32(at + l.height)?,
            depth_or_array_layers: self.mem.read_u32(at + l.depth_or_array_layers)?,
        })
    }

    pub fn texture(&self, ptr: u64) -> BridgeResult<TextureDescriptor> {
        let base = require(ptr, "texture descriptor")?;
        let l = &self.layouts.texture;
        let formats_ptr = self.mem.read_ptr(base + l.view_formats.ptr)?;
        let formats_len = self.mem.read_usize(base + l.view_formats.len)?;
        let view_formats = self
            .mem
            .read_u32_array(formats_ptr, formats_len)?
            .into_iter()
            .map(TextureFormat::from_ordinal_or_default)
            .collect();
        Ok(TextureDescriptor {
            label: self.string_at(base + l.label)?,
            size: self.extent(base + l.size)?,
            mip_level_count: self.mem.read_u32(base + l.mip_level_count)?,
            sample_count: self.mem.read_u32(base + l.sample_count)?,
            dimension: TextureDimension::from_ordinal_or_default(
                self.mem.read_u32(base + l.dimension)?,
            ),
            format: TextureFormat::from_ordinal_or_default(self.mem.read_u32(base + l.format)?),
            usage: self.mem.read_u32(base + l.usage)?,
            view_formats,
        })
    }

    /// A null pointer selects the default view of the whole texture.
    pub fn texture_view(&self, ptr: u64) -> BridgeResult<TextureViewDescriptor> {
        if ptr == 0 {
            return Ok(TextureViewDescriptor::default());
        }
        let l = &self.layouts.texture_view;
        let m = &self.mem;
        Ok(TextureViewDescriptor {
            label: self.string_at(ptr + l.label)?,
            format: m
                .read_optional_u32(l.format.shifted(ptr))?
                .map(TextureFormat::from_ordinal_or_default),
            dimension: m
                .read_optional_u32(l.dimension.shifted(ptr))?
                .map(TextureViewDimension::from_ordinal_or_default),
            aspect: TextureAspect::from_ordinal_or_default(m.read_u32(ptr + l.aspect)?),
            base_mip_level: m.read_u32(ptr + l.base_mip_level)?,
            mip_level_count: m.read_optional_u32(l.mip_level_count.shifted(ptr))?,
            base_array_layer: m.read_u32(ptr + l.base_array_layer)?,
            array_layer_count: m.read_optional_u32(l.array_layer_count.shifted(ptr))?,
        })
    }

    pub fn sampler(&self, ptr: u64) -> BridgeResult<SamplerDescriptor> {
        let base = require(ptr, "sampler descriptor")?;
        let l = &self.layouts.sampler;
        let m = &self.mem;
        let address = |at| m.read_u32(base + at).map(AddressMode::from_ordinal_or_default);
        let filter = |at| m.read_u32(base + at).map(FilterMode::from_ordinal_or_default);
        Ok(SamplerDescriptor {
            label: self.string_at(base + l.label)?,
            address_mode_u: address(l.address_mode_u)?,
            address_mode_v: address(l.address_mode_v)?,
            address_mode_w: address(l.address_mode_w)?,
            mag_filter: filter(l.mag_filter)?,
            min_filter: filter(l.min_filter)?,
            mipmap_filter: filter(l.mipmap_filter)?,
            lod_min_clamp: m.read_f32(base + l.lod_min_clamp)?,
            lod_max_clamp: m.read_f32(base + l.lod_max_clamp)?,
            compare: m
                .read_optional_u32(l.compare.shifted(base))?
                .map(CompareFunction::from_ordinal_or_default),
            max_anisotropy: m.read_u16(base + l.max_anisotropy)?,
        })
    }

    fn binding_type(&self, kind: BindingLayoutKind, at: u64) -> BridgeResult<BindingType> {
        let a = &self.layouts.bind_group_layout_entry.arms;
        let m = &self.mem;
        Ok(match kind {
            BindingLayoutKind::Buffer => BindingType::Buffer {
                ty: BufferBindingType::from_ordinal_or_default(m.read_u32(at + a.buffer_ty)?),
                has_dynamic_offset: m.read_bool(at + a.buffer_has_dynamic_offset)?,
                min_binding_size: m.read_u64(at + a.buffer_min_binding_size)?,
            },
            BindingLayoutKind::Sampler => BindingType::Sampler(
                SamplerBindingType::from_ordinal_or_default(m.read_u32(at + a.sampler_ty)?),
            ),
            BindingLayoutKind::Texture => BindingType::Texture {
                sample_type: TextureSampleType::from_ordinal_or_default(
                    m.read_u32(at + a.texture_sample_type)?,
                ),
                view_dimension: TextureViewDimension::from_ordinal_or_default(
                    m.read_u32(at + a.texture_view_dimension)?,
                ),
                multisampled: m.read_bool(at + a.texture_multisampled)?,
            },
            BindingLayoutKind::StorageTexture => BindingType::StorageTexture {
                access: StorageTextureAccess::from_ordinal_or_default(
                    m.read_u32(at + a.storage_access)?,
                ),
                format: TextureFormat::from_ordinal_or_default(
                    m.read_u32(at + a.storage_format)?,
                ),
                view_dimension: TextureViewDimension::from_ordinal_or_default(
                    m.read_u32(at + a.storage_view_dimension)?,
                ),
            },
        })
    }

    pub fn bind_group_layout(&self, ptr: u64) -> BridgeResult<BindGroupLayoutDescriptor> {
        let base = require(ptr, "bind group layout descriptor")?;
        let list = &self.layouts.labeled_list;
        let e = &self.layouts.bind_group_layout_entry;
        let entries_ptr = self.mem.read_ptr(base + list.entries.ptr)?;
        let count = self.mem.read_usize(base + list.entries.len)?;

        let slots = self.mem.elements(entries_ptr, count, e.record.size)?;
        let mut entries = Vec::new();
        for at in slots {
            let kind = BindingLayoutKind::try_from_ordinal(self.mem.read_u32(at + e.kind)?)?;
            entries.push(BindGroupLayoutEntry {
                binding: self.mem.read_u32(at + e.binding)?,
                visibility: self.mem.read_u32(at + e.visibility)?,
                ty: self.binding_type(kind, at + e.layout)?,
            });
        }
        Ok(BindGroupLayoutDescriptor {
            label: self.string_at(base + list.label)?,
            entries,
        })
    }

    /// Decode a bind group against the layout it names.
    ///
    /// Each entry's tag must match the kind its binding was declared with in the layout; the
    /// declared kind (from `cache`) selects which union arm is read.
    pub fn bind_group<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        objects: &'o GpuObjects<G>,
        cache: &LayoutCache,
    ) -> BridgeResult<BindGroupDescriptor<'o, G>> {
        let base = require(ptr, "bind group descriptor")?;
        let l = &self.layouts.bind_group;
        let e = &self.layouts.bind_group_entry;
        let m = &self.mem;

        let layout_raw = m.read_u32(base + l.layout)?;
        let layout = objects.bind_group_layouts.resolve(layout_raw, "layout")?;
        let entries_ptr = m.read_ptr(base + l.entries.ptr)?;
        let count = m.read_usize(base + l.entries.len)?;

        let slots = m.elements(entries_ptr, count, e.record.size)?;
        let mut entries = Vec::new();
        for at in slots {
            let binding = m.read_u32(at + e.binding)?;
            let tag = BindingResourceKind::try_from_ordinal(m.read_u32(at + e.kind)?)?;
            let declared = cache.kind_for(layout_raw, binding).ok_or_else(|| {
                BridgeError::malformed(
                    "bind group entry",
                    format!("binding {binding} is not declared by layout {layout_raw}"),
                )
            })?;
            if declared.resource_kind() != tag {
                return Err(BridgeError::malformed(
                    "bind group entry",
                    format!(
                        "binding {binding} is declared as {declared} but the entry carries a {tag}"
                    ),
                ));
            }

            let r = at + e.resource;
            let resource = match declared.resource_kind() {
                BindingResourceKind::Buffer => BindingResource::Buffer(BufferBinding {
                    buffer: objects
                        .buffers
                        .resolve(m.read_u32(r + e.arms.buffer)?, "entries.buffer")?,
                    offset: m.read_u64(r + e.arms.buffer_offset)?,
                    size: size_or_whole(m.read_u64(r + e.arms.buffer_size)?),
                }),
                BindingResourceKind::Sampler => BindingResource::Sampler(
                    objects
                        .samplers
                        .resolve(m.read_u32(r + e.arms.sampler)?, "entries.sampler")?,
                ),
                BindingResourceKind::TextureView => BindingResource::TextureView(
                    objects
                        .texture_views
                        .resolve(m.read_u32(r + e.arms.texture_view)?, "entries.texture_view")?,
                ),
            };
            entries.push(BindGroupEntry { binding, resource });
        }

        Ok(BindGroupDescriptor {
            label: self.string_at(base + l.label)?,
            layout,
            entries,
        })
    }

    pub fn pipeline_layout<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        objects: &'o GpuObjects<G>,
    ) -> BridgeResult<PipelineLayoutDescriptor<'o, G>> {
        let base = require(ptr, "pipeline layout descriptor")?;
        let l = &self.layouts.labeled_list;
        let list_ptr = self.mem.read_ptr(base + l.entries.ptr)?;
        let count = self.mem.read_usize(base + l.entries.len)?;
        let bind_group_layouts = self
            .mem
            .read_u32_array(list_ptr, count)?
            .into_iter()
            .map(|raw| objects.bind_group_layouts.resolve(raw, "bind_group_layouts"))
            .collect::<BridgeResult<_>>()?;
        Ok(PipelineLayoutDescriptor {
            label: self.string_at(base + l.label)?,
            bind_group_layouts,
        })
    }

    fn stage<'o, G: GpuBackend>(
        &self,
        at: u64,
        objects: &'o GpuObjects<G>,
    ) -> BridgeResult<ProgrammableStage<'o, G>> {
        let l = &self.layouts.stage;
        let c = &self.layouts.constant;
        let m = &self.mem;
        let module = objects
            .shader_modules
            .resolve(m.read_u32(at + l.module)?, "module")?;

        let constants_ptr = m.read_ptr(at + l.constants.ptr)?;
        let count = m.read_usize(at + l.constants.len)?;
        let slots = m.elements(constants_ptr, count, c.record.size)?;
        let mut constants = Vec::new();
        for entry in slots {
            let key = self.string_at(entry + c.key)?.ok_or_else(|| {
                BridgeError::malformed("pipeline constant", "constant key is null")
            })?;
            constants.push((key, m.read_f64(entry + c.value)?));
        }

        Ok(ProgrammableStage {
            module,
            entry_point: self.string_at(at + l.entry_point)?,
            constants,
        })
    }

    fn optional_pipeline_layout<'o, G: GpuBackend>(
        &self,
        at: u64,
        objects: &'o GpuObjects<G>,
    ) -> BridgeResult<Option<&'o G::PipelineLayout>> {
        match self.mem.read_u32(at)? {
            0 => Ok(None),
            raw => objects.pipeline_layouts.resolve(raw, "layout").map(Some),
        }
    }

    pub fn compute_pipeline<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        objects: &'o GpuObjects<G>,
    ) -> BridgeResult<ComputePipelineDescriptor<'o, G>> {
        let base = require(ptr, "compute pipeline descriptor")?;
        let l = &self.layouts.compute_pipeline;
        Ok(ComputePipelineDescriptor {
            label: self.string_at(base + l.label)?,
            layout: self.optional_pipeline_layout(base + l.layout, objects)?,
            compute: self.stage(base + l.compute, objects)?,
        })
    }

    fn vertex_buffers(&self, ptr: u64, count: u64) -> BridgeResult<Vec<VertexBufferLayout>> {
        let vb = &self.layouts.vertex_buffer;
        let va = &self.layouts.vertex_attribute;
        let m = &self.mem;
        let slots = m.elements(ptr, count, vb.record.size)?;
        let mut buffers = Vec::new();
        for at in slots {
            let attrs_ptr = m.read_ptr(at + vb.attributes.ptr)?;
            let attrs_len = m.read_usize(at + vb.attributes.len)?;
            let attributes = m
                .elements(attrs_ptr, attrs_len, va.record.size)?
                .map(|a| {
                    Ok(VertexAttribute {
                        format: VertexFormat::from_ordinal_or_default(m.read_u32(a + va.format)?),
                        offset: m.read_u64(a + va.offset)?,
                        shader_location: m.read_u32(a + va.shader_location)?,
                    })
                })
                .collect::<BridgeResult<_>>()?;
            buffers.push(VertexBufferLayout {
                array_stride: m.read_u64(at + vb.array_stride)?,
                step_mode: VertexStepMode::from_ordinal_or_default(m.read_u32(at + vb.step_mode)?),
                attributes,
            });
        }
        Ok(buffers)
    }

    fn primitive(&self, at: u64) -> BridgeResult<PrimitiveState> {
        let l = &self.layouts.primitive;
        let m = &self.mem;
        Ok(PrimitiveState {
            topology: PrimitiveTopology::from_ordinal_or_default(m.read_u32(at + l.topology)?),
            strip_index_format: m
                .read_optional_u32(l.strip_index_format.shifted(at))?
                .map(IndexFormat::try_from_ordinal)
                .transpose()?,
            front_face: FrontFace::from_ordinal_or_default(m.read_u32(at + l.front_face)?),
            cull_mode: CullMode::from_ordinal_or_default(m.read_u32(at + l.cull_mode)?),
        })
    }

    fn stencil_face(&self, at: u64) -> BridgeResult<StencilFaceState> {
        let l = &self.layouts.stencil_face;
        let m = &self.mem;
        let op = |off| m.read_u32(at + off).map(StencilOperation::from_ordinal_or_default);
        Ok(StencilFaceState {
            compare: CompareFunction::from_ordinal_or_default(m.read_u32(at + l.compare)?),
            fail_op: op(l.fail_op)?,
            depth_fail_op: op(l.depth_fail_op)?,
            pass_op: op(l.pass_op)?,
        })
    }

    fn depth_stencil(&self, ptr: u64) -> BridgeResult<Option<DepthStencilState>> {
        if ptr == 0 {
            return Ok(None);
        }
        let l = &self.layouts.depth_stencil;
        let m = &self.mem;
        Ok(Some(DepthStencilState {
            format: TextureFormat::from_ordinal_or_default(m.read_u32(ptr + l.format)?),
            depth_write_enabled: m.read_bool(ptr + l.depth_write_enabled)?,
            depth_compare: CompareFunction::from_ordinal_or_default(
                m.read_u32(ptr + l.depth_compare)?,
            ),
            stencil_front: self.stencil_face(ptr + l.stencil_front)?,
            stencil_back: self.stencil_face(ptr + l.stencil_back)?,
            stencil_read_mask: m.read_u32(ptr + l.stencil_read_mask)?,
            stencil_write_mask: m.read_u32(ptr + l.stencil_write_mask)?,
            depth_bias: m.read_i32(ptr + l.depth_bias)?,
            depth_bias_slope_scale: m.read_f32(ptr + l.depth_bias_slope_scale)?,
            depth_bias_clamp: m.read_f32(ptr + l.depth_bias_clamp)?,
        }))
    }

    fn blend_component(&self, at: u64) -> BridgeResult<BlendComponent> {
        let l = &self.layouts.blend_component;
        let m = &self.mem;
        Ok(BlendComponent {
            operation: BlendOperation::from_ordinal_or_default(m.read_u32(at + l.operation)?),
            src_factor: BlendFactor::from_ordinal_or_default(m.read_u32(at + l.src_factor)?),
            dst_factor: BlendFactor::from_ordinal_or_default(m.read_u32(at + l.dst_factor)?),
        })
    }

    fn color_targets(&self, ptr: u64, count: u64) -> BridgeResult<Vec<ColorTargetState>> {
        let l = &self.layouts.color_target;
        let b = &self.layouts.blend;
        let m = &self.mem;
        m.elements(ptr, count, l.record.size)?
            .map(|at| {
                let blend = match m.read_ptr(at + l.blend)? {
                    0 => None,
                    blend_ptr => Some(BlendState {
                        color: self.blend_component(blend_ptr + b.color)?,
                        alpha: self.blend_component(blend_ptr + b.alpha)?,
                    }),
                };
                Ok(ColorTargetState {
                    format: TextureFormat::from_ordinal_or_default(m.read_u32(at + l.format)?),
                    blend,
                    write_mask: m.read_u32(at + l.write_mask)?,
                })
            })
            .collect()
    }

    fn fragment<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        objects: &'o GpuObjects<G>,
    ) -> BridgeResult<Option<FragmentState<'o, G>>> {
        if ptr == 0 {
            return Ok(None);
        }
        let l = &self.layouts.fragment;
        let targets_ptr = self.mem.read_ptr(ptr + l.targets.ptr)?;
        let targets_len = self.mem.read_usize(ptr + l.targets.len)?;
        Ok(Some(FragmentState {
            stage: self.stage(ptr + l.stage, objects)?,
            targets: self.color_targets(targets_ptr, targets_len)?,
        }))
    }

    pub fn render_pipeline<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        objects: &'o GpuObjects<G>,
    ) -> BridgeResult<RenderPipelineDescriptor<'o, G>> {
        let base = require(ptr, "render pipeline descriptor")?;
        let l = &self.layouts.render_pipeline;
        let v = &self.layouts.vertex;
        let ms = &self.layouts.multisample;
        let m = &self.mem;

        let vertex_at = base + l.vertex;
        let buffers_ptr = m.read_ptr(vertex_at + v.buffers.ptr)?;
        let buffers_len = m.read_usize(vertex_at + v.buffers.len)?;
        let vertex = VertexState {
            stage: self.stage(vertex_at + v.stage, objects)?,
            buffers: self.vertex_buffers(buffers_ptr, buffers_len)?,
        };

        let ms_at = base + l.multisample;
        let multisample = MultisampleState {
            count: m.read_u32(ms_at + ms.count)?,
            mask: m.read_u32(ms_at + ms.mask)?,
            alpha_to_coverage_enabled: m.read_bool(ms_at + ms.alpha_to_coverage_enabled)?,
        };

        Ok(RenderPipelineDescriptor {
            label: self.string_at(base + l.label)?,
            layout: self.optional_pipeline_layout(base + l.layout, objects)?,
            vertex,
            primitive: self.primitive(base + l.primitive)?,
            depth_stencil: self.depth_stencil(m.read_ptr(base + l.depth_stencil)?)?,
            multisample,
            fragment: self.fragment(m.read_ptr(base + l.fragment)?, objects)?,
        })
    }

    fn timestamp_writes<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        query_sets: &'o Registry<G::QuerySet>,
    ) -> BridgeResult<Option<PassTimestampWrites<'o, G>>> {
        if ptr == 0 {
            return Ok(None);
        }
        let l = &self.layouts.timestamp_writes;
        Ok(Some(PassTimestampWrites {
            query_set: query_sets
                .resolve(self.mem.read_u32(ptr + l.query_set)?, "timestamp_writes.query_set")?,
            beginning_of_pass_write_index: self
                .mem
                .read_optional_u32(l.beginning_of_pass_write_index.shifted(ptr))?,
            end_of_pass_write_index: self
                .mem
                .read_optional_u32(l.end_of_pass_write_index.shifted(ptr))?,
        }))
    }

    /// A null pointer is an unlabeled pass without timestamp writes.
    ///
    /// Pass decoders borrow only the registries they resolve from, so the encoder the pass is
    /// recorded into can be borrowed mutably alongside them.
    pub fn compute_pass<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        query_sets: &'o Registry<G::QuerySet>,
    ) -> BridgeResult<ComputePassDescriptor<'o, G>> {
        if ptr == 0 {
            return Ok(ComputePassDescriptor {
                label: None,
                timestamp_writes: None,
            });
        }
        let l = &self.layouts.compute_pass;
        Ok(ComputePassDescriptor {
            label: self.string_at(ptr + l.label)?,
            timestamp_writes: self
                .timestamp_writes(self.mem.read_ptr(ptr + l.timestamp_writes)?, query_sets)?,
        })
    }

    fn color(&self, at: u64) -> BridgeResult<Color> {
        let l = &self.layouts.color;
        Ok(Color {
            r: self.mem.read_f64(at + l.r)?,
            g: self.mem.read_f64(at + l.g)?,
            b: self.mem.read_f64(at + l.b)?,
            a: self.mem.read_f64(at + l.a)?,
        })
    }

    fn color_attachments<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        count: u64,
        views: &'o Registry<G::TextureView>,
    ) -> BridgeResult<Vec<RenderPassColorAttachment<'o, G>>> {
        let l = &self.layouts.color_attachment;
        let m = &self.mem;
        m.elements(ptr, count, l.record.size)?
            .map(|at| {
                let resolve_target = match m.read_u32(at + l.resolve_target)? {
                    0 => None,
                    raw => Some(views.resolve(raw, "color_attachments.resolve_target")?),
                };
                Ok(RenderPassColorAttachment {
                    view: views.resolve(m.read_u32(at + l.view)?, "color_attachments.view")?,
                    resolve_target,
                    clear_value: m.read_optional(l.clear_value.shifted(at), |_, v| self.color(v))?,
                    load_op: LoadOp::try_from_ordinal(m.read_u32(at + l.load_op)?)?,
                    store_op: StoreOp::try_from_ordinal(m.read_u32(at + l.store_op)?)?,
                })
            })
            .collect()
    }

    fn depth_stencil_attachment<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        views: &'o Registry<G::TextureView>,
    ) -> BridgeResult<Option<RenderPassDepthStencilAttachment<'o, G>>> {
        if ptr == 0 {
            return Ok(None);
        }
        let l = &self.layouts.depth_stencil_attachment;
        let m = &self.mem;
        let load = |at: OptionalOffsets| {
            m.read_optional_u32(at.shifted(ptr))?
                .map(LoadOp::try_from_ordinal)
                .transpose()
        };
        let store = |at: OptionalOffsets| {
            m.read_optional_u32(at.shifted(ptr))?
                .map(StoreOp::try_from_ordinal)
                .transpose()
        };
        Ok(Some(RenderPassDepthStencilAttachment {
            view: views.resolve(m.read_u32(ptr + l.view)?, "depth_stencil_attachment.view")?,
            depth_clear_value: m.read_f32(ptr + l.depth_clear_value)?,
            depth_load_op: load(l.depth_load_op)?,
            depth_store_op: store(l.depth_store_op)?,
            depth_read_only: m.read_bool(ptr + l.depth_read_only)?,
            stencil_clear_value: m.read_u32(ptr + l.stencil_clear_value)?,
            stencil_load_op: load(l.stencil_load_op)?,
            stencil_store_op: store(l.stencil_store_op)?,
            stencil_read_only: m.read_bool(ptr + l.stencil_read_only)?,
        }))
    }

    pub fn render_pass<'o, G: GpuBackend>(
        &self,
        ptr: u64,
        views: &'o Registry<G::TextureView>,
        query_sets: &'o Registry<G::QuerySet>,
    ) -> BridgeResult<RenderPassDescriptor<'o, G>> {
        let base = require(ptr, "render pass descriptor")?;
        let l = &self.layouts.render_pass;
        let m = &self.mem;
        let attachments_ptr = m.read_ptr(base + l.color_attachments.ptr)?;
        let attachments_len = m.read_usize(base + l.color_attachments.len)?;
        let occlusion_query_set = match m.read_u32(base + l.occlusion_query_set)? {
            0 => None,
            raw => Some(query_sets.resolve(raw, "occlusion_query_set")?),
        };
        Ok(RenderPassDescriptor {
            label: self.string_at(base + l.label)?,
            color_attachments: self.color_attachments(attachments_ptr, attachments_len, views)?,
            depth_stencil_attachment: self
                .depth_stencil_attachment(m.read_ptr(base + l.depth_stencil_attachment)?, views)?,
            occlusion_query_set,
            timestamp_writes: self
                .timestamp_writes(m.read_ptr(base + l.timestamp_writes)?, query_sets)?,
        })
    }

    pub fn query_set(&self, ptr: u64) -> BridgeResult<QuerySetDescriptor> {
        let base = require(ptr, "query set descriptor")?;
        let l = &self.layouts.query_set;
        Ok(QuerySetDescriptor {
            label: self.string_at(base + l.label)?,
            ty: QueryType::try_from_ordinal(self.mem.read_u32(base + l.ty)?)?,
            count: self.mem.read_u32(base + l.count)?,
        })
    }
}
