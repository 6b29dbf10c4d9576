//! Wire layouts of every descriptor record the guest passes by pointer.
//!
//! Each layout is declared exactly once, as an ordered field list fed to a [`RecordBuilder`].
//! Decoders and tests read offsets from these structs and never hard-code them. The wasm32
//! offsets are listed on each type for guest authors; a unit test pins them.
//!
//! Conventions:
//! - `label`, `entry_point` and constant keys are nullable zero-terminated strings.
//! - Handles are `u32`; `0` means "none" wherever a handle is optional.
//! - `(ptr, len)` pairs are a pointer followed by a `usize` count.
//! - Optionals are inline `{ value, present: bool }`.

use super::{FieldLayout, OptionalOffsets, PointerWidth, RecordBuilder, SliceOffsets};

/// `{ power_preference: u32, force_fallback_adapter: bool }`; wasm32: 0, 4; size 8.
#[derive(Copy, Clone, Debug)]
pub struct RequestAdapterOptionsLayout {
    pub power_preference: u64,
    pub force_fallback_adapter: u64,
    pub record: FieldLayout,
}

impl RequestAdapterOptionsLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let power_preference = b.u32();
        let force_fallback_adapter = b.bool();
        Self {
            power_preference,
            force_fallback_adapter,
            record: b.finish(),
        }
    }
}

/// `{ label, size: u64, usage: u32, mapped_at_creation: bool }`; wasm32: 0, 8, 16, 20; size 24.
#[derive(Copy, Clone, Debug)]
pub struct BufferDescriptorLayout {
    pub label: u64,
    pub size: u64,
    pub usage: u64,
    pub mapped_at_creation: u64,
    pub record: FieldLayout,
}

impl BufferDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let size = b.u64();
        let usage = b.u32();
        let mapped_at_creation = b.bool();
        Self {
            label,
            size,
            usage,
            mapped_at_creation,
            record: b.finish(),
        }
    }
}

/// `{ label, code: (ptr, len) }` with WGSL source bytes; wasm32: 0, 4, 8; size 12.
#[derive(Copy, Clone, Debug)]
pub struct ShaderModuleDescriptorLayout {
    pub label: u64,
    pub code: SliceOffsets,
    pub record: FieldLayout,
}

impl ShaderModuleDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let code = b.slice();
        Self {
            label,
            code,
            record: b.finish(),
        }
    }
}

/// `{ width, height, depth_or_array_layers }`, all `u32`; size 12.
#[derive(Copy, Clone, Debug)]
pub struct Extent3dLayout {
    pub width: u64,
    pub height: u64,
    pub depth_or_array_layers: u64,
    pub record: FieldLayout,
}

impl Extent3dLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let w = b.u32();
        let height = b.u32();
        let depth_or_array_layers = b.u32();
        Self {
            width: w,
            height,
            depth_or_array_layers,
            record: b.finish(),
        }
    }
}

/// wasm32: label 0, size 4 (Extent3d), mip_level_count 16, sample_count 20, dimension 24,
/// format 28, usage 32, view_formats 36/40; size 44.
#[derive(Copy, Clone, Debug)]
pub struct TextureDescriptorLayout {
    pub label: u64,
    pub size: u64,
    pub mip_level_count: u64,
    pub sample_count: u64,
    pub dimension: u64,
    pub format: u64,
    pub usage: u64,
    pub view_formats: SliceOffsets,
    pub record: FieldLayout,
}

impl TextureDescriptorLayout {
    pub fn new(width: PointerWidth, extent: &Extent3dLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let size = b.field(extent.record);
        let mip_level_count = b.u32();
        let sample_count = b.u32();
        let dimension = b.u32();
        let format = b.u32();
        let usage = b.u32();
        let view_formats = b.slice();
        Self {
            label,
            size,
            mip_level_count,
            sample_count,
            dimension,
            format,
            usage,
            view_formats,
            record: b.finish(),
        }
    }
}

/// wasm32: label 0, format 4/8, dimension 12/16, aspect 20, base_mip_level 24,
/// mip_level_count 28/32, base_array_layer 36, array_layer_count 40/44; size 48.
#[derive(Copy, Clone, Debug)]
pub struct TextureViewDescriptorLayout {
    pub label: u64,
    pub format: OptionalOffsets,
    pub dimension: OptionalOffsets,
    pub aspect: u64,
    pub base_mip_level: u64,
    pub mip_level_count: OptionalOffsets,
    pub base_array_layer: u64,
    pub array_layer_count: OptionalOffsets,
    pub record: FieldLayout,
}

impl TextureViewDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let format = b.optional(FieldLayout::U32);
        let dimension = b.optional(FieldLayout::U32);
        let aspect = b.u32();
        let base_mip_level = b.u32();
        let mip_level_count = b.optional(FieldLayout::U32);
        let base_array_layer = b.u32();
        let array_layer_count = b.optional(FieldLayout::U32);
        Self {
            label,
            format,
            dimension,
            aspect,
            base_mip_level,
            mip_level_count,
            base_array_layer,
            array_layer_count,
            record: b.finish(),
        }
    }
}

/// wasm32: label 0, address modes 4/8/12, mag/min/mipmap filter 16/20/24, lod_min_clamp 28,
/// lod_max_clamp 32, compare 36/40, max_anisotropy (u16) 44; size 48.
#[derive(Copy, Clone, Debug)]
pub struct SamplerDescriptorLayout {
    pub label: u64,
    pub address_mode_u: u64,
    pub address_mode_v: u64,
    pub address_mode_w: u64,
    pub mag_filter: u64,
    pub min_filter: u64,
    pub mipmap_filter: u64,
    pub lod_min_clamp: u64,
    pub lod_max_clamp: u64,
    pub compare: OptionalOffsets,
    pub max_anisotropy: u64,
    pub record: FieldLayout,
}

impl SamplerDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let address_mode_u = b.u32();
        let address_mode_v = b.u32();
        let address_mode_w = b.u32();
        let mag_filter = b.u32();
        let min_filter = b.u32();
        let mipmap_filter = b.u32();
        let lod_min_clamp = b.f32();
        let lod_max_clamp = b.f32();
        let compare = b.optional(FieldLayout::U32);
        let max_anisotropy = b.u16();
        Self {
            label,
            address_mode_u,
            address_mode_v,
            address_mode_w,
            mag_filter,
            min_filter,
            mipmap_filter,
            lod_min_clamp,
            lod_max_clamp,
            compare,
            max_anisotropy,
            record: b.finish(),
        }
    }
}

/// Arms of [`BindGroupLayoutEntryLayout::layout`].
///
/// - buffer: `{ ty: u32, has_dynamic_offset: bool, min_binding_size: u64 }` (0, 4, 8; size 16)
/// - sampler: `{ ty: u32 }`
/// - texture: `{ sample_type: u32, view_dimension: u32, multisampled: bool }` (0, 4, 8; size 12)
/// - storage texture: `{ access: u32, format: u32, view_dimension: u32 }` (0, 4, 8; size 12)
#[derive(Copy, Clone, Debug)]
pub struct BindingLayoutArms {
    pub buffer_ty: u64,
    pub buffer_has_dynamic_offset: u64,
    pub buffer_min_binding_size: u64,
    pub sampler_ty: u64,
    pub texture_sample_type: u64,
    pub texture_view_dimension: u64,
    pub texture_multisampled: u64,
    pub storage_access: u64,
    pub storage_format: u64,
    pub storage_view_dimension: u64,
    pub union: FieldLayout,
}

impl BindingLayoutArms {
    pub fn new(width: PointerWidth) -> Self {
        let mut buffer = RecordBuilder::new(width);
        let buffer_ty = buffer.u32();
        let buffer_has_dynamic_offset = buffer.bool();
        let buffer_min_binding_size = buffer.u64();

        let mut sampler = RecordBuilder::new(width);
        let sampler_ty = sampler.u32();

        let mut texture = RecordBuilder::new(width);
        let texture_sample_type = texture.u32();
        let texture_view_dimension = texture.u32();
        let texture_multisampled = texture.bool();

        let mut storage = RecordBuilder::new(width);
        let storage_access = storage.u32();
        let storage_format = storage.u32();
        let storage_view_dimension = storage.u32();

        Self {
            buffer_ty,
            buffer_has_dynamic_offset,
            buffer_min_binding_size,
            sampler_ty,
            texture_sample_type,
            texture_view_dimension,
            texture_multisampled,
            storage_access,
            storage_format,
            storage_view_dimension,
            union: FieldLayout::union(&[
                buffer.finish(),
                sampler.finish(),
                texture.finish(),
                storage.finish(),
            ]),
        }
    }
}

/// `{ binding, visibility, kind, layout: union }`; wasm32: 0, 4, 8, 16; size 32.
///
/// `kind`: 0 buffer, 1 sampler, 2 texture, 3 storage texture.
#[derive(Copy, Clone, Debug)]
pub struct BindGroupLayoutEntryLayout {
    pub binding: u64,
    pub visibility: u64,
    pub kind: u64,
    pub layout: u64,
    pub arms: BindingLayoutArms,
    pub record: FieldLayout,
}

impl BindGroupLayoutEntryLayout {
    pub fn new(width: PointerWidth) -> Self {
        let arms = BindingLayoutArms::new(width);
        let mut b = RecordBuilder::new(width);
        let binding = b.u32();
        let visibility = b.u32();
        let kind = b.u32();
        let layout = b.field(arms.union);
        Self {
            binding,
            visibility,
            kind,
            layout,
            arms,
            record: b.finish(),
        }
    }
}

/// `{ label, entries: (ptr, len) }`; wasm32: 0, 4, 8; size 12.
#[derive(Copy, Clone, Debug)]
pub struct LabeledListLayout {
    pub label: u64,
    pub entries: SliceOffsets,
    pub record: FieldLayout,
}

impl LabeledListLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let entries = b.slice();
        Self {
            label,
            entries,
            record: b.finish(),
        }
    }
}

/// Arms of [`BindGroupEntryLayout::resource`].
///
/// - buffer: `{ buffer: u32, offset: u64, size: u64 }` (0, 8, 16; size 24); `size` all-ones
///   means "rest of the buffer"
/// - sampler: `{ sampler: u32 }`
/// - texture view: `{ view: u32 }`
#[derive(Copy, Clone, Debug)]
pub struct BindingResourceArms {
    pub buffer: u64,
    pub buffer_offset: u64,
    pub buffer_size: u64,
    pub sampler: u64,
    pub texture_view: u64,
    pub union: FieldLayout,
}

impl BindingResourceArms {
    pub fn new(width: PointerWidth) -> Self {
        let mut buffer_arm = RecordBuilder::new(width);
        let buffer = buffer_arm.u32();
        let buffer_offset = buffer_arm.u64();
        let buffer_size = buffer_arm.u64();

        let mut sampler_arm = RecordBuilder::new(width);
        let sampler = sampler_arm.u32();

        let mut view_arm = RecordBuilder::new(width);
        let texture_view = view_arm.u32();

        Self {
            buffer,
            buffer_offset,
            buffer_size,
            sampler,
            texture_view,
            union: FieldLayout::union(&[
                buffer_arm.finish(),
                sampler_arm.finish(),
                view_arm.finish(),
            ]),
        }
    }
}

/// `{ binding, kind, resource: union }`; wasm32: 0, 4, 8; size 32.
///
/// `kind`: 0 buffer, 1 sampler, 2 texture view. It must agree with the bind-group layout.
#[derive(Copy, Clone, Debug)]
pub struct BindGroupEntryLayout {
    pub binding: u64,
    pub kind: u64,
    pub resource: u64,
    pub arms: BindingResourceArms,
    pub record: FieldLayout,
}

impl BindGroupEntryLayout {
    pub fn new(width: PointerWidth) -> Self {
        let arms = BindingResourceArms::new(width);
        let mut b = RecordBuilder::new(width);
        let binding = b.u32();
        let kind = b.u32();
        let resource = b.field(arms.union);
        Self {
            binding,
            kind,
            resource,
            arms,
            record: b.finish(),
        }
    }
}

/// `{ label, layout: u32, entries: (ptr, len) }`; wasm32: 0, 4, 8, 12; size 16.
#[derive(Copy, Clone, Debug)]
pub struct BindGroupDescriptorLayout {
    pub label: u64,
    pub layout: u64,
    pub entries: SliceOffsets,
    pub record: FieldLayout,
}

impl BindGroupDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let layout = b.u32();
        let entries = b.slice();
        Self {
            label,
            layout,
            entries,
            record: b.finish(),
        }
    }
}

/// `{ key, value: f64 }`; wasm32: 0, 8; size 16.
#[derive(Copy, Clone, Debug)]
pub struct ConstantEntryLayout {
    pub key: u64,
    pub value: u64,
    pub record: FieldLayout,
}

impl ConstantEntryLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let key = b.ptr();
        let value = b.f64();
        Self {
            key,
            value,
            record: b.finish(),
        }
    }
}

/// `{ module: u32, entry_point, constants: (ptr, len) }`; wasm32: 0, 4, 8, 12; size 16.
#[derive(Copy, Clone, Debug)]
pub struct ProgrammableStageLayout {
    pub module: u64,
    pub entry_point: u64,
    pub constants: SliceOffsets,
    pub record: FieldLayout,
}

impl ProgrammableStageLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let module = b.u32();
        let entry_point = b.ptr();
        let constants = b.slice();
        Self {
            module,
            entry_point,
            constants,
            record: b.finish(),
        }
    }
}

/// `{ label, layout: u32 (0 = auto), compute: ProgrammableStage }`; wasm32: 0, 4, 8; size 24.
#[derive(Copy, Clone, Debug)]
pub struct ComputePipelineDescriptorLayout {
    pub label: u64,
    pub layout: u64,
    pub compute: u64,
    pub record: FieldLayout,
}

impl ComputePipelineDescriptorLayout {
    pub fn new(width: PointerWidth, stage: &ProgrammableStageLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let layout = b.u32();
        let compute = b.field(stage.record);
        Self {
            label,
            layout,
            compute,
            record: b.finish(),
        }
    }
}

/// `{ format: u32, offset: u64, shader_location: u32 }`; wasm32: 0, 8, 16; size 24.
#[derive(Copy, Clone, Debug)]
pub struct VertexAttributeLayout {
    pub format: u64,
    pub offset: u64,
    pub shader_location: u64,
    pub record: FieldLayout,
}

impl VertexAttributeLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let format = b.u32();
        let offset = b.u64();
        let shader_location = b.u32();
        Self {
            format,
            offset,
            shader_location,
            record: b.finish(),
        }
    }
}

/// `{ array_stride: u64, step_mode: u32, attributes: (ptr, len) }`; wasm32: 0, 8, 12, 16;
/// size 24.
#[derive(Copy, Clone, Debug)]
pub struct VertexBufferLayoutLayout {
    pub array_stride: u64,
    pub step_mode: u64,
    pub attributes: SliceOffsets,
    pub record: FieldLayout,
}

impl VertexBufferLayoutLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let array_stride = b.u64();
        let step_mode = b.u32();
        let attributes = b.slice();
        Self {
            array_stride,
            step_mode,
            attributes,
            record: b.finish(),
        }
    }
}

/// `{ stage: ProgrammableStage, buffers: (ptr, len) }`; wasm32: 0, 16, 20; size 24.
#[derive(Copy, Clone, Debug)]
pub struct VertexStateLayout {
    pub stage: u64,
    pub buffers: SliceOffsets,
    pub record: FieldLayout,
}

impl VertexStateLayout {
    pub fn new(width: PointerWidth, stage: &ProgrammableStageLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let at = b.field(stage.record);
        let buffers = b.slice();
        Self {
            stage: at,
            buffers,
            record: b.finish(),
        }
    }
}

/// `{ topology, strip_index_format: Option<u32>, front_face, cull_mode }`; wasm32: 0, 4/8,
/// 12, 16; size 20.
#[derive(Copy, Clone, Debug)]
pub struct PrimitiveStateLayout {
    pub topology: u64,
    pub strip_index_format: OptionalOffsets,
    pub front_face: u64,
    pub cull_mode: u64,
    pub record: FieldLayout,
}

impl PrimitiveStateLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let topology = b.u32();
        let strip_index_format = b.optional(FieldLayout::U32);
        let front_face = b.u32();
        let cull_mode = b.u32();
        Self {
            topology,
            strip_index_format,
            front_face,
            cull_mode,
            record: b.finish(),
        }
    }
}

/// `{ compare, fail_op, depth_fail_op, pass_op }`, all `u32`; size 16.
#[derive(Copy, Clone, Debug)]
pub struct StencilFaceStateLayout {
    pub compare: u64,
    pub fail_op: u64,
    pub depth_fail_op: u64,
    pub pass_op: u64,
    pub record: FieldLayout,
}

impl StencilFaceStateLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let compare = b.u32();
        let fail_op = b.u32();
        let depth_fail_op = b.u32();
        let pass_op = b.u32();
        Self {
            compare,
            fail_op,
            depth_fail_op,
            pass_op,
            record: b.finish(),
        }
    }
}

/// wasm32: format 0, depth_write_enabled 4, depth_compare 8, stencil_front 12,
/// stencil_back 28, stencil_read_mask 44, stencil_write_mask 48, depth_bias 52,
/// depth_bias_slope_scale 56, depth_bias_clamp 60; size 64.
#[derive(Copy, Clone, Debug)]
pub struct DepthStencilStateLayout {
    pub format: u64,
    pub depth_write_enabled: u64,
    pub depth_compare: u64,
    pub stencil_front: u64,
    pub stencil_back: u64,
    pub stencil_read_mask: u64,
    pub stencil_write_mask: u64,
    pub depth_bias: u64,
    pub depth_bias_slope_scale: u64,
    pub depth_bias_clamp: u64,
    pub record: FieldLayout,
}

impl DepthStencilStateLayout {
    pub fn new(width: PointerWidth, face: &StencilFaceStateLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let format = b.u32();
        let depth_write_enabled = b.bool();
        let depth_compare = b.u32();
        let stencil_front = b.field(face.record);
        let stencil_back = b.field(face.record);
        let stencil_read_mask = b.u32();
        let stencil_write_mask = b.u32();
        let depth_bias = b.i32();
        let depth_bias_slope_scale = b.f32();
        let depth_bias_clamp = b.f32();
        Self {
            format,
            depth_write_enabled,
            depth_compare,
            stencil_front,
            stencil_back,
            stencil_read_mask,
            stencil_write_mask,
            depth_bias,
            depth_bias_slope_scale,
            depth_bias_clamp,
            record: b.finish(),
        }
    }
}

/// `{ count: u32, mask: u32, alpha_to_coverage_enabled: bool }`; wasm32: 0, 4, 8; size 12.
#[derive(Copy, Clone, Debug)]
pub struct MultisampleStateLayout {
    pub count: u64,
    pub mask: u64,
    pub alpha_to_coverage_enabled: u64,
    pub record: FieldLayout,
}

impl MultisampleStateLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let count = b.u32();
        let mask = b.u32();
        let alpha_to_coverage_enabled = b.bool();
        Self {
            count,
            mask,
            alpha_to_coverage_enabled,
            record: b.finish(),
        }
    }
}

/// `{ operation, src_factor, dst_factor }`, all `u32`; size 12.
#[derive(Copy, Clone, Debug)]
pub struct BlendComponentLayout {
    pub operation: u64,
    pub src_factor: u64,
    pub dst_factor: u64,
    pub record: FieldLayout,
}

impl BlendComponentLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let operation = b.u32();
        let src_factor = b.u32();
        let dst_factor = b.u32();
        Self {
            operation,
            src_factor,
            dst_factor,
            record: b.finish(),
        }
    }
}

/// `{ color: BlendComponent, alpha: BlendComponent }`; size 24.
#[derive(Copy, Clone, Debug)]
pub struct BlendStateLayout {
    pub color: u64,
    pub alpha: u64,
    pub record: FieldLayout,
}

impl BlendStateLayout {
    pub fn new(width: PointerWidth, component: &BlendComponentLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let color = b.field(component.record);
        let alpha = b.field(component.record);
        Self {
            color,
            alpha,
            record: b.finish(),
        }
    }
}

/// `{ format: u32, blend: *BlendState (nullable), write_mask: u32 }`; wasm32: 0, 4, 8; size 12.
#[derive(Copy, Clone, Debug)]
pub struct ColorTargetStateLayout {
    pub format: u64,
    pub blend: u64,
    pub write_mask: u64,
    pub record: FieldLayout,
}

impl ColorTargetStateLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let format = b.u32();
        let blend = b.ptr();
        let write_mask = b.u32();
        Self {
            format,
            blend,
            write_mask,
            record: b.finish(),
        }
    }
}

/// `{ stage: ProgrammableStage, targets: (ptr, len) }`; wasm32: 0, 16, 20; size 24.
#[derive(Copy, Clone, Debug)]
pub struct FragmentStateLayout {
    pub stage: u64,
    pub targets: SliceOffsets,
    pub record: FieldLayout,
}

impl FragmentStateLayout {
    pub fn new(width: PointerWidth, stage: &ProgrammableStageLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let at = b.field(stage.record);
        let targets = b.slice();
        Self {
            stage: at,
            targets,
            record: b.finish(),
        }
    }
}

/// wasm32: label 0, layout 4, vertex 8 (VertexState, 24 bytes), primitive 32 (20 bytes),
/// depth_stencil 52 (nullable ptr), multisample 56 (12 bytes), fragment 68 (nullable ptr);
/// size 72.
#[derive(Copy, Clone, Debug)]
pub struct RenderPipelineDescriptorLayout {
    pub label: u64,
    pub layout: u64,
    pub vertex: u64,
    pub primitive: u64,
    pub depth_stencil: u64,
    pub multisample: u64,
    pub fragment: u64,
    pub record: FieldLayout,
}

impl RenderPipelineDescriptorLayout {
    pub fn new(
        width: PointerWidth,
        vertex: &VertexStateLayout,
        primitive: &PrimitiveStateLayout,
        multisample: &MultisampleStateLayout,
    ) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let layout = b.u32();
        let vertex_at = b.field(vertex.record);
        let primitive_at = b.field(primitive.record);
        let depth_stencil = b.ptr();
        let multisample_at = b.field(multisample.record);
        let fragment = b.ptr();
        Self {
            label,
            layout,
            vertex: vertex_at,
            primitive: primitive_at,
            depth_stencil,
            multisample: multisample_at,
            fragment,
            record: b.finish(),
        }
    }
}

/// `{ query_set: u32, beginning: Option<u32>, end: Option<u32> }`; wasm32: 0, 4/8, 12/16;
/// size 20.
#[derive(Copy, Clone, Debug)]
pub struct PassTimestampWritesLayout {
    pub query_set: u64,
    pub beginning_of_pass_write_index: OptionalOffsets,
    pub end_of_pass_write_index: OptionalOffsets,
    pub record: FieldLayout,
}

impl PassTimestampWritesLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let query_set = b.u32();
        let beginning_of_pass_write_index = b.optional(FieldLayout::U32);
        let end_of_pass_write_index = b.optional(FieldLayout::U32);
        Self {
            query_set,
            beginning_of_pass_write_index,
            end_of_pass_write_index,
            record: b.finish(),
        }
    }
}

/// `{ label, timestamp_writes: *PassTimestampWrites (nullable) }`; wasm32: 0, 4; size 8.
#[derive(Copy, Clone, Debug)]
pub struct ComputePassDescriptorLayout {
    pub label: u64,
    pub timestamp_writes: u64,
    pub record: FieldLayout,
}

impl ComputePassDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let timestamp_writes = b.ptr();
        Self {
            label,
            timestamp_writes,
            record: b.finish(),
        }
    }
}

/// `{ r, g, b, a }`, all `f64`; size 32.
#[derive(Copy, Clone, Debug)]
pub struct ColorLayout {
    pub r: u64,
    pub g: u64,
    pub b: u64,
    pub a: u64,
    pub record: FieldLayout,
}

impl ColorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let r = b.f64();
        let g = b.f64();
        let blue = b.f64();
        let a = b.f64();
        Self {
            r,
            g,
            b: blue,
            a,
            record: b.finish(),
        }
    }
}

/// wasm32: view 0, resolve_target 4 (0 = none), clear_value 8 (Color) / present 40,
/// load_op 48, store_op 52; size 56.
#[derive(Copy, Clone, Debug)]
pub struct RenderPassColorAttachmentLayout {
    pub view: u64,
    pub resolve_target: u64,
    pub clear_value: OptionalOffsets,
    pub load_op: u64,
    pub store_op: u64,
    pub record: FieldLayout,
}

impl RenderPassColorAttachmentLayout {
    pub fn new(width: PointerWidth, color: &ColorLayout) -> Self {
        let mut b = RecordBuilder::new(width);
        let view = b.u32();
        let resolve_target = b.u32();
        let clear_value = b.optional(color.record);
        let load_op = b.u32();
        let store_op = b.u32();
        Self {
            view,
            resolve_target,
            clear_value,
            load_op,
            store_op,
            record: b.finish(),
        }
    }
}

/// wasm32: view 0, depth_clear_value 4, depth_load_op 8/12, depth_store_op 16/20,
/// depth_read_only 24, stencil_clear_value 28, stencil_load_op 32/36, stencil_store_op 40/44,
/// stencil_read_only 48; size 52.
#[derive(Copy, Clone, Debug)]
pub struct RenderPassDepthStencilAttachmentLayout {
    pub view: u64,
    pub depth_clear_value: u64,
    pub depth_load_op: OptionalOffsets,
    pub depth_store_op: OptionalOffsets,
    pub depth_read_only: u64,
    pub stencil_clear_value: u64,
    pub stencil_load_op: OptionalOffsets,
    pub stencil_store_op: OptionalOffsets,
    pub stencil_read_only: u64,
    pub record: FieldLayout,
}

impl RenderPassDepthStencilAttachmentLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let view = b.u32();
        let depth_clear_value = b.f32();
        let depth_load_op = b.optional(FieldLayout::U32);
        let depth_store_op = b.optional(FieldLayout::U32);
        let depth_read_only = b.bool();
        let stencil_clear_value = b.u32();
        let stencil_load_op = b.optional(FieldLayout::U32);
        let stencil_store_op = b.optional(FieldLayout::U32);
        let stencil_read_only = b.bool();
        Self {
            view,
            depth_clear_value,
            depth_load_op,
            depth_store_op,
            depth_read_only,
            stencil_clear_value,
            stencil_load_op,
            stencil_store_op,
            stencil_read_only,
            record: b.finish(),
        }
    }
}

/// wasm32: label 0, color_attachments 4/8, depth_stencil_attachment 12 (nullable ptr),
/// occlusion_query_set 16 (0 = none), timestamp_writes 20 (nullable ptr); size 24.
#[derive(Copy, Clone, Debug)]
pub struct RenderPassDescriptorLayout {
    pub label: u64,
    pub color_attachments: SliceOffsets,
    pub depth_stencil_attachment: u64,
    pub occlusion_query_set: u64,
    pub timestamp_writes: u64,
    pub record: FieldLayout,
}

impl RenderPassDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let color_attachments = b.slice();
        let depth_stencil_attachment = b.ptr();
        let occlusion_query_set = b.u32();
        let timestamp_writes = b.ptr();
        Self {
            label,
            color_attachments,
            depth_stencil_attachment,
            occlusion_query_set,
            timestamp_writes,
            record: b.finish(),
        }
    }
}

/// `{ label, ty: u32, count: u32 }`; wasm32: 0, 4, 8; size 12.
#[derive(Copy, Clone, Debug)]
pub struct QuerySetDescriptorLayout {
    pub label: u64,
    pub ty: u64,
    pub count: u64,
    pub record: FieldLayout,
}

impl QuerySetDescriptorLayout {
    pub fn new(width: PointerWidth) -> Self {
        let mut b = RecordBuilder::new(width);
        let label = b.ptr();
        let ty = b.u32();
        let count = b.u32();
        Self {
            label,
            ty,
            count,
            record: b.finish(),
        }
    }
}

/// Every record layout for one pointer width, computed once per boundary context.
#[derive(Clone, Debug)]
pub struct RecordLayouts {
    pub width: PointerWidth,
    pub adapter_options: RequestAdapterOptionsLayout,
    pub buffer: BufferDescriptorLayout,
    pub shader_module: ShaderModuleDescriptorLayout,
    pub extent: Extent3dLayout,
    pub texture: TextureDescriptorLayout,
    pub texture_view: TextureViewDescriptorLayout,
    pub sampler: SamplerDescriptorLayout,
    /// Bind-group-layout and pipeline-layout descriptors share `{ label, (ptr, len) }`.
    pub labeled_list: LabeledListLayout,
    pub bind_group_layout_entry: BindGroupLayoutEntryLayout,
    pub bind_group: BindGroupDescriptorLayout,
    pub bind_group_entry: BindGroupEntryLayout,
    pub constant: ConstantEntryLayout,
    pub stage: ProgrammableStageLayout,
    pub compute_pipeline: ComputePipelineDescriptorLayout,
    pub vertex_attribute: VertexAttributeLayout,
    pub vertex_buffer: VertexBufferLayoutLayout,
    pub vertex: VertexStateLayout,
    pub primitive: PrimitiveStateLayout,
    pub stencil_face: StencilFaceStateLayout,
    pub depth_stencil: DepthStencilStateLayout,
    pub multisample: MultisampleStateLayout,
    pub blend_component: BlendComponentLayout,
    pub blend: BlendStateLayout,
    pub color_target: ColorTargetStateLayout,
    pub fragment: FragmentStateLayout,
    pub render_pipeline: RenderPipelineDescriptorLayout,
    pub timestamp_writes: PassTimestampWritesLayout,
    pub compute_pass: ComputePassDescriptorLayout,
    pub color: ColorLayout,
    pub color_attachment: RenderPassColorAttachmentLayout,
    pub depth_stencil_attachment: RenderPassDepthStencilAttachmentLayout,
    pub render_pass: RenderPassDescriptorLayout,
    pub query_set: QuerySetDescriptorLayout,
}

impl RecordLayouts {
    pub fn new(width: PointerWidth) -> Self {
        let extent = Extent3dLayout::new(width);
        let stage = ProgrammableStageLayout::new(width);
        let vertex = VertexStateLayout::new(width, &stage);
        let primitive = PrimitiveStateLayout::new(width);
        let stencil_face = StencilFaceStateLayout::new(width);
        let multisample = MultisampleStateLayout::new(width);
        let blend_component = BlendComponentLayout::new(width);
        let color = ColorLayout::new(width);
        Self {
            width,
            adapter_options: RequestAdapterOptionsLayout::new(width),
            buffer: BufferDescriptorLayout::new(width),
            shader_module: ShaderModuleDescriptorLayout::new(width),
            texture: TextureDescriptorLayout::new(width, &extent),
            extent,
            texture_view: TextureViewDescriptorLayout::new(width),
            sampler: SamplerDescriptorLayout::new(width),
            labeled_list: LabeledListLayout::new(width),
            bind_group_layout_entry: BindGroupLayoutEntryLayout::new(width),
            bind_group: BindGroupDescriptorLayout::new(width),
            bind_group_entry: BindGroupEntryLayout::new(width),
            constant: ConstantEntryLayout::new(width),
            compute_pipeline: ComputePipelineDescriptorLayout::new(width, &stage),
            vertex_attribute: VertexAttributeLayout::new(width),
            vertex_buffer: VertexBufferLayoutLayout::new(width),
            render_pipeline: RenderPipelineDescriptorLayout::new(
                width,
                &vertex,
                &primitive,
                &multisample,
            ),
            fragment: FragmentStateLayout::new(width, &stage),
            stage,
            vertex,
            primitive,
            depth_stencil: DepthStencilStateLayout::new(width, &stencil_face),
            stencil_face,
            multisample,
            blend: BlendStateLayout::new(width, &blend_component),
            blend_component,
            color_target: ColorTargetStateLayout::new(width),
            timestamp_writes: PassTimestampWritesLayout::new(width),
            compute_pass: ComputePassDescriptorLayout::new(width),
            color_attachment: RenderPassColorAttachmentLayout::new(width, &color),
            color,
            depth_stencil_attachment: RenderPassDepthStencilAttachmentLayout::new(width),
            render_pass: RenderPassDescriptorLayout::new(width),
            query_set: QuerySetDescriptorLayout::new(width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These pin the wasm32 wire format that guest bindings are written against.

    #[test]
    fn wasm32_buffer_and_texture_records() {
        let l = RecordLayouts::new(PointerWidth::W32);
        assert_eq!(
            (l.buffer.label, l.buffer.size, l.buffer.usage, l.buffer.mapped_at_creation),
            (0, 8, 16, 20)
        );
        assert_eq!(l.buffer.record.size, 24);

        assert_eq!(l.texture.size, 4);
        assert_eq!(l.texture.mip_level_count, 16);
        assert_eq!(l.texture.format, 28);
        assert_eq!(l.texture.view_formats, SliceOffsets { ptr: 36, len: 40 });
        assert_eq!(l.texture.record.size, 44);

        assert_eq!(l.texture_view.format, OptionalOffsets { value: 4, present: 8 });
        assert_eq!(l.texture_view.aspect, 20);
        assert_eq!(l.texture_view.array_layer_count.present, 44);
        assert_eq!(l.texture_view.record.size, 48);
    }

    #[test]
    fn wasm32_sampler_record() {
        let l = SamplerDescriptorLayout::new(PointerWidth::W32);
        assert_eq!(l.lod_max_clamp, 32);
        assert_eq!(l.compare, OptionalOffsets { value: 36, present: 40 });
        assert_eq!(l.max_anisotropy, 44);
        assert_eq!(l.record, FieldLayout { size: 48, align: 4 });
    }

    #[test]
    fn wasm32_binding_records_share_a_32_byte_stride() {
        let l = RecordLayouts::new(PointerWidth::W32);
        assert_eq!(l.bind_group_layout_entry.layout, 16);
        assert_eq!(l.bind_group_layout_entry.record.size, 32);
        assert_eq!(l.bind_group_entry.resource, 8);
        assert_eq!(l.bind_group_entry.arms.buffer_offset, 8);
        assert_eq!(l.bind_group_entry.arms.buffer_size, 16);
        assert_eq!(l.bind_group_entry.record.size, 32);
    }

    #[test]
    fn wasm32_pipeline_records() {
        let l = RecordLayouts::new(PointerWidth::W32);
        assert_eq!(l.constant.record.size, 16);
        assert_eq!(l.stage.record.size, 16);
        assert_eq!(l.compute_pipeline.compute, 8);
        assert_eq!(l.compute_pipeline.record.size, 24);
        assert_eq!(l.vertex_buffer.record.size, 24);
        assert_eq!(l.vertex_attribute.shader_location, 16);
        assert_eq!(l.depth_stencil.stencil_back, 28);
        assert_eq!(l.depth_stencil.record.size, 64);
        assert_eq!(
            (
                l.render_pipeline.vertex,
                l.render_pipeline.primitive,
                l.render_pipeline.depth_stencil,
                l.render_pipeline.multisample,
                l.render_pipeline.fragment,
            ),
            (8, 32, 52, 56, 68)
        );
        assert_eq!(l.render_pipeline.record.size, 72);
    }

    #[test]
    fn wasm32_render_pass_records() {
        let l = RecordLayouts::new(PointerWidth::W32);
        assert_eq!(l.color_attachment.clear_value.value, 8);
        assert_eq!(l.color_attachment.clear_value.present, 40);
        assert_eq!(l.color_attachment.load_op, 48);
        assert_eq!(l.color_attachment.record.size, 56);
        assert_eq!(l.depth_stencil_attachment.stencil_read_only, 48);
        assert_eq!(l.depth_stencil_attachment.record.size, 52);
        assert_eq!(l.render_pass.record.size, 24);
        assert_eq!(l.timestamp_writes.record.size, 20);
    }

    #[test]
    fn wasm64_widens_pointer_fields() {
        let l = RecordLayouts::new(PointerWidth::W64);
        assert_eq!(l.shader_module.code, SliceOffsets { ptr: 8, len: 16 });
        assert_eq!(l.stage.entry_point, 8);
        assert_eq!(l.stage.record.size, 32);
        assert_eq!(l.bind_group.layout, 8);
        assert_eq!(l.bind_group.entries.ptr, 16);
    }
}
