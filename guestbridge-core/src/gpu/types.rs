//! Host-native call parameters produced by the descriptor decoders.
//!
//! Strings are copied out of guest memory; object references borrow from the registries for the
//! duration of one backend call.

use super::GpuBackend;
use crate::abi::enums::*;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestAdapterOptions {
    pub power_preference: PowerPreference,
    pub force_fallback_adapter: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: u32,
    pub mapped_at_creation: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderModuleDescriptor {
    pub label: Option<String>,
    pub code: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: u32,
    pub view_formats: Vec<TextureFormat>,
}

/// A null descriptor pointer decodes to `TextureViewDescriptor::default()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextureViewDescriptor {
    pub label: Option<String>,
    pub format: Option<TextureFormat>,
    pub dimension: Option<TextureViewDimension>,
    pub aspect: TextureAspect,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Option<CompareFunction>,
    pub max_anisotropy: u16,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BindingType {
    Buffer {
        ty: BufferBindingType,
        has_dynamic_offset: bool,
        min_binding_size: u64,
    },
    Sampler(SamplerBindingType),
    Texture {
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
        multisampled: bool,
    },
    StorageTexture {
        access: StorageTextureAccess,
        format: TextureFormat,
        view_dimension: TextureViewDimension,
    },
}

impl BindingType {
    pub fn kind(&self) -> BindingLayoutKind {
        match self {
            BindingType::Buffer { .. } => BindingLayoutKind::Buffer,
            BindingType::Sampler(_) => BindingLayoutKind::Sampler,
            BindingType::Texture { .. } => BindingLayoutKind::Texture,
            BindingType::StorageTexture { .. } => BindingLayoutKind::StorageTexture,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: u32,
    pub ty: BindingType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindGroupLayoutDescriptor {
    pub label: Option<String>,
    pub entries: Vec<BindGroupLayoutEntry>,
}

pub struct BufferBinding<'a, G: GpuBackend> {
    pub buffer: &'a G::Buffer,
    pub offset: u64,
    /// `None` binds the rest of the buffer.
    pub size: Option<u64>,
}

pub enum BindingResource<'a, G: GpuBackend> {
    Buffer(BufferBinding<'a, G>),
    Sampler(&'a G::Sampler),
    TextureView(&'a G::TextureView),
}

impl<G: GpuBackend> BindingResource<'_, G> {
    pub fn kind(&self) -> BindingResourceKind {
        match self {
            BindingResource::Buffer(_) => BindingResourceKind::Buffer,
            BindingResource::Sampler(_) => BindingResourceKind::Sampler,
            BindingResource::TextureView(_) => BindingResourceKind::TextureView,
        }
    }
}

pub struct BindGroupEntry<'a, G: GpuBackend> {
    pub binding: u32,
    pub resource: BindingResource<'a, G>,
}

pub struct BindGroupDescriptor<'a, G: GpuBackend> {
    pub label: Option<String>,
    pub layout: &'a G::BindGroupLayout,
    pub entries: Vec<BindGroupEntry<'a, G>>,
}

pub struct PipelineLayoutDescriptor<'a, G: GpuBackend> {
    pub label: Option<String>,
    pub bind_group_layouts: Vec<&'a G::BindGroupLayout>,
}

pub struct ProgrammableStage<'a, G: GpuBackend> {
    pub module: &'a G::ShaderModule,
    pub entry_point: Option<String>,
    pub constants: Vec<(String, f64)>,
}

pub struct ComputePipelineDescriptor<'a, G: GpuBackend> {
    pub label: Option<String>,
    /// `None` asks the host to derive the layout from the shader.
    pub layout: Option<&'a G::PipelineLayout>,
    pub compute: ProgrammableStage<'a, G>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u64,
    pub shader_location: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

pub struct VertexState<'a, G: GpuBackend> {
    pub stage: ProgrammableStage<'a, G>,
    pub buffers: Vec<VertexBufferLayout>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PrimitiveState {
    pub topology: PrimitiveTopology,
    pub strip_index_format: Option<IndexFormat>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
    pub stencil_front: StencilFaceState,
    pub stencil_back: StencilFaceState,
    pub stencil_read_mask: u32,
    pub stencil_write_mask: u32,
    pub depth_bias: i32,
    pub depth_bias_slope_scale: f32,
    pub depth_bias_clamp: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MultisampleState {
    pub count: u32,
    pub mask: u32,
    pub alpha_to_coverage_enabled: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BlendComponent {
    pub operation: BlendOperation,
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorTargetState {
    pub format: TextureFormat,
    pub blend: Option<BlendState>,
    pub write_mask: u32,
}

pub struct FragmentState<'a, G: GpuBackend> {
    pub stage: ProgrammableStage<'a, G>,
    pub targets: Vec<ColorTargetState>,
}

pub struct RenderPipelineDescriptor<'a, G: GpuBackend> {
    pub label: Option<String>,
    pub layout: Option<&'a G::PipelineLayout>,
    pub vertex: VertexState<'a, G>,
    pub primitive: PrimitiveState,
    pub depth_stencil: Option<DepthStencilState>,
    pub multisample: MultisampleState,
    pub fragment: Option<FragmentState<'a, G>>,
}

pub struct PassTimestampWrites<'a, G: GpuBackend> {
    pub query_set: &'a G::QuerySet,
    pub beginning_of_pass_write_index: Option<u32>,
    pub end_of_pass_write_index: Option<u32>,
}

pub struct ComputePassDescriptor<'a, G: GpuBackend> {
    pub label: Option<String>,
    pub timestamp_writes: Option<PassTimestampWrites<'a, G>>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

pub struct RenderPassColorAttachment<'a, G: GpuBackend> {
    pub view: &'a G::TextureView,
    pub resolve_target: Option<&'a G::TextureView>,
    pub clear_value: Option<Color>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

pub struct RenderPassDepthStencilAttachment<'a, G: GpuBackend> {
    pub view: &'a G::TextureView,
    pub depth_clear_value: f32,
    pub depth_load_op: Option<LoadOp>,
    pub depth_store_op: Option<StoreOp>,
    pub depth_read_only: bool,
    pub stencil_clear_value: u32,
    pub stencil_load_op: Option<LoadOp>,
    pub stencil_store_op: Option<StoreOp>,
    pub stencil_read_only: bool,
}

pub struct RenderPassDescriptor<'a, G: GpuBackend> {
    pub label: Option<String>,
    pub color_attachments: Vec<RenderPassColorAttachment<'a, G>>,
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a, G>>,
    pub occlusion_query_set: Option<&'a G::QuerySet>,
    pub timestamp_writes: Option<PassTimestampWrites<'a, G>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuerySetDescriptor {
    pub label: Option<String>,
    pub ty: QueryType,
    pub count: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SurfaceConfiguration {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
}

/// Byte range of a buffer; `size: None` means "to the end".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferSlice {
    pub offset: u64,
    pub size: Option<u64>,
}
