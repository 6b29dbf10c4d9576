//! Ordinal tables for every enum that crosses the boundary.
//!
//! The guest passes small integers; the host works with typed enums that also know their
//! WebGPU token (`"rgba8unorm"`, `"less-equal"`, ...). Each table has a default used when an
//! ordinal is unknown, so a stale guest binding degrades instead of failing. Fields where a
//! wrong guess would silently change behavior (union tags, load/store ops, index formats) use
//! the strict [`try_from_ordinal`](TextureFormat::try_from_ordinal) lookup instead.

use crate::error::BridgeError;

macro_rules! ordinal_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($what:literal), default $default:ident {
            $($variant:ident = $ordinal:literal => $token:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const DEFAULT: Self = Self::$default;

            pub fn from_ordinal(ordinal: u32) -> Option<Self> {
                match ordinal {
                    $($ordinal => Some(Self::$variant),)+
                    _ => Option::None,
                }
            }

            /// Lenient lookup: unknown ordinals fall back to the table default.
            pub fn from_ordinal_or_default(ordinal: u32) -> Self {
                Self::from_ordinal(ordinal).unwrap_or_else(|| {
                    log::warn!(
                        "unknown {} ordinal {ordinal}, using {}",
                        $what,
                        Self::DEFAULT.token()
                    );
                    Self::DEFAULT
                })
            }

            /// Strict lookup for fields that must not be guessed.
            pub fn try_from_ordinal(ordinal: u32) -> Result<Self, BridgeError> {
                Self::from_ordinal(ordinal).ok_or(BridgeError::UnsupportedValue {
                    what: $what,
                    value: u64::from(ordinal),
                })
            }

            pub fn ordinal(self) -> u32 {
                match self {
                    $(Self::$variant => $ordinal,)+
                }
            }

            pub fn token(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::DEFAULT
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.token())
            }
        }
    };
}

ordinal_enum! {
    PowerPreference ("power preference"), default Default {
        Default = 0 => "default",
        LowPower = 1 => "low-power",
        HighPerformance = 2 => "high-performance",
    }
}

ordinal_enum! {
    TextureDimension ("texture dimension"), default D2 {
        D1 = 0 => "1d",
        D2 = 1 => "2d",
        D3 = 2 => "3d",
    }
}

ordinal_enum! {
    TextureViewDimension ("texture view dimension"), default D2 {
        D1 = 0 => "1d",
        D2 = 1 => "2d",
        D3 = 2 => "3d",
        D2Array = 3 => "2d-array",
        Cube = 4 => "cube",
        CubeArray = 5 => "cube-array",
    }
}

ordinal_enum! {
    TextureFormat ("texture format"), default Rgba8Unorm {
        R8Unorm = 0 => "r8unorm",
        R8Snorm = 1 => "r8snorm",
        R8Uint = 2 => "r8uint",
        R8Sint = 3 => "r8sint",
        R16Uint = 4 => "r16uint",
        R16Sint = 5 => "r16sint",
        R16Float = 6 => "r16float",
        Rg8Unorm = 7 => "rg8unorm",
        Rg8Snorm = 8 => "rg8snorm",
        Rg8Uint = 9 => "rg8uint",
        Rg8Sint = 10 => "rg8sint",
        R32Uint = 11 => "r32uint",
        R32Sint = 12 => "r32sint",
        R32Float = 13 => "r32float",
        Rg16Uint = 14 => "rg16uint",
        Rg16Sint = 15 => "rg16sint",
        Rg16Float = 16 => "rg16float",
        Rgba8Unorm = 17 => "rgba8unorm",
        Rgba8UnormSrgb = 18 => "rgba8unorm-srgb",
        Rgba8Snorm = 19 => "rgba8snorm",
        Rgba8Uint = 20 => "rgba8uint",
        Rgba8Sint = 21 => "rgba8sint",
        Bgra8Unorm = 22 => "bgra8unorm",
        Bgra8UnormSrgb = 23 => "bgra8unorm-srgb",
        Rgb9e5Ufloat = 24 => "rgb9e5ufloat",
        Rgb10a2Unorm = 25 => "rgb10a2unorm",
        Rg11b10Ufloat = 26 => "rg11b10ufloat",
        Rg32Uint = 27 => "rg32uint",
        Rg32Sint = 28 => "rg32sint",
        Rg32Float = 29 => "rg32float",
        Rgba16Uint = 30 => "rgba16uint",
        Rgba16Sint = 31 => "rgba16sint",
        Rgba16Float = 32 => "rgba16float",
        Rgba32Uint = 33 => "rgba32uint",
        Rgba32Sint = 34 => "rgba32sint",
        Rgba32Float = 35 => "rgba32float",
        Stencil8 = 36 => "stencil8",
        Depth16Unorm = 37 => "depth16unorm",
        Depth24Plus = 38 => "depth24plus",
        Depth24PlusStencil8 = 39 => "depth24plus-stencil8",
        Depth32Float = 40 => "depth32float",
        Depth32FloatStencil8 = 41 => "depth32float-stencil8",
    }
}

ordinal_enum! {
    TextureAspect ("texture aspect"), default All {
        All = 0 => "all",
        StencilOnly = 1 => "stencil-only",
        DepthOnly = 2 => "depth-only",
    }
}

ordinal_enum! {
    AddressMode ("address mode"), default ClampToEdge {
        ClampToEdge = 0 => "clamp-to-edge",
        Repeat = 1 => "repeat",
        MirrorRepeat = 2 => "mirror-repeat",
    }
}

ordinal_enum! {
    FilterMode ("filter mode"), default Nearest {
        Nearest = 0 => "nearest",
        Linear = 1 => "linear",
    }
}

ordinal_enum! {
    CompareFunction ("compare function"), default Always {
        Never = 0 => "never",
        Less = 1 => "less",
        Equal = 2 => "equal",
        LessEqual = 3 => "less-equal",
        Greater = 4 => "greater",
        NotEqual = 5 => "not-equal",
        GreaterEqual = 6 => "greater-equal",
        Always = 7 => "always",
    }
}

ordinal_enum! {
    BufferBindingType ("buffer binding type"), default Uniform {
        Uniform = 0 => "uniform",
        Storage = 1 => "storage",
        ReadOnlyStorage = 2 => "read-only-storage",
    }
}

ordinal_enum! {
    SamplerBindingType ("sampler binding type"), default Filtering {
        Filtering = 0 => "filtering",
        NonFiltering = 1 => "non-filtering",
        Comparison = 2 => "comparison",
    }
}

ordinal_enum! {
    TextureSampleType ("texture sample type"), default Float {
        Float = 0 => "float",
        UnfilterableFloat = 1 => "unfilterable-float",
        Depth = 2 => "depth",
        Sint = 3 => "sint",
        Uint = 4 => "uint",
    }
}

ordinal_enum! {
    StorageTextureAccess ("storage texture access"), default WriteOnly {
        WriteOnly = 0 => "write-only",
        ReadOnly = 1 => "read-only",
        ReadWrite = 2 => "read-write",
    }
}

ordinal_enum! {
    VertexStepMode ("vertex step mode"), default Vertex {
        Vertex = 0 => "vertex",
        Instance = 1 => "instance",
    }
}

ordinal_enum! {
    VertexFormat ("vertex format"), default Float32x4 {
        Uint8x2 = 0 => "uint8x2",
        Uint8x4 = 1 => "uint8x4",
        Sint8x2 = 2 => "sint8x2",
        Sint8x4 = 3 => "sint8x4",
        Unorm8x2 = 4 => "unorm8x2",
        Unorm8x4 = 5 => "unorm8x4",
        Snorm8x2 = 6 => "snorm8x2",
        Snorm8x4 = 7 => "snorm8x4",
        Uint16x2 = 8 => "uint16x2",
        Uint16x4 = 9 => "uint16x4",
        Sint16x2 = 10 => "sint16x2",
        Sint16x4 = 11 => "sint16x4",
        Unorm16x2 = 12 => "unorm16x2",
        Unorm16x4 = 13 => "unorm16x4",
        Snorm16x2 = 14 => "snorm16x2",
        Snorm16x4 = 15 => "snorm16x4",
        Float16x2 = 16 => "float16x2",
        Float16x4 = 17 => "float16x4",
        Float32 = 18 => "float32",
        Float32x2 = 19 => "float32x2",
        Float32x3 = 20 => "float32x3",
        Float32x4 = 21 => "float32x4",
        Uint32 = 22 => "uint32",
        Uint32x2 = 23 => "uint32x2",
        Uint32x3 = 24 => "uint32x3",
        Uint32x4 = 25 => "uint32x4",
        Sint32 = 26 => "sint32",
        Sint32x2 = 27 => "sint32x2",
        Sint32x3 = 28 => "sint32x3",
        Sint32x4 = 29 => "sint32x4",
    }
}

ordinal_enum! {
    PrimitiveTopology ("primitive topology"), default TriangleList {
        PointList = 0 => "point-list",
        LineList = 1 => "line-list",
        LineStrip = 2 => "line-strip",
        TriangleList = 3 => "triangle-list",
        TriangleStrip = 4 => "triangle-strip",
    }
}

ordinal_enum! {
    IndexFormat ("index format"), default Uint16 {
        Uint16 = 0 => "uint16",
        Uint32 = 1 => "uint32",
    }
}

ordinal_enum! {
    FrontFace ("front face"), default Ccw {
        Ccw = 0 => "ccw",
        Cw = 1 => "cw",
    }
}

ordinal_enum! {
    CullMode ("cull mode"), default None {
        None = 0 => "none",
        Front = 1 => "front",
        Back = 2 => "back",
    }
}

ordinal_enum! {
    StencilOperation ("stencil operation"), default Keep {
        Keep = 0 => "keep",
        Zero = 1 => "zero",
        Replace = 2 => "replace",
        Invert = 3 => "invert",
        IncrementClamp = 4 => "increment-clamp",
        DecrementClamp = 5 => "decrement-clamp",
        IncrementWrap = 6 => "increment-wrap",
        DecrementWrap = 7 => "decrement-wrap",
    }
}

ordinal_enum! {
    BlendOperation ("blend operation"), default Add {
        Add = 0 => "add",
        Subtract = 1 => "subtract",
        ReverseSubtract = 2 => "reverse-subtract",
        Min = 3 => "min",
        Max = 4 => "max",
    }
}

ordinal_enum! {
    BlendFactor ("blend factor"), default One {
        Zero = 0 => "zero",
        One = 1 => "one",
        Src = 2 => "src",
        OneMinusSrc = 3 => "one-minus-src",
        SrcAlpha = 4 => "src-alpha",
        OneMinusSrcAlpha = 5 => "one-minus-src-alpha",
        Dst = 6 => "dst",
        OneMinusDst = 7 => "one-minus-dst",
        DstAlpha = 8 => "dst-alpha",
        OneMinusDstAlpha = 9 => "one-minus-dst-alpha",
        SrcAlphaSaturated = 10 => "src-alpha-saturated",
        Constant = 11 => "constant",
        OneMinusConstant = 12 => "one-minus-constant",
    }
}

ordinal_enum! {
    LoadOp ("load op"), default Load {
        Load = 0 => "load",
        Clear = 1 => "clear",
    }
}

ordinal_enum! {
    StoreOp ("store op"), default Store {
        Store = 0 => "store",
        Discard = 1 => "discard",
    }
}

ordinal_enum! {
    QueryType ("query type"), default Occlusion {
        Occlusion = 0 => "occlusion",
        Timestamp = 1 => "timestamp",
    }
}

ordinal_enum! {
    /// Tag of a bind-group-layout entry.
    BindingLayoutKind ("binding layout kind"), default Buffer {
        Buffer = 0 => "buffer",
        Sampler = 1 => "sampler",
        Texture = 2 => "texture",
        StorageTexture = 3 => "storage-texture",
    }
}

ordinal_enum! {
    /// Tag of a bind-group entry's resource.
    BindingResourceKind ("binding resource kind"), default Buffer {
        Buffer = 0 => "buffer",
        Sampler = 1 => "sampler",
        TextureView = 2 => "texture-view",
    }
}

impl BindingLayoutKind {
    /// The resource kind a bind group must supply for a slot declared with this layout.
    pub fn resource_kind(self) -> BindingResourceKind {
        match self {
            BindingLayoutKind::Buffer => BindingResourceKind::Buffer,
            BindingLayoutKind::Sampler => BindingResourceKind::Sampler,
            BindingLayoutKind::Texture | BindingLayoutKind::StorageTexture => {
                BindingResourceKind::TextureView
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ordinals_fall_back_to_defaults() {
        assert_eq!(
            TextureFormat::from_ordinal_or_default(999),
            TextureFormat::Rgba8Unorm
        );
        assert_eq!(
            TextureDimension::from_ordinal_or_default(7),
            TextureDimension::D2
        );
        assert_eq!(CompareFunction::default().token(), "always");
    }

    #[test]
    fn strict_lookup_rejects_unknown_tags() {
        let err = IndexFormat::try_from_ordinal(2).unwrap_err();
        assert_eq!(err.to_string(), "unsupported index format value 2");
        assert_eq!(LoadOp::try_from_ordinal(1).unwrap(), LoadOp::Clear);
    }

    #[test]
    fn ordinals_round_trip_through_tokens() {
        assert_eq!(TextureFormat::Depth24PlusStencil8.ordinal(), 39);
        assert_eq!(TextureFormat::from_ordinal(22).map(|f| f.token()), Some("bgra8unorm"));
        assert_eq!(BlendFactor::OneMinusConstant.ordinal(), 12);
        assert_eq!(VertexFormat::from_ordinal(20), Some(VertexFormat::Float32x3));
        assert_eq!(StencilOperation::DecrementWrap.to_string(), "decrement-wrap");
    }

    #[test]
    fn texture_layouts_expect_texture_views() {
        assert_eq!(
            BindingLayoutKind::StorageTexture.resource_kind(),
            BindingResourceKind::TextureView
        );
        assert_eq!(
            BindingLayoutKind::Sampler.resource_kind(),
            BindingResourceKind::Sampler
        );
    }
}
