//! Common GPU definitions shared by descriptors, objects and backends

use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of colour render targets in a render pass
pub const MAX_COLOUR_RENDER_TARGETS: usize = 8;

/// Maximum number of vertex attributes in a vertex data layout
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Number of shader stages
pub const NUM_SHADER_STAGES: usize = 2;

/// Number of cube map faces
pub const NUM_CUBE_FACES: u32 = 6;

/// Standard resource set numbers
///
/// Resources are grouped into sets by update frequency. A command list has
/// one binding point per set.
pub mod resource_sets {
    /// Resources for the view the scene is being rendered from
    pub const VIEW_RESOURCES: usize = 0;
    /// Resources for the light of the current pass
    pub const LIGHT_RESOURCES: usize = 1;
    /// Resources for the current material
    pub const MATERIAL_RESOURCES: usize = 2;
    /// Resources for the entity being rendered
    pub const ENTITY_RESOURCES: usize = 3;

    /// Number of resource sets
    pub const NUM_RESOURCE_SETS: usize = 4;
}

/// Standard resource slot numbers
pub mod resource_slots {
    /// Uniform buffer slot (slot 0 for every set with uniforms)
    pub const UNIFORMS: usize = 0;
    /// Shadow map slot in the light resource set
    pub const SHADOW_MAP: usize = 1;
}

/// Unique identity of a GPU object
///
/// Used where objects are referenced by identity rather than by value, e.g.
/// in the framebuffer cache key. Identifiers are never reused within a
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identifier value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Possible primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// List of triangles, 3 vertices per triangle
    TriangleList,
    /// Triangle strip, 3 vertices for the first triangle and 1 for every other
    TriangleStrip,
    /// Triangle fan, 3 vertices for the first triangle and 1 for every other
    TriangleFan,
    /// Point list, 1 vertex each
    PointList,
    /// Line list, 2 vertices per line
    LineList,
}

/// Faces of a cube map, in layer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// Positive X direction
    PositiveX,
    /// Negative X direction
    NegativeX,
    /// Positive Y direction
    PositiveY,
    /// Negative Y direction
    NegativeY,
    /// Positive Z direction
    PositiveZ,
    /// Negative Z direction
    NegativeZ,
}

impl CubeFace {
    /// Face for a cube map layer index
    pub const fn from_layer(layer: u32) -> Option<Self> {
        match layer {
            0 => Some(Self::PositiveX),
            1 => Some(Self::NegativeX),
            2 => Some(Self::PositiveY),
            3 => Some(Self::NegativeY),
            4 => Some(Self::PositiveZ),
            5 => Some(Self::NegativeZ),
            _ => None,
        }
    }
}

/// Shader stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex = 0,
    /// Fragment shader
    Fragment = 1,
}

impl ShaderStage {
    /// Index of the stage in a pipeline's program array
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Colour blending functions
///
/// Determines how the new ("source") colour is combined with the colour
/// already in the framebuffer ("destination").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFunc {
    /// Add source and destination
    #[default]
    Add,
    /// Subtract destination from source
    Subtract,
    /// Subtract source from destination
    ReverseSubtract,
    /// Component-wise minimum
    Min,
    /// Component-wise maximum
    Max,
}

/// Colour blending factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// Multiply by 0
    Zero,
    /// Multiply by 1
    One,
    /// Multiply by the source colour
    SourceColour,
    /// Multiply by the destination colour
    DestColour,
    /// Multiply by (1 - source colour)
    OneMinusSourceColour,
    /// Multiply by (1 - destination colour)
    OneMinusDestColour,
    /// Multiply by the source alpha
    SourceAlpha,
    /// Multiply by the destination alpha
    DestAlpha,
    /// Multiply by (1 - source alpha)
    OneMinusSourceAlpha,
    /// Multiply by (1 - destination alpha)
    OneMinusDestAlpha,
}

/// Comparison function for depth/stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonFunc {
    /// Always passes (depth testing disabled)
    Always,
    /// Always fails
    Never,
    /// Pass if incoming == current
    Equal,
    /// Pass if incoming != current
    NotEqual,
    /// Pass if incoming < current
    Less,
    /// Pass if incoming <= current
    LessOrEqual,
    /// Pass if incoming > current
    Greater,
    /// Pass if incoming >= current
    GreaterOrEqual,
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Face culling disabled
    Disabled,
    /// Cull back-facing polygons
    #[default]
    Back,
    /// Cull front-facing polygons
    Front,
}

/// Handling of texture coordinates outside the (0, 1) range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerAddressMode {
    /// Clamp to (0, 1)
    #[default]
    Clamp,
    /// Tile the texture
    Wrap,
}

/// Texture filtering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerFilterMode {
    /// Nearest point
    #[default]
    Nearest,
    /// Linear interpolation within a single mip level
    Bilinear,
    /// Linear interpolation within and between mip levels
    Trilinear,
    /// Anisotropic filtering
    Anisotropic,
}
