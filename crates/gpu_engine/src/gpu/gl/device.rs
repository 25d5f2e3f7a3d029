//! Native device interface for the GL backend
//!
//! [`GlDevice`] is the set of native entry points the GL backend drives. It
//! follows the GL binding model: most calls act on whatever object is bound
//! to the relevant target (the draw framebuffer, the texture bound to the
//! active unit, the buffer bound to a buffer target), which is why the
//! backend routes every binding change through its state cache.
//!
//! Object names are `slotmap` keys rather than raw integers, so a stale name
//! can never alias a newer object. `None` in a binding call means "unbind",
//! and for framebuffers refers to the default (window) framebuffer.

use crate::foundation::math::{Colour, IntBox, IntRect};
use crate::gpu::buffer::GpuBufferUsage;
use crate::gpu::defs::{
    BlendFactor, BlendFunc, ComparisonFunc, CullMode, PrimitiveType, SamplerAddressMode, SamplerFilterMode,
    ShaderStage,
};
use crate::gpu::index_data::GpuIndexType;
use crate::gpu::pixel_format::PixelFormat;
use crate::gpu::texture::GpuTextureType;
use crate::gpu::vertex_data::VertexAttributeType;

slotmap::new_key_type! {
    /// Native texture name
    pub struct TextureName;
    /// Native buffer name
    pub struct BufferName;
    /// Native framebuffer name
    pub struct FramebufferName;
    /// Native program name
    pub struct ProgramName;
    /// Native program pipeline name
    pub struct PipelineName;
    /// Native vertex array name
    pub struct VertexArrayName;
    /// Native sampler name
    pub struct SamplerName;
    /// Native query object name
    pub struct QueryName;
}

/// Framebuffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// Both draw and read bindings
    Both,
    /// Draw binding only
    Draw,
    /// Read binding only
    Read,
}

/// Buffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data
    Array,
    /// Index data
    ElementArray,
    /// Uniform block data
    Uniform,
}

impl BufferTarget {
    /// Number of buffer targets
    pub const COUNT: usize = 3;

    /// Index of the target, for per-target tables
    pub const fn index(self) -> usize {
        match self {
            Self::Array => 0,
            Self::ElementArray => 1,
            Self::Uniform => 2,
        }
    }
}

/// Texture binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// 2D texture
    Texture2D,
    /// 2D array texture
    Texture2DArray,
    /// Cube map
    CubeMap,
    /// 3D texture
    Texture3D,
}

impl From<GpuTextureType> for TextureTarget {
    fn from(texture_type: GpuTextureType) -> Self {
        match texture_type {
            GpuTextureType::Texture2D => Self::Texture2D,
            GpuTextureType::Texture2DArray => Self::Texture2DArray,
            GpuTextureType::TextureCube => Self::CubeMap,
            GpuTextureType::Texture3D => Self::Texture3D,
        }
    }
}

/// Image target for attaching a single 2D image of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureImageTarget {
    /// A 2D texture
    Texture2D,
    /// One face of a cube map, in `CubeFace` order
    CubeMapFace(u32),
}

/// Server-side capability toggled with enable/disable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Colour blending
    Blend,
    /// Depth testing
    DepthTest,
    /// Face culling
    CullFace,
    /// Depth clamping
    DepthClamp,
    /// Scissor testing
    ScissorTest,
    /// sRGB conversion on framebuffer writes
    FramebufferSrgb,
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Colour attachment with index
    Colour(u32),
    /// Depth only attachment
    Depth,
    /// Combined depth/stencil attachment
    DepthStencil,
}

/// Buffers affected by a framebuffer blit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitMask {
    /// Colour buffer
    Colour,
    /// Depth buffer
    Depth,
}

/// Result of a framebuffer completeness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    /// Framebuffer can be rendered to
    Complete,
    /// No images are attached
    MissingAttachment,
    /// An attached image has an unsuitable format
    IncompleteAttachment,
    /// Attached images differ in size
    IncompleteDimensions,
}

/// Storage description for a new texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureStorage {
    /// Binding target
    pub target: TextureTarget,
    /// Pixel format
    pub format: PixelFormat,
    /// Width of the top level
    pub width: u32,
    /// Height of the top level
    pub height: u32,
    /// Array layers or 3D depth, 1 otherwise
    pub depth: u32,
    /// Number of mip levels
    pub mips: u32,
}

/// Range of an existing texture's storage exposed by a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureViewRange {
    /// Binding target of the view
    pub target: TextureTarget,
    /// Format the storage is interpreted as
    pub format: PixelFormat,
    /// First mip level of the source
    pub base_mip: u32,
    /// Number of mip levels
    pub mips: u32,
    /// First layer of the source
    pub base_layer: u32,
    /// Number of layers
    pub layers: u32,
}

/// Sampler object parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerParams {
    /// Wrap modes for S, T and R
    pub wrap: [SamplerAddressMode; 3],
    /// Filtering mode
    pub filter: SamplerFilterMode,
    /// Maximum anisotropy, clamped to the device limit
    pub max_anisotropy: u32,
    /// Depth comparison function, if comparison is enabled
    pub compare: Option<ComparisonFunc>,
}

/// Layout of one vertex attribute within a bound array buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribPointer {
    /// Attribute location
    pub location: u32,
    /// Number of components
    pub components: usize,
    /// Component type
    pub attribute_type: VertexAttributeType,
    /// Whether integer data is normalised
    pub normalised: bool,
    /// Stride between vertices in bytes
    pub stride: usize,
    /// Offset of the first component in bytes
    pub offset: usize,
}

/// Native entry points used by the GL backend
pub trait GlDevice {
    /// Maximum number of texture units
    fn max_texture_units(&self) -> u32;

    /// Maximum supported sampler anisotropy
    fn max_anisotropy(&self) -> u32;

    // Capabilities and fixed-function state.

    /// Enable or disable a capability
    fn set_capability(&self, capability: Capability, enable: bool);
    /// Set the viewport, bottom-left origin
    fn viewport(&self, rect: IntRect);
    /// Set the scissor rectangle, bottom-left origin
    fn scissor(&self, rect: IntRect);
    /// Set the blend equation
    fn blend_equation(&self, func: BlendFunc);
    /// Set the blend factors
    fn blend_func(&self, source: BlendFactor, dest: BlendFactor);
    /// Enable or disable depth writes
    fn depth_mask(&self, write: bool);
    /// Set the depth comparison function
    fn depth_func(&self, func: ComparisonFunc);
    /// Select which faces are culled
    fn cull_face(&self, mode: CullMode);

    // Framebuffers.

    /// Create a framebuffer
    fn gen_framebuffer(&self) -> FramebufferName;
    /// Delete a framebuffer
    fn delete_framebuffer(&self, framebuffer: FramebufferName);
    /// Bind a framebuffer, `None` for the default framebuffer
    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferName>);
    /// Attach a 2D texture or a cube map face to the bound draw framebuffer
    fn framebuffer_texture_2d(&self, attachment: Attachment, image: TextureImageTarget, texture: TextureName, mip: u32);
    /// Attach one layer of an array texture or slice of a 3D texture to the
    /// bound draw framebuffer
    fn framebuffer_texture_layer(&self, attachment: Attachment, texture: TextureName, mip: u32, layer: u32);
    /// Set the number of colour attachments drawn to
    fn draw_buffers(&self, count: u32);
    /// Set the colour attachment read from
    fn read_buffer(&self, attachment: Option<u32>);
    /// Check the bound draw framebuffer for completeness
    fn check_framebuffer_status(&self) -> FramebufferStatus;
    /// Clear a colour attachment of the bound draw framebuffer
    fn clear_buffer_colour(&self, index: u32, colour: Colour);
    /// Clear the depth attachment of the bound draw framebuffer
    fn clear_buffer_depth(&self, depth: f32);
    /// Clear the stencil attachment of the bound draw framebuffer
    fn clear_buffer_stencil(&self, stencil: u32);
    /// Clear depth and stencil of the bound draw framebuffer
    fn clear_buffer_depth_stencil(&self, depth: f32, stencil: u32);
    /// Copy a rectangle from the read framebuffer to the draw framebuffer
    fn blit_framebuffer(&self, source: IntRect, dest: IntRect, mask: BlitMask);

    // Textures and samplers.

    /// Create a texture with immutable storage
    fn gen_texture(&self, storage: &TextureStorage) -> TextureName;
    /// Create a texture sharing part of another texture's storage
    fn gen_texture_view(&self, source: TextureName, range: &TextureViewRange) -> TextureName;
    /// Delete a texture
    ///
    /// Storage shared with texture views lives until the last of them is
    /// deleted.
    fn delete_texture(&self, texture: TextureName);
    /// Select the active texture unit
    fn active_texture(&self, unit: u32);
    /// Bind a texture to the active unit
    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureName>);
    /// Replace an area of the texture bound to the active unit
    fn tex_sub_image(&self, target: TextureTarget, mip: u32, layer: u32, area: &IntBox, data: &[u8]);
    /// Generate mip levels for the texture bound to the active unit
    fn generate_mipmap(&self, target: TextureTarget);
    /// Create a sampler object
    fn gen_sampler(&self, params: &SamplerParams) -> SamplerName;
    /// Delete a sampler object
    fn delete_sampler(&self, sampler: SamplerName);
    /// Bind a sampler to a texture unit
    fn bind_sampler(&self, unit: u32, sampler: Option<SamplerName>);

    // Buffers.

    /// Create a buffer
    fn gen_buffer(&self) -> BufferName;
    /// Delete a buffer
    fn delete_buffer(&self, buffer: BufferName);
    /// Bind a buffer to a generic target
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferName>);
    /// Bind a buffer to an indexed binding point, also binding the generic target
    fn bind_buffer_base(&self, target: BufferTarget, index: u32, buffer: BufferName);
    /// Reallocate the storage of the bound buffer, optionally with content
    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, usage: GpuBufferUsage);
    /// Replace part of the bound buffer's content
    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]);

    // Programs and pipelines.

    /// Create a separable program for a stage from its binary
    ///
    /// On failure the error holds the compiler's log.
    fn create_program(&self, stage: ShaderStage, name: &str, code: &[u32]) -> Result<ProgramName, String>;
    /// Delete a program
    fn delete_program(&self, program: ProgramName);
    /// Assign a binding point to a named uniform block
    fn uniform_block_binding(&self, program: ProgramName, block: &str, binding: u32);
    /// Assign a texture unit to a named sampler uniform
    fn uniform_sampler_binding(&self, program: ProgramName, sampler: &str, unit: u32);
    /// Create a program pipeline
    fn gen_program_pipeline(&self) -> PipelineName;
    /// Delete a program pipeline
    fn delete_program_pipeline(&self, pipeline: PipelineName);
    /// Use a program for one stage of a pipeline
    fn use_program_stage(&self, pipeline: PipelineName, stage: ShaderStage, program: ProgramName);
    /// Bind a program pipeline
    fn bind_program_pipeline(&self, pipeline: Option<PipelineName>);

    // Vertex arrays and drawing.

    /// Create a vertex array
    fn gen_vertex_array(&self) -> VertexArrayName;
    /// Delete a vertex array
    fn delete_vertex_array(&self, array: VertexArrayName);
    /// Bind a vertex array
    fn bind_vertex_array(&self, array: VertexArrayName);
    /// Describe an attribute sourced from the bound array buffer
    fn vertex_attrib_pointer(&self, pointer: &VertexAttribPointer);
    /// Draw non-indexed primitives
    fn draw_arrays(&self, primitive: PrimitiveType, first: usize, count: usize);
    /// Draw indexed primitives from the bound element array buffer
    fn draw_elements(&self, primitive: PrimitiveType, count: usize, index_type: GpuIndexType, offset: usize);

    // Queries.

    /// Create query objects
    fn gen_queries(&self, count: u32) -> Vec<QueryName>;
    /// Delete query objects
    fn delete_queries(&self, queries: &[QueryName]);
    /// Record the GPU time in nanoseconds into a query once previous commands complete
    fn query_counter(&self, query: QueryName);
    /// Result of a query, waiting for it to become available
    fn query_result(&self, query: QueryName) -> u64;

    // Debugging and presentation.

    /// Begin a named debug group
    fn push_debug_group(&self, name: &str);
    /// End the current debug group
    fn pop_debug_group(&self);
    /// Present the default framebuffer
    fn swap_buffers(&self);
}
