//! GPU abstraction layer
//!
//! Backend-independent descriptions of GPU objects (buffers, textures,
//! state objects, programs, pipelines, resource sets and render passes),
//! the [`GpuManager`] that creates and caches them, and the
//! [`GpuCommandList`] used to record rendering within a render pass.
//!
//! The [`gl`] module contains the OpenGL-style backend.

pub mod buffer;
pub mod command_list;
pub mod defs;
pub mod error;
pub mod gl;
pub mod index_data;
pub mod manager;
pub mod pipeline;
pub mod pixel_format;
pub mod program;
pub mod query_pool;
pub mod render_pass;
pub mod resource;
pub mod state;
pub mod texture;
pub mod vertex_data;

#[cfg(test)]
pub(crate) mod test_support;

pub use buffer::{GpuBuffer, GpuBufferDesc, GpuBufferType, GpuBufferUsage, MapFlags};
pub use command_list::{CommandListState, CommandState, GpuCommand, GpuCommandContext, GpuCommandList};
pub use defs::{ObjectId, PrimitiveType, ShaderStage};
pub use error::GpuError;
pub use index_data::{GpuIndexData, GpuIndexType};
pub use manager::{GpuBackend, GpuFrameStats, GpuManager, WindowInfo};
pub use pipeline::{GpuPipeline, GpuPipelineDesc};
pub use pixel_format::PixelFormat;
pub use program::{GpuProgram, GpuProgramDesc, GpuProgramResource};
pub use query_pool::{GpuQueryPool, GpuQueryPoolDesc, GpuQueryType};
pub use render_pass::{
    GpuRenderAttachmentDesc, GpuRenderLoadOp, GpuRenderPass, GpuRenderPassDesc, GpuRenderPassInstance,
    GpuRenderPassInstanceDesc, GpuRenderTargetDesc,
};
pub use resource::{
    GpuBoundResource, GpuResourceSet, GpuResourceSetLayout, GpuResourceSetLayoutDesc, GpuResourceType,
};
pub use state::{
    GpuBlendState, GpuBlendStateDesc, GpuDepthStencilState, GpuDepthStencilStateDesc, GpuRasterizerState,
    GpuRasterizerStateDesc, GpuSamplerState, GpuSamplerStateDesc, GpuState,
};
pub use texture::{
    GpuTexture, GpuTextureDesc, GpuTextureImageRef, GpuTextureType, GpuTextureViewDesc, TextureFlags,
};
pub use vertex_data::{
    GpuVertexData, GpuVertexDataLayout, GpuVertexDataLayoutDesc, VertexAttribute, VertexAttributeType, VertexSemantic,
};
