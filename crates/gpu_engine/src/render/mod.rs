//! Rendering helpers built on the GPU layer
//!
//! - [`RenderTargetPool`]: temporary render targets reused across frames
//! - [`UniformBuffer`]: uniform buffers with a CPU-side shadow copy
//! - Shader parameter type information

pub mod render_target_pool;
pub mod shader_parameter;
pub mod uniform_buffer;

pub use render_target_pool::{RenderTargetHandle, RenderTargetPool, UNUSED_FRAMES_BEFORE_FREE};
pub use shader_parameter::{ShaderParameterType, ShaderParameterValue};
pub use uniform_buffer::{UniformBuffer, UniformBufferBase, UniformData, UniformStruct, UniformStructMember};
