//! # GPU Engine
//!
//! A GPU resource and state abstraction layer with an explicit render pass
//! execution model.
//!
//! ## Features
//!
//! - **GPU objects**: buffers, textures, programs, pipelines, vertex/index
//!   data and resource sets created through [`gpu::GpuManager`]
//! - **State caching**: immutable blend, depth/stencil, rasterizer and
//!   sampler states deduplicated by descriptor
//! - **Render passes**: passes declared up front, instantiated against
//!   concrete targets and recorded into command lists
//! - **GL backend**: framebuffer caching, redundant state filtering and
//!   resource set slot remapping over a [`gpu::gl::GlDevice`]
//! - **Render helpers**: a temporary render target pool and CPU-shadowed
//!   uniform buffers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gpu_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new(EngineConfig::default())?;
//!     let gpu = engine.gpu();
//!
//!     let pass = gpu.create_render_pass(
//!         GpuRenderPassDesc::default()
//!             .with_colour(GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Clear)),
//!     );
//!
//!     let window = gpu.window();
//!     let cmd_list = gpu.begin_render_pass(
//!         GpuRenderPassInstanceDesc::new(&pass)
//!             .with_clear_colour(0, Colour::new(0.0, 0.0, 0.5, 1.0))
//!             .with_render_area(IntRect::from_size(window.width, window.height)),
//!     );
//!     gpu.submit_render_pass(cmd_list);
//!
//!     engine.render_frame();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;
pub mod engine;
pub mod foundation;
pub mod gpu;
pub mod render;

pub use engine::{Engine, EngineError, EngineStats, FrameListener, RenderPriority, RenderTarget};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{BackendKind, Config, ConfigError, EngineConfig, GraphicsConfig, WindowConfig},
        engine::{Engine, EngineError, EngineStats, FrameListener, RenderPriority, RenderTarget},
        foundation::math::{Colour, IVec2, IntBox, IntRect, Mat4, Vec2, Vec3, Vec4},
        gpu::{
            GpuBufferDesc, GpuBufferType, GpuBufferUsage, GpuCommandList, GpuManager, GpuRenderAttachmentDesc,
            GpuRenderLoadOp, GpuRenderPassDesc, GpuRenderPassInstanceDesc, GpuRenderTargetDesc, GpuTexture,
            GpuTextureDesc, GpuTextureImageRef, PixelFormat, PrimitiveType,
        },
        render::{RenderTargetHandle, RenderTargetPool, UniformBuffer, UniformBufferBase, UniformStruct},
    };
}
