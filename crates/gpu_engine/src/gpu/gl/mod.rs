//! OpenGL-style GPU backend
//!
//! The backend drives a [`GlDevice`], an interface following the GL 4.5 core
//! binding model. Redundant state changes are filtered by a state cache
//! before they reach the device, off-screen render targets are rendered
//! through cached framebuffer objects, and resource sets are flattened onto
//! GL's per-type binding point ranges.
//!
//! [`SoftDevice`] is an in-memory device used by the tests and the headless
//! render test.

pub mod device;
pub mod soft;

mod buffer;
mod commands;
mod fbo;
mod program;
mod query_pool;
mod resource;
mod state;
mod state_objects;
mod texture;
mod vertex_data;


use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use buffer::GlBuffer;
pub use device::GlDevice;
pub use query_pool::GlQueryPool;
pub use resource::GlResourceSetLayout;
pub use soft::{SoftDevice, SoftDrawCall, SoftImage};
pub use texture::GlTexture;

use fbo::FboCache;
use state::GlState;
use state_objects::{GlBlendState, GlDepthStencilState, GlSampler};
use vertex_data::GlVertexArray;

use super::buffer::{GpuBuffer, GpuBufferDesc};
use super::command_list::GpuCommandList;
use super::defs::ObjectId;
use super::manager::{GpuBackend, WindowInfo};
use super::pipeline::{GpuPipeline, GpuPipelineDesc};
use super::program::{GpuProgram, GpuProgramDesc};
use super::query_pool::{GpuQueryPool, GpuQueryPoolDesc};
use super::resource::{GpuResourceSetLayout, GpuResourceSetLayoutDesc};
use super::state::{
    GpuBlendState, GpuBlendStateDesc, GpuDepthStencilState, GpuDepthStencilStateDesc, GpuSamplerState,
    GpuSamplerStateDesc, GpuState,
};
use super::texture::{GpuTexture, GpuTextureDesc, GpuTextureImageRef, GpuTextureViewDesc};
use super::vertex_data::{GpuVertexData, GpuVertexDataLayout};
use crate::foundation::logging::{debug, info};
use crate::foundation::math::IVec2;

/// State shared by the backend and every object it creates
pub(crate) struct GlContext {
    device: Rc<dyn GlDevice>,
    state: RefCell<GlState>,
    fbos: RefCell<FboCache>,
    window: WindowInfo,
    render_target_size: Cell<(u32, u32)>,
    in_render_pass: Cell<bool>,
}

impl GlContext {
    /// Delete cached framebuffers which attach a texture
    fn invalidate_fbos(&self, texture: ObjectId) {
        let mut state = self.state.borrow_mut();
        self.fbos.borrow_mut().invalidate(texture, &mut state);
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        self.fbos.borrow_mut().clear(&mut state);
    }
}

/// GPU backend over a [`GlDevice`]
pub struct GlBackend {
    context: Rc<GlContext>,
}

impl GlBackend {
    /// Create the backend for a device whose default framebuffer is the main window
    pub fn new(device: Rc<dyn GlDevice>, window: WindowInfo) -> Self {
        let state = GlState::new(Rc::clone(&device));

        info!(
            "GL: Backend initialized ({}x{} {:?}, {} texture units)",
            window.width,
            window.height,
            window.format,
            state.texture_unit_count()
        );

        let context = GlContext {
            device,
            state: RefCell::new(state),
            fbos: RefCell::default(),
            window,
            render_target_size: Cell::new((window.width, window.height)),
            in_render_pass: Cell::new(false),
        };

        Self {
            context: Rc::new(context),
        }
    }

    /// Device the backend drives
    pub fn device(&self) -> &Rc<dyn GlDevice> {
        &self.context.device
    }

    /// Number of cached framebuffer objects
    pub fn fbo_count(&self) -> usize {
        self.context.fbos.borrow().len()
    }
}

impl GpuBackend for GlBackend {
    fn window(&self) -> WindowInfo {
        self.context.window
    }

    fn create_buffer(&self, desc: GpuBufferDesc) -> Rc<dyn GpuBuffer> {
        Rc::new(GlBuffer::new(&self.context, desc))
    }

    fn create_texture(&self, desc: GpuTextureDesc) -> Rc<dyn GpuTexture> {
        debug!(
            "GL: Creating {:?} texture {}x{}x{} {:?}",
            desc.texture_type, desc.width, desc.height, desc.depth, desc.format
        );

        Rc::new(GlTexture::new(&self.context, desc))
    }

    fn create_texture_view(&self, desc: GpuTextureViewDesc) -> Rc<dyn GpuTexture> {
        Rc::new(GlTexture::new_view(&self.context, &desc))
    }

    fn create_query_pool(&self, desc: GpuQueryPoolDesc) -> Rc<dyn GpuQueryPool> {
        Rc::new(GlQueryPool::new(&self.context, desc))
    }

    fn create_program(&self, desc: GpuProgramDesc) -> Rc<GpuProgram> {
        Rc::new(program::create_program(&self.context, desc))
    }

    fn create_pipeline(&self, desc: GpuPipelineDesc) -> Rc<GpuPipeline> {
        Rc::new(program::create_pipeline(&self.context, desc))
    }

    fn create_vertex_data(
        &self,
        count: usize,
        layout: Rc<GpuVertexDataLayout>,
        buffers: Vec<Rc<dyn GpuBuffer>>,
    ) -> Rc<GpuVertexData> {
        let data = GpuVertexData::new(count, layout, buffers);
        let array = GlVertexArray::new(&self.context, &data);

        Rc::new(data.with_native(array))
    }

    fn create_blend_state(&self, desc: GpuBlendStateDesc) -> Rc<GpuBlendState> {
        let native = GlBlendState::new(&desc);
        Rc::new(GpuState::with_native(desc, native))
    }

    fn create_depth_stencil_state(&self, desc: GpuDepthStencilStateDesc) -> Rc<GpuDepthStencilState> {
        let native = GlDepthStencilState::new(&desc);
        Rc::new(GpuState::with_native(desc, native))
    }

    fn create_sampler_state(&self, desc: GpuSamplerStateDesc) -> Rc<GpuSamplerState> {
        let native = GlSampler::new(&self.context, &desc);
        Rc::new(GpuState::with_native(desc, native))
    }

    fn create_resource_set_layout(&self, desc: GpuResourceSetLayoutDesc) -> Rc<GpuResourceSetLayout> {
        let native = GlResourceSetLayout::new(&desc);
        Rc::new(GpuState::with_native(desc, native))
    }

    fn submit_render_pass(&self, cmd_list: &GpuCommandList<'_>) {
        self.context.submit_render_pass(cmd_list);
    }

    fn blit(
        &self,
        source: &GpuTextureImageRef,
        dest: &GpuTextureImageRef,
        source_pos: IVec2,
        dest_pos: IVec2,
        size: IVec2,
    ) {
        self.context.blit(source, dest, source_pos, dest_pos, size);
    }

    fn end_frame(&self) {
        self.context.end_frame();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
