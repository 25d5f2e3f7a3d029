//! GPU manager and backend interface
//!
//! [`GpuManager`] is the entry point to the GPU layer. It owns the active
//! [`GpuBackend`], creates every GPU object through it and caches immutable
//! state objects by descriptor. Rendering goes through
//! [`GpuManager::begin_render_pass`], which yields a [`GpuCommandList`], and
//! [`GpuManager::submit_render_pass`], which hands the recorded list to the
//! backend for execution.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use super::buffer::{GpuBuffer, GpuBufferDesc};
use super::command_list::GpuCommandList;
use super::index_data::{GpuIndexData, GpuIndexType};
use super::pipeline::{GpuPipeline, GpuPipelineDesc};
use super::pixel_format::PixelFormat;
use super::program::{GpuProgram, GpuProgramDesc};
use super::query_pool::{GpuQueryPool, GpuQueryPoolDesc};
use super::render_pass::{GpuRenderPass, GpuRenderPassDesc, GpuRenderPassInstanceDesc};
use super::resource::{GpuResourceSet, GpuResourceSetLayout, GpuResourceSetLayoutDesc};
use super::state::{
    GpuBlendState, GpuBlendStateDesc, GpuDepthStencilState, GpuDepthStencilStateDesc, GpuRasterizerState,
    GpuRasterizerStateDesc, GpuSamplerState, GpuSamplerStateDesc, GpuState,
};
use super::texture::{GpuTexture, GpuTextureDesc, GpuTextureImageRef, GpuTextureViewDesc};
use super::vertex_data::{GpuVertexData, GpuVertexDataLayout, GpuVertexDataLayoutDesc};
use crate::check_msg;
use crate::foundation::logging::{debug, info, trace};
use crate::foundation::math::IVec2;

/// Properties of the main window's framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format of the colour buffer
    pub format: PixelFormat,
}

/// Interface implemented by each GPU backend
///
/// State object creation has default implementations producing objects with
/// no native data, for backends that translate descriptors at the point of
/// use. Everything else must be provided.
pub trait GpuBackend {
    /// Main window properties
    fn window(&self) -> WindowInfo;

    /// Create a buffer
    fn create_buffer(&self, desc: GpuBufferDesc) -> Rc<dyn GpuBuffer>;

    /// Create a texture
    fn create_texture(&self, desc: GpuTextureDesc) -> Rc<dyn GpuTexture>;

    /// Create a view of a texture, the descriptor has already been validated
    fn create_texture_view(&self, desc: GpuTextureViewDesc) -> Rc<dyn GpuTexture>;

    /// Create a query pool
    fn create_query_pool(&self, desc: GpuQueryPoolDesc) -> Rc<dyn GpuQueryPool>;

    /// Create a shader program
    fn create_program(&self, desc: GpuProgramDesc) -> Rc<GpuProgram>;

    /// Create a pipeline, the descriptor has already been validated
    fn create_pipeline(&self, desc: GpuPipelineDesc) -> Rc<GpuPipeline>;

    /// Create vertex data from a layout and its buffers
    fn create_vertex_data(
        &self,
        count: usize,
        layout: Rc<GpuVertexDataLayout>,
        buffers: Vec<Rc<dyn GpuBuffer>>,
    ) -> Rc<GpuVertexData> {
        Rc::new(GpuVertexData::new(count, layout, buffers))
    }

    /// Create a blend state
    fn create_blend_state(&self, desc: GpuBlendStateDesc) -> Rc<GpuBlendState> {
        Rc::new(GpuState::new(desc))
    }

    /// Create a depth/stencil state
    fn create_depth_stencil_state(&self, desc: GpuDepthStencilStateDesc) -> Rc<GpuDepthStencilState> {
        Rc::new(GpuState::new(desc))
    }

    /// Create a rasterizer state
    fn create_rasterizer_state(&self, desc: GpuRasterizerStateDesc) -> Rc<GpuRasterizerState> {
        Rc::new(GpuState::new(desc))
    }

    /// Create a sampler state
    fn create_sampler_state(&self, desc: GpuSamplerStateDesc) -> Rc<GpuSamplerState> {
        Rc::new(GpuState::new(desc))
    }

    /// Create a vertex data layout
    fn create_vertex_data_layout(&self, desc: GpuVertexDataLayoutDesc) -> Rc<GpuVertexDataLayout> {
        Rc::new(GpuState::new(desc))
    }

    /// Create a render pass
    fn create_render_pass(&self, desc: GpuRenderPassDesc) -> Rc<GpuRenderPass> {
        Rc::new(GpuRenderPass::new(desc))
    }

    /// Create a resource set layout
    fn create_resource_set_layout(&self, desc: GpuResourceSetLayoutDesc) -> Rc<GpuResourceSetLayout> {
        Rc::new(GpuState::new(desc))
    }

    /// Create a resource set with empty slots
    fn create_resource_set(&self, layout: &Rc<GpuResourceSetLayout>) -> Rc<GpuResourceSet> {
        Rc::new(GpuResourceSet::new(Rc::clone(layout)))
    }

    /// Execute a completed render pass
    fn submit_render_pass(&self, cmd_list: &GpuCommandList<'_>);

    /// Copy an area between texture images
    ///
    /// A null image refers to the main window. Positions have a top-left
    /// origin.
    fn blit(
        &self,
        source: &GpuTextureImageRef,
        dest: &GpuTextureImageRef,
        source_pos: IVec2,
        dest_pos: IVec2,
        size: IVec2,
    );

    /// Finish the frame and present the main window
    fn end_frame(&self);

    /// Access to the concrete backend type
    fn as_any(&self) -> &dyn Any;
}

/// Counters for work submitted during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuFrameStats {
    /// Render passes submitted
    pub render_passes: u32,
    /// Draws submitted
    pub draws: u32,
    /// Blits performed
    pub blits: u32,
}

type StateCache<D, S> = RefCell<HashMap<D, Rc<S>>>;

/// Owner of the GPU backend and the state object caches
pub struct GpuManager {
    backend: Box<dyn GpuBackend>,
    validate: bool,
    blend_states: StateCache<GpuBlendStateDesc, GpuBlendState>,
    depth_stencil_states: StateCache<GpuDepthStencilStateDesc, GpuDepthStencilState>,
    rasterizer_states: StateCache<GpuRasterizerStateDesc, GpuRasterizerState>,
    sampler_states: StateCache<GpuSamplerStateDesc, GpuSamplerState>,
    vertex_data_layouts: StateCache<GpuVertexDataLayoutDesc, GpuVertexDataLayout>,
    frame_stats: Cell<GpuFrameStats>,
}

impl GpuManager {
    /// Create a manager over an initialized backend
    ///
    /// `validate` enables render pass instance validation. When disabled,
    /// malformed instances are not detected.
    pub fn new(backend: Box<dyn GpuBackend>, validate: bool) -> Self {
        let window = backend.window();
        info!(
            "GPU manager created: main window {}x{} {:?}, validation {}",
            window.width,
            window.height,
            window.format,
            if validate { "on" } else { "off" }
        );

        Self {
            backend,
            validate,
            blend_states: RefCell::default(),
            depth_stencil_states: RefCell::default(),
            rasterizer_states: RefCell::default(),
            sampler_states: RefCell::default(),
            vertex_data_layouts: RefCell::default(),
            frame_stats: Cell::default(),
        }
    }

    /// The active backend
    pub fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    /// Main window properties
    pub fn window(&self) -> WindowInfo {
        self.backend.window()
    }

    /// Whether render pass instances are validated
    pub const fn validation_enabled(&self) -> bool {
        self.validate
    }

    /// Create a buffer
    pub fn create_buffer(&self, desc: GpuBufferDesc) -> Rc<dyn GpuBuffer> {
        self.backend.create_buffer(desc)
    }

    /// Create a texture
    pub fn create_texture(&self, desc: GpuTextureDesc) -> Rc<dyn GpuTexture> {
        self.backend.create_texture(desc)
    }

    /// Create a view sharing the storage of an existing texture
    ///
    /// The view range must lie within the source texture, and the view type
    /// and format must be compatible with it.
    pub fn create_texture_view(&self, desc: GpuTextureViewDesc) -> Rc<dyn GpuTexture> {
        desc.validate();

        debug!(
            "Creating {:?} view of texture {} (mips {}+{}, layers {}+{})",
            desc.texture_type,
            desc.source.id().raw(),
            desc.base_mip,
            desc.mips,
            desc.base_layer,
            desc.layers
        );

        self.backend.create_texture_view(desc)
    }

    /// Create a query pool
    pub fn create_query_pool(&self, desc: GpuQueryPoolDesc) -> Rc<dyn GpuQueryPool> {
        check_msg!(desc.count > 0, "Query pool must contain at least one query");

        debug!("Creating {:?} query pool with {} queries", desc.query_type, desc.count);
        self.backend.create_query_pool(desc)
    }

    /// End a query outside of any render pass
    ///
    /// Queries within a render pass are ended through
    /// [`GpuCommandList::end_query`] so that they execute in order with the
    /// pass's other commands.
    pub fn end_query(&self, pool: &Rc<dyn GpuQueryPool>, index: u32) {
        trace!("Ending query {} of pool {}", index, pool.id().raw());
        pool.end(index);
    }

    /// Create vertex data
    pub fn create_vertex_data(
        &self,
        count: usize,
        layout: Rc<GpuVertexDataLayout>,
        buffers: Vec<Rc<dyn GpuBuffer>>,
    ) -> Rc<GpuVertexData> {
        self.backend.create_vertex_data(count, layout, buffers)
    }

    /// Create index data
    pub fn create_index_data(
        &self,
        buffer: Rc<dyn GpuBuffer>,
        index_type: GpuIndexType,
        count: usize,
        offset: usize,
    ) -> Rc<GpuIndexData> {
        Rc::new(GpuIndexData::new(buffer, index_type, count, offset))
    }

    /// Create a shader program
    pub fn create_program(&self, desc: GpuProgramDesc) -> Rc<GpuProgram> {
        self.backend.create_program(desc)
    }

    /// Create a pipeline
    ///
    /// Every program must be in its matching stage slot, and each resource a
    /// program uses must be declared by the pipeline's resource layouts with
    /// the same type.
    pub fn create_pipeline(&self, desc: GpuPipelineDesc) -> Rc<GpuPipeline> {
        desc.validate();
        self.backend.create_pipeline(desc)
    }

    /// Create a render pass
    pub fn create_render_pass(&self, desc: GpuRenderPassDesc) -> Rc<GpuRenderPass> {
        self.backend.create_render_pass(desc)
    }

    /// Create a resource set layout
    pub fn create_resource_set_layout(&self, desc: GpuResourceSetLayoutDesc) -> Rc<GpuResourceSetLayout> {
        self.backend.create_resource_set_layout(desc)
    }

    /// Create a resource set
    pub fn create_resource_set(&self, layout: &Rc<GpuResourceSetLayout>) -> Rc<GpuResourceSet> {
        self.backend.create_resource_set(layout)
    }

    /// Get the blend state for a descriptor, creating it on first use
    pub fn get_blend_state(&self, desc: &GpuBlendStateDesc) -> Rc<GpuBlendState> {
        get_cached(&self.blend_states, desc, |desc| self.backend.create_blend_state(desc))
    }

    /// Get the depth/stencil state for a descriptor, creating it on first use
    pub fn get_depth_stencil_state(&self, desc: &GpuDepthStencilStateDesc) -> Rc<GpuDepthStencilState> {
        get_cached(&self.depth_stencil_states, desc, |desc| {
            self.backend.create_depth_stencil_state(desc)
        })
    }

    /// Get the rasterizer state for a descriptor, creating it on first use
    pub fn get_rasterizer_state(&self, desc: &GpuRasterizerStateDesc) -> Rc<GpuRasterizerState> {
        get_cached(&self.rasterizer_states, desc, |desc| {
            self.backend.create_rasterizer_state(desc)
        })
    }

    /// Get the sampler state for a descriptor, creating it on first use
    pub fn get_sampler_state(&self, desc: &GpuSamplerStateDesc) -> Rc<GpuSamplerState> {
        get_cached(&self.sampler_states, desc, |desc| self.backend.create_sampler_state(desc))
    }

    /// Get the vertex data layout for a descriptor, creating it on first use
    pub fn get_vertex_data_layout(&self, desc: &GpuVertexDataLayoutDesc) -> Rc<GpuVertexDataLayout> {
        get_cached(&self.vertex_data_layouts, desc, |desc| {
            self.backend.create_vertex_data_layout(desc)
        })
    }

    /// Default blend state (blending disabled)
    pub fn default_blend_state(&self) -> Rc<GpuBlendState> {
        self.get_blend_state(&GpuBlendStateDesc::default())
    }

    /// Default depth/stencil state (less-or-equal test, writes enabled)
    pub fn default_depth_stencil_state(&self) -> Rc<GpuDepthStencilState> {
        self.get_depth_stencil_state(&GpuDepthStencilStateDesc::default())
    }

    /// Default rasterizer state (back face culling)
    pub fn default_rasterizer_state(&self) -> Rc<GpuRasterizerState> {
        self.get_rasterizer_state(&GpuRasterizerStateDesc::default())
    }

    /// Number of cached state objects across all caches
    pub fn cached_state_count(&self) -> usize {
        self.blend_states.borrow().len()
            + self.depth_stencil_states.borrow().len()
            + self.rasterizer_states.borrow().len()
            + self.sampler_states.borrow().len()
            + self.vertex_data_layouts.borrow().len()
    }

    /// Begin a render pass
    ///
    /// The instance is validated against its pass if validation is enabled.
    /// The returned command list records the pass's rendering and must be
    /// given back to [`GpuManager::submit_render_pass`] to execute it.
    pub fn begin_render_pass(&self, desc: GpuRenderPassInstanceDesc) -> GpuCommandList<'_> {
        let pass = Rc::clone(&desc.pass);
        let instance = pass.create_instance(desc, &self.window(), self.validate);

        GpuCommandList::new(self, instance)
    }

    /// Execute a render pass recorded by a command list
    pub fn submit_render_pass(&self, cmd_list: GpuCommandList<'_>) {
        check_msg!(!cmd_list.is_child(), "Child command lists must be submitted into their parent");

        let mut stats = self.frame_stats.get();
        stats.render_passes += 1;
        stats.draws += u32::try_from(cmd_list.draw_count()).unwrap_or(u32::MAX);
        self.frame_stats.set(stats);

        self.backend.submit_render_pass(&cmd_list);
    }

    /// Copy an area between texture images, outside of any render pass
    ///
    /// A null image refers to the main window. The area must lie within both
    /// images.
    pub fn blit(
        &self,
        source: &GpuTextureImageRef,
        dest: &GpuTextureImageRef,
        source_pos: IVec2,
        dest_pos: IVec2,
        size: IVec2,
    ) {
        check_msg!(
            self.image_contains(source, source_pos, size),
            "Blit source area outside image"
        );
        check_msg!(
            self.image_contains(dest, dest_pos, size),
            "Blit destination area outside image"
        );
        check_msg!(
            source.format() == dest.format() || source.is_null() || dest.is_null(),
            "Blit between different formats"
        );

        let mut stats = self.frame_stats.get();
        stats.blits += 1;
        self.frame_stats.set(stats);

        self.backend.blit(source, dest, source_pos, dest_pos, size);
    }

    fn image_contains(&self, image: &GpuTextureImageRef, pos: IVec2, size: IVec2) -> bool {
        let (width, height) = image.size().unwrap_or_else(|| {
            let window = self.window();
            (window.width, window.height)
        });

        pos.x >= 0
            && pos.y >= 0
            && size.x >= 0
            && size.y >= 0
            && i64::from(pos.x) + i64::from(size.x) <= i64::from(width)
            && i64::from(pos.y) + i64::from(size.y) <= i64::from(height)
    }

    /// Finish the frame, returning the frame's statistics
    pub fn end_frame(&self) -> GpuFrameStats {
        self.backend.end_frame();
        self.frame_stats.take()
    }

    /// Release all cached state objects
    ///
    /// Objects still referenced elsewhere survive until those references are
    /// dropped. Must be called before the backend is torn down.
    pub fn destroy_states(&self) {
        debug!("Destroying {} cached GPU states", self.cached_state_count());

        // Take each map out before dropping it so that no cache is borrowed
        // while state objects are being destroyed.
        drop(self.blend_states.take());
        drop(self.depth_stencil_states.take());
        drop(self.rasterizer_states.take());
        drop(self.sampler_states.take());
        drop(self.vertex_data_layouts.take());
    }
}

impl Drop for GpuManager {
    fn drop(&mut self) {
        self.destroy_states();
    }
}

fn get_cached<D, S>(cache: &StateCache<D, S>, desc: &D, create: impl FnOnce(D) -> Rc<S>) -> Rc<S>
where
    D: Clone + Eq + Hash,
{
    if let Some(state) = cache.borrow().get(desc) {
        return Rc::clone(state);
    }

    let state = create(desc.clone());
    cache.borrow_mut().insert(desc.clone(), Rc::clone(&state));
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::IntRect;
    use crate::gpu::defs::{ComparisonFunc, CullMode, SamplerFilterMode};
    use crate::gpu::query_pool::GpuQueryType;
    use crate::gpu::render_pass::{GpuRenderAttachmentDesc, GpuRenderLoadOp};
    use crate::gpu::test_support::{mock_backend, mock_manager, MockBackend, MockQueryPool};
    use crate::gpu::texture::GpuTextureType;

    #[test]
    fn test_state_cache_returns_same_object() {
        let manager = mock_manager();
        let desc = GpuDepthStencilStateDesc::default().with_depth_func(ComparisonFunc::Always);

        let a = manager.get_depth_stencil_state(&desc);
        let b = manager.get_depth_stencil_state(&desc);
        assert!(Rc::ptr_eq(&a, &b));

        let other = manager.get_depth_stencil_state(&GpuDepthStencilStateDesc::default());
        assert!(!Rc::ptr_eq(&a, &other));
    }

    #[test]
    fn test_state_cache_creates_once_per_desc() {
        let manager = mock_manager();

        for _ in 0..3 {
            manager.get_rasterizer_state(&GpuRasterizerStateDesc::default().with_cull_mode(CullMode::Disabled));
            manager.get_sampler_state(&GpuSamplerStateDesc::default().with_filter_mode(SamplerFilterMode::Bilinear));
        }

        let counters = manager
            .backend()
            .as_any()
            .downcast_ref::<MockBackend>()
            .map(MockBackend::counters)
            .unwrap_or_default();
        assert_eq!(counters.get("rasterizer_state"), Some(&1));
        assert_eq!(counters.get("sampler_state"), Some(&1));
    }

    #[test]
    fn test_default_states_are_cached() {
        let manager = mock_manager();

        assert!(Rc::ptr_eq(&manager.default_blend_state(), &manager.default_blend_state()));
        assert!(manager.default_blend_state().desc().is_passthrough());
        assert!(manager.default_depth_stencil_state().desc().depth_write);
        assert_eq!(manager.default_rasterizer_state().desc().cull_mode, CullMode::Back);
    }

    #[test]
    fn test_destroy_states_clears_caches() {
        let manager = mock_manager();
        let held = manager.default_blend_state();
        manager.default_depth_stencil_state();
        assert_eq!(manager.cached_state_count(), 2);

        manager.destroy_states();
        assert_eq!(manager.cached_state_count(), 0);

        // Outstanding references keep their object alive, but a new lookup
        // creates a fresh one.
        assert!(!Rc::ptr_eq(&held, &manager.default_blend_state()));
    }

    #[test]
    fn test_submit_counts_frame_stats() {
        let manager = mock_manager();
        let pass = manager.create_render_pass(
            GpuRenderPassDesc::default()
                .with_colour(GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Clear)),
        );

        for _ in 0..2 {
            let list = manager
                .begin_render_pass(GpuRenderPassInstanceDesc::new(&pass).with_render_area(IntRect::from_size(640, 480)));
            manager.submit_render_pass(list);
        }

        let stats = manager.end_frame();
        assert_eq!(stats.render_passes, 2);
        assert_eq!(stats.draws, 0);
        assert_eq!(manager.end_frame(), GpuFrameStats::default());
    }

    #[test]
    fn test_end_query_outside_render_pass() {
        let manager = mock_manager();
        let pool = manager.create_query_pool(GpuQueryPoolDesc::new(GpuQueryType::Timestamp, 2));

        manager.end_query(&pool, 1);
        manager.end_query(&pool, 0);

        let mut results = [0; 2];
        pool.get_results(0, &mut results);
        assert_eq!(results, [2, 1]);

        let ended = pool
            .as_any()
            .downcast_ref::<MockQueryPool>()
            .map(|pool| pool.ended.get());
        assert_eq!(ended, Some(2));
        assert_eq!(mock_backend(&manager).counters().get("query_pool"), Some(&1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Query pool must contain at least one query")]
    fn test_empty_query_pool() {
        let manager = mock_manager();
        manager.create_query_pool(GpuQueryPoolDesc::default());
    }

    #[test]
    fn test_create_texture_view() {
        let manager = mock_manager();
        let array = manager.create_texture(
            GpuTextureDesc::new_2d(16, 16, PixelFormat::R8G8B8A8)
                .with_type(GpuTextureType::Texture2DArray)
                .with_depth(4),
        );

        let view = manager.create_texture_view(GpuTextureViewDesc::from_image(&GpuTextureImageRef::new(&array, 2, 0)));
        assert_eq!(view.texture_type(), GpuTextureType::Texture2D);
        assert_eq!((view.width(), view.height()), (16, 16));
        assert_ne!(view.id(), array.id());
        assert_eq!(mock_backend(&manager).counters().get("texture_view"), Some(&1));
    }
}
