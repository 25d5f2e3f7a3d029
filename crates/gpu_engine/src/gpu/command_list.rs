//! Command list recording and replay
//!
//! A [`GpuCommandList`] is returned by
//! [`GpuManager::begin_render_pass`](super::GpuManager::begin_render_pass)
//! and records state changes and draws for one render pass instance. Nothing
//! reaches the backend until the list is submitted, at which point the
//! backend replays the commands through [`GpuCommandContext`].
//!
//! State setters only record the new value and mark it dirty. The matching
//! state commands are emitted lazily, right before the next draw, so state
//! that is set and then replaced before any draw produces no commands.
//!
//! Command lists are not reference counted. They are consumed by
//! [`GpuCommandList::submit_child`] or by submitting the render pass, and
//! discarding one simply drops the recorded commands.

use std::rc::Rc;

use bitflags::bitflags;

use super::defs::{resource_sets::NUM_RESOURCE_SETS, PrimitiveType};
use super::index_data::GpuIndexData;
use super::manager::GpuManager;
use super::pipeline::GpuPipeline;
use super::query_pool::GpuQueryPool;
use super::render_pass::{GpuRenderPass, GpuRenderPassInstance};
use super::resource::GpuResourceSet;
use super::state::{
    GpuBlendState, GpuBlendStateDesc, GpuDepthStencilState, GpuDepthStencilStateDesc, GpuRasterizerState,
    GpuRasterizerStateDesc,
};
use super::vertex_data::GpuVertexData;
use crate::foundation::math::IntRect;
use crate::{check, check_msg};

bitflags! {
    /// Pieces of command list state, used for dirty tracking, push/pop and
    /// child list inheritance
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandState: u32 {
        /// Bound pipeline
        const PIPELINE = 1 << 0;
        /// Bound resource sets
        const RESOURCE_SET = 1 << 1;
        /// Blend state
        const BLEND = 1 << 2;
        /// Depth/stencil state
        const DEPTH_STENCIL = 1 << 3;
        /// Rasterizer state
        const RASTERIZER = 1 << 4;
        /// Viewport rectangle
        const VIEWPORT = 1 << 5;
        /// Scissor test and rectangle
        const SCISSOR = 1 << 6;

        /// All state
        const ALL = Self::PIPELINE.bits()
            | Self::RESOURCE_SET.bits()
            | Self::BLEND.bits()
            | Self::DEPTH_STENCIL.bits()
            | Self::RASTERIZER.bits()
            | Self::VIEWPORT.bits()
            | Self::SCISSOR.bits();
    }
}

/// Current rendering state of a command list
#[derive(Clone)]
pub struct CommandListState {
    /// Bound pipeline
    pub pipeline: Option<Rc<GpuPipeline>>,
    /// Bound resource sets, indexed by set number
    pub resource_sets: [Option<Rc<GpuResourceSet>>; NUM_RESOURCE_SETS],
    /// Blend state
    pub blend_state: Rc<GpuBlendState>,
    /// Depth/stencil state
    pub depth_stencil_state: Rc<GpuDepthStencilState>,
    /// Rasterizer state
    pub rasterizer_state: Rc<GpuRasterizerState>,
    /// Viewport rectangle
    pub viewport: IntRect,
    /// Whether the scissor test is enabled
    pub scissor_enabled: bool,
    /// Scissor rectangle
    pub scissor: IntRect,
}

impl CommandListState {
    fn initial(manager: &GpuManager, render_area: IntRect) -> Self {
        Self {
            pipeline: None,
            resource_sets: Default::default(),
            blend_state: manager.default_blend_state(),
            depth_stencil_state: manager.default_depth_stencil_state(),
            rasterizer_state: manager.default_rasterizer_state(),
            viewport: render_area,
            scissor_enabled: false,
            scissor: IntRect::default(),
        }
    }
}

/// Recorded command
#[derive(Clone)]
pub enum GpuCommand {
    /// Bind a pipeline
    BindPipeline(Rc<GpuPipeline>),
    /// Bind a resource set to a set number
    BindResourceSet(usize, Rc<GpuResourceSet>),
    /// Set the blend state
    SetBlendState(Rc<GpuBlendState>),
    /// Set the depth/stencil state
    SetDepthStencilState(Rc<GpuDepthStencilState>),
    /// Set the rasterizer state
    SetRasterizerState(Rc<GpuRasterizerState>),
    /// Set the viewport
    SetViewport(IntRect),
    /// Set the scissor test state
    SetScissor(bool, IntRect),
    /// Draw primitives
    Draw {
        /// Primitive type
        primitive: PrimitiveType,
        /// Vertex data
        vertices: Rc<GpuVertexData>,
        /// Optional index data
        indices: Option<Rc<GpuIndexData>>,
    },
    /// End a query at this point of the pass
    EndQuery(Rc<dyn GpuQueryPool>, u32),
    /// Begin a named debug group
    BeginDebugGroup(String),
    /// End the current debug group
    EndDebugGroup,
}

/// Target of command list replay, implemented by backends
///
/// Viewport and scissor rectangles are given with a top-left origin.
pub trait GpuCommandContext {
    /// Bind a pipeline
    fn bind_pipeline(&mut self, pipeline: &Rc<GpuPipeline>);
    /// Bind a resource set to a set number
    fn bind_resource_set(&mut self, index: usize, resources: &Rc<GpuResourceSet>);
    /// Apply a blend state
    fn set_blend_state(&mut self, state: &Rc<GpuBlendState>);
    /// Apply a depth/stencil state
    fn set_depth_stencil_state(&mut self, state: &Rc<GpuDepthStencilState>);
    /// Apply a rasterizer state
    fn set_rasterizer_state(&mut self, state: &Rc<GpuRasterizerState>);
    /// Set the viewport
    fn set_viewport(&mut self, viewport: IntRect);
    /// Set the scissor test state
    fn set_scissor(&mut self, enable: bool, scissor: IntRect);
    /// Draw primitives
    fn draw(&mut self, primitive: PrimitiveType, vertices: &Rc<GpuVertexData>, indices: Option<&Rc<GpuIndexData>>);
    /// End a query
    fn end_query(&mut self, pool: &Rc<dyn GpuQueryPool>, index: u32);
    /// Begin a named debug group
    fn begin_debug_group(&mut self, _name: &str) {}
    /// End the current debug group
    fn end_debug_group(&mut self) {}
}

/// Command list for a render pass instance
pub struct GpuCommandList<'a> {
    manager: &'a GpuManager,
    instance: Rc<GpuRenderPassInstance>,
    is_child: bool,
    state: CommandListState,
    dirty_state: CommandState,
    dirty_resource_sets: u32,
    state_stack: Vec<(CommandState, CommandListState)>,
    commands: Vec<GpuCommand>,
}

impl<'a> GpuCommandList<'a> {
    /// Create a top-level command list with default state
    ///
    /// The default state is the default blend, depth/stencil and rasterizer
    /// states, a viewport covering the render area and the scissor test
    /// disabled.
    pub(crate) fn new(manager: &'a GpuManager, instance: GpuRenderPassInstance) -> Self {
        let state = CommandListState::initial(manager, instance.desc().render_area);

        Self {
            manager,
            instance: Rc::new(instance),
            is_child: false,
            state,
            dirty_state: CommandState::ALL,
            dirty_resource_sets: 0,
            state_stack: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Create a child command list
    ///
    /// The child inherits the state named by `inherit` from this list and
    /// starts with default values for everything else. Changes made to either
    /// list do not affect the other. Commands recorded into the child are
    /// spliced into this list by [`GpuCommandList::submit_child`].
    pub fn create_child(&self, inherit: CommandState) -> Self {
        let mut state = CommandListState::initial(self.manager, self.render_area());
        let mut dirty_resource_sets = 0;

        if inherit.contains(CommandState::PIPELINE) {
            state.pipeline.clone_from(&self.state.pipeline);
        }

        if inherit.contains(CommandState::RESOURCE_SET) {
            state.resource_sets.clone_from(&self.state.resource_sets);
            for (index, set) in state.resource_sets.iter().enumerate() {
                if set.is_some() {
                    dirty_resource_sets |= 1 << index;
                }
            }
        }

        if inherit.contains(CommandState::BLEND) {
            state.blend_state = Rc::clone(&self.state.blend_state);
        }

        if inherit.contains(CommandState::DEPTH_STENCIL) {
            state.depth_stencil_state = Rc::clone(&self.state.depth_stencil_state);
        }

        if inherit.contains(CommandState::RASTERIZER) {
            state.rasterizer_state = Rc::clone(&self.state.rasterizer_state);
        }

        if inherit.contains(CommandState::VIEWPORT) {
            state.viewport = self.state.viewport;
        }

        if inherit.contains(CommandState::SCISSOR) {
            state.scissor_enabled = self.state.scissor_enabled;
            state.scissor = self.state.scissor;
        }

        Self {
            manager: self.manager,
            instance: Rc::clone(&self.instance),
            is_child: true,
            state,
            dirty_state: CommandState::ALL,
            dirty_resource_sets,
            state_stack: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Append the commands of a child list to this list
    ///
    /// The child's commands run after everything recorded here so far and
    /// before anything recorded afterwards. Since the child may have changed
    /// any state, all of this list's state is re-applied before its next draw.
    pub fn submit_child(&mut self, mut child: Self) {
        check_msg!(child.is_child, "Only child command lists can be submitted into another list");
        check_msg!(
            Rc::ptr_eq(&child.instance, &self.instance),
            "Child command list belongs to a different render pass instance"
        );

        self.commands.append(&mut child.commands);

        self.dirty_state |= CommandState::ALL;
        for (index, set) in self.state.resource_sets.iter().enumerate() {
            if set.is_some() {
                self.dirty_resource_sets |= 1 << index;
            }
        }
    }

    /// Bind a pipeline for subsequent draws
    pub fn bind_pipeline(&mut self, pipeline: &Rc<GpuPipeline>) {
        let unchanged = self
            .state
            .pipeline
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, pipeline));

        if !unchanged {
            self.state.pipeline = Some(Rc::clone(pipeline));
            self.dirty_state |= CommandState::PIPELINE;
        }
    }

    /// Bind a resource set to a set number
    ///
    /// The set's bindings must not be changed for the remainder of the frame
    /// once it has been bound.
    pub fn bind_resource_set(&mut self, index: usize, resources: &Rc<GpuResourceSet>) {
        check!(index < NUM_RESOURCE_SETS);

        let unchanged = self.state.resource_sets[index]
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, resources));

        if !unchanged {
            self.state.resource_sets[index] = Some(Rc::clone(resources));
            self.dirty_resource_sets |= 1 << index;
            self.dirty_state |= CommandState::RESOURCE_SET;
        }
    }

    /// Set the blend state
    pub fn set_blend_state(&mut self, state: &Rc<GpuBlendState>) {
        if !Rc::ptr_eq(&self.state.blend_state, state) {
            self.state.blend_state = Rc::clone(state);
            self.dirty_state |= CommandState::BLEND;
        }
    }

    /// Set the blend state from a descriptor, through the manager's cache
    pub fn set_blend_state_desc(&mut self, desc: &GpuBlendStateDesc) {
        let state = self.manager.get_blend_state(desc);
        self.set_blend_state(&state);
    }

    /// Set the depth/stencil state
    pub fn set_depth_stencil_state(&mut self, state: &Rc<GpuDepthStencilState>) {
        if !Rc::ptr_eq(&self.state.depth_stencil_state, state) {
            self.state.depth_stencil_state = Rc::clone(state);
            self.dirty_state |= CommandState::DEPTH_STENCIL;
        }
    }

    /// Set the depth/stencil state from a descriptor, through the manager's cache
    pub fn set_depth_stencil_state_desc(&mut self, desc: &GpuDepthStencilStateDesc) {
        let state = self.manager.get_depth_stencil_state(desc);
        self.set_depth_stencil_state(&state);
    }

    /// Set the rasterizer state
    pub fn set_rasterizer_state(&mut self, state: &Rc<GpuRasterizerState>) {
        if !Rc::ptr_eq(&self.state.rasterizer_state, state) {
            self.state.rasterizer_state = Rc::clone(state);
            self.dirty_state |= CommandState::RASTERIZER;
        }
    }

    /// Set the rasterizer state from a descriptor, through the manager's cache
    pub fn set_rasterizer_state_desc(&mut self, desc: &GpuRasterizerStateDesc) {
        let state = self.manager.get_rasterizer_state(desc);
        self.set_rasterizer_state(&state);
    }

    /// Set the viewport, which must lie within the render area
    pub fn set_viewport(&mut self, viewport: IntRect) {
        if self.state.viewport != viewport {
            check_msg!(
                self.render_area().contains(&viewport),
                "Viewport {:?} outside render area {:?}",
                viewport,
                self.render_area()
            );

            self.state.viewport = viewport;
            self.dirty_state |= CommandState::VIEWPORT;
        }
    }

    /// Set the scissor test state
    ///
    /// When enabled, the scissor rectangle must lie within the render area.
    pub fn set_scissor(&mut self, enable: bool, scissor: IntRect) {
        if self.state.scissor_enabled != enable || self.state.scissor != scissor {
            check_msg!(
                !enable || self.render_area().contains(&scissor),
                "Scissor {:?} outside render area {:?}",
                scissor,
                self.render_area()
            );

            self.state.scissor_enabled = enable;
            self.state.scissor = scissor;
            self.dirty_state |= CommandState::SCISSOR;
        }
    }

    /// Save the parts of the current state named by `state`
    pub fn push_state(&mut self, state: CommandState) {
        self.state_stack.push((state, self.state.clone()));
    }

    /// Restore the state saved by the matching [`GpuCommandList::push_state`]
    pub fn pop_state(&mut self) {
        let Some((pushed, saved)) = self.state_stack.pop() else {
            check_msg!(false, "pop_state() without a matching push_state()");
            return;
        };

        if pushed.contains(CommandState::PIPELINE) {
            match &saved.pipeline {
                Some(pipeline) => self.bind_pipeline(pipeline),
                None => {
                    if self.state.pipeline.take().is_some() {
                        self.dirty_state |= CommandState::PIPELINE;
                    }
                }
            }
        }

        if pushed.contains(CommandState::RESOURCE_SET) {
            for (index, saved_set) in saved.resource_sets.iter().enumerate() {
                match saved_set {
                    Some(set) => self.bind_resource_set(index, set),
                    None => {
                        if self.state.resource_sets[index].take().is_some() {
                            self.dirty_resource_sets &= !(1 << index);
                        }
                    }
                }
            }
        }

        if pushed.contains(CommandState::BLEND) {
            self.set_blend_state(&saved.blend_state);
        }

        if pushed.contains(CommandState::DEPTH_STENCIL) {
            self.set_depth_stencil_state(&saved.depth_stencil_state);
        }

        if pushed.contains(CommandState::RASTERIZER) {
            self.set_rasterizer_state(&saved.rasterizer_state);
        }

        if pushed.contains(CommandState::VIEWPORT) {
            self.set_viewport(saved.viewport);
        }

        if pushed.contains(CommandState::SCISSOR) {
            self.set_scissor(saved.scissor_enabled, saved.scissor);
        }
    }

    /// Record a draw
    ///
    /// A pipeline must be bound. Any dirty state is emitted before the draw.
    pub fn draw(&mut self, primitive: PrimitiveType, vertices: &Rc<GpuVertexData>, indices: Option<&Rc<GpuIndexData>>) {
        check_msg!(self.state.pipeline.is_some(), "Draw without a bound pipeline");

        self.flush_state();

        self.commands.push(GpuCommand::Draw {
            primitive,
            vertices: Rc::clone(vertices),
            indices: indices.cloned(),
        });
    }

    /// End a query once the commands recorded so far have executed
    pub fn end_query(&mut self, pool: &Rc<dyn GpuQueryPool>, index: u32) {
        check_msg!(
            index < pool.count(),
            "Query {} outside pool bounds (total: {})",
            index,
            pool.count()
        );

        self.commands.push(GpuCommand::EndQuery(Rc::clone(pool), index));
    }

    /// Begin a named debug group
    pub fn begin_debug_group(&mut self, name: impl Into<String>) {
        self.commands.push(GpuCommand::BeginDebugGroup(name.into()));
    }

    /// End the current debug group
    pub fn end_debug_group(&mut self) {
        self.commands.push(GpuCommand::EndDebugGroup);
    }

    fn flush_state(&mut self) {
        if self.dirty_state.contains(CommandState::PIPELINE) {
            if let Some(pipeline) = &self.state.pipeline {
                self.commands.push(GpuCommand::BindPipeline(Rc::clone(pipeline)));
            }
        }

        if self.dirty_state.contains(CommandState::RESOURCE_SET) {
            for (index, set) in self.state.resource_sets.iter().enumerate() {
                if self.dirty_resource_sets & (1 << index) != 0 {
                    if let Some(set) = set {
                        self.commands.push(GpuCommand::BindResourceSet(index, Rc::clone(set)));
                        self.dirty_resource_sets &= !(1 << index);
                    }
                }
            }
        }

        if self.dirty_state.contains(CommandState::BLEND) {
            self.commands
                .push(GpuCommand::SetBlendState(Rc::clone(&self.state.blend_state)));
        }

        if self.dirty_state.contains(CommandState::DEPTH_STENCIL) {
            self.commands
                .push(GpuCommand::SetDepthStencilState(Rc::clone(&self.state.depth_stencil_state)));
        }

        if self.dirty_state.contains(CommandState::RASTERIZER) {
            self.commands
                .push(GpuCommand::SetRasterizerState(Rc::clone(&self.state.rasterizer_state)));
        }

        if self.dirty_state.contains(CommandState::VIEWPORT) {
            self.commands.push(GpuCommand::SetViewport(self.state.viewport));
        }

        if self.dirty_state.contains(CommandState::SCISSOR) {
            self.commands
                .push(GpuCommand::SetScissor(self.state.scissor_enabled, self.state.scissor));
        }

        self.dirty_state = CommandState::empty();
    }

    /// Replay the recorded commands onto a backend context
    pub fn execute(&self, context: &mut dyn GpuCommandContext) {
        for command in &self.commands {
            match command {
                GpuCommand::BindPipeline(pipeline) => context.bind_pipeline(pipeline),
                GpuCommand::BindResourceSet(index, resources) => context.bind_resource_set(*index, resources),
                GpuCommand::SetBlendState(state) => context.set_blend_state(state),
                GpuCommand::SetDepthStencilState(state) => context.set_depth_stencil_state(state),
                GpuCommand::SetRasterizerState(state) => context.set_rasterizer_state(state),
                GpuCommand::SetViewport(viewport) => context.set_viewport(*viewport),
                GpuCommand::SetScissor(enable, scissor) => context.set_scissor(*enable, *scissor),
                GpuCommand::Draw {
                    primitive,
                    vertices,
                    indices,
                } => context.draw(*primitive, vertices, indices.as_ref()),
                GpuCommand::EndQuery(pool, index) => context.end_query(pool, *index),
                GpuCommand::BeginDebugGroup(name) => context.begin_debug_group(name),
                GpuCommand::EndDebugGroup => context.end_debug_group(),
            }
        }
    }

    /// Render pass instance the list records for
    pub fn pass_instance(&self) -> &GpuRenderPassInstance {
        &self.instance
    }

    /// Render pass the list records for
    pub fn pass(&self) -> &GpuRenderPass {
        self.instance.pass()
    }

    /// Render area of the pass instance
    pub fn render_area(&self) -> IntRect {
        self.instance.desc().render_area
    }

    /// Current rendering state
    pub const fn state(&self) -> &CommandListState {
        &self.state
    }

    /// Recorded commands
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Number of recorded draws
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::Draw { .. }))
            .count()
    }

    /// Whether this is a child list
    pub const fn is_child(&self) -> bool {
        self.is_child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::query_pool::{GpuQueryPoolDesc, GpuQueryType};
    use crate::gpu::test_support::{mock_manager, mock_pipeline, mock_resource_set, mock_vertex_data};
    use crate::gpu::defs::BlendFactor;
    use crate::gpu::pixel_format::PixelFormat;
    use crate::gpu::render_pass::{
        GpuRenderAttachmentDesc, GpuRenderLoadOp, GpuRenderPassDesc, GpuRenderPassInstanceDesc,
    };

    fn window_pass_desc(manager: &GpuManager) -> GpuRenderPassInstanceDesc {
        let pass = manager.create_render_pass(GpuRenderPassDesc::default().with_colour(
            GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Clear),
        ));
        GpuRenderPassInstanceDesc::new(&pass).with_render_area(IntRect::from_size(640, 480))
    }

    fn command_names(list: &GpuCommandList<'_>) -> Vec<&'static str> {
        list.commands()
            .iter()
            .map(|command| match command {
                GpuCommand::BindPipeline(_) => "pipeline",
                GpuCommand::BindResourceSet(..) => "resources",
                GpuCommand::SetBlendState(_) => "blend",
                GpuCommand::SetDepthStencilState(_) => "depth",
                GpuCommand::SetRasterizerState(_) => "raster",
                GpuCommand::SetViewport(_) => "viewport",
                GpuCommand::SetScissor(..) => "scissor",
                GpuCommand::Draw { .. } => "draw",
                GpuCommand::EndQuery(..) => "end_query",
                GpuCommand::BeginDebugGroup(_) => "begin_group",
                GpuCommand::EndDebugGroup => "end_group",
            })
            .collect()
    }

    #[test]
    fn test_default_state() {
        let manager = mock_manager();
        let list = manager.begin_render_pass(window_pass_desc(&manager));

        assert!(list.state().pipeline.is_none());
        assert!(Rc::ptr_eq(&list.state().blend_state, &manager.default_blend_state()));
        assert!(Rc::ptr_eq(&list.state().depth_stencil_state, &manager.default_depth_stencil_state()));
        assert_eq!(list.state().viewport, IntRect::from_size(640, 480));
        assert!(!list.state().scissor_enabled);
        assert!(list.commands().is_empty());
    }

    #[test]
    fn test_first_draw_emits_all_state() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);
        let vertices = mock_vertex_data(&manager, 3);

        list.bind_pipeline(&pipeline);
        list.draw(PrimitiveType::TriangleList, &vertices, None);

        assert_eq!(
            command_names(&list),
            ["pipeline", "blend", "depth", "raster", "viewport", "scissor", "draw"]
        );
        assert_eq!(list.draw_count(), 1);
    }

    #[test]
    fn test_state_is_emitted_lazily() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);
        let vertices = mock_vertex_data(&manager, 3);

        list.bind_pipeline(&pipeline);
        list.draw(PrimitiveType::TriangleList, &vertices, None);

        // Set and then replaced before any draw: nothing is emitted.
        list.set_viewport(IntRect::new(0, 0, 32, 32));
        list.set_viewport(IntRect::from_size(640, 480));
        list.bind_pipeline(&pipeline);
        list.draw(PrimitiveType::TriangleList, &vertices, None);

        list.set_blend_state_desc(
            &GpuBlendStateDesc::default()
                .with_source_factor(BlendFactor::SourceAlpha)
                .with_dest_factor(BlendFactor::OneMinusSourceAlpha),
        );
        list.draw(PrimitiveType::TriangleList, &vertices, None);

        let names = command_names(&list);
        assert_eq!(&names[7..], ["draw", "blend", "draw"]);
    }

    #[test]
    fn test_resource_sets_emitted_per_set() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);
        let vertices = mock_vertex_data(&manager, 3);
        let view = mock_resource_set(&manager);
        let entity = mock_resource_set(&manager);

        list.bind_pipeline(&pipeline);
        list.bind_resource_set(0, &view);
        list.bind_resource_set(3, &entity);
        list.draw(PrimitiveType::TriangleList, &vertices, None);

        let bound: Vec<usize> = list
            .commands()
            .iter()
            .filter_map(|command| match command {
                GpuCommand::BindResourceSet(index, _) => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(bound, [0, 3]);

        // Rebinding the same set is a no-op.
        list.bind_resource_set(3, &entity);
        list.draw(PrimitiveType::TriangleList, &vertices, None);
        assert_eq!(command_names(&list).last(), Some(&"draw"));
        assert_eq!(command_names(&list).iter().filter(|name| **name == "resources").count(), 2);
    }

    #[test]
    fn test_push_pop_state() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let default_raster = manager.default_rasterizer_state();

        list.push_state(CommandState::RASTERIZER | CommandState::VIEWPORT);
        list.set_rasterizer_state_desc(&GpuRasterizerStateDesc::default().with_depth_clamp(true));
        list.set_viewport(IntRect::new(10, 10, 20, 20));
        assert!(!Rc::ptr_eq(&list.state().rasterizer_state, &default_raster));

        list.pop_state();
        assert!(Rc::ptr_eq(&list.state().rasterizer_state, &default_raster));
        assert_eq!(list.state().viewport, IntRect::from_size(640, 480));
    }

    #[test]
    fn test_pop_only_restores_pushed_state() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));

        list.push_state(CommandState::VIEWPORT);
        list.set_scissor(true, IntRect::new(0, 0, 8, 8));
        list.pop_state();

        assert!(list.state().scissor_enabled);
    }

    #[test]
    fn test_child_inherits_selected_state() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);

        list.bind_pipeline(&pipeline);
        list.set_viewport(IntRect::new(0, 0, 100, 100));
        list.set_depth_stencil_state_desc(&GpuDepthStencilStateDesc::default().with_depth_write(false));

        let child = list.create_child(CommandState::PIPELINE | CommandState::VIEWPORT);
        assert!(child.is_child());
        assert!(child.state().pipeline.is_some());
        assert_eq!(child.state().viewport, IntRect::new(0, 0, 100, 100));
        assert!(Rc::ptr_eq(&child.state().depth_stencil_state, &manager.default_depth_stencil_state()));

        let bare = list.create_child(CommandState::empty());
        assert!(bare.state().pipeline.is_none());
        assert_eq!(bare.state().viewport, IntRect::from_size(640, 480));
    }

    #[test]
    fn test_submit_child_splices_and_dirties_state() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);
        let vertices = mock_vertex_data(&manager, 3);

        list.bind_pipeline(&pipeline);
        list.draw(PrimitiveType::TriangleList, &vertices, None);
        let before = list.commands().len();

        let mut child = list.create_child(CommandState::ALL);
        child.begin_debug_group("child");
        child.draw(PrimitiveType::LineList, &vertices, None);
        child.end_debug_group();
        let child_len = child.commands().len();
        list.submit_child(child);

        assert_eq!(list.commands().len(), before + child_len);

        // Everything is re-applied before the next draw of the parent.
        list.draw(PrimitiveType::TriangleList, &vertices, None);
        let names = command_names(&list);
        assert_eq!(
            &names[before + child_len..],
            ["pipeline", "blend", "depth", "raster", "viewport", "scissor", "draw"]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Draw without a bound pipeline")]
    fn test_draw_without_pipeline() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let vertices = mock_vertex_data(&manager, 3);

        list.draw(PrimitiveType::TriangleList, &vertices, None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside render area")]
    fn test_viewport_outside_render_area() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));

        list.set_viewport(IntRect::new(600, 0, 100, 100));
    }

    #[test]
    fn test_execute_replays_in_order() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);
        let vertices = mock_vertex_data(&manager, 6);

        list.bind_pipeline(&pipeline);
        list.set_scissor(true, IntRect::new(4, 4, 8, 8));
        list.draw(PrimitiveType::TriangleStrip, &vertices, None);

        let mut recorder = crate::gpu::test_support::RecordingContext::default();
        list.execute(&mut recorder);

        assert_eq!(
            recorder.calls,
            [
                "bind_pipeline",
                "set_blend_state",
                "set_depth_stencil_state",
                "set_rasterizer_state",
                "set_viewport 0,0 640x480",
                "set_scissor true 4,4 8x8",
                "draw TriangleStrip 6",
            ]
        );
    }

    #[test]
    fn test_end_query_keeps_position() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pipeline = mock_pipeline(&manager);
        let vertices = mock_vertex_data(&manager, 3);
        let pool = manager.create_query_pool(GpuQueryPoolDesc::new(GpuQueryType::Timestamp, 2));

        list.end_query(&pool, 0);
        list.bind_pipeline(&pipeline);
        list.draw(PrimitiveType::TriangleList, &vertices, None);
        list.end_query(&pool, 1);

        let names = command_names(&list);
        assert_eq!(names.first(), Some(&"end_query"));
        assert_eq!(names.last(), Some(&"end_query"));

        // Nothing is ended until the list is replayed.
        let mut results = [0; 2];
        pool.get_results(0, &mut results);
        assert_eq!(results, [0, 0]);

        manager.submit_render_pass(list);
        pool.get_results(0, &mut results);
        assert_eq!(results, [1, 2]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Query 2 outside pool bounds (total: 2)")]
    fn test_end_query_out_of_range() {
        let manager = mock_manager();
        let mut list = manager.begin_render_pass(window_pass_desc(&manager));
        let pool = manager.create_query_pool(GpuQueryPoolDesc::new(GpuQueryType::Timestamp, 2));

        list.end_query(&pool, 2);
    }
}
