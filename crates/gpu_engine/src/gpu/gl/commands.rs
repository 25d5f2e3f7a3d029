//! GL render pass execution
//!
//! Submitting a render pass binds the framebuffer for its targets, clears
//! the attachments whose load operation asks for it (limited to the render
//! area) and replays the recorded commands through [`GlCommandContext`].
//!
//! The GPU layer uses a top-left origin for rectangles while GL uses a
//! bottom-left one, so viewports, scissors and blit areas are flipped against
//! the height of the render target being used.

use std::rc::Rc;

use super::buffer::GlBuffer;
use super::device::{BlitMask, Capability, FramebufferName, FramebufferTarget};
use super::program;
use super::resource::GlResourceSetLayout;
use super::state::GlState;
use super::state_objects::{GlBlendState, GlDepthStencilState, GlSampler};
use super::texture::GlTexture;
use super::vertex_data::GlVertexArray;
use super::GlContext;
use crate::foundation::logging::trace;
use crate::foundation::math::{IVec2, IntRect};
use crate::gpu::command_list::{GpuCommandContext, GpuCommandList};
use crate::gpu::defs::{CullMode, PrimitiveType};
use crate::gpu::index_data::GpuIndexData;
use crate::gpu::pipeline::GpuPipeline;
use crate::gpu::query_pool::GpuQueryPool;
use crate::gpu::render_pass::{GpuRenderLoadOp, GpuRenderTargetDesc};
use crate::gpu::resource::{GpuBoundResource, GpuResourceSet};
use crate::gpu::state::{
    GpuBlendState, GpuDepthStencilState, GpuDepthStencilStateDesc, GpuRasterizerState,
};
use crate::gpu::texture::GpuTextureImageRef;
use crate::gpu::vertex_data::GpuVertexData;
use crate::{check, check_msg, fatal};

/// Convert a top-left origin rectangle to GL's bottom-left origin
fn flip_rect(rect: IntRect, target_height: u32) -> IntRect {
    let height = i32::try_from(target_height).unwrap_or(i32::MAX);
    IntRect::new(rect.x, height - (rect.y + rect.height), rect.width, rect.height)
}

fn apply_depth_stencil_state(state: &mut GlState, native: &GlDepthStencilState) {
    state.enable(Capability::DepthTest, native.depth_enable);
    state.set_depth_write(native.depth_write);
    state.set_depth_func(native.depth_func);
}

impl GlContext {
    /// Execute a recorded render pass
    pub(super) fn submit_render_pass(&self, cmd_list: &GpuCommandList<'_>) {
        let desc = cmd_list.pass_instance().desc();
        let pass = desc.pass.desc();
        let targets = &desc.targets;

        let size = if targets.is_main_window() {
            (self.window.width, self.window.height)
        } else {
            targets.texture_size().unwrap_or((self.window.width, self.window.height))
        };

        trace!(
            "GL: Submitting render pass ({}x{}, {} commands)",
            size.0,
            size.1,
            cmd_list.commands().len()
        );

        self.render_target_size.set(size);
        self.in_render_pass.set(true);

        let framebuffer = self.framebuffer_for(targets);
        self.state
            .borrow_mut()
            .bind_framebuffer(FramebufferTarget::Both, framebuffer);

        let area = desc.render_area;
        let need_scissor = area.x != 0
            || area.y != 0
            || i64::from(area.width) < i64::from(size.0)
            || i64::from(area.height) < i64::from(size.1);

        for ((index, attachment), colour) in (0u32..).zip(&pass.colour_attachments).zip(&desc.clear_colours) {
            if attachment.load_op == GpuRenderLoadOp::Clear {
                self.configure_clear(false, area, need_scissor);
                self.device.clear_buffer_colour(index, *colour);
            }
        }

        let depth_stencil = &pass.depth_stencil_attachment;
        if depth_stencil.is_used() {
            let clear_depth = depth_stencil.load_op == GpuRenderLoadOp::Clear;
            let clear_stencil = depth_stencil.stencil_load_op == GpuRenderLoadOp::Clear;

            if clear_depth || clear_stencil {
                self.configure_clear(clear_depth, area, need_scissor);
            }

            if clear_depth && clear_stencil {
                self.device
                    .clear_buffer_depth_stencil(desc.clear_depth, desc.clear_stencil);
            } else if clear_depth {
                self.device.clear_buffer_depth(desc.clear_depth);
            } else if clear_stencil {
                self.device.clear_buffer_stencil(desc.clear_stencil);
            }
        }

        let mut context = GlCommandContext { context: self };
        cmd_list.execute(&mut context);

        self.in_render_pass.set(false);
    }

    fn framebuffer_for(&self, targets: &GpuRenderTargetDesc) -> Option<FramebufferName> {
        if targets.is_main_window() {
            return None;
        }

        let mut state = self.state.borrow_mut();
        Some(self.fbos.borrow_mut().get_or_create(targets, &mut state))
    }

    /// Set up viewport, scissor and depth state for clearing the render area
    fn configure_clear(&self, is_depth: bool, area: IntRect, need_scissor: bool) {
        let height = self.render_target_size.get().1;
        let mut state = self.state.borrow_mut();

        state.set_viewport(flip_rect(area, height));

        // Depth writes must be on to clear the depth buffer.
        if is_depth {
            apply_depth_stencil_state(&mut state, &GlDepthStencilState::new(&GpuDepthStencilStateDesc::default()));
        }

        state.enable(Capability::ScissorTest, need_scissor);
        if need_scissor {
            state.set_scissor(flip_rect(area, height));
        }
    }

    /// Copy an area between texture images, a null image being the window
    pub(super) fn blit(
        &self,
        source: &GpuTextureImageRef,
        dest: &GpuTextureImageRef,
        source_pos: IVec2,
        dest_pos: IVec2,
        size: IVec2,
    ) {
        check!(!self.in_render_pass.get());

        let is_depth = source.format().is_some_and(|format| format.is_depth());
        check_msg!(
            is_depth == dest.format().is_some_and(|format| format.is_depth()),
            "Blit between depth and colour images"
        );
        check_msg!(
            !is_depth || source.format() == dest.format(),
            "Depth blit between different formats"
        );

        let (previous_draw, previous_read) = {
            let state = self.state.borrow();
            (state.draw_framebuffer(), state.read_framebuffer())
        };

        let source_framebuffer = self.blit_framebuffer_for(source, is_depth);
        let dest_framebuffer = self.blit_framebuffer_for(dest, is_depth);

        let source_height = self.image_height(source);
        let dest_height = self.image_height(dest);
        let source_rect = flip_rect(IntRect::new(source_pos.x, source_pos.y, size.x, size.y), source_height);
        let dest_rect = flip_rect(IntRect::new(dest_pos.x, dest_pos.y, size.x, size.y), dest_height);

        let mut state = self.state.borrow_mut();
        state.bind_framebuffer(FramebufferTarget::Draw, dest_framebuffer);
        state.bind_framebuffer(FramebufferTarget::Read, source_framebuffer);

        // Blits are affected by the scissor test.
        state.enable(Capability::ScissorTest, false);

        let mask = if is_depth { BlitMask::Depth } else { BlitMask::Colour };
        self.device.blit_framebuffer(source_rect, dest_rect, mask);

        state.bind_framebuffer(FramebufferTarget::Draw, previous_draw);
        state.bind_framebuffer(FramebufferTarget::Read, previous_read);
    }

    fn blit_framebuffer_for(&self, image: &GpuTextureImageRef, is_depth: bool) -> Option<FramebufferName> {
        if image.is_null() {
            return None;
        }

        let targets = if is_depth {
            GpuRenderTargetDesc {
                colour: Vec::new(),
                depth_stencil: image.clone(),
            }
        } else {
            GpuRenderTargetDesc::with_colour(vec![image.clone()])
        };

        self.framebuffer_for(&targets)
    }

    fn image_height(&self, image: &GpuTextureImageRef) -> u32 {
        image.size().map_or(self.window.height, |(_, height)| height)
    }

    /// Present the main window
    pub(super) fn end_frame(&self) {
        // Presentation swaps whichever framebuffer is bound on some platforms.
        self.state
            .borrow_mut()
            .bind_framebuffer(FramebufferTarget::Both, None);
        self.device.swap_buffers();
    }

    fn bind_resource_set(&self, index: usize, resources: &GpuResourceSet) {
        let Some(layout) = resources.layout().native::<GlResourceSetLayout>() else {
            fatal!("GL: Resource set layout was not created by the GL backend");
        };

        for (slot_index, slot) in resources.slots().iter().enumerate() {
            let Some(object) = &slot.object else {
                continue;
            };

            let binding = layout.map_slot(index, slot_index);
            match object {
                GpuBoundResource::Buffer(buffer) => GlBuffer::from_dyn(&**buffer).bind_indexed(binding),
                GpuBoundResource::Texture(texture) => {
                    GlTexture::from_dyn(&**texture).bind(binding);

                    let sampler = slot.sampler.as_ref().and_then(|sampler| sampler.native::<GlSampler>());
                    match sampler {
                        Some(sampler) => self.state.borrow_mut().bind_sampler(binding, sampler.name()),
                        None => fatal!("GL: Texture in resource slot {} has no GL sampler", slot_index),
                    }
                }
            }
        }
    }
}

/// Replays recorded commands onto the GL state
struct GlCommandContext<'a> {
    context: &'a GlContext,
}

impl GpuCommandContext for GlCommandContext<'_> {
    fn bind_pipeline(&mut self, pipeline: &Rc<GpuPipeline>) {
        program::bind_pipeline(self.context, pipeline);
    }

    fn bind_resource_set(&mut self, index: usize, resources: &Rc<GpuResourceSet>) {
        self.context.bind_resource_set(index, resources);
    }

    fn set_blend_state(&mut self, blend: &Rc<GpuBlendState>) {
        let native = blend
            .native::<GlBlendState>()
            .copied()
            .unwrap_or_else(|| GlBlendState::new(blend.desc()));

        let mut state = self.context.state.borrow_mut();
        state.enable(Capability::Blend, native.enable);
        state.set_blend_equation(native.func);
        state.set_blend_func(native.source_factor, native.dest_factor);
    }

    fn set_depth_stencil_state(&mut self, depth_stencil: &Rc<GpuDepthStencilState>) {
        let native = depth_stencil
            .native::<GlDepthStencilState>()
            .copied()
            .unwrap_or_else(|| GlDepthStencilState::new(depth_stencil.desc()));

        apply_depth_stencil_state(&mut self.context.state.borrow_mut(), &native);
    }

    fn set_rasterizer_state(&mut self, rasterizer: &Rc<GpuRasterizerState>) {
        let desc = rasterizer.desc();
        let mut state = self.context.state.borrow_mut();

        state.enable(Capability::CullFace, desc.cull_mode != CullMode::Disabled);
        if desc.cull_mode != CullMode::Disabled {
            state.set_cull_face(desc.cull_mode);
        }

        state.enable(Capability::DepthClamp, desc.depth_clamp);
    }

    fn set_viewport(&mut self, viewport: IntRect) {
        let height = self.context.render_target_size.get().1;
        self.context
            .state
            .borrow_mut()
            .set_viewport(flip_rect(viewport, height));
    }

    fn set_scissor(&mut self, enable: bool, scissor: IntRect) {
        let height = self.context.render_target_size.get().1;
        let mut state = self.context.state.borrow_mut();

        state.enable(Capability::ScissorTest, enable);
        if enable {
            state.set_scissor(flip_rect(scissor, height));
        }
    }

    fn draw(&mut self, primitive: PrimitiveType, vertices: &Rc<GpuVertexData>, indices: Option<&Rc<GpuIndexData>>) {
        let Some(array) = vertices.native::<GlVertexArray>() else {
            fatal!("GL: Vertex data was not created by the GL backend");
        };

        array.bind(indices.map(|indices| &**indices));

        match indices {
            Some(indices) => self.context.device.draw_elements(
                primitive,
                indices.count(),
                indices.index_type(),
                indices.byte_offset(),
            ),
            None => self.context.device.draw_arrays(primitive, 0, vertices.count()),
        }
    }

    fn end_query(&mut self, pool: &Rc<dyn GpuQueryPool>, index: u32) {
        pool.end(index);
    }

    fn begin_debug_group(&mut self, name: &str) {
        self.context.device.push_debug_group(name);
    }

    fn end_debug_group(&mut self) {
        self.context.device.pop_debug_group();
    }
}
