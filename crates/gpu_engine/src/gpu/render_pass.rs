//! Render passes and render pass instances
//!
//! A [`GpuRenderPass`] declares the shape of some rendering up front: the
//! formats of its colour and depth/stencil attachments and what happens to
//! their contents when the pass begins. It is created once per distinct shape
//! and reused every frame.
//!
//! A [`GpuRenderPassInstanceDesc`] binds a pass to concrete render targets,
//! clear values and a render area for one execution. The instance is checked
//! against the pass when it is created (when validation is enabled), then
//! consumed by [`GpuManager::begin_render_pass`](super::GpuManager::begin_render_pass).

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::defs::MAX_COLOUR_RENDER_TARGETS;
use super::manager::WindowInfo;
use super::pixel_format::PixelFormat;
use super::texture::GpuTextureImageRef;
use crate::fatal;
use crate::foundation::math::{Colour, IntRect};

/// Behaviour for the initial content of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuRenderLoadOp {
    /// Preserve the existing content
    Load,
    /// Clear to the value given by the pass instance
    Clear,
    /// Content is undefined
    #[default]
    DontCare,
}

/// Descriptor for a single render pass attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuRenderAttachmentDesc {
    /// Pixel format, `Unknown` marks the attachment as unused
    pub format: PixelFormat,
    /// Load operation for the colour or depth content
    pub load_op: GpuRenderLoadOp,
    /// Load operation for the stencil content
    pub stencil_load_op: GpuRenderLoadOp,
}

impl GpuRenderAttachmentDesc {
    /// Attachment with the given format and load operation
    pub const fn new(format: PixelFormat, load_op: GpuRenderLoadOp) -> Self {
        Self {
            format,
            load_op,
            stencil_load_op: GpuRenderLoadOp::DontCare,
        }
    }

    /// Set the stencil load operation
    pub const fn with_stencil_load_op(mut self, op: GpuRenderLoadOp) -> Self {
        self.stencil_load_op = op;
        self
    }

    /// Whether the attachment is used
    pub fn is_used(&self) -> bool {
        self.format != PixelFormat::Unknown
    }
}

/// Descriptor for a render pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GpuRenderPassDesc {
    /// Colour attachments, one per render target
    pub colour_attachments: Vec<GpuRenderAttachmentDesc>,
    /// Depth/stencil attachment, unused if its format is `Unknown`
    pub depth_stencil_attachment: GpuRenderAttachmentDesc,
}

impl GpuRenderPassDesc {
    /// Add a colour attachment
    pub fn with_colour(mut self, attachment: GpuRenderAttachmentDesc) -> Self {
        self.colour_attachments.push(attachment);
        self
    }

    /// Set the depth/stencil attachment
    pub fn with_depth_stencil(mut self, attachment: GpuRenderAttachmentDesc) -> Self {
        self.depth_stencil_attachment = attachment;
        self
    }
}

/// Render pass object
///
/// Construction aborts if the descriptor is malformed: no attachments at
/// all, more than [`MAX_COLOUR_RENDER_TARGETS`] colour attachments, an unused
/// or non-colour colour attachment, or a non-depth depth attachment.
pub struct GpuRenderPass {
    desc: GpuRenderPassDesc,
    native: Option<Box<dyn Any>>,
}

impl GpuRenderPass {
    /// Create a render pass, validating the descriptor
    pub fn new(desc: GpuRenderPassDesc) -> Self {
        if desc.colour_attachments.len() > MAX_COLOUR_RENDER_TARGETS {
            fatal!(
                "Render pass has {} colour attachments (maximum {})",
                desc.colour_attachments.len(),
                MAX_COLOUR_RENDER_TARGETS
            );
        }

        if desc.colour_attachments.is_empty() && !desc.depth_stencil_attachment.is_used() {
            fatal!("Render pass has no attachments");
        }

        for (index, attachment) in desc.colour_attachments.iter().enumerate() {
            // Backends assume colour attachments are densely packed.
            if !attachment.is_used() {
                fatal!("Render pass colour attachment {} is unused", index);
            }

            if !attachment.format.is_colour() {
                fatal!(
                    "Render pass colour attachment {} has non-colour format {:?}",
                    index,
                    attachment.format
                );
            }
        }

        if desc.depth_stencil_attachment.is_used() && !desc.depth_stencil_attachment.format.is_depth() {
            fatal!(
                "Render pass depth/stencil attachment has non-depth format {:?}",
                desc.depth_stencil_attachment.format
            );
        }

        Self { desc, native: None }
    }

    /// Attach backend-specific data
    pub fn with_native<T: Any>(mut self, native: T) -> Self {
        self.native = Some(Box::new(native));
        self
    }

    /// Descriptor of the pass
    pub const fn desc(&self) -> &GpuRenderPassDesc {
        &self.desc
    }

    /// Backend-specific data, if present and of type `T`
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_ref()?.downcast_ref::<T>()
    }

    /// Create an instance of this pass
    ///
    /// With `validate` set, the targets, clear values and render area are
    /// checked against the pass and any mismatch aborts. Without it nothing
    /// is checked and a malformed instance has undefined results.
    pub fn create_instance(
        &self,
        desc: GpuRenderPassInstanceDesc,
        window: &WindowInfo,
        validate: bool,
    ) -> GpuRenderPassInstance {
        if !std::ptr::eq(self, Rc::as_ptr(&desc.pass)) {
            fatal!("Render pass instance created from a different pass");
        }

        if validate {
            self.validate_instance(&desc, window);
        }

        GpuRenderPassInstance { desc }
    }

    fn validate_instance(&self, instance: &GpuRenderPassInstanceDesc, window: &WindowInfo) {
        let targets = &instance.targets;
        let mut size: Option<(u32, u32)> = None;

        if targets.is_main_window() {
            require(self.desc.colour_attachments.len() == 1, "main window pass must have 1 colour attachment");
            require(
                self.desc.colour_attachments[0].format == window.format,
                "colour attachment format does not match the main window",
            );
            require(
                !self.desc.depth_stencil_attachment.is_used(),
                "main window pass cannot have a depth/stencil attachment",
            );
            require(targets.colour[0].mip == 0, "main window target must use mip 0");
            require(targets.colour[0].layer == 0, "main window target must use layer 0");

            size = Some((window.width, window.height));
        } else {
            require(
                targets.colour.len() == self.desc.colour_attachments.len(),
                "colour target count does not match the pass",
            );

            for (target, attachment) in targets.colour.iter().zip(&self.desc.colour_attachments) {
                require(target.is_some(), "missing colour target");
                require(
                    target.format() == Some(attachment.format),
                    "colour target format does not match the pass",
                );

                let target_size = target.size();
                match size {
                    None => size = target_size,
                    Some(_) => require(target_size == size, "colour targets differ in size"),
                }
            }

            if self.desc.depth_stencil_attachment.is_used() {
                let depth = &targets.depth_stencil;
                require(depth.is_some(), "missing depth/stencil target");
                require(
                    depth.format() == Some(self.desc.depth_stencil_attachment.format),
                    "depth/stencil target format does not match the pass",
                );

                match size {
                    None => size = depth.size(),
                    Some(_) => require(depth.size() == size, "depth/stencil target differs in size from colour targets"),
                }
            } else {
                require(targets.depth_stencil.is_null(), "depth/stencil target given for a pass without one");
            }
        }

        require(
            instance.clear_colours.len() == self.desc.colour_attachments.len(),
            "clear colour count does not match the pass",
        );

        let (width, height) = size.unwrap_or((0, 0));
        let area = &instance.render_area;
        require(area.x >= 0 && area.width >= 0, "render area has a negative x or width");
        require(area.y >= 0 && area.height >= 0, "render area has a negative y or height");
        require(
            i64::from(area.right()) <= i64::from(width) && i64::from(area.bottom()) <= i64::from(height),
            "render area exceeds the target size",
        );
    }
}

impl fmt::Debug for GpuRenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuRenderPass").field("desc", &self.desc).finish()
    }
}

fn require(condition: bool, what: &str) {
    if !condition {
        fatal!("Invalid render pass instance: {}", what);
    }
}

/// Set of render targets, one image per attachment
///
/// A single null colour target and no depth/stencil target denotes the main
/// window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GpuRenderTargetDesc {
    /// Colour targets
    pub colour: Vec<GpuTextureImageRef>,
    /// Depth/stencil target
    pub depth_stencil: GpuTextureImageRef,
}

impl GpuRenderTargetDesc {
    /// Target descriptor for the main window
    pub fn main_window() -> Self {
        Self {
            colour: vec![GpuTextureImageRef::null()],
            depth_stencil: GpuTextureImageRef::null(),
        }
    }

    /// Target descriptor with the given colour images and no depth/stencil
    pub fn with_colour(colour: Vec<GpuTextureImageRef>) -> Self {
        Self {
            colour,
            depth_stencil: GpuTextureImageRef::null(),
        }
    }

    /// Whether this refers to the main window
    pub fn is_main_window(&self) -> bool {
        self.colour.len() == 1 && self.colour[0].is_null() && self.depth_stencil.is_null()
    }

    /// Size of the targets, from the first colour target or else the depth target
    pub fn texture_size(&self) -> Option<(u32, u32)> {
        self.colour
            .first()
            .and_then(GpuTextureImageRef::size)
            .or_else(|| self.depth_stencil.size())
    }

    /// Whether any target image belongs to the texture with the given identity
    pub fn references(&self, texture: super::defs::ObjectId) -> bool {
        self.depth_stencil.texture_id() == Some(texture)
            || self.colour.iter().any(|target| target.texture_id() == Some(texture))
    }
}

/// Descriptor for a render pass instance
#[derive(Clone)]
pub struct GpuRenderPassInstanceDesc {
    /// Pass being instantiated
    pub pass: Rc<GpuRenderPass>,
    /// Render targets
    pub targets: GpuRenderTargetDesc,
    /// Clear colour per colour attachment
    pub clear_colours: Vec<Colour>,
    /// Depth clear value
    pub clear_depth: f32,
    /// Stencil clear value
    pub clear_stencil: u32,
    /// Area affected by the pass, with a top-left origin
    pub render_area: IntRect,
}

impl GpuRenderPassInstanceDesc {
    /// Instance with null targets and zeroed clear values
    ///
    /// The colour target list has one entry per colour attachment, so a
    /// pass with a single colour attachment targets the main window by
    /// default.
    pub fn new(pass: &Rc<GpuRenderPass>) -> Self {
        let colour_count = pass.desc().colour_attachments.len();

        Self {
            pass: Rc::clone(pass),
            targets: GpuRenderTargetDesc {
                colour: vec![GpuTextureImageRef::null(); colour_count],
                depth_stencil: GpuTextureImageRef::null(),
            },
            clear_colours: vec![Colour::zeros(); colour_count],
            clear_depth: 1.0,
            clear_stencil: 0,
            render_area: IntRect::default(),
        }
    }

    /// Set the render targets
    pub fn with_targets(mut self, targets: GpuRenderTargetDesc) -> Self {
        self.targets = targets;
        self
    }

    /// Set the clear colour of a colour attachment
    pub fn with_clear_colour(mut self, index: usize, colour: Colour) -> Self {
        self.clear_colours[index] = colour;
        self
    }

    /// Set the depth and stencil clear values
    pub fn with_clear_depth_stencil(mut self, depth: f32, stencil: u32) -> Self {
        self.clear_depth = depth;
        self.clear_stencil = stencil;
        self
    }

    /// Set the render area
    pub fn with_render_area(mut self, area: IntRect) -> Self {
        self.render_area = area;
        self
    }
}

impl fmt::Debug for GpuRenderPassInstanceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuRenderPassInstanceDesc")
            .field("pass", self.pass.desc())
            .field("targets", &self.targets)
            .field("clear_colours", &self.clear_colours)
            .field("clear_depth", &self.clear_depth)
            .field("clear_stencil", &self.clear_stencil)
            .field("render_area", &self.render_area)
            .finish()
    }
}

/// A render pass bound to targets for a single execution
#[derive(Debug)]
pub struct GpuRenderPassInstance {
    desc: GpuRenderPassInstanceDesc,
}

impl GpuRenderPassInstance {
    /// Descriptor of the instance
    pub const fn desc(&self) -> &GpuRenderPassInstanceDesc {
        &self.desc
    }

    /// Pass this is an instance of
    pub fn pass(&self) -> &GpuRenderPass {
        &self.desc.pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::test_support::{main_window, mock_texture};
    use crate::gpu::texture::GpuTextureDesc;

    fn colour_pass(format: PixelFormat) -> Rc<GpuRenderPass> {
        Rc::new(GpuRenderPass::new(
            GpuRenderPassDesc::default().with_colour(GpuRenderAttachmentDesc::new(format, GpuRenderLoadOp::Clear)),
        ))
    }

    fn target(width: u32, height: u32, format: PixelFormat) -> GpuTextureImageRef {
        GpuTextureImageRef::from_texture(&mock_texture(GpuTextureDesc::new_2d(width, height, format)))
    }

    #[test]
    fn test_attachment_used() {
        assert!(!GpuRenderAttachmentDesc::default().is_used());
        assert!(GpuRenderAttachmentDesc::new(PixelFormat::R8, GpuRenderLoadOp::Load).is_used());
    }

    #[test]
    #[should_panic(expected = "Render pass has no attachments")]
    fn test_pass_without_attachments() {
        let _ = GpuRenderPass::new(GpuRenderPassDesc::default());
    }

    #[test]
    #[should_panic(expected = "non-colour format")]
    fn test_pass_with_depth_colour_attachment() {
        let _ = colour_pass(PixelFormat::Depth32);
    }

    #[test]
    #[should_panic(expected = "non-depth format")]
    fn test_pass_with_colour_depth_attachment() {
        let _ = GpuRenderPass::new(GpuRenderPassDesc::default().with_depth_stencil(
            GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Clear),
        ));
    }

    #[test]
    #[should_panic(expected = "colour attachments (maximum 8)")]
    fn test_pass_with_too_many_attachments() {
        let mut desc = GpuRenderPassDesc::default();
        for _ in 0..=MAX_COLOUR_RENDER_TARGETS {
            desc = desc.with_colour(GpuRenderAttachmentDesc::new(PixelFormat::R8G8B8A8, GpuRenderLoadOp::Load));
        }

        let _ = GpuRenderPass::new(desc);
    }

    #[test]
    fn test_depth_only_pass() {
        let pass = Rc::new(GpuRenderPass::new(GpuRenderPassDesc::default().with_depth_stencil(
            GpuRenderAttachmentDesc::new(PixelFormat::Depth32, GpuRenderLoadOp::Clear),
        )));
        let depth = target(128, 128, PixelFormat::Depth32);

        let desc = GpuRenderPassInstanceDesc::new(&pass)
            .with_targets(GpuRenderTargetDesc {
                colour: Vec::new(),
                depth_stencil: depth,
            })
            .with_render_area(IntRect::from_size(128, 128));

        let instance = pass.create_instance(desc, &main_window(), true);
        assert_eq!(instance.desc().targets.texture_size(), Some((128, 128)));
    }

    #[test]
    fn test_main_window_instance() {
        let pass = colour_pass(PixelFormat::R8G8B8A8);
        let desc = GpuRenderPassInstanceDesc::new(&pass).with_render_area(IntRect::from_size(640, 480));

        assert!(desc.targets.is_main_window());
        let instance = pass.create_instance(desc, &main_window(), true);
        assert_eq!(instance.desc().render_area.width, 640);
    }

    #[test]
    #[should_panic(expected = "colour target count does not match the pass")]
    fn test_instance_with_no_colour_targets() {
        let pass = colour_pass(PixelFormat::R8G8B8A8);
        let desc = GpuRenderPassInstanceDesc::new(&pass).with_targets(GpuRenderTargetDesc::default());

        let _ = pass.create_instance(desc, &main_window(), true);
    }

    #[test]
    #[should_panic(expected = "colour target count does not match the pass")]
    fn test_instance_with_two_colour_targets() {
        let pass = colour_pass(PixelFormat::R8G8B8A8);
        let targets = GpuRenderTargetDesc::with_colour(vec![
            target(32, 32, PixelFormat::R8G8B8A8),
            target(32, 32, PixelFormat::R8G8B8A8),
        ]);
        let desc = GpuRenderPassInstanceDesc::new(&pass)
            .with_targets(targets)
            .with_render_area(IntRect::from_size(32, 32));

        let _ = pass.create_instance(desc, &main_window(), true);
    }

    #[test]
    #[should_panic(expected = "colour target format does not match the pass")]
    fn test_instance_with_wrong_format() {
        let pass = colour_pass(PixelFormat::R8G8B8A8);
        let targets = GpuRenderTargetDesc::with_colour(vec![target(32, 32, PixelFormat::FloatR16G16B16A16)]);
        let desc = GpuRenderPassInstanceDesc::new(&pass)
            .with_targets(targets)
            .with_render_area(IntRect::from_size(32, 32));

        let _ = pass.create_instance(desc, &main_window(), true);
    }

    #[test]
    #[should_panic(expected = "render area exceeds the target size")]
    fn test_instance_with_oversized_area() {
        let pass = colour_pass(PixelFormat::R8G8B8A8);
        let targets = GpuRenderTargetDesc::with_colour(vec![target(32, 32, PixelFormat::R8G8B8A8)]);
        let desc = GpuRenderPassInstanceDesc::new(&pass)
            .with_targets(targets)
            .with_render_area(IntRect::new(16, 0, 32, 32));

        let _ = pass.create_instance(desc, &main_window(), true);
    }

    #[test]
    fn test_unvalidated_instance_accepts_mismatch() {
        let pass = colour_pass(PixelFormat::R8G8B8A8);
        let desc = GpuRenderPassInstanceDesc::new(&pass).with_targets(GpuRenderTargetDesc::default());

        let instance = pass.create_instance(desc, &main_window(), false);
        assert!(instance.desc().targets.colour.is_empty());
    }

    #[test]
    fn test_render_target_desc_equality() {
        let texture = mock_texture(GpuTextureDesc::new_2d(16, 16, PixelFormat::R8G8B8A8));
        let a = GpuRenderTargetDesc::with_colour(vec![GpuTextureImageRef::new(&texture, 0, 0)]);
        let b = GpuRenderTargetDesc::with_colour(vec![GpuTextureImageRef::new(&texture, 0, 0)]);
        let c = GpuRenderTargetDesc::with_colour(vec![GpuTextureImageRef::new(&texture, 0, 1)]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.references(texture.id()));
        assert!(!GpuRenderTargetDesc::main_window().references(texture.id()));
    }
}
