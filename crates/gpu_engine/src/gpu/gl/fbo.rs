//! Framebuffer object cache
//!
//! Off-screen render targets are rendered through framebuffer objects built
//! from the target images. Building one is expensive, so they are cached by
//! the identity of the images they attach. The key holds texture identities
//! rather than texture references: a cached framebuffer must not keep its
//! textures alive. A texture being destroyed removes every framebuffer that
//! refers to it through [`FboCache::invalidate`].

use std::collections::HashMap;
use std::rc::Rc;

use super::device::{
    Attachment, FramebufferName, FramebufferStatus, FramebufferTarget, GlDevice, TextureImageTarget, TextureTarget,
};
use super::state::GlState;
use super::texture::GlTexture;
use crate::foundation::logging::debug;
use crate::gpu::defs::{ObjectId, NUM_CUBE_FACES};
use crate::gpu::render_pass::GpuRenderTargetDesc;
use crate::gpu::texture::{GpuTexture, GpuTextureImageRef};
use crate::{check_msg, fatal};

/// Identity of one attached image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FboImage {
    texture: ObjectId,
    layer: u32,
    mip: u32,
}

impl FboImage {
    fn new(image: &GpuTextureImageRef) -> Option<Self> {
        image.texture_id().map(|texture| Self {
            texture,
            layer: image.layer,
            mip: image.mip,
        })
    }
}

/// Cache key derived from a render target descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FboKey {
    colour: Vec<Option<FboImage>>,
    depth_stencil: Option<FboImage>,
}

impl FboKey {
    /// Key for a set of render targets
    pub fn new(targets: &GpuRenderTargetDesc) -> Self {
        Self {
            colour: targets.colour.iter().map(FboImage::new).collect(),
            depth_stencil: FboImage::new(&targets.depth_stencil),
        }
    }

    /// Whether any attached image belongs to a texture
    pub fn references(&self, texture: ObjectId) -> bool {
        self.depth_stencil.is_some_and(|image| image.texture == texture)
            || self
                .colour
                .iter()
                .flatten()
                .any(|image| image.texture == texture)
    }
}

/// Cache of framebuffer objects by render target
#[derive(Default)]
pub struct FboCache {
    entries: HashMap<FboKey, FramebufferName>,
}

impl FboCache {
    /// Number of cached framebuffers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no framebuffers are cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the framebuffer for a set of render targets, creating it if needed
    ///
    /// The targets must not denote the main window.
    pub fn get_or_create(&mut self, targets: &GpuRenderTargetDesc, state: &mut GlState) -> FramebufferName {
        let key = FboKey::new(targets);
        if let Some(&framebuffer) = self.entries.get(&key) {
            return framebuffer;
        }

        let framebuffer = create_framebuffer(targets, state);
        self.entries.insert(key, framebuffer);
        framebuffer
    }

    /// Delete every framebuffer that refers to a texture
    ///
    /// Must be called before the texture's storage is deleted. A removed
    /// framebuffer that is currently bound is unbound first.
    pub fn invalidate(&mut self, texture: ObjectId, state: &mut GlState) {
        let removed: Vec<FramebufferName> = self
            .entries
            .iter()
            .filter(|(key, _)| key.references(texture))
            .map(|(_, &framebuffer)| framebuffer)
            .collect();

        if removed.is_empty() {
            return;
        }

        self.entries.retain(|key, _| !key.references(texture));

        for framebuffer in removed {
            let bound = state.draw_framebuffer() == Some(framebuffer) || state.read_framebuffer() == Some(framebuffer);
            if bound {
                state.bind_framebuffer(FramebufferTarget::Both, None);
            }

            state.device().delete_framebuffer(framebuffer);
            debug!("Invalidated FBO {:?} for texture {}", framebuffer, texture.raw());
        }
    }

    /// Delete every cached framebuffer
    pub fn clear(&mut self, state: &mut GlState) {
        if self.entries.is_empty() {
            return;
        }

        state.bind_framebuffer(FramebufferTarget::Both, None);
        for (_, framebuffer) in self.entries.drain() {
            state.device().delete_framebuffer(framebuffer);
        }
    }
}

fn native_texture(image: &GpuTextureImageRef) -> Option<&GlTexture> {
    image.texture.as_ref().map(|texture| GlTexture::from_dyn(&**texture))
}

/// Attach one image of a texture, choosing the attachment call by texture type
fn attach(device: &dyn GlDevice, attachment: Attachment, texture: &GlTexture, image: &GpuTextureImageRef) {
    match texture.target() {
        TextureTarget::Texture2D => {
            device.framebuffer_texture_2d(attachment, TextureImageTarget::Texture2D, texture.name(), image.mip);
        }
        TextureTarget::CubeMap => {
            check_msg!(image.layer < NUM_CUBE_FACES, "GL: Cube face {} out of range", image.layer);
            device.framebuffer_texture_2d(
                attachment,
                TextureImageTarget::CubeMapFace(image.layer),
                texture.name(),
                image.mip,
            );
        }
        TextureTarget::Texture2DArray | TextureTarget::Texture3D => {
            device.framebuffer_texture_layer(attachment, texture.name(), image.mip, image.layer);
        }
    }
}

fn create_framebuffer(targets: &GpuRenderTargetDesc, state: &mut GlState) -> FramebufferName {
    let device = Rc::clone(state.device());

    let framebuffer = device.gen_framebuffer();
    state.bind_framebuffer(FramebufferTarget::Both, Some(framebuffer));

    let mut colour_count = 0;
    for (index, image) in (0u32..).zip(&targets.colour) {
        let Some(texture) = native_texture(image) else {
            continue;
        };

        attach(device.as_ref(), Attachment::Colour(index), texture, image);
        colour_count = index + 1;
    }

    device.read_buffer((colour_count > 0).then_some(0));
    device.draw_buffers(colour_count);

    if let Some(texture) = native_texture(&targets.depth_stencil) {
        let attachment = if texture.desc().format.is_depth_stencil() {
            Attachment::DepthStencil
        } else {
            Attachment::Depth
        };

        attach(device.as_ref(), attachment, texture, &targets.depth_stencil);
    }

    let status = device.check_framebuffer_status();
    if status != FramebufferStatus::Complete {
        fatal!("GL: Framebuffer incomplete ({:?}) for targets {:?}", status, targets);
    }

    debug!(
        "Created FBO {:?} ({} colour targets, depth/stencil: {})",
        framebuffer,
        colour_count,
        targets.depth_stencil.is_some()
    );

    framebuffer
}
