//! GL texture implementation

use std::any::Any;
use std::rc::Rc;

use super::device::{TextureName, TextureStorage, TextureTarget, TextureViewRange};
use super::GlContext;
use crate::fatal;
use crate::foundation::math::IntBox;
use crate::gpu::defs::ObjectId;
use crate::gpu::texture::{GpuTexture, GpuTextureDesc, GpuTextureType, GpuTextureViewDesc};

/// Texture backed by a GL texture object
pub struct GlTexture {
    desc: GpuTextureDesc,
    id: ObjectId,
    context: Rc<GlContext>,
    name: TextureName,
    target: TextureTarget,
}

impl GlTexture {
    pub(super) fn new(context: &Rc<GlContext>, desc: GpuTextureDesc) -> Self {
        let target = TextureTarget::from(desc.texture_type);
        let depth = match desc.texture_type {
            GpuTextureType::Texture2DArray | GpuTextureType::Texture3D => desc.depth.max(1),
            GpuTextureType::Texture2D | GpuTextureType::TextureCube => 1,
        };

        let storage = TextureStorage {
            target,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            depth,
            mips: desc.mip_count(),
        };

        let name = context.device.gen_texture(&storage);

        Self {
            desc,
            id: ObjectId::next(),
            context: Rc::clone(context),
            name,
            target,
        }
    }

    /// Create a view of a texture created by the GL backend
    ///
    /// The view's texture name shares storage with the source, so the view
    /// does not need to keep the source alive.
    pub(super) fn new_view(context: &Rc<GlContext>, view: &GpuTextureViewDesc) -> Self {
        let desc = view.texture_desc();
        let target = TextureTarget::from(view.texture_type);
        let range = TextureViewRange {
            target,
            format: view.format,
            base_mip: view.base_mip,
            mips: view.mips,
            base_layer: view.base_layer,
            layers: view.layers,
        };

        let source = Self::from_dyn(view.source.as_ref());
        let name = context.device.gen_texture_view(source.name, &range);

        Self {
            desc,
            id: ObjectId::next(),
            context: Rc::clone(context),
            name,
            target,
        }
    }

    /// Downcast a texture created by the GL backend
    pub(super) fn from_dyn(texture: &dyn GpuTexture) -> &Self {
        match texture.as_any().downcast_ref::<Self>() {
            Some(texture) => texture,
            None => fatal!("GL: Texture {} was not created by the GL backend", texture.id().raw()),
        }
    }

    /// Native texture name
    pub const fn name(&self) -> TextureName {
        self.name
    }

    /// Native binding target
    pub const fn target(&self) -> TextureTarget {
        self.target
    }

    /// Bind the texture to a texture unit for rendering
    pub(super) fn bind(&self, unit: u32) {
        self.context.state.borrow_mut().bind_texture(unit, self.target, self.name);
    }

    /// Bind the texture for modification
    ///
    /// The last texture unit is reserved for this so that modifying a
    /// texture never disturbs the units used for rendering.
    fn bind_for_modification(&self) {
        let mut state = self.context.state.borrow_mut();
        let unit = state.texture_unit_count() - 1;
        state.bind_texture(unit, self.target, self.name);
        state.set_active_texture(unit);
    }
}

impl GpuTexture for GlTexture {
    fn desc(&self) -> &GpuTextureDesc {
        &self.desc
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn update_impl(&self, area: &IntBox, data: &[u8], mip: u32, layer: u32) {
        self.bind_for_modification();
        self.context.device.tex_sub_image(self.target, mip, layer, area, data);
    }

    fn generate_mipmap(&self) {
        self.bind_for_modification();
        self.context.device.generate_mipmap(self.target);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        self.context.invalidate_fbos(self.id);
        self.context.state.borrow_mut().invalidate_texture(self.name);
        self.context.device.delete_texture(self.name);
    }
}
