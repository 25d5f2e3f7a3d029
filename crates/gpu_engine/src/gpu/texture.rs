//! GPU textures and texture image references

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use bitflags::bitflags;

use super::defs::{ObjectId, NUM_CUBE_FACES};
use super::pixel_format::PixelFormat;
use crate::foundation::math::IntBox;
use crate::{check, check_msg, fatal};

/// Type of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuTextureType {
    /// 2-dimensional texture
    #[default]
    Texture2D,
    /// 2-dimensional texture array
    Texture2DArray,
    /// Cube texture (6 2-dimensional faces)
    TextureCube,
    /// 3-dimensional texture
    Texture3D,
}

impl GpuTextureType {
    /// Whether the depth dimension is meaningful for this type
    pub const fn uses_depth(self) -> bool {
        matches!(self, Self::Texture2DArray | Self::Texture3D)
    }
}

bitflags! {
    /// Behaviour flags for a texture
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureFlags: u32 {
        /// Regenerate mipmaps automatically after an update of the top level
        const AUTO_MIPMAP = 1 << 0;
        /// Texture will be used as a render target
        const RENDER_TARGET = 1 << 1;
    }
}

/// Descriptor for a texture
///
/// `depth` is the number of layers for 2D arrays and the depth for 3D
/// textures. It is ignored for every other type, both when creating the
/// texture and when comparing descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuTextureDesc {
    /// Type of the texture
    pub texture_type: GpuTextureType,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels (equal to width for cube textures)
    pub height: u32,
    /// Depth in pixels or number of array layers
    pub depth: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Number of mip levels (0 for a full pyramid)
    pub mips: u32,
    /// Behaviour flags
    pub flags: TextureFlags,
}

impl GpuTextureDesc {
    /// Descriptor for a single-level 2D texture
    pub fn new_2d(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            texture_type: GpuTextureType::Texture2D,
            width,
            height,
            depth: 1,
            format,
            mips: 1,
            flags: TextureFlags::empty(),
        }
    }

    /// Set the texture type
    pub const fn with_type(mut self, texture_type: GpuTextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    /// Set the depth or layer count
    pub const fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set the number of mip levels
    pub const fn with_mips(mut self, mips: u32) -> Self {
        self.mips = mips;
        self
    }

    /// Set the behaviour flags
    pub const fn with_flags(mut self, flags: TextureFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Number of mip levels the texture will have, resolving 0 to a full pyramid
    pub fn mip_count(&self) -> u32 {
        if self.mips > 0 {
            return self.mips;
        }

        let mut largest = self.width.max(self.height);
        if self.texture_type == GpuTextureType::Texture3D {
            largest = largest.max(self.depth);
        }

        u32::BITS - largest.max(1).leading_zeros()
    }

    /// Number of addressable layers (array layers, cube faces or 3D slices)
    pub const fn layer_count(&self) -> u32 {
        match self.texture_type {
            GpuTextureType::Texture2D => 1,
            GpuTextureType::TextureCube => NUM_CUBE_FACES,
            GpuTextureType::Texture2DArray | GpuTextureType::Texture3D => self.depth,
        }
    }
}

impl PartialEq for GpuTextureDesc {
    fn eq(&self, other: &Self) -> bool {
        self.texture_type == other.texture_type
            && self.width == other.width
            && self.height == other.height
            && (!self.texture_type.uses_depth() || self.depth == other.depth)
            && self.format == other.format
            && self.mips == other.mips
            && self.flags == other.flags
    }
}

impl Eq for GpuTextureDesc {}

impl Hash for GpuTextureDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.texture_type.hash(state);
        self.width.hash(state);
        self.height.hash(state);

        if self.texture_type.uses_depth() {
            self.depth.hash(state);
        }

        self.format.hash(state);
        self.mips.hash(state);
        self.flags.hash(state);
    }
}

/// A GPU texture
///
/// Textures are shared as `Rc<dyn GpuTexture>`. Backends must release any
/// cached references to the texture (such as framebuffers it is attached to)
/// before the native storage is freed.
pub trait GpuTexture {
    /// Descriptor the texture was created from
    fn desc(&self) -> &GpuTextureDesc;

    /// Unique identity of this texture
    fn id(&self) -> ObjectId;

    /// Backend implementation of [`GpuTexture::update`], arguments already checked
    fn update_impl(&self, area: &IntBox, data: &[u8], mip: u32, layer: u32);

    /// Regenerate all mip levels from the top level
    fn generate_mipmap(&self);

    /// Access to the concrete backend type
    fn as_any(&self) -> &dyn Any;

    /// Type of the texture
    fn texture_type(&self) -> GpuTextureType {
        self.desc().texture_type
    }

    /// Width of the top level in pixels
    fn width(&self) -> u32 {
        self.desc().width
    }

    /// Height of the top level in pixels
    fn height(&self) -> u32 {
        self.desc().height
    }

    /// Depth or layer count
    fn depth(&self) -> u32 {
        self.desc().depth
    }

    /// Pixel format
    fn format(&self) -> PixelFormat {
        self.desc().format
    }

    /// Number of mip levels
    fn mips(&self) -> u32 {
        self.desc().mip_count()
    }

    /// Behaviour flags
    fn flags(&self) -> TextureFlags {
        self.desc().flags
    }

    /// Replace an area of one mip level of the texture
    ///
    /// For 3D textures the area's `z`/`depth` select the slices and `layer`
    /// must be 0. For other types `layer` selects the array layer or cube
    /// face. `data` must hold tightly packed pixels in the texture's format.
    fn update(&self, area: &IntBox, data: &[u8], mip: u32, layer: u32) {
        check!(mip < self.mips());
        check!(self.texture_type() == GpuTextureType::Texture3D || area.depth <= 1);
        check!(layer < self.desc().layer_count().max(1));

        let pixels = usize::try_from(area.width * area.height * area.depth.max(1)).unwrap_or(0);
        check!(data.len() >= pixels * self.format().bytes_per_pixel());

        self.update_impl(area, data, mip, layer);

        if mip == 0 && self.flags().contains(TextureFlags::AUTO_MIPMAP) {
            self.generate_mipmap();
        }
    }
}

/// Reference to a single image (layer and mip) of a texture
///
/// A reference without a texture is "null". Render target descriptors use a
/// null reference as the sole colour target to denote the main window.
#[derive(Clone, Default)]
pub struct GpuTextureImageRef {
    /// Texture being referenced
    pub texture: Option<Rc<dyn GpuTexture>>,
    /// Array layer, cube face or 3D slice
    pub layer: u32,
    /// Mip level
    pub mip: u32,
}

impl GpuTextureImageRef {
    /// Reference to a layer and mip of a texture
    pub fn new(texture: &Rc<dyn GpuTexture>, layer: u32, mip: u32) -> Self {
        Self {
            texture: Some(Rc::clone(texture)),
            layer,
            mip,
        }
    }

    /// Reference to the top level of a texture
    pub fn from_texture(texture: &Rc<dyn GpuTexture>) -> Self {
        Self::new(texture, 0, 0)
    }

    /// Null reference
    pub fn null() -> Self {
        Self::default()
    }

    /// Whether this reference names a texture
    pub const fn is_some(&self) -> bool {
        self.texture.is_some()
    }

    /// Whether this is a null reference
    pub const fn is_null(&self) -> bool {
        self.texture.is_none()
    }

    /// Identity of the referenced texture
    pub fn texture_id(&self) -> Option<ObjectId> {
        self.texture.as_ref().map(|texture| texture.id())
    }

    /// Size of the referenced mip level
    pub fn size(&self) -> Option<(u32, u32)> {
        self.texture.as_ref().map(|texture| {
            ((texture.width() >> self.mip).max(1), (texture.height() >> self.mip).max(1))
        })
    }

    /// Format of the referenced texture
    pub fn format(&self) -> Option<PixelFormat> {
        self.texture.as_ref().map(|texture| texture.format())
    }
}

impl PartialEq for GpuTextureImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.texture_id() == other.texture_id() && self.layer == other.layer && self.mip == other.mip
    }
}

impl Eq for GpuTextureImageRef {}

impl Hash for GpuTextureImageRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.texture_id().hash(state);
        self.layer.hash(state);
        self.mip.hash(state);
    }
}

impl fmt::Debug for GpuTextureImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTextureImageRef")
            .field("texture", &self.texture_id())
            .field("layer", &self.layer)
            .field("mip", &self.mip)
            .finish()
    }
}

/// Descriptor for a texture view
///
/// A view exposes a range of mip levels and layers of an existing texture,
/// possibly with a different type or a compatible format. It shares storage
/// with its source: updates through either are visible through both, and the
/// storage stays alive until the source and every view of it are dropped.
#[derive(Clone)]
pub struct GpuTextureViewDesc {
    /// Texture the view is created from
    pub source: Rc<dyn GpuTexture>,
    /// Type of the view
    pub texture_type: GpuTextureType,
    /// Format the view's pixels are interpreted as
    pub format: PixelFormat,
    /// First mip level of the source included in the view
    pub base_mip: u32,
    /// Number of mip levels
    pub mips: u32,
    /// First layer of the source included in the view
    pub base_layer: u32,
    /// Number of layers
    pub layers: u32,
}

impl GpuTextureViewDesc {
    /// View of the whole of a texture, with the same type and format
    pub fn new(source: &Rc<dyn GpuTexture>) -> Self {
        Self {
            source: Rc::clone(source),
            texture_type: source.texture_type(),
            format: source.format(),
            base_mip: 0,
            mips: source.mips(),
            base_layer: 0,
            layers: source.desc().layer_count().max(1),
        }
    }

    /// 2D view of a single image of a texture
    pub fn from_image(image: &GpuTextureImageRef) -> Self {
        let Some(texture) = &image.texture else {
            fatal!("Texture view of a null image reference");
        };

        Self::new(texture)
            .with_type(GpuTextureType::Texture2D)
            .with_mips(image.mip, 1)
            .with_layers(image.layer, 1)
    }

    /// Set the type of the view
    pub fn with_type(mut self, texture_type: GpuTextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    /// Set the format of the view
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the range of mip levels
    pub fn with_mips(mut self, base_mip: u32, mips: u32) -> Self {
        self.base_mip = base_mip;
        self.mips = mips;
        self
    }

    /// Set the range of layers
    pub fn with_layers(mut self, base_layer: u32, layers: u32) -> Self {
        self.base_layer = base_layer;
        self.layers = layers;
        self
    }

    /// Descriptor of the texture the view behaves as
    pub fn texture_desc(&self) -> GpuTextureDesc {
        let source = self.source.desc();
        let depth = match self.texture_type {
            GpuTextureType::Texture2DArray => self.layers,
            GpuTextureType::Texture3D => source.depth,
            GpuTextureType::Texture2D | GpuTextureType::TextureCube => 1,
        };

        GpuTextureDesc {
            texture_type: self.texture_type,
            width: (source.width >> self.base_mip).max(1),
            height: (source.height >> self.base_mip).max(1),
            depth,
            format: self.format,
            mips: self.mips,
            flags: source.flags,
        }
    }

    /// Check that the view can be created from its source
    ///
    /// 2D arrays and cube textures can be viewed as 2D textures (one layer),
    /// 2D arrays or cubes (six layers). 2D and 3D textures can only be viewed
    /// as their own type, 3D views covering every slice. The view format must
    /// equal the source format or be a colour format of the same size.
    pub fn validate(&self) {
        let source = self.source.desc();

        check_msg!(
            self.mips > 0 && self.base_mip + self.mips <= source.mip_count(),
            "Texture view mips {}+{} outside source ({} mips)",
            self.base_mip,
            self.mips,
            source.mip_count()
        );
        check_msg!(
            self.layers > 0 && self.base_layer + self.layers <= source.layer_count().max(1),
            "Texture view layers {}+{} outside source ({} layers)",
            self.base_layer,
            self.layers,
            source.layer_count().max(1)
        );

        let type_compatible = match (source.texture_type, self.texture_type) {
            (GpuTextureType::Texture2D, GpuTextureType::Texture2D) => true,
            (GpuTextureType::Texture2DArray | GpuTextureType::TextureCube, GpuTextureType::Texture2D) => {
                self.layers == 1
            }
            (GpuTextureType::Texture2DArray | GpuTextureType::TextureCube, GpuTextureType::Texture2DArray) => true,
            (GpuTextureType::Texture2DArray | GpuTextureType::TextureCube, GpuTextureType::TextureCube) => {
                self.layers == NUM_CUBE_FACES
            }
            (GpuTextureType::Texture3D, GpuTextureType::Texture3D) => {
                self.base_layer == 0 && self.layers == source.depth.max(1)
            }
            _ => false,
        };
        check_msg!(
            type_compatible,
            "Cannot create a {:?} view of a {:?} texture ({} layers)",
            self.texture_type,
            source.texture_type,
            self.layers
        );

        let format_compatible = self.format == source.format
            || (self.format.is_colour()
                && source.format.is_colour()
                && self.format.bytes_per_pixel() == source.format.bytes_per_pixel());
        check_msg!(
            format_compatible,
            "Texture view format {:?} is incompatible with {:?}",
            self.format,
            source.format
        );
    }
}

impl fmt::Debug for GpuTextureViewDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuTextureViewDesc")
            .field("source", &self.source.id())
            .field("texture_type", &self.texture_type)
            .field("format", &self.format)
            .field("mips", &(self.base_mip..self.base_mip + self.mips))
            .field("layers", &(self.base_layer..self.base_layer + self.layers))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::test_support::mock_texture;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_depth_ignored_for_2d_textures() {
        let a = GpuTextureDesc::new_2d(256, 128, PixelFormat::R8G8B8A8).with_depth(1);
        let b = GpuTextureDesc::new_2d(256, 128, PixelFormat::R8G8B8A8).with_depth(7);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_depth_compared_for_arrays() {
        let a = GpuTextureDesc::new_2d(64, 64, PixelFormat::Depth32)
            .with_type(GpuTextureType::Texture2DArray)
            .with_depth(4);
        let b = a.with_depth(6);

        assert_ne!(a, b);
        assert_eq!(a, a.with_depth(4));
    }

    #[test]
    fn test_mip_count() {
        let full = GpuTextureDesc::new_2d(256, 64, PixelFormat::R8G8B8A8).with_mips(0);
        assert_eq!(full.mip_count(), 9);

        let single = GpuTextureDesc::new_2d(1, 1, PixelFormat::R8).with_mips(0);
        assert_eq!(single.mip_count(), 1);

        let explicit = GpuTextureDesc::new_2d(256, 256, PixelFormat::R8).with_mips(3);
        assert_eq!(explicit.mip_count(), 3);
    }

    #[test]
    fn test_layer_count() {
        let cube = GpuTextureDesc::new_2d(32, 32, PixelFormat::R8G8B8A8)
            .with_type(GpuTextureType::TextureCube)
            .with_depth(9);
        assert_eq!(cube.layer_count(), 6);

        let array = cube.with_type(GpuTextureType::Texture2DArray).with_depth(3);
        assert_eq!(array.layer_count(), 3);
    }

    #[test]
    fn test_null_image_refs_are_equal() {
        assert_eq!(GpuTextureImageRef::null(), GpuTextureImageRef::default());
        assert!(GpuTextureImageRef::null().is_null());
        assert_eq!(GpuTextureImageRef::null().size(), None);
    }

    fn cube_texture() -> Rc<dyn GpuTexture> {
        mock_texture(
            GpuTextureDesc::new_2d(64, 64, PixelFormat::R8G8B8A8)
                .with_type(GpuTextureType::TextureCube)
                .with_mips(0),
        )
    }

    #[test]
    fn test_view_of_cube_face() {
        let cube = cube_texture();
        let view = GpuTextureViewDesc::from_image(&GpuTextureImageRef::new(&cube, 4, 2));
        view.validate();

        let desc = view.texture_desc();
        assert_eq!(desc.texture_type, GpuTextureType::Texture2D);
        assert_eq!((desc.width, desc.height), (16, 16));
        assert_eq!(desc.mip_count(), 1);
        assert_eq!((view.base_layer, view.layers), (4, 1));
    }

    #[test]
    fn test_whole_texture_view() {
        let array = mock_texture(
            GpuTextureDesc::new_2d(32, 16, PixelFormat::R8G8B8A8)
                .with_type(GpuTextureType::Texture2DArray)
                .with_depth(12)
                .with_mips(3),
        );

        let view = GpuTextureViewDesc::new(&array)
            .with_type(GpuTextureType::TextureCube)
            .with_layers(6, 6);
        view.validate();
        assert_eq!(view.texture_desc().layer_count(), 6);

        let reinterpreted = GpuTextureViewDesc::new(&array).with_format(PixelFormat::R8G8B8A8Srgb);
        reinterpreted.validate();
        let desc = reinterpreted.texture_desc();
        assert_eq!(desc.format, PixelFormat::R8G8B8A8Srgb);
        assert_eq!((desc.width, desc.height, desc.depth, desc.mips), (32, 16, 12, 3));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Texture view layers 5+2 outside source (6 layers)")]
    fn test_view_layers_out_of_range() {
        GpuTextureViewDesc::new(&cube_texture())
            .with_type(GpuTextureType::Texture2DArray)
            .with_layers(5, 2)
            .validate();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Cannot create a TextureCube view of a Texture2D texture")]
    fn test_view_type_incompatible() {
        let texture = mock_texture(GpuTextureDesc::new_2d(8, 8, PixelFormat::R8G8B8A8));
        GpuTextureViewDesc::new(&texture).with_type(GpuTextureType::TextureCube).validate();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Texture view format Depth32 is incompatible with R8G8B8A8")]
    fn test_view_format_incompatible() {
        let texture = mock_texture(GpuTextureDesc::new_2d(8, 8, PixelFormat::R8G8B8A8));
        GpuTextureViewDesc::new(&texture).with_format(PixelFormat::Depth32).validate();
    }
}
