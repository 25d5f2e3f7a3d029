//! In-memory GL device
//!
//! [`SoftDevice`] implements [`GlDevice`] without a GPU. Textures, the window
//! framebuffer and buffers are stored in memory so that clears, blits and
//! texture uploads produce pixels which can be read back. Draws are recorded
//! but not rasterized. Every native entry point is counted, which lets tests
//! observe how many calls the backend's state cache let through.
//!
//! Images are stored with a bottom-left origin, as GL addresses them.
//! [`SoftImage::pixel`] takes top-left coordinates.
//!
//! Texture names refer to a range of a reference counted image storage, so
//! texture views share images with the texture they were created from.
//! Timestamp queries record the time since the device was created and never
//! go backwards.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use slotmap::SlotMap;

use super::device::{
    Attachment, BlitMask, BufferName, BufferTarget, Capability, FramebufferName, FramebufferStatus,
    FramebufferTarget, GlDevice, PipelineName, ProgramName, QueryName, SamplerName, SamplerParams,
    TextureImageTarget, TextureName, TextureStorage, TextureTarget, TextureViewRange, VertexArrayName,
    VertexAttribPointer,
};
use crate::foundation::logging::{trace, warn};
use crate::foundation::math::{Colour, IntBox, IntRect};
use crate::gpu::buffer::GpuBufferUsage;
use crate::gpu::defs::{BlendFactor, BlendFunc, ComparisonFunc, CullMode, PrimitiveType, ShaderStage};
use crate::gpu::index_data::GpuIndexType;
use crate::gpu::pixel_format::PixelFormat;

/// Texture units reported by the device
const MAX_TEXTURE_UNITS: u32 = 96;

slotmap::new_key_type! {
    struct StorageKey;
}

/// A single image, each pixel stored as 4 floats
///
/// Depth images keep depth in the first channel and stencil in the second.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftImage {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl SoftImage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Width in pixels
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at a position with a top-left origin
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.get(x, self.height - 1 - y)
    }

    /// Whether every pixel within `rect` (top-left origin) equals `value`
    pub fn area_is(&self, rect: IntRect, value: [f32; 4]) -> bool {
        (rect.y..rect.bottom())
            .flat_map(|y| (rect.x..rect.right()).map(move |x| (x, y)))
            .all(|(x, y)| self.pixel(x as u32, y as u32) == value)
    }

    /// Convert to tightly packed 8-bit RGBA rows, top row first
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                out.extend(self.pixel(x, y).iter().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
            }
        }
        out
    }

    fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let index = (y * self.width + x) as usize;
        self.pixels[index] = value;
    }

    /// Clip a bottom-left origin rectangle to the image bounds
    fn clip(&self, rect: IntRect) -> (u32, u32, u32, u32) {
        let x0 = rect.x.clamp(0, self.width as i32) as u32;
        let y0 = rect.y.clamp(0, self.height as i32) as u32;
        let x1 = rect.right().clamp(0, self.width as i32) as u32;
        let y1 = rect.bottom().clamp(0, self.height as i32) as u32;
        (x0, y0, x1, y1)
    }

    fn fill(&mut self, rect: IntRect, mut op: impl FnMut(&mut [f32; 4])) {
        let (x0, y0, x1, y1) = self.clip(rect);
        for y in y0..y1 {
            for x in x0..x1 {
                let index = (y * self.width + x) as usize;
                op(&mut self.pixels[index]);
            }
        }
    }
}

/// A draw recorded by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDrawCall {
    /// Primitive type
    pub primitive: PrimitiveType,
    /// Number of vertices or indices
    pub count: usize,
    /// Whether the draw was indexed
    pub indexed: bool,
    /// Pipeline bound at the time of the draw
    pub pipeline: Option<PipelineName>,
    /// Draw framebuffer, `None` for the window
    pub framebuffer: Option<FramebufferName>,
}

/// Images of a texture, shared by the texture and its views
struct SoftStorage {
    mips: u32,
    layers: u32,
    images: Vec<SoftImage>,
    refs: u32,
}

impl SoftStorage {
    fn new(storage: &TextureStorage) -> Self {
        let layers = match storage.target {
            TextureTarget::Texture2D => 1,
            TextureTarget::CubeMap => 6,
            TextureTarget::Texture2DArray | TextureTarget::Texture3D => storage.depth.max(1),
        };
        let mips = storage.mips.max(1);

        let mut images = Vec::new();
        for mip in 0..mips {
            let width = (storage.width >> mip).max(1);
            let height = (storage.height >> mip).max(1);
            images.extend((0..layers).map(|_| SoftImage::new(width, height)));
        }

        Self {
            mips,
            layers,
            images,
            refs: 1,
        }
    }

    fn image(&self, mip: u32, layer: u32) -> Option<&SoftImage> {
        if layer >= self.layers {
            return None;
        }
        self.images.get((mip * self.layers + layer) as usize)
    }

    fn image_mut(&mut self, mip: u32, layer: u32) -> Option<&mut SoftImage> {
        if layer >= self.layers {
            return None;
        }
        self.images.get_mut((mip * self.layers + layer) as usize)
    }
}

/// A texture name and the range of its storage it exposes
struct SoftTexture {
    target: TextureTarget,
    format: PixelFormat,
    storage: StorageKey,
    base_mip: u32,
    mips: u32,
    base_layer: u32,
    layers: u32,
}

#[derive(Debug, Clone, Copy)]
struct ImageBinding {
    texture: TextureName,
    mip: u32,
    layer: u32,
}

#[derive(Default)]
struct SoftFramebuffer {
    colour: BTreeMap<u32, ImageBinding>,
    depth: Option<(Attachment, ImageBinding)>,
    draw_buffers: u32,
    read_buffer: Option<u32>,
}

struct SoftBuffer {
    data: Vec<u8>,
}

struct SoftProgram {
    stage: ShaderStage,
    bindings: HashMap<String, u32>,
}

#[derive(Default)]
struct SoftVertexArray {
    attributes: Vec<VertexAttribPointer>,
    element_buffer: Option<BufferName>,
}

struct Inner {
    window: SoftImage,
    storages: SlotMap<StorageKey, SoftStorage>,
    textures: SlotMap<TextureName, SoftTexture>,
    framebuffers: SlotMap<FramebufferName, SoftFramebuffer>,
    buffers: SlotMap<BufferName, SoftBuffer>,
    samplers: SlotMap<SamplerName, SamplerParams>,
    programs: SlotMap<ProgramName, SoftProgram>,
    pipelines: SlotMap<PipelineName, [Option<ProgramName>; 2]>,
    vertex_arrays: SlotMap<VertexArrayName, SoftVertexArray>,
    queries: SlotMap<QueryName, Option<u64>>,

    capabilities: HashSet<Capability>,
    viewport: IntRect,
    scissor: IntRect,
    depth_write: bool,
    draw_framebuffer: Option<FramebufferName>,
    read_framebuffer: Option<FramebufferName>,
    active_unit: u32,
    texture_units: Vec<Option<(TextureTarget, TextureName)>>,
    sampler_units: Vec<Option<SamplerName>>,
    bound_buffers: [Option<BufferName>; BufferTarget::COUNT],
    uniform_bindings: HashMap<u32, BufferName>,
    pipeline: Option<PipelineName>,
    vertex_array: Option<VertexArrayName>,
    debug_groups: Vec<String>,

    draws: Vec<SoftDrawCall>,
    presented_frames: u32,
    calls: HashMap<&'static str, usize>,
    epoch: Instant,
    last_timestamp: u64,
}

impl Inner {
    fn record(&mut self, call: &'static str) {
        trace!("soft: {}", call);
        *self.calls.entry(call).or_default() += 1;
    }

    /// Image of a texture, `mip` and `layer` being relative to the texture's range
    fn texture_image(&self, texture: TextureName, mip: u32, layer: u32) -> Option<&SoftImage> {
        let texture = self.textures.get(texture)?;
        if mip >= texture.mips || layer >= texture.layers {
            return None;
        }

        self.storages
            .get(texture.storage)?
            .image(texture.base_mip + mip, texture.base_layer + layer)
    }

    fn texture_image_mut(&mut self, texture: TextureName, mip: u32, layer: u32) -> Option<&mut SoftImage> {
        let texture = self.textures.get(texture)?;
        if mip >= texture.mips || layer >= texture.layers {
            return None;
        }

        let (mip, layer) = (texture.base_mip + mip, texture.base_layer + layer);
        self.storages.get_mut(texture.storage)?.image_mut(mip, layer)
    }

    fn colour_image_mut(&mut self, framebuffer: Option<FramebufferName>, index: u32) -> Option<&mut SoftImage> {
        let Some(framebuffer) = framebuffer else {
            return (index == 0).then_some(&mut self.window);
        };

        let binding = *self.framebuffers.get(framebuffer)?.colour.get(&index)?;
        self.texture_image_mut(binding.texture, binding.mip, binding.layer)
    }

    fn depth_image_mut(&mut self, framebuffer: Option<FramebufferName>) -> Option<(&mut SoftImage, bool)> {
        let (attachment, binding) = self.framebuffers.get(framebuffer?)?.depth?;
        let image = self.texture_image_mut(binding.texture, binding.mip, binding.layer)?;
        Some((image, attachment == Attachment::DepthStencil))
    }

    /// Attach an image to the bound draw framebuffer if the texture's target is accepted
    fn attach(
        &mut self,
        call: &'static str,
        attachment: Attachment,
        binding: ImageBinding,
        accepts: impl Fn(TextureTarget) -> bool,
    ) {
        self.record(call);

        let Some(framebuffer) = self.draw_framebuffer else {
            warn!("soft: {} with the default framebuffer bound", call);
            return;
        };

        match self.textures.get(binding.texture) {
            Some(texture) if accepts(texture.target) => {}
            Some(texture) => {
                warn!("soft: {} cannot attach a {:?} texture", call, texture.target);
                return;
            }
            None => {
                warn!("soft: {} of a deleted texture", call);
                return;
            }
        }

        if let Some(fb) = self.framebuffers.get_mut(framebuffer) {
            match attachment {
                Attachment::Colour(index) => {
                    fb.colour.insert(index, binding);
                }
                Attachment::Depth | Attachment::DepthStencil => fb.depth = Some((attachment, binding)),
            }
        }
    }

    fn read_image(&self, framebuffer: Option<FramebufferName>, mask: BlitMask) -> Option<SoftImage> {
        let Some(framebuffer) = framebuffer else {
            return (mask == BlitMask::Colour).then(|| self.window.clone());
        };

        let fb = self.framebuffers.get(framebuffer)?;
        let binding = match mask {
            BlitMask::Colour => *fb.colour.get(&fb.read_buffer?)?,
            BlitMask::Depth => fb.depth?.1,
        };
        self.texture_image(binding.texture, binding.mip, binding.layer).cloned()
    }

    /// Buffer bound to a target, element arrays being vertex array state
    fn bound_buffer(&self, target: BufferTarget) -> Option<BufferName> {
        if target == BufferTarget::ElementArray {
            self.vertex_array
                .and_then(|array| self.vertex_arrays.get(array))
                .and_then(|array| array.element_buffer)
        } else {
            self.bound_buffers[target.index()]
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferName>) {
        if target == BufferTarget::ElementArray {
            if let Some(array) = self.vertex_array.and_then(|array| self.vertex_arrays.get_mut(array)) {
                array.element_buffer = buffer;
            }
        } else {
            self.bound_buffers[target.index()] = buffer;
        }
    }

    fn clear_rect(&self) -> IntRect {
        if self.capabilities.contains(&Capability::ScissorTest) {
            self.scissor
        } else {
            IntRect::new(0, 0, i32::MAX / 2, i32::MAX / 2)
        }
    }

    fn bound_texture(&self, target: TextureTarget) -> Option<TextureName> {
        match self.texture_units.get(self.active_unit as usize).copied().flatten() {
            Some((bound_target, name)) if bound_target == target => Some(name),
            _ => None,
        }
    }

    fn framebuffer_status(&self, framebuffer: FramebufferName) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(framebuffer) else {
            return FramebufferStatus::MissingAttachment;
        };

        if fb.colour.is_empty() && fb.depth.is_none() {
            return FramebufferStatus::MissingAttachment;
        }

        let mut size = None;
        let mut check = |binding: &ImageBinding, depth: bool| -> Option<FramebufferStatus> {
            let texture = self.textures.get(binding.texture)?;
            let format = texture.format;
            if (depth && !format.is_depth()) || (!depth && !format.is_colour()) {
                return Some(FramebufferStatus::IncompleteAttachment);
            }

            let image = self.texture_image(binding.texture, binding.mip, binding.layer)?;
            let image_size = (image.width, image.height);
            match size {
                None => size = Some(image_size),
                Some(existing) if existing != image_size => return Some(FramebufferStatus::IncompleteDimensions),
                Some(_) => {}
            }
            None
        };

        for binding in fb.colour.values() {
            if self.textures.get(binding.texture).is_none() {
                return FramebufferStatus::IncompleteAttachment;
            }
            if let Some(status) = check(binding, false) {
                return status;
            }
        }

        if let Some((_, binding)) = &fb.depth {
            if self.textures.get(binding.texture).is_none() {
                return FramebufferStatus::IncompleteAttachment;
            }
            if let Some(status) = check(binding, true) {
                return status;
            }
        }

        FramebufferStatus::Complete
    }
}

/// In-memory implementation of [`GlDevice`]
///
/// Cloning gives another handle to the same device, so a test can keep one
/// to inspect what the backend did with the other.
#[derive(Clone)]
pub struct SoftDevice {
    inner: Rc<RefCell<Inner>>,
}

impl SoftDevice {
    /// Create a device whose default framebuffer has the given size
    pub fn new(width: u32, height: u32) -> Self {
        let inner = Inner {
            window: SoftImage::new(width, height),
            storages: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            queries: SlotMap::with_key(),
            capabilities: HashSet::new(),
            viewport: IntRect::from_size(width, height),
            scissor: IntRect::from_size(width, height),
            depth_write: true,
            draw_framebuffer: None,
            read_framebuffer: None,
            active_unit: 0,
            texture_units: vec![None; MAX_TEXTURE_UNITS as usize],
            sampler_units: vec![None; MAX_TEXTURE_UNITS as usize],
            bound_buffers: [None; BufferTarget::COUNT],
            uniform_bindings: HashMap::new(),
            pipeline: None,
            vertex_array: None,
            debug_groups: Vec::new(),
            draws: Vec::new(),
            presented_frames: 0,
            calls: HashMap::new(),
            epoch: Instant::now(),
            last_timestamp: 0,
        };

        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Number of times a native entry point has been called
    pub fn call_count(&self, call: &str) -> usize {
        self.inner.borrow().calls.get(call).copied().unwrap_or(0)
    }

    /// Total number of native calls
    pub fn total_calls(&self) -> usize {
        self.inner.borrow().calls.values().sum()
    }

    /// Reset all call counters
    pub fn reset_call_counts(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    /// Copy of the default framebuffer's colour image
    pub fn window_image(&self) -> SoftImage {
        self.inner.borrow().window.clone()
    }

    /// Copy of one image of a texture
    pub fn texture_image(&self, texture: TextureName, mip: u32, layer: u32) -> Option<SoftImage> {
        self.inner.borrow().texture_image(texture, mip, layer).cloned()
    }

    /// Content of a buffer
    pub fn buffer_data(&self, buffer: BufferName) -> Option<Vec<u8>> {
        self.inner.borrow().buffers.get(buffer).map(|buffer| buffer.data.clone())
    }

    /// Draws recorded so far
    pub fn draws(&self) -> Vec<SoftDrawCall> {
        self.inner.borrow().draws.clone()
    }

    /// Number of frames presented
    pub fn presented_frames(&self) -> u32 {
        self.inner.borrow().presented_frames
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.inner.borrow().textures.len()
    }

    /// Number of live texture storages, shared by textures and their views
    pub fn storage_count(&self) -> usize {
        self.inner.borrow().storages.len()
    }

    /// Number of live query objects
    pub fn query_count(&self) -> usize {
        self.inner.borrow().queries.len()
    }

    /// Number of live framebuffers
    pub fn framebuffer_count(&self) -> usize {
        self.inner.borrow().framebuffers.len()
    }

    /// Number of live buffers
    pub fn buffer_count(&self) -> usize {
        self.inner.borrow().buffers.len()
    }

    /// Whether a capability is enabled
    pub fn capability_enabled(&self, capability: Capability) -> bool {
        self.inner.borrow().capabilities.contains(&capability)
    }

    /// Current viewport, bottom-left origin
    pub fn current_viewport(&self) -> IntRect {
        self.inner.borrow().viewport
    }

    /// Current scissor rectangle, bottom-left origin
    pub fn current_scissor(&self) -> IntRect {
        self.inner.borrow().scissor
    }

    /// Currently bound draw and read framebuffers
    pub fn bound_framebuffers(&self) -> (Option<FramebufferName>, Option<FramebufferName>) {
        let inner = self.inner.borrow();
        (inner.draw_framebuffer, inner.read_framebuffer)
    }

    /// Buffer bound to an indexed uniform binding point
    pub fn uniform_binding(&self, index: u32) -> Option<BufferName> {
        self.inner.borrow().uniform_bindings.get(&index).copied()
    }

    /// Texture and sampler bound to a unit
    pub fn texture_unit(&self, unit: u32) -> (Option<TextureName>, Option<SamplerName>) {
        let inner = self.inner.borrow();
        let texture = inner.texture_units.get(unit as usize).copied().flatten().map(|(_, name)| name);
        let sampler = inner.sampler_units.get(unit as usize).copied().flatten();
        (texture, sampler)
    }

    /// Binding point assigned to a named program resource
    pub fn program_binding(&self, program: ProgramName, resource: &str) -> Option<u32> {
        self.inner.borrow().programs.get(program)?.bindings.get(resource).copied()
    }

    /// Stage a program was created for
    pub fn program_stage(&self, program: ProgramName) -> Option<ShaderStage> {
        self.inner.borrow().programs.get(program).map(|program| program.stage)
    }

    /// Attributes described on a vertex array
    pub fn vertex_attributes(&self, array: VertexArrayName) -> Option<Vec<VertexAttribPointer>> {
        self.inner.borrow().vertex_arrays.get(array).map(|array| array.attributes.clone())
    }

    /// Element array buffer recorded in a vertex array
    pub fn element_buffer(&self, array: VertexArrayName) -> Option<BufferName> {
        self.inner.borrow().vertex_arrays.get(array)?.element_buffer
    }

    /// Names of the currently open debug groups
    pub fn debug_groups(&self) -> Vec<String> {
        self.inner.borrow().debug_groups.clone()
    }
}

impl GlDevice for SoftDevice {
    fn max_texture_units(&self) -> u32 {
        MAX_TEXTURE_UNITS
    }

    fn max_anisotropy(&self) -> u32 {
        16
    }

    fn set_capability(&self, capability: Capability, enable: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.record(if enable { "enable" } else { "disable" });
        if enable {
            inner.capabilities.insert(capability);
        } else {
            inner.capabilities.remove(&capability);
        }
    }

    fn viewport(&self, rect: IntRect) {
        let mut inner = self.inner.borrow_mut();
        inner.record("viewport");
        inner.viewport = rect;
    }

    fn scissor(&self, rect: IntRect) {
        let mut inner = self.inner.borrow_mut();
        inner.record("scissor");
        inner.scissor = rect;
    }

    fn blend_equation(&self, _func: BlendFunc) {
        self.inner.borrow_mut().record("blend_equation");
    }

    fn blend_func(&self, _source: BlendFactor, _dest: BlendFactor) {
        self.inner.borrow_mut().record("blend_func");
    }

    fn depth_mask(&self, write: bool) {
        let mut inner = self.inner.borrow_mut();
        inner.record("depth_mask");
        inner.depth_write = write;
    }

    fn depth_func(&self, _func: ComparisonFunc) {
        self.inner.borrow_mut().record("depth_func");
    }

    fn cull_face(&self, _mode: CullMode) {
        self.inner.borrow_mut().record("cull_face");
    }

    fn gen_framebuffer(&self) -> FramebufferName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_framebuffer");
        inner.framebuffers.insert(SoftFramebuffer {
            draw_buffers: 1,
            read_buffer: Some(0),
            ..SoftFramebuffer::default()
        })
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_framebuffer");
        inner.framebuffers.remove(framebuffer);

        // Deleting a bound framebuffer reverts the binding to the default.
        if inner.draw_framebuffer == Some(framebuffer) {
            inner.draw_framebuffer = None;
        }
        if inner.read_framebuffer == Some(framebuffer) {
            inner.read_framebuffer = None;
        }
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferName>) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_framebuffer");
        match target {
            FramebufferTarget::Both => {
                inner.draw_framebuffer = framebuffer;
                inner.read_framebuffer = framebuffer;
            }
            FramebufferTarget::Draw => inner.draw_framebuffer = framebuffer,
            FramebufferTarget::Read => inner.read_framebuffer = framebuffer,
        }
    }

    fn framebuffer_texture_2d(&self, attachment: Attachment, image: TextureImageTarget, texture: TextureName, mip: u32) {
        let (expected, layer) = match image {
            TextureImageTarget::Texture2D => (TextureTarget::Texture2D, 0),
            TextureImageTarget::CubeMapFace(face) => (TextureTarget::CubeMap, face),
        };

        let binding = ImageBinding { texture, mip, layer };
        self.inner
            .borrow_mut()
            .attach("framebuffer_texture_2d", attachment, binding, |target| target == expected);
    }

    fn framebuffer_texture_layer(&self, attachment: Attachment, texture: TextureName, mip: u32, layer: u32) {
        let binding = ImageBinding { texture, mip, layer };
        self.inner
            .borrow_mut()
            .attach("framebuffer_texture_layer", attachment, binding, |target| {
                matches!(target, TextureTarget::Texture2DArray | TextureTarget::Texture3D)
            });
    }

    fn draw_buffers(&self, count: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("draw_buffers");
        if let Some(fb) = inner.draw_framebuffer.and_then(|name| inner.framebuffers.get_mut(name)) {
            fb.draw_buffers = count;
        }
    }

    fn read_buffer(&self, attachment: Option<u32>) {
        let mut inner = self.inner.borrow_mut();
        inner.record("read_buffer");
        if let Some(fb) = inner.read_framebuffer.and_then(|name| inner.framebuffers.get_mut(name)) {
            fb.read_buffer = attachment;
        }
    }

    fn check_framebuffer_status(&self) -> FramebufferStatus {
        let mut inner = self.inner.borrow_mut();
        inner.record("check_framebuffer_status");
        match inner.draw_framebuffer {
            Some(framebuffer) => inner.framebuffer_status(framebuffer),
            None => FramebufferStatus::Complete,
        }
    }

    fn clear_buffer_colour(&self, index: u32, colour: Colour) {
        let mut inner = self.inner.borrow_mut();
        inner.record("clear_buffer_colour");

        let rect = inner.clear_rect();
        let framebuffer = inner.draw_framebuffer;
        let value = [colour.x, colour.y, colour.z, colour.w];
        match inner.colour_image_mut(framebuffer, index) {
            Some(image) => image.fill(rect, |pixel| *pixel = value),
            None => warn!("soft: clear of missing colour attachment {}", index),
        }
    }

    fn clear_buffer_depth(&self, depth: f32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("clear_buffer_depth");

        if !inner.depth_write {
            return;
        }

        let rect = inner.clear_rect();
        let framebuffer = inner.draw_framebuffer;
        if let Some((image, _)) = inner.depth_image_mut(framebuffer) {
            image.fill(rect, |pixel| pixel[0] = depth);
        }
    }

    fn clear_buffer_stencil(&self, stencil: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("clear_buffer_stencil");

        let rect = inner.clear_rect();
        let framebuffer = inner.draw_framebuffer;
        if let Some((image, true)) = inner.depth_image_mut(framebuffer) {
            image.fill(rect, |pixel| pixel[1] = stencil as f32);
        }
    }

    fn clear_buffer_depth_stencil(&self, depth: f32, stencil: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("clear_buffer_depth_stencil");

        let rect = inner.clear_rect();
        let depth_write = inner.depth_write;
        let framebuffer = inner.draw_framebuffer;
        if let Some((image, has_stencil)) = inner.depth_image_mut(framebuffer) {
            image.fill(rect, |pixel| {
                if depth_write {
                    pixel[0] = depth;
                }
                if has_stencil {
                    pixel[1] = stencil as f32;
                }
            });
        }
    }

    fn blit_framebuffer(&self, source: IntRect, dest: IntRect, mask: BlitMask) {
        let mut inner = self.inner.borrow_mut();
        inner.record("blit_framebuffer");

        let Some(source_image) = inner.read_image(inner.read_framebuffer, mask) else {
            warn!("soft: blit from a framebuffer without a readable {:?} image", mask);
            return;
        };

        let clip = inner.clear_rect();
        let framebuffer = inner.draw_framebuffer;
        let dest_image = match mask {
            BlitMask::Colour => inner.colour_image_mut(framebuffer, 0),
            BlitMask::Depth => inner.depth_image_mut(framebuffer).map(|(image, _)| image),
        };
        let Some(dest_image) = dest_image else {
            warn!("soft: blit to a framebuffer without a writable {:?} image", mask);
            return;
        };

        for y in 0..dest.height.min(source.height) {
            for x in 0..dest.width.min(source.width) {
                let (sx, sy) = (source.x + x, source.y + y);
                let (dx, dy) = (dest.x + x, dest.y + y);
                let in_source = sx >= 0 && sy >= 0 && (sx as u32) < source_image.width && (sy as u32) < source_image.height;
                let in_dest = dx >= 0 && dy >= 0 && (dx as u32) < dest_image.width && (dy as u32) < dest_image.height;

                if in_source && in_dest && clip.contains_point(dx, dy) {
                    dest_image.set(dx as u32, dy as u32, source_image.get(sx as u32, sy as u32));
                }
            }
        }
    }

    fn gen_texture(&self, storage: &TextureStorage) -> TextureName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_texture");

        let images = SoftStorage::new(storage);
        let (mips, layers) = (images.mips, images.layers);
        let key = inner.storages.insert(images);

        inner.textures.insert(SoftTexture {
            target: storage.target,
            format: storage.format,
            storage: key,
            base_mip: 0,
            mips,
            base_layer: 0,
            layers,
        })
    }

    fn gen_texture_view(&self, source: TextureName, range: &TextureViewRange) -> TextureName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_texture_view");

        let (storage, base_mip, base_layer) = match inner.textures.get(source) {
            Some(source) => (
                source.storage,
                source.base_mip + range.base_mip,
                source.base_layer + range.base_layer,
            ),
            None => {
                warn!("soft: texture view of a deleted texture");
                (StorageKey::default(), 0, 0)
            }
        };

        if let Some(images) = inner.storages.get_mut(storage) {
            images.refs += 1;
        }

        inner.textures.insert(SoftTexture {
            target: range.target,
            format: range.format,
            storage,
            base_mip,
            mips: range.mips,
            base_layer,
            layers: range.layers,
        })
    }

    fn delete_texture(&self, texture: TextureName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_texture");

        if let Some(removed) = inner.textures.remove(texture) {
            let released = inner.storages.get_mut(removed.storage).is_some_and(|images| {
                images.refs = images.refs.saturating_sub(1);
                images.refs == 0
            });

            if released {
                inner.storages.remove(removed.storage);
            }
        }

        for unit in &mut inner.texture_units {
            if matches!(unit, Some((_, name)) if *name == texture) {
                *unit = None;
            }
        }
    }

    fn active_texture(&self, unit: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("active_texture");
        inner.active_unit = unit;
    }

    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureName>) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_texture");
        let unit = inner.active_unit as usize;
        if let Some(slot) = inner.texture_units.get_mut(unit) {
            *slot = texture.map(|name| (target, name));
        }
    }

    fn tex_sub_image(&self, target: TextureTarget, mip: u32, layer: u32, area: &IntBox, data: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        inner.record("tex_sub_image");

        let Some(name) = inner.bound_texture(target) else {
            warn!("soft: tex_sub_image with no {:?} texture bound", target);
            return;
        };
        let Some(format) = inner.textures.get(name).map(|texture| texture.format) else {
            return;
        };

        let bytes_per_pixel = format.bytes_per_pixel();
        let (first_layer, layer_count) = if target == TextureTarget::Texture3D {
            (area.z.max(0) as u32, area.depth.max(1) as u32)
        } else {
            (layer, 1)
        };

        let mut offset = 0;
        for slice in first_layer..first_layer + layer_count {
            let Some(image) = inner.texture_image_mut(name, mip, slice) else {
                return;
            };

            for y in 0..area.height.max(0) as u32 {
                for x in 0..area.width.max(0) as u32 {
                    let Some(bytes) = data.get(offset..offset + bytes_per_pixel) else {
                        return;
                    };
                    offset += bytes_per_pixel;

                    let (px, py) = (area.x as u32 + x, area.y as u32 + y);
                    if px < image.width && py < image.height {
                        image.set(px, py, decode_pixel(format, bytes));
                    }
                }
            }
        }
    }

    fn generate_mipmap(&self, target: TextureTarget) {
        let mut inner = self.inner.borrow_mut();
        inner.record("generate_mipmap");

        let Some(name) = inner.bound_texture(target) else {
            return;
        };
        let Some((mips, layers)) = inner.textures.get(name).map(|texture| (texture.mips, texture.layers)) else {
            return;
        };

        for mip in 1..mips {
            for layer in 0..layers {
                let Some(source) = inner.texture_image(name, mip - 1, layer).cloned() else {
                    continue;
                };
                let Some(dest) = inner.texture_image_mut(name, mip, layer) else {
                    continue;
                };

                for y in 0..dest.height {
                    for x in 0..dest.width {
                        let mut sum = [0.0; 4];
                        let samples = [(0, 0), (1, 0), (0, 1), (1, 1)];
                        for (ox, oy) in samples {
                            let sx = (x * 2 + ox).min(source.width - 1);
                            let sy = (y * 2 + oy).min(source.height - 1);
                            let value = source.get(sx, sy);
                            for (total, component) in sum.iter_mut().zip(value) {
                                *total += component / 4.0;
                            }
                        }
                        dest.set(x, y, sum);
                    }
                }
            }
        }
    }

    fn gen_sampler(&self, params: &SamplerParams) -> SamplerName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_sampler");
        inner.samplers.insert(*params)
    }

    fn delete_sampler(&self, sampler: SamplerName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_sampler");
        inner.samplers.remove(sampler);
    }

    fn bind_sampler(&self, unit: u32, sampler: Option<SamplerName>) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_sampler");
        if let Some(slot) = inner.sampler_units.get_mut(unit as usize) {
            *slot = sampler;
        }
    }

    fn gen_buffer(&self) -> BufferName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_buffer");
        inner.buffers.insert(SoftBuffer { data: Vec::new() })
    }

    fn delete_buffer(&self, buffer: BufferName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_buffer");
        inner.buffers.remove(buffer);
        inner.uniform_bindings.retain(|_, bound| *bound != buffer);
        for bound in &mut inner.bound_buffers {
            if *bound == Some(buffer) {
                *bound = None;
            }
        }
        for array in inner.vertex_arrays.values_mut() {
            if array.element_buffer == Some(buffer) {
                array.element_buffer = None;
            }
        }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferName>) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_buffer");
        inner.bind_buffer(target, buffer);
    }

    fn bind_buffer_base(&self, target: BufferTarget, index: u32, buffer: BufferName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_buffer_base");
        inner.bind_buffer(target, Some(buffer));
        if target == BufferTarget::Uniform {
            inner.uniform_bindings.insert(index, buffer);
        }
    }

    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, _usage: GpuBufferUsage) {
        let mut inner = self.inner.borrow_mut();
        inner.record("buffer_data");

        let Some(buffer) = inner.bound_buffer(target).and_then(|name| inner.buffers.get_mut(name)) else {
            warn!("soft: buffer_data with no {:?} buffer bound", target);
            return;
        };

        buffer.data = match data {
            Some(data) => data[..size.min(data.len())].to_vec(),
            None => vec![0; size],
        };
        buffer.data.resize(size, 0);
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        let mut inner = self.inner.borrow_mut();
        inner.record("buffer_sub_data");

        let Some(buffer) = inner.bound_buffer(target).and_then(|name| inner.buffers.get_mut(name)) else {
            warn!("soft: buffer_sub_data with no {:?} buffer bound", target);
            return;
        };

        match buffer.data.get_mut(offset..offset + data.len()) {
            Some(range) => range.copy_from_slice(data),
            None => warn!("soft: buffer_sub_data outside buffer storage"),
        }
    }

    fn create_program(&self, stage: ShaderStage, name: &str, code: &[u32]) -> Result<ProgramName, String> {
        let mut inner = self.inner.borrow_mut();
        inner.record("create_program");

        if code.is_empty() {
            return Err(format!("{name}: error: empty program binary"));
        }

        Ok(inner.programs.insert(SoftProgram {
            stage,
            bindings: HashMap::new(),
        }))
    }

    fn delete_program(&self, program: ProgramName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_program");
        inner.programs.remove(program);
    }

    fn uniform_block_binding(&self, program: ProgramName, block: &str, binding: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("uniform_block_binding");
        if let Some(program) = inner.programs.get_mut(program) {
            program.bindings.insert(block.to_owned(), binding);
        }
    }

    fn uniform_sampler_binding(&self, program: ProgramName, sampler: &str, unit: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.record("uniform_sampler_binding");
        if let Some(program) = inner.programs.get_mut(program) {
            program.bindings.insert(sampler.to_owned(), unit);
        }
    }

    fn gen_program_pipeline(&self) -> PipelineName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_program_pipeline");
        inner.pipelines.insert([None; 2])
    }

    fn delete_program_pipeline(&self, pipeline: PipelineName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_program_pipeline");
        inner.pipelines.remove(pipeline);
        if inner.pipeline == Some(pipeline) {
            inner.pipeline = None;
        }
    }

    fn use_program_stage(&self, pipeline: PipelineName, stage: ShaderStage, program: ProgramName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("use_program_stage");
        if let Some(stages) = inner.pipelines.get_mut(pipeline) {
            stages[stage.index()] = Some(program);
        }
    }

    fn bind_program_pipeline(&self, pipeline: Option<PipelineName>) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_program_pipeline");
        inner.pipeline = pipeline;
    }

    fn gen_vertex_array(&self) -> VertexArrayName {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_vertex_array");
        inner.vertex_arrays.insert(SoftVertexArray::default())
    }

    fn delete_vertex_array(&self, array: VertexArrayName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_vertex_array");
        inner.vertex_arrays.remove(array);
        if inner.vertex_array == Some(array) {
            inner.vertex_array = None;
        }
    }

    fn bind_vertex_array(&self, array: VertexArrayName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("bind_vertex_array");
        inner.vertex_array = Some(array);
    }

    fn vertex_attrib_pointer(&self, pointer: &VertexAttribPointer) {
        let mut inner = self.inner.borrow_mut();
        inner.record("vertex_attrib_pointer");
        if let Some(array) = inner.vertex_array.and_then(|name| inner.vertex_arrays.get_mut(name)) {
            array.attributes.push(*pointer);
        }
    }

    fn draw_arrays(&self, primitive: PrimitiveType, _first: usize, count: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.record("draw_arrays");
        let draw = SoftDrawCall {
            primitive,
            count,
            indexed: false,
            pipeline: inner.pipeline,
            framebuffer: inner.draw_framebuffer,
        };
        inner.draws.push(draw);
    }

    fn draw_elements(&self, primitive: PrimitiveType, count: usize, _index_type: GpuIndexType, _offset: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.record("draw_elements");
        let draw = SoftDrawCall {
            primitive,
            count,
            indexed: true,
            pipeline: inner.pipeline,
            framebuffer: inner.draw_framebuffer,
        };
        inner.draws.push(draw);
    }

    fn gen_queries(&self, count: u32) -> Vec<QueryName> {
        let mut inner = self.inner.borrow_mut();
        inner.record("gen_queries");
        (0..count).map(|_| inner.queries.insert(None)).collect()
    }

    fn delete_queries(&self, queries: &[QueryName]) {
        let mut inner = self.inner.borrow_mut();
        inner.record("delete_queries");
        for &query in queries {
            inner.queries.remove(query);
        }
    }

    fn query_counter(&self, query: QueryName) {
        let mut inner = self.inner.borrow_mut();
        inner.record("query_counter");

        let elapsed = u64::try_from(inner.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let timestamp = elapsed.max(inner.last_timestamp + 1);
        inner.last_timestamp = timestamp;

        match inner.queries.get_mut(query) {
            Some(result) => *result = Some(timestamp),
            None => warn!("soft: query_counter on a deleted query"),
        }
    }

    fn query_result(&self, query: QueryName) -> u64 {
        let mut inner = self.inner.borrow_mut();
        inner.record("query_result");

        match inner.queries.get(query).copied().flatten() {
            Some(result) => result,
            None => {
                warn!("soft: result requested for a query that was never ended");
                0
            }
        }
    }

    fn push_debug_group(&self, name: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.record("push_debug_group");
        inner.debug_groups.push(name.to_owned());
    }

    fn pop_debug_group(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.record("pop_debug_group");
        inner.debug_groups.pop();
    }

    fn swap_buffers(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.record("swap_buffers");
        inner.presented_frames += 1;
    }
}

/// Decode one pixel of tightly packed texture data
///
/// Formats with packed or half-float components are not decoded and read as
/// zero.
fn decode_pixel(format: PixelFormat, bytes: &[u8]) -> [f32; 4] {
    let unorm = |byte: u8| f32::from(byte) / 255.0;
    let float = |index: usize| {
        bytes
            .get(index * 4..index * 4 + 4)
            .and_then(|chunk| chunk.try_into().ok())
            .map_or(0.0, f32::from_le_bytes)
    };

    match format {
        PixelFormat::R8G8B8A8 | PixelFormat::R8G8B8A8Srgb => {
            [unorm(bytes[0]), unorm(bytes[1]), unorm(bytes[2]), unorm(bytes[3])]
        }
        PixelFormat::B8G8R8A8 | PixelFormat::B8G8R8A8Srgb => {
            [unorm(bytes[2]), unorm(bytes[1]), unorm(bytes[0]), unorm(bytes[3])]
        }
        PixelFormat::R8G8 => [unorm(bytes[0]), unorm(bytes[1]), 0.0, 1.0],
        PixelFormat::R8 => [unorm(bytes[0]), 0.0, 0.0, 1.0],
        PixelFormat::FloatR32G32B32A32 => [float(0), float(1), float(2), float(3)],
        PixelFormat::FloatR32G32B32 => [float(0), float(1), float(2), 1.0],
        PixelFormat::FloatR32G32 => [float(0), float(1), 0.0, 1.0],
        PixelFormat::FloatR32 | PixelFormat::Depth32 => [float(0), 0.0, 0.0, 1.0],
        PixelFormat::Depth32Stencil8 => [float(0), f32::from(bytes[4]), 0.0, 1.0],
        PixelFormat::Depth16 => [f32::from(u16::from_le_bytes([bytes[0], bytes[1]])) / 65535.0, 0.0, 0.0, 1.0],
        _ => [0.0; 4],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colour_texture(device: &SoftDevice, width: u32, height: u32) -> TextureName {
        device.gen_texture(&TextureStorage {
            target: TextureTarget::Texture2D,
            format: PixelFormat::R8G8B8A8,
            width,
            height,
            depth: 1,
            mips: 1,
        })
    }

    #[test]
    fn test_window_clear_with_scissor() {
        let device = SoftDevice::new(8, 8);

        device.clear_buffer_colour(0, Colour::new(1.0, 0.0, 0.0, 1.0));
        device.set_capability(Capability::ScissorTest, true);
        // Bottom-left quarter in GL coordinates, bottom-left in the image too.
        device.scissor(IntRect::new(0, 0, 4, 4));
        device.clear_buffer_colour(0, Colour::new(0.0, 1.0, 0.0, 1.0));

        let image = device.window_image();
        assert_eq!(image.pixel(0, 7), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(image.pixel(0, 0), [1.0, 0.0, 0.0, 1.0]);
        assert!(image.area_is(IntRect::new(0, 4, 4, 4), [0.0, 1.0, 0.0, 1.0]));
        assert!(image.area_is(IntRect::new(4, 0, 4, 8), [1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_framebuffer_completeness() {
        let device = SoftDevice::new(8, 8);
        let small = colour_texture(&device, 4, 4);
        let large = colour_texture(&device, 8, 8);

        let fbo = device.gen_framebuffer();
        device.bind_framebuffer(FramebufferTarget::Both, Some(fbo));
        assert_eq!(device.check_framebuffer_status(), FramebufferStatus::MissingAttachment);

        device.framebuffer_texture_2d(Attachment::Colour(0), TextureImageTarget::Texture2D, small, 0);
        assert_eq!(device.check_framebuffer_status(), FramebufferStatus::Complete);

        device.framebuffer_texture_2d(Attachment::Colour(1), TextureImageTarget::Texture2D, large, 0);
        assert_eq!(device.check_framebuffer_status(), FramebufferStatus::IncompleteDimensions);

        device.framebuffer_texture_2d(Attachment::Depth, TextureImageTarget::Texture2D, small, 0);
        device.framebuffer_texture_2d(Attachment::Colour(1), TextureImageTarget::Texture2D, small, 0);
        assert_eq!(device.check_framebuffer_status(), FramebufferStatus::IncompleteAttachment);
    }

    #[test]
    fn test_texture_upload_and_mipmap() {
        let device = SoftDevice::new(8, 8);
        let texture = device.gen_texture(&TextureStorage {
            target: TextureTarget::Texture2D,
            format: PixelFormat::R8G8B8A8,
            width: 2,
            height: 2,
            depth: 1,
            mips: 2,
        });

        device.bind_texture(TextureTarget::Texture2D, Some(texture));
        let data = [255, 0, 0, 255, 255, 0, 0, 255, 0, 0, 255, 255, 0, 0, 255, 255];
        device.tex_sub_image(TextureTarget::Texture2D, 0, 0, &IntBox::new(0, 0, 0, 2, 2, 1), &data);
        device.generate_mipmap(TextureTarget::Texture2D);

        let top = device.texture_image(texture, 0, 0).unwrap();
        assert_eq!(top.get(0, 0), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(top.get(1, 1), [0.0, 0.0, 1.0, 1.0]);

        let mip = device.texture_image(texture, 1, 0).unwrap();
        assert_eq!(mip.get(0, 0), [0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_depth_clear_respects_depth_mask() {
        let device = SoftDevice::new(8, 8);
        let depth = device.gen_texture(&TextureStorage {
            target: TextureTarget::Texture2D,
            format: PixelFormat::Depth32,
            width: 4,
            height: 4,
            depth: 1,
            mips: 1,
        });

        let fbo = device.gen_framebuffer();
        device.bind_framebuffer(FramebufferTarget::Both, Some(fbo));
        device.framebuffer_texture_2d(Attachment::Depth, TextureImageTarget::Texture2D, depth, 0);

        device.depth_mask(false);
        device.clear_buffer_depth(1.0);
        assert_eq!(device.texture_image(depth, 0, 0).unwrap().get(0, 0)[0], 0.0);

        device.depth_mask(true);
        device.clear_buffer_depth(1.0);
        assert_eq!(device.texture_image(depth, 0, 0).unwrap().get(3, 3)[0], 1.0);
    }

    #[test]
    fn test_attachment_target_mismatch() {
        let device = SoftDevice::new(8, 8);
        let array = device.gen_texture(&TextureStorage {
            target: TextureTarget::Texture2DArray,
            format: PixelFormat::R8G8B8A8,
            width: 4,
            height: 4,
            depth: 3,
            mips: 1,
        });

        let fbo = device.gen_framebuffer();
        device.bind_framebuffer(FramebufferTarget::Both, Some(fbo));

        // Array layers must be attached through the layer entry point.
        device.framebuffer_texture_2d(Attachment::Colour(0), TextureImageTarget::Texture2D, array, 0);
        assert_eq!(device.check_framebuffer_status(), FramebufferStatus::MissingAttachment);

        device.framebuffer_texture_layer(Attachment::Colour(0), array, 0, 2);
        assert_eq!(device.check_framebuffer_status(), FramebufferStatus::Complete);

        device.clear_buffer_colour(0, Colour::new(0.0, 1.0, 0.0, 1.0));
        assert_eq!(device.texture_image(array, 0, 2).unwrap().get(0, 0), [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(device.texture_image(array, 0, 0).unwrap().get(0, 0), [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_texture_view_shares_storage() {
        let device = SoftDevice::new(8, 8);
        let cube = device.gen_texture(&TextureStorage {
            target: TextureTarget::CubeMap,
            format: PixelFormat::R8G8B8A8,
            width: 2,
            height: 2,
            depth: 1,
            mips: 1,
        });

        let face = device.gen_texture_view(
            cube,
            &TextureViewRange {
                target: TextureTarget::Texture2D,
                format: PixelFormat::R8G8B8A8,
                base_mip: 0,
                mips: 1,
                base_layer: 3,
                layers: 1,
            },
        );
        assert_eq!(device.texture_count(), 2);
        assert_eq!(device.storage_count(), 1);

        device.bind_texture(TextureTarget::CubeMap, Some(cube));
        let data = [255u8; 16];
        device.tex_sub_image(TextureTarget::CubeMap, 0, 3, &IntBox::new(0, 0, 0, 2, 2, 1), &data);

        // The storage outlives the texture it was created for.
        device.delete_texture(cube);
        assert_eq!(device.storage_count(), 1);
        assert_eq!(device.texture_image(face, 0, 0).unwrap().get(1, 1), [1.0, 1.0, 1.0, 1.0]);
        assert!(device.texture_image(face, 0, 1).is_none());

        device.delete_texture(face);
        assert_eq!(device.storage_count(), 0);
    }

    #[test]
    fn test_timestamps_increase() {
        let device = SoftDevice::new(8, 8);
        let queries = device.gen_queries(3);
        assert_eq!(device.query_count(), 3);

        device.query_counter(queries[2]);
        device.query_counter(queries[0]);
        device.query_counter(queries[1]);

        let results: Vec<u64> = queries.iter().map(|&query| device.query_result(query)).collect();
        assert!(results[2] < results[0]);
        assert!(results[0] < results[1]);

        device.delete_queries(&queries);
        assert_eq!(device.query_count(), 0);
    }

    #[test]
    fn test_unwritten_query_result() {
        let device = SoftDevice::new(8, 8);
        let queries = device.gen_queries(1);

        assert_eq!(device.query_result(queries[0]), 0);
    }

    #[test]
    fn test_call_counting() {
        let device = SoftDevice::new(8, 8);
        let handle = device.clone();

        device.viewport(IntRect::new(0, 0, 4, 4));
        device.viewport(IntRect::new(0, 0, 4, 4));
        device.set_capability(Capability::Blend, true);

        assert_eq!(handle.call_count("viewport"), 2);
        assert_eq!(handle.call_count("enable"), 1);
        assert_eq!(handle.total_calls(), 3);

        handle.reset_call_counts();
        assert_eq!(device.total_calls(), 0);
    }

    #[test]
    fn test_program_creation_failure() {
        let device = SoftDevice::new(8, 8);

        let error = device.create_program(ShaderStage::Vertex, "broken.vert", &[]).unwrap_err();
        assert!(error.contains("broken.vert"));
        assert!(device.create_program(ShaderStage::Vertex, "ok.vert", &[0x0723_0203]).is_ok());
    }
}
