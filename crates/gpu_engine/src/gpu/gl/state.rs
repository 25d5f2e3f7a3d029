//! GL state cache
//!
//! Every state change and binding made by the backend goes through
//! [`GlState`], which remembers the last value set and only calls into the
//! device when the requested value differs. The initial values are the GL
//! defaults.

use std::collections::HashSet;
use std::rc::Rc;

use super::device::{
    BufferName, BufferTarget, Capability, FramebufferName, FramebufferTarget, GlDevice, PipelineName, SamplerName,
    TextureName, TextureTarget, VertexArrayName,
};
use crate::check_msg;
use crate::foundation::math::IntRect;
use crate::gpu::defs::{BlendFactor, BlendFunc, ComparisonFunc, CullMode};

#[derive(Debug, Clone, Copy, Default)]
struct TextureUnit {
    texture: Option<(TextureTarget, TextureName)>,
    sampler: Option<SamplerName>,
}

/// Cached GL state
pub struct GlState {
    device: Rc<dyn GlDevice>,
    enabled: HashSet<Capability>,
    blend_equation: BlendFunc,
    blend_factors: (BlendFactor, BlendFactor),
    depth_write: bool,
    depth_func: ComparisonFunc,
    cull_face: CullMode,
    viewport: Option<IntRect>,
    scissor: Option<IntRect>,
    draw_framebuffer: Option<FramebufferName>,
    read_framebuffer: Option<FramebufferName>,
    buffers: [Option<BufferName>; BufferTarget::COUNT],
    pipeline: Option<PipelineName>,
    active_texture: u32,
    texture_units: Vec<TextureUnit>,
    vertex_array: Option<VertexArrayName>,
    default_vertex_array: VertexArrayName,
}

impl GlState {
    /// Create the state cache for a freshly initialized device
    ///
    /// The default vertex array is created and bound here. Element array
    /// buffer bindings made outside of a draw are made on it so that the
    /// per-object vertex arrays are never modified.
    pub fn new(device: Rc<dyn GlDevice>) -> Self {
        let default_vertex_array = device.gen_vertex_array();
        device.bind_vertex_array(default_vertex_array);

        let units = usize::try_from(device.max_texture_units()).unwrap_or(0);

        Self {
            device,
            enabled: HashSet::new(),
            blend_equation: BlendFunc::Add,
            blend_factors: (BlendFactor::One, BlendFactor::Zero),
            depth_write: true,
            depth_func: ComparisonFunc::Less,
            cull_face: CullMode::Back,
            viewport: None,
            scissor: None,
            draw_framebuffer: None,
            read_framebuffer: None,
            buffers: [None; BufferTarget::COUNT],
            pipeline: None,
            active_texture: 0,
            texture_units: vec![TextureUnit::default(); units],
            vertex_array: Some(default_vertex_array),
            default_vertex_array,
        }
    }

    /// Device the state is cached for
    pub fn device(&self) -> &Rc<dyn GlDevice> {
        &self.device
    }

    /// Number of texture units
    pub fn texture_unit_count(&self) -> u32 {
        u32::try_from(self.texture_units.len()).unwrap_or(u32::MAX)
    }

    /// Enable or disable a capability
    pub fn enable(&mut self, capability: Capability, enable: bool) {
        if self.enabled.contains(&capability) != enable {
            self.device.set_capability(capability, enable);

            if enable {
                self.enabled.insert(capability);
            } else {
                self.enabled.remove(&capability);
            }
        }
    }

    /// Whether a capability is enabled
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    /// Set the viewport, bottom-left origin
    pub fn set_viewport(&mut self, viewport: IntRect) {
        if self.viewport != Some(viewport) {
            self.device.viewport(viewport);
            self.viewport = Some(viewport);
        }
    }

    /// Set the scissor rectangle, bottom-left origin
    pub fn set_scissor(&mut self, scissor: IntRect) {
        if self.scissor != Some(scissor) {
            self.device.scissor(scissor);
            self.scissor = Some(scissor);
        }
    }

    /// Set the blend equation
    pub fn set_blend_equation(&mut self, func: BlendFunc) {
        if self.blend_equation != func {
            self.device.blend_equation(func);
            self.blend_equation = func;
        }
    }

    /// Set the blend factors
    pub fn set_blend_func(&mut self, source: BlendFactor, dest: BlendFactor) {
        if self.blend_factors != (source, dest) {
            self.device.blend_func(source, dest);
            self.blend_factors = (source, dest);
        }
    }

    /// Enable or disable depth buffer writes
    pub fn set_depth_write(&mut self, write: bool) {
        if self.depth_write != write {
            self.device.depth_mask(write);
            self.depth_write = write;
        }
    }

    /// Set the depth comparison function
    pub fn set_depth_func(&mut self, func: ComparisonFunc) {
        if self.depth_func != func {
            self.device.depth_func(func);
            self.depth_func = func;
        }
    }

    /// Set the face culling mode
    pub fn set_cull_face(&mut self, mode: CullMode) {
        if self.cull_face != mode {
            self.device.cull_face(mode);
            self.cull_face = mode;
        }
    }

    /// Bind a framebuffer, `None` being the default framebuffer
    ///
    /// Drivers apply sRGB conversion to the default framebuffer even when it
    /// is not in an sRGB format, so sRGB writes are only enabled while an
    /// off-screen framebuffer is bound for drawing.
    pub fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<FramebufferName>) {
        if matches!(target, FramebufferTarget::Both | FramebufferTarget::Draw) {
            if framebuffer.is_none() && self.draw_framebuffer.is_some() {
                self.enable(Capability::FramebufferSrgb, false);
            } else if framebuffer.is_some() && self.draw_framebuffer.is_none() {
                self.enable(Capability::FramebufferSrgb, true);
            }
        }

        let changed = match target {
            FramebufferTarget::Both => self.draw_framebuffer != framebuffer || self.read_framebuffer != framebuffer,
            FramebufferTarget::Draw => self.draw_framebuffer != framebuffer,
            FramebufferTarget::Read => self.read_framebuffer != framebuffer,
        };

        if changed {
            self.device.bind_framebuffer(target, framebuffer);

            if target != FramebufferTarget::Read {
                self.draw_framebuffer = framebuffer;
            }
            if target != FramebufferTarget::Draw {
                self.read_framebuffer = framebuffer;
            }
        }
    }

    /// Currently bound draw framebuffer
    pub const fn draw_framebuffer(&self) -> Option<FramebufferName> {
        self.draw_framebuffer
    }

    /// Currently bound read framebuffer
    pub const fn read_framebuffer(&self) -> Option<FramebufferName> {
        self.read_framebuffer
    }

    /// Bind a buffer to a target
    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: BufferName) {
        // The element array binding is part of vertex array state.
        if target == BufferTarget::ElementArray {
            let default = self.default_vertex_array;
            self.bind_vertex_array(default);
        }

        if self.buffers[target.index()] != Some(buffer) {
            self.device.bind_buffer(target, Some(buffer));
            self.buffers[target.index()] = Some(buffer);
        }
    }

    /// Bind a buffer to an indexed binding point
    ///
    /// This also binds to the generic binding point of the target.
    pub fn bind_buffer_base(&mut self, target: BufferTarget, index: u32, buffer: BufferName) {
        self.device.bind_buffer_base(target, index, buffer);
        self.buffers[target.index()] = Some(buffer);
    }

    /// Bind a program pipeline
    pub fn bind_pipeline(&mut self, pipeline: PipelineName) {
        if self.pipeline != Some(pipeline) {
            self.device.bind_program_pipeline(Some(pipeline));
            self.pipeline = Some(pipeline);
        }
    }

    /// Bind a texture to a texture unit
    ///
    /// Only one texture is bound to a unit at a time. If the unit has a
    /// texture bound to another target, that target is unbound first.
    pub fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: TextureName) {
        check_msg!(
            unit < self.texture_unit_count(),
            "GL: Texture unit {} out of range ({} units)",
            unit,
            self.texture_unit_count()
        );

        let Some(state) = self.texture_units.get(unit as usize).copied() else {
            return;
        };

        if state.texture != Some((target, texture)) {
            self.set_active_texture(unit);

            if let Some((bound_target, _)) = state.texture {
                if bound_target != target {
                    self.device.bind_texture(bound_target, None);
                }
            }

            self.device.bind_texture(target, Some(texture));
            self.texture_units[unit as usize].texture = Some((target, texture));
        }
    }

    /// Make a texture unit active
    ///
    /// Texture modification acts on the active unit, so callers binding a
    /// texture to modify it must also make its unit active.
    pub fn set_active_texture(&mut self, unit: u32) {
        if self.active_texture != unit {
            self.device.active_texture(unit);
            self.active_texture = unit;
        }
    }

    /// Bind a sampler to a texture unit
    pub fn bind_sampler(&mut self, unit: u32, sampler: SamplerName) {
        check_msg!(
            unit < self.texture_unit_count(),
            "GL: Sampler unit {} out of range ({} units)",
            unit,
            self.texture_unit_count()
        );

        let Some(state) = self.texture_units.get_mut(unit as usize) else {
            return;
        };

        if state.sampler != Some(sampler) {
            self.device.bind_sampler(unit, Some(sampler));
            state.sampler = Some(sampler);
        }
    }

    /// Bind a vertex array
    pub fn bind_vertex_array(&mut self, array: VertexArrayName) {
        if self.vertex_array != Some(array) {
            self.device.bind_vertex_array(array);
            self.vertex_array = Some(array);
        }
    }

    /// The default vertex array
    pub const fn default_vertex_array(&self) -> VertexArrayName {
        self.default_vertex_array
    }

    /// Forget any binding of a buffer being deleted
    pub fn invalidate_buffer(&mut self, buffer: BufferName) {
        for bound in &mut self.buffers {
            if *bound == Some(buffer) {
                *bound = None;
            }
        }
    }

    /// Forget the binding of a pipeline being deleted
    pub fn invalidate_pipeline(&mut self, pipeline: PipelineName) {
        if self.pipeline == Some(pipeline) {
            self.pipeline = None;
        }
    }

    /// Forget any binding of a texture being deleted
    pub fn invalidate_texture(&mut self, texture: TextureName) {
        for unit in &mut self.texture_units {
            if matches!(unit.texture, Some((_, bound)) if bound == texture) {
                unit.texture = None;
            }
        }
    }

    /// Forget any binding of a sampler being deleted
    pub fn invalidate_sampler(&mut self, sampler: SamplerName) {
        for unit in &mut self.texture_units {
            if unit.sampler == Some(sampler) {
                unit.sampler = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::gl::device::TextureStorage;
    use crate::gpu::gl::soft::SoftDevice;
    use crate::gpu::pixel_format::PixelFormat;

    fn state() -> (SoftDevice, GlState) {
        let device = SoftDevice::new(64, 64);
        let state = GlState::new(Rc::new(device.clone()));
        device.reset_call_counts();
        (device, state)
    }

    #[test]
    fn test_redundant_changes_are_filtered() {
        let (device, mut state) = state();

        for _ in 0..3 {
            state.enable(Capability::Blend, true);
            state.set_viewport(IntRect::new(0, 0, 32, 32));
            state.set_depth_func(ComparisonFunc::LessOrEqual);
        }

        assert_eq!(device.call_count("enable"), 1);
        assert_eq!(device.call_count("viewport"), 1);
        assert_eq!(device.call_count("depth_func"), 1);

        // Setting the GL default issues nothing.
        state.set_depth_write(true);
        state.set_cull_face(CullMode::Back);
        assert_eq!(device.call_count("depth_mask"), 0);
        assert_eq!(device.call_count("cull_face"), 0);
    }

    #[test]
    fn test_framebuffer_srgb_toggle() {
        let (device, mut state) = state();
        let fbo = device.gen_framebuffer();

        state.bind_framebuffer(FramebufferTarget::Both, Some(fbo));
        assert!(device.capability_enabled(Capability::FramebufferSrgb));

        state.bind_framebuffer(FramebufferTarget::Read, None);
        assert!(device.capability_enabled(Capability::FramebufferSrgb));
        assert_eq!(state.read_framebuffer(), None);
        assert_eq!(state.draw_framebuffer(), Some(fbo));

        state.bind_framebuffer(FramebufferTarget::Both, None);
        assert!(!device.capability_enabled(Capability::FramebufferSrgb));
        assert_eq!(device.call_count("bind_framebuffer"), 3);
    }

    #[test]
    fn test_texture_unit_target_switch() {
        let (device, mut state) = state();
        let storage = TextureStorage {
            target: TextureTarget::Texture2D,
            format: PixelFormat::R8G8B8A8,
            width: 4,
            height: 4,
            depth: 1,
            mips: 1,
        };
        let flat = device.gen_texture(&storage);
        let cube = device.gen_texture(&TextureStorage {
            target: TextureTarget::CubeMap,
            ..storage
        });
        device.reset_call_counts();

        state.bind_texture(3, TextureTarget::Texture2D, flat);
        state.bind_texture(3, TextureTarget::Texture2D, flat);
        assert_eq!(device.call_count("active_texture"), 1);
        assert_eq!(device.call_count("bind_texture"), 1);

        // Switching target unbinds the old one first.
        state.bind_texture(3, TextureTarget::CubeMap, cube);
        assert_eq!(device.call_count("active_texture"), 1);
        assert_eq!(device.call_count("bind_texture"), 3);
        assert_eq!(device.texture_unit(3).0, Some(cube));
    }

    #[test]
    fn test_element_array_binds_default_vertex_array() {
        let (device, mut state) = state();
        let array = device.gen_vertex_array();
        let buffer = device.gen_buffer();

        state.bind_vertex_array(array);
        state.bind_buffer(BufferTarget::ElementArray, buffer);

        assert_eq!(device.call_count("bind_vertex_array"), 2);
        assert_eq!(device.call_count("bind_buffer"), 1);
    }

    #[test]
    fn test_invalidated_bindings_are_reissued() {
        let (device, mut state) = state();
        let buffer = device.gen_buffer();

        state.bind_buffer(BufferTarget::Uniform, buffer);
        state.invalidate_buffer(buffer);
        state.bind_buffer(BufferTarget::Uniform, buffer);

        assert_eq!(device.call_count("bind_buffer"), 2);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Texture unit 96 out of range")]
    fn test_texture_unit_out_of_range() {
        let (device, mut state) = state();
        let texture = device.gen_texture(&TextureStorage {
            target: TextureTarget::Texture2D,
            format: PixelFormat::R8G8B8A8,
            width: 4,
            height: 4,
            depth: 1,
            mips: 1,
        });

        state.bind_texture(state.texture_unit_count(), TextureTarget::Texture2D, texture);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Sampler unit 200 out of range")]
    fn test_sampler_unit_out_of_range() {
        let (device, mut state) = state();
        let sampler = device.gen_sampler(&crate::gpu::gl::device::SamplerParams {
            wrap: [crate::gpu::defs::SamplerAddressMode::Clamp; 3],
            filter: crate::gpu::defs::SamplerFilterMode::Nearest,
            max_anisotropy: 1,
            compare: None,
        });

        state.bind_sampler(200, sampler);
    }
}
