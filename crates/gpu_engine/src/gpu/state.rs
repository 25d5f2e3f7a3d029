//! GPU state objects
//!
//! A state object is an immutable GPU object fully described by a value-type
//! descriptor. The [`GpuManager`](super::GpuManager) caches blend,
//! depth/stencil, rasterizer, sampler and vertex layout states by descriptor
//! so that every distinct configuration maps to exactly one object. Identity
//! of a cached object can be compared with [`Rc::ptr_eq`](std::rc::Rc::ptr_eq).
//!
//! Backends attach their own data to a state object (e.g. a native sampler
//! handle or pre-converted native enums) through the `native` slot.

use std::any::Any;
use std::fmt;

use super::defs::{
    BlendFactor, BlendFunc, ComparisonFunc, CullMode, SamplerAddressMode, SamplerFilterMode,
};

/// A GPU object identified by a descriptor
///
/// The descriptor is owned by value and never mutated after construction.
pub struct GpuState<D> {
    desc: D,
    native: Option<Box<dyn Any>>,
}

impl<D> GpuState<D> {
    /// Create a state object with no backend data
    pub fn new(desc: D) -> Self {
        Self { desc, native: None }
    }

    /// Create a state object carrying backend-specific data
    pub fn with_native<T: Any>(desc: D, native: T) -> Self {
        Self {
            desc,
            native: Some(Box::new(native)),
        }
    }

    /// Descriptor the object was created from
    pub const fn desc(&self) -> &D {
        &self.desc
    }

    /// Backend-specific data, if the object carries data of type `T`
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_ref()?.downcast_ref::<T>()
    }
}

impl<D: fmt::Debug> fmt::Debug for GpuState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuState")
            .field("desc", &self.desc)
            .field("native", &self.native.is_some())
            .finish()
    }
}

/// Descriptor for blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBlendStateDesc {
    /// Colour blend function
    pub func: BlendFunc,
    /// Source colour factor
    pub source_factor: BlendFactor,
    /// Destination colour factor
    pub dest_factor: BlendFactor,
    /// Alpha blend function
    pub alpha_func: BlendFunc,
    /// Source alpha factor
    pub source_alpha_factor: BlendFactor,
    /// Destination alpha factor
    pub dest_alpha_factor: BlendFactor,
}

impl Default for GpuBlendStateDesc {
    fn default() -> Self {
        Self {
            func: BlendFunc::Add,
            source_factor: BlendFactor::One,
            dest_factor: BlendFactor::Zero,
            alpha_func: BlendFunc::Add,
            source_alpha_factor: BlendFactor::One,
            dest_alpha_factor: BlendFactor::Zero,
        }
    }
}

impl GpuBlendStateDesc {
    /// Set the colour blend function
    pub const fn with_func(mut self, func: BlendFunc) -> Self {
        self.func = func;
        self
    }

    /// Set the source colour factor
    pub const fn with_source_factor(mut self, factor: BlendFactor) -> Self {
        self.source_factor = factor;
        self
    }

    /// Set the destination colour factor
    pub const fn with_dest_factor(mut self, factor: BlendFactor) -> Self {
        self.dest_factor = factor;
        self
    }

    /// Set the alpha blend function
    pub const fn with_alpha_func(mut self, func: BlendFunc) -> Self {
        self.alpha_func = func;
        self
    }

    /// Set the source alpha factor
    pub const fn with_source_alpha_factor(mut self, factor: BlendFactor) -> Self {
        self.source_alpha_factor = factor;
        self
    }

    /// Set the destination alpha factor
    pub const fn with_dest_alpha_factor(mut self, factor: BlendFactor) -> Self {
        self.dest_alpha_factor = factor;
        self
    }

    /// Whether this configuration replaces the destination unchanged
    pub fn is_passthrough(&self) -> bool {
        *self == Self::default()
    }
}

/// Descriptor for depth/stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuDepthStencilStateDesc {
    /// Depth comparison function
    pub depth_func: ComparisonFunc,
    /// Whether depth buffer writes are enabled
    pub depth_write: bool,
}

impl Default for GpuDepthStencilStateDesc {
    fn default() -> Self {
        Self {
            depth_func: ComparisonFunc::LessOrEqual,
            depth_write: true,
        }
    }
}

impl GpuDepthStencilStateDesc {
    /// Set the depth comparison function
    pub const fn with_depth_func(mut self, func: ComparisonFunc) -> Self {
        self.depth_func = func;
        self
    }

    /// Set whether depth writes are enabled
    pub const fn with_depth_write(mut self, write: bool) -> Self {
        self.depth_write = write;
        self
    }
}

/// Descriptor for rasterizer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuRasterizerStateDesc {
    /// Face culling mode
    pub cull_mode: CullMode,
    /// Whether depth clamping is enabled
    pub depth_clamp: bool,
}

impl GpuRasterizerStateDesc {
    /// Set the face culling mode
    pub const fn with_cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Set whether depth clamping is enabled
    pub const fn with_depth_clamp(mut self, clamp: bool) -> Self {
        self.depth_clamp = clamp;
        self
    }
}

/// Descriptor for sampler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuSamplerStateDesc {
    /// Filtering mode
    pub filter_mode: SamplerFilterMode,
    /// Maximum anisotropy, only used with anisotropic filtering
    pub max_anisotropy: u32,
    /// Addressing mode in the U direction
    pub address_u: SamplerAddressMode,
    /// Addressing mode in the V direction
    pub address_v: SamplerAddressMode,
    /// Addressing mode in the W direction
    pub address_w: SamplerAddressMode,
    /// Whether depth comparison is enabled
    pub compare_enable: bool,
    /// Depth comparison function
    pub compare_func: ComparisonFunc,
}

impl Default for GpuSamplerStateDesc {
    fn default() -> Self {
        Self {
            filter_mode: SamplerFilterMode::Nearest,
            max_anisotropy: 1,
            address_u: SamplerAddressMode::Clamp,
            address_v: SamplerAddressMode::Clamp,
            address_w: SamplerAddressMode::Clamp,
            compare_enable: false,
            compare_func: ComparisonFunc::Always,
        }
    }
}

impl GpuSamplerStateDesc {
    /// Set the filtering mode
    pub const fn with_filter_mode(mut self, mode: SamplerFilterMode) -> Self {
        self.filter_mode = mode;
        self
    }

    /// Set the maximum anisotropy
    pub const fn with_max_anisotropy(mut self, anisotropy: u32) -> Self {
        self.max_anisotropy = anisotropy;
        self
    }

    /// Set the addressing mode for all three directions
    pub const fn with_address_mode(mut self, mode: SamplerAddressMode) -> Self {
        self.address_u = mode;
        self.address_v = mode;
        self.address_w = mode;
        self
    }

    /// Enable depth comparison with the given function
    pub const fn with_compare(mut self, func: ComparisonFunc) -> Self {
        self.compare_enable = true;
        self.compare_func = func;
        self
    }
}

/// Blend state object
pub type GpuBlendState = GpuState<GpuBlendStateDesc>;
/// Depth/stencil state object
pub type GpuDepthStencilState = GpuState<GpuDepthStencilStateDesc>;
/// Rasterizer state object
pub type GpuRasterizerState = GpuState<GpuRasterizerStateDesc>;
/// Sampler state object
pub type GpuSamplerState = GpuState<GpuSamplerStateDesc>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_default_descriptors() {
        let blend = GpuBlendStateDesc::default();
        assert_eq!(blend.func, BlendFunc::Add);
        assert_eq!(blend.source_factor, BlendFactor::One);
        assert_eq!(blend.dest_alpha_factor, BlendFactor::Zero);
        assert!(blend.is_passthrough());

        let depth = GpuDepthStencilStateDesc::default();
        assert_eq!(depth.depth_func, ComparisonFunc::LessOrEqual);
        assert!(depth.depth_write);

        let raster = GpuRasterizerStateDesc::default();
        assert_eq!(raster.cull_mode, CullMode::Back);
        assert!(!raster.depth_clamp);

        let sampler = GpuSamplerStateDesc::default();
        assert_eq!(sampler.filter_mode, SamplerFilterMode::Nearest);
        assert_eq!(sampler.max_anisotropy, 1);
        assert_eq!(sampler.compare_func, ComparisonFunc::Always);
    }

    #[test]
    fn test_equal_descriptors_hash_equal() {
        let a = GpuBlendStateDesc::default()
            .with_source_factor(BlendFactor::SourceAlpha)
            .with_dest_factor(BlendFactor::OneMinusSourceAlpha);
        let b = GpuBlendStateDesc::default()
            .with_dest_factor(BlendFactor::OneMinusSourceAlpha)
            .with_source_factor(BlendFactor::SourceAlpha);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert!(!a.is_passthrough());
    }

    #[test]
    fn test_native_data_downcast() {
        let state = GpuState::with_native(GpuRasterizerStateDesc::default(), 42_u32);

        assert_eq!(state.native::<u32>(), Some(&42));
        assert_eq!(state.native::<i64>(), None);
        assert!(GpuState::new(GpuRasterizerStateDesc::default()).native::<u32>().is_none());
    }
}
