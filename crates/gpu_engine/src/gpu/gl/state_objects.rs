//! Native data for GL state objects
//!
//! Blend and depth/stencil states precompute the GL state they translate to.
//! Sampler states own a GL sampler object. Rasterizer states are applied
//! straight from their descriptor.

use std::rc::Rc;

use super::device::{SamplerName, SamplerParams};
use super::GlContext;
use crate::gpu::defs::{BlendFactor, BlendFunc, ComparisonFunc, SamplerFilterMode};
use crate::gpu::state::{GpuBlendStateDesc, GpuDepthStencilStateDesc, GpuSamplerStateDesc};

/// Native data of a blend state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlBlendState {
    /// Whether blending is enabled at all
    pub enable: bool,
    /// Blend equation
    pub func: BlendFunc,
    /// Source factor
    pub source_factor: BlendFactor,
    /// Destination factor
    pub dest_factor: BlendFactor,
}

impl GlBlendState {
    /// Translate a blend state descriptor
    ///
    /// Blending is left disabled for the pass-through configuration.
    pub fn new(desc: &GpuBlendStateDesc) -> Self {
        Self {
            enable: !desc.is_passthrough(),
            func: desc.func,
            source_factor: desc.source_factor,
            dest_factor: desc.dest_factor,
        }
    }
}

/// Native data of a depth/stencil state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlDepthStencilState {
    /// Whether the depth test is enabled
    pub depth_enable: bool,
    /// Depth comparison function
    pub depth_func: ComparisonFunc,
    /// Whether depth writes are enabled
    pub depth_write: bool,
}

impl GlDepthStencilState {
    /// Translate a depth/stencil state descriptor
    ///
    /// With the test disabled GL also skips depth writes, so the test stays
    /// enabled whenever writes are wanted, even if the function is `Always`.
    pub const fn new(desc: &GpuDepthStencilStateDesc) -> Self {
        Self {
            depth_enable: !matches!(desc.depth_func, ComparisonFunc::Always) || desc.depth_write,
            depth_func: desc.depth_func,
            depth_write: desc.depth_write,
        }
    }
}

/// Native data of a sampler state
pub struct GlSampler {
    context: Rc<GlContext>,
    name: SamplerName,
}

impl GlSampler {
    pub(super) fn new(context: &Rc<GlContext>, desc: &GpuSamplerStateDesc) -> Self {
        let max_anisotropy = match desc.filter_mode {
            SamplerFilterMode::Anisotropic => desc.max_anisotropy.clamp(1, context.device.max_anisotropy()),
            _ => 1,
        };

        let name = context.device.gen_sampler(&SamplerParams {
            wrap: [desc.address_u, desc.address_v, desc.address_w],
            filter: desc.filter_mode,
            max_anisotropy,
            compare: desc.compare_enable.then_some(desc.compare_func),
        });

        Self {
            context: Rc::clone(context),
            name,
        }
    }

    /// Native sampler name
    pub const fn name(&self) -> SamplerName {
        self.name
    }
}

impl Drop for GlSampler {
    fn drop(&mut self) {
        self.context.state.borrow_mut().invalidate_sampler(self.name);
        self.context.device.delete_sampler(self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_blend_is_disabled() {
        assert!(!GlBlendState::new(&GpuBlendStateDesc::default()).enable);

        let additive = GpuBlendStateDesc::default().with_dest_factor(BlendFactor::One);
        let state = GlBlendState::new(&additive);
        assert!(state.enable);
        assert_eq!(state.dest_factor, BlendFactor::One);
    }

    #[test]
    fn test_depth_test_kept_for_writes() {
        let always_write = GpuDepthStencilStateDesc::default().with_depth_func(ComparisonFunc::Always);
        assert!(GlDepthStencilState::new(&always_write).depth_enable);

        let disabled = always_write.with_depth_write(false);
        assert!(!GlDepthStencilState::new(&disabled).depth_enable);

        let less = GpuDepthStencilStateDesc::default()
            .with_depth_func(ComparisonFunc::Less)
            .with_depth_write(false);
        assert!(GlDepthStencilState::new(&less).depth_enable);
    }
}
