//! Pixel format definitions

use serde::{Deserialize, Serialize};

/// Format of pixels in a texture or render target
///
/// Colour formats are named in the order of their components in memory,
/// independent of endianness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Unknown format, also used to mark an unused attachment
    #[default]
    Unknown,

    /// RGBA, unsigned normalized, 8 bits per component
    R8G8B8A8,
    /// RGBA, unsigned normalized, 8 bits per component, sRGB
    R8G8B8A8Srgb,
    /// RG, unsigned normalized, 8 bits per component
    R8G8,
    /// R, unsigned normalized, 8 bits
    R8,
    /// BGRA, unsigned normalized, 8 bits per component
    B8G8R8A8,
    /// BGRA, unsigned normalized, 8 bits per component, sRGB
    B8G8R8A8Srgb,
    /// RGBA, unsigned normalized, 10 bits RGB, 2 bits A
    R10G10B10A2,
    /// RGBA, float, 16 bits per component
    FloatR16G16B16A16,
    /// RGB, float, 16 bits per component
    FloatR16G16B16,
    /// RG, float, 16 bits per component
    FloatR16G16,
    /// R, float, 16 bits
    FloatR16,
    /// RGBA, float, 32 bits per component
    FloatR32G32B32A32,
    /// RGB, float, 32 bits per component
    FloatR32G32B32,
    /// RG, float, 32 bits per component
    FloatR32G32,
    /// R, float, 32 bits
    FloatR32,

    /// Depth, 16 bits
    Depth16,
    /// Depth, 32 bits
    Depth32,
    /// Depth 32 bits with 8 bits of stencil
    Depth32Stencil8,
}

impl PixelFormat {
    /// Whether this is a colour format
    pub const fn is_colour(self) -> bool {
        !matches!(self, Self::Unknown) && !self.is_depth()
    }

    /// Whether this is a depth (or depth/stencil) format
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth16 | Self::Depth32 | Self::Depth32Stencil8)
    }

    /// Whether this is a combined depth/stencil format
    pub const fn is_depth_stencil(self) -> bool {
        matches!(self, Self::Depth32Stencil8)
    }

    /// Whether this is an sRGB colour format
    pub const fn is_srgb(self) -> bool {
        matches!(self, Self::R8G8B8A8Srgb | Self::B8G8R8A8Srgb)
    }

    /// Whether this is a floating point colour format
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::FloatR16G16B16A16
                | Self::FloatR16G16B16
                | Self::FloatR16G16
                | Self::FloatR16
                | Self::FloatR32G32B32A32
                | Self::FloatR32G32B32
                | Self::FloatR32G32
                | Self::FloatR32
        )
    }

    /// Number of components stored per pixel
    pub const fn components(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::R8 | Self::FloatR16 | Self::FloatR32 | Self::Depth16 | Self::Depth32 => 1,
            Self::R8G8 | Self::FloatR16G16 | Self::FloatR32G32 | Self::Depth32Stencil8 => 2,
            Self::FloatR16G16B16 | Self::FloatR32G32B32 => 3,
            Self::R8G8B8A8
            | Self::R8G8B8A8Srgb
            | Self::B8G8R8A8
            | Self::B8G8R8A8Srgb
            | Self::R10G10B10A2
            | Self::FloatR16G16B16A16
            | Self::FloatR32G32B32A32 => 4,
        }
    }

    /// Size of a single pixel in bytes
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::R8 => 1,
            Self::R8G8 | Self::FloatR16 | Self::Depth16 => 2,
            Self::FloatR16G16B16 => 6,
            Self::R8G8B8A8
            | Self::R8G8B8A8Srgb
            | Self::B8G8R8A8
            | Self::B8G8R8A8Srgb
            | Self::R10G10B10A2
            | Self::FloatR16G16
            | Self::FloatR32
            | Self::Depth32 => 4,
            Self::FloatR16G16B16A16 | Self::FloatR32G32 | Self::Depth32Stencil8 => 8,
            Self::FloatR32G32B32 => 12,
            Self::FloatR32G32B32A32 => 16,
        }
    }

    /// sRGB variant of a format, or the format itself if it has none
    pub const fn srgb_equivalent(self) -> Self {
        match self {
            Self::R8G8B8A8 => Self::R8G8B8A8Srgb,
            Self::B8G8R8A8 => Self::B8G8R8A8Srgb,
            other => other,
        }
    }

    /// Linear variant of an sRGB format, or the format itself
    pub const fn non_srgb_equivalent(self) -> Self {
        match self {
            Self::R8G8B8A8Srgb => Self::R8G8B8A8,
            Self::B8G8R8A8Srgb => Self::B8G8R8A8,
            other => other,
        }
    }
}
