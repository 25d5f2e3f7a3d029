//! Shader parameter type information
//!
//! Every value that can be placed in a uniform structure has a
//! [`ShaderParameterType`] giving its storage size and uniform buffer
//! alignment. Rust types usable as member values implement
//! [`ShaderParameterValue`].

use bytemuck::Pod;

use crate::fatal;
use crate::foundation::math::{IVec2, IVec3, IVec4, Mat2, Mat3, Mat4, Vec2, Vec3, Vec4};

/// Type of a shader parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderParameterType {
    /// Signed 32-bit integer
    Int,
    /// Unsigned 32-bit integer
    UnsignedInt,
    /// Single precision float
    Float,
    /// 2 component float vector
    Vec2,
    /// 3 component float vector
    Vec3,
    /// 4 component float vector
    Vec4,
    /// 2x2 float matrix
    Mat2,
    /// 3x3 float matrix
    Mat3,
    /// 4x4 float matrix
    Mat4,
    /// 2 component integer vector
    IntVec2,
    /// 3 component integer vector
    IntVec3,
    /// 4 component integer vector
    IntVec4,
    /// 2D texture
    Texture2D,
    /// Cube texture
    TextureCube,
}

impl ShaderParameterType {
    /// Whether the type is a texture, which cannot live in a uniform buffer
    pub const fn is_texture(self) -> bool {
        matches!(self, Self::Texture2D | Self::TextureCube)
    }

    /// Storage size of the type in bytes
    ///
    /// Textures have no storage size; asking for one is fatal.
    pub fn size(self) -> usize {
        match self {
            Self::Int | Self::UnsignedInt | Self::Float => 4,
            Self::Vec2 | Self::IntVec2 => 8,
            Self::Vec3 | Self::IntVec3 => 12,
            Self::Vec4 | Self::IntVec4 | Self::Mat2 => 16,
            Self::Mat3 => 36,
            Self::Mat4 => 64,
            Self::Texture2D | Self::TextureCube => fatal!("Texture parameters have no storage size"),
        }
    }

    /// Alignment of the type within a uniform buffer
    pub fn alignment(self) -> usize {
        match self {
            Self::Int | Self::UnsignedInt | Self::Float => 4,
            Self::Vec2 | Self::IntVec2 | Self::Mat2 => 8,
            Self::Vec3 | Self::Vec4 | Self::IntVec3 | Self::IntVec4 | Self::Mat3 | Self::Mat4 => 16,
            Self::Texture2D | Self::TextureCube => fatal!("Texture parameters have no alignment"),
        }
    }

    /// GLSL spelling of the type
    pub const fn glsl_type(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::UnsignedInt => "uint",
            Self::Float => "float",
            Self::Vec2 => "vec2",
            Self::Vec3 => "vec3",
            Self::Vec4 => "vec4",
            Self::Mat2 => "mat2",
            Self::Mat3 => "mat3",
            Self::Mat4 => "mat4",
            Self::IntVec2 => "ivec2",
            Self::IntVec3 => "ivec3",
            Self::IntVec4 => "ivec4",
            Self::Texture2D => "sampler2D",
            Self::TextureCube => "samplerCube",
        }
    }
}

/// A Rust type that can be stored as a uniform structure member
pub trait ShaderParameterValue: Pod {
    /// Parameter type the value is stored as
    const TYPE: ShaderParameterType;
}

macro_rules! impl_shader_parameter_value {
    ($($rust:ty => $param:ident),+ $(,)?) => {
        $(
            impl ShaderParameterValue for $rust {
                const TYPE: ShaderParameterType = ShaderParameterType::$param;
            }
        )+
    };
}

impl_shader_parameter_value! {
    i32 => Int,
    u32 => UnsignedInt,
    f32 => Float,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat2 => Mat2,
    Mat3 => Mat3,
    Mat4 => Mat4,
    IVec2 => IntVec2,
    IVec3 => IntVec3,
    IVec4 => IntVec4,
}
