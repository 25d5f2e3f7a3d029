//! Math utilities and types
//!
//! Provides the vector and matrix types used by uniform data and clear
//! colours, plus the integer rectangles used for viewports, scissors and
//! texture update regions.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 2D integer vector type
pub type IVec2 = Vector2<i32>;

/// 3D integer vector type
pub type IVec3 = Vector3<i32>;

/// 4D integer vector type
pub type IVec4 = Vector4<i32>;

/// 2x2 matrix type
pub type Mat2 = Matrix2<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// RGBA colour with floating point components
pub type Colour = Vec4;

/// Integer rectangle with a top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntRect {
    /// X position of the left edge
    pub x: i32,
    /// Y position of the top edge
    pub y: i32,
    /// Width of the rectangle
    pub width: i32,
    /// Height of the rectangle
    pub height: i32,
}

impl IntRect {
    /// Create a new rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Create a rectangle at the origin covering the given size
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    /// X position one past the right edge
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Y position one past the bottom edge
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely within this rectangle
    pub const fn contains(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Whether the point lies within this rectangle
    pub const fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }
}

/// Integer box, used to address a region of a 3D or layered texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntBox {
    /// X position
    pub x: i32,
    /// Y position
    pub y: i32,
    /// Z position (slice or layer)
    pub z: i32,
    /// Width of the box
    pub width: i32,
    /// Height of the box
    pub height: i32,
    /// Depth of the box
    pub depth: i32,
}

impl IntBox {
    /// Create a new box
    pub const fn new(x: i32, y: i32, z: i32, width: i32, height: i32, depth: i32) -> Self {
        Self { x, y, z, width, height, depth }
    }

    /// Create a single-slice box from a rectangle
    pub const fn from_rect(rect: IntRect) -> Self {
        Self::new(rect.x, rect.y, 0, rect.width, rect.height, 1)
    }
}

impl From<IntRect> for IntBox {
    fn from(rect: IntRect) -> Self {
        Self::from_rect(rect)
    }
}
