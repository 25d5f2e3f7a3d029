//! Vertex data layouts and vertex data objects
//!
//! A vertex data layout describes how vertex attributes are laid out across
//! one or more buffer bindings. Layouts are state objects and are cached by
//! the manager. Vertex data pairs a layout with the actual buffers and a
//! vertex count; it is immutable once created.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use super::buffer::{GpuBuffer, GpuBufferType};
use super::defs::MAX_VERTEX_ATTRIBUTES;
use super::state::GpuState;
use crate::check;

/// Description of a vertex buffer binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexBinding {
    /// Distance between each vertex in bytes
    pub stride: usize,
}

/// Semantic of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    /// Vertex position
    Position,
    /// Vertex normal
    Normal,
    /// Texture coordinates
    Texcoord,
    /// Diffuse colour
    Diffuse,
    /// Specular colour
    Specular,
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeType {
    /// Signed 8-bit integer
    Byte,
    /// Unsigned 8-bit integer
    UnsignedByte,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit integer
    UnsignedShort,
    /// Signed 32-bit integer
    Int,
    /// Unsigned 32-bit integer
    UnsignedInt,
    /// Single-precision floating point
    Float,
    /// Double-precision floating point
    Double,
}

impl VertexAttributeType {
    /// Size of a single component in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::Int | Self::UnsignedInt | Self::Float => 4,
            Self::Double => 8,
        }
    }
}

/// Description of a single vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Semantic of the attribute
    pub semantic: VertexSemantic,
    /// Index of the attribute within its semantic
    pub index: u32,
    /// Component type
    pub attribute_type: VertexAttributeType,
    /// Whether integer components are normalised to [0, 1] or [-1, 1]
    pub normalised: bool,
    /// Number of components (1 to 4)
    pub components: usize,
    /// Index of the buffer binding the attribute is read from
    pub binding: usize,
    /// Offset of the attribute within each vertex
    pub offset: usize,
}

impl VertexAttribute {
    /// Float attribute with the given component count
    pub const fn float(semantic: VertexSemantic, components: usize, binding: usize, offset: usize) -> Self {
        Self {
            semantic,
            index: 0,
            attribute_type: VertexAttributeType::Float,
            normalised: false,
            components,
            binding,
            offset,
        }
    }

    /// Set the semantic index
    pub const fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Total size of the attribute in bytes
    pub const fn size(&self) -> usize {
        self.attribute_type.size() * self.components
    }

    /// Shader input location for this attribute
    ///
    /// Position, normal and the two colours take fixed locations and texture
    /// coordinate sets follow them.
    pub fn location(&self) -> u32 {
        let location = match self.semantic {
            VertexSemantic::Position => 0,
            VertexSemantic::Normal => 1,
            VertexSemantic::Diffuse => 2,
            VertexSemantic::Specular => 3,
            VertexSemantic::Texcoord => 4 + self.index,
        };

        check!((location as usize) < MAX_VERTEX_ATTRIBUTES);
        location
    }
}

/// Descriptor for a vertex data layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GpuVertexDataLayoutDesc {
    /// Buffer bindings
    pub bindings: Vec<VertexBinding>,
    /// Attributes read from the bindings
    pub attributes: Vec<VertexAttribute>,
}

impl GpuVertexDataLayoutDesc {
    /// Add a buffer binding
    pub fn with_binding(mut self, stride: usize) -> Self {
        self.bindings.push(VertexBinding { stride });
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Vertex data layout object
pub type GpuVertexDataLayout = GpuState<GpuVertexDataLayoutDesc>;

/// A collection of vertex buffers described by a layout
pub struct GpuVertexData {
    count: usize,
    layout: Rc<GpuVertexDataLayout>,
    buffers: Vec<Rc<dyn GpuBuffer>>,
    native: Option<Box<dyn Any>>,
}

impl GpuVertexData {
    /// Create vertex data with no backend data
    ///
    /// There must be one buffer per binding in the layout.
    pub fn new(count: usize, layout: Rc<GpuVertexDataLayout>, buffers: Vec<Rc<dyn GpuBuffer>>) -> Self {
        check!(buffers.len() == layout.desc().bindings.len());
        check!(buffers.iter().all(|buffer| buffer.buffer_type() == GpuBufferType::Vertex));
        check!(layout.desc().attributes.len() <= MAX_VERTEX_ATTRIBUTES);
        check!(layout
            .desc()
            .attributes
            .iter()
            .all(|attribute| attribute.binding < buffers.len()));

        Self {
            count,
            layout,
            buffers,
            native: None,
        }
    }

    /// Attach backend-specific data
    pub fn with_native<T: Any>(mut self, native: T) -> Self {
        self.native = Some(Box::new(native));
        self
    }

    /// Total number of vertices
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Layout of the vertex data
    pub const fn layout(&self) -> &Rc<GpuVertexDataLayout> {
        &self.layout
    }

    /// Buffers, one per layout binding
    pub fn buffers(&self) -> &[Rc<dyn GpuBuffer>] {
        &self.buffers
    }

    /// Backend-specific data, if present and of type `T`
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for GpuVertexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuVertexData")
            .field("count", &self.count)
            .field("layout", self.layout.desc())
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_size() {
        let position = VertexAttribute::float(VertexSemantic::Position, 3, 0, 0);
        assert_eq!(position.size(), 12);

        let colour = VertexAttribute {
            attribute_type: VertexAttributeType::UnsignedByte,
            normalised: true,
            ..VertexAttribute::float(VertexSemantic::Diffuse, 4, 0, 12)
        };
        assert_eq!(colour.size(), 4);
    }

    #[test]
    fn test_attribute_locations() {
        assert_eq!(VertexAttribute::float(VertexSemantic::Position, 3, 0, 0).location(), 0);
        assert_eq!(VertexAttribute::float(VertexSemantic::Normal, 3, 0, 12).location(), 1);
        assert_eq!(
            VertexAttribute::float(VertexSemantic::Texcoord, 2, 0, 24)
                .with_index(1)
                .location(),
            5
        );
    }

    #[test]
    fn test_layout_equality() {
        let make = || {
            GpuVertexDataLayoutDesc::default()
                .with_binding(20)
                .with_attribute(VertexAttribute::float(VertexSemantic::Position, 3, 0, 0))
                .with_attribute(VertexAttribute::float(VertexSemantic::Texcoord, 2, 0, 12))
        };

        assert_eq!(make(), make());
        assert_ne!(make(), make().with_binding(8));
    }
}
