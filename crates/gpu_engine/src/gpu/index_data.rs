//! Index data

use std::rc::Rc;

use super::buffer::{GpuBuffer, GpuBufferType};
use crate::check;

/// Type of index elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuIndexType {
    /// Unsigned 16-bit
    UnsignedShort,
    /// Unsigned 32-bit
    UnsignedInt,
}

impl GpuIndexType {
    /// Size of a single index in bytes
    pub const fn element_size(self) -> usize {
        match self {
            Self::UnsignedShort => 2,
            Self::UnsignedInt => 4,
        }
    }
}

/// Index buffer plus the range of indices to draw
#[derive(Clone)]
pub struct GpuIndexData {
    buffer: Rc<dyn GpuBuffer>,
    index_type: GpuIndexType,
    count: usize,
    offset: usize,
}

impl GpuIndexData {
    /// Create index data
    ///
    /// `offset` and `count` are in indices, not bytes, and must lie within
    /// the buffer.
    pub fn new(buffer: Rc<dyn GpuBuffer>, index_type: GpuIndexType, count: usize, offset: usize) -> Self {
        check!(buffer.buffer_type() == GpuBufferType::Index);
        check!((offset + count) * index_type.element_size() <= buffer.size());

        Self {
            buffer,
            index_type,
            count,
            offset,
        }
    }

    /// Buffer containing the indices
    pub const fn buffer(&self) -> &Rc<dyn GpuBuffer> {
        &self.buffer
    }

    /// Type of the indices
    pub const fn index_type(&self) -> GpuIndexType {
        self.index_type
    }

    /// Number of indices to draw
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Index of the first index to draw
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Byte offset of the first index within the buffer
    pub const fn byte_offset(&self) -> usize {
        self.offset * self.index_type.element_size()
    }
}
