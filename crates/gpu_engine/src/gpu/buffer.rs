//! GPU buffers

use std::any::Any;

use bitflags::bitflags;

use super::defs::ObjectId;
use crate::check_msg;

/// Type of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuBufferType {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform buffer
    Uniform,
}

/// Expected access pattern of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuBufferUsage {
    /// Modified once, used a few times for drawing
    StreamDraw,
    /// Modified once, used many times for drawing
    #[default]
    StaticDraw,
    /// Modified repeatedly, used many times for drawing
    DynamicDraw,
}

bitflags! {
    /// Flags controlling how a buffer write is performed
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapFlags: u32 {
        /// The written range may be discarded before the write
        const INVALIDATE = 1 << 0;
        /// The whole buffer may be discarded before the write
        const INVALIDATE_BUFFER = 1 << 1;
    }
}

/// Descriptor for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBufferDesc {
    /// Type of the buffer
    pub buffer_type: GpuBufferType,
    /// Usage hint
    pub usage: GpuBufferUsage,
    /// Size of the buffer in bytes
    pub size: usize,
}

impl GpuBufferDesc {
    /// Create a descriptor with the default usage hint
    pub fn new(buffer_type: GpuBufferType, size: usize) -> Self {
        Self {
            buffer_type,
            usage: GpuBufferUsage::default(),
            size,
        }
    }

    /// Set the usage hint
    pub const fn with_usage(mut self, usage: GpuBufferUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// A GPU buffer
///
/// Buffers are created through [`GpuManager::create_buffer`](super::GpuManager::create_buffer)
/// and shared as `Rc<dyn GpuBuffer>`. The native storage is released when the
/// last reference is dropped.
pub trait GpuBuffer {
    /// Descriptor the buffer was created from
    fn desc(&self) -> &GpuBufferDesc;

    /// Unique identity of this buffer
    fn id(&self) -> ObjectId;

    /// Backend implementation of [`GpuBuffer::write`], bounds already checked
    fn write_impl(&self, offset: usize, data: &[u8], flags: MapFlags);

    /// Access to the concrete backend type
    fn as_any(&self) -> &dyn Any;

    /// Type of the buffer
    fn buffer_type(&self) -> GpuBufferType {
        self.desc().buffer_type
    }

    /// Size of the buffer in bytes
    fn size(&self) -> usize {
        self.desc().size
    }

    /// Replace part of the buffer content
    ///
    /// The written range must lie within the buffer.
    fn write(&self, offset: usize, data: &[u8], flags: MapFlags) {
        check_msg!(
            offset + data.len() <= self.size(),
            "Write outside buffer bounds (total: {}, offset: {}, size: {})",
            self.size(),
            offset,
            data.len()
        );

        self.write_impl(offset, data, flags);
    }
}
