//! GL buffer implementation

use std::any::Any;
use std::rc::Rc;

use super::device::{BufferName, BufferTarget};
use super::GlContext;
use crate::fatal;
use crate::gpu::buffer::{GpuBuffer, GpuBufferDesc, GpuBufferType, MapFlags};
use crate::gpu::defs::ObjectId;

impl From<GpuBufferType> for BufferTarget {
    fn from(buffer_type: GpuBufferType) -> Self {
        match buffer_type {
            GpuBufferType::Vertex => Self::Array,
            GpuBufferType::Index => Self::ElementArray,
            GpuBufferType::Uniform => Self::Uniform,
        }
    }
}

/// Buffer backed by a GL buffer object
pub struct GlBuffer {
    desc: GpuBufferDesc,
    id: ObjectId,
    context: Rc<GlContext>,
    name: BufferName,
    target: BufferTarget,
}

impl GlBuffer {
    pub(super) fn new(context: &Rc<GlContext>, desc: GpuBufferDesc) -> Self {
        let target = BufferTarget::from(desc.buffer_type);
        let name = context.device.gen_buffer();

        context.state.borrow_mut().bind_buffer(target, name);
        context.device.buffer_data(target, desc.size, None, desc.usage);

        Self {
            desc,
            id: ObjectId::next(),
            context: Rc::clone(context),
            name,
            target,
        }
    }

    /// Downcast a buffer created by the GL backend
    pub(super) fn from_dyn(buffer: &dyn GpuBuffer) -> &Self {
        match buffer.as_any().downcast_ref::<Self>() {
            Some(buffer) => buffer,
            None => fatal!("GL: Buffer {} was not created by the GL backend", buffer.id().raw()),
        }
    }

    /// Native buffer name
    pub const fn name(&self) -> BufferName {
        self.name
    }

    /// Bind the buffer to its target
    pub(super) fn bind(&self) {
        self.context.state.borrow_mut().bind_buffer(self.target, self.name);
    }

    /// Bind the buffer to an indexed binding point
    pub(super) fn bind_indexed(&self, index: u32) {
        self.context
            .state
            .borrow_mut()
            .bind_buffer_base(self.target, index, self.name);
    }
}

impl GpuBuffer for GlBuffer {
    fn desc(&self) -> &GpuBufferDesc {
        &self.desc
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn write_impl(&self, offset: usize, data: &[u8], flags: MapFlags) {
        self.bind();

        let device = &self.context.device;
        if offset == 0 && data.len() == self.desc.size {
            device.buffer_data(self.target, self.desc.size, Some(data), self.desc.usage);
        } else {
            if flags.contains(MapFlags::INVALIDATE_BUFFER) {
                // Orphan the existing storage.
                device.buffer_data(self.target, self.desc.size, None, self.desc.usage);
            }

            device.buffer_sub_data(self.target, offset, data);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        self.context.state.borrow_mut().invalidate_buffer(self.name);
        self.context.device.delete_buffer(self.name);
    }
}
