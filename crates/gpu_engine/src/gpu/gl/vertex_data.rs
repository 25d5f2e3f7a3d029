//! GL vertex data implementation
//!
//! Each vertex data object owns a vertex array object describing its
//! attributes. The element array buffer binding is also vertex array state,
//! so the index buffer last drawn with is remembered per object and only
//! rebound when it changes. That binding is made on the device directly: it
//! must not go through [`GlState`](super::state::GlState), which keeps its
//! element array bindings on the default vertex array.

use std::cell::Cell;
use std::rc::Rc;

use super::buffer::GlBuffer;
use super::device::{BufferTarget, VertexArrayName, VertexAttribPointer};
use super::GlContext;
use crate::gpu::buffer::GpuBuffer;
use crate::gpu::defs::ObjectId;
use crate::gpu::index_data::GpuIndexData;
use crate::gpu::vertex_data::GpuVertexData;

/// Native data of a vertex data object
pub struct GlVertexArray {
    context: Rc<GlContext>,
    name: VertexArrayName,
    bound_indices: Cell<Option<ObjectId>>,
}

impl GlVertexArray {
    /// Build the vertex array for vertex data
    pub(super) fn new(context: &Rc<GlContext>, data: &GpuVertexData) -> Self {
        let name = context.device.gen_vertex_array();
        context.state.borrow_mut().bind_vertex_array(name);

        let layout = data.layout().desc();
        for attribute in &layout.attributes {
            let buffer = GlBuffer::from_dyn(&*data.buffers()[attribute.binding]);
            buffer.bind();

            context.device.vertex_attrib_pointer(&VertexAttribPointer {
                location: attribute.location(),
                components: attribute.components,
                attribute_type: attribute.attribute_type,
                normalised: attribute.normalised,
                stride: layout.bindings[attribute.binding].stride,
                offset: attribute.offset,
            });
        }

        Self {
            context: Rc::clone(context),
            name,
            bound_indices: Cell::new(None),
        }
    }

    /// Native vertex array name
    pub const fn name(&self) -> VertexArrayName {
        self.name
    }

    /// Bind the vertex array for a draw with optional index data
    pub(super) fn bind(&self, indices: Option<&GpuIndexData>) {
        self.context.state.borrow_mut().bind_vertex_array(self.name);

        let buffer = indices.map(|indices| GlBuffer::from_dyn(&**indices.buffer()));
        let id = buffer.map(GpuBuffer::id);
        if self.bound_indices.get() != id {
            self.context
                .device
                .bind_buffer(BufferTarget::ElementArray, buffer.map(GlBuffer::name));
            self.bound_indices.set(id);
        }
    }
}

impl Drop for GlVertexArray {
    fn drop(&mut self) {
        let mut state = self.context.state.borrow_mut();
        let default = state.default_vertex_array();
        state.bind_vertex_array(default);

        self.context.device.delete_vertex_array(self.name);
    }
}
