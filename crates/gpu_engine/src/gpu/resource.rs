//! Resource set layouts and resource sets
//!
//! Resources used by shaders (uniform buffers, textures) are grouped into
//! resource sets. Each set has a number of slots, whose resource types are
//! fixed by a [`GpuResourceSetLayout`]. A [`GpuResourceSet`] keeps the
//! bindings in each slot until they are changed.
//!
//! Layouts are not cached by the manager: there is a small fixed number of
//! them (the standard sets plus one per shader) and they are held by their
//! users.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use super::buffer::{GpuBuffer, GpuBufferType};
use super::state::{GpuSamplerState, GpuState};
use super::texture::GpuTexture;
use crate::check_msg;

/// Type of a shader resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuResourceType {
    /// Unused slot
    #[default]
    None,
    /// Uniform buffer
    UniformBuffer,
    /// Texture with a sampler
    Texture,
}

/// Slot in a resource set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuResourceSetLayoutSlot {
    /// Type of the resource for this slot
    pub resource_type: GpuResourceType,
}

/// Descriptor for a resource set layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GpuResourceSetLayoutDesc {
    /// Slot descriptors, indexed by slot number
    pub slots: Vec<GpuResourceSetLayoutSlot>,
}

impl GpuResourceSetLayoutDesc {
    /// Layout with `count` unused slots
    pub fn with_slot_count(count: usize) -> Self {
        Self {
            slots: vec![GpuResourceSetLayoutSlot::default(); count],
        }
    }

    /// Set the type of a slot, growing the slot list if needed
    pub fn with_slot(mut self, index: usize, resource_type: GpuResourceType) -> Self {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, GpuResourceSetLayoutSlot::default());
        }

        self.slots[index].resource_type = resource_type;
        self
    }
}

/// Resource set layout object
pub type GpuResourceSetLayout = GpuState<GpuResourceSetLayoutDesc>;

/// Object bound into a resource set slot
#[derive(Clone)]
pub enum GpuBoundResource {
    /// Uniform buffer
    Buffer(Rc<dyn GpuBuffer>),
    /// Texture
    Texture(Rc<dyn GpuTexture>),
}

impl GpuBoundResource {
    fn same_object(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Buffer(a), Self::Buffer(b)) => a.id() == b.id(),
            (Self::Texture(a), Self::Texture(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

/// Bindings for a single slot
#[derive(Clone, Default)]
pub struct GpuResourceSlot {
    /// Type declared by the layout
    pub resource_type: GpuResourceType,
    /// Bound buffer or texture
    pub object: Option<GpuBoundResource>,
    /// Sampler for a texture
    pub sampler: Option<Rc<GpuSamplerState>>,
}

/// A set of resource bindings conforming to a layout
pub struct GpuResourceSet {
    layout: Rc<GpuResourceSetLayout>,
    slots: RefCell<Vec<GpuResourceSlot>>,
    revision: Cell<u64>,
    native: Option<Box<dyn Any>>,
}

impl GpuResourceSet {
    /// Create a resource set with all slots unbound
    pub fn new(layout: Rc<GpuResourceSetLayout>) -> Self {
        let slots = layout
            .desc()
            .slots
            .iter()
            .map(|slot| GpuResourceSlot {
                resource_type: slot.resource_type,
                ..GpuResourceSlot::default()
            })
            .collect();

        Self {
            layout,
            slots: RefCell::new(slots),
            revision: Cell::new(0),
            native: None,
        }
    }

    /// Attach backend-specific data
    pub fn with_native<T: Any>(mut self, native: T) -> Self {
        self.native = Some(Box::new(native));
        self
    }

    /// Layout of the resource set
    pub const fn layout(&self) -> &Rc<GpuResourceSetLayout> {
        &self.layout
    }

    /// Current bindings of every slot
    pub fn slots(&self) -> Ref<'_, Vec<GpuResourceSlot>> {
        self.slots.borrow()
    }

    /// Number of times a slot binding has changed
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Backend-specific data, if present and of type `T`
    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.as_ref()?.downcast_ref::<T>()
    }

    /// Bind a uniform buffer to a uniform buffer slot
    pub fn bind_uniform_buffer(&self, index: usize, buffer: &Rc<dyn GpuBuffer>) {
        let mut slots = self.slots.borrow_mut();
        check_msg!(index < slots.len(), "Resource slot {} out of range", index);
        let slot = &mut slots[index];
        check_msg!(
            slot.resource_type == GpuResourceType::UniformBuffer,
            "Resource slot {} is not a uniform buffer slot ({:?})",
            index,
            slot.resource_type
        );
        check_msg!(
            buffer.buffer_type() == GpuBufferType::Uniform,
            "Buffer bound to slot {} is not a uniform buffer",
            index
        );

        let object = GpuBoundResource::Buffer(Rc::clone(buffer));
        let unchanged = slot.object.as_ref().is_some_and(|bound| bound.same_object(&object));
        if !unchanged {
            slot.object = Some(object);
            slot.sampler = None;
            self.revision.set(self.revision.get() + 1);
        }
    }

    /// Bind a texture and sampler to a texture slot
    pub fn bind_texture(&self, index: usize, texture: &Rc<dyn GpuTexture>, sampler: &Rc<GpuSamplerState>) {
        let mut slots = self.slots.borrow_mut();
        check_msg!(index < slots.len(), "Resource slot {} out of range", index);
        let slot = &mut slots[index];
        check_msg!(
            slot.resource_type == GpuResourceType::Texture,
            "Resource slot {} is not a texture slot ({:?})",
            index,
            slot.resource_type
        );

        let object = GpuBoundResource::Texture(Rc::clone(texture));
        let same_texture = slot.object.as_ref().is_some_and(|bound| bound.same_object(&object));
        let same_sampler = slot
            .sampler
            .as_ref()
            .is_some_and(|bound| Rc::ptr_eq(bound, sampler));

        if !same_texture || !same_sampler {
            slot.object = Some(object);
            slot.sampler = Some(Rc::clone(sampler));
            self.revision.set(self.revision.get() + 1);
        }
    }
}

impl fmt::Debug for GpuResourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuResourceSet")
            .field("layout", self.layout.desc())
            .field("revision", &self.revision.get())
            .finish()
    }
}
