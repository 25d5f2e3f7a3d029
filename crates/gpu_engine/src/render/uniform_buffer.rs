//! Uniform structures and CPU-shadowed uniform buffers
//!
//! A [`UniformStruct`] describes the member layout of a uniform block. A
//! [`UniformBufferBase`] pairs a GPU uniform buffer with a CPU-side shadow
//! copy laid out by such a structure: members are read from and written to
//! the shadow copy, and the whole copy is uploaded when the GPU buffer is
//! next requested after a modification.
//!
//! Uploads always replace the entire buffer. Partial updates of a buffer in
//! use by the GPU can stall on some drivers, while invalidating the whole
//! buffer lets the driver hand out fresh storage.

use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use bytemuck::Pod;

use super::shader_parameter::{ShaderParameterType, ShaderParameterValue};
use crate::foundation::logging::trace;
use crate::gpu::buffer::{GpuBuffer, GpuBufferDesc, GpuBufferType, GpuBufferUsage, MapFlags};
use crate::gpu::manager::GpuManager;
use crate::{check, check_msg, fatal};

/// A member of a uniform structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformStructMember {
    /// Member name
    pub name: String,
    /// Member type
    pub param_type: ShaderParameterType,
    /// Byte offset of the member in the structure
    pub offset: usize,
}

/// Layout of a uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformStruct {
    /// Name of the structure type
    pub name: String,
    /// Instance name used when declaring the block in shaders
    pub instance_name: String,
    /// Resource set the block is bound in
    pub set: u32,
    members: Vec<UniformStructMember>,
    size: usize,
}

const fn round_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl UniformStruct {
    /// Create an empty structure
    pub fn new(name: impl Into<String>, instance_name: impl Into<String>, set: u32) -> Self {
        Self {
            name: name.into(),
            instance_name: instance_name.into(),
            set,
            members: Vec::new(),
            size: 0,
        }
    }

    /// Append a member, placed at the next offset its alignment allows
    pub fn add_member(&mut self, name: impl Into<String>, param_type: ShaderParameterType) -> &UniformStructMember {
        check!(!param_type.is_texture());

        let offset = round_up(self.size, param_type.alignment());
        self.size = offset + param_type.size();
        self.push_member(name.into(), param_type, offset)
    }

    /// Add a member at a fixed offset
    ///
    /// Used for structures mirroring a Rust type, where the offsets come from
    /// the type's field layout.
    pub fn add_member_at(
        &mut self,
        name: impl Into<String>,
        param_type: ShaderParameterType,
        offset: usize,
    ) -> &UniformStructMember {
        check!(!param_type.is_texture());
        check_msg!(
            offset % param_type.alignment() == 0,
            "Member offset {} is not aligned for {:?}",
            offset,
            param_type
        );

        self.size = self.size.max(offset + param_type.size());
        self.push_member(name.into(), param_type, offset)
    }

    fn push_member(&mut self, name: String, param_type: ShaderParameterType, offset: usize) -> &UniformStructMember {
        check_msg!(
            self.lookup_member(&name).is_none(),
            "Duplicate member '{}' in uniform struct '{}'",
            name,
            self.name
        );

        self.members.push(UniformStructMember {
            name,
            param_type,
            offset,
        });

        &self.members[self.members.len() - 1]
    }

    /// Builder form of [`UniformStruct::add_member`]
    #[must_use]
    pub fn with_member(mut self, name: impl Into<String>, param_type: ShaderParameterType) -> Self {
        self.add_member(name, param_type);
        self
    }

    /// Builder form of [`UniformStruct::add_member_at`]
    #[must_use]
    pub fn with_member_at(mut self, name: impl Into<String>, param_type: ShaderParameterType, offset: usize) -> Self {
        self.add_member_at(name, param_type, offset);
        self
    }

    /// Set the total size, including any trailing padding
    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        check_msg!(size >= self.size, "Uniform struct '{}' size smaller than its members", self.name);
        self.size = size;
        self
    }

    /// Find a member by name
    pub fn lookup_member(&self, name: &str) -> Option<&UniformStructMember> {
        self.members.iter().find(|member| member.name == name)
    }

    /// Members in declaration order
    pub fn members(&self) -> &[UniformStructMember] {
        &self.members
    }

    /// Total size of the structure in bytes
    pub const fn size(&self) -> usize {
        self.size
    }
}

/// Uniform buffer with a CPU-side shadow copy
pub struct UniformBufferBase {
    uniform_struct: Rc<UniformStruct>,
    gpu: Rc<dyn GpuBuffer>,
    shadow: Vec<u8>,
    dirty: Cell<bool>,
}

impl UniformBufferBase {
    /// Create a buffer for a structure with zeroed content
    pub fn new(manager: &GpuManager, uniform_struct: Rc<UniformStruct>, usage: GpuBufferUsage) -> Self {
        let size = uniform_struct.size();
        let gpu = manager.create_buffer(GpuBufferDesc::new(GpuBufferType::Uniform, size).with_usage(usage));

        Self {
            uniform_struct,
            gpu,
            shadow: vec![0; size],
            dirty: Cell::new(true),
        }
    }

    /// Layout of the buffer
    pub fn uniform_struct(&self) -> &Rc<UniformStruct> {
        &self.uniform_struct
    }

    /// Whether the shadow copy has changes not yet uploaded
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Upload the shadow copy if it was modified since the last upload
    pub fn flush(&self) {
        if self.dirty.get() {
            trace!("Uploading uniform buffer '{}' ({} bytes)", self.uniform_struct.name, self.shadow.len());

            self.gpu.write(0, &self.shadow, MapFlags::INVALIDATE_BUFFER);
            self.dirty.set(false);
        }
    }

    /// GPU buffer, with any pending modifications uploaded
    pub fn gpu(&self) -> &Rc<dyn GpuBuffer> {
        self.flush();
        &self.gpu
    }

    fn member(&self, name: &str, param_type: ShaderParameterType) -> &UniformStructMember {
        let Some(member) = self.uniform_struct.lookup_member(name) else {
            fatal!("Member '{}' in uniform struct '{}' not found", name, self.uniform_struct.name);
        };

        if member.param_type != param_type {
            fatal!(
                "Member '{}' in uniform struct '{}' incorrect type (expected {:?}, found {:?})",
                name,
                self.uniform_struct.name,
                param_type,
                member.param_type
            );
        }

        member
    }

    /// Read the raw bytes of a member
    pub fn read_member_bytes(&self, member: &UniformStructMember) -> &[u8] {
        &self.shadow[member.offset..member.offset + member.param_type.size()]
    }

    /// Overwrite the raw bytes of a member
    pub fn write_member_bytes(&mut self, member: &UniformStructMember, data: &[u8]) {
        check_msg!(
            data.len() == member.param_type.size(),
            "Incorrect data size for member '{}'",
            member.name
        );

        self.shadow[member.offset..member.offset + data.len()].copy_from_slice(data);
        self.dirty.set(true);
    }

    /// Read a member by name
    ///
    /// A missing member or a type mismatch is fatal.
    pub fn read_member<V: ShaderParameterValue>(&self, name: &str) -> V {
        let member = self.member(name, V::TYPE);
        bytemuck::pod_read_unaligned(self.read_member_bytes(member))
    }

    /// Write a member by name
    ///
    /// A missing member or a type mismatch is fatal.
    pub fn write_member<V: ShaderParameterValue>(&mut self, name: &str, value: V) {
        let member = self.member(name, V::TYPE).clone();
        self.write_member_bytes(&member, bytemuck::bytes_of(&value));
    }
}

/// A Rust type with a uniform structure describing its layout
pub trait UniformData: Pod {
    /// Layout of the type
    ///
    /// The structure's size must equal the size of the type.
    fn uniform_struct() -> UniformStruct;
}

/// Uniform buffer holding a value of a Rust type
pub struct UniformBuffer<T: UniformData> {
    base: UniformBufferBase,
    _marker: PhantomData<T>,
}

impl<T: UniformData> UniformBuffer<T> {
    /// Create a buffer with zeroed content
    pub fn new(manager: &GpuManager, usage: GpuBufferUsage) -> Self {
        let uniform_struct = T::uniform_struct();
        check_msg!(
            uniform_struct.size() == std::mem::size_of::<T>(),
            "Uniform struct '{}' size does not match its type",
            uniform_struct.name
        );

        Self {
            base: UniformBufferBase::new(manager, Rc::new(uniform_struct), usage),
            _marker: PhantomData,
        }
    }

    /// Current content
    pub fn read(&self) -> T {
        bytemuck::pod_read_unaligned(&self.base.shadow)
    }

    /// Replace the content
    pub fn write(&mut self, value: &T) {
        self.base.shadow.copy_from_slice(bytemuck::bytes_of(value));
        self.base.dirty.set(true);
    }

    /// Modify the content in place
    pub fn modify(&mut self, f: impl FnOnce(&mut T)) {
        let mut value = self.read();
        f(&mut value);
        self.write(&value);
    }

    /// Untyped view of the buffer
    pub const fn base(&self) -> &UniformBufferBase {
        &self.base
    }

    /// Mutable untyped view of the buffer
    pub fn base_mut(&mut self) -> &mut UniformBufferBase {
        &mut self.base
    }

    /// GPU buffer, with any pending modifications uploaded
    pub fn gpu(&self) -> &Rc<dyn GpuBuffer> {
        self.base.gpu()
    }
}

#[cfg(test)]
mod tests {
    use std::mem::offset_of;

    use bytemuck::Zeroable;

    use super::*;
    use crate::foundation::math::{Mat4, Vec3, Vec4};
    use crate::gpu::test_support::{mock_manager, MockBuffer};

    fn light_struct() -> UniformStruct {
        UniformStruct::new("LightUniforms", "light", 2)
            .with_member("position", ShaderParameterType::Vec3)
            .with_member("intensity", ShaderParameterType::Float)
            .with_member("direction", ShaderParameterType::Vec3)
            .with_member("shadowMatrix", ShaderParameterType::Mat4)
    }

    fn mock_writes(buffer: &Rc<dyn GpuBuffer>) -> Vec<(usize, usize, MapFlags)> {
        let mock = buffer.as_any().downcast_ref::<MockBuffer>().expect("not a mock buffer");
        mock.writes.borrow().clone()
    }

    #[test]
    fn test_member_offsets_follow_alignment() {
        let ustruct = light_struct();
        let offsets: Vec<_> = ustruct.members().iter().map(|member| member.offset).collect();

        // A float packs into the tail of a vec3.
        assert_eq!(offsets, vec![0, 12, 16, 32]);
        assert_eq!(ustruct.size(), 96);
    }

    #[test]
    fn test_write_only_touches_shadow() {
        let manager = mock_manager();
        let mut buffer = UniformBufferBase::new(&manager, Rc::new(light_struct()), GpuBufferUsage::DynamicDraw);

        buffer.flush();
        let gpu = Rc::clone(buffer.gpu());
        assert_eq!(mock_writes(&gpu).len(), 1);

        buffer.write_member("intensity", 0.75_f32);
        assert!(buffer.is_dirty());
        assert_eq!(mock_writes(&gpu).len(), 1);
        assert_eq!(buffer.read_member::<f32>("intensity"), 0.75);
    }

    #[test]
    fn test_flush_uploads_whole_buffer_once() {
        let manager = mock_manager();
        let mut buffer = UniformBufferBase::new(&manager, Rc::new(light_struct()), GpuBufferUsage::DynamicDraw);

        buffer.write_member("direction", Vec3::new(0.0, -1.0, 0.0));
        let gpu = Rc::clone(buffer.gpu());
        let _ = buffer.gpu();

        assert_eq!(mock_writes(&gpu), vec![(0, 96, MapFlags::INVALIDATE_BUFFER)]);
        assert!(!buffer.is_dirty());

        let mock = gpu.as_any().downcast_ref::<MockBuffer>().expect("not a mock buffer");
        let data = mock.data.borrow();
        let direction: Vec3 = bytemuck::pod_read_unaligned(&data[16..28]);
        assert_eq!(direction, Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_new_buffer_is_zeroed() {
        let manager = mock_manager();
        let buffer = UniformBufferBase::new(&manager, Rc::new(light_struct()), GpuBufferUsage::StaticDraw);

        assert!(buffer.is_dirty());
        assert_eq!(buffer.read_member::<Mat4>("shadowMatrix"), Mat4::zeros());
        assert_eq!(buffer.gpu().size(), 96);
    }

    #[test]
    #[should_panic(expected = "Member 'colour' in uniform struct 'LightUniforms' not found")]
    fn test_missing_member_is_fatal() {
        let manager = mock_manager();
        let mut buffer = UniformBufferBase::new(&manager, Rc::new(light_struct()), GpuBufferUsage::StaticDraw);

        buffer.write_member("colour", Vec4::zeros());
    }

    #[test]
    #[should_panic(expected = "incorrect type")]
    fn test_type_mismatch_is_fatal() {
        let manager = mock_manager();
        let buffer = UniformBufferBase::new(&manager, Rc::new(light_struct()), GpuBufferUsage::StaticDraw);

        let _ = buffer.read_member::<Vec4>("position");
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct ViewUniforms {
        view_projection: Mat4,
        position: Vec3,
        exposure: f32,
    }

    impl UniformData for ViewUniforms {
        fn uniform_struct() -> UniformStruct {
            UniformStruct::new("ViewUniforms", "view", 0)
                .with_member_at(
                    "viewProjection",
                    ShaderParameterType::Mat4,
                    offset_of!(ViewUniforms, view_projection),
                )
                .with_member_at("position", ShaderParameterType::Vec3, offset_of!(ViewUniforms, position))
                .with_member_at("exposure", ShaderParameterType::Float, offset_of!(ViewUniforms, exposure))
                .with_size(std::mem::size_of::<ViewUniforms>())
        }
    }

    #[test]
    fn test_typed_buffer_shares_shadow_with_members() {
        let manager = mock_manager();
        let mut buffer = UniformBuffer::<ViewUniforms>::new(&manager, GpuBufferUsage::DynamicDraw);

        buffer.modify(|view| {
            view.position = Vec3::new(1.0, 2.0, 3.0);
            view.exposure = 1.5;
        });

        assert_eq!(buffer.base().read_member::<Vec3>("position"), Vec3::new(1.0, 2.0, 3.0));

        buffer.base_mut().write_member("exposure", 2.0_f32);
        assert_eq!(buffer.read().exposure, 2.0);

        let gpu = Rc::clone(buffer.gpu());
        assert_eq!(mock_writes(&gpu).len(), 1);
        assert!(!buffer.base().is_dirty());
    }
}
