//! GPU programs
//!
//! A program is a compiled shader for a single stage. Shader compilation is
//! done offline; the descriptor carries the compiled code blob together with
//! the resource reflection for the program, i.e. the named uniform blocks and
//! sampled textures along with their resource set/slot decorations. Pipeline
//! creation validates the reflection against the pipeline's resource set
//! layouts.

use super::defs::ShaderStage;
use super::resource::GpuResourceType;
use super::state::GpuState;

/// A resource declared by a program
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GpuProgramResource {
    /// Name of the resource in the shader
    pub name: String,
    /// Type of the resource
    pub resource_type: GpuResourceType,
    /// Resource set number
    pub set: usize,
    /// Slot number within the set
    pub slot: usize,
}

impl GpuProgramResource {
    /// Uniform block at a set/slot
    pub fn uniform_buffer(name: impl Into<String>, set: usize, slot: usize) -> Self {
        Self {
            name: name.into(),
            resource_type: GpuResourceType::UniformBuffer,
            set,
            slot,
        }
    }

    /// Sampled texture at a set/slot
    pub fn texture(name: impl Into<String>, set: usize, slot: usize) -> Self {
        Self {
            name: name.into(),
            resource_type: GpuResourceType::Texture,
            set,
            slot,
        }
    }
}

/// Descriptor for a program
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GpuProgramDesc {
    /// Stage the program is for
    pub stage: ShaderStage,
    /// Name of the program, used for diagnostics
    pub name: String,
    /// Compiled program code
    pub code: Vec<u32>,
    /// Resources used by the program
    pub resources: Vec<GpuProgramResource>,
}

impl GpuProgramDesc {
    /// Create a program descriptor with no resources
    pub fn new(stage: ShaderStage, name: impl Into<String>, code: Vec<u32>) -> Self {
        Self {
            stage,
            name: name.into(),
            code,
            resources: Vec::new(),
        }
    }

    /// Declare a resource used by the program
    pub fn with_resource(mut self, resource: GpuProgramResource) -> Self {
        self.resources.push(resource);
        self
    }
}

/// Program object
pub type GpuProgram = GpuState<GpuProgramDesc>;

impl GpuProgram {
    /// Stage the program is for
    pub fn stage(&self) -> ShaderStage {
        self.desc().stage
    }

    /// Resources used by the program
    pub fn resources(&self) -> &[GpuProgramResource] {
        &self.desc().resources
    }
}
