//! GL programs and pipelines
//!
//! Programs are separable program objects and pipelines are program pipeline
//! objects. Binding points for a program's resources depend on the resource
//! set layouts of the pipeline it is used in, so they are assigned when the
//! pipeline is bound and only reassigned when they change.

use std::cell::RefCell;
use std::rc::Rc;

use super::device::{PipelineName, ProgramName};
use super::resource::GlResourceSetLayout;
use super::GlContext;
use crate::fatal;
use crate::foundation::logging::{debug, error};
use crate::gpu::pipeline::{GpuPipeline, GpuPipelineDesc};
use crate::gpu::program::{GpuProgram, GpuProgramDesc};
use crate::gpu::resource::{GpuResourceSetLayout, GpuResourceType};
use crate::gpu::state::GpuState;

/// Native data of a program
pub struct GlProgram {
    context: Rc<GlContext>,
    name: ProgramName,
    bindings: RefCell<Vec<Option<u32>>>,
}

impl GlProgram {
    /// Native program name
    pub const fn name(&self) -> ProgramName {
        self.name
    }

    /// Assign binding points to the program's resources for a pipeline layout
    fn set_resource_layout(&self, desc: &GpuProgramDesc, layout: &[Option<Rc<GpuResourceSetLayout>>]) {
        let mut bindings = self.bindings.borrow_mut();

        for (index, resource) in desc.resources.iter().enumerate() {
            let Some(native) = layout
                .get(resource.set)
                .and_then(Option::as_ref)
                .and_then(|layout| layout.native::<GlResourceSetLayout>())
            else {
                fatal!(
                    "GL: Program '{}' resource '{}' has no layout for set {}",
                    desc.name,
                    resource.name,
                    resource.set
                );
            };

            let binding = native.map_slot(resource.set, resource.slot);
            if bindings[index] == Some(binding) {
                continue;
            }

            match resource.resource_type {
                GpuResourceType::UniformBuffer => {
                    self.context.device.uniform_block_binding(self.name, &resource.name, binding);
                }
                GpuResourceType::Texture => {
                    self.context.device.uniform_sampler_binding(self.name, &resource.name, binding);
                }
                GpuResourceType::None => {}
            }

            bindings[index] = Some(binding);
        }
    }
}

impl Drop for GlProgram {
    fn drop(&mut self) {
        self.context.device.delete_program(self.name);
    }
}

/// Native data of a pipeline
pub struct GlPipeline {
    context: Rc<GlContext>,
    name: PipelineName,
}

impl GlPipeline {
    /// Native pipeline name
    pub const fn name(&self) -> PipelineName {
        self.name
    }
}

impl Drop for GlPipeline {
    fn drop(&mut self) {
        self.context.state.borrow_mut().invalidate_pipeline(self.name);
        self.context.device.delete_program_pipeline(self.name);
    }
}

/// Create a program object
///
/// A program the device fails to create is fatal, after logging the
/// device's diagnostics.
pub(super) fn create_program(context: &Rc<GlContext>, desc: GpuProgramDesc) -> GpuProgram {
    let name = match context.device.create_program(desc.stage, &desc.name, &desc.code) {
        Ok(name) => name,
        Err(log) => {
            error!("GL: Failed to create program '{}' ({:?} stage)", desc.name, desc.stage);
            error!("GL: Program log:\n{}", log);
            fatal!("GL: Failed to create program '{}'", desc.name);
        }
    };

    debug!("GL: Created program '{}' ({} resources)", desc.name, desc.resources.len());

    let native = GlProgram {
        context: Rc::clone(context),
        name,
        bindings: RefCell::new(vec![None; desc.resources.len()]),
    };

    GpuState::with_native(desc, native)
}

/// Create a program pipeline object from validated programs
pub(super) fn create_pipeline(context: &Rc<GlContext>, desc: GpuPipelineDesc) -> GpuPipeline {
    let name = context.device.gen_program_pipeline();

    for program in desc.programs.iter().flatten() {
        let Some(native) = program.native::<GlProgram>() else {
            fatal!("GL: Program '{}' was not created by the GL backend", program.desc().name);
        };

        context.device.use_program_stage(name, program.stage(), native.name);
    }

    let native = GlPipeline {
        context: Rc::clone(context),
        name,
    };

    GpuState::with_native(desc, native)
}

/// Bind a pipeline for rendering, updating its programs' resource bindings
pub(super) fn bind_pipeline(context: &GlContext, pipeline: &GpuPipeline) {
    let desc = pipeline.desc();

    for program in desc.programs.iter().flatten() {
        if let Some(native) = program.native::<GlProgram>() {
            native.set_resource_layout(program.desc(), &desc.resource_layout);
        }
    }

    let Some(native) = pipeline.native::<GlPipeline>() else {
        fatal!("GL: Pipeline was not created by the GL backend");
    };

    context.state.borrow_mut().bind_pipeline(native.name);
}
