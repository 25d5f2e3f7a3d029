//! GPU pipelines
//!
//! A pipeline combines one program per shader stage with the resource set
//! layouts the programs expect.

use std::rc::Rc;

use super::defs::{ShaderStage, NUM_SHADER_STAGES};
use super::program::GpuProgram;
use super::resource::GpuResourceSetLayout;
use super::state::GpuState;
use crate::check_msg;

/// Descriptor for a pipeline
#[derive(Clone, Default)]
pub struct GpuPipelineDesc {
    /// Programs, indexed by shader stage
    pub programs: [Option<Rc<GpuProgram>>; NUM_SHADER_STAGES],
    /// Resource set layouts, indexed by set number
    pub resource_layout: Vec<Option<Rc<GpuResourceSetLayout>>>,
}

impl GpuPipelineDesc {
    /// Set the program for its stage
    pub fn with_program(mut self, program: Rc<GpuProgram>) -> Self {
        let stage = program.stage().index();
        self.programs[stage] = Some(program);
        self
    }

    /// Set the layout for a resource set number
    pub fn with_resource_layout(mut self, set: usize, layout: Rc<GpuResourceSetLayout>) -> Self {
        if set >= self.resource_layout.len() {
            self.resource_layout.resize(set + 1, None);
        }

        self.resource_layout[set] = Some(layout);
        self
    }

    /// Program for a stage
    pub fn program(&self, stage: ShaderStage) -> Option<&Rc<GpuProgram>> {
        self.programs[stage.index()].as_ref()
    }

    /// Check that every program resource matches a slot in the layouts
    ///
    /// Every program must be for the stage it is stored under, and every
    /// resource it declares must name an existing layout slot of the same
    /// type.
    pub fn validate(&self) {
        for (index, program) in self.programs.iter().enumerate() {
            let Some(program) = program else { continue };

            check_msg!(
                program.stage().index() == index,
                "Program '{}' bound to the wrong pipeline stage",
                program.desc().name
            );

            for resource in program.resources() {
                let layout = self.resource_layout.get(resource.set).and_then(Option::as_ref);
                check_msg!(
                    layout.is_some(),
                    "Program '{}' resource '{}' uses set {} which has no layout",
                    program.desc().name,
                    resource.name,
                    resource.set
                );

                let slot_type = layout
                    .and_then(|layout| layout.desc().slots.get(resource.slot))
                    .map(|slot| slot.resource_type);
                check_msg!(
                    slot_type == Some(resource.resource_type),
                    "Program '{}' resource '{}' type mismatch at set {} slot {} ({:?} vs {:?})",
                    program.desc().name,
                    resource.name,
                    resource.set,
                    resource.slot,
                    resource.resource_type,
                    slot_type
                );
            }
        }
    }
}

/// Pipeline object
pub type GpuPipeline = GpuState<GpuPipelineDesc>;
