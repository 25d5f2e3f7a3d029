//! Resource set binding for the GL backend
//!
//! GL has no resource sets, only flat per-type binding point ranges: indexed
//! uniform buffer binding points and texture units. Each resource set number
//! gets a fixed share of each range, and within a set the slots of each type
//! are numbered in order. So a layout with slots
//! `[UniformBuffer, Texture, Texture, UniformBuffer]` bound as set 1 maps to
//! uniform bindings `[9, 10]` and texture units `[12, 13]`.

use crate::check;
use crate::check_msg;
use crate::gpu::defs::resource_sets::NUM_RESOURCE_SETS;
use crate::gpu::resource::{GpuResourceSetLayoutDesc, GpuResourceType};

/// Number of uniform buffer binding points used for resource sets
pub const MAX_UNIFORM_BUFFER_BINDINGS: usize = 36;

/// Number of texture units used for resource sets
pub const MAX_TEXTURE_BINDINGS: usize = 48;

/// Uniform buffer binding points per resource set
pub const MAX_UNIFORM_BUFFERS_PER_SET: usize = MAX_UNIFORM_BUFFER_BINDINGS / NUM_RESOURCE_SETS;

/// Texture units per resource set
pub const MAX_TEXTURES_PER_SET: usize = MAX_TEXTURE_BINDINGS / NUM_RESOURCE_SETS;

/// Native data of a resource set layout: slot to binding point mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlResourceSetLayout {
    mapping: Vec<Option<(GpuResourceType, usize)>>,
}

impl GlResourceSetLayout {
    /// Compute the mapping for a layout
    pub fn new(desc: &GpuResourceSetLayoutDesc) -> Self {
        let mut next_uniform_buffer = 0;
        let mut next_texture = 0;

        let mapping = desc
            .slots
            .iter()
            .map(|slot| match slot.resource_type {
                GpuResourceType::UniformBuffer => {
                    check_msg!(
                        next_uniform_buffer < MAX_UNIFORM_BUFFERS_PER_SET,
                        "Exceeded maximum number of uniform buffers per resource set"
                    );
                    next_uniform_buffer += 1;
                    Some((slot.resource_type, next_uniform_buffer - 1))
                }
                GpuResourceType::Texture => {
                    check_msg!(
                        next_texture < MAX_TEXTURES_PER_SET,
                        "Exceeded maximum number of textures per resource set"
                    );
                    next_texture += 1;
                    Some((slot.resource_type, next_texture - 1))
                }
                GpuResourceType::None => None,
            })
            .collect();

        Self { mapping }
    }

    /// Binding point for a slot when the layout is bound to a set number
    ///
    /// The result is a uniform buffer binding index for uniform buffer slots
    /// and a texture unit for texture slots.
    pub fn map_slot(&self, set: usize, slot: usize) -> u32 {
        check!(set < NUM_RESOURCE_SETS);
        check!(slot < self.mapping.len());

        let Some((resource_type, offset)) = self.mapping.get(slot).copied().flatten() else {
            crate::fatal!("GL: Resource slot {} has no binding point", slot);
        };

        let per_set = match resource_type {
            GpuResourceType::UniformBuffer => MAX_UNIFORM_BUFFERS_PER_SET,
            _ => MAX_TEXTURES_PER_SET,
        };

        (set * per_set + offset) as u32
    }
}
