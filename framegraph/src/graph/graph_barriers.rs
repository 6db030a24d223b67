use super::*;
use crate::{BakeError, BakeResult};
use fnv::FnvHashMap;
use framegraph_api::{FgMemoryAccess, FgPipelineStage, FgTextureLayout};

/// The state a pass needs a texture in before it runs (invalidation), or leaves it in after it
/// runs (flush)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameGraphBarrier {
    pub texture: TextureId,
    pub access: FgMemoryAccess,
    pub stages: FgPipelineStage,
    pub layout: FgTextureLayout,
}

/// A barrier recorded before a physical pass, moving a texture from the state the previous pass
/// left it in to the state this pass needs
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameGraphTextureTransition {
    pub texture: TextureId,
    pub old_layout: FgTextureLayout,
    pub new_layout: FgTextureLayout,
    pub src_access: FgMemoryAccess,
    pub src_stages: FgPipelineStage,
    pub dst_access: FgMemoryAccess,
    pub dst_stages: FgPipelineStage,
}

#[derive(Default, Debug)]
pub(super) struct FramePassBarriers {
    pub(super) invalidation_barriers: Vec<FrameGraphBarrier>,
    pub(super) flush_barriers: Vec<FrameGraphBarrier>,
    pub(super) assumed_layouts: FnvHashMap<TextureId, FgTextureLayout>,
}

fn add_barrier(
    barriers: &mut Vec<FrameGraphBarrier>,
    pass_id: FramePassId,
    texture: TextureId,
    access: FgMemoryAccess,
    stages: FgPipelineStage,
    layout: FgTextureLayout,
) -> BakeResult<()> {
    if let Some(barrier) = barriers.iter_mut().find(|x| x.texture == texture) {
        if barrier.layout != layout {
            log::warn!(
                "Pass {:?} needs texture {:?} in both {:?} and {:?}",
                pass_id,
                texture,
                barrier.layout,
                layout
            );
            return Err(BakeError::LayoutMismatch {
                pass: pass_id,
                texture,
            });
        }

        barrier.access |= access;
        barrier.stages |= stages;
    } else {
        barriers.push(FrameGraphBarrier {
            texture,
            access,
            stages,
            layout,
        });
    }

    Ok(())
}

/// Determine what each pass needs from the textures it reads and what it leaves behind in the
/// textures it writes
#[profiling::function]
pub(super) fn build_pass_barriers(
    graph: &FrameGraph,
    pass_order: &[FramePassId],
    assign_physical_textures_result: &AssignPhysicalTexturesResult,
) -> BakeResult<FnvHashMap<FramePassId, FramePassBarriers>> {
    let textures = &assign_physical_textures_result.textures;
    let barrier_texture_for = |attachment_id: AttachmentId| {
        assign_physical_textures_result
            .texture(attachment_id)
            .map(|texture_id| barrier_texture(textures, texture_id))
    };

    let mut pass_barriers = FnvHashMap::default();
    for &pass_id in pass_order {
        let pass = graph.pass(pass_id);
        let mut barriers = FramePassBarriers::default();

        for input in pass.inputs() {
            // Inputs that don't read only order the passes
            if !input.does_read {
                continue;
            }

            if let Some(texture) = barrier_texture_for(input.attachment_id) {
                add_barrier(
                    &mut barriers.invalidation_barriers,
                    pass_id,
                    texture,
                    input.access,
                    input.stages,
                    input.layout,
                )?;

                if let Some(assumed_layout) = input.assumed_layout {
                    barriers.assumed_layouts.insert(texture, assumed_layout);
                }
            }
        }

        for output in pass.outputs() {
            if let Some(texture) = barrier_texture_for(output.attachment_id) {
                add_barrier(
                    &mut barriers.flush_barriers,
                    pass_id,
                    texture,
                    output.access,
                    output.stages,
                    output.layout,
                )?;
            }
        }

        let depth_stencil_input = pass
            .depth_stencil_input()
            .filter(|input| input.does_read)
            .and_then(|input| Some((input, barrier_texture_for(input.attachment_id)?)));
        let depth_stencil_output = pass
            .depth_stencil_output()
            .and_then(|output| Some((output, barrier_texture_for(output.attachment_id)?)));

        match (depth_stencil_input, depth_stencil_output) {
            (Some((input, input_texture)), Some((output, output_texture)))
                if input_texture == output_texture =>
            {
                // Read-modify-write, the texture must be in the writable layout for the whole pass
                add_barrier(
                    &mut barriers.invalidation_barriers,
                    pass_id,
                    input_texture,
                    input.access | output.access,
                    input.stages | output.stages,
                    output.layout,
                )?;
                add_barrier(
                    &mut barriers.flush_barriers,
                    pass_id,
                    output_texture,
                    output.access,
                    output.stages,
                    output.layout,
                )?;

                if let Some(assumed_layout) = input.assumed_layout {
                    barriers.assumed_layouts.insert(input_texture, assumed_layout);
                }
            }
            (input, output) => {
                if let Some((input, input_texture)) = input {
                    add_barrier(
                        &mut barriers.invalidation_barriers,
                        pass_id,
                        input_texture,
                        input.access,
                        input.stages,
                        input.layout,
                    )?;

                    if let Some(assumed_layout) = input.assumed_layout {
                        barriers.assumed_layouts.insert(input_texture, assumed_layout);
                    }
                }

                if let Some((output, output_texture)) = output {
                    add_barrier(
                        &mut barriers.flush_barriers,
                        pass_id,
                        output_texture,
                        output.access,
                        output.stages,
                        output.layout,
                    )?;
                }
            }
        }

        pass_barriers.insert(pass_id, barriers);
    }

    Ok(pass_barriers)
}

// Writing a texture implies being able to read it first, since the first write in a pass may
// blend with or test against what is already there
fn invalidation_for_flush(
    access: FgMemoryAccess,
    stages: FgPipelineStage,
) -> (FgMemoryAccess, FgPipelineStage) {
    let mut access = access;
    if access.intersects(FgMemoryAccess::COLOR_WRITE) {
        access |= FgMemoryAccess::COLOR_READ;
    }
    if access.intersects(FgMemoryAccess::DEPTH_STENCIL_WRITE) {
        access |= FgMemoryAccess::DEPTH_STENCIL_READ;
    }
    if access.intersects(FgMemoryAccess::SHADER_WRITE) {
        access |= FgMemoryAccess::SHADER_READ;
    }

    let mut stages = stages;
    if stages.intersects(FgPipelineStage::FRAGMENT_TESTS_LATE) {
        stages |= FgPipelineStage::FRAGMENT_TESTS_EARLY;
    }

    (access, stages)
}

// State of a texture within one physical pass
#[derive(Default, Debug)]
struct PhysicalPassTextureState {
    invalidated_access: FgMemoryAccess,
    invalidated_stages: FgPipelineStage,
    flushed_access: FgMemoryAccess,
    flushed_stages: FgPipelineStage,
    initial_layout: Option<FgTextureLayout>,
    final_layout: FgTextureLayout,
}

// State a texture was left in by the last physical pass that used it
#[derive(Default, Debug)]
struct CarriedTextureState {
    flushed_access: FgMemoryAccess,
    flushed_stages: FgPipelineStage,
    layout: FgTextureLayout,
}

/// Merge the barriers of the passes within each physical pass and emit one transition per texture
/// before each physical pass
#[profiling::function]
pub(super) fn build_physical_pass_barriers(
    texture_count: usize,
    pass_barriers: &FnvHashMap<FramePassId, FramePassBarriers>,
    physical_passes: &mut [FrameGraphPhysicalPass],
) {
    let mut carried_states: Vec<CarriedTextureState> = (0..texture_count)
        .map(|_| CarriedTextureState::default())
        .collect();

    for physical_pass in physical_passes {
        let mut states: Vec<Option<PhysicalPassTextureState>> =
            (0..texture_count).map(|_| None).collect();
        let mut assumed_layouts = FnvHashMap::default();

        for subpass in &physical_pass.subpasses {
            let barriers = &pass_barriers[&subpass.pass_id];

            for (&texture, &layout) in &barriers.assumed_layouts {
                assumed_layouts.entry(texture).or_insert(layout);
            }

            for invalidation in &barriers.invalidation_barriers {
                let state = states[invalidation.texture.0].get_or_insert_with(Default::default);
                if state.initial_layout.is_none() {
                    state.invalidated_access |= invalidation.access;
                    state.invalidated_stages |= invalidation.stages;
                    state.initial_layout = Some(invalidation.layout);
                }

                state.final_layout = invalidation.layout;
                state.flushed_access = FgMemoryAccess::empty();
                state.flushed_stages = FgPipelineStage::empty();
            }

            for flush in &barriers.flush_barriers {
                let state = states[flush.texture.0].get_or_insert_with(Default::default);
                state.flushed_access |= flush.access;
                state.flushed_stages |= flush.stages;
                state.final_layout = flush.layout;

                // First use in the pass is a write, it still needs a matching invalidation
                if state.initial_layout.is_none() {
                    let (access, stages) = invalidation_for_flush(flush.access, flush.stages);
                    state.invalidated_access = access;
                    state.invalidated_stages = stages;
                    state.initial_layout = Some(flush.layout);
                }
            }
        }

        for (texture_index, state) in states.into_iter().enumerate() {
            let state = match state {
                Some(state) => state,
                None => continue,
            };

            let texture = TextureId(texture_index);
            let initial_layout = state.initial_layout.unwrap_or(state.final_layout);
            let carried = &mut carried_states[texture_index];

            let mut src_stages = carried.flushed_stages;
            if src_stages.is_empty() {
                src_stages = FgPipelineStage::TOP_OF_PIPE;
            }

            let mut dst_stages = state.invalidated_stages;
            if dst_stages.is_empty() {
                dst_stages = FgPipelineStage::BOTTOM_OF_PIPE;
            }

            let transition = FrameGraphTextureTransition {
                texture,
                old_layout: assumed_layouts
                    .get(&texture)
                    .copied()
                    .unwrap_or(carried.layout),
                new_layout: initial_layout,
                src_access: carried.flushed_access,
                src_stages,
                dst_access: state.invalidated_access,
                dst_stages,
            };
            log::trace!("    {:?} {:?}", physical_pass.name, transition);
            physical_pass.transitions.push(transition);
            physical_pass
                .texture_layouts
                .insert(texture, (initial_layout, state.final_layout));

            // If nothing was written, later writes must still wait for the reads
            carried.layout = state.final_layout;
            carried.flushed_access = state.flushed_access;
            carried.flushed_stages = if state.flushed_stages.is_empty() {
                state.invalidated_stages
            } else {
                state.flushed_stages
            };
        }
    }
}
