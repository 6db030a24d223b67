use super::*;
use crate::BakeResult;
use fnv::FnvHashMap;

fn print_pass_order(
    graph: &FrameGraph,
    pass_order: &[FramePassId],
) {
    log::trace!("Execution order of unculled passes:");
    for &pass_id in pass_order {
        log::trace!("  Pass {:?} {:?}", pass_id, graph.pass(pass_id).name());
    }
}

fn print_final_textures(textures: &[FrameGraphTextureData]) {
    log::trace!("Physical textures:");
    for (index, texture) in textures.iter().enumerate() {
        log::trace!(
            "  Texture {} {:?} {:?} {:?} {:?} layers: {} usage: {:?} reusable: {}",
            index,
            texture.name,
            texture.texture_type,
            texture.format,
            texture.size,
            texture.layer_count,
            texture.usage,
            texture.can_be_reused
        );

        if let Some(view_data) = &texture.view_data {
            log::trace!("    view of {:?}", view_data);
        }

        if texture.external_texture.is_some() {
            log::trace!("    external");
        }
    }
}

fn print_pass_barriers(
    graph: &FrameGraph,
    pass_order: &[FramePassId],
    pass_barriers: &FnvHashMap<FramePassId, FramePassBarriers>,
) {
    log::trace!("Barriers:");
    for pass_id in pass_order {
        let barriers = &pass_barriers[pass_id];
        log::trace!("  pass {:?} {:?}", pass_id, graph.pass(*pass_id).name());
        for barrier in &barriers.invalidation_barriers {
            log::trace!("    invalidate {:?}", barrier);
        }
        for barrier in &barriers.flush_barriers {
            log::trace!("    flush {:?}", barrier);
        }
    }
}

fn print_final_passes(passes: &[FrameGraphPhysicalPass]) {
    log::trace!("Physical passes:");
    for (index, pass) in passes.iter().enumerate() {
        log::trace!("  Pass {} {:?}", index, pass.name);
        for transition in &pass.transitions {
            log::trace!("    transition {:?}", transition);
        }
        for (attachment_index, attachment) in pass.render_pass_def.attachments.iter().enumerate() {
            log::trace!(
                "    attachment {} texture {:?} {:?}",
                attachment_index,
                pass.attachment_textures[attachment_index],
                attachment
            );
        }
        for dependency in &pass.render_pass_def.dependencies {
            log::trace!("    dependency {:?}", dependency);
        }
    }
}

/// The compiled form of a frame graph. This only includes the computed metadata and does not
/// allocate anything, `BakedFrameGraph` creates the device objects.
#[derive(Debug)]
pub struct FrameGraphPlan {
    pub(super) pass_order: Vec<FramePassId>,
    pub(super) passes: Vec<FrameGraphPhysicalPass>,
    pub(super) textures: Vec<FrameGraphTextureData>,
    pub(super) attachment_to_texture: FnvHashMap<AttachmentId, Option<TextureId>>,
    pub(super) pass_to_physical_pass: FnvHashMap<FramePassId, usize>,
}

impl FrameGraphPlan {
    #[profiling::function]
    pub(super) fn new(graph: &FrameGraph) -> BakeResult<FrameGraphPlan> {
        log::trace!("-- Create frame graph plan --");

        //
        // Index which passes read and write each attachment
        //
        let read_write_list = build_read_write_list(graph);

        //
        // Walk backwards from the passes that write the outputs, through every pass that writes
        // something they read. Passes that contribute nothing to an output are culled.
        //
        log::trace!("-- Determine pass order --");
        let pass_order = determine_pass_order(graph, &read_write_list)?;
        print_pass_order(graph, &pass_order);

        //
        // Resolve attachments to textures. Attachments whose lifetimes don't overlap share a
        // texture when their format and size match.
        //
        log::trace!("-- Assign physical textures --");
        let assign_physical_textures_result = assign_physical_textures(graph, &pass_order)?;
        print_final_textures(&assign_physical_textures_result.textures);

        //
        // Group passes into render passes
        //
        log::trace!("-- Assign physical passes --");
        let AssignPhysicalPassesResult {
            mut passes,
            pass_to_physical_pass,
        } = assign_physical_passes(graph, &pass_order);

        //
        // Determine what state each pass needs its textures in, and the state it leaves them in
        //
        log::trace!("-- Build pass barriers --");
        let pass_barriers =
            build_pass_barriers(graph, &pass_order, &assign_physical_textures_result)?;
        print_pass_barriers(graph, &pass_order, &pass_barriers);

        //
        // Merge those into one transition per texture before each physical pass
        //
        log::trace!("-- Build physical pass barriers --");
        build_physical_pass_barriers(
            assign_physical_textures_result.textures.len(),
            &pass_barriers,
            &mut passes,
        );

        //
        // Describe the render pass of each physical pass
        //
        log::trace!("-- Build render passes --");
        build_render_passes(
            graph,
            &read_write_list,
            &assign_physical_textures_result,
            &pass_to_physical_pass,
            &mut passes,
        );
        print_final_passes(&passes);

        Ok(FrameGraphPlan {
            pass_order,
            passes,
            textures: assign_physical_textures_result.textures,
            attachment_to_texture: assign_physical_textures_result.attachment_to_texture,
            pass_to_physical_pass,
        })
    }

    /// Passes that were not culled, in execution order
    pub fn pass_order(&self) -> &[FramePassId] {
        &self.pass_order
    }

    pub fn passes(&self) -> &[FrameGraphPhysicalPass] {
        &self.passes
    }

    pub fn textures(&self) -> &[FrameGraphTextureData] {
        &self.textures
    }

    pub fn texture(
        &self,
        texture_id: TextureId,
    ) -> &FrameGraphTextureData {
        &self.textures[texture_id.0]
    }

    /// Texture used for an attachment. None for dummy attachments and attachments no retained
    /// pass uses.
    pub fn attachment_texture_id(
        &self,
        attachment_id: AttachmentId,
    ) -> Option<TextureId> {
        self.attachment_to_texture
            .get(&attachment_id)
            .copied()
            .flatten()
    }

    /// Index into `passes()` of the physical pass a pass was merged into. None if it was culled.
    pub fn physical_pass_index(
        &self,
        pass_id: FramePassId,
    ) -> Option<usize> {
        self.pass_to_physical_pass.get(&pass_id).copied()
    }
}
