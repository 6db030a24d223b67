use super::*;
use crate::BakeResult;
use framegraph_api::{
    FgCommandBuffer, FgDevice, FgExtents2D, FgRenderPass, FgRenderPassBeginInfo, FgResult,
    FgTexture, FgTextureBarrier,
};
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Extents of the viewers (windows, render targets, etc.) that viewer-relative attachments are
/// sized against, indexed by viewer index
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FrameGraphSurfaceInfo {
    pub viewer_extents: Vec<FgExtents2D>,
}

impl FrameGraphSurfaceInfo {
    /// A single viewer of the given size
    pub fn new(
        width: u32,
        height: u32,
    ) -> Self {
        FrameGraphSurfaceInfo {
            viewer_extents: vec![FgExtents2D { width, height }],
        }
    }
}

/// A frame graph with all of its textures and render passes created. Execute it every frame.
pub struct BakedFrameGraph {
    plan: FrameGraphPlan,
    textures: Vec<Arc<dyn FgTexture>>,
    texture_extents: Vec<FgExtents2D>,
    render_passes: Vec<Arc<dyn FgRenderPass>>,
    surface_info: FrameGraphSurfaceInfo,
}

impl std::fmt::Debug for BakedFrameGraph {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BakedFrameGraph")
            .field("plan", &self.plan)
            .field("texture_extents", &self.texture_extents)
            .field("surface_info", &self.surface_info)
            .finish()
    }
}

impl BakedFrameGraph {
    #[profiling::function]
    pub(super) fn new(
        plan: FrameGraphPlan,
        device: &dyn FgDevice,
        surface_info: &FrameGraphSurfaceInfo,
        cache: &mut FrameGraphResourceCache,
    ) -> BakeResult<Self> {
        log::trace!("-- Bake frame graph --");
        let texture_extents = plan
            .textures
            .iter()
            .map(|texture| texture_extents(texture, surface_info))
            .collect::<BakeResult<Vec<_>>>()?;

        let textures = cache.allocate_textures(device, &plan, surface_info)?;
        let render_passes = cache.allocate_render_passes(device, &plan)?;

        Ok(BakedFrameGraph {
            plan,
            textures,
            texture_extents,
            render_passes,
            surface_info: surface_info.clone(),
        })
    }

    pub fn plan(&self) -> &FrameGraphPlan {
        &self.plan
    }

    pub fn passes(&self) -> &[FrameGraphPhysicalPass] {
        &self.plan.passes
    }

    pub fn render_pass(
        &self,
        physical_pass_index: usize,
    ) -> &Arc<dyn FgRenderPass> {
        &self.render_passes[physical_pass_index]
    }

    pub fn textures(&self) -> &[Arc<dyn FgTexture>] {
        &self.textures
    }

    pub fn texture(
        &self,
        texture_id: TextureId,
    ) -> &Arc<dyn FgTexture> {
        &self.textures[texture_id.0]
    }

    pub fn texture_extents(
        &self,
        texture_id: TextureId,
    ) -> FgExtents2D {
        self.texture_extents[texture_id.0]
    }

    pub fn attachment_texture_id(
        &self,
        attachment_id: AttachmentId,
    ) -> Option<TextureId> {
        self.plan.attachment_texture_id(attachment_id)
    }

    /// Texture created for an attachment, typically used by pass callbacks to bind the
    /// attachments they sample
    pub fn attachment_texture(
        &self,
        attachment_id: AttachmentId,
    ) -> Option<&Arc<dyn FgTexture>> {
        self.attachment_texture_id(attachment_id)
            .map(|texture_id| &self.textures[texture_id.0])
    }

    pub fn physical_pass_index(
        &self,
        pass_id: FramePassId,
    ) -> Option<usize> {
        self.plan.physical_pass_index(pass_id)
    }

    pub fn surface_info(&self) -> &FrameGraphSurfaceInfo {
        &self.surface_info
    }

    fn insert_barriers(
        &self,
        command_buffer: &mut dyn FgCommandBuffer,
        transitions: &[FrameGraphTextureTransition],
    ) -> FgResult<()> {
        assert!(!transitions.is_empty());

        let mut texture_barriers = Vec::with_capacity(transitions.len());
        for transition in transitions {
            log::trace!(
                "add texture barrier for texture {:?} layout {:?} -> {:?}",
                transition.texture,
                transition.old_layout,
                transition.new_layout
            );

            texture_barriers.push(FgTextureBarrier {
                texture: self.textures[transition.texture.0].as_ref(),
                src_stages: transition.src_stages,
                src_access: transition.src_access,
                src_layout: transition.old_layout,
                dst_stages: transition.dst_stages,
                dst_access: transition.dst_access,
                dst_layout: transition.new_layout,
            });
        }

        command_buffer.texture_barriers(&texture_barriers)
    }

    /// Record every pass. Barriers and render passes are always recorded, a pass whose execution
    /// callback returns `Skip` just doesn't get its command callback called.
    pub fn execute(
        &self,
        command_buffer: &mut dyn FgCommandBuffer,
    ) -> FgResult<()> {
        profiling::scope!("Execute Graph");

        for (pass_index, pass) in self.plan.passes.iter().enumerate() {
            profiling::scope!("pass", pass.name());
            command_buffer.begin_debug_region(pass.name());

            if !pass.transitions.is_empty() {
                self.insert_barriers(command_buffer, &pass.transitions)?;
            }

            let attachments: Vec<&dyn FgTexture> = pass
                .attachment_textures
                .iter()
                .map(|texture_id| self.textures[texture_id.0].as_ref())
                .collect();
            let render_area = pass
                .attachment_textures
                .first()
                .map(|texture_id| self.texture_extents[texture_id.0])
                .unwrap_or_default();

            command_buffer.begin_render_pass(&FgRenderPassBeginInfo {
                render_pass: self.render_passes[pass_index].as_ref(),
                attachments: &attachments,
                clear_values: &pass.clear_values,
                render_area,
            })?;

            for (subpass_index, subpass) in pass.subpasses.iter().enumerate() {
                if subpass_index > 0 {
                    command_buffer.next_subpass()?;
                }

                let execution = subpass
                    .execution_callback
                    .as_ref()
                    .map(|callback| (callback)())
                    .unwrap_or(FramePassExecution::Execute);

                if execution == FramePassExecution::Skip {
                    log::trace!("skip pass {:?} {:?}", subpass.pass_id, subpass.name);
                    continue;
                }

                if let Some(callback) = &subpass.command_callback {
                    (callback)(FramePassCommandArgs {
                        command_buffer: &mut *command_buffer,
                        graph: self,
                        pass_id: subpass.pass_id,
                        subpass_index,
                        execution,
                    })?;
                }
            }

            command_buffer.end_render_pass()?;
            command_buffer.end_debug_region();
        }

        Ok(())
    }

    /// Recreate the textures whose size depends on a viewer whose extents changed. Passes,
    /// barriers and render passes don't depend on texture sizes and are kept. Returns true if any
    /// texture was recreated, in which case anything that references the old textures must be
    /// rebuilt. If the device fails to create a texture, the graph is left unchanged.
    #[profiling::function]
    pub fn resize(
        &mut self,
        device: &dyn FgDevice,
        surface_info: &FrameGraphSurfaceInfo,
    ) -> BakeResult<bool> {
        log::trace!("-- Resize frame graph --");
        let mut textures = self.textures.clone();
        let mut texture_extents = self.texture_extents.clone();
        let mut recreated = vec![false; self.plan.textures.len()];

        // Parents always come before their views, so views see the recreated parent
        for (index, texture_data) in self.plan.textures.iter().enumerate() {
            if texture_data.external_texture.is_some() {
                continue;
            }

            if let (Some(view_data), Some(view_def)) =
                (&texture_data.view_data, texture_data.view_def())
            {
                if recreated[view_data.parent.0] {
                    let parent = textures[view_data.parent.0].clone();
                    textures[index] = device.create_texture_view(&parent, &view_def)?;
                    texture_extents[index] = texture_extents[view_data.parent.0];
                    recreated[index] = true;
                }
                continue;
            }

            if texture_data.size.viewer_index().is_none() {
                continue;
            }

            let texture_def = texture_data.texture_def(surface_info)?;
            if texture_def.extents == texture_extents[index] {
                continue;
            }

            log::trace!(
                "  Texture {} {:?} {:?} -> {:?}",
                index,
                texture_data.name,
                texture_extents[index],
                texture_def.extents
            );
            textures[index] = device.create_texture(&texture_def)?;
            texture_extents[index] = texture_def.extents;
            recreated[index] = true;
        }

        self.textures = textures;
        self.texture_extents = texture_extents;
        self.surface_info = surface_info.clone();
        Ok(recreated.iter().any(|x| *x))
    }
}
