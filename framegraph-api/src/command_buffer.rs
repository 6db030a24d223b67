use crate::{
    FgClearValue, FgExtents2D, FgMemoryAccess, FgPipelineStage, FgRenderPass, FgResult,
    FgTexture, FgTextureLayout,
};

/// A memory barrier and layout transition for a single texture
#[derive(Debug)]
pub struct FgTextureBarrier<'a> {
    pub texture: &'a dyn FgTexture,
    pub src_stages: FgPipelineStage,
    pub src_access: FgMemoryAccess,
    pub src_layout: FgTextureLayout,
    pub dst_stages: FgPipelineStage,
    pub dst_access: FgMemoryAccess,
    pub dst_layout: FgTextureLayout,
}

/// Everything needed to begin a render pass
#[derive(Debug)]
pub struct FgRenderPassBeginInfo<'a> {
    pub render_pass: &'a dyn FgRenderPass,
    // One per render pass attachment
    pub attachments: &'a [&'a dyn FgTexture],
    // One per render pass attachment, None if the attachment is not cleared
    pub clear_values: &'a [Option<FgClearValue>],
    pub render_area: FgExtents2D,
}

/// Records commands for the GPU. The frame graph only records barriers and render pass
/// begin/end, everything else is recorded by pass callbacks.
pub trait FgCommandBuffer {
    fn texture_barriers(
        &mut self,
        barriers: &[FgTextureBarrier],
    ) -> FgResult<()>;

    fn begin_render_pass(
        &mut self,
        begin_info: &FgRenderPassBeginInfo,
    ) -> FgResult<()>;

    fn next_subpass(&mut self) -> FgResult<()>;

    fn end_render_pass(&mut self) -> FgResult<()>;

    fn begin_debug_region(
        &mut self,
        _name: &str,
    ) {
    }

    fn end_debug_region(&mut self) {}
}
