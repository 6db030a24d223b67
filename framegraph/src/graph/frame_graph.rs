use super::*;
use crate::BakeResult;
use fnv::FnvHashMap;
use framegraph_api::{FgDevice, FgFormat, FgPlaneFlags, FgTexture};
use std::sync::Arc;

/// Declares attachments and the passes that read and write them. Nothing is allocated until the
/// graph is baked, and the graph may be baked any number of times.
#[derive(Default, Debug)]
pub struct FrameGraph {
    pub(super) attachments: Vec<FrameGraphAttachment>,
    pub(super) passes: Vec<FramePass>,
    pub(super) outputs: Vec<AttachmentId>,
    pub(super) external_textures: FnvHashMap<AttachmentId, Arc<dyn FgTexture>>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Default::default()
    }

    fn push_attachment(
        &mut self,
        attachment: FrameGraphAttachment,
    ) -> AttachmentId {
        if let Some(parent) = attachment.parent() {
            assert!(
                parent.0 < self.attachments.len(),
                "Parent attachment {:?} does not exist",
                parent
            );
        }

        let attachment_id = AttachmentId(self.attachments.len());
        self.attachments.push(attachment);
        attachment_id
    }

    pub fn add_attachment(
        &mut self,
        attachment: FramePassAttachment,
    ) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::Texture2D(attachment))
    }

    pub fn add_attachment_array(
        &mut self,
        attachment: FramePassAttachmentArray,
    ) -> AttachmentId {
        assert!(attachment.layer_count > 0);
        self.push_attachment(FrameGraphAttachment::Texture2DArray(attachment))
    }

    pub fn add_attachment_cube(
        &mut self,
        attachment: FramePassAttachmentCube,
    ) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::Cubemap(attachment))
    }

    /// Refer to one layer of an array or cubemap attachment
    pub fn add_attachment_layer(
        &mut self,
        parent: AttachmentId,
        layer_index: u32,
    ) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::Layer(FramePassAttachmentLayer {
            parent,
            layer_index,
        }))
    }

    /// Refer to an attachment through a view. A `None` format keeps the parent's format.
    pub fn add_attachment_view(
        &mut self,
        parent: AttachmentId,
        format: Option<FgFormat>,
        planes: FgPlaneFlags,
    ) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::View(FramePassAttachmentView {
            parent,
            format,
            planes,
        }))
    }

    /// A new name for an existing attachment. A pass that writes the proxy is a different writer
    /// than one that writes the parent, which is how a pass can read an attachment and write its
    /// result back into the same texture.
    pub fn add_attachment_proxy<T: Into<String>>(
        &mut self,
        name: T,
        parent: AttachmentId,
    ) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::Proxy(FramePassAttachmentProxy {
            name: name.into(),
            parent,
        }))
    }

    /// An attachment that must be bound to a texture with `bind_external_texture` before baking
    pub fn add_external_attachment<T: Into<String>>(
        &mut self,
        name: T,
    ) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::External(FramePassAttachmentExternal {
            name: name.into(),
        }))
    }

    pub fn add_dummy_attachment(&mut self) -> AttachmentId {
        self.push_attachment(FrameGraphAttachment::Dummy)
    }

    pub fn add_pass<T: Into<String>>(
        &mut self,
        name: T,
    ) -> &mut FramePass {
        let pass_id = FramePassId(self.passes.len());
        self.passes.push(FramePass::new(pass_id, name.into()));
        &mut self.passes[pass_id.0]
    }

    pub fn pass_mut(
        &mut self,
        pass_id: FramePassId,
    ) -> &mut FramePass {
        &mut self.passes[pass_id.0]
    }

    /// Mark an attachment as a result of the graph. Only passes that contribute to an output are
    /// kept, and textures backing an output are never reused for anything else.
    pub fn add_output(
        &mut self,
        attachment_id: AttachmentId,
    ) {
        assert!(attachment_id.0 < self.attachments.len());
        if !self.outputs.contains(&attachment_id) {
            self.outputs.push(attachment_id);
        }
    }

    /// Use a caller-owned texture for the attachment instead of allocating one. Only attachments
    /// that would own a texture can be bound, this is checked when baking.
    pub fn bind_external_texture(
        &mut self,
        attachment_id: AttachmentId,
        texture: Arc<dyn FgTexture>,
    ) {
        assert!(attachment_id.0 < self.attachments.len());
        self.external_textures.insert(attachment_id, texture);
    }

    pub fn unbind_external_texture(
        &mut self,
        attachment_id: AttachmentId,
    ) -> Option<Arc<dyn FgTexture>> {
        self.external_textures.remove(&attachment_id)
    }

    pub fn attachment(
        &self,
        attachment_id: AttachmentId,
    ) -> &FrameGraphAttachment {
        &self.attachments[attachment_id.0]
    }

    pub fn attachments(&self) -> &[FrameGraphAttachment] {
        &self.attachments
    }

    pub fn pass(
        &self,
        pass_id: FramePassId,
    ) -> &FramePass {
        &self.passes[pass_id.0]
    }

    pub fn passes(&self) -> &[FramePass] {
        &self.passes
    }

    pub fn outputs(&self) -> &[AttachmentId] {
        &self.outputs
    }

    /// Compile the graph without touching a device
    pub fn plan(&self) -> BakeResult<FrameGraphPlan> {
        FrameGraphPlan::new(self)
    }

    /// Compile the graph and create everything it needs on the device
    pub fn bake(
        &self,
        device: &dyn FgDevice,
        surface_info: &FrameGraphSurfaceInfo,
    ) -> BakeResult<BakedFrameGraph> {
        let mut cache = FrameGraphResourceCache::new(0);
        self.bake_with_cache(device, surface_info, &mut cache)
    }

    /// Like `bake`, but reuses textures and render passes from previous bakes when their
    /// definitions match
    pub fn bake_with_cache(
        &self,
        device: &dyn FgDevice,
        surface_info: &FrameGraphSurfaceInfo,
        cache: &mut FrameGraphResourceCache,
    ) -> BakeResult<BakedFrameGraph> {
        let plan = self.plan()?;
        BakedFrameGraph::new(plan, device, surface_info, cache)
    }
}
