use super::*;
use crate::{BakeError, BakeResult};
use fnv::FnvHashMap;
use framegraph_api::{
    FgExtents2D, FgFormat, FgPlaneFlags, FgTexture, FgTextureDef, FgTextureType, FgTextureUsage,
    FgTextureViewDef,
};
use std::sync::Arc;

/// Index of a physical texture in `FrameGraphPlan::textures`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(super) usize);

impl TextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Set on textures that are views of another texture
#[derive(Clone, Debug, PartialEq)]
pub struct FrameGraphTextureViewData {
    // Never a view itself, views of views are flattened
    pub parent: TextureId,
    pub layer_offset: u32,
    pub layer_count: u32,
    pub planes: FgPlaneFlags,
}

/// A physical texture. Several attachments may share one when their lifetimes don't overlap.
#[derive(Clone, Debug)]
pub struct FrameGraphTextureData {
    pub name: String,
    pub texture_type: FgTextureType,
    pub format: FgFormat,
    pub size: FrameGraphTextureSize,
    pub layer_count: u32,
    pub usage: FgTextureUsage,
    pub can_be_reused: bool,
    pub view_data: Option<FrameGraphTextureViewData>,
    pub external_texture: Option<Arc<dyn FgTexture>>,
}

impl FrameGraphTextureData {
    pub fn is_view(&self) -> bool {
        self.view_data.is_some()
    }

    pub fn is_external(&self) -> bool {
        self.external_texture.is_some()
    }

    /// Definition used to create the texture on the device. Not meaningful for views and external
    /// textures.
    pub fn texture_def(
        &self,
        surface_info: &FrameGraphSurfaceInfo,
    ) -> BakeResult<FgTextureDef> {
        Ok(FgTextureDef {
            texture_type: self.texture_type,
            format: self.format,
            extents: self.size.extents(surface_info)?,
            layer_count: self.layer_count,
            usage: self.usage,
        })
    }

    pub fn view_def(&self) -> Option<FgTextureViewDef> {
        self.view_data.as_ref().map(|view_data| FgTextureViewDef {
            texture_type: self.texture_type,
            format: self.format,
            first_layer: view_data.layer_offset,
            layer_count: view_data.layer_count,
            planes: view_data.planes,
        })
    }
}

/// The texture barriers are tracked against. A view spanning every layer of its parent shares the
/// parent's state, a view of some of the layers is tracked on its own.
pub(super) fn barrier_texture(
    textures: &[FrameGraphTextureData],
    texture_id: TextureId,
) -> TextureId {
    if let Some(view_data) = &textures[texture_id.0].view_data {
        let parent = &textures[view_data.parent.0];
        if view_data.layer_offset == 0 && view_data.layer_count == parent.layer_count {
            return view_data.parent;
        }
    }

    texture_id
}

/// The texture that owns the memory, the parent for views
pub(super) fn root_texture(
    textures: &[FrameGraphTextureData],
    texture_id: TextureId,
) -> TextureId {
    textures[texture_id.0]
        .view_data
        .as_ref()
        .map(|view_data| view_data.parent)
        .unwrap_or(texture_id)
}

fn view_texture_type(
    parent_type: FgTextureType,
    layer_offset: u32,
    layer_count: u32,
) -> FgTextureType {
    if layer_count == 1 {
        FgTextureType::Texture2D
    } else if parent_type == FgTextureType::Cubemap && layer_offset == 0 && layer_count == 6 {
        FgTextureType::Cubemap
    } else {
        FgTextureType::Texture2DArray
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct VirtualTextureId(usize);

#[derive(Debug)]
enum VirtualTextureKind {
    Owned {
        texture_type: FgTextureType,
        format: FgFormat,
        size: FrameGraphTextureSize,
        layer_count: u32,
    },
    External {
        texture: Arc<dyn FgTexture>,
    },
    View {
        parent: VirtualTextureId,
        format: FgFormat,
        layer_offset: u32,
        layer_count: u32,
        planes: FgPlaneFlags,
    },
}

// A texture as seen by the attachments that use it, before textures with non-overlapping
// lifetimes are merged into the same physical texture
#[derive(Debug)]
struct VirtualTexture {
    name: String,
    kind: VirtualTextureKind,
    usage: FgTextureUsage,
    can_be_reused: bool,
    // Index into the pass order of the first and last pass that uses the texture
    first_use: Option<usize>,
    last_use: Option<usize>,
}

impl VirtualTexture {
    fn touch(
        &mut self,
        pass_index: usize,
    ) {
        self.first_use = Some(self.first_use.map_or(pass_index, |x| x.min(pass_index)));
        self.last_use = Some(self.last_use.map_or(pass_index, |x| x.max(pass_index)));
    }
}

/// Result of the assign_physical_textures step
#[derive(Debug)]
pub(super) struct AssignPhysicalTexturesResult {
    pub(super) textures: Vec<FrameGraphTextureData>,
    pub(super) attachment_to_texture: FnvHashMap<AttachmentId, Option<TextureId>>,
}

impl AssignPhysicalTexturesResult {
    pub(super) fn texture(
        &self,
        attachment_id: AttachmentId,
    ) -> Option<TextureId> {
        self.attachment_to_texture
            .get(&attachment_id)
            .copied()
            .flatten()
    }
}

// Everything needed while assigning textures. Lives only for one bake.
struct TextureAssignmentContext<'a> {
    graph: &'a FrameGraph,
    virtual_textures: Vec<VirtualTexture>,
    attachment_to_virtual: FnvHashMap<AttachmentId, Option<VirtualTextureId>>,
    physical_textures: Vec<FrameGraphTextureData>,
    texture_pools: FnvHashMap<FgTextureType, Vec<TextureId>>,
}

impl<'a> TextureAssignmentContext<'a> {
    fn new(graph: &'a FrameGraph) -> Self {
        TextureAssignmentContext {
            graph,
            virtual_textures: Default::default(),
            attachment_to_virtual: Default::default(),
            physical_textures: Default::default(),
            texture_pools: Default::default(),
        }
    }

    fn push_virtual(
        &mut self,
        name: String,
        kind: VirtualTextureKind,
    ) -> VirtualTextureId {
        let virtual_id = VirtualTextureId(self.virtual_textures.len());
        self.virtual_textures.push(VirtualTexture {
            name,
            kind,
            usage: FgTextureUsage::empty(),
            can_be_reused: true,
            first_use: None,
            last_use: None,
        });
        virtual_id
    }

    // Attachments that declare their own texture may have an external texture bound instead
    fn push_owned_or_external(
        &mut self,
        attachment_id: AttachmentId,
        name: &str,
        texture_type: FgTextureType,
        format: FgFormat,
        size: FrameGraphTextureSize,
        layer_count: u32,
    ) -> BakeResult<VirtualTextureId> {
        if let Some(texture) = self.graph.external_textures.get(&attachment_id) {
            let texture_def = texture.texture_def();
            if texture_def.texture_type != texture_type
                || texture_def.format != format
                || texture_def.layer_count != layer_count
            {
                log::warn!(
                    "Texture bound to attachment {:?} {:?} is {:?} but the attachment expects {:?} {:?} with {} layers",
                    attachment_id,
                    name,
                    texture_def,
                    texture_type,
                    format,
                    layer_count
                );
                return Err(BakeError::ExternalTextureMismatch(attachment_id));
            }

            return Ok(self.push_virtual(
                name.to_string(),
                VirtualTextureKind::External {
                    texture: texture.clone(),
                },
            ));
        }

        Ok(self.push_virtual(
            name.to_string(),
            VirtualTextureKind::Owned {
                texture_type,
                format,
                size,
                layer_count,
            },
        ))
    }

    // Returns (root, first layer, layer count, format, planes) of the range a view of the given
    // texture would cover
    fn view_range(
        &self,
        virtual_id: VirtualTextureId,
    ) -> (VirtualTextureId, u32, u32, FgFormat, FgPlaneFlags) {
        match &self.virtual_textures[virtual_id.0].kind {
            VirtualTextureKind::Owned {
                format,
                layer_count,
                ..
            } => (virtual_id, 0, *layer_count, *format, FgPlaneFlags::ALL),
            VirtualTextureKind::External { texture } => {
                let texture_def = texture.texture_def();
                (
                    virtual_id,
                    0,
                    texture_def.layer_count,
                    texture_def.format,
                    FgPlaneFlags::ALL,
                )
            }
            VirtualTextureKind::View {
                parent,
                format,
                layer_offset,
                layer_count,
                planes,
            } => (*parent, *layer_offset, *layer_count, *format, *planes),
        }
    }

    fn register_virtual(
        &mut self,
        attachment_id: AttachmentId,
    ) -> BakeResult<Option<VirtualTextureId>> {
        if let Some(virtual_id) = self.attachment_to_virtual.get(&attachment_id) {
            return Ok(*virtual_id);
        }

        let graph = self.graph;
        let virtual_id = match graph.attachment(attachment_id) {
            FrameGraphAttachment::Texture2D(attachment) => Some(self.push_owned_or_external(
                attachment_id,
                &attachment.name,
                FgTextureType::Texture2D,
                attachment.format,
                attachment.size,
                1,
            )?),
            FrameGraphAttachment::Texture2DArray(attachment) => {
                Some(self.push_owned_or_external(
                    attachment_id,
                    &attachment.name,
                    FgTextureType::Texture2DArray,
                    attachment.format,
                    attachment.size,
                    attachment.layer_count,
                )?)
            }
            FrameGraphAttachment::Cubemap(attachment) => Some(self.push_owned_or_external(
                attachment_id,
                &attachment.name,
                FgTextureType::Cubemap,
                attachment.format,
                attachment.size,
                6,
            )?),
            FrameGraphAttachment::External(attachment) => {
                let texture = graph
                    .external_textures
                    .get(&attachment_id)
                    .ok_or(BakeError::ExternalAttachmentNotBound(attachment_id))?;

                Some(self.push_virtual(
                    attachment.name.clone(),
                    VirtualTextureKind::External {
                        texture: texture.clone(),
                    },
                ))
            }
            FrameGraphAttachment::Proxy(proxy) => self.register_virtual(proxy.parent)?,
            FrameGraphAttachment::Layer(layer) => match self.register_virtual(layer.parent)? {
                Some(parent) => {
                    let (root, layer_offset, layer_count, format, planes) =
                        self.view_range(parent);
                    if layer.layer_index >= layer_count {
                        return Err(BakeError::InvalidLayer {
                            attachment: attachment_id,
                            layer_index: layer.layer_index,
                        });
                    }

                    let name = format!(
                        "{} (layer {})",
                        self.virtual_textures[parent.0].name, layer.layer_index
                    );
                    Some(self.push_virtual(
                        name,
                        VirtualTextureKind::View {
                            parent: root,
                            format,
                            layer_offset: layer_offset + layer.layer_index,
                            layer_count: 1,
                            planes,
                        },
                    ))
                }
                None => None,
            },
            FrameGraphAttachment::View(view) => match self.register_virtual(view.parent)? {
                Some(parent) => {
                    let (root, layer_offset, layer_count, format, _) = self.view_range(parent);
                    let name = format!("{} (view)", self.virtual_textures[parent.0].name);
                    Some(self.push_virtual(
                        name,
                        VirtualTextureKind::View {
                            parent: root,
                            format: view.format.unwrap_or(format),
                            layer_offset,
                            layer_count,
                            planes: view.planes,
                        },
                    ))
                }
                None => None,
            },
            FrameGraphAttachment::Dummy => None,
        };

        self.attachment_to_virtual.insert(attachment_id, virtual_id);
        Ok(virtual_id)
    }

    // Register the attachment if needed and extend its lifetime to include the given pass
    fn use_attachment(
        &mut self,
        attachment_id: AttachmentId,
        pass_index: usize,
        usage: FgTextureUsage,
    ) -> BakeResult<Option<VirtualTextureId>> {
        let virtual_id = self.register_virtual(attachment_id)?;
        if let Some(virtual_id) = virtual_id {
            let virtual_texture = &mut self.virtual_textures[virtual_id.0];
            virtual_texture.touch(pass_index);
            virtual_texture.usage |= usage;

            // The parent must stay alive as long as any view of it
            if let VirtualTextureKind::View { parent, .. } = virtual_texture.kind {
                self.virtual_textures[parent.0].touch(pass_index);
            }
        }

        Ok(virtual_id)
    }

    fn assign_virtual_textures(
        &mut self,
        pass_order: &[FramePassId],
    ) -> BakeResult<()> {
        let graph = self.graph;

        // Only attachments that own a texture can have it replaced by an external one
        let mut bound_attachments: Vec<_> = graph.external_textures.keys().copied().collect();
        bound_attachments.sort();
        for attachment_id in bound_attachments {
            if !graph
                .attachment(attachment_id)
                .can_bind_external_texture()
            {
                return Err(BakeError::InvalidExternalBinding(attachment_id));
            }
        }

        for (pass_index, &pass_id) in pass_order.iter().enumerate() {
            let pass = graph.pass(pass_id);
            log::trace!("  pass {:?} {:?}", pass_id, pass.name());

            for input in pass.inputs() {
                self.use_attachment(input.attachment_id, pass_index, input.usage)?;
            }

            for output in pass.outputs() {
                self.use_attachment(output.attachment_id, pass_index, output.usage)?;
            }

            let depth_stencil_input = match pass.depth_stencil_input() {
                Some(input) => self.use_attachment(input.attachment_id, pass_index, input.usage)?,
                None => None,
            };

            if let Some(output) = pass.depth_stencil_output() {
                let input_attachment_id = pass.depth_stencil_input().map(|x| x.attachment_id);
                if let (Some(input_attachment_id), Some(input_virtual_id)) =
                    (input_attachment_id, depth_stencil_input)
                {
                    // Writing depth-stencil through a different attachment than the one read must
                    // still write the same texture
                    if input_attachment_id != output.attachment_id {
                        let existing = self
                            .attachment_to_virtual
                            .get(&output.attachment_id)
                            .copied();
                        match existing {
                            Some(existing) if existing != Some(input_virtual_id) => {
                                return Err(BakeError::DepthStencilOutputAlreadyAssigned(pass_id));
                            }
                            Some(_) => {}
                            None => {
                                log::trace!(
                                    "    alias depth-stencil output {:?} onto input {:?}",
                                    output.attachment_id,
                                    input_attachment_id
                                );
                                self.attachment_to_virtual
                                    .insert(output.attachment_id, Some(input_virtual_id));
                            }
                        }
                    }
                }

                self.use_attachment(output.attachment_id, pass_index, output.usage)?;
            }
        }

        // Outputs must survive the graph and be readable by whoever consumes them
        for &output in &graph.outputs {
            if let Some(virtual_id) = self.register_virtual(output)? {
                let virtual_texture = &mut self.virtual_textures[virtual_id.0];
                virtual_texture.can_be_reused = false;
                virtual_texture.usage |=
                    FgTextureUsage::SHADER_SAMPLING | FgTextureUsage::TRANSFER_SOURCE;

                if let VirtualTextureKind::View { parent, .. } = virtual_texture.kind {
                    self.virtual_textures[parent.0].can_be_reused = false;
                }
            }
        }

        Ok(())
    }

    fn push_physical(
        &mut self,
        texture: FrameGraphTextureData,
    ) -> TextureId {
        let texture_id = TextureId(self.physical_textures.len());
        self.physical_textures.push(texture);
        texture_id
    }

    fn acquire_pooled(
        &mut self,
        texture_type: FgTextureType,
        format: FgFormat,
        size: FrameGraphTextureSize,
        layer_count: u32,
    ) -> Option<TextureId> {
        let physical_textures = &self.physical_textures;
        let pool = self.texture_pools.get_mut(&texture_type)?;
        let position = pool.iter().position(|texture_id| {
            let texture = &physical_textures[texture_id.0];
            texture.format == format && texture.size == size && texture.layer_count == layer_count
        })?;

        Some(pool.remove(position))
    }

    fn allocate_physical(
        &mut self,
        virtual_id: VirtualTextureId,
        virtual_to_physical: &[Option<TextureId>],
    ) -> TextureId {
        let virtual_texture = &self.virtual_textures[virtual_id.0];
        let usage = virtual_texture.usage;
        let can_be_reused = virtual_texture.can_be_reused;
        let name = virtual_texture.name.clone();

        let texture_id = match &virtual_texture.kind {
            VirtualTextureKind::Owned {
                texture_type,
                format,
                size,
                layer_count,
            } => {
                let (texture_type, format, size, layer_count) =
                    (*texture_type, *format, *size, *layer_count);
                if let Some(texture_id) =
                    self.acquire_pooled(texture_type, format, size, layer_count)
                {
                    log::trace!(
                        "    reuse texture {:?} {:?} for {:?}",
                        texture_id,
                        self.physical_textures[texture_id.0].name,
                        name
                    );
                    texture_id
                } else {
                    self.push_physical(FrameGraphTextureData {
                        name,
                        texture_type,
                        format,
                        size,
                        layer_count,
                        usage: FgTextureUsage::empty(),
                        can_be_reused: true,
                        view_data: None,
                        external_texture: None,
                    })
                }
            }
            VirtualTextureKind::External { texture } => {
                let texture_def = texture.texture_def();
                let physical = FrameGraphTextureData {
                    name,
                    texture_type: texture_def.texture_type,
                    format: texture_def.format,
                    size: FrameGraphTextureSize::fixed(
                        texture_def.extents.width,
                        texture_def.extents.height,
                    ),
                    layer_count: texture_def.layer_count,
                    usage: FgTextureUsage::empty(),
                    can_be_reused: false,
                    view_data: None,
                    external_texture: Some(texture.clone()),
                };
                self.push_physical(physical)
            }
            VirtualTextureKind::View {
                parent,
                format,
                layer_offset,
                layer_count,
                planes,
            } => {
                // Parents are registered, and so allocated, before their views
                let parent_id = virtual_to_physical[parent.0]
                    .expect("view allocated before its parent texture");
                let parent_texture = &self.physical_textures[parent_id.0];
                let physical = FrameGraphTextureData {
                    name,
                    texture_type: view_texture_type(
                        parent_texture.texture_type,
                        *layer_offset,
                        *layer_count,
                    ),
                    format: *format,
                    size: parent_texture.size,
                    layer_count: *layer_count,
                    usage: FgTextureUsage::empty(),
                    can_be_reused: false,
                    view_data: Some(FrameGraphTextureViewData {
                        parent: parent_id,
                        layer_offset: *layer_offset,
                        layer_count: *layer_count,
                        planes: *planes,
                    }),
                    external_texture: None,
                };
                self.push_physical(physical)
            }
        };

        let physical = &mut self.physical_textures[texture_id.0];
        physical.usage |= usage;
        physical.can_be_reused &= can_be_reused;
        texture_id
    }

    fn assign_physical_textures(
        &mut self,
        pass_count: usize,
    ) -> Vec<Option<TextureId>> {
        let mut virtual_to_physical = vec![None; self.virtual_textures.len()];

        for pass_index in 0..pass_count {
            // Textures first used by this pass
            for virtual_index in 0..self.virtual_textures.len() {
                if self.virtual_textures[virtual_index].first_use == Some(pass_index) {
                    let texture_id =
                        self.allocate_physical(VirtualTextureId(virtual_index), &virtual_to_physical);
                    virtual_to_physical[virtual_index] = Some(texture_id);
                }
            }

            // Textures last used by this pass go back into the pool for later passes
            for virtual_index in 0..self.virtual_textures.len() {
                let virtual_texture = &self.virtual_textures[virtual_index];
                if virtual_texture.last_use != Some(pass_index) || !virtual_texture.can_be_reused {
                    continue;
                }

                if let VirtualTextureKind::Owned { texture_type, .. } = virtual_texture.kind {
                    if let Some(texture_id) = virtual_to_physical[virtual_index] {
                        log::trace!(
                            "    texture {:?} {:?} is free after pass index {}",
                            texture_id,
                            virtual_texture.name,
                            pass_index
                        );
                        self.texture_pools
                            .entry(texture_type)
                            .or_default()
                            .push(texture_id);
                    }
                }
            }
        }

        // Views are created from their parent, so the parent needs every usage of its views
        for texture_index in (0..self.physical_textures.len()).rev() {
            let texture = &self.physical_textures[texture_index];
            if let Some(view_data) = &texture.view_data {
                let parent = view_data.parent;
                let usage = texture.usage;
                self.physical_textures[parent.0].usage |= usage;
            }
        }

        virtual_to_physical
    }
}

/// Resolve every attachment used by the retained passes to a physical texture. Textures are
/// shared between attachments whose lifetimes don't overlap.
#[profiling::function]
pub(super) fn assign_physical_textures(
    graph: &FrameGraph,
    pass_order: &[FramePassId],
) -> BakeResult<AssignPhysicalTexturesResult> {
    let mut context = TextureAssignmentContext::new(graph);

    log::trace!("  Assign virtual textures");
    context.assign_virtual_textures(pass_order)?;

    log::trace!("  Assign physical textures");
    let virtual_to_physical = context.assign_physical_textures(pass_order.len());

    let attachment_to_texture = context
        .attachment_to_virtual
        .iter()
        .map(|(attachment_id, virtual_id)| {
            (
                *attachment_id,
                virtual_id.and_then(|virtual_id| virtual_to_physical[virtual_id.0]),
            )
        })
        .collect();

    Ok(AssignPhysicalTexturesResult {
        textures: context.physical_textures,
        attachment_to_texture,
    })
}

/// Extents of a physical texture. Views are the size of their parent.
pub(super) fn texture_extents(
    texture: &FrameGraphTextureData,
    surface_info: &FrameGraphSurfaceInfo,
) -> BakeResult<FgExtents2D> {
    match &texture.external_texture {
        Some(external_texture) => Ok(external_texture.texture_def().extents),
        None => texture.size.extents(surface_info),
    }
}
