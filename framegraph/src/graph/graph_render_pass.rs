use super::*;
use fnv::FnvHashMap;
use framegraph_api::{
    FgAttachmentDescription, FgAttachmentReference, FgClearValue, FgLoadOp, FgMemoryAccess,
    FgPipelineStage, FgRenderPassDef, FgStoreOp, FgSubpassDependency, FgSubpassDescription,
    FgSubpassIndex, FgTextureLayout,
};

fn push_unique(
    list: &mut Vec<TextureId>,
    texture: TextureId,
) {
    if !list.contains(&texture) {
        list.push(texture);
    }
}

// A depth-stencil attachment that is only read still has to be stored if anything after this
// physical pass reads the texture, or if it's an output of the graph
fn is_depth_stencil_needed_later(
    graph: &FrameGraph,
    read_write_list: &ReadWriteList,
    assign_physical_textures_result: &AssignPhysicalTexturesResult,
    pass_to_physical_pass: &FnvHashMap<FramePassId, usize>,
    texture: TextureId,
    physical_pass_index: usize,
) -> bool {
    let textures = &assign_physical_textures_result.textures;
    let root = root_texture(textures, texture);
    let resolves_to_texture = |attachment_id: AttachmentId| {
        assign_physical_textures_result
            .texture(attachment_id)
            .map(|texture_id| root_texture(textures, texture_id) == root)
            .unwrap_or(false)
    };

    if graph.outputs.iter().any(|&output| resolves_to_texture(output)) {
        return true;
    }

    read_write_list
        .readers
        .iter()
        .any(|(&attachment_id, readers)| {
            resolves_to_texture(attachment_id)
                && readers.iter().any(|reader| {
                    pass_to_physical_pass
                        .get(reader)
                        .map(|&reader_physical_pass| reader_physical_pass > physical_pass_index)
                        .unwrap_or(false)
                })
        })
}

#[derive(Default, Debug)]
struct SubpassSync {
    has_color_write: bool,
    has_depth_stencil_read: bool,
    has_depth_stencil_write: bool,
    external_color_synchronization: bool,
    external_depth_synchronization: bool,
}

// Adds preserve attachments to the subpasses and returns the dependencies between subpasses, and
// between the first subpasses and whatever ran before the render pass
fn build_subpass_dependencies(
    attachments: &[FgAttachmentDescription],
    subpasses: &mut [FgSubpassDescription],
) -> Vec<FgSubpassDependency> {
    let mut subpass_sync: Vec<SubpassSync> =
        (0..subpasses.len()).map(|_| Default::default()).collect();

    for (attachment_index, attachment) in attachments.iter().enumerate() {
        let attachment_index = attachment_index as u32;
        // Whether a previous subpass already used the attachment
        let mut used = false;

        for (subpass_index, subpass) in subpasses.iter_mut().enumerate() {
            let color_reference = subpass
                .color_attachments
                .iter()
                .find(|x| x.attachment_index == attachment_index)
                .copied();
            let depth_stencil_reference = subpass
                .depth_stencil_attachment
                .filter(|x| x.attachment_index == attachment_index);

            let sync = &mut subpass_sync[subpass_index];
            if let Some(color_reference) = color_reference {
                sync.has_color_write = true;

                // A layout change on first use must wait for whatever wrote the texture before
                if !used && attachment.initial_layout != color_reference.layout {
                    sync.external_color_synchronization = true;
                }
            } else if let Some(depth_stencil_reference) = depth_stencil_reference {
                if depth_stencil_reference.layout.is_depth_stencil_writable() {
                    sync.has_depth_stencil_write = true;
                }
                sync.has_depth_stencil_read = true;

                if !used && attachment.initial_layout != depth_stencil_reference.layout {
                    sync.external_depth_synchronization = true;
                }
            } else {
                if used {
                    subpass.preserve_attachments.push(attachment_index);
                }
                continue;
            }

            used = true;
        }
    }

    let mut dependencies = Vec::default();

    for (subpass_index, sync) in subpass_sync.iter().enumerate() {
        if !sync.external_color_synchronization && !sync.external_depth_synchronization {
            continue;
        }

        let mut dependency = FgSubpassDependency {
            from_subpass: FgSubpassIndex::External,
            from_stages: FgPipelineStage::empty(),
            from_access: FgMemoryAccess::empty(),
            to_subpass: FgSubpassIndex::Index(subpass_index as u32),
            to_stages: FgPipelineStage::empty(),
            to_access: FgMemoryAccess::empty(),
            tilable: true,
        };

        if sync.external_color_synchronization {
            dependency.from_stages |= FgPipelineStage::COLOR_OUTPUT;
            dependency.from_access |= FgMemoryAccess::COLOR_WRITE;
            dependency.to_stages |= FgPipelineStage::COLOR_OUTPUT;
            dependency.to_access |= FgMemoryAccess::COLOR_READ | FgMemoryAccess::COLOR_WRITE;
        }

        if sync.external_depth_synchronization {
            dependency.from_stages |= FgPipelineStage::FRAGMENT_TESTS_LATE;
            dependency.from_access |= FgMemoryAccess::DEPTH_STENCIL_WRITE;
            dependency.to_stages |=
                FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE;
            dependency.to_access |=
                FgMemoryAccess::DEPTH_STENCIL_READ | FgMemoryAccess::DEPTH_STENCIL_WRITE;
        }

        dependencies.push(dependency);
    }

    for subpass_index in 1..subpass_sync.len() {
        let previous = &subpass_sync[subpass_index - 1];
        let current = &subpass_sync[subpass_index];

        let mut dependency = FgSubpassDependency {
            from_subpass: FgSubpassIndex::Index(subpass_index as u32 - 1),
            from_stages: FgPipelineStage::empty(),
            from_access: FgMemoryAccess::empty(),
            to_subpass: FgSubpassIndex::Index(subpass_index as u32),
            to_stages: FgPipelineStage::empty(),
            to_access: FgMemoryAccess::empty(),
            tilable: true,
        };

        if previous.has_color_write {
            dependency.from_stages |= FgPipelineStage::COLOR_OUTPUT;
            dependency.from_access |= FgMemoryAccess::COLOR_WRITE;
        }

        if previous.has_depth_stencil_read {
            dependency.from_stages |=
                FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE;
            dependency.from_access |= FgMemoryAccess::DEPTH_STENCIL_READ;
        }

        if previous.has_depth_stencil_write {
            dependency.from_stages |=
                FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE;
            dependency.from_access |= FgMemoryAccess::DEPTH_STENCIL_WRITE;
        }

        if current.has_color_write {
            dependency.to_stages |= FgPipelineStage::COLOR_OUTPUT;
            dependency.to_access |= FgMemoryAccess::COLOR_READ | FgMemoryAccess::COLOR_WRITE;
        }

        if current.has_depth_stencil_read {
            dependency.to_stages |=
                FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE;
            dependency.to_access |= FgMemoryAccess::DEPTH_STENCIL_READ;
        }

        if current.has_depth_stencil_write {
            dependency.to_stages |=
                FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE;
            dependency.to_access |=
                FgMemoryAccess::DEPTH_STENCIL_READ | FgMemoryAccess::DEPTH_STENCIL_WRITE;
        }

        dependencies.push(dependency);
    }

    dependencies
}

/// Build the render pass definition of every physical pass. Barriers must already be computed
/// since attachment layouts come from them.
#[profiling::function]
pub(super) fn build_render_passes(
    graph: &FrameGraph,
    read_write_list: &ReadWriteList,
    assign_physical_textures_result: &AssignPhysicalTexturesResult,
    pass_to_physical_pass: &FnvHashMap<FramePassId, usize>,
    physical_passes: &mut [FrameGraphPhysicalPass],
) {
    let textures = &assign_physical_textures_result.textures;

    for (physical_pass_index, physical_pass) in physical_passes.iter_mut().enumerate() {
        let mut attachments = Vec::<FgAttachmentDescription>::default();
        let mut attachment_textures = Vec::<TextureId>::default();
        let mut clear_values = Vec::<Option<FgClearValue>>::default();
        let mut output_textures = Vec::<TextureId>::default();

        let texture_layouts = &physical_pass.texture_layouts;
        let layouts_for = |texture: TextureId, fallback: FgTextureLayout| {
            texture_layouts
                .get(&barrier_texture(textures, texture))
                .copied()
                .unwrap_or((fallback, fallback))
        };

        //
        // Color attachments of every subpass come first
        //
        let mut subpass_color_references = Vec::with_capacity(physical_pass.subpasses.len());
        for subpass in &physical_pass.subpasses {
            let pass = graph.pass(subpass.pass_id);
            let mut color_references = Vec::default();

            for output in pass.outputs() {
                let texture = match assign_physical_textures_result.texture(output.attachment_id)
                {
                    Some(texture) => texture,
                    None => continue,
                };

                push_unique(&mut output_textures, texture);

                let attachment_index = match attachment_textures.iter().position(|x| *x == texture)
                {
                    Some(attachment_index) => attachment_index,
                    None => {
                        let load_op = if output.clear_color.is_some() {
                            FgLoadOp::Clear
                        } else if pass
                            .inputs()
                            .iter()
                            .any(|input| input.attachment_id == output.attachment_id)
                        {
                            FgLoadOp::Load
                        } else {
                            FgLoadOp::Discard
                        };

                        let (initial_layout, final_layout) = layouts_for(texture, output.layout);
                        attachments.push(FgAttachmentDescription {
                            format: textures[texture.0].format,
                            load_op,
                            store_op: FgStoreOp::Store,
                            stencil_load_op: FgLoadOp::Discard,
                            stencil_store_op: FgStoreOp::Discard,
                            initial_layout: if load_op == FgLoadOp::Load {
                                initial_layout
                            } else {
                                FgTextureLayout::Undefined
                            },
                            final_layout,
                        });
                        attachment_textures.push(texture);
                        clear_values.push(output.clear_color.map(FgClearValue::Color));
                        attachments.len() - 1
                    }
                };

                color_references.push(FgAttachmentReference {
                    attachment_index: attachment_index as u32,
                    layout: output.layout,
                });
            }

            subpass_color_references.push(color_references);
        }

        //
        // Then the depth-stencil attachment, there is at most one per render pass
        //
        let mut depth_stencil_attachment: Option<(usize, TextureId)> = None;
        let mut subpass_depth_stencil_references = Vec::with_capacity(physical_pass.subpasses.len());
        for subpass in &physical_pass.subpasses {
            let pass = graph.pass(subpass.pass_id);
            let input = pass.depth_stencil_input().and_then(|input| {
                Some((
                    input,
                    assign_physical_textures_result.texture(input.attachment_id)?,
                ))
            });
            let output = pass.depth_stencil_output().and_then(|output| {
                Some((
                    output,
                    assign_physical_textures_result.texture(output.attachment_id)?,
                ))
            });

            let (texture, layout, load_op, store_op) = match (input, output) {
                (Some(_), Some((output, texture))) => {
                    (texture, output.layout, FgLoadOp::Load, FgStoreOp::Store)
                }
                (Some((input, texture)), None) => {
                    let store_op = if is_depth_stencil_needed_later(
                        graph,
                        read_write_list,
                        assign_physical_textures_result,
                        pass_to_physical_pass,
                        texture,
                        physical_pass_index,
                    ) {
                        FgStoreOp::Store
                    } else {
                        FgStoreOp::Discard
                    };

                    (texture, input.layout, FgLoadOp::Load, store_op)
                }
                (None, Some((output, texture))) => {
                    let load_op = if pass.depth_stencil_clear().is_some() {
                        FgLoadOp::Clear
                    } else {
                        FgLoadOp::Discard
                    };

                    (texture, output.layout, load_op, FgStoreOp::Store)
                }
                (None, None) => {
                    subpass_depth_stencil_references.push(None);
                    continue;
                }
            };

            push_unique(&mut output_textures, texture);

            let attachment_index = match depth_stencil_attachment {
                Some((attachment_index, existing_texture)) => {
                    assert_eq!(
                        existing_texture, texture,
                        "Subpasses of one render pass must share the depth-stencil texture"
                    );
                    attachment_index
                }
                None => {
                    let format = textures[texture.0].format;
                    let (stencil_load_op, stencil_store_op) = if format.has_stencil() {
                        (load_op, store_op)
                    } else {
                        (FgLoadOp::Discard, FgStoreOp::Discard)
                    };

                    let (initial_layout, final_layout) = layouts_for(texture, layout);
                    attachments.push(FgAttachmentDescription {
                        format,
                        load_op,
                        store_op,
                        stencil_load_op,
                        stencil_store_op,
                        initial_layout: if load_op == FgLoadOp::Load {
                            initial_layout
                        } else {
                            FgTextureLayout::Undefined
                        },
                        final_layout,
                    });
                    attachment_textures.push(texture);
                    clear_values.push(if load_op == FgLoadOp::Clear {
                        pass.depth_stencil_clear().map(FgClearValue::DepthStencil)
                    } else {
                        None
                    });

                    let attachment_index = attachments.len() - 1;
                    depth_stencil_attachment = Some((attachment_index, texture));
                    attachment_index
                }
            };

            subpass_depth_stencil_references.push(Some(FgAttachmentReference {
                attachment_index: attachment_index as u32,
                layout,
            }));
        }

        let mut subpasses: Vec<_> = subpass_color_references
            .into_iter()
            .zip(subpass_depth_stencil_references)
            .map(
                |(color_attachments, depth_stencil_attachment)| FgSubpassDescription {
                    color_attachments,
                    depth_stencil_attachment,
                    preserve_attachments: Default::default(),
                },
            )
            .collect();

        let dependencies = build_subpass_dependencies(&attachments, &mut subpasses);

        log::trace!(
            "  physical pass {} {:?}: {} attachments, {} subpasses, {} dependencies",
            physical_pass_index,
            physical_pass.name,
            attachments.len(),
            subpasses.len(),
            dependencies.len()
        );

        physical_pass.render_pass_def = FgRenderPassDef {
            attachments,
            subpasses,
            dependencies,
        };
        physical_pass.attachment_textures = attachment_textures;
        physical_pass.clear_values = clear_values;
        physical_pass.output_textures = output_textures;
    }
}
