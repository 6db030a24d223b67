use super::*;
use fnv::FnvHashMap;
use framegraph_api::{FgClearValue, FgRenderPassDef, FgTextureLayout};

/// One of the passes that make up a physical pass. Each subpass keeps the callbacks of the pass it
/// came from.
#[derive(Clone)]
pub struct FrameGraphSubpass {
    pub(super) pass_id: FramePassId,
    pub(super) name: String,
    pub(super) command_callback: Option<FramePassCommandCallback>,
    pub(super) execution_callback: Option<FramePassExecutionCallback>,
}

impl std::fmt::Debug for FrameGraphSubpass {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FrameGraphSubpass")
            .field("pass_id", &self.pass_id)
            .field("name", &self.name)
            .field("has_command_callback", &self.command_callback.is_some())
            .field("has_execution_callback", &self.execution_callback.is_some())
            .finish()
    }
}

impl FrameGraphSubpass {
    pub fn pass_id(&self) -> FramePassId {
        self.pass_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A group of passes that execute within a single render pass
#[derive(Debug)]
pub struct FrameGraphPhysicalPass {
    pub(super) name: String,
    pub(super) subpasses: Vec<FrameGraphSubpass>,
    pub(super) render_pass_def: FgRenderPassDef,
    // Texture bound to each render pass attachment
    pub(super) attachment_textures: Vec<TextureId>,
    // One per render pass attachment
    pub(super) clear_values: Vec<Option<FgClearValue>>,
    pub(super) output_textures: Vec<TextureId>,
    // Recorded before the render pass begins
    pub(super) transitions: Vec<FrameGraphTextureTransition>,
    // Layout each texture must be in when the pass begins, and the layout it is left in
    pub(super) texture_layouts: FnvHashMap<TextureId, (FgTextureLayout, FgTextureLayout)>,
}

impl FrameGraphPhysicalPass {
    fn new(name: String) -> Self {
        FrameGraphPhysicalPass {
            name,
            subpasses: Default::default(),
            render_pass_def: Default::default(),
            attachment_textures: Default::default(),
            clear_values: Default::default(),
            output_textures: Default::default(),
            transitions: Default::default(),
            texture_layouts: Default::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subpasses(&self) -> &[FrameGraphSubpass] {
        &self.subpasses
    }

    pub fn render_pass_def(&self) -> &FgRenderPassDef {
        &self.render_pass_def
    }

    pub fn attachment_textures(&self) -> &[TextureId] {
        &self.attachment_textures
    }

    pub fn clear_values(&self) -> &[Option<FgClearValue>] {
        &self.clear_values
    }

    /// Textures this pass writes
    pub fn output_textures(&self) -> &[TextureId] {
        &self.output_textures
    }

    pub fn transitions(&self) -> &[FrameGraphTextureTransition] {
        &self.transitions
    }
}

/// Result of the assign_physical_passes step
#[derive(Debug)]
pub(super) struct AssignPhysicalPassesResult {
    pub(super) passes: Vec<FrameGraphPhysicalPass>,
    pub(super) pass_to_physical_pass: FnvHashMap<FramePassId, usize>,
}

// Passes can only share a render pass if everything the later one reads from the earlier one is
// read as an input attachment at the same pixel. Nothing declares that yet, so every pass gets its
// own render pass.
fn should_merge(
    _graph: &FrameGraph,
    _previous: FramePassId,
    _next: FramePassId,
) -> bool {
    false
}

/// Group consecutive passes into physical passes
#[profiling::function]
pub(super) fn assign_physical_passes(
    graph: &FrameGraph,
    pass_order: &[FramePassId],
) -> AssignPhysicalPassesResult {
    let mut groups: Vec<Vec<FramePassId>> = Vec::default();
    for &pass_id in pass_order {
        let merge = match groups.last() {
            Some(group) => group
                .iter()
                .all(|&previous| should_merge(graph, previous, pass_id)),
            None => false,
        };

        if merge {
            if let Some(group) = groups.last_mut() {
                group.push(pass_id);
            }
        } else {
            groups.push(vec![pass_id]);
        }
    }

    let mut passes = Vec::with_capacity(groups.len());
    let mut pass_to_physical_pass = FnvHashMap::default();
    for (physical_pass_index, group) in groups.into_iter().enumerate() {
        let name = group
            .iter()
            .map(|&pass_id| graph.pass(pass_id).name())
            .collect::<Vec<_>>()
            .join(" + ");

        let mut physical_pass = FrameGraphPhysicalPass::new(name);
        for pass_id in group {
            let pass = graph.pass(pass_id);
            physical_pass.subpasses.push(FrameGraphSubpass {
                pass_id,
                name: pass.name().to_string(),
                command_callback: pass.command_callback(),
                execution_callback: pass.execution_callback(),
            });

            pass_to_physical_pass.insert(pass_id, physical_pass_index);
        }

        log::trace!(
            "  physical pass {} {:?}",
            physical_pass_index,
            physical_pass.name
        );
        passes.push(physical_pass);
    }

    AssignPhysicalPassesResult {
        passes,
        pass_to_physical_pass,
    }
}
