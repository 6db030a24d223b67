use crate::graph::{AttachmentId, BakedFrameGraph};
use framegraph_api::{
    FgColorClearValue, FgCommandBuffer, FgDepthStencilClearValue, FgMemoryAccess,
    FgPipelineStage, FgPlaneFlags, FgResult, FgTextureLayout, FgTextureUsage,
};
use std::sync::Arc;

/// Unique ID of a pass registered with a `FrameGraph`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramePassId(pub(super) usize);

impl FramePassId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Returned every frame by a pass's execution callback
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePassExecution {
    /// Record nothing for this pass this frame. Barriers and the render pass itself are still
    /// recorded so that layouts stay consistent for later passes.
    Skip,
    Execute,
    /// Execute, and let the command callback know its inputs changed since the last frame
    UpdateAndExecute,
}

pub struct FramePassCommandArgs<'a> {
    pub command_buffer: &'a mut dyn FgCommandBuffer,
    pub graph: &'a BakedFrameGraph,
    pub pass_id: FramePassId,
    pub subpass_index: usize,
    pub execution: FramePassExecution,
}

pub type FramePassCommandCallback =
    Arc<dyn Fn(FramePassCommandArgs) -> FgResult<()> + Send + Sync>;

pub type FramePassExecutionCallback = Arc<dyn Fn() -> FramePassExecution + Send + Sync>;

/// An attachment read by a pass
#[derive(Clone, Debug, PartialEq)]
pub struct FramePassInput {
    pub attachment_id: AttachmentId,
    pub usage: FgTextureUsage,
    pub access: FgMemoryAccess,
    pub stages: FgPipelineStage,
    pub layout: FgTextureLayout,
    // If false, the input only orders this pass after the attachment's writers
    pub does_read: bool,
    // Skip the transition into this input and assume the texture is already in this layout
    pub assumed_layout: Option<FgTextureLayout>,
}

/// An attachment written by a pass
#[derive(Clone, Debug, PartialEq)]
pub struct FramePassOutput {
    pub attachment_id: AttachmentId,
    pub usage: FgTextureUsage,
    pub access: FgMemoryAccess,
    pub stages: FgPipelineStage,
    pub layout: FgTextureLayout,
    pub clear_color: Option<FgColorClearValue>,
}

/// One declared unit of work. Passes have no inherent order, the graph derives it from the
/// attachments they read and write.
pub struct FramePass {
    id: FramePassId,
    name: String,
    inputs: Vec<FramePassInput>,
    outputs: Vec<FramePassOutput>,
    depth_stencil_input: Option<FramePassInput>,
    depth_stencil_output: Option<FramePassOutput>,
    depth_stencil_clear: Option<FgDepthStencilClearValue>,
    depth_stencil_write_planes: FgPlaneFlags,
    execution_callback: Option<FramePassExecutionCallback>,
    command_callback: Option<FramePassCommandCallback>,
}

impl std::fmt::Debug for FramePass {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("FramePass")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("depth_stencil_input", &self.depth_stencil_input)
            .field("depth_stencil_output", &self.depth_stencil_output)
            .finish()
    }
}

impl FramePass {
    pub(super) fn new(
        id: FramePassId,
        name: String,
    ) -> Self {
        FramePass {
            id,
            name,
            inputs: Default::default(),
            outputs: Default::default(),
            depth_stencil_input: None,
            depth_stencil_output: None,
            depth_stencil_clear: None,
            depth_stencil_write_planes: FgPlaneFlags::DEPTH_STENCIL,
            execution_callback: None,
            command_callback: None,
        }
    }

    pub fn id(&self) -> FramePassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[FramePassInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[FramePassOutput] {
        &self.outputs
    }

    pub fn depth_stencil_input(&self) -> Option<&FramePassInput> {
        self.depth_stencil_input.as_ref()
    }

    pub fn depth_stencil_output(&self) -> Option<&FramePassOutput> {
        self.depth_stencil_output.as_ref()
    }

    pub fn depth_stencil_clear(&self) -> Option<FgDepthStencilClearValue> {
        self.depth_stencil_clear
    }

    pub(super) fn execution_callback(&self) -> Option<FramePassExecutionCallback> {
        self.execution_callback.clone()
    }

    pub(super) fn command_callback(&self) -> Option<FramePassCommandCallback> {
        self.command_callback.clone()
    }

    /// Sample the attachment from the fragment shader. Returns the input index, used to adjust
    /// the input with the `set_input_*` functions.
    pub fn add_input(
        &mut self,
        attachment_id: AttachmentId,
    ) -> usize {
        let index = self.inputs.len();
        self.inputs.push(FramePassInput {
            attachment_id,
            usage: FgTextureUsage::SHADER_SAMPLING,
            access: FgMemoryAccess::SHADER_READ,
            stages: FgPipelineStage::FRAGMENT_SHADER,
            layout: FgTextureLayout::ColorInput,
            does_read: true,
            assumed_layout: None,
        });
        index
    }

    /// Render to the attachment as a color attachment. Returns the output index, used to adjust
    /// the output with the `set_output_*` functions.
    pub fn add_output(
        &mut self,
        attachment_id: AttachmentId,
    ) -> usize {
        let index = self.outputs.len();
        self.outputs.push(FramePassOutput {
            attachment_id,
            usage: FgTextureUsage::COLOR_ATTACHMENT,
            access: FgMemoryAccess::COLOR_READ | FgMemoryAccess::COLOR_WRITE,
            stages: FgPipelineStage::COLOR_OUTPUT,
            layout: FgTextureLayout::ColorOutput,
            clear_color: None,
        });
        index
    }

    pub fn set_input_access(
        &mut self,
        input_index: usize,
        access: FgMemoryAccess,
        stages: FgPipelineStage,
    ) {
        let input = &mut self.inputs[input_index];
        input.access = access;
        input.stages = stages;
    }

    pub fn set_input_layout(
        &mut self,
        input_index: usize,
        layout: FgTextureLayout,
    ) {
        self.inputs[input_index].layout = layout;
    }

    pub fn set_input_usage(
        &mut self,
        input_index: usize,
        usage: FgTextureUsage,
    ) {
        self.inputs[input_index].usage = usage;
    }

    pub fn set_read_input(
        &mut self,
        input_index: usize,
        does_read: bool,
    ) {
        self.inputs[input_index].does_read = does_read;
    }

    pub fn set_input_assumed_layout(
        &mut self,
        input_index: usize,
        layout: FgTextureLayout,
    ) {
        self.inputs[input_index].assumed_layout = Some(layout);
    }

    pub fn set_output_access(
        &mut self,
        output_index: usize,
        access: FgMemoryAccess,
        stages: FgPipelineStage,
    ) {
        let output = &mut self.outputs[output_index];
        output.access = access;
        output.stages = stages;
    }

    pub fn set_output_layout(
        &mut self,
        output_index: usize,
        layout: FgTextureLayout,
    ) {
        self.outputs[output_index].layout = layout;
    }

    pub fn set_output_usage(
        &mut self,
        output_index: usize,
        usage: FgTextureUsage,
    ) {
        self.outputs[output_index].usage = usage;
    }

    pub fn set_clear_color(
        &mut self,
        output_index: usize,
        clear_color: Option<FgColorClearValue>,
    ) {
        self.outputs[output_index].clear_color = clear_color;
    }

    /// Depth test against the attachment without writing it
    pub fn set_depth_stencil_input(
        &mut self,
        attachment_id: AttachmentId,
    ) {
        self.depth_stencil_input = Some(FramePassInput {
            attachment_id,
            usage: FgTextureUsage::DEPTH_STENCIL_ATTACHMENT,
            access: FgMemoryAccess::DEPTH_STENCIL_READ,
            stages: FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE,
            layout: FgTextureLayout::DepthStencilReadOnly,
            does_read: true,
            assumed_layout: None,
        });
    }

    /// Write depth/stencil to the attachment. When the same pass also has a depth-stencil input,
    /// both must resolve to the same texture.
    ///
    /// A pass that reads and writes the same attachment id is a writer of that id, so every later
    /// pass reading it depends on it. Two passes that both read and write one id depend on each
    /// other and planning fails with `CyclicDependency`. Chain them through
    /// `FrameGraph::add_attachment_proxy` instead: the second pass reads the attachment and
    /// writes a proxy of it, and the passes after it read the proxy.
    pub fn set_depth_stencil_output(
        &mut self,
        attachment_id: AttachmentId,
    ) {
        self.depth_stencil_output = Some(FramePassOutput {
            attachment_id,
            usage: FgTextureUsage::DEPTH_STENCIL_ATTACHMENT,
            access: FgMemoryAccess::DEPTH_STENCIL_WRITE,
            stages: FgPipelineStage::FRAGMENT_TESTS_LATE,
            layout: FgTextureLayout::depth_stencil_for_write_planes(
                self.depth_stencil_write_planes,
            ),
            clear_color: None,
        });
    }

    pub fn set_depth_stencil_clear(
        &mut self,
        depth: f32,
        stencil: u32,
    ) {
        self.depth_stencil_clear = Some(FgDepthStencilClearValue { depth, stencil });
    }

    /// Which of the depth and stencil planes the depth-stencil output writes. Picks the least
    /// restrictive layout for the output.
    pub fn set_depth_stencil_write_planes(
        &mut self,
        planes: FgPlaneFlags,
    ) {
        self.depth_stencil_write_planes = planes;
        if let Some(output) = &mut self.depth_stencil_output {
            output.layout = FgTextureLayout::depth_stencil_for_write_planes(planes);
        }
    }

    pub fn set_execution_callback<CallbackFnT>(
        &mut self,
        f: CallbackFnT,
    ) where
        CallbackFnT: Fn() -> FramePassExecution + 'static + Send + Sync,
    {
        self.execution_callback = Some(Arc::new(f));
    }

    /// Sets the callback that records the pass's commands
    pub fn set_command_callback<CallbackFnT>(
        &mut self,
        f: CallbackFnT,
    ) where
        CallbackFnT: Fn(FramePassCommandArgs) -> FgResult<()> + 'static + Send + Sync,
    {
        // If this trips, multiple callbacks were set on the pass
        assert!(self.command_callback.is_none());
        self.command_callback = Some(Arc::new(f));
    }
}
