use crate::graph::*;
use crate::BakeError;
use crossbeam_channel::{Receiver, Sender};
use framegraph_api::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct TestTexture {
    texture_def: FgTextureDef,
    view_def: Option<FgTextureViewDef>,
    drop_tx: Sender<FgTextureDef>,
}

impl Drop for TestTexture {
    fn drop(&mut self) {
        let _ = self.drop_tx.send(self.texture_def.clone());
    }
}

impl FgTexture for TestTexture {
    fn texture_def(&self) -> &FgTextureDef {
        &self.texture_def
    }

    fn view_def(&self) -> Option<&FgTextureViewDef> {
        self.view_def.as_ref()
    }
}

#[derive(Debug)]
struct TestRenderPass {
    render_pass_def: FgRenderPassDef,
}

impl FgRenderPass for TestRenderPass {
    fn render_pass_def(&self) -> &FgRenderPassDef {
        &self.render_pass_def
    }
}

struct TestDevice {
    created_textures: AtomicUsize,
    created_views: AtomicUsize,
    created_render_passes: AtomicUsize,
    // create_texture fails once this many textures were created
    texture_limit: AtomicUsize,
    drop_tx: Sender<FgTextureDef>,
    drop_rx: Receiver<FgTextureDef>,
}

impl TestDevice {
    fn new() -> Self {
        let (drop_tx, drop_rx) = crossbeam_channel::unbounded();
        TestDevice {
            created_textures: AtomicUsize::new(0),
            created_views: AtomicUsize::new(0),
            created_render_passes: AtomicUsize::new(0),
            texture_limit: AtomicUsize::new(usize::MAX),
            drop_tx,
            drop_rx,
        }
    }

    fn created_texture_count(&self) -> usize {
        self.created_textures.load(Ordering::Relaxed)
    }

    fn created_view_count(&self) -> usize {
        self.created_views.load(Ordering::Relaxed)
    }

    fn created_render_pass_count(&self) -> usize {
        self.created_render_passes.load(Ordering::Relaxed)
    }

    fn handle_dropped_textures(&self) -> usize {
        self.drop_rx.try_iter().count()
    }

    fn external_texture(
        &self,
        texture_def: FgTextureDef,
    ) -> Arc<dyn FgTexture> {
        Arc::new(TestTexture {
            texture_def,
            view_def: None,
            drop_tx: self.drop_tx.clone(),
        })
    }
}

impl FgDevice for TestDevice {
    fn create_texture(
        &self,
        texture_def: &FgTextureDef,
    ) -> FgResult<Arc<dyn FgTexture>> {
        texture_def.verify();
        if self.created_texture_count() >= self.texture_limit.load(Ordering::Relaxed) {
            return Err("out of texture memory".into());
        }

        self.created_textures.fetch_add(1, Ordering::Relaxed);
        log::trace!("create texture {:?}", texture_def);
        Ok(Arc::new(TestTexture {
            texture_def: texture_def.clone(),
            view_def: None,
            drop_tx: self.drop_tx.clone(),
        }))
    }

    fn create_texture_view(
        &self,
        texture: &Arc<dyn FgTexture>,
        view_def: &FgTextureViewDef,
    ) -> FgResult<Arc<dyn FgTexture>> {
        let texture_def = texture.texture_def();
        assert!(view_def.first_layer + view_def.layer_count <= texture_def.layer_count);
        self.created_views.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(TestTexture {
            texture_def: texture_def.clone(),
            view_def: Some(view_def.clone()),
            drop_tx: self.drop_tx.clone(),
        }))
    }

    fn create_render_pass(
        &self,
        render_pass_def: &FgRenderPassDef,
    ) -> FgResult<Arc<dyn FgRenderPass>> {
        self.created_render_passes.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(TestRenderPass {
            render_pass_def: render_pass_def.clone(),
        }))
    }
}

#[derive(Debug, PartialEq)]
enum TestCommand {
    Barriers(Vec<(FgTextureLayout, FgTextureLayout)>),
    BeginRenderPass {
        attachment_count: usize,
        render_area: FgExtents2D,
    },
    NextSubpass,
    EndRenderPass,
    BeginDebugRegion(String),
    EndDebugRegion,
}

#[derive(Default)]
struct TestCommandBuffer {
    commands: Vec<TestCommand>,
}

impl FgCommandBuffer for TestCommandBuffer {
    fn texture_barriers(
        &mut self,
        barriers: &[FgTextureBarrier],
    ) -> FgResult<()> {
        self.commands.push(TestCommand::Barriers(
            barriers
                .iter()
                .map(|x| (x.src_layout, x.dst_layout))
                .collect(),
        ));
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        begin_info: &FgRenderPassBeginInfo,
    ) -> FgResult<()> {
        assert_eq!(
            begin_info.attachments.len(),
            begin_info.render_pass.render_pass_def().attachments.len()
        );
        assert_eq!(begin_info.attachments.len(), begin_info.clear_values.len());
        self.commands.push(TestCommand::BeginRenderPass {
            attachment_count: begin_info.attachments.len(),
            render_area: begin_info.render_area,
        });
        Ok(())
    }

    fn next_subpass(&mut self) -> FgResult<()> {
        self.commands.push(TestCommand::NextSubpass);
        Ok(())
    }

    fn end_render_pass(&mut self) -> FgResult<()> {
        self.commands.push(TestCommand::EndRenderPass);
        Ok(())
    }

    fn begin_debug_region(
        &mut self,
        name: &str,
    ) {
        self.commands
            .push(TestCommand::BeginDebugRegion(name.to_string()));
    }

    fn end_debug_region(&mut self) {
        self.commands.push(TestCommand::EndDebugRegion);
    }
}

fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

fn color_attachment(
    graph: &mut FrameGraph,
    name: &str,
) -> AttachmentId {
    graph.add_attachment(FramePassAttachment {
        name: name.to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer(0),
    })
}

fn depth_attachment(
    graph: &mut FrameGraph,
    name: &str,
) -> AttachmentId {
    graph.add_attachment(FramePassAttachment {
        name: name.to_string(),
        format: FgFormat::D24_UNORM_S8_UINT,
        size: FrameGraphTextureSize::viewer(0),
    })
}

fn surface_info() -> FrameGraphSurfaceInfo {
    FrameGraphSurfaceInfo::new(900, 600)
}

struct DeferredGraph {
    graph: FrameGraph,
    albedo: AttachmentId,
    depth: AttachmentId,
    lighting: AttachmentId,
    backbuffer: AttachmentId,
    gbuffer_pass: FramePassId,
    lighting_pass: FramePassId,
    unused_pass: FramePassId,
}

// Passes are declared out of execution order on purpose
fn deferred_graph() -> DeferredGraph {
    let mut graph = FrameGraph::new();
    let albedo = color_attachment(&mut graph, "albedo");
    let normal = graph.add_attachment(FramePassAttachment {
        name: "normal".to_string(),
        format: FgFormat::R16G16B16A16_SFLOAT,
        size: FrameGraphTextureSize::viewer(0),
    });
    let depth = depth_attachment(&mut graph, "depth");
    let lighting = color_attachment(&mut graph, "lighting");
    let backbuffer = color_attachment(&mut graph, "backbuffer");
    let debug = color_attachment(&mut graph, "debug");

    let lighting_pass = {
        let pass = graph.add_pass("Lighting");
        pass.add_input(albedo);
        pass.add_input(normal);
        pass.set_depth_stencil_input(depth);
        let output = pass.add_output(lighting);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        pass.id()
    };

    let unused_pass = {
        let pass = graph.add_pass("Debug");
        pass.add_input(albedo);
        pass.add_output(debug);
        pass.id()
    };

    let gbuffer_pass = {
        let pass = graph.add_pass("GBuffer");
        let output = pass.add_output(albedo);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        pass.add_output(normal);
        pass.set_depth_stencil_output(depth);
        pass.set_depth_stencil_clear(1.0, 0);
        pass.id()
    };

    {
        let pass = graph.add_pass("Final");
        pass.add_input(lighting);
        pass.add_output(backbuffer);
    }

    graph.add_output(backbuffer);

    DeferredGraph {
        graph,
        albedo,
        depth,
        lighting,
        backbuffer,
        gbuffer_pass,
        lighting_pass,
        unused_pass,
    }
}

#[test]
fn single_pass_with_cleared_output() {
    init_logging();

    let mut graph = FrameGraph::new();
    let color = color_attachment(&mut graph, "color");
    let pass_id = {
        let pass = graph.add_pass("Clear");
        let output = pass.add_output(color);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        pass.id()
    };
    graph.add_output(color);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order(), &[pass_id]);
    assert_eq!(plan.passes().len(), 1);

    let pass = &plan.passes()[0];
    let attachments = &pass.render_pass_def().attachments;
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].load_op, FgLoadOp::Clear);
    assert_eq!(attachments[0].store_op, FgStoreOp::Store);
    assert_eq!(attachments[0].initial_layout, FgTextureLayout::Undefined);
    assert_eq!(attachments[0].final_layout, FgTextureLayout::ColorOutput);
    assert_eq!(
        pass.clear_values(),
        &[Some(FgClearValue::Color(FgColorClearValue::BLACK))]
    );

    let texture_id = plan.attachment_texture_id(color).unwrap();
    assert_eq!(pass.output_textures(), &[texture_id]);
    let texture = plan.texture(texture_id);
    assert!(!texture.can_be_reused);
    assert!(texture.usage.contains(
        FgTextureUsage::COLOR_ATTACHMENT
            | FgTextureUsage::SHADER_SAMPLING
            | FgTextureUsage::TRANSFER_SOURCE
    ));

    // The attachment starts undefined but is rendered as ColorOutput, so the first subpass waits
    // on anything that wrote it before
    let dependencies = &pass.render_pass_def().dependencies;
    assert_eq!(dependencies.len(), 1);
    assert_eq!(dependencies[0].from_subpass, FgSubpassIndex::External);
    assert_eq!(dependencies[0].to_subpass, FgSubpassIndex::Index(0));
    assert_eq!(dependencies[0].from_access, FgMemoryAccess::COLOR_WRITE);
    assert_eq!(
        dependencies[0].to_access,
        FgMemoryAccess::COLOR_READ | FgMemoryAccess::COLOR_WRITE
    );
    assert!(dependencies[0].tilable);
}

#[test]
fn passes_are_ordered_by_dependencies() {
    init_logging();

    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    let y = color_attachment(&mut graph, "y");

    // Declared before the pass it depends on
    let p2 = {
        let pass = graph.add_pass("P2");
        pass.add_input(x);
        pass.add_output(y);
        pass.id()
    };
    let p1 = {
        let pass = graph.add_pass("P1");
        pass.add_output(x);
        pass.id()
    };
    graph.add_output(y);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order(), &[p1, p2]);
    assert_eq!(plan.physical_pass_index(p1), Some(0));
    assert_eq!(plan.physical_pass_index(p2), Some(1));

    let x_texture = plan.attachment_texture_id(x).unwrap();

    let first_write = plan.passes()[0]
        .transitions()
        .iter()
        .find(|t| t.texture == x_texture)
        .unwrap();
    assert_eq!(first_write.old_layout, FgTextureLayout::Undefined);
    assert_eq!(first_write.new_layout, FgTextureLayout::ColorOutput);
    assert_eq!(first_write.src_stages, FgPipelineStage::TOP_OF_PIPE);
    assert_eq!(first_write.src_access, FgMemoryAccess::empty());
    assert_eq!(first_write.dst_stages, FgPipelineStage::COLOR_OUTPUT);
    assert_eq!(
        first_write.dst_access,
        FgMemoryAccess::COLOR_READ | FgMemoryAccess::COLOR_WRITE
    );

    // P2 waits for exactly what P1 left behind
    let read = plan.passes()[1]
        .transitions()
        .iter()
        .find(|t| t.texture == x_texture)
        .unwrap();
    assert_eq!(read.old_layout, FgTextureLayout::ColorOutput);
    assert_eq!(read.new_layout, FgTextureLayout::ColorInput);
    assert_eq!(read.src_stages, FgPipelineStage::COLOR_OUTPUT);
    assert_eq!(
        read.src_access,
        FgMemoryAccess::COLOR_READ | FgMemoryAccess::COLOR_WRITE
    );
    assert_eq!(read.dst_stages, FgPipelineStage::FRAGMENT_SHADER);
    assert_eq!(read.dst_access, FgMemoryAccess::SHADER_READ);
}

#[test]
fn output_that_is_never_written_fails() {
    init_logging();

    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    let y = color_attachment(&mut graph, "y");
    graph.add_pass("P1").add_output(x);
    graph.add_output(y);

    match graph.plan() {
        Err(BakeError::OutputNeverWritten(attachment)) => assert_eq!(attachment, y),
        x => panic!("unexpected result {:?}", x),
    }

    let error = graph
        .bake(&TestDevice::new(), &surface_info())
        .unwrap_err();
    assert!(error.to_string().contains("no pass writes to backbuffer"));
}

#[test]
fn graph_without_output_fails() {
    init_logging();

    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    graph.add_pass("P1").add_output(x);

    let error = graph.plan().unwrap_err();
    assert!(matches!(error, BakeError::NoOutput));
    assert_eq!(error.to_string(), "no backbuffer output has been set");
}

#[test]
fn depth_stencil_read_and_written_by_one_pass() {
    init_logging();

    let mut graph = FrameGraph::new();
    let depth = depth_attachment(&mut graph, "depth");
    let opaque = color_attachment(&mut graph, "opaque");
    let transparent = color_attachment(&mut graph, "transparent");

    {
        let pass = graph.add_pass("Opaque");
        let output = pass.add_output(opaque);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        pass.set_depth_stencil_output(depth);
        pass.set_depth_stencil_clear(1.0, 0);
    }

    {
        let pass = graph.add_pass("Transparent");
        pass.add_input(opaque);
        pass.add_output(transparent);
        pass.set_depth_stencil_input(depth);
        pass.set_depth_stencil_output(depth);
    }

    graph.add_output(transparent);

    let plan = graph.plan().unwrap();
    let depth_texture = plan.attachment_texture_id(depth).unwrap();

    let opaque_pass = &plan.passes()[0];
    let opaque_depth = &opaque_pass.render_pass_def().attachments[1];
    assert_eq!(opaque_depth.load_op, FgLoadOp::Clear);
    assert_eq!(opaque_depth.store_op, FgStoreOp::Store);
    assert_eq!(opaque_depth.initial_layout, FgTextureLayout::Undefined);
    assert_eq!(
        opaque_pass.clear_values()[1],
        Some(FgClearValue::DepthStencil(FgDepthStencilClearValue {
            depth: 1.0,
            stencil: 0
        }))
    );

    let transparent_pass = &plan.passes()[1];
    let render_pass_def = transparent_pass.render_pass_def();
    let depth_attachments: Vec<_> = render_pass_def
        .attachments
        .iter()
        .filter(|x| x.format.has_depth())
        .collect();
    assert_eq!(depth_attachments.len(), 1);
    assert_eq!(depth_attachments[0].load_op, FgLoadOp::Load);
    assert_eq!(depth_attachments[0].store_op, FgStoreOp::Store);
    assert_eq!(depth_attachments[0].stencil_load_op, FgLoadOp::Load);
    assert_eq!(depth_attachments[0].stencil_store_op, FgStoreOp::Store);
    assert_eq!(
        depth_attachments[0].initial_layout,
        FgTextureLayout::DepthStencilReadWrite
    );
    assert_eq!(
        render_pass_def.subpasses[0].depth_stencil_attachment,
        Some(FgAttachmentReference {
            attachment_index: 1,
            layout: FgTextureLayout::DepthStencilReadWrite,
        })
    );

    let transition = transparent_pass
        .transitions()
        .iter()
        .find(|x| x.texture == depth_texture)
        .unwrap();
    assert_eq!(transition.old_layout, FgTextureLayout::DepthStencilReadWrite);
    assert_eq!(transition.new_layout, FgTextureLayout::DepthStencilReadWrite);
    assert_eq!(transition.src_access, FgMemoryAccess::DEPTH_STENCIL_WRITE);
    assert_eq!(
        transition.dst_access,
        FgMemoryAccess::DEPTH_STENCIL_READ | FgMemoryAccess::DEPTH_STENCIL_WRITE
    );
    assert_eq!(
        transition.dst_stages,
        FgPipelineStage::FRAGMENT_TESTS_EARLY | FgPipelineStage::FRAGMENT_TESTS_LATE
    );
}

#[test]
fn unreachable_passes_are_culled() {
    init_logging();

    let deferred = deferred_graph();
    let plan = deferred.graph.plan().unwrap();

    assert_eq!(plan.pass_order().len(), 3);
    assert_eq!(plan.pass_order()[0], deferred.gbuffer_pass);
    assert_eq!(plan.pass_order()[1], deferred.lighting_pass);
    assert!(!plan.pass_order().contains(&deferred.unused_pass));
    assert_eq!(plan.physical_pass_index(deferred.unused_pass), None);

    let names: Vec<_> = plan.passes().iter().map(|x| x.name()).collect();
    assert_eq!(names, vec!["GBuffer", "Lighting", "Final"]);
}

#[test]
fn planning_is_idempotent() {
    init_logging();

    let deferred = deferred_graph();
    let first = deferred.graph.plan().unwrap();
    let second = deferred.graph.plan().unwrap();

    assert_eq!(first.pass_order(), second.pass_order());
    assert_eq!(first.textures().len(), second.textures().len());
    for (a, b) in first.textures().iter().zip(second.textures()) {
        assert_eq!(a.format, b.format);
        assert_eq!(a.usage, b.usage);
        assert_eq!(a.size, b.size);
    }

    for (a, b) in first.passes().iter().zip(second.passes()) {
        assert_eq!(a.render_pass_def(), b.render_pass_def());
        assert_eq!(a.transitions(), b.transitions());
        assert_eq!(a.attachment_textures(), b.attachment_textures());
    }

    for attachment in &[
        deferred.albedo,
        deferred.depth,
        deferred.lighting,
        deferred.backbuffer,
    ] {
        assert_eq!(
            first.attachment_texture_id(*attachment),
            second.attachment_texture_id(*attachment)
        );
    }
}

#[test]
fn textures_are_reused_when_lifetimes_do_not_overlap() {
    init_logging();

    let mut graph = FrameGraph::new();
    let a = color_attachment(&mut graph, "a");
    let b = color_attachment(&mut graph, "b");
    let c = color_attachment(&mut graph, "c");

    graph.add_pass("P1").add_output(a);
    {
        let pass = graph.add_pass("P2");
        pass.add_input(a);
        pass.add_output(b);
    }
    {
        let pass = graph.add_pass("P3");
        pass.add_input(b);
        pass.add_output(c);
    }
    graph.add_output(c);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.textures().len(), 2);

    let a_texture = plan.attachment_texture_id(a).unwrap();
    let b_texture = plan.attachment_texture_id(b).unwrap();
    let c_texture = plan.attachment_texture_id(c).unwrap();
    assert_eq!(a_texture, c_texture);
    assert_ne!(a_texture, b_texture);

    // Attachments sharing a texture never have overlapping lifetimes
    let live_range = |attachment: AttachmentId| {
        let users: Vec<_> = plan
            .pass_order()
            .iter()
            .enumerate()
            .filter(|(_, pass_id)| {
                let pass = graph.pass(**pass_id);
                pass.inputs().iter().any(|x| x.attachment_id == attachment)
                    || pass.outputs().iter().any(|x| x.attachment_id == attachment)
            })
            .map(|(index, _)| index)
            .collect();
        (users[0], *users.last().unwrap())
    };
    let (_, a_last) = live_range(a);
    let (c_first, _) = live_range(c);
    assert!(a_last < c_first);

    // The texture backing the output is kept
    assert!(!plan.texture(c_texture).can_be_reused);
}

#[test]
fn textures_are_only_reused_by_matching_attachments() {
    init_logging();

    let mut graph = FrameGraph::new();
    let first = color_attachment(&mut graph, "first");
    let second = color_attachment(&mut graph, "second");
    let other_viewer = graph.add_attachment(FramePassAttachment {
        name: "other viewer".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer(1),
    });
    let array = graph.add_attachment_array(FramePassAttachmentArray {
        name: "array".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer(0),
        layer_count: 1,
    });
    let other_format = graph.add_attachment(FramePassAttachment {
        name: "other format".to_string(),
        format: FgFormat::R16G16B16A16_SFLOAT,
        size: FrameGraphTextureSize::viewer(0),
    });
    let fixed = graph.add_attachment(FramePassAttachment {
        name: "fixed".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::fixed(900, 600),
    });
    let last = color_attachment(&mut graph, "last");

    // Each pass reads what the previous one wrote, so only neighbors overlap
    let chain = [first, second, other_viewer, array, other_format, fixed, last];
    graph.add_pass("P0").add_output(chain[0]);
    for (index, pair) in chain.windows(2).enumerate() {
        let pass = graph.add_pass(format!("P{}", index + 1));
        pass.add_input(pair[0]);
        pass.add_output(pair[1]);
    }
    graph.add_output(last);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order().len(), chain.len());

    let texture = |attachment: AttachmentId| plan.attachment_texture_id(attachment).unwrap();

    // A different viewer, texture type, format or sizing rule never shares a texture, even when
    // the extents would end up equal
    for &mismatched in &[other_viewer, array, other_format, fixed] {
        assert_ne!(texture(mismatched), texture(first));
        assert_ne!(texture(mismatched), texture(second));
    }
    assert_eq!(plan.textures().len(), 6);

    // The last attachment matches the first two, both of which are free by then
    assert!(texture(last) == texture(first) || texture(last) == texture(second));
    assert_ne!(texture(first), texture(second));
}

#[test]
fn proxy_chain_resolves_to_target() {
    init_logging();

    let mut graph = FrameGraph::new();
    let color = color_attachment(&mut graph, "color");
    let proxy = graph.add_attachment_proxy("color after blend", color);
    let proxy_of_proxy = graph.add_attachment_proxy("color after tonemap", proxy);

    let p1 = {
        let pass = graph.add_pass("Render");
        pass.add_output(color);
        pass.id()
    };
    let p2 = {
        let pass = graph.add_pass("Tonemap");
        pass.add_input(color);
        pass.add_output(proxy_of_proxy);
        pass.id()
    };
    graph.add_output(proxy_of_proxy);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order(), &[p1, p2]);
    assert_eq!(plan.textures().len(), 1);
    assert_eq!(
        plan.attachment_texture_id(proxy_of_proxy),
        plan.attachment_texture_id(color)
    );
    assert_eq!(
        plan.attachment_texture_id(proxy),
        plan.attachment_texture_id(color)
    );
}

#[test]
fn transitions_chain_between_passes() {
    init_logging();

    let deferred = deferred_graph();
    let plan = deferred.graph.plan().unwrap();

    let mut layouts = vec![FgTextureLayout::Undefined; plan.textures().len()];
    for pass in plan.passes() {
        for transition in pass.transitions() {
            assert_eq!(transition.old_layout, layouts[transition.texture.index()]);
            layouts[transition.texture.index()] = transition.new_layout;
        }
    }
}

#[test]
fn conflicting_layouts_in_one_pass_fail() {
    init_logging();

    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    let y = color_attachment(&mut graph, "y");
    graph.add_pass("P1").add_output(x);
    let p2 = {
        let pass = graph.add_pass("P2");
        pass.add_input(x);
        let second_input = pass.add_input(x);
        pass.set_input_layout(second_input, FgTextureLayout::General);
        pass.add_output(y);
        pass.id()
    };
    graph.add_output(y);

    match graph.plan() {
        Err(BakeError::LayoutMismatch { pass, .. }) => assert_eq!(pass, p2),
        x => panic!("unexpected result {:?}", x),
    }
}

#[test]
fn depth_stencil_output_already_assigned_fails() {
    init_logging();

    let mut graph = FrameGraph::new();
    let depth_a = depth_attachment(&mut graph, "depth a");
    let depth_b = depth_attachment(&mut graph, "depth b");
    let color = color_attachment(&mut graph, "color");

    graph.add_pass("P1").set_depth_stencil_output(depth_b);
    let p2 = {
        let pass = graph.add_pass("P2");
        pass.add_input(depth_b);
        pass.set_depth_stencil_input(depth_a);
        pass.set_depth_stencil_output(depth_b);
        pass.add_output(color);
        pass.id()
    };
    graph.add_output(color);

    match graph.plan() {
        Err(BakeError::DepthStencilOutputAlreadyAssigned(pass)) => assert_eq!(pass, p2),
        x => panic!("unexpected result {:?}", x),
    }
}

#[test]
fn depth_stencil_output_is_aliased_onto_input() {
    init_logging();

    let mut graph = FrameGraph::new();
    let depth = depth_attachment(&mut graph, "depth");
    let depth_after = depth_attachment(&mut graph, "depth after decals");
    let color = color_attachment(&mut graph, "color");

    graph.add_pass("Prepass").set_depth_stencil_output(depth);
    {
        let pass = graph.add_pass("Decals");
        pass.set_depth_stencil_input(depth);
        pass.set_depth_stencil_output(depth_after);
    }
    {
        let pass = graph.add_pass("Shade");
        pass.set_depth_stencil_input(depth_after);
        pass.add_output(color);
    }
    graph.add_output(color);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order().len(), 3);
    assert_eq!(
        plan.attachment_texture_id(depth),
        plan.attachment_texture_id(depth_after)
    );
}

#[test]
fn external_texture_mismatch_fails() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let color = color_attachment(&mut graph, "color");
    graph.add_pass("P1").add_output(color);
    graph.add_output(color);
    graph.bind_external_texture(
        color,
        device.external_texture(FgTextureDef {
            format: FgFormat::B8G8R8A8_SRGB,
            extents: FgExtents2D {
                width: 900,
                height: 600,
            },
            usage: FgTextureUsage::COLOR_ATTACHMENT,
            ..Default::default()
        }),
    );

    match graph.plan() {
        Err(BakeError::ExternalTextureMismatch(attachment)) => assert_eq!(attachment, color),
        x => panic!("unexpected result {:?}", x),
    }
}

#[test]
fn unbound_external_attachment_fails() {
    init_logging();

    let mut graph = FrameGraph::new();
    let backbuffer = graph.add_external_attachment("backbuffer");
    graph.add_pass("P1").add_output(backbuffer);
    graph.add_output(backbuffer);

    match graph.plan() {
        Err(BakeError::ExternalAttachmentNotBound(attachment)) => assert_eq!(attachment, backbuffer),
        x => panic!("unexpected result {:?}", x),
    }
}

#[test]
fn binding_a_proxy_fails() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let color = color_attachment(&mut graph, "color");
    let proxy = graph.add_attachment_proxy("proxy", color);
    graph.add_pass("P1").add_output(proxy);
    graph.add_output(proxy);
    graph.bind_external_texture(
        proxy,
        device.external_texture(FgTextureDef {
            format: FgFormat::R8G8B8A8_UNORM,
            extents: FgExtents2D {
                width: 900,
                height: 600,
            },
            ..Default::default()
        }),
    );

    match graph.plan() {
        Err(BakeError::InvalidExternalBinding(attachment)) => assert_eq!(attachment, proxy),
        x => panic!("unexpected result {:?}", x),
    }
}

#[test]
fn external_textures_are_never_pooled() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let history = color_attachment(&mut graph, "history");
    let a = color_attachment(&mut graph, "a");
    let b = color_attachment(&mut graph, "b");

    let history_texture = device.external_texture(FgTextureDef {
        format: FgFormat::R8G8B8A8_UNORM,
        extents: FgExtents2D {
            width: 900,
            height: 600,
        },
        usage: FgTextureUsage::COLOR_ATTACHMENT | FgTextureUsage::SHADER_SAMPLING,
        ..Default::default()
    });
    graph.bind_external_texture(history, history_texture.clone());

    graph.add_pass("P1").add_output(history);
    {
        let pass = graph.add_pass("P2");
        pass.add_input(history);
        pass.add_output(a);
    }
    {
        let pass = graph.add_pass("P3");
        pass.add_input(a);
        pass.add_output(b);
    }
    graph.add_output(b);

    let plan = graph.plan().unwrap();
    let history_id = plan.attachment_texture_id(history).unwrap();
    assert!(plan.texture(history_id).is_external());
    assert!(!plan.texture(history_id).can_be_reused);
    assert_ne!(plan.attachment_texture_id(b), Some(history_id));

    let baked = graph.bake(&device, &surface_info()).unwrap();
    assert!(Arc::ptr_eq(
        baked.attachment_texture(history).unwrap(),
        &history_texture
    ));
    // history is external, a and b can't share since their lifetimes overlap
    assert_eq!(device.created_texture_count(), 2);
}

#[test]
fn views_propagate_usage_and_keep_their_own_barriers() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let shadow_maps = graph.add_attachment_array(FramePassAttachmentArray {
        name: "shadow maps".to_string(),
        format: FgFormat::R32_SFLOAT,
        size: FrameGraphTextureSize::fixed(512, 512),
        layer_count: 2,
    });
    let layer_0 = graph.add_attachment_layer(shadow_maps, 0);
    let layer_1 = graph.add_attachment_layer(shadow_maps, 1);
    let color = color_attachment(&mut graph, "color");

    let p1 = {
        let pass = graph.add_pass("Shadow 0");
        pass.add_output(layer_0);
        pass.id()
    };
    let p2 = {
        let pass = graph.add_pass("Shadow 1");
        pass.add_output(layer_1);
        pass.id()
    };
    {
        let pass = graph.add_pass("Shade");
        pass.add_input(layer_0);
        pass.add_input(layer_1);
        pass.add_output(color);
    }
    graph.add_output(color);

    let plan = graph.plan().unwrap();
    let parent = plan.attachment_texture_id(shadow_maps).unwrap();
    let layer_0_texture = plan.attachment_texture_id(layer_0).unwrap();
    let layer_1_texture = plan.attachment_texture_id(layer_1).unwrap();

    let layer_0_data = plan.texture(layer_0_texture);
    assert_eq!(layer_0_data.texture_type, FgTextureType::Texture2D);
    assert_eq!(
        layer_0_data.view_data,
        Some(FrameGraphTextureViewData {
            parent,
            layer_offset: 0,
            layer_count: 1,
            planes: FgPlaneFlags::ALL,
        })
    );
    assert_eq!(
        plan.texture(layer_1_texture)
            .view_data
            .as_ref()
            .unwrap()
            .layer_offset,
        1
    );

    // The array is created with everything its layers are used for
    let parent_data = plan.texture(parent);
    assert_eq!(parent_data.texture_type, FgTextureType::Texture2DArray);
    assert!(parent_data
        .usage
        .contains(FgTextureUsage::COLOR_ATTACHMENT | FgTextureUsage::SHADER_SAMPLING));

    // Each layer is transitioned on its own
    let shadow_0 = &plan.passes()[plan.physical_pass_index(p1).unwrap()];
    assert!(shadow_0
        .transitions()
        .iter()
        .any(|x| x.texture == layer_0_texture));
    assert!(!shadow_0.transitions().iter().any(|x| x.texture == parent));
    let shadow_1 = &plan.passes()[plan.physical_pass_index(p2).unwrap()];
    assert!(shadow_1
        .transitions()
        .iter()
        .any(|x| x.texture == layer_1_texture));

    let baked = graph.bake(&device, &surface_info()).unwrap();
    assert_eq!(device.created_view_count(), 2);
    assert_eq!(
        baked
            .attachment_texture(layer_1)
            .unwrap()
            .view_def()
            .unwrap()
            .first_layer,
        1
    );
}

#[test]
fn full_view_shares_barriers_with_parent() {
    init_logging();

    let mut graph = FrameGraph::new();
    let depth = depth_attachment(&mut graph, "depth");
    let depth_only = graph.add_attachment_view(depth, None, FgPlaneFlags::DEPTH);
    let color = color_attachment(&mut graph, "color");

    graph.add_pass("Prepass").set_depth_stencil_output(depth);
    // Reading the view alone would not order this pass after the prepass, the depth-stencil
    // input does
    let resolve = {
        let pass = graph.add_pass("SSAO");
        let input = pass.add_input(depth_only);
        pass.set_input_layout(input, FgTextureLayout::DepthStencilReadOnly);
        pass.set_depth_stencil_input(depth);
        pass.add_output(color);
        pass.id()
    };
    graph.add_output(color);

    let plan = graph.plan().unwrap();
    let depth_texture = plan.attachment_texture_id(depth).unwrap();
    let view_texture = plan.attachment_texture_id(depth_only).unwrap();
    assert_ne!(depth_texture, view_texture);

    let pass = &plan.passes()[plan.physical_pass_index(resolve).unwrap()];
    let transition = pass
        .transitions()
        .iter()
        .find(|x| x.texture == depth_texture)
        .unwrap();
    assert_eq!(transition.old_layout, FgTextureLayout::DepthStencilReadWrite);
    assert_eq!(transition.new_layout, FgTextureLayout::DepthStencilReadOnly);
    assert!(!pass.transitions().iter().any(|x| x.texture == view_texture));
    assert!(plan
        .texture(depth_texture)
        .usage
        .contains(FgTextureUsage::SHADER_SAMPLING | FgTextureUsage::DEPTH_STENCIL_ATTACHMENT));
}

#[test]
fn output_layer_keeps_parent_alive() {
    init_logging();

    let mut graph = FrameGraph::new();
    let cube = graph.add_attachment_cube(FramePassAttachmentCube {
        name: "environment".to_string(),
        format: FgFormat::R16G16B16A16_SFLOAT,
        size: FrameGraphTextureSize::fixed(128, 128),
    });
    let face = graph.add_attachment_layer(cube, 3);
    graph.add_pass("Face").add_output(face);
    graph.add_output(face);

    let plan = graph.plan().unwrap();
    let face_texture = plan.texture(plan.attachment_texture_id(face).unwrap());
    assert!(!face_texture.can_be_reused);
    assert!(face_texture
        .usage
        .contains(FgTextureUsage::SHADER_SAMPLING | FgTextureUsage::TRANSFER_SOURCE));

    let cube_texture = plan.texture(plan.attachment_texture_id(cube).unwrap());
    assert_eq!(cube_texture.texture_type, FgTextureType::Cubemap);
    assert_eq!(cube_texture.layer_count, 6);
    assert!(!cube_texture.can_be_reused);
    assert!(cube_texture
        .usage
        .contains(FgTextureUsage::SHADER_SAMPLING | FgTextureUsage::COLOR_ATTACHMENT));
}

#[test]
fn invalid_layer_fails() {
    init_logging();

    let mut graph = FrameGraph::new();
    let array = graph.add_attachment_array(FramePassAttachmentArray {
        name: "array".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer(0),
        layer_count: 2,
    });
    let layer = graph.add_attachment_layer(array, 2);
    graph.add_pass("P1").add_output(layer);
    graph.add_output(layer);

    match graph.plan() {
        Err(BakeError::InvalidLayer {
            attachment,
            layer_index,
        }) => {
            assert_eq!(attachment, layer);
            assert_eq!(layer_index, 2);
        }
        x => panic!("unexpected result {:?}", x),
    }
}

#[test]
fn cycles_are_detected() {
    init_logging();

    let mut graph = FrameGraph::new();
    let a = color_attachment(&mut graph, "a");
    let b = color_attachment(&mut graph, "b");
    let output = color_attachment(&mut graph, "output");

    {
        let pass = graph.add_pass("P1");
        pass.add_input(b);
        pass.add_output(a);
    }
    {
        let pass = graph.add_pass("P2");
        pass.add_input(a);
        pass.add_output(b);
    }
    {
        let pass = graph.add_pass("P3");
        pass.add_input(a);
        pass.add_output(output);
    }
    graph.add_output(output);

    assert!(matches!(
        graph.plan(),
        Err(BakeError::CyclicDependency(_))
    ));
}

#[test]
fn deep_graphs_visit_each_pass_once() {
    init_logging();

    // Every pass depends on the previous one through two attachments, so the number of paths
    // back to the first pass doubles with each pass
    const PASS_COUNT: usize = 64;

    let mut graph = FrameGraph::new();
    let mut pass_ids = Vec::with_capacity(PASS_COUNT);
    let mut previous: Option<(AttachmentId, AttachmentId)> = None;
    for index in 0..PASS_COUNT {
        let a = color_attachment(&mut graph, &format!("a{}", index));
        let b = color_attachment(&mut graph, &format!("b{}", index));

        let pass = graph.add_pass(format!("P{}", index));
        if let Some((previous_a, previous_b)) = previous {
            pass.add_input(previous_a);
            pass.add_input(previous_b);
        }
        pass.add_output(a);
        pass.add_output(b);
        pass_ids.push(pass.id());

        previous = Some((a, b));
    }

    let (last_a, _) = previous.unwrap();
    graph.add_output(last_a);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order(), pass_ids.as_slice());
}

#[test]
fn depth_stencil_is_chained_through_proxies() {
    init_logging();

    let build = |use_proxies: bool| {
        let mut graph = FrameGraph::new();
        let depth = depth_attachment(&mut graph, "depth");
        let lighting = color_attachment(&mut graph, "lighting");
        let output = color_attachment(&mut graph, "output");
        let (lit_depth, forward_depth) = if use_proxies {
            let lit_depth = graph.add_attachment_proxy("depth after lighting", depth);
            let forward_depth = graph.add_attachment_proxy("depth after forward", lit_depth);
            (lit_depth, forward_depth)
        } else {
            (depth, depth)
        };

        {
            let pass = graph.add_pass("Prepass");
            pass.set_depth_stencil_output(depth);
            pass.set_depth_stencil_clear(1.0, 0);
        }
        {
            let pass = graph.add_pass("Lighting");
            pass.set_depth_stencil_input(depth);
            pass.set_depth_stencil_output(lit_depth);
            pass.add_output(lighting);
        }
        {
            let pass = graph.add_pass("Forward");
            pass.add_input(lighting);
            pass.set_depth_stencil_input(lit_depth);
            pass.set_depth_stencil_output(forward_depth);
            pass.add_output(output);
        }
        graph.add_output(output);

        (graph, [depth, lit_depth, forward_depth])
    };

    // Two passes writing the same depth-stencil attachment id depend on each other
    let (graph, _) = build(false);
    assert!(matches!(
        graph.plan(),
        Err(BakeError::CyclicDependency(_))
    ));

    let (graph, depth_attachments) = build(true);
    let plan = graph.plan().unwrap();
    assert_eq!(
        plan.pass_order(),
        &[FramePassId(0), FramePassId(1), FramePassId(2)]
    );

    let depth_texture = plan.attachment_texture_id(depth_attachments[0]);
    assert!(depth_texture.is_some());
    for &attachment in &depth_attachments {
        assert_eq!(plan.attachment_texture_id(attachment), depth_texture);
    }
}

#[test]
fn depth_stencil_input_is_stored_only_when_needed_later() {
    init_logging();

    let mut graph = FrameGraph::new();
    let depth = depth_attachment(&mut graph, "depth");
    let c0 = color_attachment(&mut graph, "c0");
    let c1 = color_attachment(&mut graph, "c1");
    let c2 = color_attachment(&mut graph, "c2");

    {
        let pass = graph.add_pass("Opaque");
        pass.add_output(c0);
        pass.set_depth_stencil_output(depth);
        pass.set_depth_stencil_clear(1.0, 0);
    }
    let transparent = {
        let pass = graph.add_pass("Transparent");
        pass.add_input(c0);
        pass.add_output(c1);
        pass.set_depth_stencil_input(depth);
        pass.id()
    };
    let particles = {
        let pass = graph.add_pass("Particles");
        pass.add_input(c1);
        pass.add_output(c2);
        pass.set_depth_stencil_input(depth);
        pass.id()
    };
    graph.add_output(c2);

    let plan = graph.plan().unwrap();

    let depth_description = |pass_id: FramePassId| {
        let pass = &plan.passes()[plan.physical_pass_index(pass_id).unwrap()];
        pass.render_pass_def()
            .attachments
            .iter()
            .find(|x| x.format.has_depth())
            .cloned()
            .unwrap()
    };

    let transparent_depth = depth_description(transparent);
    assert_eq!(transparent_depth.load_op, FgLoadOp::Load);
    assert_eq!(transparent_depth.store_op, FgStoreOp::Store);
    assert_eq!(
        transparent_depth.initial_layout,
        FgTextureLayout::DepthStencilReadOnly
    );

    let particles_depth = depth_description(particles);
    assert_eq!(particles_depth.load_op, FgLoadOp::Load);
    assert_eq!(particles_depth.store_op, FgStoreOp::Discard);
    assert_eq!(particles_depth.stencil_store_op, FgStoreOp::Discard);
}

#[test]
fn dummy_attachment_only_orders_passes() {
    init_logging();

    let mut graph = FrameGraph::new();
    let dummy = graph.add_dummy_attachment();
    let color = color_attachment(&mut graph, "color");

    let upload = {
        let pass = graph.add_pass("Upload");
        pass.add_output(dummy);
        pass.id()
    };
    let draw = {
        let pass = graph.add_pass("Draw");
        pass.add_input(dummy);
        pass.add_output(color);
        pass.id()
    };
    graph.add_output(color);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order(), &[upload, draw]);
    assert_eq!(plan.attachment_texture_id(dummy), None);
    assert_eq!(plan.textures().len(), 1);

    let upload_pass = &plan.passes()[0];
    assert!(upload_pass.render_pass_def().attachments.is_empty());
    assert!(upload_pass.transitions().is_empty());
}

#[test]
fn non_reading_inputs_and_assumed_layouts() {
    init_logging();

    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    let y = color_attachment(&mut graph, "y");
    let z = color_attachment(&mut graph, "z");

    graph.add_pass("P1").add_output(x);
    {
        let pass = graph.add_pass("P2");
        let input = pass.add_input(x);
        pass.set_read_input(input, false);
        pass.add_output(y);
    }
    {
        let pass = graph.add_pass("P3");
        pass.add_input(y);
        let input = pass.add_input(x);
        pass.set_input_assumed_layout(input, FgTextureLayout::General);
        pass.add_output(z);
    }
    graph.add_output(z);

    let plan = graph.plan().unwrap();
    assert_eq!(plan.pass_order().len(), 3);
    let x_texture = plan.attachment_texture_id(x).unwrap();

    // P2 is ordered after P1 but never touches x
    assert!(!plan.passes()[1]
        .transitions()
        .iter()
        .any(|t| t.texture == x_texture));

    let transition = plan.passes()[2]
        .transitions()
        .iter()
        .find(|t| t.texture == x_texture)
        .unwrap();
    assert_eq!(transition.old_layout, FgTextureLayout::General);
    assert_eq!(transition.new_layout, FgTextureLayout::ColorInput);
}

#[test]
fn execute_records_barriers_and_skips_passes() {
    init_logging();

    let device = TestDevice::new();
    let (executed_tx, executed_rx) = crossbeam_channel::unbounded();

    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    let y = color_attachment(&mut graph, "y");

    {
        let pass = graph.add_pass("P1");
        let output = pass.add_output(x);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        pass.set_execution_callback(|| FramePassExecution::UpdateAndExecute);
        let executed_tx = executed_tx.clone();
        pass.set_command_callback(move |args| {
            assert!(args.graph.attachment_texture(x).is_some());
            executed_tx.send(("P1", args.execution)).unwrap();
            Ok(())
        });
    }
    {
        let pass = graph.add_pass("P2");
        pass.add_input(x);
        pass.add_output(y);
        pass.set_execution_callback(|| FramePassExecution::Skip);
        pass.set_command_callback(move |args| {
            executed_tx.send(("P2", args.execution)).unwrap();
            Ok(())
        });
    }
    graph.add_output(y);

    let baked = graph.bake(&device, &surface_info()).unwrap();
    let mut command_buffer = TestCommandBuffer::default();
    baked.execute(&mut command_buffer).unwrap();

    let executed: Vec<_> = executed_rx.try_iter().collect();
    assert_eq!(
        executed,
        vec![("P1", FramePassExecution::UpdateAndExecute)]
    );

    let render_area = FgExtents2D {
        width: 900,
        height: 600,
    };
    assert_eq!(
        command_buffer.commands,
        vec![
            TestCommand::BeginDebugRegion("P1".to_string()),
            TestCommand::Barriers(vec![(
                FgTextureLayout::Undefined,
                FgTextureLayout::ColorOutput
            )]),
            TestCommand::BeginRenderPass {
                attachment_count: 1,
                render_area,
            },
            TestCommand::EndRenderPass,
            TestCommand::EndDebugRegion,
            TestCommand::BeginDebugRegion("P2".to_string()),
            TestCommand::Barriers(vec![
                (FgTextureLayout::ColorOutput, FgTextureLayout::ColorInput),
                (FgTextureLayout::Undefined, FgTextureLayout::ColorOutput),
            ]),
            TestCommand::BeginRenderPass {
                attachment_count: 1,
                render_area,
            },
            TestCommand::EndRenderPass,
            TestCommand::EndDebugRegion,
        ]
    );
}

#[test]
fn command_callback_errors_abort_execution() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let x = color_attachment(&mut graph, "x");
    {
        let pass = graph.add_pass("P1");
        pass.add_output(x);
        pass.set_command_callback(|_args| Err("device lost".into()));
    }
    graph.add_output(x);

    let baked = graph.bake(&device, &surface_info()).unwrap();
    let mut command_buffer = TestCommandBuffer::default();
    let error = baked.execute(&mut command_buffer).unwrap_err();
    assert_eq!(error.to_string(), "device lost");
    assert!(!command_buffer
        .commands
        .contains(&TestCommand::EndRenderPass));
}

#[test]
fn resize_recreates_viewer_relative_textures() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let half = graph.add_attachment(FramePassAttachment {
        name: "half".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer_scaled(0, 0.5, 0.5),
    });
    let fixed = graph.add_attachment(FramePassAttachment {
        name: "fixed".to_string(),
        format: FgFormat::R16G16_SFLOAT,
        size: FrameGraphTextureSize::fixed(256, 256),
    });
    let full = color_attachment(&mut graph, "full");

    {
        let pass = graph.add_pass("Downsample");
        pass.add_output(half);
        pass.add_output(fixed);
    }
    {
        let pass = graph.add_pass("Upsample");
        pass.add_input(half);
        pass.add_input(fixed);
        pass.add_output(full);
    }
    graph.add_output(full);

    let mut baked = graph.bake(&device, &surface_info()).unwrap();
    let half_id = baked.attachment_texture_id(half).unwrap();
    let fixed_id = baked.attachment_texture_id(fixed).unwrap();
    assert_eq!(
        baked.texture_extents(half_id),
        FgExtents2D {
            width: 450,
            height: 300
        }
    );

    let fixed_before = baked.texture(fixed_id).clone();
    let render_pass_before = baked.render_pass(0).clone();
    assert_eq!(device.handle_dropped_textures(), 0);

    let recreated = baked
        .resize(&device, &FrameGraphSurfaceInfo::new(1024, 768))
        .unwrap();
    assert!(recreated);
    assert_eq!(
        baked.texture_extents(half_id),
        FgExtents2D {
            width: 512,
            height: 384
        }
    );
    assert_eq!(
        baked.texture(half_id).texture_def().extents,
        FgExtents2D {
            width: 512,
            height: 384
        }
    );
    assert!(Arc::ptr_eq(baked.texture(fixed_id), &fixed_before));
    assert!(Arc::ptr_eq(baked.render_pass(0), &render_pass_before));
    assert_eq!(device.handle_dropped_textures(), 2);

    let recreated = baked
        .resize(&device, &FrameGraphSurfaceInfo::new(1024, 768))
        .unwrap();
    assert!(!recreated);
}

#[test]
fn failed_resize_leaves_graph_unchanged() {
    init_logging();

    let device = TestDevice::new();
    let mut graph = FrameGraph::new();
    let half = graph.add_attachment(FramePassAttachment {
        name: "half".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer_scaled(0, 0.5, 0.5),
    });
    let full = color_attachment(&mut graph, "full");

    graph.add_pass("Downsample").add_output(half);
    {
        let pass = graph.add_pass("Upsample");
        pass.add_input(half);
        pass.add_output(full);
    }
    graph.add_output(full);

    let mut baked = graph.bake(&device, &surface_info()).unwrap();
    let textures_before: Vec<_> = baked.textures().to_vec();
    let extents_before: Vec<_> = (0..textures_before.len())
        .map(|index| baked.texture_extents(TextureId(index)))
        .collect();
    assert_eq!(textures_before.len(), 2);

    // The first texture is recreated, the second fails
    device
        .texture_limit
        .store(device.created_texture_count() + 1, Ordering::Relaxed);
    let result = baked.resize(&device, &FrameGraphSurfaceInfo::new(1024, 768));
    assert!(matches!(result, Err(BakeError::Device(_))));

    for (index, texture) in textures_before.iter().enumerate() {
        assert!(Arc::ptr_eq(baked.texture(TextureId(index)), texture));
        assert_eq!(baked.texture_extents(TextureId(index)), extents_before[index]);
    }
    assert_eq!(baked.surface_info(), &surface_info());

    // Once the device recovers the same resize goes through
    device.texture_limit.store(usize::MAX, Ordering::Relaxed);
    let recreated = baked
        .resize(&device, &FrameGraphSurfaceInfo::new(1024, 768))
        .unwrap();
    assert!(recreated);
    assert_eq!(
        baked.texture_extents(baked.attachment_texture_id(full).unwrap()),
        FgExtents2D {
            width: 1024,
            height: 768
        }
    );
}

#[test]
fn unknown_viewer_fails_to_bake() {
    init_logging();

    let mut graph = FrameGraph::new();
    let color = graph.add_attachment(FramePassAttachment {
        name: "second window".to_string(),
        format: FgFormat::R8G8B8A8_UNORM,
        size: FrameGraphTextureSize::viewer(1),
    });
    graph.add_pass("P1").add_output(color);
    graph.add_output(color);

    // Planning does not need viewer extents
    assert!(graph.plan().is_ok());
    assert!(matches!(
        graph.bake(&TestDevice::new(), &surface_info()),
        Err(BakeError::UnknownViewer(1))
    ));
}

#[test]
fn resource_cache_reuses_device_objects() {
    init_logging();

    let device = TestDevice::new();
    let deferred = deferred_graph();
    let mut cache = FrameGraphResourceCache::new(1);

    let first = deferred
        .graph
        .bake_with_cache(&device, &surface_info(), &mut cache)
        .unwrap();
    let texture_count = device.created_texture_count();
    let render_pass_count = device.created_render_pass_count();
    assert_eq!(texture_count, first.plan().textures().len());
    assert_eq!(render_pass_count, 3);
    assert_eq!(cache.cached_texture_count(), texture_count);
    assert_eq!(cache.cached_render_pass_count(), 3);
    std::mem::drop(first);

    cache.on_frame_complete();
    let second = deferred
        .graph
        .bake_with_cache(&device, &surface_info(), &mut cache)
        .unwrap();
    assert_eq!(device.created_texture_count(), texture_count);
    assert_eq!(device.created_render_pass_count(), render_pass_count);

    // Every texture of one bake is distinct, even when several share a definition
    let textures = second.textures();
    for i in 0..textures.len() {
        for j in (i + 1)..textures.len() {
            assert!(!Arc::ptr_eq(&textures[i], &textures[j]));
        }
    }
    std::mem::drop(second);

    // Unused entries expire once no frame in flight can use them
    for _ in 0..3 {
        cache.on_frame_complete();
    }
    assert_eq!(cache.cached_texture_count(), 0);
    assert_eq!(cache.cached_render_pass_count(), 0);
    assert_eq!(device.handle_dropped_textures(), texture_count);

    cache.clear();
}
