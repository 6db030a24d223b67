use framegraph::api::*;
use framegraph::graph::{
    FrameGraph, FrameGraphResourceCache, FrameGraphSurfaceInfo, FrameGraphTextureSize,
    FramePassAttachment, FramePassExecution,
};
use framegraph::BakeResult;
use log::LevelFilter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const WINDOW_WIDTH: u32 = 900;
const WINDOW_HEIGHT: u32 = 600;

//
// A device and command buffer that only log what they are asked to do. A real renderer would
// implement these traits on top of its graphics API.
//
#[derive(Debug)]
struct HeadlessTexture {
    texture_def: FgTextureDef,
    view_def: Option<FgTextureViewDef>,
}

impl FgTexture for HeadlessTexture {
    fn texture_def(&self) -> &FgTextureDef {
        &self.texture_def
    }

    fn view_def(&self) -> Option<&FgTextureViewDef> {
        self.view_def.as_ref()
    }
}

#[derive(Debug)]
struct HeadlessRenderPass {
    render_pass_def: FgRenderPassDef,
}

impl FgRenderPass for HeadlessRenderPass {
    fn render_pass_def(&self) -> &FgRenderPassDef {
        &self.render_pass_def
    }
}

struct HeadlessDevice;

impl FgDevice for HeadlessDevice {
    fn create_texture(
        &self,
        texture_def: &FgTextureDef,
    ) -> FgResult<Arc<dyn FgTexture>> {
        texture_def.verify();
        log::info!(
            "create texture {:?} {}x{} usage: {:?}",
            texture_def.format,
            texture_def.extents.width,
            texture_def.extents.height,
            texture_def.usage
        );

        Ok(Arc::new(HeadlessTexture {
            texture_def: texture_def.clone(),
            view_def: None,
        }))
    }

    fn create_texture_view(
        &self,
        texture: &Arc<dyn FgTexture>,
        view_def: &FgTextureViewDef,
    ) -> FgResult<Arc<dyn FgTexture>> {
        log::info!("create texture view {:?}", view_def);
        Ok(Arc::new(HeadlessTexture {
            texture_def: texture.texture_def().clone(),
            view_def: Some(view_def.clone()),
        }))
    }

    fn create_render_pass(
        &self,
        render_pass_def: &FgRenderPassDef,
    ) -> FgResult<Arc<dyn FgRenderPass>> {
        log::info!(
            "create render pass with {} attachments",
            render_pass_def.attachments.len()
        );

        Ok(Arc::new(HeadlessRenderPass {
            render_pass_def: render_pass_def.clone(),
        }))
    }
}

#[derive(Default)]
struct HeadlessCommandBuffer {
    indent: usize,
}

impl FgCommandBuffer for HeadlessCommandBuffer {
    fn texture_barriers(
        &mut self,
        barriers: &[FgTextureBarrier],
    ) -> FgResult<()> {
        for barrier in barriers {
            log::info!(
                "{:indent$}barrier {:?} -> {:?}",
                "",
                barrier.src_layout,
                barrier.dst_layout,
                indent = self.indent
            );
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        begin_info: &FgRenderPassBeginInfo,
    ) -> FgResult<()> {
        log::info!(
            "{:indent$}begin render pass {}x{}",
            "",
            begin_info.render_area.width,
            begin_info.render_area.height,
            indent = self.indent
        );
        Ok(())
    }

    fn next_subpass(&mut self) -> FgResult<()> {
        log::info!("{:indent$}next subpass", "", indent = self.indent);
        Ok(())
    }

    fn end_render_pass(&mut self) -> FgResult<()> {
        log::info!("{:indent$}end render pass", "", indent = self.indent);
        Ok(())
    }

    fn begin_debug_region(
        &mut self,
        name: &str,
    ) {
        log::info!("{:indent$}{}", "", name, indent = self.indent);
        self.indent += 2;
    }

    fn end_debug_region(&mut self) {
        self.indent -= 2;
    }
}

fn main() {
    // Turn on some logging
    env_logger::Builder::from_default_env()
        .default_format_timestamp_nanos(true)
        .filter_level(LevelFilter::Info)
        .init();

    run().unwrap();
}

fn run() -> BakeResult<()> {
    let device = HeadlessDevice;

    // Toggled at runtime to skip the forward pass without rebuilding the graph
    let forward_enabled = Arc::new(AtomicBool::new(true));
    let graph = build_graph(forward_enabled.clone());

    // Planning needs nothing but the graph. The plan can be inspected to see what will be created.
    let plan = graph.plan()?;
    for (index, pass) in plan.passes().iter().enumerate() {
        log::info!(
            "pass {} {:?}: {} attachments, {} transitions",
            index,
            pass.name(),
            pass.render_pass_def().attachments.len(),
            pass.transitions().len()
        );
    }

    // Baking creates the textures and render passes. The cache lets later bakes reuse them.
    let mut cache = FrameGraphResourceCache::new(2);
    let mut baked = graph.bake_with_cache(
        &device,
        &FrameGraphSurfaceInfo::new(WINDOW_WIDTH, WINDOW_HEIGHT),
        &mut cache,
    )?;

    for frame_index in 0..3 {
        log::info!("-- frame {} --", frame_index);
        forward_enabled.store(frame_index != 1, Ordering::Relaxed);

        let mut command_buffer = HeadlessCommandBuffer::default();
        baked.execute(&mut command_buffer)?;
        cache.on_frame_complete();
    }

    // The window got bigger, only the textures that follow its size are recreated
    if baked.resize(
        &device,
        &FrameGraphSurfaceInfo::new(WINDOW_WIDTH * 2, WINDOW_HEIGHT * 2),
    )? {
        log::info!("textures were recreated, descriptor sets referencing them must be rebuilt");
    }

    let mut command_buffer = HeadlessCommandBuffer::default();
    baked.execute(&mut command_buffer)?;

    Ok(())
}

fn viewer_attachment(
    graph: &mut FrameGraph,
    name: &str,
    format: FgFormat,
) -> framegraph::graph::AttachmentId {
    graph.add_attachment(FramePassAttachment {
        name: name.to_string(),
        format,
        size: FrameGraphTextureSize::viewer(0),
    })
}

fn build_graph(forward_enabled: Arc<AtomicBool>) -> FrameGraph {
    let mut graph = FrameGraph::new();

    //
    // G-buffer
    //
    let albedo = viewer_attachment(&mut graph, "albedo", FgFormat::R8G8B8A8_UNORM);
    let normal = viewer_attachment(&mut graph, "normal", FgFormat::R16G16B16A16_SFLOAT);
    let depth = viewer_attachment(&mut graph, "depth", FgFormat::D24_UNORM_S8_UINT);
    {
        let pass = graph.add_pass("GBuffer");
        let output = pass.add_output(albedo);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        let output = pass.add_output(normal);
        pass.set_clear_color(output, Some(FgColorClearValue([0.0, 0.0, 0.0, 0.0])));
        pass.set_depth_stencil_output(depth);
        pass.set_depth_stencil_clear(1.0, 0);
        pass.set_command_callback(|args| {
            log::info!("    draw opaque meshes (pass {:?})", args.pass_id);
            Ok(())
        });
    }

    //
    // Lighting
    //
    let lighting = viewer_attachment(&mut graph, "lighting", FgFormat::R16G16B16A16_SFLOAT);
    {
        let pass = graph.add_pass("Lighting");
        pass.add_input(albedo);
        pass.add_input(normal);
        pass.set_depth_stencil_input(depth);
        let output = pass.add_output(lighting);
        pass.set_clear_color(output, Some(FgColorClearValue::BLACK));
        pass.set_command_callback(move |args| {
            // Bind the g-buffer, the textures behind the attachments are only known after baking
            let albedo_texture = args.graph.attachment_texture(albedo);
            log::info!("    full screen lighting, albedo {:?}", albedo_texture.is_some());
            Ok(())
        });
    }

    //
    // Forward pass for transparent meshes, drawn on top of the lit image. The input only orders
    // this pass after lighting and makes the render pass load the lit image, no read barrier is
    // needed since the pass blends into it as a color attachment.
    //
    {
        let pass = graph.add_pass("Forward");
        let input = pass.add_input(lighting);
        pass.set_read_input(input, false);
        pass.add_output(lighting);
        pass.set_depth_stencil_input(depth);
        pass.set_execution_callback(move || {
            if forward_enabled.load(Ordering::Relaxed) {
                FramePassExecution::Execute
            } else {
                FramePassExecution::Skip
            }
        });
        pass.set_command_callback(|_args| {
            log::info!("    draw transparent meshes");
            Ok(())
        });
    }

    //
    // Bloom at quarter resolution
    //
    let bright = graph.add_attachment(FramePassAttachment {
        name: "bloom bright".to_string(),
        format: FgFormat::R16G16B16A16_SFLOAT,
        size: FrameGraphTextureSize::viewer_scaled(0, 0.25, 0.25),
    });
    let blurred = graph.add_attachment(FramePassAttachment {
        name: "bloom blurred".to_string(),
        format: FgFormat::R16G16B16A16_SFLOAT,
        size: FrameGraphTextureSize::viewer_scaled(0, 0.25, 0.25),
    });
    {
        let pass = graph.add_pass("Bloom bright");
        pass.add_input(lighting);
        pass.add_output(bright);
    }
    {
        let pass = graph.add_pass("Bloom blur");
        pass.add_input(bright);
        pass.add_output(blurred);
    }

    //
    // Combine everything into the final image
    //
    let output = viewer_attachment(&mut graph, "output", FgFormat::R8G8B8A8_UNORM);
    {
        let pass = graph.add_pass("Bloom blend");
        pass.add_input(lighting);
        pass.add_input(blurred);
        pass.add_output(output);
        pass.set_command_callback(|_args| {
            log::info!("    tonemap and blend bloom");
            Ok(())
        });
    }

    // A debug view that nothing reads, it gets culled
    let debug = viewer_attachment(&mut graph, "debug", FgFormat::R8G8B8A8_UNORM);
    {
        let pass = graph.add_pass("Debug normals");
        pass.add_input(normal);
        pass.add_output(debug);
    }

    graph.add_output(output);
    graph
}
