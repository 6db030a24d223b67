mod frame_graph;
pub use frame_graph::FrameGraph;

mod frame_graph_attachment;
pub use frame_graph_attachment::*;

mod frame_pass;
pub use frame_pass::*;

mod graph_traversal;
use graph_traversal::*;

mod graph_texture;
pub use graph_texture::FrameGraphTextureData;
pub use graph_texture::FrameGraphTextureViewData;
pub use graph_texture::TextureId;
use graph_texture::*;

mod graph_physical_pass;
pub use graph_physical_pass::FrameGraphPhysicalPass;
pub use graph_physical_pass::FrameGraphSubpass;
use graph_physical_pass::*;

mod graph_barriers;
pub use graph_barriers::FrameGraphBarrier;
pub use graph_barriers::FrameGraphTextureTransition;
use graph_barriers::*;

mod graph_render_pass;
use graph_render_pass::*;

mod graph_plan;
pub use graph_plan::FrameGraphPlan;

mod graph_resource_cache;
pub use graph_resource_cache::FrameGraphResourceCache;

mod baked_graph;
pub use baked_graph::BakedFrameGraph;
pub use baked_graph::FrameGraphSurfaceInfo;

#[cfg(test)]
mod graph_tests;
