use super::*;
use crate::BakeResult;
use fnv::FnvHashMap;
use framegraph_api::{FgDevice, FgRenderPass, FgRenderPassDef, FgTexture, FgTextureDef};
use std::sync::Arc;

struct FrameGraphCachedTexture {
    keep_until_frame: u64,
    texture: Arc<dyn FgTexture>,
}

struct FrameGraphCachedRenderPass {
    keep_until_frame: u64,
    render_pass: Arc<dyn FgRenderPass>,
}

/// Keeps textures and render passes alive between bakes so that re-baking an unchanged (or
/// partially changed) graph does not recreate everything. Entries that go unused for longer than
/// the frames in flight are dropped by `on_frame_complete`.
pub struct FrameGraphResourceCache {
    textures: FnvHashMap<FgTextureDef, Vec<FrameGraphCachedTexture>>,
    render_passes: FnvHashMap<FgRenderPassDef, FrameGraphCachedRenderPass>,
    current_frame_index: u64,
    frames_to_persist: u64,
}

impl FrameGraphResourceCache {
    pub fn new(max_frames_in_flight: u32) -> Self {
        FrameGraphResourceCache {
            textures: Default::default(),
            render_passes: Default::default(),
            current_frame_index: 0,
            frames_to_persist: max_frames_in_flight as u64 + 1,
        }
    }

    pub fn on_frame_complete(&mut self) {
        let current_frame_index = self.current_frame_index;

        for value in self.textures.values_mut() {
            value.retain(|x| x.keep_until_frame > current_frame_index);
        }

        self.textures.retain(|_k, v| !v.is_empty());

        self.render_passes
            .retain(|_k, v| v.keep_until_frame > current_frame_index);

        self.current_frame_index += 1;
    }

    pub fn clear(&mut self) {
        self.textures.clear();
        self.render_passes.clear();
    }

    pub fn cached_texture_count(&self) -> usize {
        self.textures.values().map(|x| x.len()).sum()
    }

    pub fn cached_render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    /// Create a device texture for every texture of the plan, in the same order. Views are
    /// created from their parent and external textures are used as-is.
    pub(super) fn allocate_textures(
        &mut self,
        device: &dyn FgDevice,
        plan: &FrameGraphPlan,
        surface_info: &FrameGraphSurfaceInfo,
    ) -> BakeResult<Vec<Arc<dyn FgTexture>>> {
        log::trace!("Allocate textures for frame graph");
        let mut textures: Vec<Arc<dyn FgTexture>> = Vec::with_capacity(plan.textures.len());

        // Keeps track of what index in the cache we will use next. This starts at 0 for each key
        // and increments every time we use a texture, so that a cached texture is never handed out
        // twice within one bake
        let mut next_texture_to_use = FnvHashMap::<FgTextureDef, usize>::default();

        // Using a texture will bump the keep_until_frame for that texture
        let keep_until_frame = self.current_frame_index + self.frames_to_persist;

        for (index, texture_data) in plan.textures.iter().enumerate() {
            if let Some(external_texture) = &texture_data.external_texture {
                log::trace!("  Texture {} - EXTERNAL {:?}", index, external_texture);
                textures.push(external_texture.clone());
                continue;
            }

            if let (Some(view_data), Some(view_def)) =
                (&texture_data.view_data, texture_data.view_def())
            {
                // Parents always come before their views
                let parent = textures[view_data.parent.0].clone();
                let view = device.create_texture_view(&parent, &view_def)?;
                log::trace!("  Texture {} - VIEW {:?}", index, view_def);
                textures.push(view);
                continue;
            }

            let key = texture_data.texture_def(surface_info)?;
            let next_texture_index = next_texture_to_use.entry(key.clone()).or_insert(0);
            let matching_cached_textures = self
                .textures
                .entry(key.clone())
                .or_insert_with(Default::default);

            if let Some(cached_texture) = matching_cached_textures.get_mut(*next_texture_index) {
                log::trace!(
                    "  Texture {} - REUSE (key: {:?}, index: {})",
                    index,
                    key,
                    next_texture_index
                );

                // Reuse a texture from a previous bake, bump keep_until_frame
                cached_texture.keep_until_frame = keep_until_frame;
                *next_texture_index += 1;

                textures.push(cached_texture.texture.clone());
            } else {
                let texture = device.create_texture(&key)?;

                log::trace!(
                    "  Texture {} - CREATE (key: {:?}, index: {})",
                    index,
                    key,
                    next_texture_index
                );

                debug_assert_eq!(matching_cached_textures.len(), *next_texture_index);
                matching_cached_textures.push(FrameGraphCachedTexture {
                    keep_until_frame,
                    texture: texture.clone(),
                });
                *next_texture_index += 1;

                textures.push(texture);
            }
        }

        Ok(textures)
    }

    /// Create (or reuse) the render pass of every physical pass of the plan, in the same order
    pub(super) fn allocate_render_passes(
        &mut self,
        device: &dyn FgDevice,
        plan: &FrameGraphPlan,
    ) -> BakeResult<Vec<Arc<dyn FgRenderPass>>> {
        log::trace!("Allocate render passes for frame graph");
        let keep_until_frame = self.current_frame_index + self.frames_to_persist;

        let mut render_passes = Vec::with_capacity(plan.passes.len());
        for (index, pass) in plan.passes.iter().enumerate() {
            let render_pass_def = &pass.render_pass_def;
            if let Some(cached_render_pass) = self.render_passes.get_mut(render_pass_def) {
                log::trace!("  Render pass {} {:?} - REUSE", index, pass.name);
                cached_render_pass.keep_until_frame = keep_until_frame;
                render_passes.push(cached_render_pass.render_pass.clone());
                continue;
            }

            log::trace!("  Render pass {} {:?} - CREATE", index, pass.name);
            let render_pass = device.create_render_pass(render_pass_def)?;
            self.render_passes.insert(
                render_pass_def.clone(),
                FrameGraphCachedRenderPass {
                    keep_until_frame,
                    render_pass: render_pass.clone(),
                },
            );
            render_passes.push(render_pass);
        }

        Ok(render_passes)
    }
}
