use crate::{FgRenderPassDef, FgResult, FgTextureDef, FgTextureViewDef};
use std::sync::Arc;

/// An image that can be used by the GPU. Views created through `FgDevice::create_texture_view`
/// are textures too.
///
/// Textures must not be dropped if they are in use by the GPU.
pub trait FgTexture: std::fmt::Debug + Send + Sync {
    /// Return the metadata used to create the texture
    fn texture_def(&self) -> &FgTextureDef;

    /// Return the view metadata if this texture is a view of another texture
    fn view_def(&self) -> Option<&FgTextureViewDef> {
        None
    }
}

/// A render pass object, created from a `FgRenderPassDef`
pub trait FgRenderPass: std::fmt::Debug + Send + Sync {
    fn render_pass_def(&self) -> &FgRenderPassDef;
}

/// Creates the device objects a baked frame graph needs. The frame graph never talks to a
/// graphics API directly, everything goes through this trait.
pub trait FgDevice {
    fn create_texture(
        &self,
        texture_def: &FgTextureDef,
    ) -> FgResult<Arc<dyn FgTexture>>;

    fn create_texture_view(
        &self,
        texture: &Arc<dyn FgTexture>,
        view_def: &FgTextureViewDef,
    ) -> FgResult<Arc<dyn FgTexture>>;

    fn create_render_pass(
        &self,
        render_pass_def: &FgRenderPassDef,
    ) -> FgResult<Arc<dyn FgRenderPass>>;
}
