use super::*;
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Used to create a `FgTexture`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgTextureDef {
    pub texture_type: FgTextureType,
    pub format: FgFormat,
    pub extents: FgExtents2D,
    // Set to 6 for cubemaps
    pub layer_count: u32,
    pub usage: FgTextureUsage,
}

impl Default for FgTextureDef {
    fn default() -> Self {
        FgTextureDef {
            texture_type: FgTextureType::Texture2D,
            format: FgFormat::UNDEFINED,
            extents: FgExtents2D {
                width: 0,
                height: 0,
            },
            layer_count: 1,
            usage: FgTextureUsage::SHADER_SAMPLING,
        }
    }
}

impl FgTextureDef {
    pub fn verify(&self) {
        assert!(self.extents.width > 0);
        assert!(self.extents.height > 0);
        assert!(self.layer_count > 0);
        assert_ne!(self.format, FgFormat::UNDEFINED);

        match self.texture_type {
            FgTextureType::Texture2D => assert_eq!(self.layer_count, 1),
            FgTextureType::Cubemap => assert_eq!(self.layer_count, 6),
            FgTextureType::Texture2DArray => {}
        }

        assert!(
            !(self.format.has_depth_or_stencil()
                && self.usage.intersects(FgTextureUsage::COLOR_ATTACHMENT)),
            "Cannot use depth stencil as color attachment"
        );
    }
}

/// Used to create a view of an existing texture with `FgDevice::create_texture_view`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgTextureViewDef {
    pub texture_type: FgTextureType,
    pub format: FgFormat,
    pub first_layer: u32,
    pub layer_count: u32,
    pub planes: FgPlaneFlags,
}

/// Describes one attachment of a render pass. Similar to VkAttachmentDescription
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgAttachmentDescription {
    pub format: FgFormat,
    pub load_op: FgLoadOp,
    pub store_op: FgStoreOp,
    pub stencil_load_op: FgLoadOp,
    pub stencil_store_op: FgStoreOp,
    pub initial_layout: FgTextureLayout,
    pub final_layout: FgTextureLayout,
}

impl Default for FgAttachmentDescription {
    fn default() -> Self {
        FgAttachmentDescription {
            format: FgFormat::UNDEFINED,
            load_op: FgLoadOp::Discard,
            store_op: FgStoreOp::Store,
            stencil_load_op: FgLoadOp::Discard,
            stencil_store_op: FgStoreOp::Discard,
            initial_layout: FgTextureLayout::Undefined,
            final_layout: FgTextureLayout::Undefined,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgAttachmentReference {
    pub attachment_index: u32,
    pub layout: FgTextureLayout,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgSubpassDescription {
    pub color_attachments: Vec<FgAttachmentReference>,
    pub depth_stencil_attachment: Option<FgAttachmentReference>,
    // Attachments not used by this subpass whose contents must survive it
    pub preserve_attachments: Vec<u32>,
}

/// Execution and memory dependency between two subpasses. Similar to VkSubpassDependency
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgSubpassDependency {
    pub from_subpass: FgSubpassIndex,
    pub from_stages: FgPipelineStage,
    pub from_access: FgMemoryAccess,
    pub to_subpass: FgSubpassIndex,
    pub to_stages: FgPipelineStage,
    pub to_access: FgMemoryAccess,
    /// The dependency only concerns the same pixel (VK_DEPENDENCY_BY_REGION_BIT)
    pub tilable: bool,
}

/// Everything needed to create a render pass. Render passes with equal definitions are
/// interchangeable, so this is used as a cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgRenderPassDef {
    pub attachments: Vec<FgAttachmentDescription>,
    pub subpasses: Vec<FgSubpassDescription>,
    pub dependencies: Vec<FgSubpassDependency>,
}
