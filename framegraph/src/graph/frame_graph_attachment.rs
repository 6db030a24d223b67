use crate::graph::FrameGraphSurfaceInfo;
use crate::{BakeError, BakeResult};
use framegraph_api::{FgExtents2D, FgFormat, FgPlaneFlags};
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Unique ID of an attachment registered with a `FrameGraph`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct AttachmentId(pub(super) usize);

impl AttachmentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// How large a texture is. Viewer-relative textures follow the extents of a viewer (a window or
/// other render target) and get recreated when it resizes.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FrameGraphTextureSize {
    Fixed {
        width: u32,
        height: u32,
    },
    ViewerRelative {
        viewer_index: usize,
        width_factor: f32,
        height_factor: f32,
    },
}

impl Default for FrameGraphTextureSize {
    fn default() -> Self {
        FrameGraphTextureSize::viewer(0)
    }
}

impl FrameGraphTextureSize {
    pub fn fixed(
        width: u32,
        height: u32,
    ) -> Self {
        FrameGraphTextureSize::Fixed { width, height }
    }

    /// Same size as the given viewer
    pub fn viewer(viewer_index: usize) -> Self {
        FrameGraphTextureSize::ViewerRelative {
            viewer_index,
            width_factor: 1.0,
            height_factor: 1.0,
        }
    }

    pub fn viewer_scaled(
        viewer_index: usize,
        width_factor: f32,
        height_factor: f32,
    ) -> Self {
        FrameGraphTextureSize::ViewerRelative {
            viewer_index,
            width_factor,
            height_factor,
        }
    }

    pub fn viewer_index(&self) -> Option<usize> {
        match self {
            FrameGraphTextureSize::Fixed { .. } => None,
            FrameGraphTextureSize::ViewerRelative { viewer_index, .. } => Some(*viewer_index),
        }
    }

    /// Resolve to pixel extents. Viewer-relative sizes never go below 1x1.
    pub fn extents(
        &self,
        surface_info: &FrameGraphSurfaceInfo,
    ) -> BakeResult<FgExtents2D> {
        match *self {
            FrameGraphTextureSize::Fixed { width, height } => Ok(FgExtents2D { width, height }),
            FrameGraphTextureSize::ViewerRelative {
                viewer_index,
                width_factor,
                height_factor,
            } => {
                let viewer_extents = surface_info
                    .viewer_extents
                    .get(viewer_index)
                    .ok_or(BakeError::UnknownViewer(viewer_index))?;

                Ok(FgExtents2D {
                    width: ((viewer_extents.width as f32 * width_factor) as u32).max(1),
                    height: ((viewer_extents.height as f32 * height_factor) as u32).max(1),
                })
            }
        }
    }
}

/// A 2D texture owned by the graph
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachment {
    pub name: String,
    pub format: FgFormat,
    pub size: FrameGraphTextureSize,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachmentArray {
    pub name: String,
    pub format: FgFormat,
    pub size: FrameGraphTextureSize,
    pub layer_count: u32,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachmentCube {
    pub name: String,
    pub format: FgFormat,
    pub size: FrameGraphTextureSize,
}

/// A single layer of an array or cubemap attachment
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachmentLayer {
    pub parent: AttachmentId,
    pub layer_index: u32,
}

/// A view of a whole attachment, optionally reinterpreting its format or restricting it to some
/// planes (e.g. the depth plane of a depth-stencil texture)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachmentView {
    pub parent: AttachmentId,
    pub format: Option<FgFormat>,
    pub planes: FgPlaneFlags,
}

/// Another name for an existing attachment. Never owns a texture.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachmentProxy {
    pub name: String,
    pub parent: AttachmentId,
}

/// An attachment whose texture is provided by the caller with `FrameGraph::bind_external_texture`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FramePassAttachmentExternal {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FrameGraphAttachment {
    Texture2D(FramePassAttachment),
    Texture2DArray(FramePassAttachmentArray),
    Cubemap(FramePassAttachmentCube),
    Layer(FramePassAttachmentLayer),
    View(FramePassAttachmentView),
    Proxy(FramePassAttachmentProxy),
    External(FramePassAttachmentExternal),
    // Only used to order passes, has no texture
    Dummy,
}

impl FrameGraphAttachment {
    pub fn name(&self) -> Option<&str> {
        match self {
            FrameGraphAttachment::Texture2D(attachment) => Some(&attachment.name),
            FrameGraphAttachment::Texture2DArray(attachment) => Some(&attachment.name),
            FrameGraphAttachment::Cubemap(attachment) => Some(&attachment.name),
            FrameGraphAttachment::Proxy(attachment) => Some(&attachment.name),
            FrameGraphAttachment::External(attachment) => Some(&attachment.name),
            FrameGraphAttachment::Layer(_)
            | FrameGraphAttachment::View(_)
            | FrameGraphAttachment::Dummy => None,
        }
    }

    /// Attachments that other attachments may refer to as a parent
    pub(super) fn parent(&self) -> Option<AttachmentId> {
        match self {
            FrameGraphAttachment::Layer(layer) => Some(layer.parent),
            FrameGraphAttachment::View(view) => Some(view.parent),
            FrameGraphAttachment::Proxy(proxy) => Some(proxy.parent),
            _ => None,
        }
    }

    /// True for the variants that own a texture and may be bound to an external one
    pub(super) fn can_bind_external_texture(&self) -> bool {
        match self {
            FrameGraphAttachment::Texture2D(_)
            | FrameGraphAttachment::Texture2DArray(_)
            | FrameGraphAttachment::Cubemap(_)
            | FrameGraphAttachment::External(_) => true,
            FrameGraphAttachment::Layer(_)
            | FrameGraphAttachment::View(_)
            | FrameGraphAttachment::Proxy(_)
            | FrameGraphAttachment::Dummy => false,
        }
    }
}
