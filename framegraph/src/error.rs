use crate::graph::{AttachmentId, FramePassId, TextureId};
use framegraph_api::FgError;

pub type BakeResult<T> = Result<T, BakeError>;

/// Reasons a frame graph can fail to plan or bake. These are all configuration errors, baking the
/// same graph again will fail the same way.
#[derive(Debug, Clone)]
pub enum BakeError {
    NoOutput,
    OutputNeverWritten(AttachmentId),
    CyclicDependency(FramePassId),
    LayoutMismatch {
        pass: FramePassId,
        texture: TextureId,
    },
    DepthStencilOutputAlreadyAssigned(FramePassId),
    ExternalTextureMismatch(AttachmentId),
    ExternalAttachmentNotBound(AttachmentId),
    InvalidExternalBinding(AttachmentId),
    InvalidLayer {
        attachment: AttachmentId,
        layer_index: u32,
    },
    UnknownViewer(usize),
    Device(FgError),
}

impl std::error::Error for BakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            BakeError::Device(ref e) => Some(e),
            _ => None,
        }
    }
}

impl core::fmt::Display for BakeError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            BakeError::NoOutput => write!(fmt, "no backbuffer output has been set"),
            BakeError::OutputNeverWritten(attachment) => write!(
                fmt,
                "no pass writes to backbuffer (attachment {})",
                attachment.index()
            ),
            BakeError::CyclicDependency(pass) => write!(
                fmt,
                "pass {} depends on itself through its inputs",
                pass.index()
            ),
            BakeError::LayoutMismatch { pass, texture } => write!(
                fmt,
                "layout mismatch for texture {} in pass {}",
                texture.index(),
                pass.index()
            ),
            BakeError::DepthStencilOutputAlreadyAssigned(pass) => write!(
                fmt,
                "depth-stencil output already assigned (pass {})",
                pass.index()
            ),
            BakeError::ExternalTextureMismatch(attachment) => write!(
                fmt,
                "texture bound to attachment {} does not match its type, format or layer count",
                attachment.index()
            ),
            BakeError::ExternalAttachmentNotBound(attachment) => write!(
                fmt,
                "external attachment {} is used but no texture was bound to it",
                attachment.index()
            ),
            BakeError::InvalidExternalBinding(attachment) => write!(
                fmt,
                "attachment {} cannot be bound to an external texture",
                attachment.index()
            ),
            BakeError::InvalidLayer {
                attachment,
                layer_index,
            } => write!(
                fmt,
                "layer {} is out of range for attachment {}",
                layer_index,
                attachment.index()
            ),
            BakeError::UnknownViewer(viewer_index) => {
                write!(fmt, "no extents were provided for viewer {}", viewer_index)
            }
            BakeError::Device(ref e) => e.fmt(fmt),
        }
    }
}

impl From<FgError> for BakeError {
    fn from(error: FgError) -> Self {
        BakeError::Device(error)
    }
}
