#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Every way a texture may be used. A texture must be created with the union of all usages
    /// any of its users (including views of it) will need.
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FgTextureUsage: u32 {
        const TRANSFER_SOURCE = 1<<0;
        const TRANSFER_DESTINATION = 1<<1;
        /// Similar to vulkan SAMPLED image usage flag
        const SHADER_SAMPLING = 1<<2;
        /// Similar to vulkan STORAGE image usage flag
        const SHADER_READ_WRITE = 1<<3;
        const COLOR_ATTACHMENT = 1<<4;
        const DEPTH_STENCIL_ATTACHMENT = 1<<5;
        const INPUT_ATTACHMENT = 1<<6;
    }
}

bitflags::bitflags! {
    /// Memory accesses performed on a resource. Similar to VkAccessFlags
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FgMemoryAccess: u32 {
        const COLOR_READ = 1<<0;
        const COLOR_WRITE = 1<<1;
        const DEPTH_STENCIL_READ = 1<<2;
        const DEPTH_STENCIL_WRITE = 1<<3;
        const INPUT_ATTACHMENT_READ = 1<<4;
        const SHADER_READ = 1<<5;
        const SHADER_WRITE = 1<<6;
        const TRANSFER_READ = 1<<7;
        const TRANSFER_WRITE = 1<<8;
        const MEMORY_READ = 1<<9;
        const MEMORY_WRITE = 1<<10;
    }
}

bitflags::bitflags! {
    /// Pipeline stages that produce or consume a resource. Similar to VkPipelineStageFlags
    #[derive(Default)]
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FgPipelineStage: u32 {
        const TOP_OF_PIPE = 1<<0;
        const DRAW_INDIRECT = 1<<1;
        const VERTEX_INPUT = 1<<2;
        const VERTEX_SHADER = 1<<3;
        const FRAGMENT_SHADER = 1<<4;
        const FRAGMENT_TESTS_EARLY = 1<<5;
        const FRAGMENT_TESTS_LATE = 1<<6;
        const COLOR_OUTPUT = 1<<7;
        const COMPUTE_SHADER = 1<<8;
        const TRANSFER = 1<<9;
        const BOTTOM_OF_PIPE = 1<<10;
    }
}

bitflags::bitflags! {
    /// Aspects of a texture covered by a view
    #[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
    pub struct FgPlaneFlags: u8 {
        const COLOR = 1;
        const DEPTH = 2;
        const STENCIL = 4;
        const DEPTH_STENCIL = 2 | 4;
        const ALL = 0x07;
    }
}

impl Default for FgPlaneFlags {
    fn default() -> Self {
        FgPlaneFlags::ALL
    }
}

/// The layout a texture's memory is in. Textures are moved between layouts using barriers.
/// Similar to VkImageLayout
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgTextureLayout {
    /// Contents are undefined, any previous contents may be discarded
    Undefined,
    /// Read from shaders
    ColorInput,
    /// Written as a color attachment
    ColorOutput,
    DepthStencilReadOnly,
    DepthReadOnlyStencilReadWrite,
    DepthReadWriteStencilReadOnly,
    DepthStencilReadWrite,
    General,
    Present,
    TransferSource,
    TransferDestination,
}

impl Default for FgTextureLayout {
    fn default() -> Self {
        FgTextureLayout::Undefined
    }
}

impl FgTextureLayout {
    /// Layout for a depth-stencil attachment, given which planes the pass writes
    pub fn depth_stencil_for_write_planes(planes: FgPlaneFlags) -> Self {
        let depth_write = planes.contains(FgPlaneFlags::DEPTH);
        let stencil_write = planes.contains(FgPlaneFlags::STENCIL);
        match (depth_write, stencil_write) {
            (true, true) => FgTextureLayout::DepthStencilReadWrite,
            (true, false) => FgTextureLayout::DepthReadWriteStencilReadOnly,
            (false, true) => FgTextureLayout::DepthReadOnlyStencilReadWrite,
            (false, false) => FgTextureLayout::DepthStencilReadOnly,
        }
    }

    pub fn is_depth_stencil_writable(self) -> bool {
        match self {
            FgTextureLayout::DepthReadOnlyStencilReadWrite
            | FgTextureLayout::DepthReadWriteStencilReadOnly
            | FgTextureLayout::DepthStencilReadWrite => true,
            _ => false,
        }
    }
}

/// Determines if the contents of an attachment in a render pass begins with its previous
/// contents, a clear value, or undefined data. Similar to VkAttachmentLoadOp
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgLoadOp {
    Clear,
    Discard,
    Load,
}

impl Default for FgLoadOp {
    fn default() -> Self {
        FgLoadOp::Discard
    }
}

/// Determines if the contents of an attachment in a render pass will be kept for use after the
/// render pass
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgStoreOp {
    /// Do not store the image, leaving the contents of it undefined
    Discard,

    /// Persist the image's content after a render pass completes
    Store,
}

impl Default for FgStoreOp {
    fn default() -> Self {
        FgStoreOp::Store
    }
}

/// Clear value for a color attachment
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgColorClearValue(pub [f32; 4]);

impl FgColorClearValue {
    pub const BLACK: FgColorClearValue = FgColorClearValue([0.0, 0.0, 0.0, 1.0]);
}

/// Clear value for a depth-stencil attachment
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgDepthStencilClearValue {
    pub depth: f32,
    pub stencil: u32,
}

/// Clear value for either kind of attachment
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgClearValue {
    Color(FgColorClearValue),
    DepthStencil(FgDepthStencilClearValue),
}

/// A 2d size for windows, textures, etc.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FgExtents2D {
    pub width: u32,
    pub height: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgTextureType {
    Texture2D,
    Texture2DArray,
    Cubemap,
}

impl Default for FgTextureType {
    fn default() -> Self {
        FgTextureType::Texture2D
    }
}

/// Identifies the subpass on either end of a subpass dependency
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgSubpassIndex {
    /// Commands recorded before or after the render pass
    External,
    Index(u32),
}
