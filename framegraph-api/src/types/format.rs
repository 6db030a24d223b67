#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Pixel format of a texture or attachment. Names follow vulkan's VkFormat.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum FgFormat {
    UNDEFINED,
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16G16_SFLOAT,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    R32G32B32A32_SFLOAT,
    D16_UNORM,
    D32_SFLOAT,
    S8_UINT,
    D16_UNORM_S8_UINT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl Default for FgFormat {
    fn default() -> Self {
        FgFormat::UNDEFINED
    }
}

impl FgFormat {
    pub fn has_depth(self) -> bool {
        match self {
            FgFormat::D16_UNORM
            | FgFormat::D32_SFLOAT
            | FgFormat::D16_UNORM_S8_UINT
            | FgFormat::D24_UNORM_S8_UINT
            | FgFormat::D32_SFLOAT_S8_UINT => true,
            _ => false,
        }
    }

    pub fn has_stencil(self) -> bool {
        match self {
            FgFormat::S8_UINT
            | FgFormat::D16_UNORM_S8_UINT
            | FgFormat::D24_UNORM_S8_UINT
            | FgFormat::D32_SFLOAT_S8_UINT => true,
            _ => false,
        }
    }

    pub fn has_depth_or_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    pub fn has_depth_and_stencil(self) -> bool {
        self.has_depth() && self.has_stencil()
    }

    pub fn is_color(self) -> bool {
        self != FgFormat::UNDEFINED && !self.has_depth_or_stencil()
    }
}
