//! Types and traits shared between the frame graph and the device that backs it. The frame graph
//! only ever talks to a graphics API through `FgDevice` and `FgCommandBuffer`.

pub use command_buffer::*;
pub use device::*;
pub use error::*;
pub use types::*;

mod command_buffer;
mod device;
mod error;
mod types;
