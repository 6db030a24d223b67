//! A frame graph compiler. Passes declare the attachments they read and write, and the graph
//! works out everything else: which passes actually contribute to the outputs and in what order
//! they run, which passes can share a texture, and which barriers and render passes are needed
//! between them.
//!
//! Baking happens once per configuration (startup, resize) and produces a `BakedFrameGraph` that
//! is executed every frame.

pub use framegraph_api as api;

mod error;
pub use error::*;

pub mod graph;
