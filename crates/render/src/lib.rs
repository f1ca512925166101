//! Batching for instanced props: polygon instances packed into a bounded
//! slot × bucket grid, billboards kept in one dense sprite array.
//!
//! # Invariants
//! - An instance lives in exactly one manager, picked by comparing its
//!   resolved LOD tier to the sprite cutoff.
//! - Removing a chunk removes exactly what it added, from both managers.
//! - Renderers read [`FrameSnapshot`]s and never mutate batching state.

mod context;
mod error;
mod instance;
mod polygon;
mod renderer;
mod spritesheet;

pub use context::{HeadlessContext, NodeId, RenderContext};
pub use error::{BatchError, CapacityLimit};
pub use instance::{InstanceData, SpriteInstanceData};
pub use polygon::{DrawCall, GeometryKey, PolygonBatchManager, PolygonStats};
pub use renderer::{DebugTextRenderer, FrameSnapshot, RenderView, Renderer};
pub use spritesheet::{DEFAULT_MAX_SPRITES, SpritesheetBatchManager};

pub fn crate_info() -> &'static str {
    "propfield-render v0.1.0"
}
