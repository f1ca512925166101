//! Chunk streaming for instanced props.
//!
//! # Invariants
//! - Load and unload lists never exceed their per-frame budgets.
//! - Scattered placements are a pure function of (seed, chunk, viewer).
//!
//! The stream decides *which* chunks are resident; what a chunk contains
//! comes from [`Scatter`] or any other producer of `ChunkResult`s.

mod budget;
mod grid;
mod scatter;

pub use budget::{StreamConfig, StreamState, StreamStats};
pub use grid::{ChunkGrid, chebyshev, chunks_in_radius};
pub use scatter::Scatter;

pub fn crate_info() -> &'static str {
    "propfield-stream v0.1.0"
}
