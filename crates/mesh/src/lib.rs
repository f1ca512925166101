//! Instanced object mesh: the entry point for streaming prop populations.
//!
//! Construct with a render context, a physics collaborator and the source
//! identifiers, await [`InstancedObjectMesh::wait_for_load`], then feed
//! chunks in and out as the world scrolls and call `update` once per frame.
//!
//! # Invariants
//! - Chunk adds are rejected until both packages are installed.
//! - Every instance is owned by exactly one of the two batch managers.
//! - A failed `add_chunk` leaves both managers as they were.

mod error;
mod object;

#[cfg(test)]
mod scenarios;

pub use error::MeshError;
pub use object::{ChunkAdd, InstancedObjectMesh, MeshStats};

pub fn crate_info() -> &'static str {
    "propfield-mesh v0.1.0"
}
