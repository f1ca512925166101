//! Shared data model for propfield: chunk identity, transforms, LOD tiers,
//! and the batching configuration every other crate reads.
//!
//! # Invariants
//! - Tier classification is a pure function of (hint, policy, cutoff).
//! - Configuration defaults equal the hardware-style limits.

mod config;
mod lod;
mod types;

pub use config::{BatchLimits, ConfigError, InstancedMeshConfig, LodSpec, LodSpecTable};
pub use lod::{
    DEFAULT_TIERS, LodBand, LodHint, LodPolicy, LodTier, Representation, SPRITE_LOD_CUTOFF,
};
pub use types::{ChunkId, ChunkResult, InstancePlacement, Transform};

pub fn crate_info() -> &'static str {
    "propfield-common v0.1.0"
}
