//! Package loading for instanced props.
//!
//! A *polygon package* holds simplified geometry for every (source, LOD
//! tier) and registers collision meshes with the physics collaborator. A
//! *spritesheet package* packs billboard frames for every source into one
//! atlas. Both are fetched through an [`AssetTransport`], decoded from
//! CBOR (optionally zstd-compressed), and identified by a content hash.
//!
//! # Invariants
//! - Packages are immutable once built and shared behind `Arc`.
//! - A failed load never leaves collision meshes registered.

mod codec;
mod error;
mod loader;
mod mesh;
mod physics;
mod polygon;
mod simplify;
mod source;
mod spritesheet;

pub use codec::{content_id, decode_asset, encode_asset};
pub use error::{CodecError, LoadError, PhysicsError, TransportError};
pub use loader::PackageLoader;
pub use mesh::{Geometry, MeshAsset};
pub use physics::{CollisionHandle, CollisionRegistry, CollisionShape, PhysicsWorld};
pub use polygon::PolygonPackage;
pub use simplify::simplify;
pub use source::{AssetKind, AssetTransport, FsTransport, MemoryTransport, SourceId};
pub use spritesheet::{
    Atlas, MAX_ATLAS_SIZE, SpriteAsset, SpriteEntry, SpriteFrame, SpritesheetPackage,
};

pub fn crate_info() -> &'static str {
    "propfield-assets v0.1.0"
}
