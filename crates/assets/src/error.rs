use propfield_common::LodTier;

use crate::source::{AssetKind, SourceId};

/// Errors raised by an [`AssetTransport`](crate::AssetTransport).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset not found: {0}")]
    NotFound(String),
}

/// Errors raised while decoding asset bytes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
}

/// Errors from the physics collaborator.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("collision mesh rejected: {0}")]
    Rejected(String),
}

/// A package load failed. Nothing from a failed load is installed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no source identifiers given")]
    NoSources,
    #[error("LOD spec table is empty")]
    NoLodSpecs,
    #[error("{sources} sources but {assets} assets")]
    SourceCountMismatch { sources: usize, assets: usize },
    #[error("fetching {kind:?} for {asset}: {error}")]
    Transport {
        asset: SourceId,
        kind: AssetKind,
        #[source]
        error: TransportError,
    },
    #[error("decoding {kind:?} for {asset}: {error}")]
    Decode {
        asset: SourceId,
        kind: AssetKind,
        #[source]
        error: CodecError,
    },
    #[error("invalid mesh {asset}: {reason}")]
    InvalidMesh { asset: SourceId, reason: String },
    #[error("{asset} {tier}: simplification produced no triangles")]
    EmptyLod { asset: SourceId, tier: LodTier },
    #[error("invalid spritesheet {asset}: {reason}")]
    InvalidSprite { asset: SourceId, reason: String },
    #[error("atlas {width}x{height} exceeds the {max}px limit")]
    AtlasTooLarge { width: u64, height: u64, max: u32 },
    #[error("physics rejected {asset}: {error}")]
    Physics {
        asset: SourceId,
        #[source]
        error: PhysicsError,
    },
}
