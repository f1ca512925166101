use propfield_common::{ChunkId, LodTier};

/// The batching bound an `add_chunk` ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityLimit {
    GeometrySlots,
    DrawCallsPerGeometry,
    SpriteInstances,
}

impl std::fmt::Display for CapacityLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::GeometrySlots => "geometry slots",
            Self::DrawCallsPerGeometry => "draw calls per geometry",
            Self::SpriteInstances => "sprite instances",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    #[error("no package installed")]
    NotLoaded,
    #[error("chunk {0} is already resident")]
    DuplicateChunk(ChunkId),
    #[error("chunk {chunk}: {limit} exhausted, {overflow} instance(s) do not fit")]
    CapacityExceeded {
        chunk: ChunkId,
        limit: CapacityLimit,
        overflow: usize,
    },
    #[error("chunk {chunk}: no geometry for source {source_index} at {tier}")]
    MissingGeometry {
        chunk: ChunkId,
        source_index: u32,
        tier: LodTier,
    },
    #[error("chunk {chunk}: no sprite frames for source {source_index}")]
    MissingSprite { chunk: ChunkId, source_index: u32 },
}
