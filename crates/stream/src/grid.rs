use glam::Vec3;
use propfield_common::ChunkId;

/// Uniform XZ grid mapping world positions to chunk identities. Chunks are
/// columns: `y` is always 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkGrid {
    chunk_size: f32,
}

impl ChunkGrid {
    pub fn new(chunk_size: f32) -> Self {
        assert!(chunk_size > 0.0, "chunk_size must be positive");
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Chunk containing a world position.
    pub fn chunk_at(&self, pos: Vec3) -> ChunkId {
        ChunkId::new(
            (pos.x / self.chunk_size).floor() as i32,
            0,
            (pos.z / self.chunk_size).floor() as i32,
        )
    }

    /// World-space corner of a chunk with the smallest coordinates.
    pub fn chunk_origin(&self, chunk: ChunkId) -> Vec3 {
        Vec3::new(chunk.x as f32 * self.chunk_size, 0.0, chunk.z as f32 * self.chunk_size)
    }

    pub fn chunk_center(&self, chunk: ChunkId) -> Vec3 {
        self.chunk_origin(chunk) + Vec3::new(self.chunk_size, 0.0, self.chunk_size) * 0.5
    }
}

/// Chunks within a square radius of `center`, nearest first.
pub fn chunks_in_radius(center: ChunkId, radius: i32) -> Vec<ChunkId> {
    let mut result = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)).max(0) as usize);
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            result.push(ChunkId::new(center.x + dx, 0, center.z + dz));
        }
    }
    result.sort_by_key(|c| (chebyshev(center, *c), c.x, c.z));
    result
}

/// Ring distance between two chunks.
pub fn chebyshev(a: ChunkId, b: ChunkId) -> i32 {
    (a.x - b.x).abs().max((a.z - b.z).abs())
}
