use glam::{Quat, Vec3};
use propfield_common::{ChunkId, ChunkResult, InstancePlacement, LodHint, Transform};

use crate::grid::ChunkGrid;

/// Deterministic prop scatter: the same seed and chunk always yield the same
/// placements, on every platform.
#[derive(Debug, Clone)]
pub struct Scatter {
    pub seed: u64,
    pub grid: ChunkGrid,
    pub instances_per_chunk: usize,
    /// Placements pick a source index in `0..source_count`.
    pub source_count: u32,
}

impl Scatter {
    pub fn new(seed: u64, grid: ChunkGrid, instances_per_chunk: usize, source_count: u32) -> Self {
        assert!(source_count > 0, "scatter needs at least one source");
        Self {
            seed,
            grid,
            instances_per_chunk,
            source_count,
        }
    }

    /// Placements for `chunk`, each hinted with its distance to `viewer`
    /// and the chunk's cluster density.
    pub fn generate(&self, chunk: ChunkId, viewer: Vec3) -> ChunkResult {
        let mut rng = Rng::for_chunk(self.seed, chunk);
        let origin = self.grid.chunk_origin(chunk);
        let size = self.grid.chunk_size();
        // 1.0 is nominal, clustered chunks go up to 2.0
        let density = 1.0 + rng.unit();

        let instances = (0..self.instances_per_chunk)
            .map(|_| {
                let position = origin + Vec3::new(rng.unit() * size, 0.0, rng.unit() * size);
                let yaw = rng.unit() * std::f32::consts::TAU;
                let scale = 0.8 + rng.unit() * 0.4;
                let source = (rng.next_u64() % self.source_count as u64) as u32;
                InstancePlacement {
                    source,
                    transform: Transform {
                        position,
                        rotation: Quat::from_rotation_y(yaw),
                        scale: Vec3::splat(scale),
                    },
                    lod: LodHint::Distance {
                        distance: position.distance(viewer),
                        density,
                    },
                }
            })
            .collect();
        ChunkResult::new(instances)
    }
}

struct Rng(u64);

impl Rng {
    fn for_chunk(seed: u64, chunk: ChunkId) -> Self {
        let mut state = splitmix64(seed);
        for coord in [chunk.x, chunk.y, chunk.z] {
            state = splitmix64(state ^ coord as u32 as u64);
        }
        Self(state)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = splitmix64(self.0);
        self.0
    }

    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
