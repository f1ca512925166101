use propfield_common::ChunkId;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::grid::{chebyshev, chunks_in_radius};

/// Streaming configuration: resident radius plus per-frame budgets.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Radius (in chunks) around the viewer that should be resident.
    pub radius: i32,
    /// Maximum number of chunks to stream in per frame.
    pub load_budget: usize,
    /// Maximum number of chunks to stream out per frame.
    pub unload_budget: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            radius: 4,
            load_budget: 4,
            unload_budget: 4,
        }
    }
}

/// Per-frame streaming statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub chunks_loaded_this_frame: usize,
    pub chunks_unloaded_this_frame: usize,
    pub total_resident_chunks: usize,
    pub frame_time: Duration,
}

/// Tracks which chunks are resident and hands out budgeted load/unload
/// lists as the viewer moves.
#[derive(Debug)]
pub struct StreamState {
    pub config: StreamConfig,
    resident: HashSet<ChunkId>,
    stats: StreamStats,
}

impl StreamState {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            resident: HashSet::new(),
            stats: StreamStats::default(),
        }
    }

    /// Advance one frame with the viewer in `viewer`. Returns the chunks to
    /// stream in (nearest first) and out (farthest first), each capped by
    /// its budget. Both lists are already applied to the resident set.
    pub fn update(&mut self, viewer: ChunkId) -> (Vec<ChunkId>, Vec<ChunkId>) {
        let _span = tracing::info_span!("stream_update", %viewer).entered();
        let frame_start = Instant::now();

        let desired = chunks_in_radius(viewer, self.config.radius);

        let to_load: Vec<ChunkId> = desired
            .iter()
            .filter(|c| !self.resident.contains(c))
            .take(self.config.load_budget)
            .copied()
            .collect();

        let radius = self.config.radius;
        let mut stale: Vec<ChunkId> = self
            .resident
            .iter()
            .filter(|c| chebyshev(viewer, **c) > radius)
            .copied()
            .collect();
        stale.sort_by_key(|c| (std::cmp::Reverse(chebyshev(viewer, *c)), c.x, c.z));
        stale.truncate(self.config.unload_budget);

        for c in &to_load {
            tracing::debug!(chunk = %c, "streaming in");
            self.resident.insert(*c);
        }
        for c in &stale {
            tracing::debug!(chunk = %c, "streaming out");
            self.resident.remove(c);
        }

        self.stats = StreamStats {
            chunks_loaded_this_frame: to_load.len(),
            chunks_unloaded_this_frame: stale.len(),
            total_resident_chunks: self.resident.len(),
            frame_time: frame_start.elapsed(),
        };

        tracing::trace!(
            loaded = to_load.len(),
            unloaded = stale.len(),
            total = self.resident.len(),
            "stream update complete"
        );

        (to_load, stale)
    }

    /// Drop a chunk from the resident set without streaming it out, e.g.
    /// when the consumer rejected it. It is offered again on a later update.
    pub fn forget(&mut self, chunk: ChunkId) -> bool {
        self.resident.remove(&chunk)
    }

    pub fn resident(&self) -> &HashSet<ChunkId> {
        &self.resident
    }

    pub fn is_resident(&self, chunk: ChunkId) -> bool {
        self.resident.contains(&chunk)
    }

    /// Statistics from the last update.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}
