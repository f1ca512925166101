use glam::{Vec2, Vec3};
use propfield_assets::SpritesheetPackage;
use propfield_common::{ChunkId, ChunkResult, LodPolicy, LodTier, Representation, SPRITE_LOD_CUTOFF};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BatchError, CapacityLimit};
use crate::instance::SpriteInstanceData;
use crate::renderer::RenderView;

/// Default cap on resident billboards.
pub const DEFAULT_MAX_SPRITES: usize = 1 << 20;

/// Bookkeeping kept next to each GPU record.
#[derive(Debug, Clone, Copy)]
struct SpriteRecord {
    key: u32,
    source: u32,
    /// The object's own yaw; angle frames are relative to it.
    base_yaw: f32,
    phase_offset: f32,
}

/// All billboard instances in one dense array, drawn with a single mechanism
/// against the package atlas.
#[derive(Debug)]
pub struct SpritesheetBatchManager {
    cutoff: LodTier,
    policy: LodPolicy,
    max_instances: usize,
    animation_rate: f32,
    package: Option<Arc<SpritesheetPackage>>,
    instances: Vec<SpriteInstanceData>,
    records: Vec<SpriteRecord>,
    /// Instance key → dense index.
    index_of: Vec<Option<u32>>,
    free_keys: Vec<u32>,
    chunks: HashMap<ChunkId, Vec<u32>>,
    frame: u64,
}

impl Default for SpritesheetBatchManager {
    fn default() -> Self {
        Self::new(SPRITE_LOD_CUTOFF)
    }
}

impl SpritesheetBatchManager {
    pub fn new(cutoff: LodTier) -> Self {
        Self {
            cutoff,
            policy: LodPolicy::default(),
            max_instances: DEFAULT_MAX_SPRITES,
            animation_rate: 0.01,
            package: None,
            instances: Vec::new(),
            records: Vec::new(),
            index_of: Vec::new(),
            free_keys: Vec::new(),
            chunks: HashMap::new(),
            frame: 0,
        }
    }

    pub fn with_lod_policy(mut self, policy: LodPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_capacity(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    /// Animation cycles advanced per `update`.
    pub fn with_animation_rate(mut self, rate: f32) -> Self {
        self.animation_rate = rate;
        self
    }

    pub fn cutoff(&self) -> LodTier {
        self.cutoff
    }

    pub fn package(&self) -> Option<&Arc<SpritesheetPackage>> {
        self.package.as_ref()
    }

    /// Install the atlas and frame tables. Replacing a package drops every
    /// resident chunk.
    pub fn set_package(&mut self, package: Arc<SpritesheetPackage>) {
        if !self.chunks.is_empty() {
            tracing::warn!(chunks = self.chunks.len(), "sprite package replaced, dropping resident chunks");
            self.instances.clear();
            self.records.clear();
            self.index_of.clear();
            self.free_keys.clear();
            self.chunks.clear();
        }
        tracing::debug!(
            package = package.id(),
            sources = package.entries().len(),
            "spritesheet package installed"
        );
        self.package = Some(package);
    }

    /// Append every sprite-classified instance of `result`. All-or-nothing
    /// against `max_instances`.
    pub fn add_chunk(&mut self, chunk: ChunkId, result: &ChunkResult) -> Result<usize, BatchError> {
        let Some(package) = self.package.as_ref() else {
            return Err(BatchError::NotLoaded);
        };
        if self.chunks.contains_key(&chunk) {
            return Err(BatchError::DuplicateChunk(chunk));
        }

        let mut pending = Vec::new();
        for instance in &result.instances {
            if !Representation::of(&instance.lod, &self.policy, self.cutoff).is_sprite() {
                continue;
            }
            let entry = package.entry(instance.source).ok_or(BatchError::MissingSprite {
                chunk,
                source_index: instance.source,
            })?;
            let t = &instance.transform;
            let base_yaw = t.yaw();
            let frame = entry.frames[0];
            pending.push((
                SpriteInstanceData {
                    position: t.position.to_array(),
                    yaw: base_yaw,
                    size: [entry.world_size[0] * t.scale.x, entry.world_size[1] * t.scale.y],
                    phase: 0.0,
                    frame: 0,
                    uv_min: frame.uv_min,
                    uv_max: frame.uv_max,
                },
                SpriteRecord {
                    key: 0,
                    source: instance.source,
                    base_yaw,
                    phase_offset: phase_offset(t.position),
                },
            ));
        }

        let room = self.max_instances.saturating_sub(self.instances.len());
        if pending.len() > room {
            let overflow = pending.len() - room;
            tracing::warn!(%chunk, overflow, "sprite capacity exceeded, chunk rejected");
            return Err(BatchError::CapacityExceeded {
                chunk,
                limit: CapacityLimit::SpriteInstances,
                overflow,
            });
        }

        let mut keys = Vec::with_capacity(pending.len());
        for (mut data, mut record) in pending {
            let key = match self.free_keys.pop() {
                Some(key) => key,
                None => {
                    self.index_of.push(None);
                    (self.index_of.len() - 1) as u32
                }
            };
            data.phase = record.phase_offset;
            record.key = key;
            self.index_of[key as usize] = Some(self.instances.len() as u32);
            self.instances.push(data);
            self.records.push(record);
            keys.push(key);
        }
        tracing::debug!(%chunk, sprites = keys.len(), total = self.instances.len(), "sprite chunk added");
        let added = keys.len();
        self.chunks.insert(chunk, keys);
        Ok(added)
    }

    /// Drop every sprite `chunk` contributed. Unknown chunks are a no-op.
    pub fn remove_chunk(&mut self, chunk: ChunkId) -> usize {
        let Some(keys) = self.chunks.remove(&chunk) else {
            return 0;
        };
        for &key in &keys {
            let Some(index) = self.index_of[key as usize].take() else {
                continue;
            };
            let index = index as usize;
            self.instances.swap_remove(index);
            self.records.swap_remove(index);
            if let Some(moved) = self.records.get(index) {
                self.index_of[moved.key as usize] = Some(index as u32);
            }
            self.free_keys.push(key);
        }
        tracing::debug!(%chunk, sprites = keys.len(), total = self.instances.len(), "sprite chunk removed");
        keys.len()
    }

    /// Per-frame pass: face every billboard towards the viewer, pick the
    /// angle frame for the viewer's bearing relative to the object's own
    /// yaw, and advance the animation phase.
    pub fn update(&mut self, view: &RenderView) {
        self.frame += 1;
        let Some(package) = self.package.as_ref() else {
            return;
        };
        let eye = Vec2::new(view.eye.x, view.eye.z);
        let cycles = self.frame as f32 * self.animation_rate;

        for (data, record) in self.instances.iter_mut().zip(&self.records) {
            let to_eye = eye - Vec2::new(data.position[0], data.position[2]);
            if to_eye.length_squared() > f32::EPSILON {
                data.yaw = to_eye.x.atan2(to_eye.y);
            }
            if let Some(entry) = package.entry(record.source) {
                let (index, frame) = entry.frame_for_angle(data.yaw - record.base_yaw);
                data.frame = index;
                data.uv_min = frame.uv_min;
                data.uv_max = frame.uv_max;
            }
            data.phase = unit_phase(record.phase_offset + cycles);
        }
        tracing::trace!(frame = self.frame, sprites = self.instances.len(), "sprites updated");
    }

    pub fn instances(&self) -> &[SpriteInstanceData] {
        &self.instances
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of `update` calls so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn contains_chunk(&self, chunk: ChunkId) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn chunk_instance_count(&self, chunk: ChunkId) -> Option<usize> {
        self.chunks.get(&chunk).map(Vec::len)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Stable per-instance offset so neighbouring sprites don't animate in step.
fn phase_offset(position: Vec3) -> f32 {
    let h = (position.x * 12.9898 + position.z * 78.233).sin() * 43_758.547;
    unit_phase(h)
}

/// Wrap into `[0, 1)`. `rem_euclid` of a tiny negative rounds up to 1.0.
fn unit_phase(x: f32) -> f32 {
    let wrapped = x.rem_euclid(1.0);
    if wrapped < 1.0 { wrapped } else { 0.0 }
}
