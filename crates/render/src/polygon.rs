//! Polygon batching: instances packed into a bounded grid of geometry slots
//! × draw-call buckets.
//!
//! # Layout
//! Each resident `(source, tier)` pair owns one slot. A slot holds up to
//! `max_draw_calls_per_geometry` buckets; a bucket is a dense array of at
//! most `max_instances_per_geometry_per_draw_call` [`InstanceData`] records
//! with a parallel array of back-references into the instance arena.
//!
//! # Invariants
//! - Resident slots ≤ `max_num_geometries`.
//! - Every bucket holds ≤ the per-draw-call limit; every slot holds ≤ the
//!   per-geometry bucket limit.
//! - An `add_chunk` either places every polygon instance of the chunk or
//!   changes nothing.
//! - Empty buckets stay in their slot until the slot itself empties; the
//!   slot is then released and its bucket storage pooled.

use propfield_assets::{Geometry, PolygonPackage};
use propfield_common::{
    BatchLimits, ChunkId, ChunkResult, LodPolicy, LodTier, Representation, SPRITE_LOD_CUTOFF,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{BatchError, CapacityLimit};
use crate::instance::InstanceData;

/// Identifies the geometry a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryKey {
    pub source: u32,
    pub tier: LodTier,
}

impl std::fmt::Display for GeometryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "src{}/{}", self.source, self.tier)
    }
}

/// One instanced draw: a non-empty bucket of a resident slot.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub slot: usize,
    pub key: GeometryKey,
    pub geometry: &'a Arc<Geometry>,
    pub bucket: usize,
    pub instances: &'a [InstanceData],
    pub cast_shadow: bool,
}

/// Occupancy summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolygonStats {
    pub resident_slots: usize,
    pub buckets: usize,
    pub non_empty_buckets: usize,
    pub instances: usize,
    pub chunks: usize,
    /// Bucket storage waiting in the pool for the next slot.
    pub pooled_buckets: usize,
}

#[derive(Debug, Default)]
struct Bucket {
    instances: Vec<InstanceData>,
    owners: Vec<u32>,
}

impl Bucket {
    fn len(&self) -> usize {
        self.instances.len()
    }

    fn clear(&mut self) {
        self.instances.clear();
        self.owners.clear();
    }
}

#[derive(Debug)]
struct GeometrySlot {
    key: GeometryKey,
    geometry: Arc<Geometry>,
    buckets: Vec<Bucket>,
    /// All buckets below this index are full.
    first_open: usize,
    len: usize,
}

#[derive(Debug, Clone, Copy)]
struct Location {
    slot: u32,
    bucket: u32,
    lane: u32,
}

#[derive(Debug)]
pub struct PolygonBatchManager {
    cutoff: LodTier,
    limits: BatchLimits,
    policy: LodPolicy,
    cast_shadow: bool,
    package: Option<Arc<PolygonPackage>>,
    candidates: HashMap<GeometryKey, Arc<Geometry>>,
    slots: Vec<Option<GeometrySlot>>,
    slot_lookup: HashMap<GeometryKey, usize>,
    /// Instance arena: key → location. `None` entries are on `free_keys`.
    locations: Vec<Option<Location>>,
    free_keys: Vec<u32>,
    chunks: HashMap<ChunkId, Vec<u32>>,
    bucket_pool: Vec<Bucket>,
}

impl Default for PolygonBatchManager {
    fn default() -> Self {
        Self::new(SPRITE_LOD_CUTOFF, BatchLimits::default(), false)
    }
}

impl PolygonBatchManager {
    pub fn new(cutoff: LodTier, limits: BatchLimits, cast_shadow: bool) -> Self {
        Self {
            cutoff,
            limits,
            policy: LodPolicy::default(),
            cast_shadow,
            package: None,
            candidates: HashMap::new(),
            slots: Vec::new(),
            slot_lookup: HashMap::new(),
            locations: Vec::new(),
            free_keys: Vec::new(),
            chunks: HashMap::new(),
            bucket_pool: Vec::new(),
        }
    }

    pub fn with_lod_policy(mut self, policy: LodPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cutoff(&self) -> LodTier {
        self.cutoff
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub fn cast_shadow(&self) -> bool {
        self.cast_shadow
    }

    pub fn package(&self) -> Option<&Arc<PolygonPackage>> {
        self.package.as_ref()
    }

    /// Install a package. Every `(source, tier)` below the cutoff becomes a
    /// slot candidate; slots themselves are allocated on first use.
    /// Installing over a previous package drops all resident chunks.
    pub fn set_package(&mut self, package: Arc<PolygonPackage>) {
        if !self.chunks.is_empty() {
            tracing::warn!(chunks = self.chunks.len(), "package replaced, dropping resident chunks");
            let chunks: Vec<ChunkId> = self.chunks.keys().copied().collect();
            for chunk in chunks {
                self.remove_chunk(chunk);
            }
        }
        self.candidates = package
            .iter()
            .filter(|(_, tier, _)| *tier < self.cutoff)
            .map(|(source, tier, geometry)| (GeometryKey { source, tier }, geometry.clone()))
            .collect();
        tracing::debug!(
            package = package.id(),
            candidates = self.candidates.len(),
            "polygon package installed"
        );
        self.package = Some(package);
    }

    /// Batch every polygon-classified instance of `result`.
    ///
    /// All-or-nothing: the chunk is planned against the current occupancy
    /// first, and if anything would not fit the call fails with
    /// [`BatchError::CapacityExceeded`] without touching state. A chunk with
    /// no polygon instances is still recorded so a later duplicate is
    /// detected.
    pub fn add_chunk(&mut self, chunk: ChunkId, result: &ChunkResult) -> Result<usize, BatchError> {
        if self.package.is_none() {
            return Err(BatchError::NotLoaded);
        }
        if self.chunks.contains_key(&chunk) {
            return Err(BatchError::DuplicateChunk(chunk));
        }

        let mut placements = Vec::new();
        let mut demand: BTreeMap<GeometryKey, usize> = BTreeMap::new();
        for instance in &result.instances {
            let Representation::Polygon(tier) = Representation::of(&instance.lod, &self.policy, self.cutoff)
            else {
                continue;
            };
            let key = GeometryKey {
                source: instance.source,
                tier,
            };
            if !self.candidates.contains_key(&key) {
                return Err(BatchError::MissingGeometry {
                    chunk,
                    source_index: instance.source,
                    tier,
                });
            }
            *demand.entry(key).or_default() += 1;
            placements.push((key, InstanceData::from(&instance.transform)));
        }

        self.plan(chunk, &demand)?;

        let mut keys = Vec::with_capacity(placements.len());
        for (key, data) in placements {
            keys.push(self.place(key, data));
        }
        tracing::debug!(%chunk, instances = keys.len(), slots = self.slot_lookup.len(), "polygon chunk added");
        let added = keys.len();
        self.chunks.insert(chunk, keys);
        Ok(added)
    }

    /// Release everything `chunk` contributed. Unknown chunks are a no-op.
    /// Returns the number of instances removed.
    pub fn remove_chunk(&mut self, chunk: ChunkId) -> usize {
        let Some(keys) = self.chunks.remove(&chunk) else {
            return 0;
        };
        for &key in &keys {
            self.evict(key);
        }
        tracing::debug!(%chunk, instances = keys.len(), slots = self.slot_lookup.len(), "polygon chunk removed");
        keys.len()
    }

    /// Every non-empty bucket of every resident slot.
    pub fn draw_calls(&self) -> impl Iterator<Item = DrawCall<'_>> + '_ {
        let cast_shadow = self.cast_shadow;
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|slot| (index, slot)))
            .flat_map(move |(index, slot)| {
                slot.buckets
                    .iter()
                    .enumerate()
                    .filter(|(_, bucket)| bucket.len() > 0)
                    .map(move |(bucket_index, bucket)| DrawCall {
                        slot: index,
                        key: slot.key,
                        geometry: &slot.geometry,
                        bucket: bucket_index,
                        instances: &bucket.instances,
                        cast_shadow,
                    })
            })
    }

    pub fn stats(&self) -> PolygonStats {
        let mut stats = PolygonStats {
            resident_slots: self.slot_lookup.len(),
            chunks: self.chunks.len(),
            pooled_buckets: self.bucket_pool.len(),
            ..PolygonStats::default()
        };
        for slot in self.slots.iter().flatten() {
            stats.buckets += slot.buckets.len();
            stats.non_empty_buckets += slot.buckets.iter().filter(|b| b.len() > 0).count();
            stats.instances += slot.len;
        }
        stats
    }

    /// Instance count of each bucket in the slot for `key`, or `None` if the
    /// key has no resident slot.
    pub fn bucket_sizes(&self, key: GeometryKey) -> Option<Vec<usize>> {
        let slot = self.slot(key)?;
        Some(slot.buckets.iter().map(Bucket::len).collect())
    }

    pub fn resident_slots(&self) -> usize {
        self.slot_lookup.len()
    }

    pub fn resident_keys(&self) -> Vec<GeometryKey> {
        let mut keys: Vec<GeometryKey> = self.slot_lookup.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn instance_count(&self) -> usize {
        self.slots.iter().flatten().map(|slot| slot.len).sum()
    }

    pub fn contains_chunk(&self, chunk: ChunkId) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn chunk_instance_count(&self, chunk: ChunkId) -> Option<usize> {
        self.chunks.get(&chunk).map(Vec::len)
    }

    fn slot(&self, key: GeometryKey) -> Option<&GeometrySlot> {
        let index = *self.slot_lookup.get(&key)?;
        self.slots[index].as_ref()
    }

    /// Check `demand` against remaining capacity without mutating anything.
    fn plan(&self, chunk: ChunkId, demand: &BTreeMap<GeometryKey, usize>) -> Result<(), BatchError> {
        let per_bucket = self.limits.max_instances_per_geometry_per_draw_call;
        let per_geometry = self.limits.per_geometry_capacity();
        let mut free_slots = self
            .limits
            .max_num_geometries
            .saturating_sub(self.slot_lookup.len());

        let mut overflow = 0;
        let mut limit = None;
        for (key, &count) in demand {
            let free = match self.slot(*key) {
                Some(slot) => {
                    let open_lanes: usize = slot.buckets.iter().map(|b| per_bucket - b.len()).sum();
                    let unopened = self.limits.max_draw_calls_per_geometry - slot.buckets.len();
                    open_lanes + unopened * per_bucket
                }
                None if free_slots > 0 => {
                    free_slots -= 1;
                    per_geometry
                }
                None => {
                    overflow += count;
                    limit.get_or_insert(CapacityLimit::GeometrySlots);
                    continue;
                }
            };
            if count > free {
                overflow += count - free;
                limit.get_or_insert(CapacityLimit::DrawCallsPerGeometry);
            }
        }

        match limit {
            None => Ok(()),
            Some(limit) => {
                tracing::warn!(%chunk, %limit, overflow, "polygon capacity exceeded, chunk rejected");
                Err(BatchError::CapacityExceeded {
                    chunk,
                    limit,
                    overflow,
                })
            }
        }
    }

    /// Put one instance into its slot. Capacity was checked by `plan`.
    fn place(&mut self, key: GeometryKey, data: InstanceData) -> u32 {
        let slot_index = match self.slot_lookup.get(&key) {
            Some(&index) => index,
            None => self.open_slot(key),
        };
        let instance_key = match self.free_keys.pop() {
            Some(k) => k,
            None => {
                self.locations.push(None);
                (self.locations.len() - 1) as u32
            }
        };

        let per_bucket = self.limits.max_instances_per_geometry_per_draw_call;
        let Some(slot) = self.slots[slot_index].as_mut() else {
            unreachable!("slot lookup points at a released slot");
        };
        if slot.first_open == slot.buckets.len() {
            let bucket = self.bucket_pool.pop().unwrap_or_default();
            slot.buckets.push(bucket);
            tracing::trace!(%key, buckets = slot.buckets.len(), "bucket opened");
        }
        let bucket_index = slot.first_open;
        let bucket = &mut slot.buckets[bucket_index];
        let lane = bucket.len();
        bucket.instances.push(data);
        bucket.owners.push(instance_key);
        slot.len += 1;
        while slot.first_open < slot.buckets.len() && slot.buckets[slot.first_open].len() >= per_bucket {
            slot.first_open += 1;
        }

        self.locations[instance_key as usize] = Some(Location {
            slot: slot_index as u32,
            bucket: bucket_index as u32,
            lane: lane as u32,
        });
        instance_key
    }

    fn open_slot(&mut self, key: GeometryKey) -> usize {
        let geometry = self.candidates[&key].clone();
        let slot = GeometrySlot {
            key,
            geometry,
            buckets: Vec::new(),
            first_open: 0,
            len: 0,
        };
        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(slot);
                index
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.slot_lookup.insert(key, index);
        tracing::debug!(%key, slot = index, shadow = self.cast_shadow, "geometry slot allocated");
        index
    }

    fn evict(&mut self, instance_key: u32) {
        let Some(location) = self.locations[instance_key as usize].take() else {
            return;
        };
        self.free_keys.push(instance_key);

        let slot_index = location.slot as usize;
        let Some(slot) = self.slots[slot_index].as_mut() else {
            return;
        };
        let bucket_index = location.bucket as usize;
        let lane = location.lane as usize;
        let bucket = &mut slot.buckets[bucket_index];
        bucket.instances.swap_remove(lane);
        bucket.owners.swap_remove(lane);
        if let Some(&moved) = bucket.owners.get(lane) {
            if let Some(moved) = self.locations[moved as usize].as_mut() {
                moved.lane = lane as u32;
            }
        }
        slot.len -= 1;
        slot.first_open = slot.first_open.min(bucket_index);

        if slot.len == 0 {
            self.release_slot(slot_index);
        }
    }

    fn release_slot(&mut self, index: usize) {
        let Some(slot) = self.slots[index].take() else {
            return;
        };
        self.slot_lookup.remove(&slot.key);
        let pooled = slot.buckets.len();
        for mut bucket in slot.buckets {
            bucket.clear();
            self.bucket_pool.push(bucket);
        }
        tracing::debug!(key = %slot.key, slot = index, pooled, "geometry slot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use propfield_assets::{MeshAsset, SourceId};
    use propfield_common::{InstancePlacement, LodHint, Transform};

    fn package(sources: u32) -> Arc<PolygonPackage> {
        let mut names = Vec::new();
        let mut geometries: Vec<BTreeMap<LodTier, Arc<Geometry>>> = Vec::new();
        for s in 0..sources {
            names.push(SourceId::new(format!("src{s}")));
            let cube = MeshAsset::cuboid(0.5);
            geometries.push(
                [LodTier::ONE, LodTier::TWO, LodTier::FOUR, LodTier::EIGHT]
                    .into_iter()
                    .map(|tier| (tier, Arc::new(Geometry::from_asset(tier, &cube))))
                    .collect(),
            );
        }
        Arc::new(PolygonPackage::new(names, geometries))
    }

    fn chunk(source: u32, tier: LodTier, count: usize) -> ChunkResult {
        ChunkResult::new(
            (0..count)
                .map(|i| InstancePlacement {
                    source,
                    transform: Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)),
                    lod: LodHint::Tier(tier),
                })
                .collect(),
        )
    }

    fn loaded(limits: BatchLimits, sources: u32) -> PolygonBatchManager {
        let mut manager = PolygonBatchManager::new(SPRITE_LOD_CUTOFF, limits, true);
        manager.set_package(package(sources));
        manager
    }

    fn small_limits() -> BatchLimits {
        BatchLimits {
            max_num_geometries: 2,
            max_instances_per_geometry_per_draw_call: 4,
            max_draw_calls_per_geometry: 3,
        }
    }

    /// Cross-check the arena against the buckets.
    fn assert_consistent(manager: &PolygonBatchManager) {
        let limits = manager.limits();
        assert!(manager.resident_slots() <= limits.max_num_geometries);
        let mut live = 0;
        for (slot_index, slot) in manager.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            assert!(slot.buckets.len() <= limits.max_draw_calls_per_geometry);
            assert_eq!(manager.slot_lookup[&slot.key], slot_index);
            let mut total = 0;
            for (bucket_index, bucket) in slot.buckets.iter().enumerate() {
                assert!(bucket.len() <= limits.max_instances_per_geometry_per_draw_call);
                assert_eq!(bucket.instances.len(), bucket.owners.len());
                for (lane, &owner) in bucket.owners.iter().enumerate() {
                    let location = manager.locations[owner as usize].unwrap();
                    assert_eq!(
                        (location.slot as usize, location.bucket as usize, location.lane as usize),
                        (slot_index, bucket_index, lane)
                    );
                }
                total += bucket.len();
            }
            assert_eq!(total, slot.len);
            live += total;
        }
        let chunk_total: usize = manager.chunks.values().map(Vec::len).sum();
        assert_eq!(live, chunk_total);
    }

    #[test]
    fn add_before_package_fails() {
        let mut manager = PolygonBatchManager::default();
        assert_eq!(
            manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 1)),
            Err(BatchError::NotLoaded)
        );
    }

    #[test]
    fn fills_buckets_in_order() {
        let mut manager = loaded(BatchLimits::default(), 1);
        let added = manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 300)).unwrap();
        assert_eq!(added, 300);
        let key = GeometryKey {
            source: 0,
            tier: LodTier::ONE,
        };
        assert_eq!(manager.bucket_sizes(key), Some(vec![256, 44]));
        assert_eq!(manager.resident_slots(), 1);
        assert!(manager.draw_calls().all(|call| call.cast_shadow));
        assert_consistent(&manager);
    }

    #[test]
    fn sprite_tier_instances_are_skipped() {
        let mut manager = loaded(BatchLimits::default(), 1);
        let id = ChunkId::new(1, 0, 0);
        assert_eq!(manager.add_chunk(id, &chunk(0, LodTier::EIGHT, 10)).unwrap(), 0);
        assert_eq!(manager.instance_count(), 0);
        assert_eq!(manager.resident_slots(), 0);
        // still recorded, so a duplicate is caught
        assert!(manager.contains_chunk(id));
        assert_eq!(
            manager.add_chunk(id, &chunk(0, LodTier::EIGHT, 1)),
            Err(BatchError::DuplicateChunk(id))
        );
    }

    #[test]
    fn unused_tiers_take_no_slot() {
        let mut manager = loaded(BatchLimits::default(), 3);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(2, LodTier::FOUR, 5)).unwrap();
        assert_eq!(
            manager.resident_keys(),
            vec![GeometryKey {
                source: 2,
                tier: LodTier::FOUR
            }]
        );
    }

    #[test]
    fn duplicate_chunk_leaves_state_alone() {
        let mut manager = loaded(BatchLimits::default(), 1);
        let id = ChunkId::new(0, 0, 0);
        manager.add_chunk(id, &chunk(0, LodTier::ONE, 3)).unwrap();
        let before = manager.stats();
        assert_eq!(
            manager.add_chunk(id, &chunk(0, LodTier::TWO, 3)),
            Err(BatchError::DuplicateChunk(id))
        );
        assert_eq!(manager.stats(), before);
    }

    #[test]
    fn missing_geometry_is_reported() {
        let mut manager = loaded(BatchLimits::default(), 1);
        let err = manager
            .add_chunk(ChunkId::new(0, 0, 0), &chunk(7, LodTier::ONE, 1))
            .unwrap_err();
        assert!(matches!(err, BatchError::MissingGeometry { source_index: 7, .. }));

        // tier 3 is below the cutoff but the package has no geometry for it
        let err = manager
            .add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier(3), 1))
            .unwrap_err();
        assert!(matches!(err, BatchError::MissingGeometry { tier: LodTier(3), .. }));
        assert!(!manager.contains_chunk(ChunkId::new(0, 0, 0)));
    }

    #[test]
    fn bucket_overflow_rejects_whole_chunk() {
        let mut manager = loaded(small_limits(), 1);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 10)).unwrap();
        let before = manager.stats();

        // 12 lanes per slot, 2 left
        let err = manager
            .add_chunk(ChunkId::new(1, 0, 0), &chunk(0, LodTier::ONE, 5))
            .unwrap_err();
        assert_eq!(
            err,
            BatchError::CapacityExceeded {
                chunk: ChunkId::new(1, 0, 0),
                limit: CapacityLimit::DrawCallsPerGeometry,
                overflow: 3,
            }
        );
        assert_eq!(manager.stats(), before);
        assert!(!manager.contains_chunk(ChunkId::new(1, 0, 0)));

        manager.add_chunk(ChunkId::new(1, 0, 0), &chunk(0, LodTier::ONE, 2)).unwrap();
        assert_eq!(manager.instance_count(), 12);
        assert_consistent(&manager);
    }

    #[test]
    fn slot_overflow_rejects_whole_chunk() {
        let mut manager = loaded(small_limits(), 3);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 1)).unwrap();
        manager.add_chunk(ChunkId::new(1, 0, 0), &chunk(1, LodTier::ONE, 1)).unwrap();

        let mut mixed = chunk(0, LodTier::ONE, 2);
        mixed.instances.extend(chunk(2, LodTier::ONE, 3).instances);
        let err = manager.add_chunk(ChunkId::new(2, 0, 0), &mixed).unwrap_err();
        assert_eq!(
            err,
            BatchError::CapacityExceeded {
                chunk: ChunkId::new(2, 0, 0),
                limit: CapacityLimit::GeometrySlots,
                overflow: 3,
            }
        );
        assert_eq!(manager.instance_count(), 2);
    }

    #[test]
    fn two_new_keys_compete_for_one_slot() {
        let mut manager = loaded(small_limits(), 3);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 1)).unwrap();
        let mut mixed = chunk(1, LodTier::ONE, 1);
        mixed.instances.extend(chunk(2, LodTier::ONE, 1).instances);
        assert!(matches!(
            manager.add_chunk(ChunkId::new(1, 0, 0), &mixed),
            Err(BatchError::CapacityExceeded {
                limit: CapacityLimit::GeometrySlots,
                overflow: 1,
                ..
            })
        ));
        assert_eq!(manager.resident_slots(), 1);
    }

    #[test]
    fn removal_compacts_and_reuses_buckets() {
        let mut manager = loaded(small_limits(), 1);
        let key = GeometryKey {
            source: 0,
            tier: LodTier::ONE,
        };
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 3)).unwrap();
        manager.add_chunk(ChunkId::new(1, 0, 0), &chunk(0, LodTier::ONE, 6)).unwrap();
        assert_eq!(manager.bucket_sizes(key), Some(vec![4, 4, 1]));

        assert_eq!(manager.remove_chunk(ChunkId::new(0, 0, 0)), 3);
        assert_eq!(manager.bucket_sizes(key), Some(vec![1, 4, 1]));
        assert_consistent(&manager);

        // the hole in bucket 0 is refilled before bucket 2
        manager.add_chunk(ChunkId::new(2, 0, 0), &chunk(0, LodTier::ONE, 4)).unwrap();
        assert_eq!(manager.bucket_sizes(key), Some(vec![4, 4, 2]));
        assert_consistent(&manager);
    }

    #[test]
    fn empty_slot_is_released_and_pooled() {
        let mut manager = loaded(small_limits(), 3);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 9)).unwrap();
        manager.add_chunk(ChunkId::new(1, 0, 0), &chunk(1, LodTier::ONE, 1)).unwrap();
        assert_eq!(manager.remove_chunk(ChunkId::new(0, 0, 0)), 9);
        assert_eq!(manager.resident_slots(), 1);
        assert_eq!(manager.stats().pooled_buckets, 3);

        // the freed slot takes a new key and draws on pooled storage
        manager.add_chunk(ChunkId::new(2, 0, 0), &chunk(2, LodTier::ONE, 5)).unwrap();
        assert_eq!(manager.resident_slots(), 2);
        assert_eq!(manager.stats().pooled_buckets, 1);
        assert_consistent(&manager);
    }

    #[test]
    fn unknown_removal_is_a_noop() {
        let mut manager = loaded(BatchLimits::default(), 1);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 3)).unwrap();
        let before = manager.stats();
        assert_eq!(manager.remove_chunk(ChunkId::new(9, 9, 9)), 0);
        assert_eq!(manager.stats(), before);

        assert_eq!(manager.remove_chunk(ChunkId::new(0, 0, 0)), 3);
        let emptied = manager.stats();
        assert_eq!(manager.remove_chunk(ChunkId::new(0, 0, 0)), 0);
        assert_eq!(manager.stats(), emptied);
        assert_eq!(manager.instance_count(), 0);
    }

    #[test]
    fn draw_calls_cover_every_instance() {
        let mut manager = loaded(small_limits(), 2);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 6)).unwrap();
        manager.add_chunk(ChunkId::new(1, 0, 0), &chunk(1, LodTier::TWO, 3)).unwrap();
        let calls: Vec<_> = manager.draw_calls().collect();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.iter().map(|c| c.instances.len()).sum::<usize>(), 9);
        assert!(calls.iter().all(|c| c.geometry.tier == c.key.tier));
    }

    #[test]
    fn churn_keeps_back_references_valid() {
        let mut manager = loaded(small_limits(), 2);
        for round in 0..20i32 {
            let id = ChunkId::new(round, 0, 0);
            let source = (round % 2) as u32;
            let _ = manager.add_chunk(id, &chunk(source, LodTier::ONE, (round % 5 + 1) as usize));
            if round % 3 == 0 {
                manager.remove_chunk(ChunkId::new(round - 2, 0, 0));
            }
            assert_consistent(&manager);
        }
    }

    #[test]
    fn replacing_package_drops_chunks() {
        let mut manager = loaded(BatchLimits::default(), 1);
        manager.add_chunk(ChunkId::new(0, 0, 0), &chunk(0, LodTier::ONE, 3)).unwrap();
        manager.set_package(package(2));
        assert_eq!(manager.instance_count(), 0);
        assert!(!manager.contains_chunk(ChunkId::new(0, 0, 0)));
    }
}
