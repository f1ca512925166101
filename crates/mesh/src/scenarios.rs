//! End-to-end behaviour of the instanced object mesh against in-memory
//! collaborators.

use glam::Vec3;
use propfield_assets::{
    AssetKind, CollisionRegistry, MemoryTransport, MeshAsset, PackageLoader, SourceId, SpriteAsset,
    encode_asset,
};
use propfield_common::{
    BatchLimits, ChunkId, ChunkResult, ConfigError, InstancePlacement, InstancedMeshConfig, LodHint, LodPolicy,
    LodTier, Representation, Transform,
};
use propfield_render::{BatchError, CapacityLimit, GeometryKey, HeadlessContext, RenderView};
use propfield_stream::{ChunkGrid, Scatter};
use std::sync::Arc;

use crate::{InstancedObjectMesh, MeshError};

const TIERS: [LodTier; 3] = [LodTier::ONE, LodTier::TWO, LodTier::FOUR];

fn source_ids(count: usize) -> Vec<SourceId> {
    (0..count).map(|i| SourceId::new(format!("prop{i}"))).collect()
}

fn transport(count: usize) -> MemoryTransport {
    let mut transport = MemoryTransport::new();
    for (i, source) in source_ids(count).into_iter().enumerate() {
        let mesh = MeshAsset::cuboid(0.5 + i as f32 * 0.1);
        let sprite = SpriteAsset::solid(4, 8, [40, 160, 40, 255], [1.0, 2.0]);
        transport.insert(source.clone(), AssetKind::Mesh, encode_asset(&mesh, true).unwrap());
        transport.insert(source, AssetKind::Spritesheet, encode_asset(&sprite, true).unwrap());
    }
    transport
}

struct Harness {
    mesh: InstancedObjectMesh,
    context: Arc<HeadlessContext>,
    physics: Arc<CollisionRegistry>,
}

fn unloaded(count: usize, config: InstancedMeshConfig) -> Harness {
    let context = Arc::new(HeadlessContext::new());
    let physics = Arc::new(CollisionRegistry::new());
    let mesh =
        InstancedObjectMesh::with_config(context.clone(), physics.clone(), source_ids(count), true, config)
            .unwrap();
    Harness {
        mesh,
        context,
        physics,
    }
}

fn loaded(count: usize, config: InstancedMeshConfig) -> Harness {
    let mut harness = unloaded(count, config);
    let loader = PackageLoader::new(transport(count));
    pollster::block_on(harness.mesh.wait_for_load(&loader)).unwrap();
    harness
}

fn tiered(source: u32, tier: LodTier, count: usize) -> ChunkResult {
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

fn small_config() -> InstancedMeshConfig {
    InstancedMeshConfig {
        limits: BatchLimits {
            max_num_geometries: 3,
            max_instances_per_geometry_per_draw_call: 8,
            max_draw_calls_per_geometry: 4,
        },
        ..InstancedMeshConfig::default()
    }
}

/// Tiny deterministic generator for the property loops.
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, n: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % n
    }
}

fn assert_within_limits(mesh: &InstancedObjectMesh) {
    let limits = mesh.config().limits;
    let polygon = mesh.polygon();
    assert!(polygon.resident_slots() <= limits.max_num_geometries);
    for key in polygon.resident_keys() {
        let sizes = polygon.bucket_sizes(key).unwrap();
        assert!(sizes.len() <= limits.max_draw_calls_per_geometry, "{key}: {sizes:?}");
        assert!(
            sizes.iter().all(|&n| n <= limits.max_instances_per_geometry_per_draw_call),
            "{key}: {sizes:?}"
        );
    }
}

#[test]
fn construction_builds_the_node_tree() {
    let harness = unloaded(2, InstancedMeshConfig::default());
    let (polygon, sprites) = harness.mesh.child_nodes();
    assert_eq!(harness.context.children(harness.mesh.node()), vec![polygon, sprites]);
    assert_eq!(harness.context.node_count(), 3);
    assert!(!harness.mesh.is_loaded());
    assert!(harness.mesh.polygon().cast_shadow());
}

#[test]
fn invalid_config_is_rejected() {
    let context = Arc::new(HeadlessContext::new());
    let physics = Arc::new(CollisionRegistry::new());
    let config = InstancedMeshConfig {
        sprite_lod_cutoff: LodTier::ONE,
        ..InstancedMeshConfig::default()
    };
    let result = InstancedObjectMesh::with_config(context.clone(), physics.clone(), source_ids(1), false, config);
    assert!(matches!(result, Err(MeshError::Config(_))));

    let mut config = InstancedMeshConfig::default();
    config.lod_policy.bands[0].tier = LodTier(3);
    let result = InstancedObjectMesh::with_config(context, physics, source_ids(1), false, config);
    assert!(matches!(
        result,
        Err(MeshError::Config(ConfigError::PolicyTierWithoutSpec(LodTier(3))))
    ));
}

#[test]
fn add_before_load_is_rejected() {
    let mut harness = unloaded(1, InstancedMeshConfig::default());
    let err = harness
        .mesh
        .add_chunk(ChunkId::new(0, 0, 0), &tiered(0, LodTier::ONE, 1))
        .unwrap_err();
    assert_eq!(err.as_batch(), Some(&BatchError::NotLoaded));
}

#[test]
fn second_load_is_rejected() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    let loader = PackageLoader::new(transport(1));
    let again = pollster::block_on(harness.mesh.wait_for_load(&loader));
    assert!(matches!(again, Err(MeshError::AlreadyLoaded)));
    assert_eq!(harness.physics.len(), 1);
}

#[test]
fn polygon_chunk_fills_two_buckets() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    let added = harness
        .mesh
        .add_chunk(ChunkId::new(1, 0, 0), &tiered(0, LodTier::ONE, 300))
        .unwrap();
    assert_eq!((added.polygon, added.sprites), (300, 0));

    let key = GeometryKey {
        source: 0,
        tier: LodTier::ONE,
    };
    assert_eq!(harness.mesh.polygon().bucket_sizes(key), Some(vec![256, 44]));
    assert_eq!(harness.mesh.spritesheet().instance_count(), 0);
}

#[test]
fn sprite_chunk_leaves_polygon_alone() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    harness
        .mesh
        .add_chunk(ChunkId::new(1, 0, 0), &tiered(0, LodTier::ONE, 300))
        .unwrap();
    let polygon_before = harness.mesh.polygon().stats();

    let added = harness
        .mesh
        .add_chunk(ChunkId::new(2, 0, 0), &tiered(0, LodTier::EIGHT, 10))
        .unwrap();
    assert_eq!((added.polygon, added.sprites), (0, 10));
    assert_eq!(harness.mesh.spritesheet().instance_count(), 10);
    assert_eq!(harness.mesh.polygon().stats().instances, polygon_before.instances);
    assert_eq!(harness.mesh.polygon().stats().buckets, polygon_before.buckets);
}

#[test]
fn removal_frees_buckets() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    let c1 = ChunkId::new(1, 0, 0);
    let c2 = ChunkId::new(2, 0, 0);
    harness.mesh.add_chunk(c1, &tiered(0, LodTier::ONE, 300)).unwrap();
    harness.mesh.add_chunk(c2, &tiered(0, LodTier::EIGHT, 10)).unwrap();

    assert_eq!(harness.mesh.remove_chunk(c1), 300);
    let stats = harness.mesh.stats();
    assert_eq!(stats.instances(), 10);
    assert_eq!(stats.polygon.instances, 0);
    assert_eq!(stats.polygon.resident_slots, 0);
    assert_eq!(stats.polygon.pooled_buckets, 2);

    // the freed buckets serve the next chunk
    harness
        .mesh
        .add_chunk(ChunkId::new(3, 0, 0), &tiered(0, LodTier::TWO, 300))
        .unwrap();
    assert_eq!(harness.mesh.stats().polygon.pooled_buckets, 0);
}

#[test]
fn seventeenth_geometry_is_rejected() {
    let mut harness = loaded(6, InstancedMeshConfig::default());
    let combos: Vec<(u32, LodTier)> = (0..6u32)
        .flat_map(|source| TIERS.iter().map(move |&tier| (source, tier)))
        .collect();
    for (i, &(source, tier)) in combos.iter().take(16).enumerate() {
        harness
            .mesh
            .add_chunk(ChunkId::new(i as i32, 0, 0), &tiered(source, tier, 2))
            .unwrap();
    }
    assert_eq!(harness.mesh.polygon().resident_slots(), 16);
    let before = harness.mesh.stats();

    let (source, tier) = combos[16];
    let overflow = ChunkId::new(16, 0, 0);
    let err = harness.mesh.add_chunk(overflow, &tiered(source, tier, 5)).unwrap_err();
    assert_eq!(
        err.as_batch(),
        Some(&BatchError::CapacityExceeded {
            chunk: overflow,
            limit: CapacityLimit::GeometrySlots,
            overflow: 5,
        })
    );
    assert_eq!(harness.mesh.stats(), before);
    assert!(!harness.mesh.contains_chunk(overflow));
}

#[test]
fn capacity_holds_under_random_streams() {
    let mut harness = loaded(3, small_config());
    let mut rng = Lcg(0x5eed);
    let mut resident: Vec<ChunkId> = Vec::new();
    let mut rejected = 0;

    for step in 0..400 {
        if !resident.is_empty() && rng.below(3) == 0 {
            let chunk = resident.swap_remove(rng.below(resident.len() as u64) as usize);
            harness.mesh.remove_chunk(chunk);
        } else {
            let chunk = ChunkId::new(step, 0, 0);
            let instances = (0..rng.below(20) + 1)
                .map(|_| InstancePlacement {
                    source: rng.below(3) as u32,
                    transform: Transform::default(),
                    lod: LodHint::Tier([LodTier::ONE, LodTier::TWO, LodTier::FOUR, LodTier::EIGHT]
                        [rng.below(4) as usize]),
                })
                .collect();
            match harness.mesh.add_chunk(chunk, &ChunkResult::new(instances)) {
                Ok(_) => resident.push(chunk),
                Err(MeshError::Batch(BatchError::CapacityExceeded { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_within_limits(&harness.mesh);
    }
    assert!(rejected > 0, "the stream should hit the limits at least once");
}

#[test]
fn every_instance_lands_in_exactly_one_manager() {
    let mut harness = loaded(3, InstancedMeshConfig::default());
    let scatter = Scatter::new(9, ChunkGrid::new(64.0), 120, 3);
    let policy = LodPolicy::default();
    let viewer = Vec3::new(32.0, 0.0, 32.0);

    for x in -2..3 {
        for z in -2..3 {
            let chunk = ChunkId::new(x, 0, z);
            let result = scatter.generate(chunk, viewer);
            harness.mesh.add_chunk(chunk, &result).unwrap();

            let polygon = harness.mesh.polygon().chunk_instance_count(chunk).unwrap();
            let sprites = harness.mesh.spritesheet().chunk_instance_count(chunk).unwrap();
            assert_eq!(polygon + sprites, result.len());

            let expected_sprites = result
                .instances
                .iter()
                .filter(|p| Representation::of(&p.lod, &policy, LodTier::EIGHT).is_sprite())
                .count();
            assert_eq!(sprites, expected_sprites);
        }
    }
    let stats = harness.mesh.stats();
    assert!(stats.polygon.instances > 0 && stats.sprites > 0);
    assert_eq!(stats.instances(), 25 * 120);
}

#[test]
fn removal_is_complete_and_capacity_returns() {
    let mut harness = loaded(3, small_config());
    // 3 slots × 32 lanes
    let mut full = tiered(0, LodTier::ONE, 32);
    full.instances.extend(tiered(1, LodTier::ONE, 32).instances);
    full.instances.extend(tiered(2, LodTier::TWO, 32).instances);
    full.instances.extend(tiered(0, LodTier::EIGHT, 4).instances);

    let a = ChunkId::new(0, 0, 0);
    let b = ChunkId::new(1, 0, 0);
    harness.mesh.add_chunk(a, &full).unwrap();
    assert!(matches!(
        harness.mesh.add_chunk(b, &tiered(0, LodTier::ONE, 1)),
        Err(MeshError::Batch(BatchError::CapacityExceeded { .. }))
    ));

    assert_eq!(harness.mesh.remove_chunk(a), 100);
    assert!(!harness.mesh.polygon().contains_chunk(a));
    assert!(!harness.mesh.spritesheet().contains_chunk(a));
    assert_eq!(harness.mesh.stats().instances(), 0);
    assert_eq!(harness.mesh.snapshot().draw_calls.len(), 0);

    harness.mesh.add_chunk(b, &full).unwrap();
    assert_eq!(harness.mesh.stats().instances(), 100);
}

#[test]
fn failed_sprite_load_installs_nothing() {
    let mut harness = unloaded(2, InstancedMeshConfig::default());
    let mut broken = transport(2);
    broken.remove(&SourceId::new("prop1"), AssetKind::Spritesheet);

    let result = pollster::block_on(harness.mesh.wait_for_load(&PackageLoader::new(broken)));
    assert!(matches!(result, Err(MeshError::Load(_))));
    assert!(!harness.mesh.is_loaded());
    assert!(harness.mesh.polygon().package().is_none());
    assert!(harness.mesh.spritesheet().package().is_none());
    assert!(harness.physics.is_empty());

    // a later load with working assets still succeeds
    pollster::block_on(harness.mesh.wait_for_load(&PackageLoader::new(transport(2)))).unwrap();
    assert!(harness.mesh.is_loaded());
}

#[test]
fn failed_mesh_load_installs_nothing() {
    let mut harness = unloaded(2, InstancedMeshConfig::default());
    let mut broken = transport(2);
    broken.remove(&SourceId::new("prop0"), AssetKind::Mesh);

    let result = pollster::block_on(harness.mesh.wait_for_load(&PackageLoader::new(broken)));
    assert!(matches!(result, Err(MeshError::Load(_))));
    assert!(harness.mesh.spritesheet().package().is_none());
    let err = harness
        .mesh
        .add_chunk(ChunkId::new(0, 0, 0), &tiered(0, LodTier::EIGHT, 1))
        .unwrap_err();
    assert_eq!(err.as_batch(), Some(&BatchError::NotLoaded));
}

#[test]
fn unknown_removal_changes_nothing() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    let chunk = ChunkId::new(0, 0, 0);
    harness.mesh.add_chunk(chunk, &tiered(0, LodTier::ONE, 5)).unwrap();
    let before = harness.mesh.stats();

    assert_eq!(harness.mesh.remove_chunk(ChunkId::new(4, 4, 4)), 0);
    assert_eq!(harness.mesh.stats(), before);

    assert_eq!(harness.mesh.remove_chunk(chunk), 5);
    let after = harness.mesh.stats();
    assert_eq!(harness.mesh.remove_chunk(chunk), 0);
    assert_eq!(harness.mesh.stats(), after);
}

#[test]
fn duplicate_chunk_is_rejected_without_change() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    let chunk = ChunkId::new(0, 0, 0);
    let mut mixed = tiered(0, LodTier::ONE, 3);
    mixed.instances.extend(tiered(0, LodTier::EIGHT, 3).instances);
    harness.mesh.add_chunk(chunk, &mixed).unwrap();
    let before = harness.mesh.stats();

    let err = harness.mesh.add_chunk(chunk, &mixed).unwrap_err();
    assert_eq!(err.as_batch(), Some(&BatchError::DuplicateChunk(chunk)));
    assert_eq!(harness.mesh.stats(), before);
}

#[test]
fn sprite_overflow_rolls_back_polygon_half() {
    let config = InstancedMeshConfig {
        max_sprite_instances: 5,
        ..InstancedMeshConfig::default()
    };
    let mut harness = loaded(1, config);
    let chunk = ChunkId::new(0, 0, 0);
    let mut mixed = tiered(0, LodTier::ONE, 3);
    mixed.instances.extend(tiered(0, LodTier::EIGHT, 10).instances);

    let err = harness.mesh.add_chunk(chunk, &mixed).unwrap_err();
    assert!(matches!(
        err.as_batch(),
        Some(BatchError::CapacityExceeded {
            limit: CapacityLimit::SpriteInstances,
            overflow: 5,
            ..
        })
    ));
    assert_eq!(harness.mesh.stats().instances(), 0);
    assert!(!harness.mesh.contains_chunk(chunk));
    assert!(!harness.mesh.spritesheet().contains_chunk(chunk));
}

#[test]
fn update_follows_the_context_view() {
    let mut harness = loaded(1, InstancedMeshConfig::default());
    harness
        .mesh
        .add_chunk(ChunkId::new(0, 0, 0), &tiered(0, LodTier::EIGHT, 1))
        .unwrap();
    let polygon_before = harness.mesh.polygon().stats();

    harness.context.set_view(RenderView {
        eye: Vec3::new(-10.0, 2.0, 0.0),
        ..RenderView::default()
    });
    harness.mesh.update();
    let sprite = harness.mesh.spritesheet().instances()[0];
    assert!((sprite.yaw + std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    // 8 angles, viewer on -X sees the object from three quarters round
    assert_eq!(sprite.frame, 6);
    assert_eq!(harness.mesh.stats().frame, 1);
    assert_eq!(harness.mesh.polygon().stats(), polygon_before);
}

#[test]
fn dropping_the_mesh_releases_collision() {
    let harness = loaded(3, InstancedMeshConfig::default());
    let physics = harness.physics.clone();
    assert_eq!(physics.len(), 3);
    drop(harness);
    assert!(physics.is_empty());
}
