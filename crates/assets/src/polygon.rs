use propfield_common::{LodSpecTable, LodTier};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::codec::{content_id, decode_asset};
use crate::error::LoadError;
use crate::mesh::{Geometry, MeshAsset};
use crate::physics::{CollisionHandle, PhysicsWorld};
use crate::simplify::simplify;
use crate::source::{AssetKind, AssetTransport, SourceId};

/// Geometry for every (source, tier) plus the collision meshes registered
/// for each source. Immutable once built.
#[derive(Debug)]
pub struct PolygonPackage {
    id: u64,
    sources: Vec<SourceId>,
    geometries: Vec<BTreeMap<LodTier, Arc<Geometry>>>,
    collision: Vec<CollisionHandle>,
}

impl PolygonPackage {
    /// Assemble a package from already-built geometry. `geometries` is
    /// indexed like `sources`.
    pub fn new(sources: Vec<SourceId>, geometries: Vec<BTreeMap<LodTier, Arc<Geometry>>>) -> Self {
        debug_assert_eq!(sources.len(), geometries.len(), "one geometry map per source");
        let id = content_id(sources.iter().map(|s| s.as_str().as_bytes()));
        Self {
            id,
            sources,
            geometries,
            collision: Vec::new(),
        }
    }

    /// Content id of the fetched bytes this package was built from.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn geometry(&self, source: u32, tier: LodTier) -> Option<&Arc<Geometry>> {
        self.geometries.get(source as usize)?.get(&tier)
    }

    /// Every (source index, tier, geometry) in the package.
    pub fn iter(&self) -> impl Iterator<Item = (u32, LodTier, &Arc<Geometry>)> + '_ {
        self.geometries
            .iter()
            .enumerate()
            .flat_map(|(i, lods)| lods.iter().map(move |(tier, g)| (i as u32, *tier, g)))
    }

    pub fn tiers(&self, source: u32) -> Vec<LodTier> {
        self.geometries
            .get(source as usize)
            .map(|lods| lods.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn collision_handles(&self) -> &[CollisionHandle] {
        &self.collision
    }

    /// Hand the collision meshes back to the physics collaborator.
    pub fn release_collision(&self, physics: &dyn PhysicsWorld) {
        for handle in &self.collision {
            physics.remove_collision_mesh(*handle);
        }
    }

    /// Fetch, decode and simplify every source, registering the finest tier
    /// of each with `physics`. On failure, collision meshes registered so far
    /// are removed again.
    pub async fn load_urls<T: AssetTransport>(
        transport: &T,
        sources: &[SourceId],
        specs: &LodSpecTable,
        physics: &dyn PhysicsWorld,
    ) -> Result<Self, LoadError> {
        if sources.is_empty() {
            return Err(LoadError::NoSources);
        }
        let finest = specs.finest().ok_or(LoadError::NoLodSpecs)?;

        let mut blobs = Vec::with_capacity(sources.len());
        let mut geometries = Vec::with_capacity(sources.len());
        let mut collision = Vec::with_capacity(sources.len());

        let result = async {
            for source in sources {
                let bytes = transport.fetch(source, AssetKind::Mesh).await.map_err(|error| {
                    LoadError::Transport {
                        asset: source.clone(),
                        kind: AssetKind::Mesh,
                        error,
                    }
                })?;
                let asset: MeshAsset = decode_asset(&bytes).map_err(|error| LoadError::Decode {
                    asset: source.clone(),
                    kind: AssetKind::Mesh,
                    error,
                })?;
                asset.validate().map_err(|reason| LoadError::InvalidMesh {
                    asset: source.clone(),
                    reason,
                })?;

                let mut lods = BTreeMap::new();
                for spec in &specs.specs {
                    let geometry = simplify(&asset, spec).ok_or_else(|| LoadError::EmptyLod {
                        asset: source.clone(),
                        tier: spec.tier,
                    })?;
                    lods.insert(spec.tier, Arc::new(geometry));
                }

                let collider = &lods[&finest];
                let handle = physics
                    .add_collision_mesh(source, &collider.positions, &collider.indices)
                    .map_err(|error| LoadError::Physics {
                        asset: source.clone(),
                        error,
                    })?;
                collision.push(handle);

                tracing::debug!(%source, tiers = lods.len(), "polygon source loaded");
                blobs.push(bytes);
                geometries.push(lods);
            }
            Ok::<(), LoadError>(())
        }
        .await;

        if let Err(error) = result {
            for handle in &collision {
                physics.remove_collision_mesh(*handle);
            }
            return Err(error);
        }

        Ok(Self {
            id: content_id(blobs.iter().map(Vec::as_slice)),
            sources: sources.to_vec(),
            geometries,
            collision,
        })
    }
}
