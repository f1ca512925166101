use propfield_assets::{AssetTransport, PackageLoader, PhysicsWorld, SourceId};
use propfield_common::{ChunkId, ChunkResult, InstancedMeshConfig};
use propfield_render::{
    BatchError, FrameSnapshot, NodeId, PolygonBatchManager, PolygonStats, RenderContext,
    SpritesheetBatchManager,
};
use std::sync::Arc;
use tracing::Instrument;

use crate::error::MeshError;

/// Instances placed by one `add_chunk`, split by representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkAdd {
    pub polygon: usize,
    pub sprites: usize,
}

impl ChunkAdd {
    pub fn total(&self) -> usize {
        self.polygon + self.sprites
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub polygon: PolygonStats,
    pub sprites: usize,
    pub chunks: usize,
    pub frame: u64,
}

impl MeshStats {
    pub fn instances(&self) -> usize {
        self.polygon.instances + self.sprites
    }
}

/// A population of instanced props streamed in by chunk.
///
/// Owns a polygon batch manager for instances below the sprite cutoff and a
/// spritesheet batch manager for the rest. Chunks may only be added once
/// [`wait_for_load`](Self::wait_for_load) has installed both packages.
pub struct InstancedObjectMesh {
    context: Arc<dyn RenderContext>,
    physics: Arc<dyn PhysicsWorld>,
    sources: Vec<SourceId>,
    config: InstancedMeshConfig,
    node: NodeId,
    polygon_node: NodeId,
    sprite_node: NodeId,
    polygon: PolygonBatchManager,
    spritesheet: SpritesheetBatchManager,
    loaded: bool,
}

impl std::fmt::Debug for InstancedObjectMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancedObjectMesh")
            .field("sources", &self.sources)
            .field("node", &self.node)
            .field("loaded", &self.loaded)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl InstancedObjectMesh {
    /// Build with the default configuration.
    pub fn new(
        context: Arc<dyn RenderContext>,
        physics: Arc<dyn PhysicsWorld>,
        sources: Vec<SourceId>,
        shadow: bool,
    ) -> Self {
        Self::build(context, physics, sources, shadow, InstancedMeshConfig::default())
    }

    pub fn with_config(
        context: Arc<dyn RenderContext>,
        physics: Arc<dyn PhysicsWorld>,
        sources: Vec<SourceId>,
        shadow: bool,
        config: InstancedMeshConfig,
    ) -> Result<Self, MeshError> {
        config.validate()?;
        Ok(Self::build(context, physics, sources, shadow, config))
    }

    fn build(
        context: Arc<dyn RenderContext>,
        physics: Arc<dyn PhysicsWorld>,
        sources: Vec<SourceId>,
        shadow: bool,
        config: InstancedMeshConfig,
    ) -> Self {
        let node = context.create_node("instanced-object-mesh");
        let polygon_node = context.create_node("polygon-batches");
        let sprite_node = context.create_node("spritesheet-batches");
        context.attach_child(node, polygon_node);
        context.attach_child(node, sprite_node);

        let polygon = PolygonBatchManager::new(config.sprite_lod_cutoff, config.limits, shadow)
            .with_lod_policy(config.lod_policy.clone());
        let spritesheet = SpritesheetBatchManager::new(config.sprite_lod_cutoff)
            .with_lod_policy(config.lod_policy.clone())
            .with_capacity(config.max_sprite_instances)
            .with_animation_rate(config.sprite_animation_rate);

        tracing::debug!(sources = sources.len(), shadow, cutoff = %config.sprite_lod_cutoff, "instanced object mesh created");
        Self {
            context,
            physics,
            sources,
            config,
            node,
            polygon_node,
            sprite_node,
            polygon,
            spritesheet,
            loaded: false,
        }
    }

    /// Load the polygon and spritesheet packages concurrently and install
    /// both. Nothing is installed unless both loads succeed.
    pub async fn wait_for_load<T: AssetTransport>(&mut self, loader: &PackageLoader<T>) -> Result<(), MeshError> {
        if self.loaded {
            return Err(MeshError::AlreadyLoaded);
        }
        let span = tracing::info_span!("wait_for_load", sources = self.sources.len());
        let (polygon, sprites) = loader
            .load_pair(&self.sources, &self.config.lod_specs, self.physics.as_ref())
            .instrument(span)
            .await?;

        self.polygon.set_package(Arc::new(polygon));
        self.spritesheet.set_package(Arc::new(sprites));
        self.loaded = true;
        tracing::info!(sources = self.sources.len(), "instanced object mesh loaded");
        Ok(())
    }

    /// Route a chunk's instances to both managers. Either both accept the
    /// chunk or neither keeps anything.
    pub fn add_chunk(&mut self, chunk: ChunkId, result: &ChunkResult) -> Result<ChunkAdd, MeshError> {
        let _span = tracing::info_span!("add_chunk", %chunk, instances = result.len()).entered();
        if !self.loaded {
            return Err(BatchError::NotLoaded.into());
        }
        let polygon = self.polygon.add_chunk(chunk, result)?;
        let sprites = match self.spritesheet.add_chunk(chunk, result) {
            Ok(sprites) => sprites,
            Err(error) => {
                self.polygon.remove_chunk(chunk);
                return Err(error.into());
            }
        };
        Ok(ChunkAdd { polygon, sprites })
    }

    /// Release every instance `chunk` contributed. Unknown chunks are a
    /// no-op. Returns the number of instances released.
    pub fn remove_chunk(&mut self, chunk: ChunkId) -> usize {
        self.polygon.remove_chunk(chunk) + self.spritesheet.remove_chunk(chunk)
    }

    /// Per-frame update. Only billboards change from frame to frame.
    pub fn update(&mut self) {
        let view = self.context.view();
        self.spritesheet.update(&view);
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            polygon: self.polygon.stats(),
            sprites: self.spritesheet.instance_count(),
            chunks: self.spritesheet.chunk_count(),
            frame: self.spritesheet.frame(),
        }
    }

    pub fn snapshot(&self) -> FrameSnapshot<'_> {
        FrameSnapshot::capture(&self.polygon, &self.spritesheet)
    }

    pub fn polygon(&self) -> &PolygonBatchManager {
        &self.polygon
    }

    pub fn spritesheet(&self) -> &SpritesheetBatchManager {
        &self.spritesheet
    }

    pub fn contains_chunk(&self, chunk: ChunkId) -> bool {
        self.polygon.contains_chunk(chunk)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Child nodes of the polygon and spritesheet managers.
    pub fn child_nodes(&self) -> (NodeId, NodeId) {
        (self.polygon_node, self.sprite_node)
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn config(&self) -> &InstancedMeshConfig {
        &self.config
    }
}

impl Drop for InstancedObjectMesh {
    fn drop(&mut self) {
        if let Some(package) = self.polygon.package() {
            package.release_collision(self.physics.as_ref());
        }
    }
}
