use futures_lite::future;
use propfield_common::LodSpecTable;
use tracing::Instrument;

use crate::error::LoadError;
use crate::physics::PhysicsWorld;
use crate::polygon::PolygonPackage;
use crate::source::{AssetTransport, SourceId};
use crate::spritesheet::SpritesheetPackage;

/// Builds packages from whatever a transport serves.
#[derive(Debug, Clone)]
pub struct PackageLoader<T> {
    transport: T,
}

impl<T: AssetTransport> PackageLoader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn load_polygon(
        &self,
        sources: &[SourceId],
        specs: &LodSpecTable,
        physics: &dyn PhysicsWorld,
    ) -> Result<PolygonPackage, LoadError> {
        PolygonPackage::load_urls(&self.transport, sources, specs, physics).await
    }

    pub async fn load_spritesheet(&self, sources: &[SourceId]) -> Result<SpritesheetPackage, LoadError> {
        SpritesheetPackage::load_urls(&self.transport, sources).await
    }

    /// Load both packages concurrently and wait for both to settle.
    ///
    /// Either both succeed or neither is returned: if only the spritesheet
    /// fails, the polygon package's collision meshes are released before the
    /// error is handed back.
    pub async fn load_pair(
        &self,
        sources: &[SourceId],
        specs: &LodSpecTable,
        physics: &dyn PhysicsWorld,
    ) -> Result<(PolygonPackage, SpritesheetPackage), LoadError> {
        let (polygon, sprites) = future::zip(
            self.load_polygon(sources, specs, physics),
            self.load_spritesheet(sources),
        )
        .instrument(tracing::info_span!("load_pair", sources = sources.len()))
        .await;

        match (polygon, sprites) {
            (Ok(polygon), Ok(sprites)) => {
                tracing::info!(
                    polygon_id = polygon.id(),
                    sprite_id = sprites.id(),
                    atlas = %format_args!("{}x{}", sprites.atlas().width, sprites.atlas().height),
                    "packages loaded"
                );
                Ok((polygon, sprites))
            }
            (Ok(polygon), Err(error)) => {
                polygon.release_collision(physics);
                tracing::warn!(%error, "spritesheet load failed, polygon package discarded");
                Err(error)
            }
            (Err(error), _) => {
                tracing::warn!(%error, "polygon load failed");
                Err(error)
            }
        }
    }
}
