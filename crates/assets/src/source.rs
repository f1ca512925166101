use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::TransportError;

/// Identifier of one source object (typically a URL or asset path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The two asset flavours fetched per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Mesh,
    Spritesheet,
}

impl AssetKind {
    /// File suffix used by [`FsTransport`].
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Mesh => "mesh.cbor",
            Self::Spritesheet => "sprites.cbor",
        }
    }
}

/// Fetches raw asset bytes. Timeouts and retries belong to implementations.
pub trait AssetTransport: Send + Sync {
    fn fetch(
        &self,
        source: &SourceId,
        kind: AssetKind,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Reads assets from a directory.
///
/// Layout: `<root>/<source>.mesh.cbor` and `<root>/<source>.sprites.cbor`,
/// each optionally with a trailing `.zst`.
#[derive(Debug, Clone)]
pub struct FsTransport {
    root: PathBuf,
}

impl FsTransport {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the asset is written to by `bake` (uncompressed form).
    pub fn path_for(&self, source: &SourceId, kind: AssetKind) -> PathBuf {
        self.root.join(format!("{}.{}", source, kind.suffix()))
    }

    fn resolve(&self, source: &SourceId, kind: AssetKind) -> Option<PathBuf> {
        let plain = self.path_for(source, kind);
        if plain.is_file() {
            return Some(plain);
        }
        let compressed = self.root.join(format!("{}.{}.zst", source, kind.suffix()));
        compressed.is_file().then_some(compressed)
    }
}

impl AssetTransport for FsTransport {
    async fn fetch(&self, source: &SourceId, kind: AssetKind) -> Result<Vec<u8>, TransportError> {
        let path = self
            .resolve(source, kind)
            .ok_or_else(|| TransportError::NotFound(self.path_for(source, kind).display().to_string()))?;
        tracing::trace!(path = %path.display(), "reading asset");
        Ok(std::fs::read(path)?)
    }
}

/// In-memory transport, used by tests and tools that build assets on the fly.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    assets: HashMap<(SourceId, AssetKind), Vec<u8>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceId, kind: AssetKind, bytes: Vec<u8>) {
        self.assets.insert((source, kind), bytes);
    }

    pub fn remove(&mut self, source: &SourceId, kind: AssetKind) -> Option<Vec<u8>> {
        self.assets.remove(&(source.clone(), kind))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetTransport for MemoryTransport {
    async fn fetch(&self, source: &SourceId, kind: AssetKind) -> Result<Vec<u8>, TransportError> {
        self.assets
            .get(&(source.clone(), kind))
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("{source} ({kind:?})")))
    }
}
