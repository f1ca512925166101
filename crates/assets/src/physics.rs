use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::PhysicsError;
use crate::source::SourceId;

/// Handle to a collision mesh owned by the physics collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollisionHandle(pub u64);

/// The physics collaborator polygon loads hand collision geometry to.
///
/// Called from the load future, hence `&self` and `Send + Sync`.
pub trait PhysicsWorld: Send + Sync {
    fn add_collision_mesh(
        &self,
        source: &SourceId,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> Result<CollisionHandle, PhysicsError>;

    fn remove_collision_mesh(&self, handle: CollisionHandle);
}

/// Summary of a registered collision mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionShape {
    pub source: SourceId,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

/// In-memory physics stand-in: records shapes, hands out sequential handles.
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    inner: Mutex<RegistryState>,
    /// Sources whose meshes are refused, for exercising failure paths.
    reject: Vec<SourceId>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next: u64,
    shapes: BTreeMap<CollisionHandle, CollisionShape>,
}

impl CollisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that refuses meshes for the given sources.
    pub fn rejecting(reject: Vec<SourceId>) -> Self {
        Self {
            reject,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.lock().shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, handle: CollisionHandle) -> Option<CollisionShape> {
        self.lock().shapes.get(&handle).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        // a panic while holding the lock leaves plain data behind; keep going
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PhysicsWorld for CollisionRegistry {
    fn add_collision_mesh(
        &self,
        source: &SourceId,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> Result<CollisionHandle, PhysicsError> {
        if self.reject.contains(source) {
            return Err(PhysicsError::Rejected(format!("{source} is on the reject list")));
        }
        let mut state = self.lock();
        state.next += 1;
        let handle = CollisionHandle(state.next);
        state.shapes.insert(
            handle,
            CollisionShape {
                source: source.clone(),
                vertex_count: positions.len(),
                triangle_count: indices.len() / 3,
            },
        );
        tracing::debug!(%source, handle = handle.0, "collision mesh registered");
        Ok(handle)
    }

    fn remove_collision_mesh(&self, handle: CollisionHandle) {
        if self.lock().shapes.remove(&handle).is_some() {
            tracing::debug!(handle = handle.0, "collision mesh removed");
        }
    }
}
