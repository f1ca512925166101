use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::renderer::RenderView;

/// Scene node handle issued by a [`RenderContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Scene-composition collaborator: owns the node tree and the current view.
pub trait RenderContext: Send + Sync {
    fn create_node(&self, label: &str) -> NodeId;
    fn attach_child(&self, parent: NodeId, child: NodeId);
    /// Viewpoint for the frame being prepared.
    fn view(&self) -> RenderView;
}

/// Context with no GPU behind it. Records the node tree; the view is set by
/// whoever drives the frame loop.
#[derive(Debug, Default)]
pub struct HeadlessContext {
    inner: Mutex<HeadlessState>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    labels: Vec<String>,
    children: BTreeMap<NodeId, Vec<NodeId>>,
    view: RenderView,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(view: RenderView) -> Self {
        let context = Self::default();
        context.set_view(view);
        context
    }

    pub fn set_view(&self, view: RenderView) {
        self.lock().view = view;
    }

    pub fn label(&self, node: NodeId) -> Option<String> {
        self.lock().labels.get(node.0 as usize).cloned()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.lock().children.get(&node).cloned().unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.lock().labels.len()
    }

    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RenderContext for HeadlessContext {
    fn create_node(&self, label: &str) -> NodeId {
        let mut state = self.lock();
        let id = NodeId(state.labels.len() as u32);
        state.labels.push(label.to_string());
        id
    }

    fn attach_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.lock();
        let children = state.children.entry(parent).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    fn view(&self) -> RenderView {
        self.lock().view
    }
}
