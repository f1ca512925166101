use glam::Vec3;

use crate::instance::SpriteInstanceData;
use crate::polygon::{DrawCall, PolygonBatchManager};
use crate::spritesheet::SpritesheetBatchManager;

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 10.0, 10.0),
            target: Vec3::ZERO,
            fov_degrees: 60.0,
        }
    }
}

/// Everything a backend needs to draw one frame, borrowed from the batch
/// managers.
#[derive(Debug, Clone)]
pub struct FrameSnapshot<'a> {
    pub frame: u64,
    pub draw_calls: Vec<DrawCall<'a>>,
    pub sprites: &'a [SpriteInstanceData],
}

impl<'a> FrameSnapshot<'a> {
    pub fn capture(polygon: &'a PolygonBatchManager, sprites: &'a SpritesheetBatchManager) -> Self {
        Self {
            frame: sprites.frame(),
            draw_calls: polygon.draw_calls().collect(),
            sprites: sprites.instances(),
        }
    }

    pub fn polygon_instances(&self) -> usize {
        self.draw_calls.iter().map(|call| call.instances.len()).sum()
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer only reads the snapshot; batching state stays owned by the
/// managers.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given snapshot and view.
    fn render(&self, frame: &FrameSnapshot<'_>, view: &RenderView) -> Self::Output;
}

/// Text dump of a frame: one line per draw call plus sprite totals.
/// Used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    /// Print at most this many draw-call lines (0 = all).
    pub max_lines: usize,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, frame: &FrameSnapshot<'_>, view: &RenderView) -> String {
        let mut out = String::new();
        out.push_str(&format!("=== Frame {} ===\n", frame.frame));
        out.push_str(&format!(
            "Draw calls: {} ({} polygon instances)\n",
            frame.draw_calls.len(),
            frame.polygon_instances()
        ));
        out.push_str(&format!("Sprites: {}\n", frame.sprites.len()));
        out.push_str(&format!(
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}\n",
            view.eye.x,
            view.eye.y,
            view.eye.z,
            view.target.x,
            view.target.y,
            view.target.z,
            view.fov_degrees
        ));

        let shown = match self.max_lines {
            0 => frame.draw_calls.len(),
            n => n.min(frame.draw_calls.len()),
        };
        for call in &frame.draw_calls[..shown] {
            out.push_str(&format!(
                "  [slot {:>2} bucket {:>3}] {} tris={} instances={}{}\n",
                call.slot,
                call.bucket,
                call.key,
                call.geometry.triangle_count(),
                call.instances.len(),
                if call.cast_shadow { " shadow" } else { "" }
            ));
        }
        if shown < frame.draw_calls.len() {
            out.push_str(&format!("  ... {} more\n", frame.draw_calls.len() - shown));
        }

        out
    }
}
