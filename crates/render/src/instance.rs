use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use propfield_common::Transform;

/// Per-instance vertex data for polygon draw calls: the model matrix as
/// four column vectors.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model_0: [f32; 4],
    pub model_1: [f32; 4],
    pub model_2: [f32; 4],
    pub model_3: [f32; 4],
}

impl InstanceData {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.model_3[0], self.model_3[1], self.model_3[2])
    }
}

impl From<&Transform> for InstanceData {
    fn from(transform: &Transform) -> Self {
        let [model_0, model_1, model_2, model_3] = transform.matrix().to_cols_array_2d();
        Self {
            model_0,
            model_1,
            model_2,
            model_3,
        }
    }
}

/// Per-billboard vertex data. Rewritten by the spritesheet manager every
/// frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SpriteInstanceData {
    pub position: [f32; 3],
    /// Billboard facing, radians about +Y.
    pub yaw: f32,
    /// Quad width and height in world units.
    pub size: [f32; 2],
    /// Animation phase in `[0, 1)`.
    pub phase: f32,
    /// Angle frame currently shown.
    pub frame: u32,
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}
