use glam::Vec3;
use propfield_common::LodTier;
use serde::{Deserialize, Serialize};

/// Source mesh as stored on the wire: an indexed triangle list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshAsset {
    pub positions: Vec<[f32; 3]>,
    /// Empty, or one per position.
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshAsset {
    /// Check structural soundness. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.positions.is_empty() {
            return Err("no vertices".into());
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(format!("index count {} is not a non-zero multiple of 3", self.indices.len()));
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            return Err(format!(
                "{} normals for {} positions",
                self.normals.len(),
                self.positions.len()
            ));
        }
        let count = self.positions.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= count) {
            return Err(format!("index {bad} out of range for {count} vertices"));
        }
        if self.positions.iter().flatten().any(|c| !c.is_finite()) {
            return Err("non-finite vertex position".into());
        }
        Ok(())
    }

    /// Axis-aligned cube centred on the origin with flat-shaded faces.
    pub fn cuboid(half: f32) -> Self {
        let p = half;
        #[rustfmt::skip]
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0],  [[-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p]]),
            ([0.0, 0.0, -1.0], [[ p, -p, -p], [-p, -p, -p], [-p,  p, -p], [ p,  p, -p]]),
            ([1.0, 0.0, 0.0],  [[ p, -p,  p], [ p, -p, -p], [ p,  p, -p], [ p,  p,  p]]),
            ([-1.0, 0.0, 0.0], [[-p, -p, -p], [-p, -p,  p], [-p,  p,  p], [-p,  p, -p]]),
            ([0.0, 1.0, 0.0],  [[-p,  p,  p], [ p,  p,  p], [ p,  p, -p], [-p,  p, -p]]),
            ([0.0, -1.0, 0.0], [[-p, -p, -p], [ p, -p, -p], [ p, -p,  p], [-p, -p,  p]]),
        ];
        let mut mesh = Self {
            positions: Vec::with_capacity(24),
            normals: Vec::with_capacity(24),
            indices: Vec::with_capacity(36),
        };
        for (normal, corners) in faces {
            let base = mesh.positions.len() as u32;
            mesh.positions.extend(corners);
            mesh.normals.extend([normal; 4]);
            mesh.indices
                .extend([base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        mesh
    }

    /// Latitude/longitude sphere. `rings` ≥ 2, `segments` ≥ 3.
    pub fn uv_sphere(rings: u32, segments: u32, radius: f32) -> Self {
        let rings = rings.max(2);
        let segments = segments.max(3);
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for r in 0..=rings {
            let theta = std::f32::consts::PI * r as f32 / rings as f32;
            for s in 0..=segments {
                let phi = std::f32::consts::TAU * s as f32 / segments as f32;
                let n = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                positions.push((n * radius).to_array());
                normals.push(n.to_array());
            }
        }
        let stride = segments + 1;
        let mut indices = Vec::new();
        for r in 0..rings {
            for s in 0..segments {
                let a = r * stride + s;
                let b = a + stride;
                if r != 0 {
                    indices.extend([a, b, a + 1]);
                }
                if r != rings - 1 {
                    indices.extend([a + 1, b, b + 1]);
                }
            }
        }
        Self {
            positions,
            normals,
            indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        bounds_of(&self.positions)
    }
}

/// Decoded geometry for one (source, tier), ready for a geometry slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub tier: LodTier,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    /// Largest vertex displacement introduced by simplification, relative to
    /// the source bounding-box diagonal.
    pub error: f32,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl Geometry {
    pub fn from_asset(tier: LodTier, asset: &MeshAsset) -> Self {
        let (bounds_min, bounds_max) = asset.bounds();
        Self {
            tier,
            positions: asset.positions.clone(),
            normals: asset.normals.clone(),
            indices: asset.indices.clone(),
            error: 0.0,
            bounds_min,
            bounds_max,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

pub(crate) fn bounds_of(positions: &[[f32; 3]]) -> (Vec3, Vec3) {
    positions.iter().fold(
        (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
        |(min, max), p| {
            let p = Vec3::from_array(*p);
            (min.min(p), max.max(p))
        },
    )
}
