//! Vertex-clustering mesh simplification.
//!
//! Vertices are snapped into a uniform grid; every occupied cell collapses
//! to the mean of its members and triangles that lose an edge are dropped.
//! The cell size is the displacement bound, so the tier's error target caps
//! it and the ratio target decides how far below the cap we stop.

use glam::Vec3;
use propfield_common::{LodSpec, LodTier};
use std::collections::HashMap;

use crate::mesh::{Geometry, MeshAsset, bounds_of};

/// Cell sizes tried, as fractions of the error-bound cell.
const CELL_STEPS: [f32; 4] = [0.125, 0.25, 0.5, 1.0];

/// Produce the geometry for one tier. Returns `None` if every candidate
/// collapses to nothing.
pub fn simplify(asset: &MeshAsset, spec: &LodSpec) -> Option<Geometry> {
    let full_triangles = asset.triangle_count();
    if spec.target_ratio >= 1.0 || spec.target_error <= 0.0 {
        return Some(Geometry::from_asset(spec.tier, asset));
    }

    let (min, max) = asset.bounds();
    let diagonal = (max - min).length();
    if diagonal <= f32::EPSILON {
        return Some(Geometry::from_asset(spec.tier, asset));
    }

    let target_triangles = ((full_triangles as f32 * spec.target_ratio).ceil() as usize).max(1);
    let max_cell = spec.target_error * diagonal;

    let mut best: Option<Geometry> = None;
    for step in CELL_STEPS {
        let cell = max_cell * step;
        let Some(candidate) = cluster(asset, spec.tier, min, cell) else {
            break;
        };
        let done = candidate.triangle_count() <= target_triangles;
        best = Some(Geometry {
            error: cell * 3f32.sqrt() / diagonal,
            ..candidate
        });
        if done {
            break;
        }
    }
    tracing::trace!(
        tier = %spec.tier,
        from = full_triangles,
        to = best.as_ref().map(|g| g.triangle_count()).unwrap_or(0),
        target = target_triangles,
        "simplified"
    );
    best
}

fn cluster(asset: &MeshAsset, tier: LodTier, origin: Vec3, cell: f32) -> Option<Geometry> {
    let mut cells: HashMap<(i32, i32, i32), u32> = HashMap::new();
    let mut sums: Vec<(Vec3, Vec3, u32)> = Vec::new();
    let mut remap = Vec::with_capacity(asset.positions.len());

    for (i, p) in asset.positions.iter().enumerate() {
        let p = Vec3::from_array(*p);
        let q = ((p - origin) / cell).floor();
        let key = (q.x as i32, q.y as i32, q.z as i32);
        let index = *cells.entry(key).or_insert_with(|| {
            sums.push((Vec3::ZERO, Vec3::ZERO, 0));
            (sums.len() - 1) as u32
        });
        let normal = asset.normals.get(i).map(|n| Vec3::from_array(*n)).unwrap_or(Vec3::ZERO);
        let entry = &mut sums[index as usize];
        entry.0 += p;
        entry.1 += normal;
        entry.2 += 1;
        remap.push(index);
    }

    let mut indices = Vec::with_capacity(asset.indices.len());
    for tri in asset.indices.chunks_exact(3) {
        let (a, b, c) = (
            remap[tri[0] as usize],
            remap[tri[1] as usize],
            remap[tri[2] as usize],
        );
        if a != b && b != c && a != c {
            indices.extend([a, b, c]);
        }
    }
    if indices.is_empty() {
        return None;
    }

    let positions: Vec<[f32; 3]> = sums
        .iter()
        .map(|(sum, _, n)| (*sum / *n as f32).to_array())
        .collect();
    let normals = if asset.normals.is_empty() {
        Vec::new()
    } else {
        sums.iter()
            .map(|(_, normal, _)| normal.normalize_or_zero().to_array())
            .collect()
    };
    let (bounds_min, bounds_max) = bounds_of(&positions);

    Some(Geometry {
        tier,
        positions,
        normals,
        indices,
        error: 0.0,
        bounds_min,
        bounds_max,
    })
}
