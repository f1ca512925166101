use serde::{Deserialize, Serialize};

use crate::lod::{LodPolicy, LodTier, SPRITE_LOD_CUTOFF};

/// Hardware-style bounds on the polygon batching grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Distinct geometry buffers resident at once.
    pub max_num_geometries: usize,
    /// Instances per draw-call bucket.
    pub max_instances_per_geometry_per_draw_call: usize,
    /// Draw-call buckets per geometry slot.
    pub max_draw_calls_per_geometry: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_num_geometries: 16,
            max_instances_per_geometry_per_draw_call: 256,
            max_draw_calls_per_geometry: 256,
        }
    }
}

impl BatchLimits {
    /// Most instances a single geometry slot can hold.
    pub fn per_geometry_capacity(&self) -> usize {
        self.max_instances_per_geometry_per_draw_call * self.max_draw_calls_per_geometry
    }
}

/// Simplification target for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodSpec {
    pub tier: LodTier,
    /// Fraction of source indices to keep, in (0, 1].
    pub target_ratio: f32,
    /// Acceptable error relative to the mesh bounding-box diagonal.
    pub target_error: f32,
}

/// The per-tier ratio/error table used when loading polygon packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodSpecTable {
    pub specs: Vec<LodSpec>,
}

impl Default for LodSpecTable {
    fn default() -> Self {
        Self {
            specs: vec![
                LodSpec { tier: LodTier::ONE, target_ratio: 1.0, target_error: 0.0 },
                LodSpec { tier: LodTier::TWO, target_ratio: 0.5, target_error: 0.01 },
                LodSpec { tier: LodTier::FOUR, target_ratio: 0.3, target_error: 0.05 },
                LodSpec { tier: LodTier::EIGHT, target_ratio: 0.15, target_error: 0.1 },
            ],
        }
    }
}

impl LodSpecTable {
    pub fn get(&self, tier: LodTier) -> Option<&LodSpec> {
        self.specs.iter().find(|s| s.tier == tier)
    }

    pub fn tiers(&self) -> impl Iterator<Item = LodTier> + '_ {
        self.specs.iter().map(|s| s.tier)
    }

    /// The least simplified tier in the table.
    pub fn finest(&self) -> Option<LodTier> {
        self.tiers().min()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("sprite LOD cutoff must be above lod1, got {0}")]
    CutoffTooLow(LodTier),
    #[error("batch limit `{0}` must be non-zero")]
    ZeroLimit(&'static str),
    #[error("max_sprite_instances must be non-zero")]
    ZeroSpriteCapacity,
    #[error("LOD spec table is empty")]
    EmptyLodTable,
    #[error("duplicate LOD spec for {0}")]
    DuplicateTier(LodTier),
    #[error("{tier}: target ratio {ratio} outside (0, 1]")]
    BadRatio { tier: LodTier, ratio: f32 },
    #[error("{tier}: target error {error} is negative")]
    BadError { tier: LodTier, error: f32 },
    #[error("LOD policy bands are not sorted by distance")]
    UnsortedBands,
    #[error("LOD policy resolves to {0}, which has no LOD spec")]
    PolicyTierWithoutSpec(LodTier),
}

/// Tunables for an instanced object mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancedMeshConfig {
    pub sprite_lod_cutoff: LodTier,
    pub lod_specs: LodSpecTable,
    pub limits: BatchLimits,
    pub lod_policy: LodPolicy,
    pub max_sprite_instances: usize,
    /// Animation cycles advanced per `update` call.
    pub sprite_animation_rate: f32,
}

impl Default for InstancedMeshConfig {
    fn default() -> Self {
        Self {
            sprite_lod_cutoff: SPRITE_LOD_CUTOFF,
            lod_specs: LodSpecTable::default(),
            limits: BatchLimits::default(),
            lod_policy: LodPolicy::default(),
            max_sprite_instances: 1 << 20,
            sprite_animation_rate: 0.01,
        }
    }
}

impl InstancedMeshConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sprite_lod_cutoff <= LodTier::ONE {
            return Err(ConfigError::CutoffTooLow(self.sprite_lod_cutoff));
        }
        let limits = [
            ("max_num_geometries", self.limits.max_num_geometries),
            (
                "max_instances_per_geometry_per_draw_call",
                self.limits.max_instances_per_geometry_per_draw_call,
            ),
            ("max_draw_calls_per_geometry", self.limits.max_draw_calls_per_geometry),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroLimit(*name));
        }
        if self.max_sprite_instances == 0 {
            return Err(ConfigError::ZeroSpriteCapacity);
        }
        if self.lod_specs.specs.is_empty() {
            return Err(ConfigError::EmptyLodTable);
        }
        let mut seen = Vec::new();
        for spec in &self.lod_specs.specs {
            if seen.contains(&spec.tier) {
                return Err(ConfigError::DuplicateTier(spec.tier));
            }
            seen.push(spec.tier);
            if !(spec.target_ratio > 0.0 && spec.target_ratio <= 1.0) {
                return Err(ConfigError::BadRatio { tier: spec.tier, ratio: spec.target_ratio });
            }
            if spec.target_error < 0.0 || spec.target_error.is_nan() {
                return Err(ConfigError::BadError { tier: spec.tier, error: spec.target_error });
            }
        }
        let sorted = self
            .lod_policy
            .bands
            .windows(2)
            .all(|w| w[0].max_distance <= w[1].max_distance);
        if !sorted {
            return Err(ConfigError::UnsortedBands);
        }
        // every polygon tier the policy can produce needs geometry
        let policy_tiers = self.lod_policy.bands.iter().map(|band| band.tier);
        for tier in policy_tiers.chain([self.lod_policy.beyond]) {
            if tier < self.sprite_lod_cutoff && self.lod_specs.get(tier).is_none() {
                return Err(ConfigError::PolicyTierWithoutSpec(tier));
            }
        }
        Ok(())
    }
}
