use serde::{Deserialize, Serialize};

/// A discrete level-of-detail tier. Higher numbers simplify more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LodTier(pub u8);

impl LodTier {
    pub const ONE: Self = Self(1);
    pub const TWO: Self = Self(2);
    pub const FOUR: Self = Self(4);
    pub const EIGHT: Self = Self(8);
}

impl std::fmt::Display for LodTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lod{}", self.0)
    }
}

/// Tiers loaded for every source by default.
pub const DEFAULT_TIERS: [LodTier; 4] = [LodTier::ONE, LodTier::TWO, LodTier::FOUR, LodTier::EIGHT];

/// Tier at or above which an instance is drawn as a billboard sprite.
pub const SPRITE_LOD_CUTOFF: LodTier = LodTier::EIGHT;

/// Per-instance hint from the chunk producer used to pick a tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LodHint {
    /// The producer already decided the tier.
    Tier(LodTier),
    /// Distance to the viewer and local cluster density (1.0 = nominal).
    Distance { distance: f32, density: f32 },
}

/// Upper distance bound for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodBand {
    pub max_distance: f32,
    pub tier: LodTier,
}

/// Maps distance/density hints to tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodPolicy {
    /// Sorted by ascending `max_distance`.
    pub bands: Vec<LodBand>,
    /// Tier used past the last band.
    pub beyond: LodTier,
}

impl Default for LodPolicy {
    fn default() -> Self {
        Self {
            bands: vec![
                LodBand { max_distance: 32.0, tier: LodTier::ONE },
                LodBand { max_distance: 64.0, tier: LodTier::TWO },
                LodBand { max_distance: 128.0, tier: LodTier::FOUR },
            ],
            beyond: LodTier::EIGHT,
        }
    }
}

impl LodPolicy {
    /// Resolve a hint to a tier. Dense clusters scale the effective distance
    /// up so they fall into coarser tiers sooner.
    pub fn resolve(&self, hint: &LodHint) -> LodTier {
        match *hint {
            LodHint::Tier(tier) => tier,
            LodHint::Distance { distance, density } => {
                let effective = distance * density.max(1.0);
                self.bands
                    .iter()
                    .find(|band| effective < band.max_distance)
                    .map(|band| band.tier)
                    .unwrap_or(self.beyond)
            }
        }
    }
}

/// Which batch manager owns an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    Polygon(LodTier),
    Sprite,
}

impl Representation {
    pub fn classify(tier: LodTier, cutoff: LodTier) -> Self {
        if tier < cutoff {
            Self::Polygon(tier)
        } else {
            Self::Sprite
        }
    }

    /// Resolve and classify in one step. Both batch managers go through
    /// this so they always agree on ownership.
    pub fn of(hint: &LodHint, policy: &LodPolicy, cutoff: LodTier) -> Self {
        Self::classify(policy.resolve(hint), cutoff)
    }

    pub fn is_sprite(&self) -> bool {
        matches!(self, Self::Sprite)
    }
}
