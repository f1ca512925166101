use serde::{Deserialize, Serialize};

use crate::codec::{content_id, decode_asset};
use crate::error::LoadError;
use crate::source::{AssetKind, AssetTransport, SourceId};

/// Largest atlas side, in pixels.
pub const MAX_ATLAS_SIZE: u32 = 8192;

/// Billboard views of one source as stored on the wire.
///
/// `frames[i]` is an RGBA8 image of `frame_size`² pixels showing the object
/// from angle `i * TAU / frames.len()` around the Y axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteAsset {
    pub frame_size: u32,
    /// Billboard quad size in world units (width, height).
    pub world_size: [f32; 2],
    pub frames: Vec<Vec<u8>>,
}

impl SpriteAsset {
    /// Flat-coloured frames, each angle slightly darker than the last.
    pub fn solid(frame_size: u32, angles: usize, color: [u8; 4], world_size: [f32; 2]) -> Self {
        let frames = (0..angles)
            .map(|angle| {
                let shade = 255 - (angle * 96 / angles.max(1)) as u32;
                let px = [
                    (color[0] as u32 * shade / 255) as u8,
                    (color[1] as u32 * shade / 255) as u8,
                    (color[2] as u32 * shade / 255) as u8,
                    color[3],
                ];
                px.repeat((frame_size * frame_size) as usize)
            })
            .collect();
        Self {
            frame_size,
            world_size,
            frames,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.frame_size == 0 {
            return Err("frame size is zero".into());
        }
        if self.frame_size > MAX_ATLAS_SIZE {
            return Err(format!("frame size {} exceeds the {MAX_ATLAS_SIZE}px atlas", self.frame_size));
        }
        if self.frames.is_empty() {
            return Err("no frames".into());
        }
        let side = self.frame_size as usize;
        let expected = side * side * 4;
        if let Some((i, frame)) = self.frames.iter().enumerate().find(|(_, f)| f.len() != expected) {
            return Err(format!("frame {i} has {} bytes, expected {expected}", frame.len()));
        }
        if self.world_size.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(format!("bad world size {:?}", self.world_size));
        }
        Ok(())
    }
}

/// UV rectangle of one frame inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteFrame {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// Per-source frame table.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteEntry {
    pub frames: Vec<SpriteFrame>,
    pub world_size: [f32; 2],
}

impl SpriteEntry {
    /// Frame for a viewing angle (radians, relative to the object's yaw).
    pub fn frame_for_angle(&self, angle: f32) -> (u32, SpriteFrame) {
        let n = self.frames.len();
        let step = std::f32::consts::TAU / n as f32;
        let wrapped = angle.rem_euclid(std::f32::consts::TAU);
        let index = ((wrapped / step).round() as usize) % n;
        (index as u32, self.frames[index])
    }
}

/// RGBA8 texture holding every frame of every source.
#[derive(Debug, Clone, PartialEq)]
pub struct Atlas {
    pub width: u32,
    pub height: u32,
    /// Side of one grid cell.
    pub cell: u32,
    pub pixels: Vec<u8>,
}

impl Atlas {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[offset..offset + 4]);
        px
    }
}

/// Shared atlas plus frame metadata for every source.
#[derive(Debug)]
pub struct SpritesheetPackage {
    id: u64,
    sources: Vec<SourceId>,
    atlas: Atlas,
    entries: Vec<SpriteEntry>,
}

impl SpritesheetPackage {
    /// Pack already-decoded sprite assets. Row per source, column per angle.
    pub fn pack(sources: Vec<SourceId>, assets: &[SpriteAsset]) -> Result<Self, LoadError> {
        if sources.len() != assets.len() {
            return Err(LoadError::SourceCountMismatch {
                sources: sources.len(),
                assets: assets.len(),
            });
        }
        if sources.is_empty() {
            return Err(LoadError::NoSources);
        }
        for (source, asset) in sources.iter().zip(assets) {
            asset.validate().map_err(|reason| LoadError::InvalidSprite {
                asset: source.clone(),
                reason,
            })?;
        }

        let cell = assets.iter().map(|a| a.frame_size).max().unwrap_or(1);
        let columns = assets.iter().map(|a| a.frames.len()).max().unwrap_or(1) as u64;
        // widened so decoded sizes cannot overflow before the limit check
        let wide_width = columns.saturating_mul(cell as u64);
        let wide_height = (assets.len() as u64).saturating_mul(cell as u64);
        let max = MAX_ATLAS_SIZE as u64;
        if wide_width > max || wide_height > max {
            return Err(LoadError::AtlasTooLarge {
                width: wide_width,
                height: wide_height,
                max: MAX_ATLAS_SIZE,
            });
        }
        let (width, height) = (wide_width as u32, wide_height as u32);

        let mut pixels = vec![0u8; (width * height * 4) as usize];
        let mut entries = Vec::with_capacity(assets.len());
        for (row, asset) in assets.iter().enumerate() {
            let y0 = row as u32 * cell;
            let mut frames = Vec::with_capacity(asset.frames.len());
            for (col, frame) in asset.frames.iter().enumerate() {
                let x0 = col as u32 * cell;
                let line = (asset.frame_size * 4) as usize;
                for y in 0..asset.frame_size {
                    let src = (y * asset.frame_size * 4) as usize;
                    let dst = (((y0 + y) * width + x0) * 4) as usize;
                    pixels[dst..dst + line].copy_from_slice(&frame[src..src + line]);
                }
                frames.push(SpriteFrame {
                    uv_min: [x0 as f32 / width as f32, y0 as f32 / height as f32],
                    uv_max: [
                        (x0 + asset.frame_size) as f32 / width as f32,
                        (y0 + asset.frame_size) as f32 / height as f32,
                    ],
                });
            }
            entries.push(SpriteEntry {
                frames,
                world_size: asset.world_size,
            });
        }

        Ok(Self {
            id: content_id(pixels.chunks(1 << 16)),
            sources,
            atlas: Atlas {
                width,
                height,
                cell,
                pixels,
            },
            entries,
        })
    }

    /// Fetch and decode each source's sprite asset, then pack the atlas.
    pub async fn load_urls<T: AssetTransport>(
        transport: &T,
        sources: &[SourceId],
    ) -> Result<Self, LoadError> {
        let mut assets = Vec::with_capacity(sources.len());
        for source in sources {
            let bytes = transport
                .fetch(source, AssetKind::Spritesheet)
                .await
                .map_err(|error| LoadError::Transport {
                    asset: source.clone(),
                    kind: AssetKind::Spritesheet,
                    error,
                })?;
            let asset: SpriteAsset = decode_asset(&bytes).map_err(|error| LoadError::Decode {
                asset: source.clone(),
                kind: AssetKind::Spritesheet,
                error,
            })?;
            tracing::debug!(%source, frames = asset.frames.len(), "sprite source loaded");
            assets.push(asset);
        }
        Self::pack(sources.to_vec(), &assets)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn entry(&self, source: u32) -> Option<&SpriteEntry> {
        self.entries.get(source as usize)
    }

    pub fn entries(&self) -> &[SpriteEntry] {
        &self.entries
    }
}
