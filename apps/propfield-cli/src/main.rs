use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use propfield_assets::{
    AssetKind, CollisionRegistry, FsTransport, MeshAsset, PackageLoader, SourceId, SpriteAsset, encode_asset,
};
use propfield_common::{InstancedMeshConfig, LodSpecTable};
use propfield_mesh::InstancedObjectMesh;
use propfield_render::{DebugTextRenderer, HeadlessContext, RenderContext, RenderView, Renderer};
use propfield_stream::{ChunkGrid, Scatter, StreamConfig, StreamState};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "propfield-cli", about = "CLI tool for propfield operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Write procedural mesh and sprite assets for N sources
    Bake {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
        /// Number of sources to generate
        #[arg(short, long, default_value = "3")]
        sources: usize,
        /// Sprite frame side in pixels
        #[arg(long, default_value = "32")]
        frame_size: u32,
        /// Billboard angles per source
        #[arg(long, default_value = "8")]
        angles: usize,
        /// Compress assets with zstd
        #[arg(long)]
        compress: bool,
    },
    /// Load a polygon and spritesheet package pair and describe it
    Inspect {
        /// Asset directory
        #[arg(short, long)]
        assets: PathBuf,
        /// Source ids to load
        #[arg(short, long, required = true, num_args = 1..)]
        source: Vec<String>,
    },
    /// Walk a viewer across a scattered prop field and report batching
    Simulate {
        /// Asset directory
        #[arg(short, long)]
        assets: PathBuf,
        /// Source ids to load
        #[arg(short, long, required = true, num_args = 1..)]
        source: Vec<String>,
        /// JSON mesh configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of viewer steps
        #[arg(long, default_value = "20")]
        steps: usize,
        /// Viewer distance moved per step
        #[arg(long, default_value = "8.0")]
        speed: f32,
        /// Streaming radius in chunks
        #[arg(short, long, default_value = "3")]
        radius: i32,
        /// Chunk side in world units
        #[arg(long, default_value = "32.0")]
        chunk_size: f32,
        /// Props scattered per chunk
        #[arg(long, default_value = "64")]
        per_chunk: usize,
        /// Scatter seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Polygon draws cast shadows
        #[arg(long)]
        shadow: bool,
        /// Draw-call lines shown in the final frame dump
        #[arg(long, default_value = "16")]
        max_lines: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("propfield-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", propfield_common::crate_info());
            println!("assets: {}", propfield_assets::crate_info());
            println!("render: {}", propfield_render::crate_info());
            println!("stream: {}", propfield_stream::crate_info());
            println!("mesh: {}", propfield_mesh::crate_info());
        }
        Commands::Bake {
            out,
            sources,
            frame_size,
            angles,
            compress,
        } => bake(&out, sources, frame_size, angles, compress)?,
        Commands::Inspect { assets, source } => inspect(&assets, &source)?,
        Commands::Simulate {
            assets,
            source,
            config,
            steps,
            speed,
            radius,
            chunk_size,
            per_chunk,
            seed,
            shadow,
            max_lines,
        } => {
            let config = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading config {}", path.display()))?;
                    serde_json::from_str::<InstancedMeshConfig>(&text)
                        .with_context(|| format!("parsing config {}", path.display()))?
                }
                None => InstancedMeshConfig::default(),
            };
            let walk = Walk {
                steps,
                speed,
                radius,
                chunk_size,
                per_chunk,
                seed,
                max_lines,
            };
            simulate(&assets, &source, config, shadow, &walk)?;
        }
    }

    Ok(())
}

fn bake(out: &Path, sources: usize, frame_size: u32, angles: usize, compress: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let transport = FsTransport::new(out);

    for i in 0..sources {
        let source = SourceId::new(format!("prop{i}"));
        let mesh = if i % 2 == 0 {
            MeshAsset::cuboid(0.5 + 0.25 * i as f32)
        } else {
            MeshAsset::uv_sphere(12, 24, 1.0)
        };
        let shade = (40 + (i * 50) % 200) as u8;
        let sprite = SpriteAsset::solid(frame_size, angles, [shade, 160, 255 - shade, 255], [2.0, 2.0]);

        write_asset(
            transport.path_for(&source, AssetKind::Mesh),
            &encode_asset(&mesh, compress)?,
            compress,
        )?;
        write_asset(
            transport.path_for(&source, AssetKind::Spritesheet),
            &encode_asset(&sprite, compress)?,
            compress,
        )?;
        println!(
            "  {source}: {} tris, {angles} sprite angles at {frame_size}px",
            mesh.triangle_count()
        );
    }
    println!("Baked {sources} sources into {}", out.display());
    Ok(())
}

fn write_asset(path: PathBuf, bytes: &[u8], compress: bool) -> anyhow::Result<()> {
    let path = if compress {
        let mut name = path.into_os_string();
        name.push(".zst");
        PathBuf::from(name)
    } else {
        path
    };
    std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "asset written");
    Ok(())
}

fn inspect(assets: &Path, sources: &[String]) -> anyhow::Result<()> {
    let sources: Vec<SourceId> = sources.iter().map(SourceId::new).collect();
    let loader = PackageLoader::new(FsTransport::new(assets));
    let physics = CollisionRegistry::new();
    let (polygon, sprites) =
        pollster::block_on(loader.load_pair(&sources, &LodSpecTable::default(), &physics))?;

    println!("Polygon package {:016x}", polygon.id());
    for (index, source) in sources.iter().enumerate() {
        println!("  {source}:");
        for tier in polygon.tiers(index as u32) {
            if let Some(geometry) = polygon.geometry(index as u32, tier) {
                println!(
                    "    {tier}: {} vertices, {} indices, error {:.4}",
                    geometry.vertex_count(),
                    geometry.index_count(),
                    geometry.error
                );
            }
        }
    }
    println!("Collision meshes: {}", physics.len());

    let atlas = sprites.atlas();
    println!(
        "Spritesheet package {:016x}: atlas {}x{} cell {}",
        sprites.id(),
        atlas.width,
        atlas.height,
        atlas.cell
    );
    for (source, entry) in sources.iter().zip(sprites.entries()) {
        println!(
            "  {source}: {} frames, world size {:.1}x{:.1}",
            entry.frames.len(),
            entry.world_size[0],
            entry.world_size[1]
        );
    }

    polygon.release_collision(&physics);
    Ok(())
}

struct Walk {
    steps: usize,
    speed: f32,
    radius: i32,
    chunk_size: f32,
    per_chunk: usize,
    seed: u64,
    max_lines: usize,
}

fn simulate(
    assets: &Path,
    sources: &[String],
    config: InstancedMeshConfig,
    shadow: bool,
    walk: &Walk,
) -> anyhow::Result<()> {
    let sources: Vec<SourceId> = sources.iter().map(SourceId::new).collect();
    let source_count = sources.len() as u32;
    let context = Arc::new(HeadlessContext::new());
    let physics = Arc::new(CollisionRegistry::new());
    let mut mesh = InstancedObjectMesh::with_config(context.clone(), physics, sources, shadow, config)?;
    pollster::block_on(mesh.wait_for_load(&PackageLoader::new(FsTransport::new(assets))))?;

    let grid = ChunkGrid::new(walk.chunk_size);
    let scatter = Scatter::new(walk.seed, grid, walk.per_chunk, source_count);
    let mut stream = StreamState::new(StreamConfig {
        radius: walk.radius,
        ..StreamConfig::default()
    });

    println!(
        "Simulating {} steps: radius={} chunk={} per_chunk={} seed={}",
        walk.steps, walk.radius, walk.chunk_size, walk.per_chunk, walk.seed
    );
    let mut rejected = 0usize;
    for step in 0..walk.steps {
        let viewer = Vec3::new(step as f32 * walk.speed, 0.0, 0.0);
        let (loads, unloads) = stream.update(grid.chunk_at(viewer));
        for chunk in unloads {
            mesh.remove_chunk(chunk);
        }
        for chunk in loads {
            if let Err(error) = mesh.add_chunk(chunk, &scatter.generate(chunk, viewer)) {
                tracing::warn!(%chunk, %error, "chunk rejected");
                stream.forget(chunk);
                rejected += 1;
            }
        }

        context.set_view(RenderView {
            eye: viewer + Vec3::new(0.0, 10.0, 10.0),
            target: viewer,
            ..RenderView::default()
        });
        mesh.update();

        let stats = mesh.stats();
        println!(
            "  step {step:>3}: chunks={:>3} slots={:>2} buckets={:>3} polygon={:>6} sprites={:>6}",
            stats.chunks,
            stats.polygon.resident_slots,
            stats.polygon.non_empty_buckets,
            stats.polygon.instances,
            stats.sprites
        );
    }
    println!("Rejected chunks: {rejected}");

    let renderer = DebugTextRenderer {
        max_lines: walk.max_lines,
    };
    print!("{}", renderer.render(&mesh.snapshot(), &context.view()));
    Ok(())
}
