mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

use config::EngineConfig;
use strata_common::{LAYER_ALL, Transform};
use strata_scene::{Scene, SceneNode};
use strata_spatial::SpatialIndex;
use strata_stream::{ResourceId, ResourceKind, SimulatedDevice, StreamingContext};
use strata_tools::{IndexInspector, StreamInspector};

const KIB: u64 = 1024;

#[derive(Parser)]
#[command(name = "strata-cli", about = "Spatial index and resource streaming simulations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON engine config; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Build a scene, move entities, cast rays and print octree statistics
    Octree {
        /// Number of boxes to scatter
        #[arg(short, long, default_value = "500")]
        entities: usize,
        /// Seed for scene generation
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Number of entities to move after the initial build
        #[arg(short, long, default_value = "100")]
        moves: usize,
    },
    /// Run a frame loop against the streaming budget
    Stream {
        /// Frames to simulate
        #[arg(short, long, default_value = "120")]
        frames: u64,
        /// Mesh resources to register
        #[arg(long, default_value = "64")]
        meshes: usize,
        /// Texture resources to register
        #[arg(long, default_value = "64")]
        textures: usize,
        /// Frame at which to simulate a platform memory warning
        #[arg(long)]
        memory_warning_at: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = EngineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("strata-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", strata_common::crate_info());
            println!("spatial: {}", strata_spatial::crate_info());
            println!("scene: {}", strata_scene::crate_info());
            println!("stream: {}", strata_stream::crate_info());
            println!("tools: {}", strata_tools::crate_info());
            println!(
                "streaming budget: {} (cap {} per frame)",
                strata_tools::format_bytes(config.streaming.budget_bytes),
                strata_tools::format_bytes(config.streaming.transfer_cap_bytes)
            );
        }
        Commands::Octree {
            entities,
            seed,
            moves,
        } => run_octree(&config, entities, seed, moves)?,
        Commands::Stream {
            frames,
            meshes,
            textures,
            memory_warning_at,
        } => run_stream(&config, frames, meshes, textures, memory_warning_at)?,
    }

    Ok(())
}

fn run_octree(
    config: &EngineConfig,
    entities: usize,
    seed: u64,
    moves: usize,
) -> anyhow::Result<()> {
    const EXTENT: f32 = 200.0;
    println!("Octree demo: entities={entities}, seed={seed}, moves={moves}");

    let mut scene = Scene::with_seed(seed);
    let mut index = SpatialIndex::with_config(config.octree.clone())?;
    let ids = scene.populate(entities, EXTENT);
    scene.spawn(SceneNode::unbounded());
    let synced = scene.sync_index(&mut index);
    println!("Built: added={}", synced.added);
    println!("{}", IndexInspector::summary(&index));

    for i in 0..moves.min(ids.len()) {
        let r = scene.next_random() as usize;
        let id = ids[(r + i) % ids.len()];
        let target = Vec3::new(
            (scene.next_random() % 1000) as f32,
            (scene.next_random() % 1000) as f32,
            (scene.next_random() % 1000) as f32,
        ) * (EXTENT / 1000.0);
        scene.set_transform(id, Transform::from_position(target));
    }
    let synced = scene.sync_index(&mut index);
    println!("Moved: updated={}", synced.updated);

    let origin = Vec3::splat(-10.0);
    for target in [Vec3::splat(EXTENT * 0.5), Vec3::new(EXTENT, 0.0, EXTENT), Vec3::new(0.0, EXTENT, EXTENT)] {
        match index.ray_cast(&scene, origin, target - origin, LAYER_ALL) {
            Some(hit) => println!(
                "Ray toward ({:.0}, {:.0}, {:.0}): hit {} at {:.2}",
                target.x, target.y, target.z, hit.entity.0, hit.distance
            ),
            None => println!("Ray toward ({:.0}, {:.0}, {:.0}): no hit", target.x, target.y, target.z),
        }
    }

    for id in ids.iter().step_by(2) {
        scene.despawn(*id);
    }
    let synced = scene.sync_index(&mut index);
    println!("Despawned: removed={}", synced.removed);
    println!("{}", IndexInspector::summary(&index));
    for level in IndexInspector::levels(&index) {
        println!("  {level}");
    }
    Ok(())
}

fn run_stream(
    config: &EngineConfig,
    frames: u64,
    meshes: usize,
    textures: usize,
    memory_warning_at: Option<u64>,
) -> anyhow::Result<()> {
    println!("Streaming demo: frames={frames}, meshes={meshes}, textures={textures}");

    let device = Arc::new(SimulatedDevice::new());
    let mut ctx = StreamingContext::new(config.streaming.clone(), device.clone())?;
    ctx.mesh_mut().register("unit_cube", 4 * KIB, ResourceKind::Constant);
    ctx.mesh_mut().register("screen_quad", KIB, ResourceKind::Constant);

    let mesh_ids: Vec<ResourceId> = (0..meshes)
        .map(|i| {
            let size = (256 + (i as u64 * 7919) % 2048) * KIB;
            ctx.mesh_mut().register(format!("mesh_{i}"), size, ResourceKind::Streaming)
        })
        .collect();
    let texture_ids: Vec<ResourceId> = (0..textures)
        .map(|i| {
            let size = (1024 + (i as u64 * 104_729) % 8192) * KIB;
            let kind = if i % 16 == 15 {
                ResourceKind::Temporary
            } else {
                ResourceKind::Streaming
            };
            ctx.texture_mut().register(format!("texture_{i}"), size, kind)
        })
        .collect();

    for frame in 0..frames {
        if memory_warning_at == Some(frame) {
            ctx.received_memory_warning();
        }
        ctx.start_frame();

        // The camera sweeps across the resource list; coverage falls off across the window.
        let window = |count: usize| {
            let width = if count == 0 { 0 } else { (count / 4).max(1) };
            let start = (frame as usize / 2) % count.max(1);
            (0..width).map(move |k| ((start + k) % count, 1.0 - (k as f32 / width as f32)))
        };
        for (i, coverage) in window(mesh_ids.len()) {
            ctx.mesh_mut().reset_priority(mesh_ids[i], coverage);
        }
        for (i, coverage) in window(texture_ids.len()) {
            ctx.texture_mut().reset_priority(texture_ids[i], coverage);
        }

        if let Some(report) = ctx.do_streaming() {
            if frame % 20 == 0 || report.mesh.newly_oversized + report.texture.newly_oversized > 0 {
                println!(
                    "frame {frame:>4}: loads={} evictions={} moved={} used={}",
                    report.mesh.loads + report.texture.loads,
                    report.mesh.evictions + report.texture.evictions,
                    strata_tools::format_bytes(report.bytes_transferred()),
                    strata_tools::format_bytes(ctx.used_bytes())
                );
            }
        }
        ctx.end_frame();
    }

    ctx.wait_for_transfers();
    ctx.start_frame();
    println!("{}", StreamInspector::context(&ctx));
    println!("device resident: {}", strata_tools::format_bytes(device.resident_bytes()));
    println!(
        "pass time: avg {:?} max {:?}",
        ctx.pass_timer().average(),
        ctx.pass_timer().max()
    );
    println!("top textures:");
    for info in StreamInspector::top_resources(ctx.texture(), 5) {
        println!("  {info}");
    }
    Ok(())
}
