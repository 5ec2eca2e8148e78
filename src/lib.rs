//! # Terrain Engine
//!
//! Procedural terrain for an open-world game: an infinite heightfield built from
//! layered noise, two levels of detail streamed around the viewer, and a
//! deterministic vegetation grid on top.
//!
//! ## Key Modules
//!
//! * `core` - Shared-state containers
//! * `engine_state` - The terrain engine: heightfield, chunk streaming, vegetation,
//!   mesh allocation and the worker pool that builds chunks
//!
//! ## Architecture
//!
//! * The heightfield is a pure function of world position, so chunks of either
//!   tier can be built independently and always agree where they overlap
//! * The near tier is a square of fine chunks around the viewer; the far tier is
//!   a wider square of coarse chunks with a hole cut out where the near tier is
//! * Chunk meshes are built on worker threads and handed to a
//!   `MeshAllocator`, which is either a `wgpu` device or a headless stand-in
//!
//! ## Usage
//!
//! ```rust
//! use cgmath::Point3;
//! use terrain_engine::engine_state::config::TerrainConfig;
//! use terrain_engine::engine_state::rendering::mesh_allocator::HeadlessMeshAllocator;
//! use terrain_engine::engine_state::TerrainEngine;
//!
//! let mut config = TerrainConfig::default();
//! config.near.resolution = 8;
//! config.far.resolution = 4;
//!
//! let mut engine = TerrainEngine::new(config, Box::new(HeadlessMeshAllocator::new())).unwrap();
//! let spawn = engine.find_spawn(42);
//! engine.update(spawn);
//! assert!(engine.is_grounded(spawn, 0.01));
//! ```

use std::f64::consts::TAU;
use std::path::PathBuf;

use anyhow::Context;
use cgmath::{Point3, Vector3};
use clap::Parser;
use log::info;

use engine_state::config::TerrainConfig;
use engine_state::rendering::gpu_allocator::GpuMeshAllocator;
use engine_state::rendering::mesh_allocator::{HeadlessMeshAllocator, MeshAllocator};
use engine_state::TerrainEngine;

pub mod core;
pub mod engine_state;

/// Ticks of the scripted walk in [`run`].
const WALK_TICKS: u32 = 240;
/// Distance covered per tick of the walk.
const WALK_STEP: f64 = 6.0;

/// Walks a viewer across procedural terrain and logs what streams in and out.
#[derive(Parser, Debug)]
#[command(name = "terrain-engine", version)]
struct RunOptions {
    /// JSON config file; built-in defaults when omitted
    config_path: Option<PathBuf>,

    /// Upload meshes to a real GPU device
    #[arg(long)]
    gpu: bool,

    /// Seed for the spawn point search
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn make_allocator(gpu: bool) -> Box<dyn MeshAllocator> {
    if gpu {
        match pollster::block_on(GpuMeshAllocator::new_headless()) {
            Ok(allocator) => return Box::new(allocator),
            Err(error) => log::warn!("GPU unavailable ({error}), streaming headless"),
        }
    }
    Box::new(HeadlessMeshAllocator::new())
}

/// Spawns a viewer, walks it across the terrain and logs what streamed.
fn simulate(options: RunOptions) -> anyhow::Result<()> {
    let config = match &options.config_path {
        Some(path) => TerrainConfig::from_json_file(path).context("loading terrain config")?,
        None => TerrainConfig::default(),
    };

    let mut engine =
        TerrainEngine::new(config, make_allocator(options.gpu)).context("creating terrain engine")?;
    let spawn = engine.find_spawn(options.seed);
    info!("Spawning at ({:.1}, {:.1}, {:.1})", spawn.x, spawn.y, spawn.z);

    let report = engine.update(spawn);
    info!(
        "Initial load: near {}, far {}, vegetation {} in {:?}",
        report.near, report.far, report.vegetation, report.elapsed
    );

    let mut slowest = report.elapsed;
    for tick in 1..=WALK_TICKS {
        let t = tick as f64;
        let heading = (t * 0.01).sin() * 0.8;
        let x = spawn.x + t * WALK_STEP * heading.cos();
        let z = spawn.z + t * WALK_STEP * heading.sin();
        let viewer = Point3::new(x, engine.ground_height(x, z) + 1.7, z);

        let angle = t / WALK_TICKS as f64 * TAU;
        engine.set_sun_direction(Vector3::new(angle.cos(), 0.8, angle.sin()));

        let report = engine.update(viewer);
        slowest = slowest.max(report.elapsed);
        if !report.is_empty() {
            info!(
                "Tick {}: near {}, far {}, vegetation {}",
                tick, report.near, report.far, report.vegetation
            );
        }
    }

    let trees: usize = engine
        .vegetation_cells()
        .iter()
        .map(|(_, cell)| cell.placements.len())
        .sum();
    info!(
        "Walk finished: {} near, {} far chunks ({} meshes, {} KiB), {} trees, slowest tick {:?}",
        engine.near_chunks().len(),
        engine.far_chunks().len(),
        engine.allocator().live_allocations(),
        engine.allocator().allocated_bytes() / 1024,
        trees,
        slowest
    );

    Ok(())
}

/// Runs the headless streaming demo.
///
/// Arguments: an optional JSON config path, `--gpu` to upload meshes to a real
/// device and `--seed N` to pick the spawn point.
pub fn run() -> anyhow::Result<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    simulate(RunOptions::parse())
}
