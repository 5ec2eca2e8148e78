//! # Engine State Module
//!
//! The terrain system as seen by the rest of the game.
//!
//! ## Key Components
//!
//! * `TerrainEngine` - owns the heightfield, both terrain tiers and the
//!   vegetation grid, and steps them once per tick
//! * `config` - serde-backed tunables
//! * `buffer_state` - GPU buffers of live chunks
//! * `rendering` - vertex format, mesh allocators and terrain shading
//! * `task_management` - worker threads that build chunks in parallel
//! * `terrain` - noise, heightfield, grid index, chunk builds and the streaming cache
//!
//! ## Tick
//!
//! `TerrainEngine::update` snapshots the shared sun direction, then updates
//! the near tier, the far tier and the vegetation grid in that order. Each
//! tier's builds run on the worker pool and are all collected before the
//! next tier starts, so the engine is consistent when `update` returns.

use std::sync::Arc;

use cgmath::{Point3, Vector3};
use web_time::{Duration, Instant};

use config::{ConfigError, TerrainConfig};
use rendering::mesh_allocator::MeshAllocator;
use rendering::shading::{SunDirection, TerrainShadingUniform};
use task_management::TaskManager;
use terrain::chunk::{TerrainChunk, Tier};
use terrain::grid_index::GridIndex;
use terrain::heightfield::{Heightfield, HeightfieldParams};
use terrain::spawn::find_spawn;
use terrain::streaming_cache::{StreamingCache, UpdateReport};
use terrain::vegetation::{VegetationCell, VegetationGrid};
use terrain::world::{TerrainLifecycle, VegetationLifecycle};

pub mod buffer_state;
pub mod config;
pub mod rendering;
pub mod task_management;
pub mod terrain;

/// What one [`TerrainEngine::update`] changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerrainUpdateReport {
    pub near: UpdateReport,
    pub far: UpdateReport,
    pub vegetation: UpdateReport,
    /// Wall time spent in the update
    pub elapsed: Duration,
}

impl TerrainUpdateReport {
    /// `true` when no tier changed.
    pub fn is_empty(&self) -> bool {
        self.near.is_empty() && self.far.is_empty() && self.vegetation.is_empty()
    }
}

/// The streaming terrain and vegetation of one world.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use terrain_engine::engine_state::config::TerrainConfig;
/// use terrain_engine::engine_state::rendering::mesh_allocator::HeadlessMeshAllocator;
/// use terrain_engine::engine_state::TerrainEngine;
///
/// let mut config = TerrainConfig::default();
/// config.near.resolution = 4;
/// config.far.resolution = 2;
/// config.worker_threads = 0;
///
/// let mut engine = TerrainEngine::new(config, Box::new(HeadlessMeshAllocator::new())).unwrap();
/// let report = engine.update(Point3::new(0.0, 0.0, 0.0));
/// assert_eq!(report.near.built.len(), 49);
/// assert!(engine.update(Point3::new(0.0, 0.0, 0.0)).is_empty());
/// ```
pub struct TerrainEngine {
    config: TerrainConfig,
    heightfield: Arc<Heightfield>,
    near: StreamingCache<TerrainChunk>,
    far: StreamingCache<TerrainChunk>,
    vegetation_grid: VegetationGrid,
    vegetation: StreamingCache<VegetationCell>,
    sun_direction: SunDirection,
    /// Sun direction as of the start of the last update
    tick_sun: Vector3<f64>,
    allocator: Box<dyn MeshAllocator>,
    task_manager: TaskManager,
    last_viewer: Option<Point3<f64>>,
}

impl TerrainEngine {
    /// Creates an engine with nothing live yet.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated before use
    /// * `allocator` - Receives every chunk mesh
    pub fn new(config: TerrainConfig, allocator: Box<dyn MeshAllocator>) -> Result<Self, ConfigError> {
        config.validate()?;

        let heightfield = Arc::new(Heightfield::new(config.heightfield.clone()));
        let vegetation_grid = VegetationGrid::new(config.vegetation.clone(), heightfield.clone());
        let near = StreamingCache::new(
            "near",
            GridIndex::new(config.near.cell_size, config.near.view_radius),
        );
        let far = StreamingCache::new(
            "far",
            GridIndex::new(config.far.cell_size, config.far.view_radius)
                .with_exclusion(config.far_exclusion()),
        );
        let vegetation = StreamingCache::new("vegetation", vegetation_grid.grid_index());
        let task_manager = TaskManager::new(config.worker_threads);
        let sun_direction = SunDirection::default();

        log::info!(
            "Terrain engine: near {}x{} cells of {} (r={}), far {}x{} cells of {} (r={}), far exclusion {}",
            config.near.resolution,
            config.near.resolution,
            config.near.cell_size,
            config.near.view_radius,
            config.far.resolution,
            config.far.resolution,
            config.far.cell_size,
            config.far.view_radius,
            config.far_exclusion()
        );

        Ok(Self {
            tick_sun: sun_direction.get(),
            config,
            heightfield,
            near,
            far,
            vegetation_grid,
            vegetation,
            sun_direction,
            allocator,
            task_manager,
            last_viewer: None,
        })
    }

    /// Terrain height at a world coordinate.
    pub fn height(&self, x: f64, z: f64) -> f64 {
        self.heightfield.height(x, z)
    }

    /// Ground height for snapping characters and props.
    pub fn ground_height(&self, x: f64, z: f64) -> f64 {
        self.height(x, z)
    }

    /// Whether `position` is within `threshold` of the ground (or below it).
    pub fn is_grounded(&self, position: Point3<f64>, threshold: f64) -> bool {
        position.y - self.ground_height(position.x, position.z) <= threshold
    }

    /// Sets the sun direction for terrain shading.
    ///
    /// # Returns
    ///
    /// `false` if the direction was degenerate and ignored
    pub fn set_sun_direction(&mut self, direction: Vector3<f64>) -> bool {
        self.sun_direction.set(direction)
    }

    /// Shared handle to the sun direction, for the lighting subsystem.
    pub fn sun_direction(&self) -> &SunDirection {
        &self.sun_direction
    }

    /// Shares the lighting subsystem's sun direction instead of the engine's own.
    pub fn attach_sun_direction(&mut self, sun_direction: SunDirection) {
        self.tick_sun = sun_direction.get();
        self.sun_direction = sun_direction;
    }

    /// Streams all tiers around `viewer`.
    pub fn update(&mut self, viewer: Point3<f64>) -> TerrainUpdateReport {
        let start = Instant::now();
        self.tick_sun = self.sun_direction.get();

        let (x, z) = (viewer.x, viewer.z);

        let near = self.near.update(
            x,
            z,
            &mut TerrainLifecycle {
                tier: Tier::Near,
                params: self.config.near,
                heightfield: &self.heightfield,
                allocator: &mut *self.allocator,
                task_manager: &mut self.task_manager,
            },
        );
        let far = self.far.update(
            x,
            z,
            &mut TerrainLifecycle {
                tier: Tier::Far,
                params: self.config.far,
                heightfield: &self.heightfield,
                allocator: &mut *self.allocator,
                task_manager: &mut self.task_manager,
            },
        );
        let vegetation = self.vegetation.update(
            x,
            z,
            &mut VegetationLifecycle {
                grid: &self.vegetation_grid,
                task_manager: &mut self.task_manager,
            },
        );

        self.last_viewer = Some(viewer);

        let report = TerrainUpdateReport {
            near,
            far,
            vegetation,
            elapsed: start.elapsed(),
        };

        if !report.is_empty() {
            log::debug!(
                "Terrain tick at ({:.1}, {:.1}): near {}, far {}, vegetation {}, {} meshes / {} KiB, {:?}",
                x,
                z,
                report.near,
                report.far,
                report.vegetation,
                self.allocator.live_allocations(),
                self.allocator.allocated_bytes() / 1024,
                report.elapsed
            );
        }

        report
    }

    /// Swaps in new heightfield parameters and rebuilds everything live.
    ///
    /// Chunks and cells are destroyed and rebuilt around the last viewer
    /// (the origin if there was none).
    pub fn regenerate(&mut self, params: HeightfieldParams) -> TerrainUpdateReport {
        let start = Instant::now();
        let viewer = self.last_viewer.unwrap_or_else(|| Point3::new(0.0, 0.0, 0.0));
        let (x, z) = (viewer.x, viewer.z);

        self.config.heightfield = params.clone();
        self.heightfield = Arc::new(Heightfield::new(params));
        self.vegetation_grid = VegetationGrid::new(self.config.vegetation.clone(), self.heightfield.clone());

        let near = self.near.regenerate(
            x,
            z,
            &mut TerrainLifecycle {
                tier: Tier::Near,
                params: self.config.near,
                heightfield: &self.heightfield,
                allocator: &mut *self.allocator,
                task_manager: &mut self.task_manager,
            },
        );
        let far = self.far.regenerate(
            x,
            z,
            &mut TerrainLifecycle {
                tier: Tier::Far,
                params: self.config.far,
                heightfield: &self.heightfield,
                allocator: &mut *self.allocator,
                task_manager: &mut self.task_manager,
            },
        );
        let vegetation = self.vegetation.regenerate(
            x,
            z,
            &mut VegetationLifecycle {
                grid: &self.vegetation_grid,
                task_manager: &mut self.task_manager,
            },
        );
        self.last_viewer = Some(viewer);

        log::info!(
            "Regenerated terrain: {} near, {} far, {} vegetation cells",
            near.built.len(),
            far.built.len(),
            vegetation.built.len()
        );

        TerrainUpdateReport {
            near,
            far,
            vegetation,
            elapsed: start.elapsed(),
        }
    }

    /// Releases every live chunk and cell.
    pub fn clear(&mut self) {
        self.near.clear(&mut TerrainLifecycle {
            tier: Tier::Near,
            params: self.config.near,
            heightfield: &self.heightfield,
            allocator: &mut *self.allocator,
            task_manager: &mut self.task_manager,
        });
        self.far.clear(&mut TerrainLifecycle {
            tier: Tier::Far,
            params: self.config.far,
            heightfield: &self.heightfield,
            allocator: &mut *self.allocator,
            task_manager: &mut self.task_manager,
        });
        self.vegetation.clear(&mut VegetationLifecycle {
            grid: &self.vegetation_grid,
            task_manager: &mut self.task_manager,
        });
        self.last_viewer = None;
    }

    /// A walkable spawn point for `seed`.
    pub fn find_spawn(&self, seed: u64) -> Point3<f64> {
        find_spawn(&self.heightfield, &self.config.spawn, seed)
    }

    /// Terrain brightness factor for `normal` under this tick's sun.
    pub fn light_multiplier(&self, normal: Vector3<f64>) -> f64 {
        self.config.shading.light_multiplier(normal, self.tick_sun)
    }

    /// Shading inputs for this tick, ready for a uniform buffer.
    pub fn shading_uniform(&self) -> TerrainShadingUniform {
        self.config.shading.uniform(self.tick_sun)
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn heightfield(&self) -> &Arc<Heightfield> {
        &self.heightfield
    }

    pub fn near_chunks(&self) -> &StreamingCache<TerrainChunk> {
        &self.near
    }

    pub fn far_chunks(&self) -> &StreamingCache<TerrainChunk> {
        &self.far
    }

    pub fn vegetation_cells(&self) -> &StreamingCache<VegetationCell> {
        &self.vegetation
    }

    pub fn vegetation_grid(&self) -> &VegetationGrid {
        &self.vegetation_grid
    }

    pub fn allocator(&self) -> &dyn MeshAllocator {
        self.allocator.as_ref()
    }

    pub fn last_viewer(&self) -> Option<Point3<f64>> {
        self.last_viewer
    }
}

impl Drop for TerrainEngine {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::mesh_allocator::HeadlessMeshAllocator;

    fn light_config() -> TerrainConfig {
        let mut config = TerrainConfig::default();
        config.near.resolution = 4;
        config.far.resolution = 2;
        config.worker_threads = 2;
        config
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = light_config();
        config.near.cell_size = -1.0;
        assert!(TerrainEngine::new(config, Box::new(HeadlessMeshAllocator::new())).is_err());
    }

    #[test]
    fn every_live_chunk_holds_one_allocation() {
        let mut engine = TerrainEngine::new(light_config(), Box::new(HeadlessMeshAllocator::new())).unwrap();
        engine.update(Point3::new(10.0, 0.0, 10.0));
        engine.update(Point3::new(400.0, 0.0, -250.0));
        assert_eq!(
            engine.allocator().live_allocations(),
            engine.near_chunks().len() + engine.far_chunks().len()
        );
        engine.clear();
        assert_eq!(engine.allocator().live_allocations(), 0);
    }

    #[test]
    fn far_tier_skips_cells_under_the_near_square() {
        let mut engine = TerrainEngine::new(light_config(), Box::new(HeadlessMeshAllocator::new())).unwrap();
        engine.update(Point3::new(0.0, 0.0, 0.0));
        // Near square spans [-240, 320] on both axes.
        let (min, max) = (-240.0, 320.0);
        for (key, chunk) in engine.far_chunks().iter() {
            let lo = key.origin(chunk.cell_size());
            let hi = (lo.x + chunk.cell_size(), lo.y + chunk.cell_size());
            let inside = lo.x >= min && lo.y >= min && hi.0 <= max && hi.1 <= max;
            assert!(!inside, "far chunk {key} duplicates near coverage");
            assert_eq!(chunk.tier(), Tier::Far);
        }
        assert_eq!(engine.far_chunks().len(), 13 * 13 - 4);
        assert!(engine.near_chunks().iter().all(|(_, chunk)| chunk.tier() == Tier::Near));
    }

    #[test]
    fn sun_is_snapshotted_per_tick() {
        let mut engine = TerrainEngine::new(light_config(), Box::new(HeadlessMeshAllocator::new())).unwrap();
        let lighting = engine.sun_direction().clone();
        assert!(lighting.set(Vector3::new(0.0, 1.0, 0.0)));
        assert_ne!(engine.shading_uniform().sun_direction, [0.0, 1.0, 0.0, 0.0]);

        engine.update(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(engine.shading_uniform().sun_direction, [0.0, 1.0, 0.0, 0.0]);
        assert!(!engine.set_sun_direction(Vector3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn regenerate_rebuilds_with_new_parameters() {
        let mut engine = TerrainEngine::new(light_config(), Box::new(HeadlessMeshAllocator::new())).unwrap();
        engine.update(Point3::new(0.0, 0.0, 0.0));
        let near_before = engine.near_chunks().len();
        let old_height = engine.height(123.0, 45.0);

        let params = HeightfieldParams {
            ridge_height: 80.0,
            biome_threshold: -1.0,
            ..HeightfieldParams::default()
        };
        let report = engine.regenerate(params);
        assert_eq!(report.near.evicted.len(), near_before);
        assert_eq!(report.near.built.len(), near_before);
        assert_ne!(engine.height(123.0, 45.0), old_height);

        let chunk = engine.near_chunks().get(&terrain::grid_index::GridKey::new(0, 0)).unwrap();
        let corner = chunk.mesh().vertices[0];
        assert_eq!(corner.position[1], engine.height(0.0, 0.0) as f32);
    }

    #[test]
    fn grounded_within_threshold() {
        let engine = TerrainEngine::new(light_config(), Box::new(HeadlessMeshAllocator::new())).unwrap();
        let ground = engine.ground_height(12.0, -7.0);
        assert!(engine.is_grounded(Point3::new(12.0, ground + 0.05, -7.0), 0.1));
        assert!(engine.is_grounded(Point3::new(12.0, ground - 3.0, -7.0), 0.1));
        assert!(!engine.is_grounded(Point3::new(12.0, ground + 2.0, -7.0), 0.1));
    }
}
