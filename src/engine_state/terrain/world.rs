//! # World Module
//!
//! Connects the streaming caches to the things that actually build and free
//! chunks: the worker pool, the heightfield and the mesh allocator.
//!
//! ## Architecture
//!
//! [`TerrainLifecycle`] and [`VegetationLifecycle`] are short-lived views
//! borrowed for one update. They fan a tick's builds out over the
//! [`TaskManager`], then finish each result on the calling thread (mesh upload
//! for terrain, nothing for vegetation).

use std::fmt;
use std::sync::Arc;

use super::chunk::{TerrainChunk, Tier};
use super::grid_index::{GridKey, TierParams};
use super::heightfield::Heightfield;
use super::streaming_cache::ChunkLifecycle;
use super::tasks::chunk_generation_task::{ChunkGenerationTask, VegetationGenerationTask};
use super::vegetation::{VegetationCell, VegetationGrid};
use crate::engine_state::rendering::mesh_allocator::{MeshAllocationError, MeshAllocator};
use crate::engine_state::task_management::task::{Task, TaskResult};
use crate::engine_state::task_management::TaskManager;

/// Why a chunk could not be made live this tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkBuildError {
    /// The allocator refused the mesh.
    Allocation(MeshAllocationError),
    /// A worker returned a payload for a different tier or kind.
    UnexpectedResult(String),
}

impl fmt::Display for ChunkBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkBuildError::Allocation(error) => write!(f, "mesh allocation failed: {error}"),
            ChunkBuildError::UnexpectedResult(description) => {
                write!(f, "worker returned {description}")
            }
        }
    }
}

impl std::error::Error for ChunkBuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChunkBuildError::Allocation(error) => Some(error),
            ChunkBuildError::UnexpectedResult(_) => None,
        }
    }
}

impl From<MeshAllocationError> for ChunkBuildError {
    fn from(error: MeshAllocationError) -> Self {
        ChunkBuildError::Allocation(error)
    }
}

/// Builds and frees terrain chunks of one tier.
pub struct TerrainLifecycle<'a> {
    pub tier: Tier,
    pub params: TierParams,
    pub heightfield: &'a Arc<Heightfield>,
    pub allocator: &'a mut dyn MeshAllocator,
    pub task_manager: &'a mut TaskManager,
}

impl TerrainLifecycle<'_> {
    fn finish(&mut self, result: TaskResult) -> (Option<GridKey>, Result<TerrainChunk, ChunkBuildError>) {
        match result {
            TaskResult::TerrainMesh { tier, key, mesh } if tier == self.tier => {
                let label = format!("{tier} {key}");
                let built = self
                    .allocator
                    .allocate(&label, &mesh)
                    .map(|handle| TerrainChunk::new(key, tier, &self.params, mesh, handle))
                    .map_err(ChunkBuildError::from);
                (Some(key), built)
            }
            other => (
                None,
                Err(ChunkBuildError::UnexpectedResult(other.describe())),
            ),
        }
    }
}

impl ChunkLifecycle<TerrainChunk> for TerrainLifecycle<'_> {
    type Error = ChunkBuildError;

    fn create(&mut self, keys: Vec<GridKey>) -> Vec<(GridKey, Result<TerrainChunk, ChunkBuildError>)> {
        let tasks: Vec<Box<dyn Task>> = keys
            .iter()
            .map(|key| {
                Box::new(ChunkGenerationTask::new(
                    self.heightfield.clone(),
                    self.tier,
                    self.params,
                    *key,
                )) as Box<dyn Task>
            })
            .collect();

        let results = self.task_manager.run_batch(tasks);
        let mut built = Vec::with_capacity(results.len());
        for result in results {
            match self.finish(result) {
                (Some(key), outcome) => built.push((key, outcome)),
                (None, Err(error)) => log::error!("{} terrain build: {}", self.tier, error),
                (None, Ok(_)) => {}
            }
        }
        built
    }

    fn destroy(&mut self, key: GridKey, chunk: TerrainChunk) {
        if !self.allocator.release(chunk.handle()) {
            log::error!(
                "{} chunk {} held unknown mesh {}",
                self.tier,
                key,
                chunk.handle()
            );
        }
    }
}

/// Populates vegetation cells. Cells own nothing to free.
pub struct VegetationLifecycle<'a> {
    pub grid: &'a VegetationGrid,
    pub task_manager: &'a mut TaskManager,
}

impl ChunkLifecycle<VegetationCell> for VegetationLifecycle<'_> {
    type Error = ChunkBuildError;

    fn create(&mut self, keys: Vec<GridKey>) -> Vec<(GridKey, Result<VegetationCell, ChunkBuildError>)> {
        let tasks: Vec<Box<dyn Task>> = keys
            .iter()
            .map(|key| Box::new(VegetationGenerationTask::new(self.grid.clone(), *key)) as Box<dyn Task>)
            .collect();

        self.task_manager
            .run_batch(tasks)
            .into_iter()
            .filter_map(|result| match result {
                TaskResult::VegetationCell(cell) => Some((cell.key, Ok(cell))),
                other => {
                    log::error!("vegetation build: worker returned {}", other.describe());
                    None
                }
            })
            .collect()
    }

    fn destroy(&mut self, _key: GridKey, _cell: VegetationCell) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::mesh_allocator::HeadlessMeshAllocator;
    use crate::engine_state::terrain::grid_index::GridIndex;
    use crate::engine_state::terrain::streaming_cache::StreamingCache;
    use crate::engine_state::terrain::vegetation::VegetationParams;

    fn small_near() -> TierParams {
        TierParams {
            cell_size: 80.0,
            resolution: 4,
            view_radius: 1,
        }
    }

    #[test]
    fn eviction_releases_mesh_memory() {
        let heightfield = Arc::new(Heightfield::default());
        let mut allocator = HeadlessMeshAllocator::new();
        let mut task_manager = TaskManager::new(2);
        let params = small_near();
        let mut cache = StreamingCache::new("near", GridIndex::new(params.cell_size, params.view_radius));

        for x in [0.0, 100.0, 300.0, 1000.0] {
            let mut lifecycle = TerrainLifecycle {
                tier: Tier::Near,
                params,
                heightfield: &heightfield,
                allocator: &mut allocator,
                task_manager: &mut task_manager,
            };
            cache.update(x, 0.0, &mut lifecycle);
            assert_eq!(allocator.live_allocations(), cache.len());
        }

        let mut lifecycle = TerrainLifecycle {
            tier: Tier::Near,
            params,
            heightfield: &heightfield,
            allocator: &mut allocator,
            task_manager: &mut task_manager,
        };
        cache.clear(&mut lifecycle);
        assert_eq!(allocator.live_allocations(), 0);
        assert_eq!(allocator.allocated_bytes(), 0);
    }

    #[test]
    fn budget_failures_leave_holes_that_fill_later() {
        let heightfield = Arc::new(Heightfield::default());
        let params = small_near();
        let one_chunk = {
            let mesh = crate::engine_state::terrain::chunk::chunk_creation::ChunkMeshBuilder::new(
                &heightfield,
                &params,
            )
            .build(GridKey::new(0, 0));
            mesh.byte_size()
        };
        let mut allocator = HeadlessMeshAllocator::with_budget(one_chunk * 4);
        let mut task_manager = TaskManager::new(0);
        let mut cache = StreamingCache::new("near", GridIndex::new(params.cell_size, params.view_radius));

        let mut lifecycle = TerrainLifecycle {
            tier: Tier::Near,
            params,
            heightfield: &heightfield,
            allocator: &mut allocator,
            task_manager: &mut task_manager,
        };
        let report = cache.update(0.0, 0.0, &mut lifecycle);
        assert_eq!(report.built.len(), 4);
        assert_eq!(report.failed.len(), 5);
        assert!(cache.contains(&GridKey::new(0, 0)));

        allocator.set_budget(None);
        let mut lifecycle = TerrainLifecycle {
            tier: Tier::Near,
            params,
            heightfield: &heightfield,
            allocator: &mut allocator,
            task_manager: &mut task_manager,
        };
        let report = cache.update(0.0, 0.0, &mut lifecycle);
        assert_eq!(report.built.len(), 5);
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn vegetation_cells_stream_with_the_viewer() {
        let grid = VegetationGrid::new(VegetationParams::default(), Arc::new(Heightfield::default()));
        let mut task_manager = TaskManager::new(2);
        let mut cache = StreamingCache::new("vegetation", grid.grid_index());

        let mut lifecycle = VegetationLifecycle {
            grid: &grid,
            task_manager: &mut task_manager,
        };
        let report = cache.update(0.0, 0.0, &mut lifecycle);
        assert_eq!(report.built.len(), 81);

        let report = cache.update(95.0, 0.0, &mut lifecycle);
        assert_eq!(report.built.len(), 9);
        assert_eq!(report.evicted.len(), 9);
        let key = GridKey::new(5, 0);
        assert_eq!(cache.get(&key), Some(&grid.generate_cell(key)));
    }
}
