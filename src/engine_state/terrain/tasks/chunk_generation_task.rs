//! # Chunk Generation Tasks
//!
//! Worker-side halves of the terrain and vegetation builds. Both read the
//! heightfield through a shared `Arc` and touch nothing else.

use std::sync::Arc;

use crate::engine_state::{
    task_management::task::{Task, TaskResult},
    terrain::{
        chunk::{chunk_creation::ChunkMeshBuilder, Tier},
        grid_index::{GridKey, TierParams},
        heightfield::Heightfield,
        vegetation::VegetationGrid,
    },
};

/// Builds the mesh of one terrain chunk.
pub struct ChunkGenerationTask {
    heightfield: Arc<Heightfield>,
    tier: Tier,
    params: TierParams,
    key: GridKey,
}

impl ChunkGenerationTask {
    /// # Arguments
    /// * `heightfield` - Surface to sample
    /// * `tier` - Level of detail being built
    /// * `params` - Cell size and resolution of that tier
    /// * `key` - Cell to build
    pub fn new(heightfield: Arc<Heightfield>, tier: Tier, params: TierParams, key: GridKey) -> Self {
        ChunkGenerationTask {
            heightfield,
            tier,
            params,
            key,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(&self) -> TaskResult {
        let mesh = ChunkMeshBuilder::new(&self.heightfield, &self.params).build(self.key);
        TaskResult::TerrainMesh {
            tier: self.tier,
            key: self.key,
            mesh,
        }
    }
}

/// Places the trees of one vegetation cell.
pub struct VegetationGenerationTask {
    grid: VegetationGrid,
    key: GridKey,
}

impl VegetationGenerationTask {
    pub fn new(grid: VegetationGrid, key: GridKey) -> Self {
        VegetationGenerationTask { grid, key }
    }
}

impl Task for VegetationGenerationTask {
    fn process(&self) -> TaskResult {
        TaskResult::VegetationCell(self.grid.generate_cell(self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::terrain::vegetation::VegetationParams;

    #[test]
    fn chunk_task_matches_direct_build() {
        let ground = Arc::new(Heightfield::default());
        let params = TierParams::far();
        let key = GridKey::new(2, -5);
        let task = ChunkGenerationTask::new(ground.clone(), Tier::Far, params, key);

        match task.process() {
            TaskResult::TerrainMesh { tier, key: built, mesh } => {
                assert_eq!(tier, Tier::Far);
                assert_eq!(built, key);
                assert_eq!(mesh, ChunkMeshBuilder::new(&ground, &params).build(key));
            }
            other => panic!("unexpected result {}", other.describe()),
        }
    }

    #[test]
    fn vegetation_task_matches_direct_generation() {
        let grid = VegetationGrid::new(VegetationParams::default(), Arc::new(Heightfield::default()));
        let key = GridKey::new(-1, 4);
        match VegetationGenerationTask::new(grid.clone(), key).process() {
            TaskResult::VegetationCell(cell) => assert_eq!(cell, grid.generate_cell(key)),
            other => panic!("unexpected result {}", other.describe()),
        }
    }
}
