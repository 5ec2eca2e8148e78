//! # Task System Core Types
//!
//! ## Core Components
//! - `Task`: a unit of work that runs on a worker thread
//! - `TaskResult`: what the worker hands back to the main thread
//!
//! ## Task Lifecycle
//! 1. The streaming caches create one task per missing cell
//! 2. `TaskManager::run_batch()` spreads them over the workers
//! 3. Each task's `process()` runs on a worker thread
//! 4. The results come back to the main thread, which uploads meshes and
//!    inserts cells before the tick ends
//!
//! ## Thread Safety
//! Tasks own everything they touch (the heightfield is behind an `Arc`), so
//! no two builds share mutable state.

use crate::engine_state::terrain::chunk::{ChunkMesh, Tier};
use crate::engine_state::terrain::grid_index::GridKey;
use crate::engine_state::terrain::vegetation::VegetationCell;

/// A unit of work that can be executed on a worker thread.
///
/// # Implementation Guidelines
/// - Must be `Send` to be transferred between threads
/// - Should own its inputs; no borrowed data crosses the channel
pub trait Task: Send {
    /// Processes the task and returns a result.
    ///
    /// Runs on a background thread, or inline when the pool has no workers.
    fn process(&self) -> TaskResult;
}

/// Output of a finished [`Task`].
#[derive(Debug)]
pub enum TaskResult {
    /// A terrain chunk mesh, ready for upload.
    TerrainMesh {
        tier: Tier,
        key: GridKey,
        mesh: ChunkMesh,
    },
    /// A populated vegetation cell.
    VegetationCell(VegetationCell),
}

impl TaskResult {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            TaskResult::TerrainMesh { tier, key, mesh } => {
                format!("{tier} chunk {key} ({} vertices)", mesh.vertices.len())
            }
            TaskResult::VegetationCell(cell) => {
                format!("vegetation cell {} ({} placements)", cell.key, cell.placements.len())
            }
        }
    }
}
