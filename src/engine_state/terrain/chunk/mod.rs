//! # Chunk Module
//!
//! A terrain chunk is one grid cell of one level of detail: a displaced
//! `resolution x resolution` quad grid plus the allocator handle its geometry
//! was uploaded under.
//!
//! ## Lifecycle
//!
//! Chunks are immutable once built. A chunk is reproducible from its key, its
//! tier parameters and the heightfield alone, so regenerating the world is a
//! full destroy-then-rebuild rather than an in-place edit.

use cgmath::Point2;

use super::grid_index::{GridKey, TierParams};
use crate::engine_state::rendering::mesh_allocator::MeshHandle;
use crate::engine_state::rendering::vertex::TerrainVertex;

pub mod chunk_creation;

/// Level of detail a chunk belongs to.
///
/// Near and far chunks live in separate keyspaces with different cell sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    Near,
    Far,
}

impl Tier {
    /// Whether the renderer should draw this tier into the shadow map.
    pub fn casts_shadow(&self) -> bool {
        matches!(self, Tier::Near)
    }

    /// Whether the renderer should sample the shadow map on this tier.
    pub fn receives_shadow(&self) -> bool {
        matches!(self, Tier::Near)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Near => "near",
            Tier::Far => "far",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// CPU-side geometry of one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkMesh {
    /// `(resolution + 1)²` vertices, row-major with x varying fastest.
    pub vertices: Vec<TerrainVertex>,
    /// Two counter-clockwise triangles per quad.
    pub indices: Vec<u32>,
    /// Quads per cell edge.
    pub resolution: u32,
}

impl ChunkMesh {
    /// Bytes needed to upload both buffers.
    pub fn byte_size(&self) -> u64 {
        (std::mem::size_of_val(self.vertices.as_slice())
            + std::mem::size_of_val(self.indices.as_slice())) as u64
    }

    /// Vertices per grid row.
    pub fn row_length(&self) -> usize {
        self.resolution as usize + 1
    }

    /// The vertex at grid position `(i, j)`, `i` along x and `j` along z.
    pub fn vertex_at(&self, i: usize, j: usize) -> Option<&TerrainVertex> {
        let row = self.row_length();
        if i >= row || j >= row {
            return None;
        }
        self.vertices.get(j * row + i)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A live terrain chunk.
#[derive(Debug)]
pub struct TerrainChunk {
    key: GridKey,
    tier: Tier,
    cell_size: f64,
    mesh: ChunkMesh,
    handle: MeshHandle,
}

impl TerrainChunk {
    /// Wraps a built mesh and the handle its buffers were allocated under.
    pub fn new(key: GridKey, tier: Tier, params: &TierParams, mesh: ChunkMesh, handle: MeshHandle) -> Self {
        TerrainChunk {
            key,
            tier,
            cell_size: params.cell_size,
            mesh,
            handle,
        }
    }

    pub fn key(&self) -> GridKey {
        self.key
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// World-space corner of the chunk.
    pub fn origin(&self) -> Point2<f64> {
        self.key.origin(self.cell_size)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    pub fn handle(&self) -> MeshHandle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_near_chunks_take_part_in_shadows() {
        assert!(Tier::Near.casts_shadow());
        assert!(Tier::Near.receives_shadow());
        assert!(!Tier::Far.casts_shadow());
        assert!(!Tier::Far.receives_shadow());
    }

    #[test]
    fn byte_size_counts_both_buffers() {
        let mesh = ChunkMesh {
            vertices: vec![<TerrainVertex as bytemuck::Zeroable>::zeroed(); 4],
            indices: vec![0, 2, 1, 1, 2, 3],
            resolution: 1,
        };
        assert_eq!(mesh.byte_size(), 4 * 24 + 6 * 4);
        assert!(mesh.vertex_at(1, 1).is_some());
        assert!(mesh.vertex_at(2, 0).is_none());
    }
}
