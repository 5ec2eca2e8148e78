//! # Chunk Creation Module
//!
//! Builds the displaced vertex grid of one chunk.
//!
//! ## Apron
//!
//! Heights are sampled on a `(resolution + 3)²` grid: the chunk's own
//! `(resolution + 1)²` vertices plus a one-vertex ring around them. Normals
//! come from central differences over that grid, so an edge vertex sees the
//! same neighbours whichever of the two adjacent chunks builds it.
//!
//! Vertex coordinates are computed as `(cx + i / resolution) * cell_size`, so
//! the shared edge of two neighbouring chunks produces bit-identical positions.

use cgmath::{InnerSpace, Point3, Vector3};

use super::ChunkMesh;
use crate::engine_state::rendering::vertex::TerrainVertex;
use crate::engine_state::terrain::grid_index::{GridKey, TierParams};
use crate::engine_state::terrain::heightfield::Heightfield;

/// Builds chunk meshes of one tier against one heightfield.
pub struct ChunkMeshBuilder<'a> {
    heightfield: &'a Heightfield,
    cell_size: f64,
    resolution: u32,
}

impl<'a> ChunkMeshBuilder<'a> {
    /// # Arguments
    /// * `heightfield` - Surface to sample
    /// * `params` - Cell size and resolution of the tier being built
    pub fn new(heightfield: &'a Heightfield, params: &TierParams) -> Self {
        ChunkMeshBuilder {
            heightfield,
            cell_size: params.cell_size,
            resolution: params.resolution.max(1),
        }
    }

    /// World coordinate of grid line `i` of cell `c`. `i` may step one line
    /// outside the cell for the apron.
    #[inline]
    fn grid_coordinate(&self, c: i32, i: i64) -> f64 {
        (c as f64 + i as f64 / self.resolution as f64) * self.cell_size
    }

    /// Builds the mesh for `key`.
    ///
    /// # Returns
    /// A [`ChunkMesh`] with `(resolution + 1)²` vertices and
    /// `6 * resolution²` indices.
    pub fn build(&self, key: GridKey) -> ChunkMesh {
        let res = self.resolution as usize;
        let row = res + 1;
        let apron_row = res + 3;

        let xs: Vec<f64> = (-1..=res as i64 + 1)
            .map(|i| self.grid_coordinate(key.cx, i))
            .collect();
        let zs: Vec<f64> = (-1..=res as i64 + 1)
            .map(|j| self.grid_coordinate(key.cz, j))
            .collect();

        let mut heights = Vec::with_capacity(apron_row * apron_row);
        for z in &zs {
            for x in &xs {
                heights.push(self.heightfield.height(*x, *z));
            }
        }
        let h = |i: usize, j: usize| heights[j * apron_row + i];

        let spacing = self.cell_size / self.resolution as f64;
        let mut vertices = Vec::with_capacity(row * row);
        for j in 0..row {
            for i in 0..row {
                // (i, j) in chunk space is (i + 1, j + 1) in apron space.
                let (ai, aj) = (i + 1, j + 1);
                let dh_dx = (h(ai + 1, aj) - h(ai - 1, aj)) / (2.0 * spacing);
                let dh_dz = (h(ai, aj + 1) - h(ai, aj - 1)) / (2.0 * spacing);
                let normal = Vector3::new(-dh_dx, 1.0, -dh_dz).normalize();

                let position = Point3::new(xs[ai], h(ai, aj), zs[aj]);
                vertices.push(TerrainVertex::new(position, normal));
            }
        }

        let mut indices = Vec::with_capacity(res * res * 6);
        for j in 0..res {
            for i in 0..res {
                let a = (j * row + i) as u32;
                let b = a + 1;
                let c = a + row as u32;
                let d = c + 1;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        ChunkMesh {
            vertices,
            indices,
            resolution: self.resolution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::terrain::heightfield::HeightfieldParams;

    fn small_tier() -> TierParams {
        TierParams {
            cell_size: 80.0,
            resolution: 8,
            view_radius: 1,
        }
    }

    #[test]
    fn vertex_and_index_counts() {
        let ground = Heightfield::default();
        let mesh = ChunkMeshBuilder::new(&ground, &TierParams::near()).build(GridKey::new(0, 0));
        assert_eq!(mesh.vertices.len(), 57 * 57);
        assert_eq!(mesh.indices.len(), 56 * 56 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn vertices_sit_on_the_heightfield() {
        let ground = Heightfield::default();
        let tier = small_tier();
        let key = GridKey::new(-3, 5);
        let mesh = ChunkMeshBuilder::new(&ground, &tier).build(key);

        let origin = key.origin(tier.cell_size);
        let corner = mesh.vertex_at(0, 0).unwrap();
        assert_eq!(corner.position[0], origin.x as f32);
        assert_eq!(corner.position[2], origin.y as f32);

        for v in mesh.vertices.iter().step_by(7) {
            let expected = ground.height(v.position[0] as f64, v.position[2] as f64);
            assert!((v.position[1] as f64 - expected).abs() < 1e-2);
        }
    }

    #[test]
    fn shared_edges_are_seamless() {
        let ground = Heightfield::default();
        let tier = small_tier();
        let builder = ChunkMeshBuilder::new(&ground, &tier);
        let res = tier.resolution as usize;

        let left = builder.build(GridKey::new(2, -1));
        let right = builder.build(GridKey::new(3, -1));
        for j in 0..=res {
            let a = left.vertex_at(res, j).unwrap();
            let b = right.vertex_at(0, j).unwrap();
            assert_eq!(a.position, b.position);
            for k in 0..3 {
                assert!((a.normal[k] - b.normal[k]).abs() < 1e-4);
            }
        }

        let below = builder.build(GridKey::new(2, -2));
        for i in 0..=res {
            let a = below.vertex_at(i, res).unwrap();
            let b = left.vertex_at(i, 0).unwrap();
            assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn normals_are_unit_and_point_up() {
        let ground = Heightfield::default();
        let mesh = ChunkMeshBuilder::new(&ground, &small_tier()).build(GridKey::new(7, 7));
        for v in &mesh.vertices {
            let n = v.normal();
            assert!((n.magnitude() - 1.0).abs() < 1e-5);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn flat_ground_has_vertical_normals() {
        let flat = Heightfield::new(HeightfieldParams {
            plains_medium_amplitude: 0.0,
            plains_detail_amplitude: 0.0,
            biome_threshold: 2.0,
            mound_base_height: 0.0,
            pit_base_depth: 0.0,
            ..HeightfieldParams::default()
        });
        let mesh = ChunkMeshBuilder::new(&flat, &small_tier()).build(GridKey::new(0, 0));
        for v in &mesh.vertices {
            assert_eq!(v.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn triangles_wind_counter_clockwise_from_above() {
        let ground = Heightfield::default();
        let mesh = ChunkMeshBuilder::new(&ground, &small_tier()).build(GridKey::new(0, 0));
        for tri in mesh.indices.chunks_exact(3) {
            let p = |i: u32| {
                let v = mesh.vertices[i as usize].position;
                Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
            };
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            assert!((b - a).cross(c - a).y > 0.0);
        }
    }

    #[test]
    fn builds_are_reproducible() {
        let ground = Heightfield::default();
        let tier = TierParams::far();
        let a = ChunkMeshBuilder::new(&ground, &tier).build(GridKey::new(-4, 9));
        let b = ChunkMeshBuilder::new(&ground, &tier).build(GridKey::new(-4, 9));
        assert_eq!(a, b);
    }
}
