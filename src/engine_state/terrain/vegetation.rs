//! # Vegetation Module
//!
//! Scatters trees over the terrain on a coarse grid of its own.
//!
//! Vegetation streams exactly like terrain (same grid index, same cache) but
//! a cell's payload is a list of [`Placement`]s instead of a mesh. Cells own no
//! GPU memory; the instancing renderer turns placements into draw data.
//!
//! Every decision (tree count, clearing, jitter, shape, yaw) is a coordinate
//! hash, so a cell regenerated after eviction holds the same trees.

use std::f64::consts::TAU;
use std::sync::Arc;

use cgmath::{InnerSpace, Point3, Vector2};
use serde::{Deserialize, Serialize};

use super::grid_index::{GridIndex, GridKey};
use super::heightfield::Heightfield;
use super::noise_kernel::hash;

/// Layout and wind parameters of the vegetation grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationParams {
    pub cell_size: f64,
    pub view_radius: u32,
    /// Trees in a cell of zero forest density.
    pub min_trees: u32,
    /// Trees in a cell of full forest density.
    pub max_trees: u32,
    /// Cells whose clearing hash exceeds this are thinned out.
    pub clearing_threshold: f64,
    /// Tree count multiplier applied to thinned cells.
    pub clearing_multiplier: f64,
    /// Trees below this height are dropped.
    pub min_height: f64,
    /// Forest density below which trees may be dropped.
    pub sparse_density: f64,
    /// In sparse forest, trees whose hash exceeds this are dropped.
    pub sparse_rejection: f64,
    /// Horizontal wind direction (x, z). Normalized on use.
    pub wind_direction: [f64; 2],
    pub wind_strength: f64,
}

impl Default for VegetationParams {
    fn default() -> Self {
        Self {
            cell_size: 90.0,
            view_radius: 4,
            min_trees: 8,
            max_trees: 38,
            clearing_threshold: 0.83,
            clearing_multiplier: 0.28,
            min_height: -2.0,
            sparse_density: 0.22,
            sparse_rejection: 0.35,
            wind_direction: [1.0, 0.38],
            wind_strength: 0.12,
        }
    }
}

impl VegetationParams {
    /// Unit wind direction, or `+x` when the configured vector is degenerate.
    pub fn wind(&self) -> Vector2<f64> {
        let direction = Vector2::new(self.wind_direction[0], self.wind_direction[1]);
        let length = direction.magnitude();
        if length.is_finite() && length > f64::EPSILON {
            direction / length
        } else {
            Vector2::unit_x()
        }
    }

    /// Horizontal leaf displacement at `local` (relative to the tree base)
    /// `time` seconds into the simulation.
    ///
    /// Sway grows linearly with height up to 14 units and is zero at the base.
    pub fn wind_sway(&self, local: Point3<f64>, time: f64) -> Vector2<f64> {
        let bend = (local.y / 14.0).clamp(0.0, 1.0);
        let gust = (time * 1.75 + local.x * 0.9 + local.z * 0.7).sin() * 0.65
            + (time * 3.2 + local.x * 2.1 + local.z * 1.8).sin() * 0.35;
        self.wind() * (gust * self.wind_strength * bend)
    }
}

/// One cone of a tree crown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrownLayer {
    pub radius: f64,
    pub height: f64,
    /// Height of the cone's center above the tree base.
    pub center_y: f64,
}

/// Dimensions of one conifer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeShape {
    pub trunk_height: f64,
    /// Radius at the base; the top is three quarters of this.
    pub trunk_radius: f64,
    pub crown_height: f64,
    pub crown_radius: f64,
}

impl TreeShape {
    /// Derives a shape from two seeds in `[0, 1)`.
    pub fn from_seeds(seed_a: f64, seed_b: f64) -> Self {
        TreeShape {
            trunk_height: 7.4 + seed_a * 4.2,
            trunk_radius: 0.24 + seed_b * 0.14,
            crown_height: 4.2 + seed_b * 2.0,
            crown_radius: 2.4 + seed_a,
        }
    }

    pub fn trunk_top_radius(&self) -> f64 {
        self.trunk_radius * 0.75
    }

    /// Base, middle and top crown cones, bottom up.
    pub fn crown_layers(&self) -> [CrownLayer; 3] {
        let (r, h, t) = (self.crown_radius, self.crown_height, self.trunk_height);
        [
            CrownLayer {
                radius: r,
                height: h,
                center_y: t + h * 0.42,
            },
            CrownLayer {
                radius: r * 0.78,
                height: h * 0.85,
                center_y: t + h * 0.84,
            },
            CrownLayer {
                radius: r * 0.5,
                height: h * 0.65,
                center_y: t + h * 1.17,
            },
        ]
    }

    /// Height of the highest crown tip above the base.
    pub fn total_height(&self) -> f64 {
        self.crown_layers()
            .iter()
            .map(|layer| layer.center_y + layer.height * 0.5)
            .fold(self.trunk_height, f64::max)
    }
}

/// One tree instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Base of the trunk, on the ground.
    pub position: Point3<f64>,
    /// Rotation about the vertical axis, radians in `[0, 2π)`.
    pub yaw: f64,
    pub shape: TreeShape,
}

/// The trees of one vegetation cell.
#[derive(Clone, Debug, PartialEq)]
pub struct VegetationCell {
    pub key: GridKey,
    pub placements: Vec<Placement>,
}

/// Deterministic tree placement over a heightfield.
#[derive(Clone, Debug)]
pub struct VegetationGrid {
    params: VegetationParams,
    heightfield: Arc<Heightfield>,
}

impl VegetationGrid {
    pub fn new(params: VegetationParams, heightfield: Arc<Heightfield>) -> Self {
        Self {
            params,
            heightfield,
        }
    }

    pub fn params(&self) -> &VegetationParams {
        &self.params
    }

    pub fn heightfield(&self) -> &Arc<Heightfield> {
        &self.heightfield
    }

    /// Grid index for streaming vegetation cells.
    pub fn grid_index(&self) -> GridIndex {
        GridIndex::new(self.params.cell_size, self.params.view_radius)
    }

    /// Forest density in `[0, 1]` at a world coordinate.
    pub fn forest_density(&self, x: f64, z: f64) -> f64 {
        let broad = hash(x * 0.0013, z * 0.0013);
        let medium = hash(x * 0.0058 + 17.1, z * 0.0058 + 9.4);
        let local = hash(x * 0.022 + 3.8, z * 0.022 + 5.1);
        (broad * 0.55 + medium * 0.35 + local * 0.1).clamp(0.0, 1.0)
    }

    /// Whether the cell is a thinned-out clearing.
    pub fn is_clearing(&self, key: GridKey) -> bool {
        let (cx, cz) = (key.cx as f64, key.cz as f64);
        hash(cx * 0.47 + 10.2, cz * 0.63 + 11.1) > self.params.clearing_threshold
    }

    /// Number of placement attempts in a cell, before height and sparse
    /// forest rejection.
    pub fn candidate_count(&self, key: GridKey) -> u32 {
        let p = &self.params;
        let anchor = key.origin(p.cell_size);
        let density = self.forest_density(anchor.x, anchor.y);
        let multiplier = if self.is_clearing(key) {
            p.clearing_multiplier
        } else {
            1.0
        };
        let span = p.max_trees.saturating_sub(p.min_trees) as f64;
        let count = ((p.min_trees as f64 + density * span) * multiplier).floor();
        count.max(0.0) as u32
    }

    /// Places the trees of one cell.
    ///
    /// Trees scatter within half a cell of the cell's lattice point
    /// `key * cell_size`.
    pub fn generate_cell(&self, key: GridKey) -> VegetationCell {
        let p = &self.params;
        let anchor = key.origin(p.cell_size);
        let half = p.cell_size * 0.5;
        let (cx, cz) = (key.cx as f64, key.cz as f64);

        let count = self.candidate_count(key);
        let mut placements = Vec::with_capacity(count as usize);

        for i in 0..count {
            let i = i as f64;
            let rx = hash(cx * 17.7 + i * 11.3, cz * 13.1 + i * 5.2);
            let rz = hash(cx * 9.4 + i * 7.1, cz * 19.5 + i * 3.4);
            let x = anchor.x + (rx * 2.0 - 1.0) * half;
            let z = anchor.y + (rz * 2.0 - 1.0) * half;

            let y = self.heightfield.height(x, z);
            if y < p.min_height {
                continue;
            }
            if self.forest_density(x, z) < p.sparse_density
                && hash(x * 0.11, z * 0.11) > p.sparse_rejection
            {
                continue;
            }

            let seed_a = hash(cx * 21.3 + i, cz * 8.7 + i * 2.0);
            let seed_b = hash(cx * 3.2 + i * 2.5, cz * 4.1 + i * 1.3);
            placements.push(Placement {
                position: Point3::new(x, y, z),
                yaw: hash(x * 0.08 + 3.0, z * 0.08 + 2.0) * TAU,
                shape: TreeShape::from_seeds(seed_a, seed_b),
            });
        }

        VegetationCell { key, placements }
    }
}
