//! # Chunk Grid Index
//!
//! Maps a continuous viewer position to the integer grid cells that must be
//! live around it.
//!
//! Each tier (near terrain, far terrain, vegetation) owns its own [`GridIndex`].
//! Keys from different tiers live in separate keyspaces and are never compared.
//!
//! ## Boundary Policy
//!
//! Cell lookup is floor division, so a viewer exactly on a cell boundary
//! belongs to the higher-index cell. Building and eviction both go through
//! [`GridIndex::needed_set`]; there is no second rounding rule to drift out of
//! sync with.

use cgmath::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Upper bound on the key capacity reserved up front by a needed-set.
const MAX_PREALLOCATED_KEYS: usize = 1 << 16;

/// Integer coordinate of a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridKey {
    pub cx: i32,
    pub cz: i32,
}

impl GridKey {
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    /// World-space corner of this cell (its minimum x and z).
    pub fn origin(&self, cell_size: f64) -> Point2<f64> {
        Point2::new(self.cx as f64 * cell_size, self.cz as f64 * cell_size)
    }

    /// World-space center of this cell.
    pub fn center(&self, cell_size: f64) -> Point2<f64> {
        Point2::new(
            (self.cx as f64 + 0.5) * cell_size,
            (self.cz as f64 + 0.5) * cell_size,
        )
    }

    /// The cell of size `cell_size` containing `(x, z)`.
    ///
    /// Non-finite coordinates map to the origin cell. Coordinates beyond the
    /// `i32` range saturate.
    pub fn containing(x: f64, z: f64, cell_size: f64) -> Self {
        let index = |v: f64| {
            if v.is_finite() {
                // `as` saturates on overflow.
                (v / cell_size).floor() as i32
            } else {
                0
            }
        };
        Self::new(index(x), index(z))
    }

    /// Chebyshev distance in cells.
    pub fn ring_distance(&self, other: &GridKey) -> u32 {
        let dx = (self.cx as i64 - other.cx as i64).unsigned_abs();
        let dz = (self.cz as i64 - other.cz as i64).unsigned_abs();
        dx.max(dz) as u32
    }
}

impl std::fmt::Display for GridKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.cx, self.cz)
    }
}

/// Size and extent of one terrain level of detail.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TierParams {
    /// World units per cell edge.
    pub cell_size: f64,
    /// Quads per cell edge.
    pub resolution: u32,
    /// Cells kept live on each side of the viewer cell.
    pub view_radius: u32,
}

impl TierParams {
    /// Small, detailed cells around the viewer.
    pub const fn near() -> Self {
        Self {
            cell_size: 80.0,
            resolution: 56,
            view_radius: 3,
        }
    }

    /// Large, coarse cells out to the horizon.
    pub const fn far() -> Self {
        Self {
            cell_size: 200.0,
            resolution: 14,
            view_radius: 6,
        }
    }
}

/// Which cells a tier leaves out of its needed-set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Exclusion {
    /// Drop cells whose center lies closer than this to the viewer.
    Radius(f64),
    /// Drop cells lying entirely inside the live square of a finer tier with
    /// this cell size and view radius.
    Covered { cell_size: f64, view_radius: u32 },
}

impl Exclusion {
    /// Drop cells the tier `params` already covers.
    pub fn covered_by(params: &TierParams) -> Self {
        Exclusion::Covered {
            cell_size: params.cell_size,
            view_radius: params.view_radius,
        }
    }
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::Radius(radius) => write!(f, "radius {radius:.1}"),
            Exclusion::Covered { cell_size, view_radius } => {
                write!(f, "covered by {cell_size} cells (r={view_radius})")
            }
        }
    }
}

/// Computes the needed-set of one tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridIndex {
    cell_size: f64,
    view_radius: u32,
    exclusion: Option<Exclusion>,
}

impl GridIndex {
    /// An index with no exclusion band.
    pub fn new(cell_size: f64, view_radius: u32) -> Self {
        Self {
            cell_size,
            view_radius,
            exclusion: None,
        }
    }

    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusion = Some(exclusion);
        self
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn view_radius(&self) -> u32 {
        self.view_radius
    }

    pub fn exclusion(&self) -> Option<Exclusion> {
        self.exclusion
    }

    /// The cell containing the viewer.
    pub fn cell_of(&self, x: f64, z: f64) -> GridKey {
        GridKey::containing(x, z, self.cell_size)
    }

    /// World-space square `(min, max)` spanned by the full needed-set square
    /// for a viewer at `(x, z)`, ignoring any exclusion.
    pub fn live_bounds(&self, x: f64, z: f64) -> (Point2<f64>, Point2<f64>) {
        let center = self.cell_of(x, z);
        let r = self.view_radius as f64;
        let min = Point2::new(
            (center.cx as f64 - r) * self.cell_size,
            (center.cz as f64 - r) * self.cell_size,
        );
        let max = Point2::new(
            (center.cx as f64 + r + 1.0) * self.cell_size,
            (center.cz as f64 + r + 1.0) * self.cell_size,
        );
        (min, max)
    }

    /// Every key that must be live for a viewer at `(x, z)`.
    ///
    /// Without an exclusion band this is the `(2r + 1)²` square centered on the
    /// viewer cell.
    pub fn needed_set(&self, x: f64, z: f64) -> HashSet<GridKey> {
        let center = self.cell_of(x, z);
        let r = self.view_radius as i64;
        let side = usize::try_from(2 * r + 1).unwrap_or(usize::MAX);
        let capacity = side.saturating_mul(side).min(MAX_PREALLOCATED_KEYS);
        let mut needed = HashSet::with_capacity(capacity);

        let (vx, vz) = (
            if x.is_finite() { x } else { 0.0 },
            if z.is_finite() { z } else { 0.0 },
        );
        let covered = match self.exclusion {
            Some(Exclusion::Covered { cell_size, view_radius }) => {
                Some(GridIndex::new(cell_size, view_radius).live_bounds(x, z))
            }
            _ => None,
        };

        for dz in -r..=r {
            for dx in -r..=r {
                let (Ok(cx), Ok(cz)) = (
                    i32::try_from(center.cx as i64 + dx),
                    i32::try_from(center.cz as i64 + dz),
                ) else {
                    continue;
                };
                let key = GridKey::new(cx, cz);

                if let Some(Exclusion::Radius(radius)) = self.exclusion {
                    let c = key.center(self.cell_size);
                    let distance = (c.x - vx).hypot(c.y - vz);
                    if distance < radius {
                        continue;
                    }
                }

                if let Some((min, max)) = covered {
                    let lo = key.origin(self.cell_size);
                    let hi = lo + Vector2::new(self.cell_size, self.cell_size);
                    if lo.x >= min.x && lo.y >= min.y && hi.x <= max.x && hi.y <= max.y {
                        continue;
                    }
                }

                needed.insert(key);
            }
        }

        needed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_tier_needs_a_full_square() {
        let index = GridIndex::new(80.0, 3);
        let needed = index.needed_set(0.0, 0.0);
        assert_eq!(needed.len(), 49);
        for cx in -3..=3 {
            for cz in -3..=3 {
                assert!(needed.contains(&GridKey::new(cx, cz)));
            }
        }
    }

    #[test]
    fn needed_set_includes_viewer_cell() {
        let index = GridIndex::new(80.0, 2);
        for (x, z) in [(0.0, 0.0), (-1.0, 79.9), (1234.5, -987.6)] {
            assert!(index.needed_set(x, z).contains(&index.cell_of(x, z)));
        }
    }

    #[test]
    fn boundary_belongs_to_higher_cell() {
        assert_eq!(GridKey::containing(80.0, 0.0, 80.0), GridKey::new(1, 0));
        assert_eq!(GridKey::containing(79.999, 0.0, 80.0), GridKey::new(0, 0));
        assert_eq!(GridKey::containing(-0.001, -80.0, 80.0), GridKey::new(-1, -1));
    }

    #[test]
    fn non_finite_viewer_maps_to_origin_cell() {
        assert_eq!(GridKey::containing(f64::NAN, f64::INFINITY, 80.0), GridKey::new(0, 0));
        assert_eq!(GridIndex::new(80.0, 1).needed_set(f64::NAN, 0.0).len(), 9);
    }

    #[test]
    fn center_and_origin_are_half_a_cell_apart() {
        let key = GridKey::new(-2, 3);
        let origin = key.origin(80.0);
        let center = key.center(80.0);
        assert_eq!(origin, Point2::new(-160.0, 240.0));
        assert_eq!(center, Point2::new(-120.0, 280.0));
    }

    #[test]
    fn radius_exclusion_removes_cells_near_the_viewer() {
        let far = TierParams::far();
        let index = GridIndex::new(far.cell_size, far.view_radius).with_exclusion(Exclusion::Radius(336.0));

        let needed = index.needed_set(0.0, 0.0);
        assert!(!needed.contains(&GridKey::new(0, 0)));
        assert!(!needed.contains(&GridKey::new(-1, -1)));
        assert!(needed.contains(&GridKey::new(6, 6)));
        for key in &needed {
            let c = key.center(far.cell_size);
            assert!(c.x.hypot(c.y) >= 336.0);
        }
        assert!(needed.len() < 13 * 13);
    }

    #[test]
    fn live_bounds_span_the_needed_square() {
        let (min, max) = GridIndex::new(80.0, 3).live_bounds(10.0, -5.0);
        assert_eq!(min, Point2::new(-240.0, -320.0));
        assert_eq!(max, Point2::new(320.0, 240.0));
    }

    #[test]
    fn covered_exclusion_drops_only_fully_covered_cells() {
        let near = TierParams::near();
        let far = TierParams::far();
        let index = GridIndex::new(far.cell_size, far.view_radius).with_exclusion(Exclusion::covered_by(&near));

        // Near square at the origin spans [-240, 320] on both axes.
        let needed = index.needed_set(0.0, 0.0);
        for key in [GridKey::new(-1, -1), GridKey::new(0, 0), GridKey::new(-1, 0), GridKey::new(0, -1)] {
            assert!(!needed.contains(&key), "{key} lies inside the near square");
        }
        // Straddles the near edge at 320.
        assert!(needed.contains(&GridKey::new(1, 0)));
        assert!(needed.contains(&GridKey::new(-2, -2)));
        assert_eq!(needed.len(), 13 * 13 - 4);
    }

    #[test]
    fn covered_exclusion_leaves_no_gap() {
        let near = TierParams::near();
        let far = TierParams::far();
        let near_index = GridIndex::new(near.cell_size, near.view_radius);
        let far_index = GridIndex::new(far.cell_size, far.view_radius).with_exclusion(Exclusion::covered_by(&near));

        for (vx, vz) in [(0.0, 0.0), (79.0, 79.0), (-130.0, 260.0), (410.0, -45.0)] {
            let near_keys = near_index.needed_set(vx, vz);
            let far_keys = far_index.needed_set(vx, vz);
            let (far_min, far_max) = far_index.live_bounds(vx, vz);

            // Offsets of 5 keep samples off every cell edge.
            let mut x = far_min.x + 5.0;
            while x < far_max.x {
                let mut z = far_min.y + 5.0;
                while z < far_max.y {
                    let in_near = near_keys.contains(&GridKey::containing(x, z, near.cell_size));
                    let in_far = far_keys.contains(&GridKey::containing(x, z, far.cell_size));
                    assert!(in_near || in_far, "({x}, {z}) uncovered for viewer ({vx}, {vz})");
                    z += 10.0;
                }
                x += 10.0;
            }
        }
    }

    #[test]
    fn aligned_tiers_cover_every_point_exactly_once() {
        let near = GridIndex::new(100.0, 1);
        let far = GridIndex::new(100.0, 4).with_exclusion(Exclusion::Covered {
            cell_size: 100.0,
            view_radius: 1,
        });

        let near_keys = near.needed_set(30.0, -70.0);
        let far_keys = far.needed_set(30.0, -70.0);
        assert_eq!(far_keys.len(), 81 - 9);

        for i in 0..90 {
            for j in 0..90 {
                let x = -400.0 + 5.0 + i as f64 * 10.0;
                let z = -500.0 + 5.0 + j as f64 * 10.0;
                let key = GridKey::containing(x, z, 100.0);
                let count = near_keys.contains(&key) as u32 + far_keys.contains(&key) as u32;
                assert_eq!(count, 1, "({x}, {z}) covered {count} times");
            }
        }
    }

    #[test]
    fn ring_distance_is_chebyshev() {
        let a = GridKey::new(0, 0);
        assert_eq!(a.ring_distance(&GridKey::new(3, -1)), 3);
        assert_eq!(a.ring_distance(&GridKey::new(-2, 2)), 2);
        assert_eq!(a.ring_distance(&a), 0);
    }

    #[test]
    fn extreme_viewer_does_not_overflow() {
        let index = GridIndex::new(1.0, 2);
        let needed = index.needed_set(1e300, 1e300);
        assert!(!needed.is_empty());
        assert!(needed.contains(&GridKey::new(i32::MAX, i32::MAX)));
    }
}
