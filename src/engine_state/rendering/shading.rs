//! Terrain lighting inputs.
//!
//! The sun direction is owned by the lighting subsystem and shared with the
//! terrain system through an [`MtResource`]. Terrain reads it once per tick;
//! the only terrain-side write path is [`SunDirection::set`].

use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};

use crate::core::MtResource;

/// Shared, always-normalized direction towards the sun.
#[derive(Clone, Debug)]
pub struct SunDirection(MtResource<Vector3<f64>>);

impl Default for SunDirection {
    fn default() -> Self {
        Self(MtResource::new(Vector3::new(0.2, 0.8, -0.4).normalize()))
    }
}

impl SunDirection {
    /// Wraps an existing shared vector, normalizing what it holds.
    pub fn from_resource(resource: MtResource<Vector3<f64>>) -> Self {
        let sun = Self(resource);
        let current = sun.get();
        sun.0.set(current);
        sun
    }

    /// Stores `direction` normalized.
    ///
    /// # Returns
    /// `false` (and leaves the old value) for zero-length or non-finite input.
    pub fn set(&self, direction: Vector3<f64>) -> bool {
        let length = direction.magnitude();
        if !length.is_finite() || length <= f64::EPSILON {
            log::warn!("Ignoring degenerate sun direction {:?}", direction);
            return false;
        }
        self.0.set(direction / length);
        true
    }

    /// A copy of the current direction.
    pub fn get(&self) -> Vector3<f64> {
        let direction = self.0.snapshot();
        let length = direction.magnitude();
        if length.is_finite() && length > f64::EPSILON {
            direction / length
        } else {
            Vector3::unit_y()
        }
    }

    /// The shared handle, for handing to the lighting subsystem.
    pub fn resource(&self) -> MtResource<Vector3<f64>> {
        self.0.clone()
    }
}

/// Brightness ranges of the terrain lighting function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainShading {
    /// Multiplier for surfaces facing away from the sun.
    pub shadowed: f64,
    /// Multiplier for surfaces facing the sun head on.
    pub sunlit: f64,
    /// Multiplier for vertical cliffs.
    pub steep: f64,
    /// Multiplier for flat ground.
    pub flat: f64,
}

impl Default for TerrainShading {
    fn default() -> Self {
        Self {
            shadowed: 0.82,
            sunlit: 1.2,
            steep: 0.88,
            flat: 1.05,
        }
    }
}

fn mix(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl TerrainShading {
    /// Brightness factor for a surface with unit normal `normal` under `sun`.
    pub fn light_multiplier(&self, normal: Vector3<f64>, sun: Vector3<f64>) -> f64 {
        let facing = normal.dot(sun).max(0.0);
        let sun_boost = mix(self.shadowed, self.sunlit, facing);
        let slope = mix(self.steep, self.flat, normal.y.clamp(0.0, 1.0));
        sun_boost * slope
    }

    /// Packs the current state for a uniform buffer.
    pub fn uniform(&self, sun: Vector3<f64>) -> TerrainShadingUniform {
        TerrainShadingUniform {
            sun_direction: [sun.x as f32, sun.y as f32, sun.z as f32, 0.0],
            ranges: [
                self.shadowed as f32,
                self.sunlit as f32,
                self.steep as f32,
                self.flat as f32,
            ],
        }
    }
}

/// GPU layout of the terrain lighting inputs.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainShadingUniform {
    /// xyz: unit sun direction, w: unused
    pub sun_direction: [f32; 4],
    /// shadowed, sunlit, steep, flat
    pub ranges: [f32; 4],
}
