//! # Heightfield Module
//!
//! Composes the noise kernel into a single terrain height per world coordinate.
//!
//! ## Layers
//!
//! 1. A low-frequency biome signal decides where plains turn into mountains.
//! 2. Plains are gentle rolling noise built from a medium and a fine fBm signal.
//! 3. Mountains combine a sharpened low-frequency body with ridged noise.
//! 4. Isolated mounds are added and pits subtracted, both scaled by the biome
//!    blend so mountainous ground gets more dramatic secondary relief.
//!
//! ## Determinism
//!
//! [`Heightfield::height`] is a pure function of `(x, z)` and the parameters.
//! Chunks, vegetation placement and spawn search all sample it independently
//! and agree on the same ground surface.

use noise::NoiseFn;
use serde::{Deserialize, Serialize};

use super::noise_kernel::{saturate, smoothstep, FractalNoise, RidgedNoise};

/// Tunable constants of the height function.
///
/// The defaults give the stock terrain. Every mask threshold `t`
/// ramps over `[t, 1]` except the biome window, which has its own width.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightfieldParams {
    pub biome_frequency: f64,
    pub biome_octaves: u32,
    /// Biome signal value where mountains start to appear.
    pub biome_threshold: f64,
    /// Width of the biome window above the threshold.
    pub biome_transition_width: f64,
    /// Exponent applied to the smoothstepped blend; larger is a sharper edge.
    pub biome_sharpness: f64,

    pub low_frequency: f64,
    pub low_octaves: u32,
    pub medium_frequency: f64,
    pub medium_octaves: u32,
    pub detail_frequency: f64,
    pub detail_octaves: u32,
    pub ridge_frequency: f64,
    pub ridge_octaves: u32,

    pub plains_medium_amplitude: f64,
    pub plains_detail_amplitude: f64,

    pub mountain_body_threshold: f64,
    pub mountain_body_exponent: f64,
    pub mountain_body_height: f64,
    pub ridge_exponent: f64,
    pub ridge_height: f64,
    pub mountain_medium_amplitude: f64,

    pub mound_frequency: f64,
    pub mound_octaves: u32,
    pub mound_threshold: f64,
    pub mound_base_height: f64,
    pub mound_mountain_height: f64,

    pub pit_frequency: f64,
    pub pit_octaves: u32,
    pub pit_threshold: f64,
    pub pit_exponent: f64,
    pub pit_base_depth: f64,
    pub pit_mountain_depth: f64,
}

impl Default for HeightfieldParams {
    fn default() -> Self {
        Self {
            biome_frequency: 0.0015,
            biome_octaves: 5,
            biome_threshold: 0.42,
            biome_transition_width: 0.58,
            biome_sharpness: 1.4,

            low_frequency: 0.0034,
            low_octaves: 6,
            medium_frequency: 0.012,
            medium_octaves: 5,
            detail_frequency: 0.055,
            detail_octaves: 3,
            ridge_frequency: 0.006,
            ridge_octaves: 6,

            plains_medium_amplitude: 5.2,
            plains_detail_amplitude: 1.25,

            mountain_body_threshold: 0.33,
            mountain_body_exponent: 1.9,
            mountain_body_height: 58.0,
            ridge_exponent: 1.6,
            ridge_height: 32.0,
            mountain_medium_amplitude: 10.0,

            mound_frequency: 0.03,
            mound_octaves: 3,
            mound_threshold: 0.58,
            mound_base_height: 0.8,
            mound_mountain_height: 1.8,

            pit_frequency: 0.009,
            pit_octaves: 4,
            pit_threshold: 0.78,
            pit_exponent: 1.3,
            pit_base_depth: 10.0,
            pit_mountain_depth: 22.0,
        }
    }
}

impl HeightfieldParams {
    /// Returns every octave count, labelled, for validation.
    pub fn octave_counts(&self) -> [(&'static str, u32); 7] {
        [
            ("biome_octaves", self.biome_octaves),
            ("low_octaves", self.low_octaves),
            ("medium_octaves", self.medium_octaves),
            ("detail_octaves", self.detail_octaves),
            ("ridge_octaves", self.ridge_octaves),
            ("mound_octaves", self.mound_octaves),
            ("pit_octaves", self.pit_octaves),
        ]
    }
}

/// Normalized position of `value` inside `[threshold, threshold + width]`.
///
/// A non-positive width degrades to a hard step.
#[inline]
fn ramp(value: f64, threshold: f64, width: f64) -> f64 {
    if width <= 0.0 {
        if value >= threshold {
            1.0
        } else {
            0.0
        }
    } else {
        saturate((value - threshold) / width)
    }
}

/// The procedural ground surface.
///
/// Cheap to clone; holds only parameters and noise source descriptors.
///
/// # Examples
///
/// ```
/// use terrain_engine::engine_state::terrain::heightfield::Heightfield;
///
/// let ground = Heightfield::default();
/// let y = ground.height(120.0, -48.5);
/// assert_eq!(y, ground.height(120.0, -48.5));
/// ```
#[derive(Clone, Debug)]
pub struct Heightfield {
    params: HeightfieldParams,
    biome: FractalNoise,
    low: FractalNoise,
    medium: FractalNoise,
    detail: FractalNoise,
    ridges: RidgedNoise,
    mounds: FractalNoise,
    pits: FractalNoise,
}

impl Default for Heightfield {
    fn default() -> Self {
        Self::new(HeightfieldParams::default())
    }
}

impl Heightfield {
    /// Builds a heightfield from its parameters.
    pub fn new(params: HeightfieldParams) -> Self {
        Self {
            biome: FractalNoise::new(params.biome_frequency, params.biome_octaves),
            low: FractalNoise::new(params.low_frequency, params.low_octaves),
            medium: FractalNoise::new(params.medium_frequency, params.medium_octaves),
            detail: FractalNoise::new(params.detail_frequency, params.detail_octaves),
            ridges: RidgedNoise::new(params.ridge_frequency, params.ridge_octaves),
            mounds: FractalNoise::new(params.mound_frequency, params.mound_octaves),
            pits: FractalNoise::new(params.pit_frequency, params.pit_octaves),
            params,
        }
    }

    /// The parameters this heightfield was built from.
    pub fn params(&self) -> &HeightfieldParams {
        &self.params
    }

    /// Plains-to-mountains blend factor in `[0, 1]` at a world coordinate.
    pub fn biome_blend(&self, world_x: f64, world_z: f64) -> f64 {
        let point = Self::sanitize(world_x, world_z);
        self.blend_at(point)
    }

    /// Terrain height at a world coordinate.
    ///
    /// Total: non-finite coordinates are sampled as `0.0`.
    pub fn height(&self, world_x: f64, world_z: f64) -> f64 {
        let p = &self.params;
        let point = Self::sanitize(world_x, world_z);

        let blend = self.blend_at(point);

        let low = self.low.get(point);
        let medium = self.medium.get(point);
        let detail = self.detail.get(point);
        let ridges = self.ridges.get(point);

        let plains = (medium - 0.5) * p.plains_medium_amplitude
            + (detail - 0.5) * p.plains_detail_amplitude;

        let body = ramp_unclamped_above_zero(low, p.mountain_body_threshold)
            .powf(p.mountain_body_exponent)
            * p.mountain_body_height;
        let ridgeline = ridges.powf(p.ridge_exponent) * p.ridge_height;
        let mountains = body + ridgeline + (medium - 0.5) * p.mountain_medium_amplitude;

        let mut height = plains * (1.0 - blend) + mountains * blend;

        let mound_mask = smoothstep(ramp(
            self.mounds.get(point),
            p.mound_threshold,
            1.0 - p.mound_threshold,
        ));
        height += (p.mound_base_height + blend * p.mound_mountain_height) * mound_mask;

        let pit_mask = smoothstep(ramp(
            self.pits.get(point),
            p.pit_threshold,
            1.0 - p.pit_threshold,
        ));
        height -= pit_mask.powf(p.pit_exponent) * (p.pit_base_depth + blend * p.pit_mountain_depth);

        height
    }

    /// Largest absolute height difference between `(x, z)` and its four
    /// axis neighbours `distance` away.
    pub fn slope(&self, world_x: f64, world_z: f64, distance: f64) -> f64 {
        let center = self.height(world_x, world_z);
        [
            self.height(world_x + distance, world_z),
            self.height(world_x - distance, world_z),
            self.height(world_x, world_z + distance),
            self.height(world_x, world_z - distance),
        ]
        .into_iter()
        .map(|h| (center - h).abs())
        .fold(0.0, f64::max)
    }

    fn blend_at(&self, point: [f64; 2]) -> f64 {
        let p = &self.params;
        let biome = self.biome.get(point);
        smoothstep(ramp(biome, p.biome_threshold, p.biome_transition_width)).powf(p.biome_sharpness)
    }

    #[inline]
    fn sanitize(world_x: f64, world_z: f64) -> [f64; 2] {
        let clean = |v: f64| if v.is_finite() { v } else { 0.0 };
        [clean(world_x), clean(world_z)]
    }
}

/// `max(0, value - threshold) / (1 - threshold)`, the mountain body profile.
#[inline]
fn ramp_unclamped_above_zero(value: f64, threshold: f64) -> f64 {
    let width = 1.0 - threshold;
    if width <= 0.0 {
        return 0.0;
    }
    f64::max(0.0, value - threshold) / width
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(step: f64, n: i32) -> impl Iterator<Item = (f64, f64)> {
        (-n..n).flat_map(move |i| (-n..n).map(move |j| (i as f64 * step, j as f64 * step)))
    }

    #[test]
    fn height_is_deterministic() {
        let ground = Heightfield::default();
        for (x, z) in grid(37.3, 20) {
            assert_eq!(ground.height(x, z).to_bits(), ground.height(x, z).to_bits());
        }
    }

    #[test]
    fn independent_generators_agree() {
        let a = Heightfield::new(HeightfieldParams::default());
        let b = Heightfield::new(HeightfieldParams::default());
        for (x, z) in grid(113.7, 15) {
            assert_eq!(a.height(x, z), b.height(x, z));
        }
    }

    #[test]
    fn height_does_not_depend_on_sampling_order() {
        let ground = Heightfield::default();
        let forward: Vec<f64> = grid(51.0, 10).map(|(x, z)| ground.height(x, z)).collect();
        let mut backward: Vec<f64> = grid(51.0, 10)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|(x, z)| ground.height(x, z))
            .collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn height_is_total() {
        let ground = Heightfield::default();
        for (x, z) in [
            (f64::NAN, 0.0),
            (0.0, f64::INFINITY),
            (f64::NEG_INFINITY, f64::NAN),
            (1e300, -1e300),
            (f64::MAX, f64::MIN),
            (-0.0, 0.0),
        ] {
            assert!(ground.height(x, z).is_finite(), "height({x}, {z}) not finite");
        }
    }

    #[test]
    fn non_finite_coordinates_sample_the_origin_axis() {
        let ground = Heightfield::default();
        assert_eq!(ground.height(f64::NAN, 25.0), ground.height(0.0, 25.0));
    }

    #[test]
    fn plains_only_terrain_stays_low() {
        let params = HeightfieldParams {
            biome_threshold: 2.0,
            ..HeightfieldParams::default()
        };
        let p = params.clone();
        let ground = Heightfield::new(params);
        let max_plains = 0.5 * (p.plains_medium_amplitude + p.plains_detail_amplitude);
        let upper = max_plains + p.mound_base_height;
        let lower = -max_plains - p.pit_base_depth;
        for (x, z) in grid(47.0, 25) {
            assert_eq!(ground.biome_blend(x, z), 0.0);
            let h = ground.height(x, z);
            assert!(h <= upper + 1e-9 && h >= lower - 1e-9, "h = {h}");
        }
    }

    #[test]
    fn mountains_rise_above_plains() {
        let plains = Heightfield::new(HeightfieldParams {
            biome_threshold: 2.0,
            ..HeightfieldParams::default()
        });
        let mountains = Heightfield::new(HeightfieldParams {
            biome_threshold: -1.0,
            ..HeightfieldParams::default()
        });

        let samples: Vec<(f64, f64)> = grid(61.0, 20).collect();
        let mean = |ground: &Heightfield| {
            samples.iter().map(|&(x, z)| ground.height(x, z)).sum::<f64>() / samples.len() as f64
        };

        assert!(mean(&mountains) > mean(&plains) + 5.0);
    }

    #[test]
    fn biome_blend_is_normalized() {
        let ground = Heightfield::default();
        for (x, z) in grid(250.0, 20) {
            let blend = ground.biome_blend(x, z);
            assert!((0.0..=1.0).contains(&blend));
        }
    }

    #[test]
    fn height_is_continuous() {
        let ground = Heightfield::default();
        let eps = 1e-6;
        for (x, z) in grid(29.0, 12) {
            let h = ground.height(x, z);
            assert!((ground.height(x + eps, z) - h).abs() < 1e-3);
            assert!((ground.height(x, z + eps) - h).abs() < 1e-3);
        }
    }

    #[test]
    fn slope_of_flat_ground_is_zero() {
        let flat = Heightfield::new(HeightfieldParams {
            plains_medium_amplitude: 0.0,
            plains_detail_amplitude: 0.0,
            biome_threshold: 2.0,
            mound_base_height: 0.0,
            pit_base_depth: 0.0,
            ..HeightfieldParams::default()
        });
        assert_eq!(flat.slope(10.0, 10.0, 3.0), 0.0);
    }

    #[test]
    fn params_round_trip_through_json_with_defaults() {
        let params: HeightfieldParams =
            serde_json::from_str(r#"{ "ridge_height": 40.0 }"#).unwrap();
        assert_eq!(params.ridge_height, 40.0);
        assert_eq!(params.biome_octaves, HeightfieldParams::default().biome_octaves);
    }
}
