//! # Noise Kernel
//!
//! Deterministic scalar hash and value-noise primitives that every terrain and
//! vegetation decision is derived from.
//!
//! All functions here are pure functions of their `(x, z)` input. There is no
//! seed state and no interior mutability, so any number of chunk builds can
//! sample them concurrently.
//!
//! ## Composition
//!
//! * [`hash`] - lattice hash in `[0, 1)`, not continuous
//! * [`value_noise`] - smoothstep-weighted bilinear blend of [`hash`], C¹ at lattice lines
//! * [`fbm`] - normalized fractal sum of [`value_noise`] octaves
//! * [`ridge`] - normalized fractal sum of `1 - |2n - 1|`, sharp at noise mid-crossings
//!
//! The fractal signals are also exposed as [`noise::NoiseFn`] sources
//! ([`FractalNoise`], [`RidgedNoise`]) so they compose with the rest of the
//! `noise` ecosystem.

use noise::NoiseFn;

/// Lower bound for the amplitude normalization of fractal sums.
const MIN_AMPLITUDE_SUM: f64 = 0.0001;

/// Returns the fractional part of `x`, always in `[0, 1)`.
#[inline]
pub fn fract(x: f64) -> f64 {
    let f = x - x.floor();
    // Tiny negative inputs round up to exactly 1.0.
    if f >= 1.0 {
        0.0
    } else {
        f
    }
}

/// Hermite smoothstep `3t² - 2t³`. Callers saturate `t` first.
#[inline]
pub fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Clamps `t` into `[0, 1]`.
#[inline]
pub fn saturate(t: f64) -> f64 {
    t.clamp(0.0, 1.0)
}

/// Pseudo-random scalar in `[0, 1)` for the point `(x, z)`.
///
/// Identical floating-point inputs give bit-identical outputs on one platform.
/// Inputs so large that the sine argument stops being finite hash to `0.0`.
#[inline]
pub fn hash(x: f64, z: f64) -> f64 {
    let s = (x * 127.1 + z * 311.7).sin() * 43758.5453123;
    if !s.is_finite() {
        return 0.0;
    }
    fract(s)
}

/// Value noise: [`hash`] at the four surrounding lattice points, blended with
/// smoothstep weights on both axes.
///
/// At integer coordinates this returns exactly `hash(x, z)`. Non-finite
/// coordinates (including ones that overflowed while scaling) sample `0.0`.
pub fn value_noise(x: f64, z: f64) -> f64 {
    let x = if x.is_finite() { x } else { 0.0 };
    let z = if z.is_finite() { z } else { 0.0 };
    let xi = x.floor();
    let zi = z.floor();
    let xf = x - xi;
    let zf = z - zi;

    let a = hash(xi, zi);
    let b = hash(xi + 1.0, zi);
    let c = hash(xi, zi + 1.0);
    let d = hash(xi + 1.0, zi + 1.0);

    let ux = smoothstep(xf);
    let uz = smoothstep(zf);

    let near_row = a + (b - a) * ux;
    let far_row = c + (d - c) * ux;
    near_row + (far_row - near_row) * uz
}

/// Fractal Brownian motion over [`value_noise`].
///
/// Octave `i` is sampled at frequency `2^i` with amplitude `0.5^(i + 1)`; the
/// sum is divided by the total amplitude so the result stays in `[0, 1]`.
pub fn fbm(x: f64, z: f64, octaves: u32) -> f64 {
    let mut value = 0.0;
    let mut amplitude = 0.5;
    let mut frequency = 1.0;
    let mut amplitude_sum = 0.0;

    for _ in 0..octaves {
        value += value_noise(x * frequency, z * frequency) * amplitude;
        amplitude_sum += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }

    value / f64::max(MIN_AMPLITUDE_SUM, amplitude_sum)
}

/// Ridged fractal noise, used for mountain ridgelines.
///
/// Each octave contributes `1 - |2n - 1|`, which peaks where the underlying
/// noise crosses its midpoint. Amplitude decays by `0.55` and frequency grows by
/// `2.05` per octave. Normalized into `[0, 1]`.
pub fn ridge(x: f64, z: f64, octaves: u32) -> f64 {
    let mut value = 0.0;
    let mut amplitude = 0.6;
    let mut frequency = 1.0;
    let mut amplitude_sum = 0.0;

    for _ in 0..octaves {
        let n = value_noise(x * frequency, z * frequency);
        value += (1.0 - (n * 2.0 - 1.0).abs()) * amplitude;
        amplitude_sum += amplitude;
        amplitude *= 0.55;
        frequency *= 2.05;
    }

    value / f64::max(MIN_AMPLITUDE_SUM, amplitude_sum)
}

/// [`fbm`] sampled at a fixed base frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalNoise {
    /// World-space scale applied before sampling.
    pub frequency: f64,
    /// Number of octaves summed.
    pub octaves: u32,
}

impl FractalNoise {
    /// Creates a fractal source with the given base frequency and octave count.
    pub const fn new(frequency: f64, octaves: u32) -> Self {
        Self { frequency, octaves }
    }
}

impl NoiseFn<f64, 2> for FractalNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        fbm(
            point[0] * self.frequency,
            point[1] * self.frequency,
            self.octaves,
        )
    }
}

/// [`ridge`] sampled at a fixed base frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RidgedNoise {
    /// World-space scale applied before sampling.
    pub frequency: f64,
    /// Number of octaves summed.
    pub octaves: u32,
}

impl RidgedNoise {
    /// Creates a ridged source with the given base frequency and octave count.
    pub const fn new(frequency: f64, octaves: u32) -> Self {
        Self { frequency, octaves }
    }
}

impl NoiseFn<f64, 2> for RidgedNoise {
    fn get(&self, point: [f64; 2]) -> f64 {
        ridge(
            point[0] * self.frequency,
            point[1] * self.frequency,
            self.octaves,
        )
    }
}
