//! # Terrain Module
//!
//! Procedural ground and everything streamed over it.
//!
//! ## Key Components
//!
//! * `noise_kernel` - hash-based value noise, fbm and ridged noise
//! * `heightfield` - the pure `height(x, z)` function
//! * `grid_index` - cell keys and the needed-set around a viewer
//! * `chunk` - terrain chunks and their mesh builder
//! * `streaming_cache` - keeps one tier's live set equal to its needed-set
//! * `vegetation` - deterministic tree placement per cell
//! * `spawn` - walkable spawn point search
//! * `tasks` / `world` - worker tasks and the glue that uploads their output

pub mod chunk;
pub mod grid_index;
pub mod heightfield;
pub mod noise_kernel;
pub mod spawn;
pub mod streaming_cache;
pub mod tasks;
pub mod vegetation;
pub mod world;
