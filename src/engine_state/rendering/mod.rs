//! Rendering-side pieces of the terrain system.
//!
//! The terrain never draws anything itself. It produces [`vertex::TerrainVertex`]
//! meshes, hands them to a [`mesh_allocator::MeshAllocator`] and exposes the
//! shading inputs the terrain shader needs.

pub mod gpu_allocator;
pub mod mesh_allocator;
pub mod shading;
pub mod vertex;

pub use vertex::TerrainVertex;
