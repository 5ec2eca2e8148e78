//! Vertex data structures and layouts for terrain rendering.
//!
//! Chunk meshes are built in `f64` world space and narrowed to this format
//! only when they are handed to the allocator.

use cgmath::{Point3, Vector3};

/// A vertex of a terrain chunk mesh.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
///
/// Total size: 24 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    /// World-space position
    pub position: [f32; 3],
    /// Unit surface normal
    pub normal: [f32; 3],
}

impl TerrainVertex {
    /// Narrows a world-space position and normal into a GPU vertex.
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        TerrainVertex {
            position: [position.x as f32, position.y as f32, position.z as f32],
            normal: [normal.x as f32, normal.y as f32, normal.z as f32],
        }
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::from(self.position)
    }

    pub fn normal(&self) -> Vector3<f32> {
        Vector3::from(self.normal)
    }

    /// Returns the vertex buffer layout description for the terrain pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec3<f32>)
    /// - `location = 1`: normal (vec3<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TerrainVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}
