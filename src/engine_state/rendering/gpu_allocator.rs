//! GPU-backed [`MeshAllocator`].
//!
//! Every allocation is wrapped in `wgpu` error scopes so an out-of-memory or
//! validation failure comes back as a [`MeshAllocationError`] for that one
//! chunk instead of reaching the device's uncaptured-error handler.

use super::mesh_allocator::{MeshAllocationError, MeshAllocator, MeshHandle};
use crate::engine_state::buffer_state::BufferState;
use crate::engine_state::terrain::chunk::ChunkMesh;

/// Uploads chunk meshes into `wgpu` vertex and index buffers.
pub struct GpuMeshAllocator {
    buffer_state: BufferState,
    next_handle: u64,
}

impl GpuMeshAllocator {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        GpuMeshAllocator {
            buffer_state: BufferState::new(device, queue),
            next_handle: 0,
        }
    }

    /// Creates a device without a surface, for headless streaming.
    ///
    /// # Returns
    /// `DeviceUnavailable` when no adapter or device can be obtained.
    pub async fn new_headless() -> Result<Self, MeshAllocationError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::empty(),
            backend_options: wgpu::BackendOptions::from_env_or_default(),
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| MeshAllocationError::DeviceUnavailable(e.to_string()))?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                label: Some("terrain device"),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| MeshAllocationError::DeviceUnavailable(e.to_string()))?;

        Ok(Self::new(device, queue))
    }

    pub fn buffer_state(&self) -> &BufferState {
        &self.buffer_state
    }
}

impl MeshAllocator for GpuMeshAllocator {
    fn allocate(&mut self, label: &str, mesh: &ChunkMesh) -> Result<MeshHandle, MeshAllocationError> {
        if mesh.is_empty() {
            return Err(MeshAllocationError::EmptyMesh);
        }

        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;

        let device = self.buffer_state.device().clone();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        self.buffer_state.create_mesh_buffers(
            handle,
            label,
            bytemuck::cast_slice(&mesh.vertices),
            bytemuck::cast_slice(&mesh.indices),
            mesh.indices.len() as u32,
        );

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());

        let failure = match (out_of_memory, validation) {
            (Some(error), _) => Some(MeshAllocationError::OutOfMemory(error.to_string())),
            (None, Some(error)) => Some(MeshAllocationError::DeviceUnavailable(error.to_string())),
            (None, None) => None,
        };

        match failure {
            Some(error) => {
                self.buffer_state.destroy_mesh_buffers(handle);
                Err(error)
            }
            None => Ok(handle),
        }
    }

    fn release(&mut self, handle: MeshHandle) -> bool {
        self.buffer_state.destroy_mesh_buffers(handle)
    }

    fn live_allocations(&self) -> usize {
        self.buffer_state.len()
    }

    fn allocated_bytes(&self) -> u64 {
        self.buffer_state.get_total_allocated_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::terrain::chunk::chunk_creation::ChunkMeshBuilder;
    use crate::engine_state::terrain::grid_index::{GridKey, TierParams};
    use crate::engine_state::terrain::heightfield::Heightfield;

    #[test]
    fn uploads_and_releases_chunk_buffers() {
        let mut allocator = match pollster::block_on(GpuMeshAllocator::new_headless()) {
            Ok(allocator) => allocator,
            Err(error) => {
                eprintln!("skipping, no GPU available: {error}");
                return;
            }
        };

        let ground = Heightfield::default();
        let mesh = ChunkMeshBuilder::new(&ground, &TierParams::far()).build(GridKey::new(1, 2));

        let handle = allocator.allocate("far (1, 2)", &mesh).unwrap();
        let buffers = allocator.buffer_state().get_mesh_buffers(handle).unwrap();
        assert_eq!(buffers.index_count as usize, mesh.indices.len());
        assert_eq!(allocator.allocated_bytes(), mesh.byte_size());
        let report = allocator.buffer_state().get_allocation_report();
        assert_eq!(report, vec![(handle, "far (1, 2)".to_string(), mesh.byte_size())]);

        assert!(allocator.release(handle));
        assert_eq!(allocator.live_allocations(), 0);
        assert!(allocator.buffer_state().get_peak_allocated_memory() >= mesh.byte_size());
    }
}
