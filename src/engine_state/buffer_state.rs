//! # Buffer State Module
//!
//! Registry of the GPU buffers backing live terrain chunks.
//!
//! ## Key Features
//!
//! * One vertex and one index buffer per [`MeshHandle`]
//! * Memory analytics per handle and in total
//! * Explicit destruction on release, so evicted chunks return their memory
//!   immediately instead of waiting for the last reference to drop
//!
//! ## Architecture
//!
//! `BufferState` owns the `wgpu` device and queue. Buffers are keyed by the
//! handle the allocator hands out rather than by name, since chunks come and
//! go continuously as the viewer moves.

use std::collections::HashMap;

use wgpu::{util::DeviceExt, Buffer, Device, Queue};

use crate::engine_state::rendering::mesh_allocator::MeshHandle;

/// Analytics data for one chunk's buffers.
#[derive(Debug, Clone)]
struct BufferAnalytics {
    /// Bytes allocated for the vertex and index buffers together
    allocated_memory: u64,
    /// Label the buffers were created under
    label: String,
}

/// The GPU buffers of one chunk mesh.
#[derive(Debug)]
pub struct MeshBuffers {
    pub vertex: Buffer,
    pub index: Buffer,
    /// Number of `u32` indices in `index`
    pub index_count: u32,
}

/// Central manager for chunk GPU buffers.
///
/// # Examples
///
/// ```ignore
/// let mut buffer_state = BufferState::new(device, queue);
/// buffer_state.create_mesh_buffers(handle, "near (0, 0)", vertex_bytes, index_bytes, index_count);
/// let buffers = buffer_state.get_mesh_buffers(handle);
/// buffer_state.destroy_mesh_buffers(handle);
/// ```
pub struct BufferState {
    device: Device,
    queue: Queue,
    buffers: HashMap<MeshHandle, MeshBuffers>,
    buffer_analytics: HashMap<MeshHandle, BufferAnalytics>,
    peak_allocated_memory: u64,
}

impl BufferState {
    /// Creates a new buffer state manager
    ///
    /// # Arguments
    ///
    /// * `device` - The GPU device buffers are created on
    /// * `queue` - The queue buffer writes are submitted to
    pub fn new(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            buffer_analytics: HashMap::new(),
            peak_allocated_memory: 0,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Creates and fills the vertex and index buffers for `handle`.
    ///
    /// An existing entry under the same handle is destroyed first.
    ///
    /// # Arguments
    ///
    /// * `handle` - Key the buffers are registered under
    /// * `label` - Debug label prefix for both buffers
    /// * `vertex_data` - Raw vertex bytes
    /// * `index_data` - Raw `u32` index bytes
    /// * `index_count` - Number of indices in `index_data`
    pub fn create_mesh_buffers(
        &mut self,
        handle: MeshHandle,
        label: &str,
        vertex_data: &[u8],
        index_data: &[u8],
        index_count: u32,
    ) {
        self.destroy_mesh_buffers(handle);

        let vertex = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vertices")),
            contents: vertex_data,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} indices")),
            contents: index_data,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        });

        self.buffers.insert(
            handle,
            MeshBuffers {
                vertex,
                index,
                index_count,
            },
        );
        self.buffer_analytics.insert(
            handle,
            BufferAnalytics {
                allocated_memory: (vertex_data.len() + index_data.len()) as u64,
                label: label.to_string(),
            },
        );
        self.peak_allocated_memory = self
            .peak_allocated_memory
            .max(self.get_total_allocated_memory());
    }

    /// Destroys the buffers of `handle`.
    ///
    /// # Returns
    ///
    /// `true` if buffers were registered under the handle
    pub fn destroy_mesh_buffers(&mut self, handle: MeshHandle) -> bool {
        self.buffer_analytics.remove(&handle);
        match self.buffers.remove(&handle) {
            Some(buffers) => {
                buffers.vertex.destroy();
                buffers.index.destroy();
                true
            }
            None => false,
        }
    }

    /// Gets the buffers registered under `handle`, if any
    pub fn get_mesh_buffers(&self, handle: MeshHandle) -> Option<&MeshBuffers> {
        self.buffers.get(&handle)
    }

    /// Number of chunks with live buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Gets the total allocated memory across all chunk buffers
    ///
    /// # Returns
    ///
    /// Total allocated memory in bytes
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .fold(0, |acc, analytics| acc + analytics.allocated_memory)
    }

    /// Label and size of every live entry, largest first
    pub fn get_allocation_report(&self) -> Vec<(MeshHandle, String, u64)> {
        let mut report: Vec<_> = self
            .buffer_analytics
            .iter()
            .map(|(handle, analytics)| (*handle, analytics.label.clone(), analytics.allocated_memory))
            .collect();
        report.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));
        report
    }

    /// Gets the highest total allocation seen so far
    pub fn get_peak_allocated_memory(&self) -> u64 {
        self.peak_allocated_memory
    }
}
