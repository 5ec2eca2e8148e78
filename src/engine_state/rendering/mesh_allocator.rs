//! # Mesh Allocator Module
//!
//! The seam between the streaming caches and whatever owns geometry memory.
//!
//! A cache asks for a [`MeshHandle`] when it builds a chunk and hands the
//! handle back when it evicts the chunk. Implementations:
//!
//! * [`HeadlessMeshAllocator`] - byte accounting only, with an optional budget
//! * [`GpuMeshAllocator`](super::gpu_allocator::GpuMeshAllocator) - real `wgpu` buffers

use std::collections::HashMap;
use std::fmt;

use crate::engine_state::terrain::chunk::ChunkMesh;

/// Opaque identifier of one allocated chunk mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

impl fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Reasons an allocation can fail.
#[derive(Clone, Debug, PartialEq)]
pub enum MeshAllocationError {
    /// The allocator's byte budget would be exceeded.
    BudgetExceeded { requested: u64, available: u64 },
    /// The device reported it ran out of memory.
    OutOfMemory(String),
    /// The mesh has no triangles.
    EmptyMesh,
    /// The device rejected the buffer for another reason.
    DeviceUnavailable(String),
}

impl fmt::Display for MeshAllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshAllocationError::BudgetExceeded {
                requested,
                available,
            } => write!(
                f,
                "mesh needs {requested} bytes but only {available} bytes of budget remain"
            ),
            MeshAllocationError::OutOfMemory(message) => {
                write!(f, "device out of memory: {message}")
            }
            MeshAllocationError::EmptyMesh => f.write_str("mesh has no triangles"),
            MeshAllocationError::DeviceUnavailable(message) => {
                write!(f, "device rejected mesh buffers: {message}")
            }
        }
    }
}

impl std::error::Error for MeshAllocationError {}

/// Owner of chunk geometry memory.
pub trait MeshAllocator {
    /// Uploads `mesh` and returns a handle for it.
    ///
    /// # Arguments
    /// * `label` - Debug label, e.g. `"near (3, -1)"`
    /// * `mesh` - Geometry to upload
    fn allocate(&mut self, label: &str, mesh: &ChunkMesh) -> Result<MeshHandle, MeshAllocationError>;

    /// Frees the memory behind `handle`. Returns `false` for unknown handles.
    fn release(&mut self, handle: MeshHandle) -> bool;

    /// Number of meshes currently allocated.
    fn live_allocations(&self) -> usize;

    /// Bytes currently allocated.
    fn allocated_bytes(&self) -> u64;
}

/// A [`MeshAllocator`] that keeps no geometry, only sizes.
///
/// Used by tests and the headless demo. A budget makes allocation fail once
/// live meshes would exceed it.
#[derive(Debug, Default)]
pub struct HeadlessMeshAllocator {
    next_handle: u64,
    sizes: HashMap<MeshHandle, u64>,
    allocated_bytes: u64,
    budget: Option<u64>,
    total_allocations: u64,
    total_releases: u64,
}

impl HeadlessMeshAllocator {
    /// An allocator without a budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator that refuses to hold more than `budget` bytes.
    pub fn with_budget(budget: u64) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }

    /// Changes the budget. Live allocations above a lowered budget stay live.
    pub fn set_budget(&mut self, budget: Option<u64>) {
        self.budget = budget;
    }

    pub fn budget(&self) -> Option<u64> {
        self.budget
    }

    /// Successful allocations since creation.
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    /// Successful releases since creation.
    pub fn total_releases(&self) -> u64 {
        self.total_releases
    }

    pub fn is_live(&self, handle: MeshHandle) -> bool {
        self.sizes.contains_key(&handle)
    }
}

impl MeshAllocator for HeadlessMeshAllocator {
    fn allocate(&mut self, label: &str, mesh: &ChunkMesh) -> Result<MeshHandle, MeshAllocationError> {
        if mesh.is_empty() {
            return Err(MeshAllocationError::EmptyMesh);
        }

        let requested = mesh.byte_size();
        if let Some(budget) = self.budget {
            let available = budget.saturating_sub(self.allocated_bytes);
            if requested > available {
                return Err(MeshAllocationError::BudgetExceeded {
                    requested,
                    available,
                });
            }
        }

        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;
        self.sizes.insert(handle, requested);
        self.allocated_bytes += requested;
        self.total_allocations += 1;
        log::trace!("Allocated {} ({} bytes) for {}", handle, requested, label);
        Ok(handle)
    }

    fn release(&mut self, handle: MeshHandle) -> bool {
        match self.sizes.remove(&handle) {
            Some(size) => {
                self.allocated_bytes -= size;
                self.total_releases += 1;
                true
            }
            None => false,
        }
    }

    fn live_allocations(&self) -> usize {
        self.sizes.len()
    }

    fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }
}
