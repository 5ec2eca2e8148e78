//! # Terrain Task System
//!
//! Tasks that build terrain chunk meshes and vegetation cells on the worker
//! pool. Each task owns its inputs and returns a finished payload; uploading
//! and bookkeeping happen back on the main thread.

pub mod chunk_generation_task;
