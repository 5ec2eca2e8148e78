//! Shared-state containers used across the engine.

pub mod mt_resource;

pub use mt_resource::MtResource;
