// src/lib.rs
//! Quadswarm
//!
//! A particle swarm confined to a convex polygon, indexed every frame by a
//! quadtree built concurrently on the device. Runs on wgpu compute or on a
//! CPU emulation of the same device memory.

pub mod buffers;
pub mod config;
pub mod device;
pub mod emitter;
pub mod error;
pub mod kernels;
pub mod particle;
pub mod performance;
pub mod polygon;
pub mod prelude;
pub mod quadtree;
pub mod scene;
pub mod simulation;
pub mod wgpu_utils;

pub use error::{Error, Result};

/// Demo scene on the CPU backend with default capacities
pub fn cpu_demo() -> Result<simulation::SimulationManager<simulation::CpuBackend>> {
    let backend = simulation::CpuBackend::new(config::SimulationConfig::default())?;
    Ok(simulation::SimulationManager::new(backend, scene::Scene::demo()))
}
