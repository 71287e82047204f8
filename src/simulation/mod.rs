//! Compute pipeline drivers
//!
//! [`ComputeBackend`] is the seam between the host and the five compute
//! stages. [`CpuBackend`] emulates the device on a thread pool and
//! [`GpuBackend`] runs the WGSL programs through wgpu.

pub mod cpu;
pub mod gpu;
pub mod manager;
pub mod shaders;
pub mod traits;

pub use cpu::CpuBackend;
pub use gpu::GpuBackend;
pub use manager::SimulationManager;
pub use shaders::{ShaderKey, ShaderRegistry};
pub use traits::{ComputeBackend, FrameCounts, FrameInputs, TreeCounts};
