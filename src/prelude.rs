//! # Quadswarm prelude
//!
//! ```no_run
//! use quadswarm::prelude::*;
//!
//! fn main() -> quadswarm::Result<()> {
//!     let config = SimulationConfig::new().with_max_particles(10_000);
//!     let mut manager = SimulationManager::new(CpuBackend::new(config)?, Scene::demo());
//!     let counts = manager.step()?;
//!     println!("{} particles active", counts.active_particles);
//!     Ok(())
//! }
//! ```

pub use crate::buffers::{BufferConfig, DrawStyle, SharedBuffer};
pub use crate::config::{ReadbackMode, SimulationConfig};
pub use crate::emitter::{BarEmitter, EmitterDescriptor, ParticleEmitter, PointEmitter};
pub use crate::error::{Error, Result};
pub use crate::particle::Particle;
pub use crate::performance::{PerformanceMetrics, PerformanceMonitor};
pub use crate::polygon::{PolygonFace, PolygonRegion};
pub use crate::quadtree::{NodeBounds, NodeIndex, QuadTreeNode, QuadTreeSnapshot};
pub use crate::scene::Scene;
pub use crate::simulation::{
    ComputeBackend, CpuBackend, FrameCounts, FrameInputs, GpuBackend, SimulationManager,
    TreeCounts,
};
pub use crate::wgpu_utils::GpuContext;

pub use cgmath::{Deg, Matrix4, Vector3};
