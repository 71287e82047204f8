//! Simulation configuration
//!
//! Capacities are fixed at creation. Nothing here grows at runtime, so the
//! values must be planned generously up front.

use crate::error::{Error, Result};
use crate::quadtree::{NodeBounds, MOVED_SLOT, NODE_SLOT_CAPACITY};

/// Number of invocations per workgroup, shared by every compute stage.
pub const WORKGROUP_SIZE: u32 = 256;

/// How the host extracts counter values computed on the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadbackMode {
    /// Map the copy buffer and wait for it within the frame.
    Blocking,
    /// Start mapping the copy buffer and report the last completed value.
    Deferred,
}

/// Capacities and tuning values for one simulation
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub max_particles: u32,
    pub particles_per_emitter_per_frame: u32,
    pub delta_time_sec: f32,
    pub max_particles_per_node: u32,
    pub max_nodes: u32,
    pub initial_columns: u32,
    pub initial_rows: u32,
    /// Bounds covered by the initial grid. `None` uses the polygon's bounding box.
    pub tree_bounds: Option<NodeBounds>,
    pub max_lock_spins: u32,
    /// Capacity of the region face buffer.
    pub max_region_faces: u32,
    /// Capacity of the emitter buffer.
    pub max_emitters: u32,
    pub readback: ReadbackMode,
    /// Worker threads for the CPU backend. `None` lets rayon decide.
    pub cpu_threads: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_particles: 100_000,
            particles_per_emitter_per_frame: 20,
            delta_time_sec: 0.01,
            max_particles_per_node: NODE_SLOT_CAPACITY as u32,
            max_nodes: 32_768,
            initial_columns: 4,
            initial_rows: 4,
            tree_bounds: None,
            max_lock_spins: 128,
            max_region_faces: 64,
            max_emitters: 64,
            readback: ReadbackMode::Blocking,
            cpu_threads: None,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_particles(mut self, count: u32) -> Self {
        self.max_particles = count;
        self
    }

    pub fn with_particles_per_emitter(mut self, count: u32) -> Self {
        self.particles_per_emitter_per_frame = count;
        self
    }

    pub fn with_delta_time(mut self, seconds: f32) -> Self {
        self.delta_time_sec = seconds;
        self
    }

    pub fn with_max_particles_per_node(mut self, count: u32) -> Self {
        self.max_particles_per_node = count;
        self
    }

    pub fn with_max_nodes(mut self, count: u32) -> Self {
        self.max_nodes = count;
        self
    }

    pub fn with_initial_grid(mut self, columns: u32, rows: u32) -> Self {
        self.initial_columns = columns;
        self.initial_rows = rows;
        self
    }

    pub fn with_tree_bounds(mut self, bounds: NodeBounds) -> Self {
        self.tree_bounds = Some(bounds);
        self
    }

    pub fn with_max_lock_spins(mut self, spins: u32) -> Self {
        self.max_lock_spins = spins;
        self
    }

    pub fn with_max_region_faces(mut self, count: u32) -> Self {
        self.max_region_faces = count;
        self
    }

    pub fn with_max_emitters(mut self, count: u32) -> Self {
        self.max_emitters = count;
        self
    }

    pub fn with_readback(mut self, mode: ReadbackMode) -> Self {
        self.readback = mode;
        self
    }

    pub fn with_cpu_threads(mut self, threads: usize) -> Self {
        self.cpu_threads = Some(threads);
        self
    }

    /// Number of nodes marked in use by the quadtree reset stage.
    /// Saturates; `validate` rejects grids that do not fit in a `u32`.
    pub fn initial_node_count(&self) -> u32 {
        self.initial_columns.saturating_mul(self.initial_rows)
    }

    /// Capacity of the quadtree geometry buffer, four edges per node
    pub fn max_geometry_faces(&self) -> u32 {
        self.max_nodes.saturating_mul(4)
    }

    /// Per-frame activation quota for the given number of emitters
    pub fn emission_quota(&self, emitter_count: usize) -> u32 {
        self.particles_per_emitter_per_frame
            .saturating_mul(emitter_count as u32)
    }

    /// Check every value against the fixed record layouts
    pub fn validate(&self) -> Result<()> {
        if self.max_particles == 0 || self.max_particles > MOVED_SLOT {
            return Err(Error::InvalidConfig(format!(
                "max_particles must be in 1..={}, got {}",
                MOVED_SLOT, self.max_particles
            )));
        }
        if self.max_particles_per_node == 0
            || self.max_particles_per_node as usize > NODE_SLOT_CAPACITY
        {
            return Err(Error::InvalidConfig(format!(
                "max_particles_per_node must be in 1..={}, got {}",
                NODE_SLOT_CAPACITY, self.max_particles_per_node
            )));
        }
        if self.initial_columns == 0 || self.initial_rows == 0 {
            return Err(Error::InvalidConfig(
                "initial grid needs at least one column and one row".into(),
            ));
        }
        let Some(grid_nodes) = self.initial_columns.checked_mul(self.initial_rows) else {
            return Err(Error::InvalidConfig(format!(
                "initial grid {}x{} overflows the node index range",
                self.initial_columns, self.initial_rows
            )));
        };
        if self.max_nodes < grid_nodes {
            return Err(Error::InvalidConfig(format!(
                "max_nodes ({}) is smaller than the initial grid ({})",
                self.max_nodes, grid_nodes
            )));
        }
        if !(self.delta_time_sec.is_finite() && self.delta_time_sec >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "delta_time_sec must be finite and non-negative, got {}",
                self.delta_time_sec
            )));
        }
        if self.max_lock_spins == 0 {
            return Err(Error::InvalidConfig("max_lock_spins must be positive".into()));
        }
        if self.max_region_faces == 0 || self.max_emitters == 0 {
            return Err(Error::InvalidConfig(
                "region face and emitter capacities must be positive".into(),
            ));
        }
        if let Some(bounds) = self.tree_bounds {
            if !(bounds.right > bounds.left && bounds.top > bounds.bottom) {
                return Err(Error::InvalidConfig(format!(
                    "tree bounds are empty: {:?}",
                    bounds
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_node_count(), 16);
        assert_eq!(config.emission_quota(8), 160);
    }

    #[test]
    fn test_node_capacity_limits() {
        let too_many = SimulationConfig::new().with_max_particles_per_node(26);
        assert!(matches!(too_many.validate(), Err(Error::InvalidConfig(_))));

        let zero = SimulationConfig::new().with_max_particles_per_node(0);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_grid_must_fit_in_node_pool() {
        let config = SimulationConfig::new()
            .with_initial_grid(8, 8)
            .with_max_nodes(32);
        assert!(config.validate().is_err());

        let overflowing = SimulationConfig::new().with_initial_grid(70_000, 70_000);
        assert_eq!(overflowing.initial_node_count(), u32::MAX);
        assert!(matches!(overflowing.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_tree_bounds_rejected() {
        let config = SimulationConfig::new().with_tree_bounds(NodeBounds {
            left: 1.0,
            top: 1.0,
            right: 1.0,
            bottom: -1.0,
        });
        assert!(config.validate().is_err());
    }
}
