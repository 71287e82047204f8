//! Simulation manager
//!
//! Owns a backend and the scene it simulates, and turns wall-clock time into
//! frames.

use bytemuck::Zeroable;
use cgmath::Matrix4;

use super::traits::{ComputeBackend, FrameCounts, FrameInputs};
use crate::error::Result;
use crate::particle::Particle;
use crate::performance::PerformanceMonitor;
use crate::scene::Scene;

pub struct SimulationManager<B: ComputeBackend> {
    backend: B,
    scene: Scene,
    monitor: PerformanceMonitor,
    is_paused: bool,
    time_scale: f32,
    accumulated_time: f32,
    /// `None` runs one frame per update with the scaled delta
    fixed_timestep: Option<f32>,
    frame_seed: u32,
    last_counts: FrameCounts,
}

impl<B: ComputeBackend> SimulationManager<B> {
    /// A manager stepping at the configured delta time
    pub fn new(backend: B, scene: Scene) -> Self {
        let fixed_timestep = Some(backend.config().delta_time_sec);
        Self {
            backend,
            scene,
            monitor: PerformanceMonitor::new(),
            is_paused: false,
            time_scale: 1.0,
            accumulated_time: 0.0,
            fixed_timestep,
            frame_seed: 0,
            last_counts: FrameCounts::default(),
        }
    }

    /// Advance by `delta_time` seconds of wall-clock time. Returns the
    /// number of frames run.
    pub fn update(&mut self, delta_time: f32) -> Result<u32> {
        if self.is_paused {
            return Ok(0);
        }
        let scaled_delta = delta_time * self.time_scale;

        match self.fixed_timestep {
            Some(fixed_dt) if fixed_dt > 0.0 => {
                self.accumulated_time += scaled_delta;
                let mut frames = 0;
                while self.accumulated_time >= fixed_dt {
                    self.step_with(fixed_dt)?;
                    self.accumulated_time -= fixed_dt;
                    frames += 1;
                }
                Ok(frames)
            }
            _ => {
                self.step_with(scaled_delta)?;
                Ok(1)
            }
        }
    }

    /// Run exactly one frame at the fixed timestep, or the configured delta
    pub fn step(&mut self) -> Result<FrameCounts> {
        let dt = self
            .fixed_timestep
            .unwrap_or(self.backend.config().delta_time_sec);
        self.step_with(dt)
    }

    fn step_with(&mut self, delta_time_sec: f32) -> Result<FrameCounts> {
        let config = self.backend.config();
        let descriptors = self.scene.descriptors();
        let quota = config.emission_quota(descriptors.len());
        let tree_bounds = self.scene.tree_bounds(config.tree_bounds);

        let inputs = FrameInputs {
            faces: self.scene.faces(),
            emitters: &descriptors,
            quota,
            frame_seed: self.frame_seed,
            delta_time_sec,
            tree_bounds,
        };

        self.monitor.begin_frame();
        let counts = self.backend.run_frame(&inputs)?;
        self.monitor.end_frame();
        self.monitor.record_counts(counts);

        log::debug!(
            "frame {}: {} active, {} nodes, {} in tree",
            self.frame_seed,
            counts.active_particles,
            counts.tree.nodes_in_use,
            counts.tree.particles_in_tree
        );
        self.frame_seed = self.frame_seed.wrapping_add(1);
        self.last_counts = counts;
        Ok(counts)
    }

    /// Deactivate every particle
    pub fn clear_particles(&mut self) {
        let empty = vec![Particle::zeroed(); self.backend.config().max_particles as usize];
        self.backend.upload_particles(&empty);
        self.last_counts = FrameCounts::default();
    }

    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.scene.set_transform(transform);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn last_counts(&self) -> FrameCounts {
        self.last_counts
    }

    pub fn frame_seed(&self) -> u32 {
        self.frame_seed
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.is_paused = paused;
    }

    pub fn set_fixed_timestep(&mut self, timestep: Option<f32>) {
        self.fixed_timestep = timestep;
        self.accumulated_time = 0.0;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Negative scales are clamped to zero
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}
