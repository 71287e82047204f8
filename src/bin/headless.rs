//! Runs the demo scene without a window and logs the frame counts.
//!
//! Usage: `quadswarm-headless [frames] [--cpu]`

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use quadswarm::prelude::*;

const DEFAULT_FRAMES: u32 = 1_000;

fn run<B: ComputeBackend>(backend: B, frames: u32) -> Result<()> {
    log::info!("running {} frames on the {} backend", frames, backend.name());
    let mut manager = SimulationManager::new(backend, Scene::demo());
    let mut last_report = Instant::now();

    for frame in 0..frames {
        manager
            .step()
            .with_context(|| format!("frame {} failed", frame))?;
        if last_report.elapsed() >= Duration::from_secs(1) {
            manager.monitor().log_summary();
            last_report = Instant::now();
        }
    }

    let snapshot = manager
        .backend_mut()
        .read_quadtree()
        .context("reading the final quadtree")?;
    log::info!(
        "done: {} subdivided of {} nodes in use, {} particles stored",
        snapshot.subdivided_count(),
        snapshot.in_use_count(),
        snapshot.stored_particles()
    );
    manager.monitor().log_summary();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut frames = DEFAULT_FRAMES;
    let mut force_cpu = false;
    for arg in std::env::args().skip(1) {
        if arg == "--cpu" {
            force_cpu = true;
        } else {
            frames = arg
                .parse()
                .with_context(|| format!("expected a frame count, got '{}'", arg))?;
        }
    }

    let config = SimulationConfig::default();
    if !force_cpu {
        match GpuContext::request() {
            Ok(context) => {
                let backend = GpuBackend::new(context, config).context("creating the GPU backend")?;
                return run(backend, frames);
            }
            Err(e) => log::warn!("no usable GPU ({}), falling back to the CPU backend", e),
        }
    }
    let backend = CpuBackend::new(config).context("creating the CPU backend")?;
    run(backend, frames)
}
