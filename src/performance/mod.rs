//! # Frame-rate monitoring
//!
//! Rolling frame-time statistics plus the counts the last frame produced.
//!
//! ```rust
//! use quadswarm::performance::PerformanceMonitor;
//!
//! let mut monitor = PerformanceMonitor::new();
//! monitor.begin_frame();
//! // ... run one frame ...
//! monitor.end_frame();
//! let fps = monitor.metrics().fps;
//! # let _ = fps;
//! ```

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::simulation::FrameCounts;

/// Frame statistics over the current sample window
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub fps: f32,
    /// Average frame time in milliseconds
    pub frame_time_ms: f32,
    pub min_frame_time_ms: f32,
    pub max_frame_time_ms: f32,
    /// Counts from the most recent frame
    pub last_counts: FrameCounts,
    pub frames_recorded: u64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            fps: 0.0,
            frame_time_ms: 0.0,
            min_frame_time_ms: f32::MAX,
            max_frame_time_ms: 0.0,
            last_counts: FrameCounts::default(),
            frames_recorded: 0,
        }
    }
}

pub struct PerformanceMonitor {
    /// Ring buffer of recent frame times
    frame_times: VecDeque<Duration>,
    max_samples: usize,
    frame_start: Option<Instant>,
    current_metrics: PerformanceMetrics,
    last_update: Instant,
    update_interval: Duration,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::with_samples(120)
    }

    pub fn with_samples(max_samples: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            frame_start: None,
            current_metrics: PerformanceMetrics::default(),
            last_update: Instant::now(),
            update_interval: Duration::from_millis(100),
        }
    }

    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Close the frame opened by [`begin_frame`](Self::begin_frame)
    pub fn end_frame(&mut self) {
        if let Some(start) = self.frame_start.take() {
            self.record_frame_time(start.elapsed());

            // Statistics are refreshed at most every update interval
            if self.last_update.elapsed() >= self.update_interval {
                self.refresh();
                self.last_update = Instant::now();
            }
        }
    }

    pub fn record_frame_time(&mut self, frame_time: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(frame_time);
        self.current_metrics.frames_recorded += 1;
    }

    pub fn record_counts(&mut self, counts: FrameCounts) {
        self.current_metrics.last_counts = counts;
    }

    /// Recompute the frame statistics from the sample window now
    pub fn refresh(&mut self) {
        if self.frame_times.is_empty() {
            return;
        }

        let total_time: Duration = self.frame_times.iter().sum();
        let avg_frame_time_ms = (total_time / self.frame_times.len() as u32).as_secs_f32() * 1000.0;

        self.current_metrics.frame_time_ms = avg_frame_time_ms;
        self.current_metrics.fps = if avg_frame_time_ms > 0.0 {
            1000.0 / avg_frame_time_ms
        } else {
            0.0
        };

        if let (Some(min_time), Some(max_time)) =
            (self.frame_times.iter().min(), self.frame_times.iter().max())
        {
            self.current_metrics.min_frame_time_ms = min_time.as_secs_f32() * 1000.0;
            self.current_metrics.max_frame_time_ms = max_time.as_secs_f32() * 1000.0;
        }
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.current_metrics
    }

    /// Frame times in milliseconds, oldest first
    pub fn frame_time_history(&self) -> Vec<f32> {
        self.frame_times
            .iter()
            .map(|duration| duration.as_secs_f32() * 1000.0)
            .collect()
    }

    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.current_metrics = PerformanceMetrics::default();
        self.frame_start = None;
        self.last_update = Instant::now();
    }

    /// One-line summary at `info` level
    pub fn log_summary(&self) {
        let metrics = &self.current_metrics;
        let counts = &metrics.last_counts;
        log::info!(
            "{:.1} fps ({:.2} ms avg, {:.2}..{:.2} ms) | active {} | nodes {} | in tree {} | faces {}",
            metrics.fps,
            metrics.frame_time_ms,
            metrics.min_frame_time_ms,
            metrics.max_frame_time_ms,
            counts.active_particles,
            counts.tree.nodes_in_use,
            counts.tree.particles_in_tree,
            counts.geometry_faces
        );
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_averages_window() {
        let mut monitor = PerformanceMonitor::with_samples(4);
        for ms in [10, 20, 30, 40] {
            monitor.record_frame_time(Duration::from_millis(ms));
        }
        monitor.refresh();
        let metrics = monitor.metrics();
        assert!((metrics.frame_time_ms - 25.0).abs() < 1e-3);
        assert!((metrics.fps - 40.0).abs() < 1e-2);
        assert!((metrics.min_frame_time_ms - 10.0).abs() < 1e-3);
        assert!((metrics.max_frame_time_ms - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_window_drops_oldest_sample() {
        let mut monitor = PerformanceMonitor::with_samples(2);
        for ms in [100, 10, 10] {
            monitor.record_frame_time(Duration::from_millis(ms));
        }
        assert_eq!(monitor.frame_time_history().len(), 2);
        monitor.refresh();
        assert!((monitor.metrics().max_frame_time_ms - 10.0).abs() < 1e-3);
        assert_eq!(monitor.metrics().frames_recorded, 3);
    }

    #[test]
    fn test_reset_clears_counts() {
        let mut monitor = PerformanceMonitor::new();
        let mut counts = FrameCounts::default();
        counts.active_particles = 7;
        monitor.record_counts(counts);
        monitor.begin_frame();
        monitor.end_frame();
        assert_eq!(monitor.metrics().last_counts.active_particles, 7);
        monitor.reset();
        assert_eq!(monitor.metrics(), &PerformanceMetrics::default());
    }
}
