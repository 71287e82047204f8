//! Error types for the quadswarm crate
//!
//! Only setup-time failures are errors. Runtime capacity exhaustion and lock
//! contention degrade silently and show up as reduced counts instead.

use thiserror::Error;

/// Errors that can occur while building or driving a simulation
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No adapter matched the request.
    #[error("failed to request adapter: {0}")]
    AdapterRequest(String),

    /// The adapter refused to create a device.
    #[error("failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Mapping a read-back buffer failed.
    #[error("failed to map read-back buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// The map callback was dropped before it reported a result.
    #[error("read-back channel for '{0}' closed before the map completed")]
    ReadbackChannel(&'static str),

    /// The CPU backend's worker pool could not start.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A fixed-capacity array could not be allocated.
    #[error("cannot allocate '{label}': {requested} bytes requested, limit is {limit} bytes")]
    Allocation {
        label: &'static str,
        requested: u64,
        limit: u64,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
